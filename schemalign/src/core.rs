//! Core layout-by-analogy pipeline shared by the library API and the CLI.
//! No I/O beyond explicit file helpers.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::adapt::{inherit_layout, net_adapt_graph, AdaptOptions, InheritOptions};
use crate::assignment::{assign, Assignment, AssignmentOptions, StrategyKind};
use crate::corpus::Corpus;
use crate::graph::{BoxId, BpcGraph, GraphStats, Labeling, PinId, PinKey};
use crate::merge::merge_partitions;
use crate::partition::{partition_graph, pin_direction, PartitionOptions, Side};
use crate::wl::{graph_features, SimilarityMetric};

#[derive(Debug, thiserror::Error)]
pub enum SchemalignError {
    #[error("Adjacency matrix is not square: {rows} rows but row {row} has {len} entries")]
    NonSquareMatrix { rows: usize, row: usize, len: usize },
    #[error("Expected {nodes} labels, got {labels}")]
    LabelCountMismatch { nodes: usize, labels: usize },
    #[error("Pin {box_id}/{pin_id} references a missing box")]
    MissingBox { box_id: BoxId, pin_id: PinId },
    #[error("Duplicate box id: {0}")]
    DuplicateBox(BoxId),
    #[error("Duplicate pin: {0}")]
    DuplicatePin(PinKey),
    #[error("Unknown box: {0}")]
    UnknownBox(BoxId),
    #[error("Box {box_id} has no pins on its {side} side")]
    SideNotFound { box_id: BoxId, side: Side },
    #[error("WL bucket {color} holds {floating} floating box(es) but {fixed} template box(es)")]
    BucketSizeMismatch { color: String, floating: usize, fixed: usize },
    #[error("Invalid assignment: {0}")]
    InvalidAssignment(String),
    #[error("Invalid index mapping: {0}")]
    InvalidIndexMapping(String),
    #[error("Iteration limit of {limit} reached")]
    IterationLimit { limit: usize },
    #[error("Corpus entry {name} has floating box {box_id}")]
    CorpusEntryNotFixed { name: String, box_id: BoxId },
    #[error("Corpus is empty")]
    EmptyCorpus,
    #[error("No compatible template for {partition}")]
    NoCompatibleTemplate { partition: String },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, SchemalignError>;

/// How a matched template is carried over to the floating graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdaptationMode {
    /// Rewrite the template under floating ids ([`net_adapt_graph`])
    #[default]
    Rewrite,
    /// Copy positions onto the floating graph ([`inherit_layout`])
    Inherit,
}

/// Options for layout runs (CLI or library).
#[derive(Debug, Clone)]
pub struct LayoutOptions {
    pub strategy: StrategyKind,
    /// Tried on the closest template once `strategy` found nothing usable.
    pub fallback: Option<StrategyKind>,
    pub mode: AdaptationMode,
    pub use_partitioning: bool,
    pub partition: PartitionOptions,
    pub assignment: AssignmentOptions,
    pub adapt: AdaptOptions,
    pub inherit: InheritOptions,
    /// WL rounds for template ranking; defaults to the piece's box count.
    pub ranking_rounds: Option<usize>,
    pub metric: SimilarityMetric,
    /// Closest templates tried per piece
    pub max_templates: usize,
}

impl Default for LayoutOptions {
    fn default() -> Self {
        Self {
            strategy: StrategyKind::Histogram,
            fallback: Some(StrategyKind::Histogram),
            mode: AdaptationMode::Rewrite,
            use_partitioning: true,
            partition: PartitionOptions::default(),
            assignment: AssignmentOptions::default(),
            adapt: AdaptOptions::default(),
            inherit: InheritOptions::default(),
            ranking_rounds: None,
            metric: SimilarityMetric::Jaccard,
            max_templates: 5,
        }
    }
}

/// How one piece of the floating graph was matched
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartitionReport {
    /// Partition id, `None` when the whole graph was matched at once
    pub partition: Option<usize>,
    pub label: String,
    pub seed_box: Option<BoxId>,
    pub side: Option<Side>,
    pub template: Option<String>,
    pub distance: Option<f64>,
    pub strategy: Option<StrategyKind>,
    pub boxes_matched: usize,
    pub boxes_total: usize,
}

impl PartitionReport {
    pub fn is_matched(&self) -> bool {
        self.template.is_some()
    }
}

#[derive(Debug, Clone)]
pub struct LayoutResult {
    pub graph: BpcGraph,
    pub reports: Vec<PartitionReport>,
    pub stats: GraphStats,
}

impl LayoutResult {
    pub fn matched_pieces(&self) -> usize {
        self.reports.iter().filter(|r| r.is_matched()).count()
    }
}

/// A template choice for one piece
#[derive(Debug, Clone)]
pub struct TemplateMatch {
    pub template: String,
    pub distance: f64,
    pub strategy: StrategyKind,
    pub assignment: Assignment,
}

struct Piece {
    report: PartitionReport,
    graph: BpcGraph,
}

/// Core layout API used by both library callers and the CLI.
pub struct LayoutCore;

impl LayoutCore {
    /// Lay out `floating` by analogy with the closest corpus templates.
    ///
    /// partition → rank → assign (with fallback) → adapt → merge, then
    /// append every floating box and pin no piece covered.
    pub fn layout_by_analogy(floating: &BpcGraph, corpus: &Corpus, options: &LayoutOptions) -> Result<LayoutResult> {
        floating.validate()?;
        if floating.boxes.is_empty() {
            return Ok(LayoutResult {
                graph: floating.clone(),
                reports: Vec::new(),
                stats: floating.stats(),
            });
        }
        if corpus.is_empty() {
            return Err(SchemalignError::EmptyCorpus);
        }

        let pieces = Self::pieces(floating, options)?;
        let mut reports = Vec::with_capacity(pieces.len());
        let mut adapted = Vec::with_capacity(pieces.len());

        for mut piece in pieces {
            let seed = piece.report.seed_box.clone().zip(piece.report.side);
            let seed = seed.as_ref().map(|(box_id, side)| (box_id, *side));
            match Self::match_piece(&piece.graph, seed, corpus, options)? {
                Some(found) => {
                    let template = corpus.get(&found.template).ok_or_else(|| {
                        SchemalignError::NoCompatibleTemplate {
                            partition: piece.report.label.clone(),
                        }
                    })?;
                    let graph = match options.mode {
                        AdaptationMode::Rewrite => {
                            net_adapt_graph(&piece.graph, template, &found.assignment, &options.adapt)?.graph
                        }
                        AdaptationMode::Inherit => {
                            inherit_layout(&piece.graph, template, &found.assignment, &options.inherit)?
                        }
                    };
                    tracing::info!(
                        "{} matched {} (distance {:.3}, {})",
                        piece.report.label,
                        found.template,
                        found.distance,
                        found.strategy
                    );
                    piece.report.template = Some(found.template);
                    piece.report.distance = Some(found.distance);
                    piece.report.strategy = Some(found.strategy);
                    piece.report.boxes_matched = found.assignment.boxes.len();
                    adapted.push(graph);
                }
                None => {
                    tracing::warn!("No template matched {}", piece.report.label);
                }
            }
            reports.push(piece.report);
        }

        if adapted.is_empty() {
            let partition = reports
                .first()
                .map(|r| r.label.clone())
                .unwrap_or_else(|| "graph".to_string());
            return Err(SchemalignError::NoCompatibleTemplate { partition });
        }

        let mut graph = merge_partitions(&adapted);
        Self::append_uncovered(&mut graph, floating);
        let stats = graph.stats();
        Ok(LayoutResult { graph, reports, stats })
    }

    /// Load a floating graph and a corpus directory, then lay out.
    pub fn layout_files(floating: &Path, corpus_dir: &Path, options: &LayoutOptions) -> Result<LayoutResult> {
        let graph = BpcGraph::load(floating)?;
        let corpus = Corpus::from_dir(corpus_dir)?;
        Self::layout_by_analogy(&graph, &corpus, options)
    }

    fn pieces(floating: &BpcGraph, options: &LayoutOptions) -> Result<Vec<Piece>> {
        let whole = || Piece {
            report: PartitionReport {
                partition: None,
                label: "graph".to_string(),
                seed_box: None,
                side: None,
                template: None,
                distance: None,
                strategy: None,
                boxes_matched: 0,
                boxes_total: floating.boxes.len(),
            },
            graph: floating.clone(),
        };
        if !options.use_partitioning {
            return Ok(vec![whole()]);
        }

        let partitions = partition_graph(floating, &options.partition)?;
        if partitions.is_empty() {
            return Ok(vec![whole()]);
        }
        Ok(partitions
            .into_iter()
            .map(|p| Piece {
                report: PartitionReport {
                    partition: Some(p.id),
                    label: p.label(),
                    seed_box: Some(p.seed_box.clone()),
                    side: Some(p.side),
                    template: None,
                    distance: None,
                    strategy: None,
                    boxes_matched: 0,
                    boxes_total: p.boxes.len(),
                },
                graph: p.graph,
            })
            .collect())
    }

    /// Rank the corpus for one piece and find the first usable assignment.
    ///
    /// The configured strategy is tried on up to `max_templates` templates,
    /// closest first; a WL bucket mismatch moves on to the next template.
    /// If nothing matched, the fallback strategy is tried on the closest one.
    ///
    /// A piece cut from one side of `seed` only accepts a template whose
    /// counterpart pins for that box sit on the same side.
    pub fn match_piece(
        piece: &BpcGraph,
        seed: Option<(&BoxId, Side)>,
        corpus: &Corpus,
        options: &LayoutOptions,
    ) -> Result<Option<TemplateMatch>> {
        let rounds = options.ranking_rounds.unwrap_or(piece.boxes.len());
        let ranked = corpus.rank(piece, rounds, options.metric)?;

        for candidate in ranked.iter().take(options.max_templates.max(1)) {
            let Some(template) = corpus.get(&candidate.name) else {
                continue;
            };
            match assign(options.strategy, &options.assignment, piece, template) {
                Ok(assignment) if !assignment.boxes.is_empty() => {
                    if !Self::keeps_orientation(piece, template, &assignment, seed) {
                        tracing::debug!("{}: seed pins land on another side, trying next template", candidate.name);
                        continue;
                    }
                    return Ok(Some(TemplateMatch {
                        template: candidate.name.clone(),
                        distance: candidate.distance,
                        strategy: options.strategy,
                        assignment,
                    }));
                }
                Ok(_) => {}
                Err(SchemalignError::BucketSizeMismatch { color, floating, fixed }) => {
                    tracing::debug!(
                        "{}: bucket {} has {} vs {} box(es), trying next template",
                        candidate.name,
                        color,
                        floating,
                        fixed
                    );
                }
                Err(e) => return Err(e),
            }
        }

        let (Some(fallback), Some(best)) = (options.fallback, ranked.first()) else {
            return Ok(None);
        };
        if fallback == options.strategy {
            return Ok(None);
        }
        let Some(template) = corpus.get(&best.name) else {
            return Ok(None);
        };
        let assignment = assign(fallback, &options.assignment, piece, template)?;
        if assignment.boxes.is_empty() || !Self::keeps_orientation(piece, template, &assignment, seed) {
            return Ok(None);
        }
        Ok(Some(TemplateMatch {
            template: best.name.clone(),
            distance: best.distance,
            strategy: fallback,
            assignment,
        }))
    }

    /// True when every mapped real pin of the seed box lands on a template
    /// pin facing `side`. An unmatched seed box fails.
    fn keeps_orientation(
        piece: &BpcGraph,
        template: &BpcGraph,
        assignment: &Assignment,
        seed: Option<(&BoxId, Side)>,
    ) -> bool {
        let Some((seed_box, side)) = seed else {
            return true;
        };
        if !assignment.boxes.contains_key(seed_box) {
            return false;
        }
        piece
            .real_pins_of_box(seed_box)
            .filter_map(|pin| assignment.pins.get(&pin.key()))
            .all(|target| {
                template
                    .get_pin(target)
                    .and_then(|pin| pin_direction(template, pin))
                    == Some(side)
            })
    }

    fn append_uncovered(graph: &mut BpcGraph, floating: &BpcGraph) {
        let mut appended = 0usize;
        for bx in &floating.boxes {
            if !graph.contains_box(&bx.box_id) {
                graph.add_box(bx.clone());
                appended += 1;
            }
        }
        for pin in &floating.pins {
            if graph.get_pin(&pin.key()).is_none() {
                graph.add_pin(pin.clone());
                appended += 1;
            }
        }
        if appended > 0 {
            tracing::debug!("Appended {} uncovered floating element(s)", appended);
        }
    }

    /// WL distance between two graphs under pin-color labels.
    pub fn distance(a: &BpcGraph, b: &BpcGraph, rounds: usize, metric: SimilarityMetric) -> Result<f64> {
        let fa = graph_features(a, &Labeling::Colors, rounds)?;
        let fb = graph_features(b, &Labeling::Colors, rounds)?;
        Ok(metric.distance(&fa, &fb))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{BpcBox, BpcPin, Point, CENTER_COLOR};

    fn floating_ab() -> BpcGraph {
        BpcGraph::new()
            .with_box(BpcBox::floating("A"))
            .with_box(BpcBox::floating("B"))
            .with_pin(BpcPin::new("A", "P1", "N1", "red"))
            .with_pin(BpcPin::new("A", "P2", "N2", "blue"))
            .with_pin(BpcPin::new("B", "P1", "N1", "red"))
    }

    fn corpus_xy() -> Corpus {
        let fixed = BpcGraph::new()
            .with_box(BpcBox::fixed("X", 10.0, 0.0))
            .with_box(BpcBox::fixed("Y", 20.0, 5.0))
            .with_pin(BpcPin::new("X", "a", "M1", "red").at(-1.0, 0.0))
            .with_pin(BpcPin::new("X", "b", "M2", "blue").at(1.0, 0.0))
            .with_pin(BpcPin::new("Y", "a", "M1", "red").at(0.0, -1.0));
        Corpus::new().with_template("xy", fixed).unwrap()
    }

    #[test]
    fn test_whole_graph_layout() {
        let result = LayoutCore::layout_by_analogy(&floating_ab(), &corpus_xy(), &LayoutOptions::default()).unwrap();
        assert_eq!(result.reports.len(), 1);
        assert_eq!(result.reports[0].template.as_deref(), Some("xy"));
        assert_eq!(result.reports[0].boxes_matched, 2);
        assert_eq!(
            result.graph.get_box(&BoxId::from("A")).unwrap().center(),
            Some(Point::new(10.0, 0.0))
        );
        assert_eq!(result.stats.fixed_boxes, 2);
        assert_eq!(result.matched_pieces(), 1);
    }

    #[test]
    fn test_wl_bucket_falls_back() {
        // C makes the WL buckets disagree with the template.
        let floating = floating_ab()
            .with_box(BpcBox::floating("C"))
            .with_pin(BpcPin::new("C", "1", "N2", "blue"));
        let options = LayoutOptions {
            strategy: StrategyKind::WlBucket,
            ..LayoutOptions::default()
        };
        let result = LayoutCore::layout_by_analogy(&floating, &corpus_xy(), &options).unwrap();
        assert_eq!(result.reports[0].strategy, Some(StrategyKind::Histogram));
        assert_eq!(result.graph.boxes.len(), 3);
        assert!(result.graph.validate().is_ok());
    }

    #[test]
    fn test_no_fallback_means_no_match() {
        let floating = floating_ab()
            .with_box(BpcBox::floating("C"))
            .with_pin(BpcPin::new("C", "1", "N2", "blue"));
        let options = LayoutOptions {
            strategy: StrategyKind::WlBucket,
            fallback: None,
            ..LayoutOptions::default()
        };
        assert!(matches!(
            LayoutCore::layout_by_analogy(&floating, &corpus_xy(), &options),
            Err(SchemalignError::NoCompatibleTemplate { .. })
        ));
    }

    #[test]
    fn test_inherit_mode_keeps_ids() {
        let options = LayoutOptions {
            mode: AdaptationMode::Inherit,
            ..LayoutOptions::default()
        };
        let floating = floating_ab();
        let result = LayoutCore::layout_by_analogy(&floating, &corpus_xy(), &options).unwrap();
        assert_eq!(result.graph.pins.len(), floating.pins.len());
        assert_eq!(
            result.graph.get_box(&BoxId::from("B")).unwrap().center(),
            Some(Point::new(20.0, 5.0))
        );
    }

    #[test]
    fn test_degenerate_inputs() {
        let empty = LayoutCore::layout_by_analogy(&BpcGraph::new(), &Corpus::new(), &LayoutOptions::default()).unwrap();
        assert!(empty.graph.is_empty());
        assert!(matches!(
            LayoutCore::layout_by_analogy(&floating_ab(), &Corpus::new(), &LayoutOptions::default()),
            Err(SchemalignError::EmptyCorpus)
        ));
    }

    #[test]
    fn test_uncovered_pins_are_appended() {
        let floating = floating_ab().with_pin(BpcPin::new("A", "c", "A_C", CENTER_COLOR));
        let result = LayoutCore::layout_by_analogy(&floating, &corpus_xy(), &LayoutOptions::default()).unwrap();
        assert!(result.graph.get_pin(&PinKey::new("A", "c")).is_some());
    }

    #[test]
    fn test_seed_side_must_match_template_side() {
        let piece = BpcGraph::new()
            .with_box(BpcBox::floating("A"))
            .with_pin(BpcPin::new("A", "1", "N", "red").at(1.0, 0.0));
        let template = BpcGraph::new()
            .with_box(BpcBox::fixed("X", 0.0, 0.0))
            .with_pin(BpcPin::new("X", "a", "NA", "red").at(-1.0, 0.0))
            .with_pin(BpcPin::new("X", "b", "NB", "blue").at(1.0, 0.0));
        let corpus = Corpus::new().with_template("flipped", template).unwrap();
        let options = LayoutOptions::default();
        let seed = BoxId::from("A");

        // A/1 maps onto X/a, which faces left.
        let found = LayoutCore::match_piece(&piece, Some((&seed, Side::Left)), &corpus, &options).unwrap();
        assert_eq!(found.map(|m| m.template), Some("flipped".to_string()));
        assert!(LayoutCore::match_piece(&piece, Some((&seed, Side::Right)), &corpus, &options)
            .unwrap()
            .is_none());
        assert!(LayoutCore::match_piece(&piece, None, &corpus, &options).unwrap().is_some());
    }

    #[test]
    fn test_distance_to_self_is_zero() {
        let d = LayoutCore::distance(&floating_ab(), &floating_ab(), 3, SimilarityMetric::Jaccard).unwrap();
        assert_eq!(d, 0.0);
    }
}
