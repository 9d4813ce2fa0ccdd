//! Template corpus: named, fully laid-out graphs

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::core::{Result, SchemalignError};
use crate::graph::{BpcGraph, Labeling};
use crate::wl::{graph_features, SimilarityMetric};

/// A template and its distance to a query graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedTemplate {
    pub name: String,
    pub distance: f64,
}

#[derive(Debug, Clone, Default)]
pub struct Corpus {
    templates: BTreeMap<String, BpcGraph>,
}

impl Corpus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a template. It must validate and every box must be fixed.
    pub fn insert(&mut self, name: impl Into<String>, graph: BpcGraph) -> Result<()> {
        let name = name.into();
        graph.validate()?;
        if let Some(bx) = graph.boxes.iter().find(|b| !b.is_fixed()) {
            return Err(SchemalignError::CorpusEntryNotFixed {
                name,
                box_id: bx.box_id.clone(),
            });
        }
        self.templates.insert(name, graph);
        Ok(())
    }

    pub fn with_template(mut self, name: impl Into<String>, graph: BpcGraph) -> Result<Self> {
        self.insert(name, graph)?;
        Ok(self)
    }

    /// Load every `*.json` graph under `dir`. Templates are named by their
    /// path relative to `dir`, without extension, `/`-separated.
    pub fn from_dir(dir: &Path) -> Result<Self> {
        let mut corpus = Self::new();
        for path in discover_graph_files(dir)? {
            let name = template_name(dir, &path);
            let graph = BpcGraph::load(&path)?;
            corpus.insert(name, graph)?;
        }
        tracing::info!("Loaded {} template(s) from {}", corpus.len(), dir.display());
        Ok(corpus)
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&BpcGraph> {
        self.templates.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.templates.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &BpcGraph)> {
        self.templates.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Templates ordered by WL distance to `query` (pin colors as labels),
    /// closest first; equal distances order by name.
    pub fn rank(&self, query: &BpcGraph, rounds: usize, metric: SimilarityMetric) -> Result<Vec<RankedTemplate>> {
        if self.is_empty() {
            return Err(SchemalignError::EmptyCorpus);
        }
        let query_features = graph_features(query, &Labeling::Colors, rounds)?;
        let mut ranked = Vec::with_capacity(self.len());
        for (name, template) in &self.templates {
            let features = graph_features(template, &Labeling::Colors, rounds)?;
            ranked.push(RankedTemplate {
                name: name.clone(),
                distance: metric.distance(&query_features, &features),
            });
        }
        ranked.sort_by(|a, b| a.distance.total_cmp(&b.distance).then_with(|| a.name.cmp(&b.name)));
        Ok(ranked)
    }
}

fn template_name(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path).with_extension("");
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

/// Recursively discover JSON graph files in a directory, sorted by path.
pub fn discover_graph_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    walk_dir(dir, &mut files, 0)?;
    files.sort();
    Ok(files)
}

fn walk_dir(dir: &Path, files: &mut Vec<PathBuf>, depth: usize) -> Result<()> {
    if depth > 20 {
        return Ok(());
    }
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_dir() {
            let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
            if name.starts_with('.') || name == "target" {
                continue;
            }
            walk_dir(&path, files, depth + 1)?;
        } else if path.is_file() && path.extension().and_then(|s| s.to_str()) == Some("json") {
            files.push(path);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{BpcBox, BpcPin};
    use tempfile::TempDir;

    fn template(pins: usize) -> BpcGraph {
        let mut graph = BpcGraph::new().with_box(BpcBox::fixed("U1", 0.0, 0.0));
        for i in 0..pins {
            graph.add_pin(BpcPin::new("U1", i.to_string().as_str(), format!("N{}", i), "normal").at(i as f64, 0.0));
        }
        graph
    }

    #[test]
    fn test_insert_rejects_floating_boxes() {
        let mut corpus = Corpus::new();
        let graph = template(2).with_box(BpcBox::floating("C1"));
        assert!(matches!(
            corpus.insert("bad", graph),
            Err(SchemalignError::CorpusEntryNotFixed { .. })
        ));
        assert!(corpus.is_empty());
    }

    #[test]
    fn test_rank_orders_by_distance_then_name() {
        let corpus = Corpus::new()
            .with_template("b_same", template(3))
            .unwrap()
            .with_template("a_same", template(3))
            .unwrap()
            .with_template("far", template(8))
            .unwrap();
        let ranked = corpus.rank(&template(3), 2, SimilarityMetric::Jaccard).unwrap();
        let names: Vec<&str> = ranked.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["a_same", "b_same", "far"]);
        assert_eq!(ranked[0].distance, 0.0);
        assert!(ranked[2].distance > 0.0);
    }

    #[test]
    fn test_rank_empty_corpus() {
        assert!(matches!(
            Corpus::new().rank(&template(1), 1, SimilarityMetric::Jaccard),
            Err(SchemalignError::EmptyCorpus)
        ));
    }

    #[test]
    fn test_from_dir_recurses() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("power")).unwrap();
        template(2).save(&dir.path().join("simple.json")).unwrap();
        template(4).save(&dir.path().join("power").join("ldo.json")).unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let corpus = Corpus::from_dir(dir.path()).unwrap();
        let names: Vec<&str> = corpus.names().collect();
        assert_eq!(names, vec!["power/ldo", "simple"]);
        assert_eq!(corpus.get("power/ldo").unwrap().pins.len(), 4);
    }
}
