//! Schemalign CLI - schematic layout by analogy from the command line.

use clap::{Parser, Subcommand, ValueEnum};
use schemalign::partition::{SchematicPartitionProcessor, StepOutcome};
use schemalign::{
    assign, synthesize_graph_edits, AdaptationMode, AssignmentOptions, BpcGraph, Corpus, LayoutCore, LayoutOptions,
    LayoutResult, PartitionOptions, SimilarityMetric, StrategyKind,
};
use std::path::{Path, PathBuf};
use std::process;

#[derive(Parser)]
#[command(name = "schemalign")]
#[command(about = "Schematic layout by analogy with a template corpus", long_about = None)]
#[command(version)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Lay out a floating graph using the closest corpus templates
    Layout {
        /// Floating graph (JSON)
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Directory of laid-out template graphs
        #[arg(short, long, value_name = "DIR")]
        corpus: PathBuf,

        /// Assignment strategy
        #[arg(short, long, value_enum, default_value = "histogram")]
        strategy: StrategyArg,

        /// Strategy tried on the closest template when the first one fails
        #[arg(long, value_enum)]
        fallback: Option<StrategyArg>,

        /// How template positions are carried over
        #[arg(short, long, value_enum, default_value = "rewrite")]
        mode: ModeArg,

        /// Match the whole graph at once instead of per side partition
        #[arg(long)]
        no_partition: bool,

        /// Histogram comparison used for template ranking
        #[arg(long, value_enum, default_value = "jaccard")]
        metric: MetricArg,

        /// Write the laid-out graph to this file
        #[arg(short, long, value_name = "OUT")]
        output: Option<PathBuf>,

        /// Output format
        #[arg(short, long, value_enum, default_value = "human")]
        format: OutputFormat,

        /// Exit with error code if any partition found no template
        #[arg(long)]
        strict: bool,
    },

    /// Split a graph into side partitions
    Partition {
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Print every processing step
        #[arg(long)]
        steps: bool,

        /// Output format
        #[arg(short, long, value_enum, default_value = "human")]
        format: OutputFormat,
    },

    /// Assign a floating graph to one template
    Assign {
        #[arg(value_name = "FLOATING")]
        floating: PathBuf,

        #[arg(value_name = "TEMPLATE")]
        template: PathBuf,

        /// Assignment strategy
        #[arg(short, long, value_enum, default_value = "histogram")]
        strategy: StrategyArg,

        /// Also print the edit operations turning floating into template
        #[arg(long)]
        edits: bool,

        /// Output format
        #[arg(short, long, value_enum, default_value = "human")]
        format: OutputFormat,
    },

    /// WL distance between two graphs
    Distance {
        #[arg(value_name = "A")]
        a: PathBuf,

        #[arg(value_name = "B")]
        b: PathBuf,

        /// Refinement rounds (default: box count of A)
        #[arg(short, long)]
        rounds: Option<usize>,

        #[arg(long, value_enum, default_value = "jaccard")]
        metric: MetricArg,

        /// Output format
        #[arg(short, long, value_enum, default_value = "human")]
        format: OutputFormat,
    },

    /// List the templates of a corpus directory
    Templates {
        #[arg(value_name = "DIR")]
        dir: PathBuf,

        /// Show box, pin and network counts
        #[arg(short, long)]
        long: bool,
    },
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Human-readable output
    Human,
    /// JSON output
    Json,
}

#[derive(Clone, Copy, ValueEnum)]
enum StrategyArg {
    /// Color histograms, exact buckets then greedy
    Histogram,
    /// Weisfeiler-Lehman colour buckets
    WlBucket,
    /// Capped enumeration of box assignments
    Exhaustive,
}

impl From<StrategyArg> for StrategyKind {
    fn from(arg: StrategyArg) -> Self {
        match arg {
            StrategyArg::Histogram => StrategyKind::Histogram,
            StrategyArg::WlBucket => StrategyKind::WlBucket,
            StrategyArg::Exhaustive => StrategyKind::Exhaustive,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum ModeArg {
    /// Rewrite the template under the floating ids
    Rewrite,
    /// Copy positions onto the floating graph
    Inherit,
}

#[derive(Clone, Copy, ValueEnum)]
enum MetricArg {
    Jaccard,
    Cosine,
}

impl From<MetricArg> for SimilarityMetric {
    fn from(arg: MetricArg) -> Self {
        match arg {
            MetricArg::Jaccard => SimilarityMetric::Jaccard,
            MetricArg::Cosine => SimilarityMetric::Cosine,
        }
    }
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        2 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let exit_code = match cli.command {
        Commands::Layout {
            file,
            corpus,
            strategy,
            fallback,
            mode,
            no_partition,
            metric,
            output,
            format,
            strict,
        } => {
            let options = LayoutOptions {
                strategy: strategy.into(),
                fallback: fallback.map(Into::into).or(Some(StrategyKind::Histogram)),
                mode: match mode {
                    ModeArg::Rewrite => AdaptationMode::Rewrite,
                    ModeArg::Inherit => AdaptationMode::Inherit,
                },
                use_partitioning: !no_partition,
                metric: metric.into(),
                ..LayoutOptions::default()
            };
            handle_layout(&file, &corpus, &options, output.as_deref(), format, strict)
        }
        Commands::Partition { file, steps, format } => handle_partition(&file, steps, format),
        Commands::Assign {
            floating,
            template,
            strategy,
            edits,
            format,
        } => handle_assign(&floating, &template, strategy.into(), edits, format),
        Commands::Distance {
            a,
            b,
            rounds,
            metric,
            format,
        } => handle_distance(&a, &b, rounds, metric.into(), format),
        Commands::Templates { dir, long } => handle_templates(&dir, long),
    };

    process::exit(exit_code);
}

fn print_json(value: &serde_json::Value) -> i32 {
    match serde_json::to_string_pretty(value) {
        Ok(text) => {
            println!("{}", text);
            0
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    }
}

fn handle_layout(
    file: &Path,
    corpus: &Path,
    options: &LayoutOptions,
    output: Option<&Path>,
    format: OutputFormat,
    strict: bool,
) -> i32 {
    let result = match LayoutCore::layout_files(file, corpus, options) {
        Ok(result) => result,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };

    if let Some(path) = output {
        if let Err(e) = result.graph.save(path) {
            eprintln!("Error: {}", e);
            return 1;
        }
    }

    let code = match format {
        OutputFormat::Human => {
            output_layout_human(file, &result, output);
            0
        }
        OutputFormat::Json => {
            let mut value = serde_json::json!({
                "file": file.display().to_string(),
                "reports": result.reports,
                "stats": result.stats,
            });
            if output.is_none() {
                value["graph"] = serde_json::to_value(&result.graph).unwrap_or_default();
            }
            print_json(&value)
        }
    };

    if strict && result.matched_pieces() < result.reports.len() {
        return 1;
    }
    code
}

fn output_layout_human(file: &Path, result: &LayoutResult, output: Option<&Path>) {
    println!("\nFile: {}", file.display());
    println!("{}", "─".repeat(60));

    for report in &result.reports {
        match (&report.template, report.distance, report.strategy) {
            (Some(template), Some(distance), Some(strategy)) => println!(
                "  {:<20} -> {} (distance {:.3}, {}, {}/{} boxes)",
                report.label, template, distance, strategy, report.boxes_matched, report.boxes_total
            ),
            _ => println!("  {:<20} -> no template", report.label),
        }
    }

    println!("\n  Summary:");
    println!("    Pieces matched: {}/{}", result.matched_pieces(), result.reports.len());
    println!("    Boxes:          {}", result.stats.box_count);
    println!("    Fixed:          {}", result.stats.fixed_boxes);
    println!("    Floating:       {}", result.stats.floating_boxes);
    if let Some(path) = output {
        println!("\n  Written to {}", path.display());
    }
}

fn handle_partition(file: &Path, steps: bool, format: OutputFormat) -> i32 {
    let graph = match BpcGraph::load(file) {
        Ok(graph) => graph,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };
    let options = PartitionOptions::default();
    let limit = options.max_iterations;
    let mut processor = match SchematicPartitionProcessor::new(&graph, options) {
        Ok(processor) => processor,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };

    while !processor.is_done() {
        if processor.steps() >= limit {
            eprintln!("Error: Iteration limit of {} reached", limit);
            return 1;
        }
        let Some(outcome) = processor.step() else {
            break;
        };
        if steps && matches!(format, OutputFormat::Human) {
            print_step(processor.steps(), &outcome);
        }
    }

    let unplaced: Vec<String> = processor
        .unplaced()
        .into_iter()
        .filter(|key| graph.get_pin(key).map_or(false, |p| !p.is_center()))
        .map(|key| key.to_string())
        .collect();
    let partitions = processor.finish();

    match format {
        OutputFormat::Human => {
            println!("\nFile: {}", file.display());
            println!("{}", "─".repeat(60));
            if partitions.is_empty() {
                println!("  No box has enough pins to seed a partition");
            }
            for partition in &partitions {
                let boxes: Vec<&str> = partition.boxes.iter().map(|b| b.as_str()).collect();
                println!("\n  {} ({} pins)", partition.label(), partition.pins.len());
                println!("    Boxes: {}", boxes.join(", "));
                for (key, holder) in &partition.reserved_keys {
                    println!("    Reserved: {} by {}", key, holder);
                }
            }
            if !unplaced.is_empty() {
                println!("\n  Unplaced pins: {}", unplaced.join(", "));
            }
            0
        }
        OutputFormat::Json => print_json(&serde_json::json!({
            "file": file.display().to_string(),
            "partitions": partitions,
            "unplaced": unplaced,
        })),
    }
}

fn print_step(n: usize, outcome: &StepOutcome) {
    match outcome {
        StepOutcome::Accepted { pin, partition } => println!("  [{}] accept  {} -> p{}", n, pin, partition),
        StepOutcome::Discarded { pin, partition } => println!("  [{}] discard {} (p{})", n, pin, partition),
        StepOutcome::Rejected {
            pin,
            partition,
            key,
            holder,
        } => println!("  [{}] reject  {} (p{}): {} held by {}", n, pin, partition, key, holder),
    }
}

fn handle_assign(floating: &Path, template: &Path, strategy: StrategyKind, edits: bool, format: OutputFormat) -> i32 {
    let (floating_graph, template_graph) = match (BpcGraph::load(floating), BpcGraph::load(template)) {
        (Ok(f), Ok(t)) => (f, t),
        (Err(e), _) | (_, Err(e)) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };

    let assignment = match assign(strategy, &AssignmentOptions::default(), &floating_graph, &template_graph) {
        Ok(assignment) => assignment,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };
    let script = if edits {
        match synthesize_graph_edits(&floating_graph, &template_graph, &assignment) {
            Ok(script) => Some(script),
            Err(e) => {
                eprintln!("Error: {}", e);
                return 1;
            }
        }
    } else {
        None
    };

    match format {
        OutputFormat::Human => {
            println!("\nStrategy: {}", strategy);
            println!("{}", "─".repeat(60));
            println!("\n  Boxes:");
            for (from, to) in &assignment.boxes {
                println!("    {} -> {}", from, to);
            }
            println!("\n  Networks:");
            for (from, to) in &assignment.networks {
                println!("    {} -> {}", from, to);
            }
            println!("\n  Pins:");
            for (from, to) in &assignment.pins {
                println!("    {} -> {}", from, to);
            }
            if let Some(script) = &script {
                println!("\n  Edits:");
                for (kind, count) in script.summary() {
                    println!("    {}: {}", kind, count);
                }
            }
            0
        }
        OutputFormat::Json => {
            let mut value = serde_json::json!({
                "strategy": strategy,
                "assignment": assignment,
            });
            if let Some(script) = &script {
                value["edits"] = serde_json::to_value(&script.operations).unwrap_or_default();
            }
            print_json(&value)
        }
    }
}

fn handle_distance(a: &Path, b: &Path, rounds: Option<usize>, metric: SimilarityMetric, format: OutputFormat) -> i32 {
    let (first, second) = match (BpcGraph::load(a), BpcGraph::load(b)) {
        (Ok(x), Ok(y)) => (x, y),
        (Err(e), _) | (_, Err(e)) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };
    let rounds = rounds.unwrap_or(first.boxes.len());
    let distance = match LayoutCore::distance(&first, &second, rounds, metric) {
        Ok(distance) => distance,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };

    match format {
        OutputFormat::Human => {
            println!("{:.6}", distance);
            0
        }
        OutputFormat::Json => print_json(&serde_json::json!({
            "a": a.display().to_string(),
            "b": b.display().to_string(),
            "rounds": rounds,
            "metric": metric,
            "distance": distance,
        })),
    }
}

fn handle_templates(dir: &Path, long: bool) -> i32 {
    let corpus = match Corpus::from_dir(dir) {
        Ok(corpus) => corpus,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };

    tracing::debug!("Listing {} template(s)", corpus.len());
    println!("Templates in {}:\n", dir.display());
    for (name, graph) in corpus.iter() {
        println!("  {}", name);
        if long {
            let stats = graph.stats();
            println!(
                "    {} boxes, {} pins, {} networks",
                stats.box_count, stats.pin_count, stats.network_count
            );
        }
    }
    0
}
