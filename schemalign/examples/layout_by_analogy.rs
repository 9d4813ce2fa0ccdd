//! Lay out a floating graph against a corpus directory and print where
//! each box ended up.

use schemalign::prelude::*;
use std::path::Path;

fn main() -> Result<(), SchemalignError> {
    let mut args = std::env::args().skip(1);
    let (Some(file), Some(corpus_dir)) = (args.next(), args.next()) else {
        eprintln!("Usage: cargo run --example layout_by_analogy <floating.json> <corpus-dir>");
        std::process::exit(1);
    };

    let floating = BpcGraph::load(Path::new(&file))?;
    let corpus = Corpus::from_dir(Path::new(&corpus_dir))?;
    println!("Loaded {} template(s)", corpus.len());

    let result = LayoutCore::layout_by_analogy(&floating, &corpus, &LayoutOptions::default())?;

    for report in &result.reports {
        match &report.template {
            Some(template) => println!(
                "{}: {} ({}/{} boxes)",
                report.label, template, report.boxes_matched, report.boxes_total
            ),
            None => println!("{}: unmatched", report.label),
        }
    }
    println!();

    for bx in &result.graph.boxes {
        match bx.center() {
            Some(c) => println!("  {:<8} ({:>7.2}, {:>7.2})", bx.box_id.as_str(), c.x, c.y),
            None => println!("  {:<8} floating", bx.box_id.as_str()),
        }
    }

    Ok(())
}
