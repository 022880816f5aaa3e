//! category_check - validate a category table against a detector label list
//!
//! Exits 0 when the table is complete and consistent, 2 on a configuration
//! error, 1 on any other failure (unreadable files and the like).

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;

use navcue::category::load_table;
use navcue::PipelineError;

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Category table (TOML). Defaults to the built-in COCO table.
    #[arg(long, env = "NAVCUE_CATEGORIES")]
    categories: Option<PathBuf>,
    /// Detector label file, one label per line. Requires --categories.
    #[arg(long, env = "NAVCUE_LABELS")]
    labels: Option<PathBuf>,
    /// Print every label with its tier and thresholds.
    #[arg(long)]
    verbose: bool,
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let args = Args::parse();
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("category_check: {:#}", e);
            match e.downcast_ref::<PipelineError>() {
                Some(PipelineError::Configuration(_)) => ExitCode::from(2),
                _ => ExitCode::FAILURE,
            }
        }
    }
}

fn run(args: &Args) -> Result<()> {
    let table = load_table(args.categories.as_deref(), args.labels.as_deref())?;

    println!("ok: {} labels in {} tiers", table.len(), table.tiers().len());
    for tier in table.tiers() {
        println!(
            "  tier {} {:<20} {:>3} labels  cooldown {}ms",
            tier.tier, tier.name, tier.labels, tier.cooldown_ms
        );
    }
    if args.verbose {
        for (index, label) in table.labels().iter().enumerate() {
            if let Some(c) = table.category_at(index) {
                println!(
                    "  {:>3} {:<16} tier {} conf>={:.2} gap>{:.2} size>={:.2}",
                    index,
                    label,
                    c.tier,
                    c.confidence_threshold,
                    c.min_score_gap,
                    c.min_relative_size
                );
            }
        }
    }
    Ok(())
}
