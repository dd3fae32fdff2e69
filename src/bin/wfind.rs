// W-algorithm CLI entry point.
//
// Finds occurrences of an indexed pattern score inside an indexed target
// score and writes them as a JSON array.
//
// Usage:
//   wfind <pattern> <target> <output> [--diatonic] [--max-steps N]
//   wfind --stream <target> [--diatonic] [--max-steps N]
//
// With --stream the pattern is read from stdin and the occurrence list is
// written to stdout; the target is still read from its file path.

use std::io::Read;
use std::path::PathBuf;

use clap::Parser;
use tracing::info;

use motif_search::{MatchError, MatchFeature, Score, SweepConfig, find_occurrences};

#[derive(Parser)]
#[command(name = "wfind", about = "Geometric melodic pattern search (W algorithm)")]
struct Args {
    /// Pattern, target, and output paths; with --stream just the target path.
    #[arg(value_name = "PATH", required = true)]
    paths: Vec<PathBuf>,

    /// Read the pattern from stdin and write results to stdout.
    #[arg(long)]
    stream: bool,

    /// Match on diatonic steps instead of exact semitone intervals.
    #[arg(long)]
    diatonic: bool,

    /// Abort after this many sweep steps.
    #[arg(long, value_name = "N")]
    max_steps: Option<u64>,

    /// Enable debug-level tracing.
    #[arg(short, long)]
    verbose: bool,
}

fn main() {
    let args = Args::parse();
    init_tracing(args.verbose);

    if let Err(e) = run(&args) {
        eprintln!("wfind: {e}");
        std::process::exit(1);
    }
}

fn run(args: &Args) -> Result<(), MatchError> {
    let expected = if args.stream { 1 } else { 3 };
    if args.paths.len() != expected {
        eprintln!(
            "wfind: expected {expected} path argument(s), got {}",
            args.paths.len()
        );
        std::process::exit(2);
    }

    let feature = if args.diatonic {
        MatchFeature::Diatonic
    } else {
        MatchFeature::PitchInterval
    };

    let (pattern, target_path, output_path) = if args.stream {
        let mut text = String::new();
        std::io::stdin()
            .read_to_string(&mut text)
            .map_err(|e| MatchError::io("<stdin>", e))?;
        (Score::parse(&text, feature)?, &args.paths[0], None)
    } else {
        (
            Score::load(&args.paths[0], feature)?,
            &args.paths[1],
            Some(&args.paths[2]),
        )
    };
    let target = Score::load(target_path, feature)?;
    info!(
        pattern_notes = pattern.num_notes,
        target_notes = target.num_notes,
        target_vectors = target.vectors.len(),
        ?feature,
        "loaded scores"
    );

    let config = SweepConfig {
        max_steps: args.max_steps,
    };
    let occurrences = find_occurrences(&pattern, &target, &config)?;
    info!(occurrences = occurrences.len(), "search complete");

    let json = serde_json::to_string(&occurrences)?;
    match output_path {
        Some(path) => {
            std::fs::write(path, json).map_err(|e| MatchError::io(path.display().to_string(), e))?
        }
        None => println!("{json}"),
    }
    Ok(())
}

fn init_tracing(verbose: bool) {
    let level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()),
        )
        .with_writer(std::io::stderr)
        .init();
}
