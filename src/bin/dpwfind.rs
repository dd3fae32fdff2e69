// DPW1 CLI entry point.
//
// Runs the bounded-window dynamic program on two raw note lists and
// writes the best chain length plus the full memo matrix as JSON.
//
// Usage:
//   dpwfind <pattern> <target> <output> [--window N]
//   dpwfind --stream <target> [--window N]

use std::io::Read;
use std::path::PathBuf;

use clap::Parser;
use tracing::info;

use motif_search::{MatchError, dpw, score::{load_notes, parse_notes}};

#[derive(Parser)]
#[command(name = "dpwfind", about = "Bounded-window DP melodic search (DPW1)")]
struct Args {
    /// Pattern, target, and output paths; with --stream just the target path.
    #[arg(value_name = "PATH", required = true)]
    paths: Vec<PathBuf>,

    /// Read the pattern from stdin and write results to stdout.
    #[arg(long)]
    stream: bool,

    /// Maximum consecutive skipped target notes between matches.
    #[arg(long, value_name = "N", default_value_t = dpw::DEFAULT_TARGET_WINDOW)]
    window: usize,

    /// Enable debug-level tracing.
    #[arg(short, long)]
    verbose: bool,
}

fn main() {
    let args = Args::parse();
    init_tracing(args.verbose);

    if let Err(e) = run(&args) {
        eprintln!("dpwfind: {e}");
        std::process::exit(1);
    }
}

fn run(args: &Args) -> Result<(), MatchError> {
    let expected = if args.stream { 1 } else { 3 };
    if args.paths.len() != expected {
        eprintln!(
            "dpwfind: expected {expected} path argument(s), got {}",
            args.paths.len()
        );
        std::process::exit(2);
    }

    let (pattern, target_path, output_path) = if args.stream {
        let mut text = String::new();
        std::io::stdin()
            .read_to_string(&mut text)
            .map_err(|e| MatchError::io("<stdin>", e))?;
        (parse_notes(&text)?, &args.paths[0], None)
    } else {
        (load_notes(&args.paths[0])?, &args.paths[1], Some(&args.paths[2]))
    };
    let target = load_notes(target_path)?;
    info!(
        pattern_len = pattern.len(),
        target_len = target.len(),
        window = args.window,
        "loaded note lists"
    );

    let report = dpw::search(&pattern, &target, args.window).report();
    info!(best = report.best, "search complete");

    let json = serde_json::to_string(&report)?;
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
