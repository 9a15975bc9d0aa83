//! Command-line driver for batch mask review.
//!
//! ```text
//! maskreview <mask> [--overview out.png] [--report] [--ledger ledger.csv] [--config config.json]
//! ```
//!
//! Loads a mask, builds its overview overlay in the background while
//! printing progress, and optionally runs connectivity analysis, pre-flagging
//! defective objects into a ledger file.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use maskreview::{ReviewConfig, ReviewSession};

const USAGE: &str =
    "Usage: maskreview <mask> [--overview out.png] [--report] [--ledger ledger.csv] [--config config.json]";

/// Parsed command-line options.
#[derive(Debug, Default)]
struct CliOptions {
    mask: PathBuf,
    overview: Option<PathBuf>,
    report: bool,
    ledger: Option<PathBuf>,
    config: Option<PathBuf>,
}

impl CliOptions {
    fn parse(mut args: impl Iterator<Item = String>) -> Result<Self, String> {
        let mut options = Self::default();
        let mut mask = None;
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--overview" => options.overview = Some(Self::value(&mut args, &arg)?.into()),
                "--ledger" => options.ledger = Some(Self::value(&mut args, &arg)?.into()),
                "--config" => options.config = Some(Self::value(&mut args, &arg)?.into()),
                "--report" => options.report = true,
                "-h" | "--help" => return Err(USAGE.to_string()),
                other if other.starts_with("--") => {
                    return Err(format!("Unknown option '{}'\n{}", other, USAGE));
                }
                other => {
                    if mask.replace(PathBuf::from(other)).is_some() {
                        return Err(format!("Only one mask can be given\n{}", USAGE));
                    }
                }
            }
        }
        options.mask = mask.ok_or_else(|| USAGE.to_string())?;
        Ok(options)
    }

    fn value(args: &mut impl Iterator<Item = String>, flag: &str) -> Result<String, String> {
        args.next()
            .ok_or_else(|| format!("Missing value for {}\n{}", flag, USAGE))
    }
}

fn run(options: &CliOptions, config: &ReviewConfig) -> Result<(), Box<dyn std::error::Error>> {
    let mut session = ReviewSession::open(&options.mask, config)?;
    println!(
        "{}: {}x{} mask, {} objects",
        options.mask.display(),
        session.mask().width(),
        session.mask().height(),
        session.registry().len()
    );

    let mut last_progress = None;
    while !session.wait_for_overview(Duration::from_millis(50))? {
        if session.overview_progress() != last_progress {
            last_progress = session.overview_progress();
            if let Some(percent) = last_progress {
                println!("Building overview: {}%", percent);
            }
        }
    }
    println!("Overview ready");

    if let Some(path) = &options.overview
        && let Some(overview) = &session.layers().overview
    {
        overview.save_png(path)?;
        println!("Wrote overview to {}", path.display());
    }

    if options.report || options.ledger.is_some() {
        session.request_connectivity()?;
        while !session.wait_for_connectivity(Duration::from_secs(1))? {
            log::debug!("Waiting for connectivity analysis");
        }
    }

    if options.report
        && let Some(report) = session.connectivity()
    {
        println!("{} flagged objects", report.len());
        for (id, defect) in report.iter() {
            let points: Vec<String> = defect
                .centroids
                .iter()
                .map(|(x, y)| format!("({}, {})", x, y))
                .collect();
            println!("  object {}: {} at {}", id, defect.describe(), points.join(" "));
        }
    }

    if let Some(path) = &options.ledger {
        let flagged = session.flag_defects();
        session.save_ledger(path)?;
        println!(
            "Pre-flagged {} objects, {}; ledger written to {}",
            flagged,
            session.progress_label(),
            path.display()
        );
    }

    Ok(())
}

fn main() -> ExitCode {
    let options = match CliOptions::parse(std::env::args().skip(1)) {
        Ok(options) => options,
        Err(message) => {
            eprintln!("{}", message);
            return ExitCode::from(2);
        }
    };

    let config = match &options.config {
        Some(path) => match ReviewConfig::load(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Failed to load config {}: {}", path.display(), e);
                return ExitCode::from(2);
            }
        },
        None => ReviewConfig::load_from_default_path(),
    };

    env_logger::Builder::new()
        .filter_level(config.log_level.to_level_filter())
        .parse_default_env()
        .init();

    match run(&options, &config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{}", e);
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
