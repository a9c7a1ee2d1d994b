use std::io::{self, Write};
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use koi_model::Artifacts;
use koi_pipeline::{analyze, explain, explain_named, AnalysisBundle, Narrative, NarrativeConfig};
use koi_table::RawTable;
use koic::report::{render_inspect, render_json, render_text, write_csv};
use koic::{Config, OutputFormat};

const EXIT_PIPELINE: i32 = 1;
const EXIT_USAGE: i32 = 2;

#[derive(Debug, Parser)]
#[command(
    name = "koic",
    version,
    about = "Classify Kepler Objects of Interest and explain each prediction",
    long_about = "koic runs the trained KOI classifier over a CSV export of candidates.\n\n\
        Missing columns and empty cells are filled from the training means and\n\
        reported; every prediction comes with a confidence and per-field attributions.\n\n\
        EXAMPLES:\n\
        \n  koic analyze cumulative.csv                      Classify every candidate\n\
        \n  koic analyze cumulative.csv --explain K00752.01  Explain one candidate\n\
        \n  koic analyze cumulative.csv --format csv         Write results as CSV\n\
        \n  koic inspect --artifacts ./artifacts             Show the loaded model"
)]
struct Cli {
    /// Increase verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Classify the candidates in a CSV file
    Analyze(AnalyzeArgs),
    /// Describe the trained artifacts
    Inspect(ArtifactArgs),
}

#[derive(Debug, Args, Clone)]
struct ArtifactArgs {
    /// Directory holding model.json, schema.json and imputation.json
    #[arg(long, value_name = "DIR")]
    artifacts: Option<PathBuf>,

    /// Config file (defaults to ./koi.toml when present)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,
}

#[derive(Debug, Args, Clone)]
struct AnalyzeArgs {
    /// CSV export of KOI candidates
    #[arg(value_name = "CSV")]
    input: PathBuf,

    #[command(flatten)]
    artifacts: ArtifactArgs,

    /// Output format
    #[arg(long, value_enum)]
    format: Option<OutputFormat>,

    /// Explain the candidate with this kepoi_name (repeatable)
    #[arg(long, value_name = "NAME")]
    explain: Vec<String>,

    /// Explain every candidate
    #[arg(long, conflicts_with = "explain")]
    explain_all: bool,

    /// Smallest attribution worth mentioning in an explanation
    #[arg(long, value_name = "X")]
    threshold: Option<f64>,

    /// Do not verify that attributions add up to the predicted probabilities
    #[arg(long)]
    skip_additivity_check: bool,
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    let _ = env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .try_init();
}

fn load_artifacts(args: &ArtifactArgs) -> Result<(Config, Artifacts), i32> {
    let config = Config::discover(args.config.as_deref()).map_err(|e| {
        eprintln!("error: {e}");
        EXIT_USAGE
    })?;
    let paths = config.artifact_paths(args.artifacts.as_deref());
    let artifacts = Artifacts::load(&paths).map_err(|e| {
        eprintln!("error: {e}");
        EXIT_USAGE
    })?;
    Ok((config, artifacts))
}

fn narratives(
    bundle: &AnalysisBundle,
    args: &AnalyzeArgs,
    config: &NarrativeConfig,
) -> Result<Vec<Narrative>, koi_pipeline::PipelineError> {
    if args.explain_all {
        (0..bundle.len()).map(|i| explain(bundle, i, config)).collect()
    } else {
        args.explain
            .iter()
            .map(|name| explain_named(bundle, name, config))
            .collect()
    }
}

fn run_analyze(args: &AnalyzeArgs) -> i32 {
    if let Some(t) = args.threshold {
        if !t.is_finite() || t < 0.0 {
            eprintln!("error: --threshold must be a non-negative number, got {t}");
            return EXIT_USAGE;
        }
    }
    let (config, artifacts) = match load_artifacts(&args.artifacts) {
        Ok(loaded) => loaded,
        Err(rc) => return rc,
    };

    let table = match RawTable::from_csv_path(&args.input) {
        Ok(t) => t,
        Err(e) => {
            eprintln!("error: cannot read '{}': {e}", args.input.display());
            return EXIT_PIPELINE;
        }
    };
    log::info!(
        "read {} candidates, {} columns from {}",
        table.n_rows(),
        table.columns().len(),
        args.input.display()
    );

    let options = config.analysis_options(args.skip_additivity_check);
    let bundle = match analyze(&table, &artifacts, &options) {
        Ok(b) => b,
        Err(e) => {
            eprintln!("error: analysis failed: {e}");
            return EXIT_PIPELINE;
        }
    };

    let explained = match narratives(&bundle, args, &config.narrative(args.threshold)) {
        Ok(n) => n,
        Err(e) => {
            eprintln!("error: {e}");
            return EXIT_USAGE;
        }
    };

    let stdout = io::stdout();
    let written = match config.format(args.format) {
        OutputFormat::Text => write!(stdout.lock(), "{}", render_text(&bundle, &explained)),
        OutputFormat::Json => match render_json(&bundle, &explained) {
            Ok(json) => writeln!(stdout.lock(), "{json}"),
            Err(e) => Err(io::Error::other(e)),
        },
        OutputFormat::Csv => {
            if !explained.is_empty() {
                log::warn!("explanations are not included in CSV output");
            }
            write_csv(&bundle, stdout.lock()).map_err(io::Error::other)
        }
    };
    if let Err(e) = written {
        eprintln!("error: failed to write output: {e}");
        return EXIT_PIPELINE;
    }
    0
}

fn run_inspect(args: &ArtifactArgs) -> i32 {
    match load_artifacts(args) {
        Ok((_, artifacts)) => {
            print!("{}", render_inspect(&artifacts));
            0
        }
        Err(rc) => rc,
    }
}

fn run_cli() -> i32 {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    match &cli.command {
        Command::Analyze(args) => run_analyze(args),
        Command::Inspect(args) => run_inspect(args),
    }
}

fn main() {
    std::process::exit(run_cli());
}
