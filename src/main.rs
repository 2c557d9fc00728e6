use std::fs::{self, File};
use std::io::{self, BufReader, Write};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueHint};
use log::info;
use serde::Serialize;

use trajview::pipeline::{self, ProcessingResult};
use trajview::{CleaningConfig, Encoding, ProcessingOptions};

#[derive(Parser, Debug)]
#[command(author, version, about = "Flight trajectory CSV interpreter", long_about = None)]
struct Cli {
    /// Force a text encoding (utf-8, latin-1, cp1252, iso-8859-1, utf-16)
    #[arg(long, global = true)]
    encoding: Option<String>,

    /// Processing options as a JSON file
    #[arg(long, global = true, value_hint = ValueHint::FilePath)]
    options: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Column mapping, per-column statistics and trajectory metrics
    Analyze(InputArgs),
    /// Apply cleaning operations and report what changed
    Clean(CleanArgs),
    /// Downsampled point series for display
    Project(ProjectArgs),
    /// Analysis and point series in one pass
    Process(ProjectArgs),
}

#[derive(Parser, Debug)]
struct InputArgs {
    /// Trajectory file (.csv, .txt, ...)
    #[arg(value_hint = ValueHint::FilePath)]
    input: PathBuf,
}

#[derive(Parser, Debug)]
struct CleanArgs {
    #[command(flatten)]
    input: InputArgs,

    /// Cleaning configuration JSON (every operation off when omitted)
    #[arg(long, value_hint = ValueHint::FilePath)]
    config: Option<PathBuf>,

    /// Write the cleaned CSV here
    #[arg(short, long, value_hint = ValueHint::FilePath)]
    output: Option<PathBuf>,
}

#[derive(Parser, Debug)]
struct ProjectArgs {
    #[command(flatten)]
    input: InputArgs,

    /// Take every Nth row instead of the automatic sampling factor
    #[arg(long)]
    rate: Option<usize>,
}

/// Combined output of `process`.
#[derive(Serialize)]
struct ProcessOutput {
    analysis: ProcessingResult<pipeline::AnalysisPayload>,
    projection: ProcessingResult<pipeline::ProjectionPayload>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let opts = match &cli.options {
        Some(path) => {
            let json = fs::read_to_string(path)
                .with_context(|| format!("reading options {}", path.display()))?;
            ProcessingOptions::from_json_str(&json)
                .with_context(|| format!("parsing options {}", path.display()))?
        }
        None => ProcessingOptions::default(),
    };
    let forced = match cli.encoding.as_deref() {
        Some(label) => match Encoding::from_label(label) {
            Some(encoding) => Some(encoding),
            None => bail!("unknown encoding '{label}'"),
        },
        None => None,
    };

    match cli.command {
        Command::Analyze(args) => {
            let result = analyze(&args, forced, &opts)?;
            emit(&result)?;
            fail_on(&result)
        }
        Command::Clean(args) => {
            let config = match &args.config {
                Some(path) => {
                    let json = fs::read_to_string(path)
                        .with_context(|| format!("reading cleaning config {}", path.display()))?;
                    CleaningConfig::from_json_str(&json)
                        .with_context(|| format!("parsing cleaning config {}", path.display()))?
                }
                None => CleaningConfig::default(),
            };
            let Input { name, size, source } = Input::open(&args.input.input, &opts)?;
            let result = match source {
                Source::Bytes(bytes) => {
                    pipeline::clean_bytes(&bytes, &name, forced, &config, &opts)
                }
                Source::Stream(file) => {
                    pipeline::clean_reader(file, size, &name, forced, &config, &opts)
                }
            };
            if let (Some(path), Some(payload)) = (&args.output, result.ok()) {
                match &payload.cleaning.cleaned_content {
                    Some(csv) => {
                        fs::write(path, csv)
                            .with_context(|| format!("writing {}", path.display()))?;
                        info!("Wrote cleaned data to {}", path.display());
                    }
                    None => info!("Nothing left after cleaning, {} not written", path.display()),
                }
            }
            emit(&result)?;
            fail_on(&result)
        }
        Command::Project(args) => {
            let result = project(&args, forced, &opts)?;
            emit(&result)?;
            fail_on(&result)
        }
        Command::Process(args) => {
            let analysis = analyze(&args.input, forced, &opts)?;
            let projection = project(&args, forced, &opts)?;
            let failed = projection.failure().cloned();
            emit(&ProcessOutput { analysis, projection })?;
            match failed {
                Some(failure) => bail!("{}: {}", failure.error, failure.message),
                None => Ok(()),
            }
        }
    }
}

fn analyze(
    args: &InputArgs,
    forced: Option<Encoding>,
    opts: &ProcessingOptions,
) -> Result<ProcessingResult<pipeline::AnalysisPayload>> {
    let Input { name, size, source } = Input::open(&args.input, opts)?;
    Ok(match source {
        Source::Bytes(bytes) => pipeline::analyze_bytes(&bytes, &name, forced, opts),
        Source::Stream(file) => pipeline::analyze_reader(file, size, &name, forced, opts),
    })
}

fn project(
    args: &ProjectArgs,
    forced: Option<Encoding>,
    opts: &ProcessingOptions,
) -> Result<ProcessingResult<pipeline::ProjectionPayload>> {
    let Input { name, size, source } = Input::open(&args.input.input, opts)?;
    Ok(match source {
        Source::Bytes(bytes) => pipeline::process_bytes(&bytes, &name, forced, args.rate, opts),
        Source::Stream(file) => {
            pipeline::process_reader(file, size, &name, forced, args.rate, opts)
        }
    })
}

enum Source {
    Bytes(Vec<u8>),
    Stream(BufReader<File>),
}

/// An input file, read whole when small and streamed when large.
struct Input {
    name: String,
    size: u64,
    source: Source,
}

impl Input {
    fn open(path: &Path, opts: &ProcessingOptions) -> Result<Self> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        trajview::data::loader::check_extension(&name)?;

        let size = fs::metadata(path)
            .with_context(|| format!("reading metadata of {}", path.display()))?
            .len();
        let source = if opts.is_large(size) {
            let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
            Source::Stream(BufReader::new(file))
        } else {
            Source::Bytes(fs::read(path).with_context(|| format!("reading {}", path.display()))?)
        };
        Ok(Input { name, size, source })
    }
}

fn emit<T: Serialize>(value: &T) -> Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    serde_json::to_writer_pretty(&mut out, value).context("writing JSON output")?;
    writeln!(out)?;
    Ok(())
}

fn fail_on<T>(result: &ProcessingResult<T>) -> Result<()> {
    match result.failure() {
        Some(failure) => bail!("{}: {}", failure.error, failure.message),
        None => Ok(()),
    }
}
