use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;
use log::{error, info};

use rusty_sampler_chunks::{
    decode_directory, decode_path, DecodeOptions, DecodedFile, LogNotifier, NoSampleData, Result,
};

/// Inspect sampler instrument files: Akai AKP/AKM, Kontakt, SoundFont 2,
/// Yamaha YSFC and Disting EX.
#[derive(Parser, Debug)]
#[command(name = "rusty-chunks", version, about)]
struct Cli {
    /// Files to decode
    files: Vec<PathBuf>,

    /// Decode every file in a directory
    #[arg(short, long, value_name = "DIR")]
    batch: Option<PathBuf>,

    /// Show debug output
    #[arg(short, long)]
    verbose: bool,

    /// Skip CRC32 verification of compressed bodies
    #[arg(long)]
    no_checksum: bool,

    /// Accept RIFF chunk sizes that overrun their parent
    #[arg(long)]
    lenient: bool,
}

impl Cli {
    fn options(&self) -> DecodeOptions {
        DecodeOptions {
            verify_checksums: !self.no_checksum,
            strict_riff_sizes: !self.lenient,
        }
    }
}

fn report(path: &Path, file: &DecodedFile) {
    let name = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    println!("{}: {} ({})", path.display(), file.kind(), file.summary());
    match file.to_multisample(&name, &NoSampleData) {
        Ok(Some(source)) => println!(
            "  {} groups, {} zones",
            source.groups.len(),
            source.zones().count()
        ),
        Ok(None) => {}
        Err(e) => println!("  not mappable: {e}"),
    }
}

fn run_batch(dir: &Path, options: &DecodeOptions, notifier: &LogNotifier) -> Result<usize> {
    let results = decode_directory(dir, options, notifier)?;
    let mut failures = 0;
    for (path, result) in &results {
        match result {
            Ok(file) => report(path, file),
            Err(e) => {
                failures += 1;
                error!("{}: {e}", path.display());
            }
        }
    }
    info!(
        "Batch complete: {} decoded, {failures} failed",
        results.len() - failures
    );
    Ok(failures)
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let options = cli.options();
    let notifier = LogNotifier::new();
    let mut failures = 0;

    if let Some(dir) = &cli.batch {
        match run_batch(dir, &options, &notifier) {
            Ok(count) => failures += count,
            Err(e) => {
                error!("{}: {e}", dir.display());
                failures += 1;
            }
        }
    }

    for path in &cli.files {
        match decode_path(path, &options, &notifier) {
            Ok(file) => report(path, &file),
            Err(e) => {
                error!("{}: {e}", path.display());
                failures += 1;
            }
        }
    }

    if cli.batch.is_none() && cli.files.is_empty() {
        error!("No input files. Use --help for usage information.");
        return ExitCode::FAILURE;
    }
    if failures > 0 { ExitCode::FAILURE } else { ExitCode::SUCCESS }
}
