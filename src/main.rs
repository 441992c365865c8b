use std::io;
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use jardelta::{
    diff, patch, ArchiveSource, Category, Compression, DeltaConfig, DeltaModel, ZipStore,
    MODEL_ENTRY_NAME,
};

#[derive(Parser)]
#[command(name = "jardelta", about = "Delta patches for ZIP and JAR archives", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Log every copied entry
    #[arg(short, long, global = true)]
    verbose: bool,

    /// JSON file with algorithm, digestByteLength and compression settings
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Compute a delta archive from a first and a second archive
    Diff(DiffArgs),
    /// Rebuild the second archive from the first archive and a delta archive
    Patch(PatchArgs),
    /// Print the delta model stored in a delta archive
    Show(ShowArgs),
}

#[derive(Args)]
struct DiffArgs {
    first: PathBuf,
    second: PathBuf,
    delta: PathBuf,
    /// Digest algorithm, e.g. SHA-256
    #[arg(long)]
    algorithm: Option<String>,
    /// Truncate digests to this many bytes
    #[arg(long)]
    digest_length: Option<usize>,
}

#[derive(Args)]
struct PatchArgs {
    first: PathBuf,
    delta: PathBuf,
    second: PathBuf,
    /// Write the second archive as a JAR (manifest first)
    #[arg(long, conflicts_with = "zip")]
    jar: bool,
    /// Write the second archive as a plain ZIP
    #[arg(long)]
    zip: bool,
    /// Entry compression: deflate, stored or zstd
    #[arg(long)]
    compression: Option<Compression>,
}

#[derive(Args)]
struct ShowArgs {
    delta: PathBuf,
}

fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{bytes} B")
    }
}

fn file_size(path: &Path) -> u64 {
    std::fs::metadata(path).map(|m| m.len()).unwrap_or(0)
}

fn cmd_diff(config: DeltaConfig, args: DiffArgs) -> anyhow::Result<()> {
    let config = DeltaConfig {
        algorithm: args.algorithm.unwrap_or(config.algorithm),
        digest_byte_length: args.digest_length.or(config.digest_byte_length),
        ..config
    };
    let digest = config.message_digest()?;
    let delta = ZipStore::zip(&args.delta).with_compression(config.compression);

    let model = diff(
        &ZipStore::for_path(&args.first),
        &ZipStore::for_path(&args.second),
        &delta,
        digest,
    )
    .with_context(|| format!("computing delta of {:?} and {:?}", args.first, args.second))?;

    println!(
        "{}: {} changed, {} unchanged, {} added, {} removed ({})",
        args.delta.display(),
        model.count(Category::Changed),
        model.count(Category::Unchanged),
        model.count(Category::Added),
        model.count(Category::Removed),
        format_bytes(file_size(&args.delta)),
    );
    Ok(())
}

fn cmd_patch(config: DeltaConfig, args: PatchArgs) -> anyhow::Result<()> {
    let second = if args.jar {
        ZipStore::jar(&args.second)
    } else if args.zip {
        ZipStore::zip(&args.second)
    } else {
        ZipStore::for_path(&args.second)
    };
    let second = second.with_compression(args.compression.unwrap_or(config.compression));

    let stats = patch(
        &ZipStore::for_path(&args.first),
        &ZipStore::zip(&args.delta),
        &second,
    )
    .with_context(|| format!("patching {:?}", args.first))?;

    println!(
        "{}: {} entries written ({})",
        args.second.display(),
        stats.entries(),
        format_bytes(file_size(&args.second)),
    );
    Ok(())
}

fn cmd_show(args: ShowArgs) -> anyhow::Result<()> {
    let mut input = ZipStore::zip(&args.delta).open()?;
    let model: DeltaModel = jardelta::engine::load_model(&mut input)
        .with_context(|| format!("reading {MODEL_ENTRY_NAME} from {:?}", args.delta))?;
    println!("{}", model.to_json()?);
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    let config = DeltaConfig::load_or_default(cli.config.as_deref())
        .context("loading configuration")?;

    match cli.command {
        Command::Diff(args) => cmd_diff(config, args),
        Command::Patch(args) => cmd_patch(config, args),
        Command::Show(args) => cmd_show(args),
    }
}
