//! p4kit CLI - Command-line tool for P4K archive extraction.
//!
//! This is the main entry point for the p4kit command-line application.

mod logger;

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;

use p4kit::archive::{P4kWriteEntry, P4kWriteOptions, P4kWriter};
use p4kit::dds::MergeWarning;
use p4kit::diff::{ComparisonStatus, DiffSummary};
use p4kit::prelude::*;

use logger::{BarProgress, CliLogger};

/// p4kit - P4K archive extraction tool
#[derive(Parser)]
#[command(name = "p4kit")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// More output (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only print warnings and errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Entry selection shared by listing and extraction.
#[derive(clap::Args)]
struct FilterArgs {
    /// Filter pattern (glob-style, case-insensitive, `/` separators)
    #[arg(short, long)]
    filter: Option<String>,

    /// Filter regular expression, applied to `/`-separated paths
    #[arg(long)]
    regex: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// List contents of a P4K archive
    P4kList {
        /// Path to the P4K file
        #[arg(short, long, env = "INPUT_P4K")]
        p4k: PathBuf,

        #[command(flatten)]
        filter: FilterArgs,

        /// Show detailed information
        #[arg(short, long)]
        detailed: bool,
    },

    /// Extract files from a P4K archive
    P4kExtract {
        /// Path to the P4K file
        #[arg(short, long, env = "INPUT_P4K")]
        p4k: PathBuf,

        /// Output directory
        #[arg(short, long, env = "OUTPUT_FOLDER")]
        output: PathBuf,

        #[command(flatten)]
        filter: FilterArgs,

        /// Also extract matching entries from nested .socpak/.pak containers
        #[arg(long)]
        nested: bool,

        /// Extract on all cores
        #[arg(long, env = "USE_PARALLEL")]
        parallel: bool,

        /// Extract on this many threads
        #[arg(long, conflicts_with = "parallel")]
        threads: Option<usize>,

        /// Keep files that already exist in the output directory
        #[arg(long)]
        skip_existing: bool,
    },

    /// Compare two P4K archives
    P4kDiff {
        /// Previous archive
        #[arg(long, env = "DIFF_AGAINST")]
        previous: PathBuf,

        /// Current archive
        #[arg(long, env = "INPUT_P4K")]
        current: PathBuf,

        /// Print unchanged files too
        #[arg(long)]
        all: bool,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Merge split DDS files extracted to disk, or a texture inside a P4K
    DdsMerge {
        /// Input DDS file (base file without .N suffix), or its archive path
        /// when --p4k is given
        #[arg(short, long)]
        input: String,

        /// Read the texture from this archive
        #[arg(long)]
        p4k: Option<PathBuf>,

        /// Output DDS file
        #[arg(short, long)]
        output: PathBuf,

        #[arg(long, value_enum, default_value_t = Layout::Concatenate)]
        layout: Layout,

        /// Fail when the mip chain has gaps, and ignore ambiguous suffixes
        #[arg(long)]
        strict: bool,
    },

    /// Reassemble every texture of a P4K archive
    DdsExtract {
        /// Path to the P4K file
        #[arg(short, long, env = "INPUT_P4K")]
        p4k: PathBuf,

        /// Output directory
        #[arg(short, long, env = "OUTPUT_FOLDER")]
        output: PathBuf,

        /// Only textures added or modified since this archive (a .p4k file,
        /// or a directory holding one)
        #[arg(long, env = "DIFF_AGAINST")]
        diff_against: Option<PathBuf>,

        #[command(flatten)]
        filter: FilterArgs,

        #[arg(long, value_enum, default_value_t = Layout::Concatenate)]
        layout: Layout,

        /// Reassemble on all cores
        #[arg(long, env = "USE_PARALLEL")]
        parallel: bool,
    },

    /// Save the DataCore and localization of a P4K archive as .zst files
    DatacoreSave {
        /// Path to the P4K file
        #[arg(short, long, env = "INPUT_P4K")]
        p4k: PathBuf,

        /// Output directory
        #[arg(short, long, env = "OUTPUT_FOLDER")]
        output: PathBuf,
    },

    /// Pack a directory into a P4K archive
    P4kPack {
        /// Directory to pack
        #[arg(short, long)]
        input: PathBuf,

        /// Output archive
        #[arg(short, long)]
        output: PathBuf,

        #[arg(long, value_enum, default_value_t = Method::Zstd)]
        method: Method,

        /// Encrypt every entry
        #[arg(long)]
        encrypt: bool,

        /// Write ZIP64 records even for small archives
        #[arg(long)]
        zip64: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Layout {
    Concatenate,
    MipOrder,
}

impl From<Layout> for ChainLayout {
    fn from(layout: Layout) -> Self {
        match layout {
            Layout::Concatenate => ChainLayout::Concatenate,
            Layout::MipOrder => ChainLayout::MipOrder,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum Method {
    Store,
    Deflate,
    Zstd,
}

impl From<Method> for CompressionMethod {
    fn from(method: Method) -> Self {
        match method {
            Method::Store => CompressionMethod::Store,
            Method::Deflate => CompressionMethod::Deflate,
            Method::Zstd => CompressionMethod::Zstd,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let level = match (cli.quiet, cli.verbose) {
        (true, _) => log::LevelFilter::Warn,
        (false, 0) => log::LevelFilter::Info,
        (false, 1) => log::LevelFilter::Debug,
        (false, _) => log::LevelFilter::Trace,
    };
    let logger = CliLogger::install(level).context("Failed to install logger")?;

    match cli.command {
        Commands::P4kList { p4k, filter, detailed } => {
            cmd_p4k_list(&p4k, &filter, detailed)?;
        }
        Commands::P4kExtract {
            p4k,
            output,
            filter,
            nested,
            parallel,
            threads,
            skip_existing,
        } => {
            let parallelism = match threads {
                Some(threads) => Parallelism::Threads(threads),
                None => Parallelism::from_flag(parallel),
            };
            let overwrite = if skip_existing {
                Overwrite::SkipExisting
            } else {
                Overwrite::Always
            };
            let config = ExtractConfig::new(output)
                .with_parallelism(parallelism)
                .with_overwrite(overwrite);
            cmd_p4k_extract(&logger, &p4k, &config, &filter, nested)?;
        }
        Commands::P4kDiff {
            previous,
            current,
            all,
            json,
        } => {
            cmd_p4k_diff(&previous, &current, all, json)?;
        }
        Commands::DdsMerge {
            input,
            p4k,
            output,
            layout,
            strict,
        } => {
            let options = MergeOptions {
                layout: layout.into(),
                ..Default::default()
            };
            cmd_dds_merge(&input, p4k.as_deref(), &output, &options, strict)?;
        }
        Commands::DdsExtract {
            p4k,
            output,
            diff_against,
            filter,
            layout,
            parallel,
        } => {
            let config = ExtractConfig::new(output).with_parallelism(Parallelism::from_flag(parallel));
            let options = MergeOptions {
                layout: layout.into(),
                ..Default::default()
            };
            cmd_dds_extract(&logger, &p4k, diff_against.as_deref(), &config, &options, &filter)?;
        }
        Commands::DatacoreSave { p4k, output } => {
            cmd_datacore_save(&p4k, &output)?;
        }
        Commands::P4kPack {
            input,
            output,
            method,
            encrypt,
            zip64,
        } => {
            cmd_p4k_pack(&logger, &input, &output, method.into(), encrypt, zip64)?;
        }
    }

    Ok(())
}

fn open_archive(path: &Path) -> Result<P4kArchive> {
    let start = Instant::now();
    let archive = P4kArchive::open(path)
        .with_context(|| format!("Failed to open P4K archive {}", path.display()))?;
    log::info!(
        "Loaded {} entries from {} in {:?}",
        archive.entry_count(),
        path.display(),
        start.elapsed()
    );
    Ok(archive)
}

/// Compiled `--filter` / `--regex` pair.
struct EntryFilter {
    pattern: Option<glob::Pattern>,
    regex: Option<regex::Regex>,
}

impl EntryFilter {
    const MATCH_OPTIONS: glob::MatchOptions = glob::MatchOptions {
        case_sensitive: false,
        require_literal_separator: false,
        require_literal_leading_dot: false,
    };

    fn new(args: &FilterArgs) -> Result<Self> {
        let pattern = args
            .filter
            .as_deref()
            .map(glob::Pattern::new)
            .transpose()
            .context("Invalid filter pattern")?;
        let regex = args
            .regex
            .as_deref()
            .map(regex::Regex::new)
            .transpose()
            .context("Invalid filter regex")?;
        Ok(Self { pattern, regex })
    }

    fn matches(&self, name: &str) -> bool {
        let display = p4kit::common::path::to_display(name);
        self.pattern
            .as_ref()
            .map_or(true, |p| p.matches_with(&display, Self::MATCH_OPTIONS))
            && self.regex.as_ref().map_or(true, |r| r.is_match(&display))
    }
}

fn bar(logger: &CliLogger, len: usize) -> Result<ProgressBar> {
    let pb = logger.add_bar(ProgressBar::new(len as u64));
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}")?
            .progress_chars("#>-"),
    );
    Ok(pb)
}

fn cmd_p4k_list(p4k_path: &Path, filter: &FilterArgs, detailed: bool) -> Result<()> {
    let archive = open_archive(p4k_path)?;
    let filter = EntryFilter::new(filter)?;

    let mut count = 0;
    for entry in archive.iter().filter(|e| filter.matches(e.name())) {
        if detailed {
            println!(
                "{:>12} {:>12} {:>8} {:08x} {} {}",
                entry.compressed_size(),
                entry.uncompressed_size(),
                entry.compression_method().to_string(),
                entry.crc32(),
                if entry.is_encrypted() { "E" } else { " " },
                entry.name()
            );
        } else {
            println!("{}", entry.name());
        }
        count += 1;
    }

    println!("\nTotal: {} entries", count);

    Ok(())
}

fn cmd_p4k_extract(
    logger: &CliLogger,
    p4k_path: &Path,
    config: &ExtractConfig,
    filter: &FilterArgs,
    nested: bool,
) -> Result<()> {
    let archive = open_archive(p4k_path)?;
    let filter = EntryFilter::new(filter)?;

    let items = if nested {
        p4kit::extract::collect_nested(&archive, |e| filter.matches(e.name()))
    } else {
        p4kit::extract::collect(&archive, |e| filter.matches(e.name()))
    };

    log::info!("Extracting {} entries to {}", items.len(), config.output_dir.display());

    let start = Instant::now();
    let progress = BarProgress::new(bar(logger, items.len())?);
    let report = p4kit::extract::extract(&items, config, &NoDocumentDecoder, &progress)
        .context("Extraction failed")?;

    print_report("Extraction", &report, start);
    Ok(())
}

#[derive(Serialize)]
struct DiffRecord<'a> {
    path: &'a str,
    status: ComparisonStatus,
    previous_size: Option<u64>,
    current_size: Option<u64>,
}

#[derive(Serialize)]
struct DiffOutput<'a> {
    summary: DiffSummary,
    files: Vec<DiffRecord<'a>>,
}

fn cmd_p4k_diff(previous: &Path, current: &Path, all: bool, json: bool) -> Result<()> {
    let previous = open_archive(previous)?;
    let current = open_archive(current)?;

    let root = compare(&previous, &current);
    let files: Vec<DiffRecord> = root
        .all_files()
        .into_iter()
        .filter(|node| all || node.status.is_change())
        .map(|node| DiffRecord {
            path: &node.path,
            status: node.status,
            previous_size: node.left.as_ref().map(|e| e.uncompressed_size()),
            current_size: node.right.as_ref().map(|e| e.uncompressed_size()),
        })
        .collect();
    let summary = root.summary();

    if json {
        let output = DiffOutput { summary, files };
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    for record in &files {
        let marker = match record.status {
            ComparisonStatus::Added => '+',
            ComparisonStatus::Removed => '-',
            ComparisonStatus::Modified => '~',
            ComparisonStatus::Unchanged => ' ',
        };
        println!("{marker} {}", record.path);
    }
    println!(
        "\n{} added, {} removed, {} modified, {} unchanged",
        summary.added, summary.removed, summary.modified, summary.unchanged
    );

    Ok(())
}

fn cmd_dds_merge(
    input: &str,
    p4k: Option<&Path>,
    output: &Path,
    options: &MergeOptions,
    strict: bool,
) -> Result<()> {
    log::info!("Merging DDS: {} -> {}", input, output.display());

    let merged = match p4k {
        Some(p4k_path) => {
            let fs = P4kFileSystem::new(open_archive(p4k_path)?);
            if strict {
                p4kit::dds::merge_strict(input, &fs, options)
            } else {
                p4kit::dds::merge_with(input, &fs, options)
            }
        }
        None => {
            let mut options = options.clone();
            options.rule.strict = strict;
            p4kit::dds::merge_files(input, &options)
        }
    }
    .context("Failed to merge DDS files")?;

    let gaps = merged
        .warnings
        .iter()
        .filter(|w| matches!(w, MergeWarning::MissingMip(_)))
        .count();
    if strict && gaps > 0 {
        bail!("Mip chain of {input} has {gaps} missing levels");
    }

    fs::write(output, &merged.data).context("Failed to write output file")?;
    log::info!("Merged {} parts ({} bytes)", merged.chain.len(), merged.data.len());

    Ok(())
}

fn cmd_dds_extract(
    logger: &CliLogger,
    p4k_path: &Path,
    diff_against: Option<&Path>,
    config: &ExtractConfig,
    options: &MergeOptions,
    filter: &FilterArgs,
) -> Result<()> {
    let fs = P4kFileSystem::new(open_archive(p4k_path)?);
    let filter = EntryFilter::new(filter)?;

    let previous = diff_against.and_then(|path| {
        let found = p4kit::external::locate_previous_archive(path);
        if found.is_none() {
            log::warn!("Previous P4K not found at {}, reassembling every texture", path.display());
        }
        found
    });
    let names = match previous {
        Some(previous) => {
            let previous = open_archive(&previous)?;
            let root = compare(&previous, fs.archive());
            p4kit::textures::changed_textures(&root, &fs, &options.rule)
        }
        None => p4kit::textures::base_textures(&fs, &options.rule),
    };
    let names: Vec<String> = names.into_iter().filter(|name| filter.matches(name)).collect();

    log::info!("Reassembling {} textures to {}", names.len(), config.output_dir.display());

    let start = Instant::now();
    let progress = BarProgress::new(bar(logger, names.len())?);
    let report = p4kit::textures::extract_textures(&fs, &names, config, options, &Passthrough, &progress)
        .context("Texture extraction failed")?;

    print_report("Texture extraction", &report, start);
    Ok(())
}

fn cmd_datacore_save(p4k_path: &Path, output: &Path) -> Result<()> {
    let fs = P4kFileSystem::new(open_archive(p4k_path)?);

    let datacore = p4kit::external::locate_datacore(&fs).context("No DataCore found in archive")?;
    let written = p4kit::archive_file::save_entry_zstd(&fs, &datacore, output)
        .with_context(|| format!("Failed to save {datacore}"))?;
    log::info!("Saved {datacore} ({written} bytes)");

    match p4kit::external::locate_localization(&fs) {
        Some(localization) => {
            let written = p4kit::archive_file::save_entry_zstd(&fs, &localization, output)
                .with_context(|| format!("Failed to save {localization}"))?;
            log::info!("Saved {localization} ({written} bytes)");
        }
        None => log::warn!("No localization found in archive"),
    }

    Ok(())
}

fn cmd_p4k_pack(
    logger: &CliLogger,
    input: &Path,
    output: &Path,
    method: CompressionMethod,
    encrypt: bool,
    zip64: bool,
) -> Result<()> {
    let files: Vec<walkdir::DirEntry> = walkdir::WalkDir::new(input)
        .sort_by_file_name()
        .into_iter()
        .collect::<std::result::Result<Vec<_>, _>>()
        .with_context(|| format!("Failed to walk {}", input.display()))?
        .into_iter()
        .filter(|e| e.file_type().is_file())
        .collect();

    let options = P4kWriteOptions {
        force_zip64: zip64,
        ..Default::default()
    };
    let mut writer = P4kWriter::create(output, options)
        .with_context(|| format!("Failed to create {}", output.display()))?;

    let start = Instant::now();
    let pb = bar(logger, files.len())?;
    for file in &files {
        let relative = file.path().strip_prefix(input)?;
        let name = p4kit::common::path::to_archive_name(&relative.to_string_lossy());
        let data = fs::read(file.path()).with_context(|| format!("Failed to read {}", file.path().display()))?;

        writer
            .add(P4kWriteEntry::new(name, data).with_method(method).encrypted(encrypt))
            .with_context(|| format!("Failed to add {}", file.path().display()))?;
        pb.inc(1);
    }
    let count = writer.len();
    writer.finish().context("Failed to finish archive")?;

    pb.finish_with_message("Done");
    log::info!("Packed {count} files into {} in {:?}", output.display(), start.elapsed());
    Ok(())
}

fn print_report(label: &str, report: &BatchReport, start: Instant) {
    log::info!(
        "{label} completed in {:?}: {} succeeded ({} skipped), {} failed",
        start.elapsed(),
        report.succeeded,
        report.skipped,
        report.failed
    );
    for failure in report.failures.iter().take(20) {
        log::warn!("  {}: {}", failure.name, failure.error);
    }
    if report.failures.len() > 20 {
        log::warn!("  ... and {} more", report.failures.len() - 20);
    }
}
