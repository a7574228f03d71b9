//! noxdir — terminal disk-usage analyser.
//!
//! Thin frontend over the `noxdir-core` engine: parses the flag surface,
//! merges persisted settings, runs a scan (or lists volumes), and prints
//! plain-text summaries. Interactive rendering lives in a separate
//! frontend; this binary consumes the same engine API.

mod cli;
mod shell;

use anyhow::{Context, Result};
use clap::Parser;
use cli::Cli;
use noxdir_core::analysis::{TopDirs, TopFiles};
use noxdir_core::cache::Cache;
use noxdir_core::config::{self, Settings};
use noxdir_core::filter::{
    entry_passes, EmptyDirFilter, EntryFilter, FileInfoFilter, HiddenFilter, SizeBand,
};
use noxdir_core::model::size::{format_count, format_size};
use noxdir_core::model::EntryKind;
use noxdir_core::platform::{self, SortKey};
use noxdir_core::scanner::progress::ScanProgress;
use noxdir_core::scanner::{start_scan, ScanOptions};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            // One line on stdout, non-zero exit.
            println!("{err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    if let Some(command) = cli.command {
        return shell::run(command);
    }

    let settings = merge_settings(&cli)?;
    let base = build_scan_options(&cli, &settings)?;

    match &cli.root {
        Some(root) => scan_root(root, &base, &settings),
        None => show_drives(),
    }
}

fn setup_logging(verbose: bool) {
    let default = if verbose {
        "noxdir=debug,noxdir_core=debug"
    } else {
        "warn"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Persisted settings with CLI flags layered on top.
fn merge_settings(cli: &Cli) -> Result<Settings> {
    let mut settings = config::load_settings()?;

    if !cli.exclude.is_empty() {
        settings.exclude = cli.exclude.clone();
    }
    if cli.no_hidden {
        settings.no_hidden = true;
    }
    if cli.no_empty_dirs {
        settings.no_empty_dirs = true;
    }
    if cli.use_cache {
        settings.use_cache = true;
    }
    if cli.simple_color {
        settings.simple_color = true;
    }
    if let Some(schema) = &cli.color_schema {
        settings.color_schema = schema.to_string_lossy().into_owned();
    }

    Ok(settings)
}

fn build_scan_options(cli: &Cli, settings: &Settings) -> Result<ScanOptions> {
    let mut filters: Vec<Arc<dyn FileInfoFilter>> = Vec::new();

    if let Some(expr) = &cli.size_limit {
        let band = SizeBand::parse(expr).context("invalid value for size-limit flag")?;
        filters.push(Arc::new(band));
    }
    if settings.no_hidden {
        filters.push(Arc::new(HiddenFilter));
    }

    let mut options = ScanOptions::new(PathBuf::new())
        .with_exclude(settings.exclude.iter().cloned())
        .with_file_filters(filters);

    if settings.use_cache || cli.clear_cache {
        let cache = Cache::new(settings.path.clone(), cli.clear_cache, true)
            .context("open scan cache")?;
        options = options.with_cache(Arc::new(cache));
    }

    Ok(options)
}

/// Scan a user-supplied root and print the summary tables.
fn scan_root(root: &std::path::Path, base: &ScanOptions, settings: &Settings) -> Result<()> {
    let trimmed = root
        .to_string_lossy()
        .trim_end_matches(['/', '\\'])
        .to_string();
    let root =
        std::path::absolute(PathBuf::from(trimmed)).context("resolve absolute root path")?;

    let handle = start_scan(base.clone_for_root(root.clone()).partial_root(true));

    let mut errors: Vec<String> = Vec::new();
    for message in handle.progress_rx.iter() {
        match message {
            ScanProgress::Update {
                files_found,
                dirs_found,
                total_size,
                ..
            } => {
                eprint!(
                    "\rscanning… {} dirs, {} files, {}   ",
                    format_count(dirs_found),
                    format_count(files_found),
                    format_size(total_size),
                );
            }
            ScanProgress::Error { path, message } => {
                errors.push(format!("{path}: {message}"));
            }
            ScanProgress::Complete { .. } | ScanProgress::Cancelled => break,
        }
    }
    eprintln!();

    let render_filters = render_filters(settings);

    {
        let mut tree = handle.live_tree.write();
        let root_id = tree.root();
        tree.sort_children_by_size(root_id);
    }

    let tree = handle.live_tree.read();
    let root_id = tree.root();
    let root_entry = tree.node(root_id);

    println!("PATH  {}", root.display());
    println!(
        "SIZE  {}   DIRS  {}   FILES  {}   ERRORS  {}",
        format_size(root_entry.size),
        format_count(root_entry.total_dirs),
        format_count(root_entry.total_files),
        errors.len(),
    );
    println!();
    println!(
        "{:<40} {:>12} {:>12} {:>12} {:>9}",
        "NAME", "SIZE", "DIRS", "FILES", "USAGE"
    );

    for child in tree.entries(root_id, EntryKind::All) {
        if !entry_passes(&tree, child, &render_filters) {
            continue;
        }

        let entry = tree.node(child);
        let usage = if root_entry.size > 0 {
            entry.size as f64 / root_entry.size as f64 * 100.0
        } else {
            0.0
        };
        let (dirs, files) = if entry.is_dir {
            (
                format_count(entry.total_dirs),
                format_count(entry.total_files),
            )
        } else {
            (String::new(), String::new())
        };

        println!(
            "{:<40} {:>12} {:>12} {:>12} {:>8.2}%",
            entry.file_name(),
            format_size(entry.size),
            dirs,
            files,
            usage,
        );
    }

    print_top_entries(&tree, root_id);

    if !errors.is_empty() {
        eprintln!();
        for error in &errors {
            eprintln!("  {error}");
        }
    }

    handle.persist_cache()?;
    Ok(())
}

fn render_filters(settings: &Settings) -> Vec<Box<dyn EntryFilter>> {
    let mut filters: Vec<Box<dyn EntryFilter>> = Vec::new();
    if settings.no_empty_dirs {
        filters.push(Box::new(EmptyDirFilter));
    }
    filters
}

fn print_top_entries(tree: &noxdir_core::model::DirTree, root_id: noxdir_core::model::EntryId) {
    let mut top_files = TopFiles::default();
    top_files.scan(tree, root_id);

    if !top_files.is_empty() {
        println!();
        println!("TOP FILES");
        for (size, id) in top_files.into_sorted() {
            println!("  {:>12}  {}", format_size(size), tree.full_path(id).display());
        }
    }

    let mut top_dirs = TopDirs::default();
    top_dirs.scan(tree, root_id);

    if !top_dirs.is_empty() {
        println!();
        println!("TOP DIRS");
        for (local_size, id) in top_dirs.into_sorted() {
            println!(
                "  {:>12}  {}",
                format_size(local_size),
                tree.full_path(id).display()
            );
        }
    }
}

/// Print the volumes table, device header rows above their mounts.
fn show_drives() -> Result<()> {
    let volumes = platform::list_volumes().context("enumerate volumes")?;

    println!(
        "{:<28} {:<16} {:<8} {:>12} {:>12} {:>12} {:>9}",
        "PATH", "VOLUME", "FS", "TOTAL", "USED", "FREE", "USAGE"
    );

    for info in volumes.sorted(SortKey::UsedPercent, true) {
        let marker = if info.is_device_row { "⛃ " } else { "  " };
        println!(
            "{marker}{:<26} {:<16} {:<8} {:>12} {:>12} {:>12} {:>8.2}%",
            info.path.display(),
            info.volume_label,
            info.fs_name,
            format_size(info.total_bytes as i64),
            format_size(info.used_bytes as i64),
            format_size(info.free_bytes as i64),
            info.used_percent,
        );
    }

    println!();
    println!(
        "CAPACITY  {}   USED  {}   FREE  {}",
        format_size(volumes.total_capacity as i64),
        format_size(volumes.total_used as i64),
        format_size(volumes.total_free as i64),
    );

    Ok(())
}
