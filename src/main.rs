// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Shoebox: Local Photo Library Manager
//!
//! Command-line front-end over the library session API.

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tokio::signal;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use shoebox::config::{default_config_path, AppConfig};
use shoebox::db::{DeletionState, PhotoFilter, PhotoRecord, SortOrder};
use shoebox::metadata::video;
use shoebox::import::{DeletedContentPolicy, ImportControl, ImportOptions, ImportStage, ImportStatus};
use shoebox::organizer::{CollisionPolicy, TransferMode};
use shoebox::{LibrarySession, MediaType};

/// Shoebox CLI - Local Photo Library Manager
#[derive(Parser, Debug)]
#[command(name = "shoebox")]
#[command(author = "Jonathan D. A. Jewell <hyperpolymath>")]
#[command(version)]
#[command(about = "Deduplicating photo library organized by capture date", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file (JSON format)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Library root (overrides the configured default)
    #[arg(short = 'L', long, global = true)]
    library: Option<PathBuf>,

    /// Enable verbose logging (debug level)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Enable trace logging (most verbose)
    #[arg(long, global = true)]
    trace: bool,

    /// Output format for results
    #[arg(long, global = true, default_value = "text", value_parser = ["text", "json", "jsonl"])]
    format: String,

    /// Suppress non-essential output (quiet mode)
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create a new library
    Create {
        /// Library root (default: --library or the configured default)
        root: Option<PathBuf>,

        /// Remember this library as the default in the config file
        #[arg(long)]
        set_default: bool,
    },

    /// Import files, directories or glob patterns
    Import {
        /// Sources to import
        #[arg(required = true)]
        sources: Vec<PathBuf>,

        /// Remove sources after they are safely cataloged
        #[arg(long = "move")]
        move_files: bool,

        /// Do not generate thumbnails
        #[arg(long)]
        no_thumbnails: bool,

        /// Naming rule when a different file already has the name
        #[arg(long, value_enum)]
        collision: Option<CollisionArg>,

        /// Treat content of deleted photos as duplicates
        #[arg(long)]
        skip_deleted: bool,

        /// Do not descend into subdirectories
        #[arg(long)]
        no_recursive: bool,

        /// Parallel analysis workers
        #[arg(short, long)]
        workers: Option<usize>,
    },

    /// List photos
    List {
        /// Earliest capture date (YYYY-MM-DD)
        #[arg(long)]
        from: Option<NaiveDate>,

        /// Latest capture date (YYYY-MM-DD)
        #[arg(long)]
        to: Option<NaiveDate>,

        /// Only this media type (image, video, other)
        #[arg(long = "type")]
        media_type: Option<MediaType>,

        /// File name contains
        #[arg(long)]
        name: Option<String>,

        /// Show deleted photos instead of active ones
        #[arg(long, conflicts_with = "all")]
        deleted: bool,

        /// Show active and deleted photos
        #[arg(long)]
        all: bool,

        #[arg(long, value_enum, default_value = "captured-desc")]
        sort: SortArg,

        /// Maximum rows (default: ui.page_size)
        #[arg(short, long)]
        limit: Option<usize>,

        #[arg(long, default_value = "0")]
        offset: usize,
    },

    /// Show one photo
    Show {
        id: i64,
    },

    /// Soft-delete photos (files are kept until purge)
    Delete {
        #[arg(required = true)]
        ids: Vec<i64>,
    },

    /// Permanently remove deleted photos and their files
    Purge {
        /// Skip confirmation
        #[arg(long)]
        force: bool,
    },

    /// Check library files against the catalog
    Verify,

    /// Show library statistics
    Stats,

    /// Generate missing thumbnails
    Thumbnails {
        /// Regenerate every thumbnail
        #[arg(long)]
        force: bool,
    },

    /// Library settings stored in the catalog
    Setting {
        #[command(subcommand)]
        action: SettingCommands,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigCommands,
    },

    /// Remove a stale library lock
    Unlock {
        root: Option<PathBuf>,
    },
}

#[derive(Subcommand, Debug)]
enum SettingCommands {
    Get { key: String },
    Set { key: String, value: String },
    Unset { key: String },
    List,
}

#[derive(Subcommand, Debug)]
enum ConfigCommands {
    /// Show current configuration
    Show,

    /// Generate default configuration file
    Generate {
        /// Output file path
        #[arg(short, long, default_value = "shoebox.json")]
        output: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Validate configuration file
    Validate,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum CollisionArg {
    Counter,
    HashSuffix,
}

impl From<CollisionArg> for CollisionPolicy {
    fn from(arg: CollisionArg) -> Self {
        match arg {
            CollisionArg::Counter => CollisionPolicy::Counter,
            CollisionArg::HashSuffix => CollisionPolicy::HashSuffix,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum SortArg {
    CapturedDesc,
    CapturedAsc,
    ImportedDesc,
    ImportedAsc,
}

impl From<SortArg> for SortOrder {
    fn from(arg: SortArg) -> Self {
        match arg {
            SortArg::CapturedDesc => SortOrder::CapturedDesc,
            SortArg::CapturedAsc => SortOrder::CapturedAsc,
            SortArg::ImportedDesc => SortOrder::ImportedDesc,
            SortArg::ImportedAsc => SortOrder::ImportedAsc,
        }
    }
}

/// Output format for results
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Format {
    Text,
    Json,
    Jsonl,
}

impl Format {
    fn parse(raw: &str) -> Self {
        match raw {
            "json" => Self::Json,
            "jsonl" => Self::Jsonl,
            _ => Self::Text,
        }
    }
}

/// Print a list of items in the requested format
fn emit<T: Serialize>(format: Format, items: &[T], text: impl Fn(&T) -> String) -> Result<()> {
    match format {
        Format::Text => {
            for item in items {
                println!("{}", text(item));
            }
        }
        Format::Json => println!("{}", serde_json::to_string_pretty(items)?),
        Format::Jsonl => {
            for item in items {
                println!("{}", serde_json::to_string(item)?);
            }
        }
    }
    Ok(())
}

/// Print a single value in the requested format
fn emit_one<T: Serialize>(format: Format, item: &T, text: impl Fn(&T) -> String) -> Result<()> {
    match format {
        Format::Text => println!("{}", text(item)),
        Format::Json => println!("{}", serde_json::to_string_pretty(item)?),
        Format::Jsonl => println!("{}", serde_json::to_string(item)?),
    }
    Ok(())
}

struct AppContext {
    config: AppConfig,
    config_path: PathBuf,
    library: Option<PathBuf>,
    format: Format,
    quiet: bool,
}

impl AppContext {
    fn library_root(&self, explicit: Option<&Path>) -> Result<PathBuf> {
        explicit
            .map(Path::to_path_buf)
            .or_else(|| self.config.resolve_library(self.library.as_deref()))
            .context("No library given; use --library or set library.default_root in the config")
    }

    async fn open(&self, options: ImportOptions) -> Result<LibrarySession> {
        let root = self.library_root(None)?;
        LibrarySession::open(&root, options)
            .await
            .with_context(|| format!("Failed to open library at {:?}", root))
    }

    async fn open_read_only(&self) -> Result<LibrarySession> {
        let root = self.library_root(None)?;
        LibrarySession::open_read_only(&root)
            .await
            .with_context(|| format!("Failed to open library at {:?}", root))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.trace {
        "trace"
    } else if cli.verbose {
        "debug"
    } else if cli.quiet {
        "warn"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config_path = cli.config.clone().unwrap_or_else(default_config_path);
    let config = AppConfig::load(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;
    // `config` subcommands report problems themselves
    if !matches!(cli.command, Commands::Config { .. }) {
        check_config(&config, &config_path)?;
    }

    let ctx = AppContext {
        config,
        config_path,
        library: cli.library.clone(),
        format: Format::parse(&cli.format),
        quiet: cli.quiet,
    };

    match cli.command {
        Commands::Create { root, set_default } => run_create(ctx, root, set_default).await,
        Commands::Import {
            sources,
            move_files,
            no_thumbnails,
            collision,
            skip_deleted,
            no_recursive,
            workers,
        } => {
            let mut options = ctx.config.import_options();
            if move_files {
                options.transfer_mode = TransferMode::Move;
            }
            if no_thumbnails {
                options.generate_thumbnails = false;
            }
            if let Some(collision) = collision {
                options.collision_policy = collision.into();
            }
            if skip_deleted {
                options.deleted_content_policy = DeletedContentPolicy::Skip;
            }
            if no_recursive {
                options.recursive = false;
            }
            if let Some(workers) = workers {
                options.workers = workers.max(1);
            }
            run_import(&ctx, options, sources).await
        }
        Commands::List {
            from,
            to,
            media_type,
            name,
            deleted,
            all,
            sort,
            limit,
            offset,
        } => {
            let deletion = if all {
                DeletionState::All
            } else if deleted {
                DeletionState::Deleted
            } else {
                DeletionState::Active
            };
            let filter = PhotoFilter {
                from,
                to,
                media_type,
                deletion,
                filename_contains: name,
                limit: Some(limit.unwrap_or(ctx.config.ui.page_size)),
                offset,
            };
            run_list(&ctx, filter, sort.into()).await
        }
        Commands::Show { id } => run_show(&ctx, id).await,
        Commands::Delete { ids } => run_delete(&ctx, ids).await,
        Commands::Purge { force } => run_purge(&ctx, force).await,
        Commands::Verify => run_verify(&ctx).await,
        Commands::Stats => run_stats(&ctx).await,
        Commands::Thumbnails { force } => run_thumbnails(&ctx, force).await,
        Commands::Setting { action } => run_setting(&ctx, action).await,
        Commands::Config { action } => run_config_command(&ctx, action),
        Commands::Unlock { root } => {
            let root = ctx.library_root(root.as_deref())?;
            if LibrarySession::force_unlock(&root)? {
                println!("Removed lock from {:?}", root);
            } else {
                println!("Library {:?} was not locked", root);
            }
            Ok(())
        }
    }
}

/// Refuse to run with settings that would fail later (e.g. a bad date format)
fn check_config(config: &AppConfig, path: &Path) -> Result<()> {
    let problems = config.validate();
    if problems.is_empty() {
        return Ok(());
    }
    bail!("Invalid configuration in {:?}: {}", path, problems.join("; "))
}

/// Create a library
async fn run_create(mut ctx: AppContext, root: Option<PathBuf>, set_default: bool) -> Result<()> {
    let root = ctx.library_root(root.as_deref())?;
    let session = LibrarySession::create(&root, ctx.config.import_options())
        .await
        .with_context(|| format!("Failed to create library at {:?}", root))?;
    let id = session.info().id;
    session.close().await;

    ctx.config.remember_library(&root);
    if set_default {
        ctx.config.library.default_root = Some(root.clone());
    }
    ctx.config
        .save(&ctx.config_path)
        .with_context(|| format!("Failed to save config to {:?}", ctx.config_path))?;

    if !ctx.quiet {
        println!("Created library {} at {:?}", id, root);
    }
    Ok(())
}

/// Import sources, cancelling cooperatively on Ctrl+C
async fn run_import(ctx: &AppContext, options: ImportOptions, sources: Vec<PathBuf>) -> Result<()> {
    let session = ctx.open(options).await?;

    let (progress_tx, mut progress_rx) = mpsc::unbounded_channel();
    let control = ImportControl::new().with_progress(progress_tx);

    // Setup graceful shutdown
    let canceller = control.clone();
    tokio::spawn(async move {
        tokio::select! {
            result = signal::ctrl_c() => {
                if result.is_ok() {
                    warn!("Received Ctrl+C, finishing the current file and stopping...");
                    canceller.cancel();
                }
            }
            _ = canceller.cancelled() => {}
        }
    });

    let quiet = ctx.quiet;
    let reporter = tokio::spawn(async move {
        while let Some(event) = progress_rx.recv().await {
            if event.stage == ImportStage::Cataloged && !quiet {
                debug!("[{}/{}] {:?}", event.index + 1, event.total, event.source);
            }
        }
    });

    let summary = session.import_files(&sources, &control).await;
    // The batch is over; cancelling now only releases the Ctrl+C watcher
    control.cancel();
    drop(control);
    let summary = summary?;

    if !ctx.quiet && session.options().generate_thumbnails {
        info!("Waiting for thumbnails...");
    }
    session.close().await;
    let _ = reporter.await;

    emit(ctx.format, &summary.outcomes, |o| match &o.status {
        ImportStatus::Imported { id, path } => format!("imported   #{:<6} {:?} -> {}", id, o.source, path),
        ImportStatus::Duplicate { existing_id } => {
            format!("duplicate  #{:<6} {:?}", existing_id, o.source)
        }
        ImportStatus::Failed { stage, error } => {
            format!("FAILED     ({})  {:?}: {}", stage, o.source, error)
        }
        ImportStatus::Cancelled => format!("cancelled          {:?}", o.source),
    })?;

    if ctx.format == Format::Text && !ctx.quiet {
        println!(
            "\n{} imported, {} duplicates, {} failed, {} cancelled",
            summary.imported(),
            summary.duplicates(),
            summary.failed(),
            summary.cancelled()
        );
    }
    if summary.failed() > 0 {
        std::process::exit(2);
    }
    Ok(())
}

fn describe(record: &PhotoRecord, date_format: &str) -> String {
    let when = record
        .captured_at
        .map(|t| t.format(date_format).to_string())
        .unwrap_or_else(|| "-".to_string());
    let deleted = if record.is_deleted { " [DELETED]" } else { "" };
    format!("{:>6}  {:<16}  {:<5}  {}{}", record.id, when, record.media_type.as_str(), record.path, deleted)
}

async fn run_list(ctx: &AppContext, filter: PhotoFilter, order: SortOrder) -> Result<()> {
    let session = ctx.open_read_only().await?;
    let photos = session.list_photos(&filter, order).await?;
    let date_format = ctx.config.ui.date_format.clone();
    emit(ctx.format, &photos, |p| describe(p, &date_format))?;
    if ctx.format == Format::Text && !ctx.quiet {
        println!("\n{} photos", photos.len());
    }
    Ok(())
}

async fn run_show(ctx: &AppContext, id: i64) -> Result<()> {
    let session = ctx.open_read_only().await?;
    let Some(photo) = session.get_photo(id).await? else {
        bail!("Photo {} not found", id);
    };
    let absolute = session.absolute_path(&photo);
    emit_one(ctx.format, &photo, |p| {
        let mut out = describe(p, &ctx.config.ui.date_format);
        out.push_str(&format!("\n  file:     {:?}", absolute));
        out.push_str(&format!("\n  original: {}", p.original_path));
        out.push_str(&format!("\n  hash:     {}", p.content_hash));
        out.push_str(&format!("\n  size:     {} bytes", p.size_bytes));
        if let Some(meta) = p.parsed_metadata() {
            if let Some(camera) = &meta.camera {
                out.push_str(&format!("\n  camera:   {}", camera));
            }
            if let Some((w, h)) = meta.display_dimensions() {
                out.push_str(&format!("\n  size px:  {}x{}", w, h));
            }
            if let Some(gps) = meta.gps {
                out.push_str(&format!("\n  gps:      {:.6}, {:.6}", gps.latitude, gps.longitude));
            }
        }
        if let Some(thumb) = &p.thumbnail_path {
            out.push_str(&format!("\n  thumb:    {}", thumb));
        }
        out
    })
}

async fn run_delete(ctx: &AppContext, ids: Vec<i64>) -> Result<()> {
    let session = ctx.open(ctx.config.import_options()).await?;
    let mut failures = 0;
    for id in ids {
        match session.delete_photo(id).await {
            Ok(()) => {
                if !ctx.quiet {
                    println!("Deleted photo {}", id);
                }
            }
            Err(e) => {
                failures += 1;
                eprintln!("Could not delete {}: {}", id, e);
            }
        }
    }
    session.close().await;
    if failures > 0 {
        bail!("{} photos could not be deleted", failures);
    }
    Ok(())
}

async fn run_purge(ctx: &AppContext, force: bool) -> Result<()> {
    if !force {
        eprintln!("Use --force to permanently remove deleted photos");
        return Ok(());
    }
    let session = ctx.open(ctx.config.import_options()).await?;
    let report = session.purge_deleted().await?;
    if report.records > 0 {
        session.compact().await.context("Failed to compact catalog")?;
    }
    session.close().await;
    emit_one(ctx.format, &report, |r| {
        format!(
            "Purged {} records ({} files, {} thumbnails removed)",
            r.records, r.files_removed, r.thumbnails_removed
        )
    })
}

async fn run_verify(ctx: &AppContext) -> Result<()> {
    let session = ctx.open_read_only().await?;
    let report = session.verify().await?;
    emit_one(ctx.format, &report, |r| {
        let mut out = format!("Checked {} photos", r.checked);
        for issue in &r.missing_files {
            out.push_str(&format!("\n  missing   #{} {}: {}", issue.id, issue.path, issue.detail));
        }
        for issue in &r.hash_mismatches {
            out.push_str(&format!("\n  corrupt   #{} {}: {}", issue.id, issue.path, issue.detail));
        }
        for issue in &r.misplaced {
            out.push_str(&format!("\n  misplaced #{} {}: {}", issue.id, issue.path, issue.detail));
        }
        if !r.missing_thumbnails.is_empty() {
            out.push_str(&format!(
                "\n  {} thumbnails missing (run `shoebox thumbnails`)",
                r.missing_thumbnails.len()
            ));
        }
        if r.is_clean() {
            out.push_str("\nLibrary is consistent");
        }
        out
    })?;
    if !report.is_clean() {
        std::process::exit(1);
    }
    Ok(())
}

async fn run_stats(ctx: &AppContext) -> Result<()> {
    let session = ctx.open_read_only().await?;
    let stats = session.stats().await?;
    let date_format = ctx.config.ui.date_format.clone();
    emit_one(ctx.format, &stats, |s| {
        let mut out = String::from("Library Statistics:");
        out.push_str(&format!("\n  Photos:   {}", s.active));
        out.push_str(&format!("\n  Deleted:  {}", s.deleted));
        out.push_str(&format!("\n  Size:     {:.1} MiB", s.total_bytes as f64 / (1024.0 * 1024.0)));
        for (media_type, count) in &s.by_media_type {
            out.push_str(&format!("\n  {:<8}  {}", media_type, count));
        }
        if let Some(latest) = s.latest_import {
            out.push_str(&format!("\n  Last import:   {}", latest.format(&date_format)));
        }
        if let Some(oldest) = s.oldest_capture {
            out.push_str(&format!("\n  Oldest photo:  {}", oldest.format(&date_format)));
        }
        out.push_str(&format!("\n  No thumbnail:  {}", s.missing_thumbnails));
        out
    })
}

async fn run_thumbnails(ctx: &AppContext, force: bool) -> Result<()> {
    let session = ctx.open(ctx.config.import_options()).await?;
    let queued = session.rebuild_thumbnails(force).await?;
    session.wait_for_thumbnails().await;
    let stats = session.stats().await?;
    session.close().await;
    if !ctx.quiet {
        println!(
            "Queued {} thumbnails; {} photos still without one",
            queued, stats.missing_thumbnails
        );
    }
    Ok(())
}

async fn run_setting(ctx: &AppContext, action: SettingCommands) -> Result<()> {
    match action {
        SettingCommands::Get { key } => {
            let session = ctx.open_read_only().await?;
            match session.get_config(&key).await? {
                Some(value) => println!("{}", value),
                None => bail!("Setting {:?} is not set", key),
            }
        }
        SettingCommands::Set { key, value } => {
            let session = ctx.open(ctx.config.import_options()).await?;
            session.set_config(&key, &value).await?;
            session.close().await;
        }
        SettingCommands::Unset { key } => {
            let session = ctx.open(ctx.config.import_options()).await?;
            let removed = session.delete_config(&key).await?;
            session.close().await;
            if !removed {
                bail!("Setting {:?} is not set", key);
            }
        }
        SettingCommands::List => {
            let session = ctx.open_read_only().await?;
            let entries = session.list_config().await?;
            emit(ctx.format, &entries, |e| format!("{} = {}", e.key, e.value))?;
        }
    }
    Ok(())
}

/// Run config commands
fn run_config_command(ctx: &AppContext, action: ConfigCommands) -> Result<()> {
    match action {
        ConfigCommands::Show => {
            let json = serde_json::to_string_pretty(&ctx.config)?;
            println!("{}", json);
        }
        ConfigCommands::Generate { output, force } => {
            if output.exists() && !force {
                bail!("{:?} already exists. Use --force to overwrite", output);
            }
            AppConfig::default().save(&output)?;
            println!("Generated config at {:?}", output);
        }
        ConfigCommands::Validate => {
            let problems = ctx.config.validate();
            if problems.is_empty() {
                println!("Configuration at {:?} is valid", ctx.config_path);
                if let Some(root) = &ctx.config.library.default_root {
                    println!("  Default library: {:?}", root);
                }
                println!("  Transfer mode:   {:?}", ctx.config.import.transfer_mode);
                println!("  Workers:         {}", ctx.config.import.workers);
                if !video::ffprobe_available() {
                    println!("  ffprobe not found: video capture dates fall back to file times");
                }
            } else {
                for problem in &problems {
                    eprintln!("  {}", problem);
                }
                bail!("Configuration at {:?} has {} problems", ctx.config_path, problems.len());
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_requires_subcommand() {
        assert!(Cli::try_parse_from(["shoebox"]).is_err());
        let cli = Cli::try_parse_from(["shoebox", "stats"]).unwrap();
        assert!(!cli.verbose);
        assert_eq!(cli.format, "text");
    }

    #[test]
    fn test_cli_import_command() {
        let cli = Cli::try_parse_from([
            "shoebox", "--library", "/lib", "import", "/card/DCIM", "--move", "--collision", "hash-suffix",
        ])
        .unwrap();

        assert_eq!(cli.library, Some(PathBuf::from("/lib")));
        match cli.command {
            Commands::Import { sources, move_files, collision, .. } => {
                assert!(move_files);
                assert_eq!(sources, vec![PathBuf::from("/card/DCIM")]);
                assert!(matches!(collision, Some(CollisionArg::HashSuffix)));
            }
            _ => panic!("Expected Import command"),
        }
    }

    #[test]
    fn test_cli_list_filters() {
        let cli = Cli::try_parse_from([
            "shoebox", "list", "--from", "2020-01-01", "--type", "video", "--sort", "imported-asc", "--format", "json",
        ])
        .unwrap();

        assert_eq!(cli.format, "json");
        match cli.command {
            Commands::List { from, media_type, sort, .. } => {
                assert_eq!(from, NaiveDate::from_ymd_opt(2020, 1, 1));
                assert_eq!(media_type, Some(MediaType::Video));
                assert!(matches!(sort, SortArg::ImportedAsc));
            }
            _ => panic!("Expected List command"),
        }
    }

    #[test]
    fn test_cli_list_rejects_deleted_with_all() {
        assert!(Cli::try_parse_from(["shoebox", "list", "--deleted", "--all"]).is_err());
    }

    #[test]
    fn test_bad_date_format_is_refused_before_running() {
        let path = Path::new("shoebox.json");
        assert!(check_config(&AppConfig::default(), path).is_ok());

        let mut config = AppConfig::default();
        config.ui.date_format = "%Y-%Q".to_string();
        let err = check_config(&config, path).unwrap_err();
        assert!(err.to_string().contains("ui.date_format"));
    }

    #[test]
    fn test_cli_setting_set() {
        let cli = Cli::try_parse_from(["shoebox", "setting", "set", "theme", "dark"]).unwrap();
        match cli.command {
            Commands::Setting { action: SettingCommands::Set { key, value } } => {
                assert_eq!(key, "theme");
                assert_eq!(value, "dark");
            }
            _ => panic!("Expected Setting command"),
        }
    }
}
