//! autosort - rule-based file organizer.
//!
//! Usage:
//!   autosort preview <PATH> --rules <FILE>
//!   autosort organize <PATH> --rules <FILE>
//!   autosort watch <PATH>... --rules <FILE>
//!   autosort undo [--id N]
//!   autosort history
//!   autosort validate --rules <FILE>

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use color_eyre::eyre::{Context, Result, eyre};
use tracing_subscriber::EnvFilter;

use autosort_core::{FileDescriptor, OrganizeConfig};
use autosort_ops::{
    DEFAULT_UNDO_CAPACITY, ExecutionReport, RuleExecutor, UndoManager, UndoStatus, collect_files,
    organize_folder,
};
use autosort_rules::{Rule, RuleSet};
use autosort_watch::{WatchCoordinator, WatchEvent, WatchProfile, WatchSettings};

/// Environment variable holding the tracing filter.
const LOG_ENV: &str = "AUTOSORT_LOG";

/// autosort - organize files with ordered rules, preview first, undo later
#[derive(Parser)]
#[command(name = "autosort")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Undo history file (defaults to the user data directory)
    #[arg(long, global = true)]
    history_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show what the rules would do without touching any file
    Preview {
        #[command(flatten)]
        target: TargetArgs,
    },

    /// Run the rules and apply their actions
    Organize {
        #[command(flatten)]
        target: TargetArgs,
    },

    /// Watch folders and organize new files as they arrive
    Watch {
        /// Folders to watch
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Rule set file (.json or .toml)
        #[arg(short, long)]
        rules: PathBuf,

        /// Overwrite existing files instead of renaming around them
        #[arg(long = "unsafe")]
        unsafe_mode: bool,

        /// Glob patterns for file names to leave alone
        #[arg(long = "ignore")]
        ignore: Vec<String>,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Undo the most recent action, or a specific one
    Undo {
        /// Entry ID from `autosort history`
        #[arg(long)]
        id: Option<u64>,
    },

    /// List recorded actions, newest first
    History {
        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,

        /// Forget the whole history
        #[arg(long)]
        clear: bool,
    },

    /// Check a rule set for invalid rules
    Validate {
        /// Rule set file (.json or .toml)
        #[arg(short, long)]
        rules: PathBuf,
    },
}

#[derive(clap::Args)]
struct TargetArgs {
    /// Folder (or single file) to organize
    path: PathBuf,

    /// Rule set file (.json or .toml)
    #[arg(short, long)]
    rules: PathBuf,

    /// Descend into subfolders
    #[arg(short = 'R', long)]
    recursive: bool,

    /// Include hidden files
    #[arg(long)]
    include_hidden: bool,

    /// Overwrite existing files instead of renaming around them
    #[arg(long = "unsafe")]
    unsafe_mode: bool,

    /// Glob patterns for file names to leave alone
    #[arg(long = "ignore")]
    ignore: Vec<String>,

    /// Output format
    #[arg(short, long, default_value = "text")]
    format: OutputFormat,
}

#[derive(Debug, Clone, Copy, Default, ValueEnum)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

fn main() -> Result<()> {
    color_eyre::install()?;
    init_tracing();

    let cli = Cli::parse();
    let history_file = match cli.history_file {
        Some(path) => path,
        None => default_history_file()?,
    };

    match cli.command {
        Command::Preview { target } => run_organize(&target, true, &history_file),
        Command::Organize { target } => run_organize(&target, false, &history_file),
        Command::Watch {
            paths,
            rules,
            unsafe_mode,
            ignore,
            format,
        } => run_watch(&paths, &rules, unsafe_mode, ignore, format, &history_file),
        Command::Undo { id } => run_undo(id, &history_file),
        Command::History { format, clear } => run_history(format, clear, &history_file),
        Command::Validate { rules } => run_validate(&rules),
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn default_history_file() -> Result<PathBuf> {
    let data = dirs::data_dir().ok_or_else(|| eyre!("Could not determine the data directory"))?;
    Ok(data.join("autosort").join("undo.json"))
}

fn load_history(path: &Path) -> Result<Arc<UndoManager>> {
    let manager = UndoManager::load_or_new(path, DEFAULT_UNDO_CAPACITY)
        .with_context(|| format!("Failed to load undo history from {}", path.display()))?;
    Ok(Arc::new(manager))
}

fn save_history(manager: &UndoManager, path: &Path) -> Result<()> {
    manager
        .save(path)
        .with_context(|| format!("Failed to save undo history to {}", path.display()))
}

/// Load a rule set and refuse to continue if any rule is invalid.
fn load_rules(path: &Path) -> Result<Vec<Rule>> {
    let set = RuleSet::load(path).with_context(|| format!("Failed to load {}", path.display()))?;
    let errors = set.validate();
    if let Some(first) = errors.first() {
        for error in &errors {
            eprintln!("  {error}");
        }
        return Err(eyre!("{} invalid rule(s), first: {first}", errors.len()));
    }
    Ok(set.rules)
}

fn build_config(
    dry_run: bool,
    recursive: bool,
    include_hidden: bool,
    unsafe_mode: bool,
    ignore: Vec<String>,
) -> Result<OrganizeConfig> {
    OrganizeConfig::builder()
        .dry_run(dry_run)
        .safe_mode(!unsafe_mode)
        .include_subfolders(recursive)
        .include_hidden(include_hidden)
        .ignore_patterns(ignore)
        .build()
        .context("Invalid configuration")
}

/// Run `preview` or `organize` on a folder or a single file.
fn run_organize(target: &TargetArgs, dry_run: bool, history_file: &Path) -> Result<()> {
    let rules = load_rules(&target.rules)?;
    let config = build_config(
        dry_run,
        target.recursive,
        target.include_hidden,
        target.unsafe_mode,
        target.ignore.clone(),
    )?;
    let path = target.path.canonicalize().context("Invalid path")?;

    let undo = load_history(history_file)?;
    let executor = RuleExecutor::new(Arc::clone(&undo));

    let reports = if path.is_dir() {
        let files = collect_files(&path, &config);
        let total: u64 = files.iter().map(|f| f.size).sum();
        eprintln!(
            "{} {} ({} files, {})...",
            if dry_run { "Previewing" } else { "Organizing" },
            path.display(),
            files.len(),
            format_size(total)
        );
        organize_folder(&path, &rules, &config, &executor).context("Organize failed")?
    } else {
        let file = FileDescriptor::from_path(&path).context("Invalid file")?;
        vec![executor.execute(&rules, &file, &config)]
    };

    if !dry_run {
        save_history(&undo, history_file)?;
    }

    match target.format {
        OutputFormat::Text => print_reports(&reports, dry_run),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&reports)?),
    }

    Ok(())
}

fn print_reports(reports: &[ExecutionReport], dry_run: bool) {
    println!();
    println!("{}", "─".repeat(70));
    println!(" {}", if dry_run { "Preview" } else { "Organize Report" });
    println!("{}", "─".repeat(70));

    let mut claimed = 0;
    let mut failed = 0;
    for report in reports {
        if report.claimed {
            claimed += 1;
        }
        if report.has_failures() {
            failed += 1;
        }
        println!();
        println!(" {}", report.file.display());
        for line in &report.log {
            println!("   {line}");
        }
    }

    println!();
    println!(
        " {} files, {} matched a rule, {} with failures",
        reports.len(),
        claimed,
        failed
    );
}

/// Watch folders until ctrl-c, saving the undo history as files are handled.
fn run_watch(
    paths: &[PathBuf],
    rules_path: &Path,
    unsafe_mode: bool,
    ignore: Vec<String>,
    format: OutputFormat,
    history_file: &Path,
) -> Result<()> {
    let rules = load_rules(rules_path)?;
    let config = build_config(false, false, false, unsafe_mode, ignore)?;
    let profile_name = rules_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "rules".to_string());

    let undo = load_history(history_file)?;
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start the async runtime")?;

    runtime.block_on(async {
        let (coordinator, mut events) =
            WatchCoordinator::new(RuleExecutor::new(Arc::clone(&undo)), WatchSettings::default());

        for path in paths {
            let profile = WatchProfile::new(profile_name.clone(), rules.clone(), config.clone());
            coordinator
                .watch(path, profile)
                .with_context(|| format!("Failed to watch {}", path.display()))?;
            eprintln!("Watching {}", path.display());
        }
        eprintln!("Press Ctrl-C to stop.");

        loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => break,
                event = events.recv() => {
                    let Some(event) = event else { break };
                    if matches!(event, WatchEvent::Processed { .. }) {
                        save_history(&undo, history_file)?;
                    }
                    print_event(&event, format)?;
                }
            }
        }

        coordinator.shutdown();
        save_history(&undo, history_file)
    })
}

fn print_event(event: &WatchEvent, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string(event)?),
        OutputFormat::Text => match event {
            WatchEvent::Processed { profile, report, .. } => {
                println!("[{profile}] {}", report.file.display());
                for line in &report.log {
                    println!("   {line}");
                }
            }
            WatchEvent::Skipped { path, reason, .. } => {
                println!("skipped {}: {reason}", path.display());
            }
            WatchEvent::Paused { folder, reason } => {
                println!("paused {}: {reason}", folder.display());
            }
        },
    }
    Ok(())
}

fn run_undo(id: Option<u64>, history_file: &Path) -> Result<()> {
    let undo = load_history(history_file)?;
    let outcome = match id {
        Some(id) => undo.undo_entry(id),
        None => undo.undo_last(),
    };
    // A failed entry is dropped from the history either way.
    save_history(&undo, history_file)?;

    let entry = outcome.context("Undo failed")?;
    println!("Undone: {}", entry.description());
    Ok(())
}

fn run_history(format: OutputFormat, clear: bool, history_file: &Path) -> Result<()> {
    let undo = load_history(history_file)?;
    if clear {
        undo.clear();
        save_history(&undo, history_file)?;
        eprintln!("History cleared.");
        return Ok(());
    }

    let entries = undo.history();
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&entries)?),
        OutputFormat::Text => {
            if entries.is_empty() {
                println!("No recorded actions.");
            }
            for entry in &entries {
                let marker = match entry.status {
                    UndoStatus::Applied if entry.can_undo() => "",
                    UndoStatus::Applied => " (not undoable)",
                    UndoStatus::Undone => " (undone)",
                    UndoStatus::Failed => " (failed)",
                };
                println!(
                    "{:>5}  {}  {}{}",
                    entry.id,
                    entry.timestamp.format("%Y-%m-%d %H:%M:%S"),
                    entry.description(),
                    marker
                );
            }
        }
    }
    Ok(())
}

fn run_validate(rules_path: &Path) -> Result<()> {
    let set = RuleSet::load(rules_path)
        .with_context(|| format!("Failed to load {}", rules_path.display()))?;
    let errors = set.validate();
    if errors.is_empty() {
        println!("{} rule(s) OK", set.rules.len());
        return Ok(());
    }
    for error in &errors {
        println!("  {error}");
    }
    Err(eyre!("{} of {} rule(s) invalid", errors.len(), set.rules.len()))
}

/// Format size in human-readable form.
fn format_size(bytes: u64) -> String {
    humansize::format_size(bytes, humansize::BINARY)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_preview() {
        let cli = Cli::try_parse_from([
            "autosort", "preview", "/tmp/in", "--rules", "r.toml", "-R", "--unsafe", "--ignore",
            "*.part",
        ])
        .unwrap();
        match cli.command {
            Command::Preview { target } => {
                assert_eq!(target.path, PathBuf::from("/tmp/in"));
                assert!(target.recursive);
                assert!(target.unsafe_mode);
                assert_eq!(target.ignore, vec!["*.part".to_string()]);
            }
            _ => panic!("expected preview"),
        }
    }

    #[test]
    fn test_watch_requires_a_path() {
        assert!(Cli::try_parse_from(["autosort", "watch", "--rules", "r.json"]).is_err());
    }

    #[test]
    fn test_build_config_maps_flags() {
        let config = build_config(true, true, false, true, vec!["*.tmp".into()]).unwrap();
        assert!(config.dry_run);
        assert!(config.include_subfolders);
        assert!(!config.safe_mode);
        assert!(config.should_ignore("a.tmp"));
    }

    #[test]
    fn test_build_config_rejects_bad_glob() {
        assert!(build_config(false, false, false, false, vec!["[".into()]).is_err());
    }

    #[test]
    fn test_load_rules_rejects_invalid_rule() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("rules.json");
        std::fs::write(&path, r#"{"rules":[{"name":"empty"}]}"#).unwrap();
        assert!(load_rules(&path).is_err());
    }
}
