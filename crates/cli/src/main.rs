//! GitMirror command-line tool.
//!
//! Provides subcommands for importing a repository's history into the
//! changeset store (`sync`) and for querying the live repository (`info`,
//! `branches`, `log`, `entries`, `diff`, `annotate`, `cat`), plus
//! configuration scaffolding (`init`, `validate`).

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use gitmirror_core::config::{self, AppConfig};
use gitmirror_core::models::Revision;
use gitmirror_core::{GitAdapter, RevisionsOptions, SqliteStore, SyncEngine};

// ---------------------------------------------------------------------------
// CLI argument definitions
// ---------------------------------------------------------------------------

/// GitMirror command-line tool.
#[derive(Parser, Debug)]
#[command(
    name = "gitmirror",
    version,
    about = "Mirror and query a Git repository's history"
)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, global = true, default_value = "gitmirror.toml")]
    config: PathBuf,

    /// Print results as JSON.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Import new revisions into the changeset store.
    Sync,

    /// Show the sync state and the newest stored revision.
    Status,

    /// Show the repository tip.
    Info,

    /// List branches.
    Branches,

    /// Show commit history.
    Log {
        /// Restrict history to this path.
        #[arg(long)]
        path: Option<String>,

        /// Lower range bound (exclusive).
        #[arg(long)]
        from: Option<String>,

        /// Upper range bound.
        #[arg(long)]
        to: Option<String>,

        /// Maximum number of revisions.
        #[arg(short = 'n', long)]
        limit: Option<usize>,

        /// Oldest first.
        #[arg(long)]
        reverse: bool,

        /// Walk every branch.
        #[arg(long)]
        all: bool,
    },

    /// List a directory at a revision.
    Entries {
        /// Directory path; repository root when omitted.
        #[arg(default_value = "")]
        path: String,

        /// Revision; default branch tip when omitted.
        #[arg(long)]
        rev: Option<String>,
    },

    /// Show a unified diff.
    Diff {
        /// Revision whose changes are shown.
        from: String,

        /// Base revision; the changes introduced by `from` when omitted.
        #[arg(long)]
        to: Option<String>,

        /// Restrict the diff to this path.
        #[arg(long, default_value = "")]
        path: String,
    },

    /// Show per-line attribution for a file.
    Annotate {
        /// File path.
        path: String,

        /// Revision; default branch tip when omitted.
        #[arg(long)]
        rev: Option<String>,
    },

    /// Print a file's raw content at a revision.
    Cat {
        /// File path.
        path: String,

        /// Revision; default branch tip when omitted.
        #[arg(long)]
        rev: Option<String>,
    },

    /// Generate a default configuration file.
    Init {
        /// Output path for the generated config file.
        #[arg(short, long, default_value = "./gitmirror.toml")]
        output: PathBuf,
    },

    /// Validate a configuration file.
    Validate,
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

/// `RUST_LOG` wins over the configured level.
fn init_tracing(default_level: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_target(false)
        .without_time()
        .init();
}

async fn run(cli: Cli) -> Result<()> {
    match &cli.command {
        Commands::Init { output } => {
            init_tracing("warn");
            return cmd_init(output);
        }
        Commands::Validate => {
            init_tracing("warn");
            return cmd_validate(&cli.config);
        }
        _ => {}
    }

    let config = AppConfig::load(&cli.config).context("failed to load configuration file")?;
    init_tracing(&config.log_level);
    config::set_git_bin(&config.repository.git_bin);

    let adapter = GitAdapter::new(&config.repository.url)
        .with_default_branch(config.repository.default_branch.clone());

    match cli.command {
        Commands::Sync => cmd_sync(&config, &adapter, cli.json).await,
        Commands::Status => cmd_status(&config, &adapter, cli.json).await,
        Commands::Info => cmd_info(&adapter, cli.json).await,
        Commands::Branches => cmd_branches(&adapter, cli.json).await,
        Commands::Log {
            path,
            from,
            to,
            limit,
            reverse,
            all,
        } => {
            let options = RevisionsOptions {
                limit,
                reverse,
                all,
            };
            cmd_log(
                &adapter,
                path.as_deref(),
                from.as_deref(),
                to.as_deref(),
                &options,
                cli.json,
            )
            .await
        }
        Commands::Entries { path, rev } => {
            cmd_entries(&adapter, &path, rev.as_deref(), cli.json).await
        }
        Commands::Diff { from, to, path } => {
            cmd_diff(&adapter, &path, &from, to.as_deref()).await
        }
        Commands::Annotate { path, rev } => {
            cmd_annotate(&adapter, &path, rev.as_deref(), cli.json).await
        }
        Commands::Cat { path, rev } => cmd_cat(&adapter, &path, rev.as_deref()).await,
        Commands::Init { .. } | Commands::Validate => unreachable!(),
    }
}

// ---------------------------------------------------------------------------
// Config scaffolding
// ---------------------------------------------------------------------------

fn cmd_init(output: &PathBuf) -> Result<()> {
    if output.exists() {
        bail!("refusing to overwrite existing file: {}", output.display());
    }
    std::fs::write(output, AppConfig::generate_default())
        .with_context(|| format!("failed to write {}", output.display()))?;
    println!("Wrote {}", output.display());
    Ok(())
}

fn cmd_validate(path: &PathBuf) -> Result<()> {
    AppConfig::load(path).context("configuration is invalid")?;
    println!("Configuration OK: {}", path.display());
    Ok(())
}

// ---------------------------------------------------------------------------
// Sync commands
// ---------------------------------------------------------------------------

async fn cmd_sync(config: &AppConfig, adapter: &GitAdapter, json: bool) -> Result<()> {
    let store = open_store(config)?;
    let engine = SyncEngine::new(adapter, &store, &config.repository.identifier);
    let stats = engine.fetch_changesets().await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
    } else {
        println!("Imported {} revision(s), skipped {}", stats.imported, stats.skipped);
    }
    Ok(())
}

async fn cmd_status(config: &AppConfig, adapter: &GitAdapter, json: bool) -> Result<()> {
    let store = open_store(config)?;
    let engine = SyncEngine::new(adapter, &store, &config.repository.identifier);
    let state = engine.state().await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&state)?);
    } else {
        println!("State: {state}");
    }
    Ok(())
}

fn open_store(config: &AppConfig) -> Result<SqliteStore> {
    if let Some(parent) = config.store.db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
    }
    SqliteStore::open(&config.store.db_path).context("failed to open changeset store")
}

// ---------------------------------------------------------------------------
// Query commands
// ---------------------------------------------------------------------------

async fn cmd_info(adapter: &GitAdapter, json: bool) -> Result<()> {
    let Some(info) = adapter.info().await? else {
        bail!("repository is unavailable");
    };
    if json {
        println!("{}", serde_json::to_string_pretty(&info)?);
    } else {
        println!("Repository: {}", info.root_url);
        print_revision(&info.lastrev);
    }
    Ok(())
}

async fn cmd_branches(adapter: &GitAdapter, json: bool) -> Result<()> {
    let branches = adapter.branches().await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&branches)?);
    } else {
        for branch in branches {
            println!("{branch}");
        }
    }
    Ok(())
}

async fn cmd_log(
    adapter: &GitAdapter,
    path: Option<&str>,
    from: Option<&str>,
    to: Option<&str>,
    options: &RevisionsOptions,
    json: bool,
) -> Result<()> {
    let revisions = adapter.revisions(path, from, to, options).await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&revisions)?);
        return Ok(());
    }
    for revision in &revisions {
        print_revision(revision);
        for changed in &revision.paths {
            println!("  {} {}", changed.action, changed.path);
        }
        println!();
    }
    Ok(())
}

async fn cmd_entries(
    adapter: &GitAdapter,
    path: &str,
    rev: Option<&str>,
    json: bool,
) -> Result<()> {
    let Some(entries) = adapter.entries(path, rev).await? else {
        bail!("no such directory at that revision");
    };
    if json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }
    for entry in &entries {
        let size = entry
            .size
            .map(|s| s.to_string())
            .unwrap_or_else(|| "-".into());
        let lastrev = entry
            .lastrev
            .as_ref()
            .map(|r| short_id(&r.identifier))
            .unwrap_or_default();
        println!("{:4} {:>8}  {}  {}", entry.kind.to_string(), size, lastrev, entry.name);
    }
    Ok(())
}

async fn cmd_diff(adapter: &GitAdapter, path: &str, from: &str, to: Option<&str>) -> Result<()> {
    let Some(lines) = adapter.diff(path, from, to).await? else {
        bail!("no differences, or unknown revision");
    };
    for line in lines {
        println!("{line}");
    }
    Ok(())
}

async fn cmd_annotate(
    adapter: &GitAdapter,
    path: &str,
    rev: Option<&str>,
    json: bool,
) -> Result<()> {
    let Some(annotation) = adapter.annotate(path, rev).await? else {
        bail!("cannot annotate: binary content or unknown path/revision");
    };
    if json {
        println!("{}", serde_json::to_string_pretty(&annotation)?);
        return Ok(());
    }
    for (number, line) in annotation.lines.iter().enumerate() {
        println!(
            "{:>5}  {} ({})  {}",
            number + 1,
            short_id(&line.revision.identifier),
            line.revision.author,
            line.content
        );
    }
    Ok(())
}

async fn cmd_cat(adapter: &GitAdapter, path: &str, rev: Option<&str>) -> Result<()> {
    let Some(bytes) = adapter.cat(path, rev).await? else {
        bail!("no such file at that revision");
    };
    std::io::stdout().write_all(&bytes)?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Formatting helpers
// ---------------------------------------------------------------------------

fn print_revision(revision: &Revision) {
    println!("commit {}", revision.identifier);
    println!("Author: {}", revision.author);
    println!("Date:   {}", revision.committed_on.to_rfc3339());
    for line in revision.message.lines() {
        println!("    {line}");
    }
}

fn short_id(identifier: &str) -> &str {
    &identifier[..8.min(identifier.len())]
}
