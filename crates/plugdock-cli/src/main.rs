//! Plugdock CLI - install, update, and remove plugins from GitHub releases

use std::cmp::Ordering;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use async_trait::async_trait;
use clap::{Parser, Subcommand};
use plugdock_core::config::ConfigStore;
use plugdock_core::source::{ArtifactSource, DownloadProgress, GithubSource, Release};
use plugdock_core::Error;
use plugdock_plugins::catalog::compare_versions;
use plugdock_plugins::{NoProgress, PluginCoordinator, ProgressReporter};
use tracing::debug;

#[derive(Parser)]
#[command(name = "plugdock")]
#[command(author, version, about = "Plugin manager for GitHub release assets", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// GitHub owner of the release repository (saved to settings)
    #[arg(long, global = true)]
    owner: Option<String>,

    /// GitHub repository holding the plugin releases (saved to settings)
    #[arg(long, global = true)]
    repo: Option<String>,

    /// GitHub token for private repositories or higher rate limits (saved to settings)
    #[arg(long, global = true)]
    token: Option<String>,

    /// Config directory (default: PLUGDOCK_CONFIG_DIR or the platform config dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// List plugins available in the release repository
    List,

    /// Install a plugin
    Install {
        /// Plugin name (case-insensitive)
        #[arg(short, long)]
        name: String,

        /// Release tag to install (default: newest)
        #[arg(short, long)]
        version: Option<String>,
    },

    /// Update an installed plugin to the newest release
    Update {
        /// Installed plugin name
        #[arg(short, long)]
        name: String,
    },

    /// Remove an installed plugin
    Remove {
        /// Installed plugin name
        #[arg(short, long)]
        name: String,
    },

    /// Show configuration summary and installed plugins
    Status,

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show all configuration values
    Show,
    /// Set a configuration value
    Set { key: String, value: String },
    /// Show the settings file path
    Path,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            // Help and version go to stdout and are not failures
            return if e.use_stderr() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            if let Some(hint) = e.downcast_ref::<Error>().and_then(Error::suggestion) {
                eprintln!("Hint: {}", hint);
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let default_level = if cli.quiet { "plugdock=error" } else { "plugdock=warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.parse()?),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut store = match &cli.config {
        Some(dir) => ConfigStore::in_dir(dir),
        None => ConfigStore::default_location()?,
    };
    store.settings()?;
    apply_overrides(&mut store, &cli)?;

    let quiet = cli.quiet;
    match cli.command {
        Commands::List => cmd_list(store, quiet).await,
        Commands::Install { name, version } => {
            cmd_install(store, &name, version.as_deref(), quiet).await
        }
        Commands::Update { name } => cmd_update(store, &name, quiet).await,
        Commands::Remove { name } => cmd_remove(store, &name, quiet).await,
        Commands::Status => cmd_status(&store),
        Commands::Config { action } => cmd_config(store, action, quiet),
    }
}

/// Persist `--owner`, `--repo`, and `--token` before running the command
fn apply_overrides(store: &mut ConfigStore, cli: &Cli) -> anyhow::Result<()> {
    if cli.owner.is_none() && cli.repo.is_none() && cli.token.is_none() {
        return Ok(());
    }
    store.update(|settings| {
        if let Some(owner) = &cli.owner {
            settings.set("github_owner", owner)?;
        }
        if let Some(repo) = &cli.repo {
            settings.set("github_repo", repo)?;
        }
        if let Some(token) = &cli.token {
            settings.set("github_token", token)?;
        }
        Ok(())
    })?;
    debug!("Applied command-line overrides to settings");
    Ok(())
}

fn coordinator(store: ConfigStore) -> anyhow::Result<PluginCoordinator<GithubSource>> {
    let source = {
        let settings = store.snapshot()?;
        let (owner, repo) = settings.source_repository()?;
        GithubSource::builder()
            .owner(owner)
            .repo(repo)
            .token(settings.resolved_token())
            .build()?
    };
    Ok(PluginCoordinator::new(store, source)?)
}

/// Single-line progress on stderr
struct ConsoleProgress;

impl ProgressReporter for ConsoleProgress {
    fn report(&self, percent: f32, message: &str) {
        let mut stderr = std::io::stderr().lock();
        let _ = write!(stderr, "\r\x1b[2K[{:>3.0}%] {}", percent, message);
        if percent >= 100.0 {
            let _ = writeln!(stderr);
        }
        let _ = stderr.flush();
    }
}

fn reporter(quiet: bool) -> &'static dyn ProgressReporter {
    if quiet { &NoProgress } else { &ConsoleProgress }
}

// ============================================================================
// Command Implementations
// ============================================================================

async fn cmd_list(store: ConfigStore, quiet: bool) -> anyhow::Result<()> {
    let coordinator = coordinator(store)?;
    let available = coordinator.list_available().await?;

    if available.is_empty() {
        if !quiet {
            println!("No installable plugins found in the release repository.");
        }
        return Ok(());
    }

    for candidate in &available {
        let marker = match coordinator.store().get_installed(&candidate.name) {
            Some(installed) if installed.version == candidate.version => " [installed]".to_string(),
            Some(installed)
                if compare_versions(&installed.version, &candidate.version) == Ordering::Less =>
            {
                format!(" [update available, installed {}]", installed.version)
            }
            _ => String::new(),
        };
        println!("{} {}{}", candidate.name, candidate.version, marker);
        if !quiet {
            println!("  File: {} ({} bytes)", candidate.file_name, candidate.file_size);
            if let Some(summary) = candidate.description.lines().find(|l| !l.trim().is_empty()) {
                println!("  {}", summary.trim());
            }
        }
    }
    Ok(())
}

async fn cmd_install(
    store: ConfigStore,
    name: &str,
    version: Option<&str>,
    quiet: bool,
) -> anyhow::Result<()> {
    let mut coordinator = coordinator(store)?;
    let candidate = coordinator.find_candidate(name, version).await?;
    if !quiet {
        println!("Installing {} {}...", candidate.name, candidate.version);
    }

    let outcome = coordinator.install(candidate, reporter(quiet)).await?;
    if !quiet {
        println!("{}", outcome.message());
    }
    Ok(())
}

async fn cmd_update(store: ConfigStore, name: &str, quiet: bool) -> anyhow::Result<()> {
    let mut coordinator = coordinator(store)?;
    let outcome = coordinator.update(name, reporter(quiet)).await?;
    if !quiet {
        println!("{}", outcome.message());
    }
    Ok(())
}

async fn cmd_remove(store: ConfigStore, name: &str, quiet: bool) -> anyhow::Result<()> {
    // Removal never talks to the release source
    let mut coordinator = PluginCoordinator::new(store, Offline)?;
    let outcome = coordinator.remove(name, true, reporter(quiet))?;
    if !quiet {
        println!("{}", outcome.message());
    }
    Ok(())
}

fn cmd_status(store: &ConfigStore) -> anyhow::Result<()> {
    let settings = store.snapshot()?;

    println!("Plugdock Status");
    println!("===============");
    println!("Settings:    {}", store.path().display());
    match settings.source_repository() {
        Ok((owner, repo)) => println!("Repository:  {}/{}", owner, repo),
        Err(_) => println!("Repository:  (not configured)"),
    }
    println!(
        "Token:       {}",
        if settings.resolved_token().is_some() {
            "configured"
        } else {
            "not set"
        }
    );
    println!("Plugins dir: {}", settings.plugins_directory.display());
    println!("Temp dir:    {}", settings.temp_directory.display());
    println!();

    let installed = store.installed();
    if installed.is_empty() {
        println!("No plugins installed.");
        return Ok(());
    }

    println!("Installed plugins ({}):", installed.len());
    for record in installed {
        let (path, state) = match record.install_path() {
            Some(path) if path.exists() => (path.display().to_string(), "ok"),
            Some(path) => (path.display().to_string(), "MISSING"),
            None => ("(none)".to_string(), "incomplete"),
        };
        let installed_at = record
            .installed_date()
            .map(|d| d.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_default();
        println!(
            "  {} {} [{}] {} {}",
            record.name, record.version, state, path, installed_at
        );
    }
    Ok(())
}

fn cmd_config(mut store: ConfigStore, action: ConfigAction, quiet: bool) -> anyhow::Result<()> {
    match action {
        ConfigAction::Show => {
            for (key, value) in store.snapshot()?.list()? {
                println!("{} = {}", key, value);
            }
        }
        ConfigAction::Set { key, value } => {
            store.update(|settings| settings.set(&key, &value))?;
            if !quiet {
                let shown = store.snapshot()?.get(&key)?;
                println!("Set {} = {}", key, shown);
            }
        }
        ConfigAction::Path => {
            println!("{}", store.path().display());
        }
    }
    Ok(())
}

/// Source for commands that must not reach the network
struct Offline;

#[async_trait]
impl ArtifactSource for Offline {
    async fn list_releases(&self) -> plugdock_core::Result<Vec<Release>> {
        Err(offline_error())
    }

    async fn download(
        &self,
        _url: &str,
        _dest: &Path,
        _progress: DownloadProgress<'_>,
    ) -> plugdock_core::Result<()> {
        Err(offline_error())
    }
}

fn offline_error() -> Error {
    Error::InvalidInput("release source is not available for this command".to_string())
}
