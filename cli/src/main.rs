//! CLI entrypoint for tradehub
//!
//! This is the main binary that wires together all layers using
//! dependency injection.

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tradehub_application::{
    ChangeListener, FeedCache, IdentityProvider, NotificationChannel, RemoteStore,
    SessionManager,
};
use tradehub_domain::{POSTS_COLLECTION, PostBody, UserId};
use tradehub_infrastructure::{BackendKind, ConfigLoader, FileConfig, HostedBackend, InMemoryBackend};
use tradehub_presentation::{Cli, FeedView, TerminalInput, ViewConfig};

const LOG_FILE_PREFIX: &str = "tradehub.log";

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Keep the guard alive so buffered log lines are flushed on exit
    let _log_guard = init_logging(&cli)?;

    info!("Starting tradehub");

    // Load configuration
    if cli.show_config {
        ConfigLoader::print_config_sources(cli.config.as_ref());
        println!();
    }

    let mut config = if cli.no_config {
        ConfigLoader::load_defaults()
    } else {
        ConfigLoader::load(cli.config.as_ref()).context("Failed to load configuration")?
    };
    if cli.memory {
        config.backend.kind = BackendKind::Memory;
    }

    if cli.show_config {
        println!("Effective configuration:");
        println!("{}", toml::to_string_pretty(&config)?);
        return Ok(());
    }

    config.validate().context("Invalid configuration")?;

    if !config.output.color {
        colored::control::set_override(false);
    }

    let view_config = ViewConfig {
        clear_screen: config.output.clear_screen && !cli.no_clear,
        timestamp_format: config.output.timestamp_format.clone(),
    };

    // === Dependency Injection ===
    match config.backend.kind {
        BackendKind::Hosted => {
            let backend = Arc::new(
                HostedBackend::from_config(&config).context("Failed to create hosted client")?,
            );
            info!(url = %backend.settings().url, "Using hosted backend");
            run_view(backend, &view_config).await
        }
        BackendKind::Memory => {
            let backend = Arc::new(memory_backend(&config)?);
            info!("Using in-memory backend");
            run_view(backend, &view_config).await
        }
    }
}

/// Install the tracing subscriber.
///
/// Logs go to a daily file so they don't corrupt the interactive screen,
/// unless `--log-stderr` is given. `RUST_LOG` overrides `-v`.
fn init_logging(cli: &Cli) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| match cli.verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"), // -vvv or more
    });

    let dir = match log_dir() {
        Some(dir) if !cli.log_stderr => dir,
        _ => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
            return Ok(None);
        }
    };

    std::fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create log directory {}", dir.display()))?;
    let (writer, guard) =
        tracing_appender::non_blocking(tracing_appender::rolling::daily(&dir, LOG_FILE_PREFIX));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_ansi(false)
        .with_writer(writer)
        .init();
    Ok(Some(guard))
}

fn log_dir() -> Option<PathBuf> {
    dirs::data_dir().map(|d| d.join("tradehub").join("logs"))
}

/// In-process backend seeded with a welcome post
fn memory_backend(config: &FileConfig) -> Result<InMemoryBackend> {
    let code = &config.backend.memory_verification_code;
    let backend = InMemoryBackend::new(code.clone());

    let author = UserId::new("local:tradehub");
    backend.set_profile(author.clone(), "TradeHub");
    let welcome = PostBody::parse(&format!(
        "Welcome! This feed lives in memory. Sign in with /signin, any email and the code {}.",
        code
    ))?;
    backend.insert_external(author, welcome, Utc::now());

    Ok(backend)
}

async fn run_view<B>(backend: Arc<B>, config: &ViewConfig) -> Result<()>
where
    B: IdentityProvider + RemoteStore + NotificationChannel + 'static,
{
    let sessions = Arc::new(SessionManager::new(Arc::clone(&backend)));
    let cache = FeedCache::new(Arc::clone(&backend));
    let listener = ChangeListener::new(Arc::clone(&backend), cache.clone(), POSTS_COLLECTION);

    let mut view = FeedView::new(sessions, cache, listener, TerminalInput::stdin(), config);
    view.run().await?;

    info!("Exiting tradehub");
    Ok(())
}
