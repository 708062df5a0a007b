//! strata-migrate: apply pending schema migrations to the PostgreSQL,
//! ClickHouse, and MongoDB stores.
//!
//! Exit codes: `0` when every selected target succeeded, `1` when any target
//! failed or startup failed, `2` on usage errors.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use strata_core::config::load_env_file;
use strata_core::{defaults, RunMode, Selector, Settings};

#[derive(Debug, Parser)]
#[command(name = "strata-migrate")]
#[command(author, version, about = "Apply pending migrations to PostgreSQL, ClickHouse, and MongoDB")]
struct Cli {
    /// Target to migrate: all, relational, columnar, document
    /// (or postgres, clickhouse, mongodb)
    #[arg(default_value = "all", value_parser = parse_selector)]
    target: Selector,

    /// Report pending migrations without applying them
    #[arg(long)]
    dry_run: bool,

    /// Directory holding the postgres/ and clickhouse/ unit directories
    #[arg(long)]
    migrations_dir: Option<PathBuf>,

    /// Env file with connection settings (default: docker/env.local)
    #[arg(long, env = "STRATA_ENV_FILE")]
    env_file: Option<PathBuf>,
}

impl Cli {
    fn env_file(&self) -> PathBuf {
        self.env_file
            .clone()
            .unwrap_or_else(|| PathBuf::from(defaults::ENV_FILE))
    }

    fn mode(&self) -> RunMode {
        if self.dry_run {
            RunMode::DryRun
        } else {
            RunMode::Apply
        }
    }
}

fn parse_selector(s: &str) -> Result<Selector, String> {
    s.parse::<Selector>().map_err(|e| e.to_string())
}

/// Install the global subscriber.
///
/// Environment variables:
///   LOG_FORMAT  - "json" or "text" (default: "text")
///   LOG_FILE    - path to log file (optional, enables file logging)
///   LOG_ANSI    - "true"/"false" override ANSI colors (auto-detected by default)
///   RUST_LOG    - standard env filter (default: strata crates at info)
fn init_tracing() -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let log_file = std::env::var("LOG_FILE").ok();
    let log_ansi = std::env::var("LOG_ANSI")
        .ok()
        .map(|v| v == "true" || v == "1");

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| defaults::LOG_FILTER.into());

    let registry = tracing_subscriber::registry().with(env_filter);

    let guard = if let Some(ref path) = log_file {
        let file_dir = Path::new(path).parent().unwrap_or(Path::new("."));
        let file_name = Path::new(path)
            .file_name()
            .and_then(|f| f.to_str())
            .unwrap_or("strata-migrate.log");
        let file_appender = tracing_appender::rolling::daily(file_dir, file_name);
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        if log_format == "json" {
            registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_writer(non_blocking),
                )
                .init();
        } else {
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(log_ansi.unwrap_or(false));
            registry.with(layer).init();
        }
        Some(guard)
    } else {
        if log_format == "json" {
            registry
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        } else {
            let mut layer = tracing_subscriber::fmt::layer();
            if let Some(ansi) = log_ansi {
                layer = layer.with_ansi(ansi);
            }
            registry.with(layer).init();
        }
        None
    };

    info!(
        log_format = %log_format,
        log_file = log_file.as_deref().unwrap_or("(stdout)"),
        "Logging initialized"
    );
    guard
}

/// Returns whether every selected target succeeded.
fn run(cli: Cli) -> anyhow::Result<bool> {
    let env_file = cli.env_file();
    let env_loaded = load_env_file(&env_file)
        .with_context(|| format!("Failed to load env file {}", env_file.display()))?;

    // LOG_* and RUST_LOG may come from the env file, so tracing starts after it.
    let _log_guard = init_tracing();
    if env_loaded {
        info!(subsystem = "config", path = %env_file.display(), "Loaded env file");
    } else {
        debug!(
            subsystem = "config",
            path = %env_file.display(),
            "Env file not found, using process environment only"
        );
    }

    let mut settings = Settings::from_env().context("Invalid configuration")?;
    if let Some(dir) = cli.migrations_dir.clone() {
        settings = settings.with_migrations_dir(dir);
    }

    info!(
        subsystem = "config",
        env_file = %env_file.display(),
        env_loaded,
        migrations_dir = %settings.migrations_dir.display(),
        selector = %cli.target,
        dry_run = cli.dry_run,
        "Starting migrations"
    );

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;

    let report = runtime.block_on(
        strata_targets::orchestrator(&settings).run(cli.target, cli.mode()),
    );
    Ok(report.is_success())
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
