//! # content-migrate CLI
//!
//! Loads a Markdown content tree into the site's Postgres schema.
//!
//! ## Usage
//!
//! ```bash
//! content-migrate [--config ./config/migrate.toml] <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `content-migrate run` | Load content, taxonomy and links |
//! | `content-migrate check` | Validate config, source tree and schema; print row counts |
//! | `content-migrate link` | Re-run the link stage over stored content |
//!
//! ## Examples
//!
//! ```bash
//! # See what a run would do without writing anything
//! content-migrate run --dry-run --verbose
//!
//! # Re-run, leaving posts that are already stored alone
//! content-migrate run --skip-existing --batch-size 25
//! ```
//!
//! The summary is printed on stdout. Logs and progress go to stderr.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Args, Parser, Subcommand, ValueEnum};

use content_migrate::config::{self, Config, Overrides};
use content_migrate::db;
use content_migrate::orchestrator::{preflight, Orchestrator, RunOptions};
use content_migrate::progress::ProgressMode;
use content_migrate::report::render_counts;
use content_migrate::store::postgres::PgStore;

/// Bulk, idempotent loader from a Markdown content tree into Postgres.
#[derive(Parser)]
#[command(
    name = "content-migrate",
    about = "Load a Markdown content tree into a Postgres content schema",
    version,
    long_about = "Walks a directory of Markdown documents with YAML front matter, \
    normalizes each one into a post row, derives categories and tags across the \
    whole corpus and links them. Every write is an upsert, so runs can be repeated."
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/migrate.toml` when that file exists; otherwise
    /// built-in defaults are used.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log output format.
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

/// Database connection flags.
#[derive(Args)]
struct ConnectionArgs {
    /// Postgres connection string.
    #[arg(long, env = "DATABASE_URL", hide_env_values = true)]
    database_url: Option<String>,
}

/// Source tree flags.
#[derive(Args)]
struct SourceArgs {
    /// Root directory of the content tree.
    #[arg(long, env = "CONTENT_DIR")]
    content_dir: Option<PathBuf>,

    /// Directory featured images are expected in.
    #[arg(long, env = "IMAGE_DIR")]
    image_dir: Option<PathBuf>,

    /// Documents processed concurrently per batch.
    #[arg(long, env = "MIGRATION_BATCH_SIZE")]
    batch_size: Option<usize>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full migration.
    ///
    /// Validates the configuration, the content directory and the target
    /// schema, then loads every document, creates categories and tags, and
    /// links posts to them.
    Run {
        #[command(flatten)]
        connection: ConnectionArgs,

        #[command(flatten)]
        source: SourceArgs,

        /// Derive and count everything but write nothing.
        #[arg(long)]
        dry_run: bool,

        /// Debug logging and per-error details in the summary.
        #[arg(long, short)]
        verbose: bool,

        /// Leave posts whose slug is already stored untouched.
        #[arg(long)]
        skip_existing: bool,

        /// Progress output on stderr. Defaults to human when stderr is a TTY.
        #[arg(long, value_enum)]
        progress: Option<ProgressMode>,
    },

    /// Validate configuration, content directory and schema, then print row counts.
    Check {
        #[command(flatten)]
        connection: ConnectionArgs,

        #[command(flatten)]
        source: SourceArgs,
    },

    /// Re-run the link stage over content already in the database.
    Link {
        #[command(flatten)]
        connection: ConnectionArgs,

        /// Resolve and count links but write nothing.
        #[arg(long)]
        dry_run: bool,

        /// Debug logging and per-error details in the summary.
        #[arg(long, short)]
        verbose: bool,

        /// Progress output on stderr. Defaults to human when stderr is a TTY.
        #[arg(long, value_enum)]
        progress: Option<ProgressMode>,
    },
}

impl Commands {
    fn verbose(&self) -> bool {
        match self {
            Commands::Run { verbose, .. } | Commands::Link { verbose, .. } => *verbose,
            Commands::Check { .. } => false,
        }
    }
}

fn init_tracing(format: LogFormat, verbose: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = if verbose {
        "content_migrate=debug"
    } else {
        "content_migrate=info"
    };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .with_target(false)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

fn overrides(connection: ConnectionArgs, source: Option<SourceArgs>) -> Overrides {
    let source = source.unwrap_or(SourceArgs {
        content_dir: None,
        image_dir: None,
        batch_size: None,
    });
    Overrides {
        database_url: connection.database_url,
        content_dir: source.content_dir,
        image_dir: source.image_dir,
        batch_size: source.batch_size,
    }
}

/// Build the pool once and hand it to the store.
async fn connect_store(cfg: &Config) -> anyhow::Result<(sqlx::PgPool, Arc<PgStore>)> {
    let pool = db::connect(cfg)
        .await
        .context("failed to connect to the database")?;
    let store = Arc::new(PgStore::new(pool.clone()));
    Ok((pool, store))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_format, cli.command.verbose());

    let mut cfg = config::load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Run {
            connection,
            source,
            dry_run,
            verbose,
            skip_existing,
            progress,
        } => {
            cfg.apply(overrides(connection, Some(source)));
            preflight(&cfg, true)?;
            let (pool, store) = connect_store(&cfg).await?;

            let options = RunOptions {
                dry_run,
                verbose,
                skip_existing,
            };
            let reporter = progress
                .unwrap_or_else(ProgressMode::default_for_tty)
                .reporter();
            let mut orchestrator = Orchestrator::new(cfg, store, options, reporter);
            let report = orchestrator.run().await?;
            report.print(verbose);

            pool.close().await;
        }
        Commands::Check { connection, source } => {
            cfg.apply(overrides(connection, Some(source)));
            preflight(&cfg, true)?;
            let (pool, store) = connect_store(&cfg).await?;

            let mut orchestrator = Orchestrator::new(
                cfg,
                store,
                RunOptions::default(),
                ProgressMode::Off.reporter(),
            );
            let counts = orchestrator.check().await?;
            println!("Configuration, content directory and schema OK.");
            println!();
            print!("{}", render_counts(&counts));

            pool.close().await;
        }
        Commands::Link {
            connection,
            dry_run,
            verbose,
            progress,
        } => {
            cfg.apply(overrides(connection, None));
            preflight(&cfg, false)?;
            let (pool, store) = connect_store(&cfg).await?;

            let options = RunOptions {
                dry_run,
                verbose,
                skip_existing: false,
            };
            let reporter = progress
                .unwrap_or_else(ProgressMode::default_for_tty)
                .reporter();
            let mut orchestrator = Orchestrator::new(cfg, store, options, reporter);
            let report = orchestrator.run_link_only().await?;
            report.print(verbose);

            pool.close().await;
        }
    }

    Ok(())
}
