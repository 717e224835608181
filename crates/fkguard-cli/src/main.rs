mod config;
mod redaction;
mod registry;

use std::path::PathBuf;
use std::time::Instant;

use clap::{Args, Parser, Subcommand};
use fkguard_catalog::{CatalogOptions, MySqlCatalog, PostgresCatalog};
use fkguard_core::{
    AuditFilter, CatalogReader, Dialect, Error as CoreError, OrderOptions, RemediationOptions,
    TableRef, find_cycles, find_violations, fix_violations, order_tables, resolve_dependencies,
};
use sqlx::mysql::MySqlPoolOptions;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;
use uuid::Uuid;

use config::{ConfigError, Overrides, Settings};
use redaction::redact_connection_string;
use registry::{RegistryError, RunReport, init_logging, write_report};

#[derive(Debug, Error)]
enum CliError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("registry error: {0}")]
    Registry(#[from] RegistryError),
    #[error("{0}")]
    Core(#[from] CoreError),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("json serialization error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("unsupported engine: {0}")]
    UnsupportedEngine(String),
}

#[derive(Parser, Debug)]
#[command(
    name = "fkguard",
    version,
    about = "Foreign key dependency ordering, cycle detection and integrity repair"
)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,
    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug)]
struct GlobalArgs {
    /// Database connection string (overrides FKGUARD_DATABASE_URL and DATABASE_URL).
    #[arg(long, global = true, value_name = "CONNECTION_STRING")]
    database_url: Option<String>,
    /// Config file; defaults to fkguard.toml when present.
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Append JSON log lines to this file instead of logging to stderr.
    #[arg(long, global = true, value_name = "PATH")]
    log_file: Option<PathBuf>,
    /// Write the JSON report here instead of stdout.
    #[arg(long, global = true, value_name = "PATH")]
    out: Option<PathBuf>,
    /// Maximum pool connections.
    #[arg(long, global = true)]
    max_connections: Option<u32>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List tables so that every table follows the tables it references.
    Order(OrderArgs),
    /// List tables involved in foreign key cycles.
    Cycles,
    /// Show every table one table transitively depends on.
    Deps(DepsArgs),
    /// Report foreign keys with orphaned child rows.
    Audit(AuditArgs),
    /// Repair orphaned rows by nullifying or deleting them.
    Fix(FixArgs),
}

#[derive(Args, Debug)]
struct OrderArgs {
    /// Restrict ordering to one schema.
    #[arg(long)]
    schema: Option<String>,
    /// Place smaller tables first among tables that are ready.
    #[arg(long, default_value_t = false)]
    by_size: bool,
}

#[derive(Args, Debug)]
struct DepsArgs {
    schema: String,
    table: String,
}

#[derive(Args, Debug)]
struct AuditArgs {
    #[arg(long)]
    schema: Option<String>,
    #[arg(long)]
    table: Option<String>,
    /// Only audit foreign keys declared ON DELETE SET NULL.
    #[arg(long, default_value_t = false)]
    nullable_only: bool,
}

#[derive(Args, Debug)]
struct FixArgs {
    #[arg(long)]
    schema: Option<String>,
    #[arg(long)]
    table: Option<String>,
    /// Also repair foreign keys that are not ON DELETE SET NULL (by deleting rows).
    #[arg(long, default_value_t = false)]
    all_rules: bool,
    /// Delete orphaned rows even where they could be nullified.
    #[arg(long, default_value_t = false)]
    force_delete: bool,
    /// Confirm that rows may be updated or deleted.
    #[arg(long, default_value_t = false)]
    yes: bool,
}

impl Command {
    fn name(&self) -> &'static str {
        match self {
            Command::Order(_) => "order",
            Command::Cycles => "cycles",
            Command::Deps(_) => "deps",
            Command::Audit(_) => "audit",
            Command::Fix(_) => "fix",
        }
    }
}

impl GlobalArgs {
    fn overrides(&self) -> Overrides {
        Overrides {
            database_url: self.database_url.clone(),
            max_connections: self.max_connections,
            log_file: self.log_file.clone(),
        }
    }
}

/// Output of a command: the JSON result, plus the error that cut it short.
struct Outcome {
    result: serde_json::Value,
    error: Option<CoreError>,
}

impl Outcome {
    fn complete<T: serde::Serialize>(value: &T) -> Result<Self, CliError> {
        Ok(Self {
            result: serde_json::to_value(value)?,
            error: None,
        })
    }
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    let cli = Cli::parse();

    let file = config::load_file_config(cli.global.config.as_deref())?;
    let settings = Settings::resolve(cli.global.overrides(), file, |key| {
        std::env::var(key).ok()
    })?;
    init_logging(settings.log_file.as_deref())?;

    if let Command::Fix(args) = &cli.command {
        if !args.yes {
            return Err(CliError::InvalidConfig(
                "fix updates or deletes rows; pass --yes to confirm".to_string(),
            ));
        }
    }

    run(cli, settings).await
}

async fn run(cli: Cli, settings: Settings) -> Result<(), CliError> {
    let dialect = detect_engine(&settings.database_url)?;
    let run_id = Uuid::new_v4().to_string();
    let started_at = chrono::Utc::now();
    let connection = redact_connection_string(&settings.database_url);
    let command = cli.command.name();

    tracing::info!(
        event = "run_started",
        run_id = %run_id,
        engine = dialect.engine(),
        command,
        connection = %connection.redacted
    );
    let timer = Instant::now();

    let options = CatalogOptions {
        excluded_schemas: settings.excluded_schemas.clone(),
    };
    let outcome = match dialect {
        Dialect::Postgres => {
            let pool = PgPoolOptions::new()
                .max_connections(settings.max_connections)
                .acquire_timeout(settings.acquire_timeout)
                .connect(&settings.database_url)
                .await?;
            let catalog = PostgresCatalog::with_options(pool, options);
            execute(&catalog, &cli.command).await?
        }
        Dialect::MySql => {
            let pool = MySqlPoolOptions::new()
                .max_connections(settings.max_connections)
                .acquire_timeout(settings.acquire_timeout)
                .connect(&mysql_url(&settings.database_url))
                .await?;
            let catalog = MySqlCatalog::with_options(pool, options);
            execute(&catalog, &cli.command).await?
        }
    };

    let report = RunReport {
        run_id: run_id.clone(),
        started_at,
        engine: dialect.engine().to_string(),
        connection,
        command: command.to_string(),
        result: outcome.result,
        error: outcome.error.as_ref().map(ToString::to_string),
    };
    write_report(&report, cli.global.out.as_deref())?;

    let duration_ms = timer.elapsed().as_millis();
    match outcome.error {
        Some(err) => {
            tracing::error!(event = "run_finished", status = "failed", duration_ms = duration_ms);
            Err(err.into())
        }
        None => {
            tracing::info!(event = "run_finished", status = "success", duration_ms = duration_ms);
            Ok(())
        }
    }
}

async fn execute<C>(catalog: &C, command: &Command) -> Result<Outcome, CliError>
where
    C: CatalogReader + ?Sized,
{
    match command {
        Command::Order(args) => {
            let options = OrderOptions {
                schema: args.schema.clone(),
                by_size: args.by_size,
            };
            Outcome::complete(&order_tables(catalog, &options).await?)
        }
        Command::Cycles => Outcome::complete(&find_cycles(catalog, None).await?),
        Command::Deps(args) => {
            let table = TableRef::new(&args.schema, &args.table);
            Outcome::complete(&resolve_dependencies(catalog, &table).await?)
        }
        Command::Audit(args) => {
            let filter = AuditFilter {
                schema: args.schema.clone(),
                table: args.table.clone(),
                nullable_only: args.nullable_only,
            };
            Outcome::complete(&find_violations(catalog, &filter).await?)
        }
        Command::Fix(args) => {
            let options = RemediationOptions {
                schema: args.schema.clone(),
                table: args.table.clone(),
                nullable_only: !args.all_rules,
                force_delete: args.force_delete,
            };
            match fix_violations(catalog, &options).await {
                Ok(fixed) => Outcome::complete(&fixed),
                // Report what was repaired before the failure.
                Err(CoreError::Remediation {
                    constraint,
                    fixed,
                    source,
                }) => Ok(Outcome {
                    result: serde_json::to_value(&fixed)?,
                    error: Some(CoreError::Remediation {
                        constraint,
                        fixed,
                        source,
                    }),
                }),
                Err(err) => Err(err.into()),
            }
        }
    }
}

fn detect_engine(conn: &str) -> Result<Dialect, CliError> {
    let scheme = conn
        .split_once("://")
        .map(|(scheme, _)| scheme.to_ascii_lowercase());
    match scheme.as_deref() {
        Some("postgres" | "postgresql") => Ok(Dialect::Postgres),
        Some("mysql" | "mariadb") => Ok(Dialect::MySql),
        _ => Err(CliError::UnsupportedEngine(
            redact_connection_string(conn).redacted,
        )),
    }
}

/// The MySQL driver only understands the `mysql` scheme.
fn mysql_url(conn: &str) -> String {
    match conn.split_once("://") {
        Some((scheme, rest)) if scheme.eq_ignore_ascii_case("mariadb") => {
            format!("mysql://{rest}")
        }
        _ => conn.to_string(),
    }
}
