//! CLI de operación sobre el repositorio Postgres.
//!
//! `schemaflow <comando> --session <UUID>`; requiere `DATABASE_URL`.
//! Códigos de salida: 0 ok, 1 validación con fallos, 4 sesión inexistente,
//! 5 error de backend.

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use log::info;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use schema_core::repo::{RepositoryError, SchemaRepository};
use schema_core::sql::{ExecutorError, SqlExecutor};
use schema_domain::to_ddl;
use schema_persistence::{build_pool, DbConfig, PersistenceError, PgSchemaRepository, PgSqlExecutor, PoolProvider};

#[derive(Parser, Debug)]
#[command(name = "schemaflow", version, about = "Inspect and operate versioned design schemas")]
struct Cli {
    /// Sesión de diseño
    #[arg(short, long, global = true, env = "SCHEMAFLOW_SESSION")]
    session: Option<Uuid>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Imprime el DDL del esquema vigente
    Ddl,
    /// Lista las versiones del esquema
    Versions {
        /// Incluye el patch de cada versión
        #[arg(long)]
        patches: bool,
    },
    /// Agrega una versión que restaura el documento de `--to`
    Rollback {
        #[arg(long)]
        to: i64,
    },
    /// Ejecuta el DDL vigente contra la base (revertido salvo `--commit`)
    Validate {
        #[arg(long)]
        commit: bool,
    },
    /// Muestra la línea de tiempo de la sesión
    Timeline,
}

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("--session is required")]
    MissingSession,
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    Executor(#[from] ExecutorError),
    #[error("cannot render DDL: {0}")]
    Ddl(String),
}

impl CliError {
    fn exit_code(&self) -> ExitCode {
        match self {
            CliError::MissingSession => ExitCode::from(2),
            CliError::Repository(RepositoryError::NotFound { .. }) => ExitCode::from(4),
            _ => ExitCode::from(5),
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode, CliError> {
    let session = cli.session.ok_or(CliError::MissingSession)?;
    let cfg = DbConfig::from_env()?;
    let pool = build_pool(&cfg.url, cfg.min_connections, cfg.max_connections)?;
    let repo = PgSchemaRepository::new(PoolProvider { pool: pool.clone() });
    let snapshot = repo.get_schema(session).await?;

    match cli.command {
        Command::Ddl => {
            let ddl = to_ddl(&snapshot.schema);
            if let Some(err) = ddl.errors.first() {
                return Err(CliError::Ddl(err.to_string()));
            }
            println!("{}", ddl.sql());
        }
        Command::Versions { patches } => {
            println!("schema {} latest={}", snapshot.schema_id, snapshot.latest_version_number);
            for version in repo.list_versions(snapshot.schema_id).await? {
                println!("v{} {} op(s) {}",
                         version.number,
                         version.patch.len(),
                         version.created_at.to_rfc3339());
                if patches {
                    println!("{}", serde_json::to_string_pretty(&version.patch).unwrap_or_default());
                }
            }
        }
        Command::Rollback { to } => {
            let out = repo.rollback_to(snapshot.schema_id, to, snapshot.latest_version_number).await?;
            info!("rolled back session {session} to version {to}");
            println!("restored version {to} as version {}", out.version_number);
        }
        Command::Validate { commit } => {
            let ddl = to_ddl(&snapshot.schema);
            if let Some(err) = ddl.errors.first() {
                return Err(CliError::Ddl(err.to_string()));
            }
            let executor = PgSqlExecutor::new(PoolProvider { pool }).with_commit(commit || cfg.commit_validation);
            let results = executor.execute(&ddl.sql(), &snapshot.schema.extension_names()).await?;
            let mut failed = 0;
            for result in &results {
                match result.error_message() {
                    Some(message) => {
                        failed += 1;
                        println!("FAIL {}\n     {message}", result.sql);
                    }
                    None => println!("ok   {} ({} ms)", result.sql.lines().next().unwrap_or(""), result.metadata.execution_time_ms),
                }
            }
            println!("{} statement(s), {failed} failed", results.len());
            if failed > 0 {
                return Ok(ExitCode::from(1));
            }
        }
        Command::Timeline => {
            for item in repo.list_timeline_items(session).await? {
                println!("{} [{}] {}", item.created_at.to_rfc3339(), item.kind.as_str(), item.content);
            }
        }
    }
    Ok(ExitCode::SUCCESS)
}

#[tokio::main]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt().with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
                             .with_writer(std::io::stderr)
                             .init();
    let cli = Cli::parse();
    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("[schemaflow] {e}");
            e.exit_code()
        }
    }
}
