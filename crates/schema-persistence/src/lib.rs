//! schema-persistence
//!
//! Implementaciones Postgres (Diesel + r2d2) de los contratos del núcleo:
//! - `pg::PgSchemaRepository`: versiones de esquema con concurrencia optimista,
//!   timeline y artifacts.
//! - `pg::PgSqlExecutor`: ejecución de validación con un savepoint por
//!   sentencia, revertida al final salvo configuración explícita.
//! - `migrations`: runner embebido de migraciones.
//! - `config`: carga de configuración desde `.env`.
//! - `schema`: tablas Diesel.

pub mod config;
pub mod error;
pub mod migrations;
pub mod pg;
pub mod schema;

pub use config::{init_dotenv, DbConfig};
pub use error::PersistenceError;
pub use pg::{build_dev_pool_from_env, build_pool, ConnectionProvider, PgPool, PgSchemaRepository, PgSqlExecutor,
             PoolProvider};
