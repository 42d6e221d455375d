//! Dominio puro: documento de esquema, motor de patches JSON, deparser DDL y
//! modelo de requerimientos / casos de prueba. Sin IO.

pub mod ddl;
pub mod error;
pub mod patch;
pub mod requirements;
pub mod schema;
pub mod testcase;

pub use ddl::{to_ddl, DdlOutput, DeparseError};
pub use error::{PatchError, SchemaError};
pub use patch::{apply_patch, diff, PatchOperation};
pub use requirements::{AnalyzedRequirements, RequirementItem, RequirementKind};
pub use schema::{Column, Constraint, DefaultValue, EnumType, Extension, ForeignKeyAction, Index, Schema, Table};
pub use testcase::{DmlKind, DmlOperation, RequirementRef, TestResult, Testcase};
