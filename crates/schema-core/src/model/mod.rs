pub mod branch;
pub mod config;
pub mod state;

pub use branch::{BranchFailure, BranchOutput, BranchState};
pub use config::WorkflowConfig;
pub use state::{DmlFailure, SchemaCandidate, ValidationReport, WorkflowState};
