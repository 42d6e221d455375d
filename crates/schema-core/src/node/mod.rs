pub mod definition;
pub mod transition;

pub use definition::{BranchNode, WorkflowNode};
pub use transition::{Route, Transition};
