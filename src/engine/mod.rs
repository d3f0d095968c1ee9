//! Plan, diff, and execution engine

pub mod differ;
pub mod executor;
pub mod planner;

pub use executor::{ExecuteOptions, ExecuteSummary, execute};
pub use planner::{ExecutionPlan, PostAction, build_plan};
