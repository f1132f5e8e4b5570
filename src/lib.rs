pub mod config;
pub mod error;
pub mod parser;
pub mod report;
pub mod schedule;
pub mod web;

pub use config::CycleConfig;
pub use error::{AssignError, Result};
pub use schedule::{assign, AssignmentEngine, Outcome, PerformerRecord, RunContext, RunResult};
