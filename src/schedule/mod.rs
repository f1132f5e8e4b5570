pub mod types;
pub mod ledger;
pub mod quota;
pub mod engine;

pub use types::{DeclineReason, Evaluation, MonthChoice, Outcome, PerformerRecord, RequestedTime};
pub use ledger::{CapacityLedger, MonthCapacity};
pub use quota::{SchoolExceptions, SchoolQuotaTracker};
pub use engine::{assign, AssignmentEngine, RunContext, RunResult};
