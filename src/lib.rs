pub mod cli;
pub mod config;
pub mod dateexpr;
pub mod period;
pub mod planner;
pub mod storage;
pub mod tasklist;
pub mod text;

pub use config::{AppConfig, ConfigLoader, ConfigPaths};
pub use dateexpr::DateExpr;
pub use period::Period;
pub use planner::{advance, AdvanceOutcome, PlannerError, PlannerState, Preferences};
pub use storage::{Changeset, DirectoryStore, MemoryStore, Store};
