//! Pipeline entry points for collector operations.
//!
//! - `run_collect`: Fetch new results for every rule and advance cursors
//! - `run_enrich`: Flatten collected results into tables
//! - `run_validate`: Check configuration and credentials

pub mod collect;
pub mod enrich;
pub mod validate;

pub use collect::{CollectionSummary, Collector, RuleOutcome, RunPlan, run_collect};
pub use enrich::{EnrichSummary, EnrichedTables, run_enrich};
pub use validate::run_validate;
