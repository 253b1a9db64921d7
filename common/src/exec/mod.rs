pub mod executor;
pub mod render;
pub mod report;

pub use executor::Executor;
pub use render::{render_json, render_report, render_table, to_pretty_json};
pub use report::{BatchReport, StatementOutcome};
