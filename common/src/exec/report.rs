use crate::db::ResultSet;
use serde::Serialize;

/// What happened to one statement of a batch.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StatementOutcome {
    Rows {
        sql: String,
        table: String,
        result: ResultSet,
    },
    Inserted {
        sql: String,
        table: String,
        rows: usize,
    },
    Executed {
        sql: String,
        table: String,
        affected: usize,
    },
    Skipped {
        sql: String,
        table: String,
        reason: String,
    },
    Failed {
        sql: String,
        table: String,
        error: String,
    },
}

impl StatementOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            StatementOutcome::Skipped { .. } | StatementOutcome::Failed { .. }
        )
    }
}

/// Ordered outcomes of one batch. No outcomes means the input held no
/// statement at all.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchReport {
    pub outcomes: Vec<StatementOutcome>,
    /// set when a database error stopped the batch early
    pub aborted: bool,
}

impl BatchReport {
    pub fn no_statements(&self) -> bool {
        self.outcomes.is_empty() && !self.aborted
    }

    pub fn has_failures(&self) -> bool {
        self.aborted || self.outcomes.iter().any(StatementOutcome::is_failure)
    }
}
