//! Suite-level reporting: per-case reports plus run metadata, serializable
//! for machine consumption (`--json`).

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::runner::CaseReport;

#[derive(Debug, Serialize)]
pub struct SuiteReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub cases: Vec<CaseReport>,
}

impl SuiteReport {
    pub fn new(started_at: DateTime<Utc>, cases: Vec<CaseReport>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at,
            finished_at: Utc::now(),
            cases,
        }
    }

    /// (passed, failed) case counts.
    pub fn tally(&self) -> (usize, usize) {
        let passed = self.cases.iter().filter(|c| c.passed()).count();
        (passed, self.cases.len() - passed)
    }

    pub fn all_passed(&self) -> bool {
        self.cases.iter().all(CaseReport::passed)
    }
}
