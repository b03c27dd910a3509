use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::ai::ProviderKind;
use crate::model::{ScoreResult, ScoreStatus};
use crate::ProviderError;

/// Inclusive relevance threshold; rows without a score never pass
pub fn passes(score: Option<f64>, threshold: f64) -> bool {
    score.is_some_and(|s| s >= threshold)
}

/// Results at or above `threshold`, in row order
pub fn filter_results(results: &[ScoreResult], threshold: f64) -> Vec<&ScoreResult> {
    results.iter().filter(|r| passes(r.score, threshold)).collect()
}

/// How a run ended
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    /// Every row was attempted
    Completed,
    /// The caller cancelled before every row was attempted
    Cancelled,
    /// A fatal provider error stopped the run
    Aborted(ProviderError),
    /// A row task panicked; the remaining rows were stopped
    Faulted(String),
}

impl RunOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunOutcome::Completed => "completed",
            RunOutcome::Cancelled => "cancelled",
            RunOutcome::Aborted(_) => "aborted",
            RunOutcome::Faulted(_) => "faulted",
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, RunOutcome::Completed)
    }
}

impl std::fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunOutcome::Aborted(e) => write!(f, "aborted: {}", e),
            RunOutcome::Faulted(reason) => write!(f, "faulted: {}", reason),
            other => f.write_str(other.as_str()),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub total: usize,
    pub succeeded: usize,
    pub parse_failures: usize,
    pub provider_errors: usize,
    pub skipped: usize,
    pub cancelled: usize,
}

impl RunSummary {
    pub fn failed(&self) -> usize {
        self.parse_failures + self.provider_errors
    }
}

/// Everything a run produced, one result per input row in input order
#[derive(Debug, Clone)]
pub struct RunReport {
    pub run_id: Uuid,
    pub topic: String,
    pub provider: ProviderKind,
    pub model: String,
    pub results: Vec<ScoreResult>,
    pub outcome: RunOutcome,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl RunReport {
    pub fn summary(&self) -> RunSummary {
        let mut summary = RunSummary {
            total: self.results.len(),
            ..RunSummary::default()
        };
        for result in &self.results {
            match result.status {
                ScoreStatus::Success => summary.succeeded += 1,
                ScoreStatus::ParseFailure => summary.parse_failures += 1,
                ScoreStatus::ProviderError => summary.provider_errors += 1,
                ScoreStatus::Skipped => summary.skipped += 1,
                ScoreStatus::Cancelled => summary.cancelled += 1,
            }
        }
        summary
    }

    pub fn matched(&self, threshold: f64) -> Vec<&ScoreResult> {
        filter_results(&self.results, threshold)
    }

    /// Result for a source row id
    pub fn result_for(&self, row_id: usize) -> Option<&ScoreResult> {
        self.results.iter().find(|r| r.row_id == row_id)
    }

    pub fn elapsed(&self) -> chrono::Duration {
        self.finished_at - self.started_at
    }
}
