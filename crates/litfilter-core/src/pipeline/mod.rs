//! Batch scoring: bounded concurrency, per-row retry, cancellation and the run report.

mod cancellation;
mod report;
mod retry;
mod runner;

pub use cancellation::CancellationToken;
pub use report::{filter_results, passes, RunOutcome, RunReport, RunSummary};
pub use retry::{call_with_retry, RetryOutcome, RetryPolicy, DEFAULT_BASE_DELAY, DEFAULT_MAX_ATTEMPTS, DEFAULT_MAX_DELAY};
pub use runner::{BatchPipeline, PipelineOptions, RunEvent, RunState, DEFAULT_CONCURRENCY, MAX_CONCURRENCY};
