use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::mpsc;
use tokio::task::{self, JoinError, JoinSet};
use uuid::Uuid;

use super::cancellation::CancellationToken;
use super::report::{RunOutcome, RunReport, RunSummary};
use super::retry::{call_with_retry, RetryOutcome, RetryPolicy};
use crate::ai::providers::{self, AiProvider, ProviderConfig};
use crate::ai::RowScorer;
use crate::model::{PublicationRow, ScoreResult, ScoreStatus};
use crate::{Error, ProviderError, Result};

pub const DEFAULT_CONCURRENCY: usize = 2;
pub const MAX_CONCURRENCY: usize = 16;

/// Progress notifications for the caller (CLI progress line, UI, ...)
#[derive(Debug, Clone)]
pub enum RunEvent {
    Started {
        run_id: Uuid,
        total: usize,
    },
    /// A row failed transiently and will be attempted again after `delay`
    RowRetrying {
        row_id: usize,
        attempt: u32,
        delay: Duration,
        reason: String,
    },
    RowFinished {
        completed: usize,
        total: usize,
        row_id: usize,
        status: ScoreStatus,
        score: Option<f64>,
    },
    Finished {
        outcome: RunOutcome,
        summary: RunSummary,
    },
}

#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Rows in flight at once, clamped to 1..=16
    pub concurrency: usize,
    pub retry: RetryPolicy,
    pub scorer: RowScorer,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            retry: RetryPolicy::default(),
            scorer: RowScorer::default(),
        }
    }
}

impl PipelineOptions {
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.clamp(1, MAX_CONCURRENCY);
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_scorer(mut self, scorer: RowScorer) -> Self {
        self.scorer = scorer;
        self
    }
}

/// Progress of the current run, owned and updated only by the driver loop
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunState {
    pub total: usize,
    pub completed: usize,
    /// Row whose result was recorded last
    pub current_row: Option<usize>,
    pub cancelled: bool,
}

impl RunState {
    fn start(total: usize) -> Self {
        Self {
            total,
            ..Self::default()
        }
    }

    fn record(&mut self, row_id: usize) {
        self.completed += 1;
        self.current_row = Some(row_id);
    }
}

/// What a row task hands back to the driver
enum TaskOutcome {
    Finished(ScoreResult),
    /// The provider rejected our credentials; no other row can succeed either
    Fatal {
        row_id: usize,
        error: ProviderError,
        attempts: u32,
    },
}

/// Input position and row id of a spawned task
type TaskSlot = (usize, usize);

/// Scores a batch of rows against one topic with bounded concurrency
pub struct BatchPipeline {
    options: PipelineOptions,
}

impl Default for BatchPipeline {
    fn default() -> Self {
        Self::new(PipelineOptions::default())
    }
}

impl BatchPipeline {
    pub fn new(options: PipelineOptions) -> Self {
        let options = PipelineOptions {
            concurrency: options.concurrency.clamp(1, MAX_CONCURRENCY),
            ..options
        };
        Self { options }
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    /// Validate the provider configuration, build its client and score `rows`
    pub async fn run(
        &self,
        rows: Vec<PublicationRow>,
        topic: &str,
        config: &ProviderConfig,
        cancel: &CancellationToken,
        events: Option<mpsc::UnboundedSender<RunEvent>>,
    ) -> Result<RunReport> {
        if topic.trim().is_empty() {
            return Err(Error::Config("Research topic is empty".to_string()));
        }
        let provider = providers::build(config)?;
        self.run_with_provider(rows, topic, provider, cancel, events).await
    }

    /// Score `rows` with an already built provider.
    ///
    /// The report holds exactly one result per input row, in input order.
    /// Provider and parse failures are recorded per row. A panicking row task
    /// stops the run with [`RunOutcome::Faulted`] and keeps every result
    /// recorded before it.
    pub async fn run_with_provider(
        &self,
        rows: Vec<PublicationRow>,
        topic: &str,
        provider: Arc<dyn AiProvider>,
        cancel: &CancellationToken,
        events: Option<mpsc::UnboundedSender<RunEvent>>,
    ) -> Result<RunReport> {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let total = rows.len();
        let row_ids: Vec<usize> = rows.iter().map(|r| r.id).collect();
        let topic: Arc<str> = Arc::from(topic.trim());
        let scorer = Arc::new(self.options.scorer.clone());

        tracing::info!(
            %run_id,
            total,
            provider = %provider.kind(),
            model = provider.model(),
            concurrency = self.options.concurrency,
            "Starting scoring run"
        );
        emit(&events, RunEvent::Started { run_id, total });

        let mut slots: Vec<Option<ScoreResult>> = vec![None; total];
        let mut state = RunState::start(total);
        let mut pending = rows.into_iter().enumerate();
        let mut join_set: JoinSet<TaskOutcome> = JoinSet::new();
        let mut in_flight: HashMap<task::Id, TaskSlot> = HashMap::new();
        let mut stopped_admitting = false;
        let mut aborted: Option<ProviderError> = None;
        let mut fault: Option<String> = None;

        let spawn_next = |join_set: &mut JoinSet<TaskOutcome>,
                          in_flight: &mut HashMap<task::Id, TaskSlot>,
                          pending: &mut std::iter::Enumerate<std::vec::IntoIter<PublicationRow>>,
                          stopped_admitting: &mut bool| {
            if *stopped_admitting {
                return;
            }
            if cancel.is_cancelled() {
                tracing::info!(%run_id, "Run cancelled, no further rows admitted");
                *stopped_admitting = true;
                return;
            }
            if let Some((index, row)) = pending.next() {
                let row_id = row.id;
                let id = spawn_row(
                    join_set,
                    row,
                    Arc::clone(&topic),
                    Arc::clone(&provider),
                    Arc::clone(&scorer),
                    self.options.retry,
                    cancel.clone(),
                    events.clone(),
                );
                in_flight.insert(id, (index, row_id));
            }
        };

        for _ in 0..self.options.concurrency {
            spawn_next(&mut join_set, &mut in_flight, &mut pending, &mut stopped_admitting);
        }

        while let Some(joined) = join_set.join_next_with_id().await {
            let id = match &joined {
                Ok((id, _)) => *id,
                Err(e) => e.id(),
            };
            let Some((index, row_id)) = in_flight.remove(&id) else {
                continue;
            };

            let result = match joined {
                Ok((_, TaskOutcome::Finished(result))) => result,
                Ok((_, TaskOutcome::Fatal { row_id, error, attempts })) => {
                    tracing::error!(%run_id, row = row_id, error = %error, "Fatal provider error, aborting run");
                    join_set.abort_all();
                    let result = ScoreResult::provider_error(row_id, error.to_string(), attempts);
                    aborted = Some(error);
                    result
                }
                Err(e) => {
                    tracing::error!(%run_id, row = row_id, error = %e, "Row task failed unexpectedly, stopping run");
                    join_set.abort_all();
                    let result = faulted_row(row_id, &e);
                    fault = Some(e.to_string());
                    result
                }
            };

            state.record(result.row_id);
            emit(
                &events,
                RunEvent::RowFinished {
                    completed: state.completed,
                    total: state.total,
                    row_id: result.row_id,
                    status: result.status,
                    score: result.score,
                },
            );
            slots[index] = Some(result);

            if aborted.is_some() || fault.is_some() {
                break;
            }
            spawn_next(&mut join_set, &mut in_flight, &mut pending, &mut stopped_admitting);
        }

        // Rows that finished between the abort and their cancellation keep their result
        while let Some(joined) = join_set.join_next_with_id().await {
            let id = match &joined {
                Ok((id, _)) => *id,
                Err(e) => e.id(),
            };
            let Some((index, row_id)) = in_flight.remove(&id) else {
                continue;
            };
            match joined {
                Ok((_, TaskOutcome::Finished(result))) => slots[index] = Some(result),
                Ok((_, TaskOutcome::Fatal { row_id, error, attempts })) => {
                    slots[index] = Some(ScoreResult::provider_error(row_id, error.to_string(), attempts));
                }
                Err(e) if e.is_cancelled() => {}
                Err(e) => {
                    tracing::error!(%run_id, row = row_id, error = %e, "Row task failed unexpectedly");
                    slots[index] = Some(faulted_row(row_id, &e));
                    fault.get_or_insert_with(|| e.to_string());
                }
            }
        }

        state.cancelled = cancel.is_cancelled();
        tracing::debug!(%run_id, ?state, "Driver loop finished");

        let results: Vec<ScoreResult> = slots
            .into_iter()
            .zip(row_ids)
            .map(|(slot, row_id)| slot.unwrap_or_else(|| ScoreResult::cancelled(row_id, 0)))
            .collect();

        let outcome = match (aborted, fault) {
            (Some(error), _) => RunOutcome::Aborted(error),
            (None, Some(reason)) => RunOutcome::Faulted(reason),
            (None, None) if results.iter().any(|r| r.status == ScoreStatus::Cancelled) => RunOutcome::Cancelled,
            (None, None) => RunOutcome::Completed,
        };

        let report = RunReport {
            run_id,
            topic: topic.to_string(),
            provider: provider.kind(),
            model: provider.model().to_string(),
            results,
            outcome,
            started_at,
            finished_at: Utc::now(),
        };

        let summary = report.summary();
        tracing::info!(
            %run_id,
            outcome = %report.outcome,
            succeeded = summary.succeeded,
            failed = summary.failed(),
            skipped = summary.skipped,
            cancelled = summary.cancelled,
            "Scoring run finished"
        );
        emit(
            &events,
            RunEvent::Finished {
                outcome: report.outcome.clone(),
                summary,
            },
        );

        Ok(report)
    }
}

fn faulted_row(row_id: usize, error: &JoinError) -> ScoreResult {
    ScoreResult::provider_error(row_id, format!("row task failed: {}", error), 1)
}

#[allow(clippy::too_many_arguments)]
fn spawn_row(
    join_set: &mut JoinSet<TaskOutcome>,
    row: PublicationRow,
    topic: Arc<str>,
    provider: Arc<dyn AiProvider>,
    scorer: Arc<RowScorer>,
    retry: RetryPolicy,
    cancel: CancellationToken,
    events: Option<mpsc::UnboundedSender<RunEvent>>,
) -> task::Id {
    let handle = join_set.spawn(async move {
        let row_id = row.id;
        let outcome = call_with_retry(
            &retry,
            &cancel,
            |attempt, delay, error| {
                tracing::warn!(row = row_id, attempt, error = %error, "Retrying row");
                emit(
                    &events,
                    RunEvent::RowRetrying {
                        row_id,
                        attempt,
                        delay,
                        reason: error.to_string(),
                    },
                );
            },
            |attempt| scorer.attempt(&row, &topic, provider.as_ref(), attempt),
        )
        .await;

        let outcome = match outcome {
            RetryOutcome::Done { value, .. } => TaskOutcome::Finished(value),
            RetryOutcome::Failed { error, attempts } if error.is_fatal() => TaskOutcome::Fatal {
                row_id,
                error,
                attempts,
            },
            RetryOutcome::Failed { error, attempts } => {
                tracing::warn!(row = row_id, attempts, error = %error, "Row failed");
                TaskOutcome::Finished(ScoreResult::provider_error(row_id, error.to_string(), attempts))
            }
            RetryOutcome::Cancelled { attempts } => TaskOutcome::Finished(ScoreResult::cancelled(row_id, attempts)),
        };

        outcome
    });
    handle.id()
}

/// Progress is best effort: a dropped receiver must never stall a run
fn emit(events: &Option<mpsc::UnboundedSender<RunEvent>>, event: RunEvent) {
    if let Some(tx) = events {
        if tx.send(event).is_err() {
            tracing::trace!("Run event dropped: receiver gone");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::providers::{ApiKey, ProviderKind};
    use crate::ai::{PromptTemplate, ScoreExtractor};
    use std::sync::atomic::{AtomicUsize, Ordering};

    type Reply = Box<dyn Fn(usize, &str) -> std::result::Result<String, ProviderError> + Send + Sync>;
    type Delay = Box<dyn Fn(&str) -> Duration + Send + Sync>;

    /// Provider whose reply and latency are scripted per call; the prompt is the row title
    struct ScriptedProvider {
        calls: AtomicUsize,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
        delay: Delay,
        reply: Reply,
    }

    impl ScriptedProvider {
        fn new(reply: Reply) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                in_flight: AtomicUsize::new(0),
                max_in_flight: AtomicUsize::new(0),
                delay: Box::new(|_: &str| Duration::from_millis(10)),
                reply,
            }
        }

        fn with_delay(mut self, delay: Delay) -> Self {
            self.delay = delay;
            self
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait::async_trait]
    impl AiProvider for ScriptedProvider {
        fn kind(&self) -> ProviderKind {
            ProviderKind::OpenAi
        }

        fn model(&self) -> &str {
            "scripted"
        }

        async fn complete(&self, prompt: &str) -> std::result::Result<String, ProviderError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep((self.delay)(prompt)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            (self.reply)(call, prompt)
        }
    }

    fn rows(n: usize) -> Vec<PublicationRow> {
        (0..n).map(|i| PublicationRow::new(i, format!("Paper {}", i))).collect()
    }

    fn row_number(prompt: &str) -> usize {
        prompt.trim_start_matches("Paper ").parse().unwrap()
    }

    fn pipeline(concurrency: usize) -> BatchPipeline {
        let scorer = RowScorer::new(PromptTemplate::custom("{TITLE}").unwrap(), ScoreExtractor::default());
        BatchPipeline::new(
            PipelineOptions::default()
                .with_concurrency(concurrency)
                .with_scorer(scorer),
        )
    }

    async fn run(
        pipeline: &BatchPipeline,
        rows: Vec<PublicationRow>,
        provider: &Arc<ScriptedProvider>,
        cancel: &CancellationToken,
    ) -> RunReport {
        let provider: Arc<dyn AiProvider> = provider.clone();
        pipeline
            .run_with_provider(rows, "graph learning", provider, cancel, None)
            .await
            .unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_results_follow_input_order() {
        // Later rows answer first
        let provider = Arc::new(
            ScriptedProvider::new(Box::new(|_, prompt: &str| Ok(format!("0.{}", row_number(prompt)))))
                .with_delay(Box::new(|prompt: &str| Duration::from_millis(100 - 10 * row_number(prompt) as u64))),
        );

        let report = run(&pipeline(4), rows(8), &provider, &CancellationToken::new()).await;

        assert_eq!(report.outcome, RunOutcome::Completed);
        assert_eq!(report.results.len(), 8);
        for (i, result) in report.results.iter().enumerate() {
            assert_eq!(result.row_id, i);
            assert_eq!(result.status, ScoreStatus::Success);
            assert_eq!(result.score, Some(i as f64 / 10.0));
        }
        assert_eq!(report.provider, ProviderKind::OpenAi);
        assert_eq!(report.model, "scripted");
        assert_eq!(report.topic, "graph learning");
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrency_is_bounded() {
        let provider = Arc::new(ScriptedProvider::new(Box::new(|_, _: &str| Ok("0.5".to_string()))));

        let report = run(&pipeline(3), rows(12), &provider, &CancellationToken::new()).await;

        assert_eq!(report.summary().succeeded, 12);
        assert_eq!(provider.calls(), 12);
        assert_eq!(provider.max_in_flight.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_run_state_tracks_progress() {
        let mut state = RunState::start(3);
        state.record(2);
        state.record(0);
        assert_eq!(state.completed, 2);
        assert_eq!(state.current_row, Some(0));
        assert!(!state.cancelled);
    }

    #[test]
    fn test_concurrency_is_clamped() {
        assert_eq!(PipelineOptions::default().with_concurrency(0).concurrency, 1);
        assert_eq!(PipelineOptions::default().with_concurrency(64).concurrency, MAX_CONCURRENCY);
        let options = PipelineOptions {
            concurrency: 100,
            ..PipelineOptions::default()
        };
        assert_eq!(BatchPipeline::new(options).options().concurrency, MAX_CONCURRENCY);
    }

    #[tokio::test(start_paused = true)]
    async fn test_auth_failure_aborts_run() {
        let provider = Arc::new(
            ScriptedProvider::new(Box::new(|_, prompt: &str| {
                if row_number(prompt) == 0 {
                    Err(ProviderError::Auth("invalid api key".to_string()))
                } else {
                    Ok("0.9".to_string())
                }
            }))
            .with_delay(Box::new(|prompt: &str| {
                if row_number(prompt) == 0 {
                    Duration::ZERO
                } else {
                    Duration::from_millis(100)
                }
            })),
        );

        let report = run(&pipeline(2), rows(10), &provider, &CancellationToken::new()).await;

        assert!(matches!(report.outcome, RunOutcome::Aborted(ProviderError::Auth(_))));
        assert_eq!(report.results.len(), 10);
        let not_cancelled = report
            .results
            .iter()
            .filter(|r| r.status != ScoreStatus::Cancelled)
            .count();
        assert!(not_cancelled <= 1);
        assert_eq!(report.results[0].status, ScoreStatus::ProviderError);
        assert_eq!(report.results[0].attempts, 1);
        assert!(provider.calls() <= 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_panicking_row_keeps_earlier_results() {
        let provider = Arc::new(ScriptedProvider::new(Box::new(|_, prompt: &str| {
            if row_number(prompt) == 2 {
                panic!("scorer blew up");
            }
            Ok("0.8".to_string())
        })));

        let report = run(&pipeline(1), rows(5), &provider, &CancellationToken::new()).await;

        match &report.outcome {
            RunOutcome::Faulted(reason) => assert!(reason.contains("panicked")),
            other => panic!("unexpected outcome {:?}", other),
        }
        assert_eq!(report.results.len(), 5);
        assert_eq!(report.results[0].score, Some(0.8));
        assert_eq!(report.results[1].score, Some(0.8));
        assert_eq!(report.results[2].status, ScoreStatus::ProviderError);
        assert_eq!(report.results[2].row_id, 2);
        assert!(report.results[3..].iter().all(|r| r.status == ScoreStatus::Cancelled));
        assert_eq!(provider.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_failures_then_success() {
        let provider = Arc::new(ScriptedProvider::new(Box::new(|call, _: &str| match call {
            1 => Err(ProviderError::RateLimited {
                message: "too many requests".to_string(),
                retry_after: None,
            }),
            2 => Err(ProviderError::ProviderFault {
                status: 503,
                message: "overloaded".to_string(),
            }),
            _ => Ok("Relevance: 0.72".to_string()),
        })));
        let (tx, mut rx) = mpsc::unbounded_channel();

        let report = pipeline(1)
            .run_with_provider(rows(1), "graphs", provider.clone(), &CancellationToken::new(), Some(tx))
            .await
            .unwrap();

        assert_eq!(provider.calls(), 3);
        assert_eq!(report.results[0].status, ScoreStatus::Success);
        assert_eq!(report.results[0].score, Some(0.72));
        assert_eq!(report.results[0].attempts, 3);

        let mut retries = Vec::new();
        while let Ok(event) = rx.try_recv() {
            if let RunEvent::RowRetrying { attempt, delay, .. } = event {
                retries.push((attempt, delay));
            }
        }
        assert_eq!(
            retries,
            vec![(2, Duration::from_millis(500)), (3, Duration::from_millis(1000))]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_retries_do_not_stop_run() {
        let provider = Arc::new(ScriptedProvider::new(Box::new(|_, prompt: &str| {
            if row_number(prompt) == 1 {
                Err(ProviderError::Timeout)
            } else {
                Ok("0.3".to_string())
            }
        })));

        let report = run(&pipeline(2), rows(3), &provider, &CancellationToken::new()).await;

        assert_eq!(report.outcome, RunOutcome::Completed);
        assert_eq!(report.results[1].status, ScoreStatus::ProviderError);
        assert_eq!(report.results[1].attempts, 3);
        assert_eq!(report.results[1].detail.as_deref(), Some("request timed out"));
        assert_eq!(report.summary().succeeded, 2);
        assert_eq!(provider.calls(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unparseable_reply_is_a_row_failure() {
        let provider = Arc::new(ScriptedProvider::new(Box::new(|_, prompt: &str| {
            if row_number(prompt) == 0 {
                Ok("I cannot rate this publication.".to_string())
            } else {
                Ok("0.8".to_string())
            }
        })));

        let report = run(&pipeline(2), rows(2), &provider, &CancellationToken::new()).await;

        assert_eq!(report.outcome, RunOutcome::Completed);
        assert_eq!(report.results[0].status, ScoreStatus::ParseFailure);
        assert_eq!(report.results[0].score, None);
        assert_eq!(report.matched(0.5).len(), 1);
        // Not retried
        assert_eq!(provider.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_after_k_rows() {
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        let provider = Arc::new(ScriptedProvider::new(Box::new(move |call, _: &str| {
            if call == 2 {
                trigger.cancel();
            }
            Ok("0.6".to_string())
        })));

        let report = run(&pipeline(1), rows(6), &provider, &cancel).await;

        assert_eq!(report.outcome, RunOutcome::Cancelled);
        assert_eq!(report.results.len(), 6);
        let summary = report.summary();
        assert_eq!(summary.succeeded, 2);
        assert_eq!(summary.cancelled, 4);
        assert_eq!(provider.calls(), 2);
        let ids: Vec<usize> = report.results.iter().map(|r| r.row_id).collect();
        assert_eq!(ids, vec![0, 1, 2, 3, 4, 5]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_backoff_marks_row_cancelled() {
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        let provider = Arc::new(ScriptedProvider::new(Box::new(move |_, _: &str| {
            trigger.cancel();
            Err(ProviderError::Network("connection reset".to_string()))
        })));

        let report = run(&pipeline(1), rows(3), &provider, &cancel).await;

        assert_eq!(report.outcome, RunOutcome::Cancelled);
        assert_eq!(report.results[0].status, ScoreStatus::Cancelled);
        assert_eq!(report.results[0].attempts, 1);
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let provider = Arc::new(ScriptedProvider::new(Box::new(|_, _: &str| Ok("1".to_string()))));

        let report = run(&pipeline(2), rows(4), &provider, &cancel).await;

        assert_eq!(report.outcome, RunOutcome::Cancelled);
        assert_eq!(report.summary().cancelled, 4);
        assert_eq!(provider.calls(), 0);
    }

    #[tokio::test]
    async fn test_empty_batch() {
        let provider = Arc::new(ScriptedProvider::new(Box::new(|_, _: &str| Ok("1".to_string()))));
        let report = run(&pipeline(2), Vec::new(), &provider, &CancellationToken::new()).await;

        assert_eq!(report.outcome, RunOutcome::Completed);
        assert!(report.results.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_blank_rows_are_skipped() {
        let provider = Arc::new(ScriptedProvider::new(Box::new(|_, _: &str| Ok("0.9".to_string()))));
        let mut input = rows(3);
        input[1] = PublicationRow::new(1, "  ");

        let report = run(&pipeline(2), input, &provider, &CancellationToken::new()).await;

        assert_eq!(report.outcome, RunOutcome::Completed);
        assert_eq!(report.results[1].status, ScoreStatus::Skipped);
        assert_eq!(provider.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_progress_events() {
        let provider = Arc::new(ScriptedProvider::new(Box::new(|_, _: &str| Ok("0.4".to_string()))));
        let (tx, mut rx) = mpsc::unbounded_channel();

        pipeline(2)
            .run_with_provider(rows(3), "graphs", provider, &CancellationToken::new(), Some(tx))
            .await
            .unwrap();

        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }

        assert!(matches!(events.first(), Some(RunEvent::Started { total: 3, .. })));
        assert!(matches!(
            events.last(),
            Some(RunEvent::Finished { outcome: RunOutcome::Completed, .. })
        ));
        let progress: Vec<usize> = events
            .iter()
            .filter_map(|e| match e {
                RunEvent::RowFinished { completed, total: 3, .. } => Some(*completed),
                _ => None,
            })
            .collect();
        assert_eq!(progress, vec![1, 2, 3]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_receiver_does_not_stall() {
        let provider = Arc::new(ScriptedProvider::new(Box::new(|_, _: &str| Ok("0.4".to_string()))));
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);

        let report = pipeline(2)
            .run_with_provider(rows(5), "graphs", provider, &CancellationToken::new(), Some(tx))
            .await
            .unwrap();
        assert_eq!(report.summary().succeeded, 5);
    }

    #[tokio::test]
    async fn test_run_rejects_invalid_config() {
        let config = ProviderConfig::new(ProviderKind::OpenAi, "gpt-4o-mini", ApiKey::new(""));
        let err = pipeline(2)
            .run(rows(1), "graphs", &config, &CancellationToken::new(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));

        let config = ProviderConfig::new(ProviderKind::OpenAi, "gpt-4o-mini", ApiKey::new("sk-000000000000"));
        let err = pipeline(2)
            .run(rows(1), "  ", &config, &CancellationToken::new(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
