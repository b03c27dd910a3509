use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use tokio::sync::mpsc;
use tracing::info;

use litfilter_core::ai::{PromptTemplate, RowScorer, ScoreExtractor};
use litfilter_core::pipeline::{RetryPolicy, RunSummary};
use litfilter_core::sheet::{read_sheet, write_export, ExportOptions};
use litfilter_core::{
    AppConfig, BatchPipeline, CancellationToken, PipelineOptions, RunEvent, RunOutcome, ScoreStatus,
};

use crate::ScoreArgs;

pub async fn run(config: &AppConfig, args: ScoreArgs) -> Result<()> {
    let threshold = args.threshold.unwrap_or(config.filter.threshold);
    if !(0.0..=1.0).contains(&threshold) {
        bail!("Threshold must be between 0 and 1, got {}", threshold);
    }

    let provider = super::resolve_provider(config, &args.provider)?;

    // Load the spreadsheet and map its columns
    let sheet = read_sheet(&args.input)?;
    let mut mapping = config.filter.column_mapping();
    if let Some(title) = args.title_col {
        mapping.title = title;
    }
    if args.abstract_col.is_some() {
        mapping.abstract_text = args.abstract_col;
    }
    if args.keywords_col.is_some() {
        mapping.keywords = args.keywords_col;
    }
    if args.categories_col.is_some() {
        mapping.categories = args.categories_col;
    }

    let mut rows = sheet.publication_rows(&mapping).with_context(|| {
        format!(
            "Check the column names with `litfilter columns --input {}`",
            args.input.display()
        )
    })?;
    if let Some(max) = args.max_records {
        rows.truncate(max);
    }
    if rows.is_empty() {
        println!("No rows to score in {}", args.input.display());
        return Ok(());
    }

    let template = match args.prompt_file.or_else(|| config.filter.prompt_template_path()) {
        Some(path) => {
            let text = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read prompt template {}", path.display()))?;
            PromptTemplate::custom(text)?
        }
        None => PromptTemplate::default(),
    };
    let extractor = ScoreExtractor::default().with_verbal_scale(args.verbal_scale);

    let retry = RetryPolicy::new(
        args.max_attempts.unwrap_or(config.ai.max_attempts),
        Duration::from_millis(config.ai.backoff_base_ms),
    );
    let options = PipelineOptions::default()
        .with_concurrency(args.concurrency.unwrap_or(config.ai.concurrency))
        .with_retry(retry)
        .with_scorer(RowScorer::new(template, extractor));
    let pipeline = BatchPipeline::new(options);

    println!(
        "Scoring {} rows with {} ({}), {} at a time. Press Ctrl+C to stop.",
        rows.len(),
        provider.kind.display_name(),
        provider.model,
        pipeline.options().concurrency
    );

    // Ctrl+C stops admitting rows; rows already sent still finish
    let cancel = CancellationToken::new();
    let signal_token = cancel.clone();
    let signal_task = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received interrupt, cancelling run");
            eprintln!("\nCancelling: waiting for rows in flight...");
            signal_token.cancel();
        }
    });

    let (event_tx, event_rx) = mpsc::unbounded_channel();
    let progress_task = tokio::spawn(print_progress(event_rx));

    let result = pipeline
        .run(rows, &args.topic, &provider, &cancel, Some(event_tx))
        .await;
    signal_task.abort();
    let report = result?;
    progress_task.await.ok();

    // Partial results are exported too
    let export = ExportOptions {
        threshold,
        include_all: args.all_rows,
        model_info: true,
    };
    let written = write_export(&args.output, &sheet, &report, &export)?;
    let summary = report.summary();

    println!();
    print_summary(&summary, written.matched, threshold);
    println!("Wrote {} rows to {}", written.rows_written, args.output.display());

    match &report.outcome {
        RunOutcome::Completed if summary.failed() > 0 => {
            println!(
                "Completed, but {} of {} rows failed ({} unparseable replies, {} provider errors).",
                summary.failed(),
                summary.total,
                summary.parse_failures,
                summary.provider_errors
            );
            Ok(())
        }
        RunOutcome::Completed if written.matched == 0 => {
            println!("Completed: no publication reached the threshold of {}.", threshold);
            Ok(())
        }
        RunOutcome::Completed => {
            println!("Completed: {} relevant publications.", written.matched);
            Ok(())
        }
        RunOutcome::Cancelled => {
            println!(
                "Cancelled: {} rows were not scored. Partial results were saved.",
                summary.cancelled
            );
            Ok(())
        }
        RunOutcome::Aborted(error) => Err(anyhow!(
            "Run aborted: {}. {} rows were not scored; partial results were saved.",
            error,
            summary.cancelled
        )),
        RunOutcome::Faulted(reason) => Err(anyhow!(
            "Run stopped after an internal fault: {}. {} rows were not scored; partial results were saved.",
            reason,
            summary.cancelled
        )),
    }
}

async fn print_progress(mut events: mpsc::UnboundedReceiver<RunEvent>) {
    while let Some(event) = events.recv().await {
        match event {
            RunEvent::RowFinished {
                completed,
                total,
                row_id,
                status,
                score,
            } => {
                let detail = match (status, score) {
                    (ScoreStatus::Success, Some(score)) => format!("{:.2}", score),
                    (status, _) => status.to_string(),
                };
                println!("[{}/{}] row {}: {}", completed, total, row_id + 1, detail);
            }
            RunEvent::RowRetrying {
                row_id,
                attempt,
                delay,
                reason,
            } => {
                println!(
                    "        row {}: {} (attempt {} in {:.1}s)",
                    row_id + 1,
                    reason,
                    attempt,
                    delay.as_secs_f64()
                );
            }
            RunEvent::Started { .. } | RunEvent::Finished { .. } => {}
        }
    }
}

fn print_summary(summary: &RunSummary, matched: usize, threshold: f64) {
    println!("Rows:             {}", summary.total);
    println!("Scored:           {}", summary.succeeded);
    println!("Matched (>= {}): {}", threshold, matched);
    if summary.parse_failures > 0 {
        println!("Unparseable:      {}", summary.parse_failures);
    }
    if summary.provider_errors > 0 {
        println!("Provider errors:  {}", summary.provider_errors);
    }
    if summary.skipped > 0 {
        println!("Skipped (blank):  {}", summary.skipped);
    }
    if summary.cancelled > 0 {
        println!("Not scored:       {}", summary.cancelled);
    }
}
