use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use litfilter_core::ai::{AiProvider, ProviderKind};
use litfilter_core::pipeline::{RetryPolicy, RunOutcome};
use litfilter_core::sheet::{read_sheet, write_export, ColumnMapping, ExportOptions, SCORE_COLUMN, STATUS_COLUMN};
use litfilter_core::{BatchPipeline, CancellationToken, PipelineOptions, ProviderError, ScoreStatus};

/// Scores by keyword: anything mentioning "graph" is relevant
struct KeywordProvider {
    calls: AtomicUsize,
}

#[async_trait::async_trait]
impl AiProvider for KeywordProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Anthropic
    }

    fn model(&self) -> &str {
        "keyword-model"
    }

    async fn complete(&self, prompt: &str) -> Result<String, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let title = prompt
            .lines()
            .find_map(|l| l.strip_prefix("TITLE: "))
            .unwrap_or_default()
            .to_lowercase();
        if title.contains("unparseable") {
            Ok("I would rather not say.".to_string())
        } else if title.contains("graph") {
            Ok("Relevance score: 0.9".to_string())
        } else {
            Ok("0.1".to_string())
        }
    }
}

fn input_csv() -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
    writeln!(file, "Title,Abstract,Author Keywords,Year").unwrap();
    writeln!(file, "Graph neural networks,Message passing on molecules,GNN,2021").unwrap();
    writeln!(file, "Soil nitrogen cycles,Field study,agronomy,2018").unwrap();
    writeln!(file, ",,,").unwrap();
    writeln!(file, "Unparseable entry,Something,,2020").unwrap();
    writeln!(file, "Knowledge graph embeddings,\"Link prediction, at scale\",KG,2022").unwrap();
    file.flush().unwrap();
    file
}

#[tokio::test]
async fn test_spreadsheet_to_filtered_workbook() {
    let input = input_csv();
    let sheet = read_sheet(input.path()).unwrap();
    let mapping = ColumnMapping {
        keywords: Some("Author Keywords".to_string()),
        ..ColumnMapping::default()
    };
    let rows = sheet.publication_rows(&mapping).unwrap();
    assert_eq!(rows.len(), 5);

    let provider = Arc::new(KeywordProvider { calls: AtomicUsize::new(0) });
    let pipeline = BatchPipeline::new(PipelineOptions::default().with_concurrency(3));
    let report = pipeline
        .run_with_provider(rows, "graph learning", provider.clone(), &CancellationToken::new(), None)
        .await
        .unwrap();

    assert_eq!(report.outcome, RunOutcome::Completed);
    let statuses: Vec<ScoreStatus> = report.results.iter().map(|r| r.status).collect();
    assert_eq!(
        statuses,
        vec![
            ScoreStatus::Success,
            ScoreStatus::Success,
            ScoreStatus::Skipped,
            ScoreStatus::ParseFailure,
            ScoreStatus::Success,
        ]
    );
    // The blank row never reaches the provider
    assert_eq!(provider.calls.load(Ordering::SeqCst), 4);

    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("filtered.xlsx");
    let summary = write_export(&output, &sheet, &report, &ExportOptions::default()).unwrap();
    assert_eq!(summary.rows_written, 2);

    // The results sheet comes first, so it reads back as a plain sheet
    let exported = read_sheet(&output).unwrap();
    assert_eq!(
        exported.columns(),
        &["Title", "Abstract", "Author Keywords", "Year", SCORE_COLUMN, STATUS_COLUMN]
    );
    assert_eq!(exported.len(), 2);
    assert_eq!(exported.cell(0, 0), "Graph neural networks");
    assert_eq!(exported.cell(1, 1), "Link prediction, at scale");
    assert_eq!(exported.cell(1, 4), "0.9");
    assert_eq!(exported.cell(1, 5), "success");
}

#[tokio::test]
async fn test_csv_export_with_all_rows() {
    let input = input_csv();
    let sheet = read_sheet(input.path()).unwrap();
    let rows = sheet.publication_rows(&ColumnMapping::default()).unwrap();

    let provider = Arc::new(KeywordProvider { calls: AtomicUsize::new(0) });
    let pipeline = BatchPipeline::new(PipelineOptions::default().with_retry(RetryPolicy::no_retry()));
    let report = pipeline
        .run_with_provider(rows, "graphs", provider, &CancellationToken::new(), None)
        .await
        .unwrap();

    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("nested").join("all.csv");
    let options = ExportOptions {
        include_all: true,
        ..ExportOptions::default()
    };
    let summary = write_export(&output, &sheet, &report, &options).unwrap();
    assert_eq!(summary.rows_written, 5);
    assert_eq!(summary.matched, 2);

    let exported = read_sheet(&output).unwrap();
    assert_eq!(exported.len(), 5);
    assert_eq!(exported.cell(2, 5), "skipped");
    assert_eq!(exported.cell(3, 4), "");
    assert_eq!(exported.cell(3, 5), "parse_failure");
}

#[tokio::test]
async fn test_missing_mapped_column_is_reported() {
    let input = input_csv();
    let sheet = read_sheet(input.path()).unwrap();
    let mapping = ColumnMapping {
        categories: Some("WoS Categories".to_string()),
        ..ColumnMapping::default()
    };
    let err = sheet.publication_rows(&mapping).unwrap_err();
    assert_eq!(err.to_string(), "Column not found in spreadsheet: WoS Categories");
}
