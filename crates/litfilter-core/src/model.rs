use serde::{Deserialize, Serialize};

/// One publication read from the source spreadsheet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublicationRow {
    /// 0-based index of the data row in the source sheet (header excluded)
    pub id: usize,
    pub title: String,
    pub abstract_text: Option<String>,
    pub keywords: Option<String>,
    pub categories: Option<String>,
}

impl PublicationRow {
    pub fn new(id: usize, title: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
            abstract_text: None,
            keywords: None,
            categories: None,
        }
    }

    pub fn with_abstract(mut self, text: impl Into<String>) -> Self {
        self.abstract_text = Some(text.into());
        self
    }

    pub fn with_keywords(mut self, text: impl Into<String>) -> Self {
        self.keywords = Some(text.into());
        self
    }

    pub fn with_categories(mut self, text: impl Into<String>) -> Self {
        self.categories = Some(text.into());
        self
    }

    /// True when there is nothing worth sending to a model
    pub fn is_blank(&self) -> bool {
        self.title.trim().is_empty()
            && self.abstract_text.as_deref().map_or(true, |a| a.trim().is_empty())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreStatus {
    Success,
    ParseFailure,
    ProviderError,
    Cancelled,
    /// Row had neither title nor abstract and was not sent
    Skipped,
}

impl ScoreStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScoreStatus::Success => "success",
            ScoreStatus::ParseFailure => "parse_failure",
            ScoreStatus::ProviderError => "provider_error",
            ScoreStatus::Cancelled => "cancelled",
            ScoreStatus::Skipped => "skipped",
        }
    }
}

impl std::fmt::Display for ScoreStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of scoring one row within a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreResult {
    pub row_id: usize,
    pub score: Option<f64>,
    pub raw_response: Option<String>,
    pub status: ScoreStatus,
    pub detail: Option<String>,
    pub attempts: u32,
}

impl ScoreResult {
    pub fn success(row_id: usize, score: f64, raw_response: String, attempts: u32) -> Self {
        Self {
            row_id,
            score: Some(score),
            raw_response: Some(raw_response),
            status: ScoreStatus::Success,
            detail: None,
            attempts,
        }
    }

    pub fn parse_failure(row_id: usize, raw_response: String, detail: String, attempts: u32) -> Self {
        Self {
            row_id,
            score: None,
            raw_response: Some(raw_response),
            status: ScoreStatus::ParseFailure,
            detail: Some(detail),
            attempts,
        }
    }

    pub fn provider_error(row_id: usize, detail: String, attempts: u32) -> Self {
        Self {
            row_id,
            score: None,
            raw_response: None,
            status: ScoreStatus::ProviderError,
            detail: Some(detail),
            attempts,
        }
    }

    pub fn cancelled(row_id: usize, attempts: u32) -> Self {
        Self {
            row_id,
            score: None,
            raw_response: None,
            status: ScoreStatus::Cancelled,
            detail: None,
            attempts,
        }
    }

    pub fn skipped(row_id: usize) -> Self {
        Self {
            row_id,
            score: None,
            raw_response: None,
            status: ScoreStatus::Skipped,
            detail: Some("title and abstract are both empty".to_string()),
            attempts: 0,
        }
    }

    /// Failed rows: the provider or the parser gave up on them
    pub fn is_failure(&self) -> bool {
        matches!(self.status, ScoreStatus::ParseFailure | ScoreStatus::ProviderError)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_row_detection() {
        assert!(PublicationRow::new(0, "  ").is_blank());
        assert!(PublicationRow::new(0, "").with_abstract(" ").is_blank());
        assert!(!PublicationRow::new(0, "").with_abstract("Some abstract").is_blank());
        assert!(!PublicationRow::new(0, "A title").is_blank());
        // Keywords alone are not enough to score
        assert!(PublicationRow::new(0, "").with_keywords("graphs").is_blank());
    }

    #[test]
    fn test_status_display() {
        assert_eq!(ScoreStatus::ParseFailure.to_string(), "parse_failure");
        assert_eq!(ScoreStatus::Cancelled.as_str(), "cancelled");
    }
}
