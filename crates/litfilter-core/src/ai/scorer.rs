use super::providers::AiProvider;
use super::score::ScoreExtractor;
use crate::model::{PublicationRow, ScoreResult};
use crate::{Error, ProviderError, Result};

pub const PLACEHOLDER_TOPIC: &str = "{TOPIC}";
pub const PLACEHOLDER_TITLE: &str = "{TITLE}";
pub const PLACEHOLDER_ABSTRACT: &str = "{ABSTRACT}";
pub const PLACEHOLDER_KEYWORDS: &str = "{KEYWORDS}";
pub const PLACEHOLDER_CATEGORIES: &str = "{CATEGORIES}";

const DEFAULT_TEMPLATE: &str = "\
You evaluate how relevant a scientific publication is to a research topic.

Consider key terms, synonyms and related concepts of the topic, and how often and in what \
context they appear in the title, abstract and keywords. Indirect or partial connections \
count; the paper does not need to be centered on the topic.

Scale:
- 0.0: no meaningful connection to the topic
- 0.3: tangential or vague connection
- 0.5: some indirect but meaningful connection
- 0.7: clear, substantial connection
- 1.0: the paper directly and comprehensively addresses the topic

TOPIC: {TOPIC}

TITLE: {TITLE}
ABSTRACT: {ABSTRACT}
KEYWORDS: {KEYWORDS}
CATEGORIES: {CATEGORIES}

Respond with ONLY a single number between 0 and 1 representing the relevance score. \
No other text.";

/// Prompt sent for one row
#[derive(Debug, Clone, PartialEq)]
pub struct ScoringRequest {
    pub row_id: usize,
    pub prompt: String,
}

/// Instruction text with `{TOPIC}`, `{TITLE}`, `{ABSTRACT}`, `{KEYWORDS}`
/// and `{CATEGORIES}` placeholders
#[derive(Debug, Clone, PartialEq)]
pub struct PromptTemplate {
    text: String,
}

impl Default for PromptTemplate {
    fn default() -> Self {
        Self {
            text: DEFAULT_TEMPLATE.to_string(),
        }
    }
}

impl PromptTemplate {
    /// A user supplied template must reference the publication somehow
    pub fn custom(text: impl Into<String>) -> Result<Self> {
        let text = text.into();
        if text.trim().is_empty() {
            return Err(Error::Config("Prompt template is empty".to_string()));
        }
        if !text.contains(PLACEHOLDER_TITLE) && !text.contains(PLACEHOLDER_ABSTRACT) {
            return Err(Error::Config(format!(
                "Prompt template must contain {} or {}",
                PLACEHOLDER_TITLE, PLACEHOLDER_ABSTRACT
            )));
        }
        Ok(Self { text })
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn render(&self, row: &PublicationRow, topic: &str) -> ScoringRequest {
        let prompt = self
            .text
            .replace(PLACEHOLDER_TOPIC, topic.trim())
            .replace(PLACEHOLDER_TITLE, row.title.trim())
            .replace(PLACEHOLDER_ABSTRACT, row.abstract_text.as_deref().unwrap_or("").trim())
            .replace(PLACEHOLDER_KEYWORDS, row.keywords.as_deref().unwrap_or("").trim())
            .replace(PLACEHOLDER_CATEGORIES, row.categories.as_deref().unwrap_or("").trim());

        ScoringRequest { row_id: row.id, prompt }
    }
}

/// Scores one row: prompt, one provider call, score extraction
#[derive(Debug, Clone, Default)]
pub struct RowScorer {
    template: PromptTemplate,
    extractor: ScoreExtractor,
}

impl RowScorer {
    pub fn new(template: PromptTemplate, extractor: ScoreExtractor) -> Self {
        Self { template, extractor }
    }

    pub fn template(&self) -> &PromptTemplate {
        &self.template
    }

    /// Single attempt. Provider errors are returned as-is so the caller can
    /// decide whether to retry; parse failures are a scored outcome.
    pub async fn attempt(
        &self,
        row: &PublicationRow,
        topic: &str,
        provider: &dyn AiProvider,
        attempt: u32,
    ) -> std::result::Result<ScoreResult, ProviderError> {
        if row.is_blank() {
            return Ok(ScoreResult::skipped(row.id));
        }

        let request = self.template.render(row, topic);
        let reply = provider.complete(&request.prompt).await?;

        let result = match self.extractor.extract(&reply) {
            Ok(score) => {
                tracing::debug!(row = row.id, score, "Row scored");
                ScoreResult::success(row.id, score, reply, attempt)
            }
            Err(e) => {
                tracing::warn!(row = row.id, response = %reply, error = %e, "Could not extract score");
                ScoreResult::parse_failure(row.id, reply, e.to_string(), attempt)
            }
        };

        Ok(result)
    }

    /// Single attempt with provider errors folded into the result
    pub async fn score(&self, row: &PublicationRow, topic: &str, provider: &dyn AiProvider) -> ScoreResult {
        match self.attempt(row, topic, provider, 1).await {
            Ok(result) => result,
            Err(e) => ScoreResult::provider_error(row.id, e.to_string(), 1),
        }
    }
}
