pub mod providers;
mod score;
mod scorer;

pub use providers::{AiProvider, ApiKey, ProviderConfig, ProviderKind};
pub use score::{extract_score, ParseFailure, ScoreExtractor, CLAMP_TOLERANCE, DEFAULT_LOOKBACK};
pub use scorer::{PromptTemplate, RowScorer, ScoringRequest};
