pub mod ai;
pub mod config;
pub mod error;
pub mod model;
pub mod pipeline;
pub mod sheet;

pub use config::AppConfig;
pub use error::{Error, ProviderError, Result};
pub use model::{PublicationRow, ScoreResult, ScoreStatus};
pub use pipeline::{BatchPipeline, CancellationToken, PipelineOptions, RunEvent, RunOutcome, RunReport};
