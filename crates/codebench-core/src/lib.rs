pub mod activity;
pub mod analyzer;
pub mod attempt;
pub mod catalog;
pub mod config;
pub mod dataset;
pub mod diagnostics;
pub mod error;
pub mod error_class;
pub mod pipeline;
pub mod tokens;
pub mod types;

pub use analyzer::{CodeAnalyzer, MetricFailure, MetricKind, MetricsOutcome};
pub use attempt::{AttemptParser, ParseOptions, ParsedLog};
pub use config::Config;
pub use diagnostics::{Diagnostic, DiagnosticKind};
pub use error::ExtractError;
pub use pipeline::{ExtractionPipeline, ExtractionResult};
pub use tokens::{TokenCategory, TokenCounts};
pub use types::*;
