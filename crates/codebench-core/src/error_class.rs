use anyhow::{Context, Result};
use regex::Regex;

/// Category reported when no exception name can be recognised.
pub const FALLBACK_ERROR_TYPE: &str = "Exception";

/// Extracts the exception class name from the text of an `ERROR:` subsection.
pub struct ErrorClassifier {
    pattern: Regex,
}

impl ErrorClassifier {
    pub fn new() -> Result<Self> {
        let pattern =
            Regex::new(r"^[\w.]+Error").context("failed to compile error type pattern")?;
        Ok(Self { pattern })
    }

    /// Name such as `ZeroDivisionError` at the start of `message`, or [`FALLBACK_ERROR_TYPE`].
    pub fn classify(&self, message: &str) -> String {
        self.pattern
            .find(message)
            .map(|m| m.as_str().to_string())
            .unwrap_or_else(|| FALLBACK_ERROR_TYPE.to_string())
    }
}
