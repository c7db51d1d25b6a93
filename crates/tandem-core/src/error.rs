use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum TandemError {
    /// Empty or whitespace-only input, rejected before any state mutation.
    InvalidInput(String),
    /// A pluggable scorer or vector extractor failed.
    ExtractionFailure(String),
    /// The text generator failed to produce a response.
    GenerationFailure(String),
    /// A pass missed its deadline.
    TimeoutExceeded { millis: u64 },
    /// Neither pass produced usable text.
    BothPassesFailed { fast: String, deep: String },
}

impl fmt::Display for TandemError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TandemError::InvalidInput(msg) => write!(f, "invalid input: {msg}"),
            TandemError::ExtractionFailure(msg) => write!(f, "extraction failed: {msg}"),
            TandemError::GenerationFailure(msg) => write!(f, "generation failed: {msg}"),
            TandemError::TimeoutExceeded { millis } => {
                write!(f, "deadline of {millis}ms exceeded")
            }
            TandemError::BothPassesFailed { fast, deep } => {
                write!(f, "both passes failed (fast: {fast}; deep: {deep})")
            }
        }
    }
}

impl std::error::Error for TandemError {}

pub type Result<T> = std::result::Result<T, TandemError>;

/// Reject empty input synchronously.
pub fn validate_input(input: &str) -> Result<()> {
    if input.trim().is_empty() {
        return Err(TandemError::InvalidInput(
            "input must contain non-whitespace text".to_string(),
        ));
    }
    Ok(())
}
