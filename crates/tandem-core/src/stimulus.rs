use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Result, validate_input};

/// Caller-supplied hint that shifts fusion weighting.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContextTag {
    /// Effective urgency is at least 0.9.
    Urgent,
    /// Effective complexity is at least 0.8.
    Philosophical,
    Creative,
    Other(String),
}

impl ContextTag {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Urgent => "urgent",
            Self::Philosophical => "philosophical",
            Self::Creative => "creative",
            Self::Other(s) => s,
        }
    }
}

impl FromStr for ContextTag {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let lower = s.trim().to_lowercase();
        Ok(match lower.as_str() {
            "urgent" => Self::Urgent,
            "philosophical" => Self::Philosophical,
            "creative" => Self::Creative,
            _ => Self::Other(lower),
        })
    }
}

impl fmt::Display for ContextTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One input to the pipeline.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Stimulus {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<ContextTag>,
}

impl Stimulus {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            context: None,
        }
    }

    pub fn with_context(mut self, context: ContextTag) -> Self {
        self.context = Some(context);
        self
    }

    pub fn validate(&self) -> Result<()> {
        validate_input(&self.text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_known_tags() {
        assert_eq!("URGENT".parse::<ContextTag>().unwrap(), ContextTag::Urgent);
        assert_eq!(
            " philosophical ".parse::<ContextTag>().unwrap(),
            ContextTag::Philosophical
        );
        assert_eq!(
            "playful".parse::<ContextTag>().unwrap(),
            ContextTag::Other("playful".to_string())
        );
    }

    #[test]
    fn test_stimulus_validate() {
        assert!(Stimulus::new("  ").validate().is_err());
        assert!(Stimulus::new("hello").with_context(ContextTag::Creative).validate().is_ok());
    }

    #[test]
    fn test_stimulus_json_shape() {
        let s: Stimulus = serde_json::from_str(r#"{"text":"hi","context":"urgent"}"#).unwrap();
        assert_eq!(s.context, Some(ContextTag::Urgent));
        let plain: Stimulus = serde_json::from_str(r#"{"text":"hi"}"#).unwrap();
        assert_eq!(plain.context, None);
    }
}
