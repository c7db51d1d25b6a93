use std::fmt;

use tandem_core::TandemError;

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    Invalid(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "failed to read config: {e}"),
            ConfigError::Parse(e) => write!(f, "failed to parse config: {e}"),
            ConfigError::Invalid(msg) => write!(f, "invalid config: {msg}"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io(e) => Some(e),
            ConfigError::Parse(e) => Some(e),
            ConfigError::Invalid(_) => None,
        }
    }
}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        ConfigError::Io(e)
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(e: toml::de::Error) -> Self {
        ConfigError::Parse(e)
    }
}

#[derive(Debug)]
pub enum RuntimeError {
    Core(TandemError),
    Config(ConfigError),
    /// A pass task panicked or was cancelled.
    Join(tokio::task::JoinError),
    /// Called outside a tokio runtime.
    NoRuntime,
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuntimeError::Core(e) => write!(f, "{e}"),
            RuntimeError::Config(e) => write!(f, "{e}"),
            RuntimeError::Join(e) => write!(f, "pass task failed: {e}"),
            RuntimeError::NoRuntime => write!(f, "no tokio runtime available"),
        }
    }
}

impl std::error::Error for RuntimeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RuntimeError::Core(e) => Some(e),
            RuntimeError::Config(e) => Some(e),
            RuntimeError::Join(e) => Some(e),
            RuntimeError::NoRuntime => None,
        }
    }
}

impl From<TandemError> for RuntimeError {
    fn from(e: TandemError) -> Self {
        RuntimeError::Core(e)
    }
}

impl From<ConfigError> for RuntimeError {
    fn from(e: ConfigError) -> Self {
        RuntimeError::Config(e)
    }
}

impl From<tokio::task::JoinError> for RuntimeError {
    fn from(e: tokio::task::JoinError) -> Self {
        RuntimeError::Join(e)
    }
}

pub type Result<T> = std::result::Result<T, RuntimeError>;
