use std::path::PathBuf;
use thiserror::Error;

/// Startup configuration problems. Any of these is fatal: the application
/// cannot do anything useful without credentials and a sane render setup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(
        "no API key configured: set TIKZ_API_KEY (or NVIDIA_API_KEY / OPENAI_API_KEY) \
         in the environment or a .env file, or add api_key under [llm] in {settings}"
    )]
    MissingApiKey { settings: String },

    #[error("invalid value {value:?} for {key}: {reason}")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },

    #[error("could not access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("could not parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

impl ConfigError {
    pub(crate) fn invalid(key: &str, value: impl Into<String>, reason: impl Into<String>) -> Self {
        ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.into(),
            reason: reason.into(),
        }
    }
}
