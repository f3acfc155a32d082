use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DocPressError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid document json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid config file: {0}")]
    Config(#[from] serde_yaml::Error),

    #[error("markdown rendering failed: {0}")]
    Markdown(String),

    #[error("{engine} is not available: {message}")]
    RendererUnavailable { engine: &'static str, message: String },

    #[error("{engine} exited with {status}: {stderr}")]
    RendererFailed {
        engine: &'static str,
        status: String,
        stderr: String,
    },

    #[error("{engine} did not finish within {}ms", .timeout.as_millis())]
    RendererTimeout {
        engine: &'static str,
        timeout: Duration,
    },

    #[error("{engine} produced an empty pdf")]
    EmptyOutput { engine: &'static str },

    #[error("pdf error: {0}")]
    Pdf(String),

    #[error("outline error: {0}")]
    Outline(String),

    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
}

impl From<lopdf::Error> for DocPressError {
    fn from(value: lopdf::Error) -> Self {
        DocPressError::Pdf(value.to_string())
    }
}

pub type Result<T> = std::result::Result<T, DocPressError>;
