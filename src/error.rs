use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExportError {
    /// Remote API failure while exporting a form. Fatal for that form only.
    #[error("Export of form '{form}' failed for pid:{project}: {message}")]
    Transport {
        project: String,
        form: String,
        message: String,
    },

    #[error("API error: {0}")]
    Api(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Cannot merge {file:?}: {reason}")]
    MergeStructure { file: PathBuf, reason: String },

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, ExportError>;

impl ExportError {
    /// Wraps any error raised while talking to the data project for one form.
    pub fn transport(project: &str, form: &str, source: impl std::fmt::Display) -> Self {
        ExportError::Transport {
            project: project.to_string(),
            form: form.to_string(),
            message: source.to_string(),
        }
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, ExportError::Transport { .. })
    }
}
