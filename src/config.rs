use crate::error::{ExportError, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Number of record ids requested per export call
pub const DEFAULT_CHUNK_SIZE: usize = 50;

/// Form in the bootstrap project that lists the forms to export
pub const BOOTSTRAP_FORM: &str = "form_selection";

/// Event naming used for chunked CSV exports
pub const EXPORT_EVENT_NAME: &str = "unique";

/// Log file appended to when not running with --debug
pub const DEFAULT_LOG_FILE: &str = "redcap_api_export.log";

/// Merge layout: `<root>/temp/{English,Spanish}`
pub const TEMP_DIR: &str = "temp";
pub const ENGLISH_DIR: &str = "English";
pub const SPANISH_DIR: &str = "Spanish";

/// Buffer size for CSV writers
pub const WRITE_BUFFER_SIZE: usize = 128 * 1024;

#[derive(Debug, Clone, Deserialize)]
pub struct ApiSettings {
    pub api_url: String,
    #[serde(default = "default_verify_ssl")]
    pub verify_ssl: bool,
}

fn default_verify_ssl() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProjectSettings {
    pub bootstrap_token: String,
    pub data_token: String,
    pub file_dest: PathBuf,
    #[serde(default)]
    pub chunk_size: Option<usize>,
}

impl ProjectSettings {
    pub fn chunk_size(&self) -> usize {
        self.chunk_size.filter(|&n| n > 0).unwrap_or(DEFAULT_CHUNK_SIZE)
    }
}

/// Export configuration: one `[api]` table and one `[projects.<pid>]` table per project.
///
/// ```toml
/// [api]
/// api_url = "https://redcap.example.org/api/"
/// verify_ssl = true
///
/// [projects.11]
/// bootstrap_token = "..."
/// data_token = "..."
/// file_dest = "exports/study11"
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct ExportSettings {
    pub api: ApiSettings,
    #[serde(default)]
    pub projects: BTreeMap<String, ProjectSettings>,
}

impl ExportSettings {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            ExportError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let settings: ExportSettings = toml::from_str(content)?;
        if settings.api.api_url.trim().is_empty() {
            return Err(ExportError::Config("api.api_url is empty".to_string()));
        }
        debug!(api_url = %settings.api.api_url, "Loaded export settings");
        Ok(settings)
    }

    pub fn project(&self, pid: &str) -> Result<&ProjectSettings> {
        let project = self
            .projects
            .get(pid)
            .ok_or_else(|| ExportError::Config(format!("No [projects.{}] section", pid)))?;
        debug!(
            pid,
            bootstrap_token = %abbreviate(&project.bootstrap_token),
            data_token = %abbreviate(&project.data_token),
            "Resolved project settings"
        );
        Ok(project)
    }
}

/// Shows only the ends of a secret: `ABCD...WXYZ`.
pub fn abbreviate(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    if chars.len() <= 8 {
        return "*".repeat(chars.len());
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}...{}", head, tail)
}
