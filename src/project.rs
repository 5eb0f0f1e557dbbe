//! Access to EDC (REDCap) projects.
//!
//! The exporter only needs two things from a project: its definition field and
//! the ability to export records. [`Project`] captures exactly that, and
//! [`RedcapProject`] implements it over the REDCap HTTP API.

use crate::error::{ExportError, Result};
use serde_json::{Map, Value};
use std::time::Duration;
use tracing::debug;

pub type Row = Map<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Json,
    Csv,
}

impl ExportFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExportFormat::Json => "json",
            ExportFormat::Csv => "csv",
        }
    }
}

/// Selection criteria for one `export_records` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportRequest {
    pub format: ExportFormat,
    pub forms: Vec<String>,
    pub fields: Vec<String>,
    pub records: Vec<String>,
    pub event_name: Option<String>,
}

impl ExportRequest {
    pub fn json() -> Self {
        Self {
            format: ExportFormat::Json,
            forms: Vec::new(),
            fields: Vec::new(),
            records: Vec::new(),
            event_name: None,
        }
    }

    pub fn csv() -> Self {
        Self {
            format: ExportFormat::Csv,
            ..Self::json()
        }
    }

    pub fn forms(mut self, forms: &[String]) -> Self {
        self.forms = forms.to_vec();
        self
    }

    pub fn fields(mut self, fields: &[String]) -> Self {
        self.fields = fields.to_vec();
        self
    }

    pub fn records(mut self, records: &[String]) -> Self {
        self.records = records.to_vec();
        self
    }

    pub fn event_name(mut self, event_name: &str) -> Self {
        self.event_name = Some(event_name.to_string());
        self
    }

    /// Encodes the request as REDCap API form parameters (`fields[0]=...`).
    pub fn to_params(&self, token: &str) -> Vec<(String, String)> {
        let mut params = vec![
            ("token".to_string(), token.to_string()),
            ("content".to_string(), "record".to_string()),
            ("format".to_string(), self.format.as_str().to_string()),
            ("type".to_string(), "flat".to_string()),
        ];
        push_array(&mut params, "records", &self.records);
        push_array(&mut params, "fields", &self.fields);
        push_array(&mut params, "forms", &self.forms);
        if let Some(event_name) = &self.event_name {
            params.push(("eventName".to_string(), event_name.clone()));
        }
        params
    }
}

fn push_array(params: &mut Vec<(String, String)>, name: &str, values: &[String]) {
    for (i, value) in values.iter().enumerate() {
        params.push((format!("{}[{}]", name, i), value.clone()));
    }
}

/// Result of an export call: decoded rows for JSON, raw text for CSV.
#[derive(Debug, Clone, PartialEq)]
pub enum ExportResponse {
    Rows(Vec<Row>),
    Text(String),
}

impl ExportResponse {
    pub fn into_rows(self) -> Result<Vec<Row>> {
        match self {
            ExportResponse::Rows(rows) => Ok(rows),
            ExportResponse::Text(_) => Err(ExportError::Api(
                "expected JSON rows, got CSV text".to_string(),
            )),
        }
    }

    pub fn into_text(self) -> Result<String> {
        match self {
            ExportResponse::Text(text) => Ok(text),
            ExportResponse::Rows(_) => Err(ExportError::Api(
                "expected CSV text, got JSON rows".to_string(),
            )),
        }
    }
}

pub trait Project {
    /// Name of the record identifier column (first field of the data dictionary).
    fn definition_field(&self) -> &str;

    fn export_records(&self, request: &ExportRequest) -> Result<ExportResponse>;
}

/// Reads a row value as a plain string; numbers and booleans are rendered, null is empty.
pub fn value_as_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// A REDCap project reached through its API token.
pub struct RedcapProject {
    client: reqwest::blocking::Client,
    api_url: String,
    token: String,
    definition_field: String,
}

impl RedcapProject {
    /// Connects to the API and discovers the project's definition field from its metadata.
    pub fn connect(api_url: &str, token: &str, verify_ssl: bool) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .danger_accept_invalid_certs(!verify_ssl)
            .timeout(Duration::from_secs(300))
            .build()?;

        let mut project = Self {
            client,
            api_url: api_url.to_string(),
            token: token.to_string(),
            definition_field: String::new(),
        };
        project.definition_field = project.fetch_definition_field()?;
        debug!(def_field = %project.definition_field, "Connected to project");
        Ok(project)
    }

    fn fetch_definition_field(&self) -> Result<String> {
        let params = [
            ("token", self.token.as_str()),
            ("content", "metadata"),
            ("format", "json"),
        ];
        let body = self.post(&params)?;
        let fields: Vec<Row> = serde_json::from_str(&body)?;
        fields
            .first()
            .and_then(|f| f.get("field_name"))
            .map(value_as_string)
            .filter(|name| !name.is_empty())
            .ok_or_else(|| ExportError::Api("project metadata has no fields".to_string()))
    }

    fn post<T: serde::Serialize + ?Sized>(&self, params: &T) -> Result<String> {
        let response = self.client.post(&self.api_url).form(params).send()?;
        let status = response.status();
        let body = response.text()?;
        if !status.is_success() {
            return Err(ExportError::Api(format!("{}: {}", status, body.trim())));
        }
        Ok(body)
    }
}

impl Project for RedcapProject {
    fn definition_field(&self) -> &str {
        &self.definition_field
    }

    fn export_records(&self, request: &ExportRequest) -> Result<ExportResponse> {
        let body = self.post(&request.to_params(&self.token))?;
        match request.format {
            ExportFormat::Json => Ok(ExportResponse::Rows(serde_json::from_str(&body)?)),
            ExportFormat::Csv => Ok(ExportResponse::Text(body)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn csv_request_params() {
        let request = ExportRequest::csv()
            .records(&["p1".to_string(), "p2".to_string()])
            .forms(&["demographics".to_string()])
            .fields(&["age".to_string()])
            .event_name("unique");

        let params = request.to_params("TOKEN");
        let get = |k: &str| {
            params
                .iter()
                .find(|(name, _)| name == k)
                .map(|(_, v)| v.as_str())
        };

        assert_eq!(get("token"), Some("TOKEN"));
        assert_eq!(get("content"), Some("record"));
        assert_eq!(get("format"), Some("csv"));
        assert_eq!(get("records[0]"), Some("p1"));
        assert_eq!(get("records[1]"), Some("p2"));
        assert_eq!(get("forms[0]"), Some("demographics"));
        assert_eq!(get("fields[0]"), Some("age"));
        assert_eq!(get("eventName"), Some("unique"));
    }

    #[test]
    fn json_request_omits_empty_selections() {
        let params = ExportRequest::json().to_params("T");
        assert_eq!(params.len(), 4);
        assert!(params.iter().all(|(k, _)| !k.contains('[')));
    }

    #[test]
    fn value_as_string_renders_scalars() {
        assert_eq!(value_as_string(&json!("p1")), "p1");
        assert_eq!(value_as_string(&json!(42)), "42");
        assert_eq!(value_as_string(&json!(null)), "");
    }

    #[test]
    fn response_kind_mismatch_is_api_error() {
        let err = ExportResponse::Text("a,b\n".to_string())
            .into_rows()
            .unwrap_err();
        assert!(matches!(err, ExportError::Api(_)));
        let err = ExportResponse::Rows(Vec::new()).into_text().unwrap_err();
        assert!(matches!(err, ExportError::Api(_)));
    }
}
