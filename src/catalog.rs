use crate::config::BOOTSTRAP_FORM;
use crate::error::Result;
use crate::project::{value_as_string, ExportRequest, Project, Row};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// One row of the bootstrap `form_selection` form: which form to export, which
/// fields to include and what to call the output file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormCatalogEntry {
    pub form_name: String,
    pub output_name: String,
    pub field_names: Vec<String>,
}

impl FormCatalogEntry {
    /// Builds an entry from a raw bootstrap row. Returns `None` when the row has no form name.
    ///
    /// An empty `fieldnames` value becomes `[definition_field]` so that every
    /// exported form carries the record identifier.
    pub fn from_raw(raw: &Row, definition_field: &str) -> Option<Self> {
        let text = |key: &str| raw.get(key).map(value_as_string).unwrap_or_default();

        let form_name = text("formname").trim().to_string();
        if form_name.is_empty() {
            return None;
        }

        let raw_fields = text("fieldnames");
        let field_names = if raw_fields.trim().is_empty() {
            vec![definition_field.to_string()]
        } else {
            raw_fields
                .split(',')
                .map(|f| f.trim().to_string())
                .filter(|f| !f.is_empty())
                .collect()
        };

        let file_name = text("filename").trim().to_string();
        let output_name = if file_name.is_empty() {
            form_name.clone()
        } else {
            file_name
        };

        Some(Self {
            form_name,
            output_name,
            field_names,
        })
    }

    pub fn destination(&self, dest_dir: &Path) -> PathBuf {
        dest_dir.join(&self.output_name).with_extension("csv")
    }
}

/// Reads the bootstrap form and yields one entry per exportable form.
pub fn form_selection<'a>(
    bootstrap: &dyn Project,
    pid: &'a str,
    definition_field: &'a str,
) -> Result<impl Iterator<Item = FormCatalogEntry> + 'a> {
    let request = ExportRequest::json().forms(&[BOOTSTRAP_FORM.to_string()]);
    let rows = bootstrap.export_records(&request)?.into_rows()?;
    info!(
        pid,
        records = rows.len(),
        "Initiating export related to bootstrap records"
    );

    Ok(rows.into_iter().filter_map(move |raw| {
        let entry = FormCatalogEntry::from_raw(&raw, definition_field);
        if entry.is_none() {
            warn!(pid, "Skipping bootstrap record without a form name");
        }
        entry
    }))
}
