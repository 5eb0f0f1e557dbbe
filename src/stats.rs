use std::path::{Path, PathBuf};

/// Counters collected during an export run
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ExportStats {
    pub forms_exported: u64,
    pub forms_failed: u64,
    pub records: u64,
    pub chunks: u64,
    pub failed_forms: Vec<String>,
}

impl ExportStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_form(&mut self, records: u64, chunks: u64) {
        self.forms_exported += 1;
        self.records += records;
        self.chunks += chunks;
    }

    pub fn record_failure(&mut self, form_name: &str) {
        self.forms_failed += 1;
        self.failed_forms.push(form_name.to_string());
    }

    pub fn has_failures(&self) -> bool {
        self.forms_failed > 0
    }
}

/// Counters collected during a merge run
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MergeStats {
    pub merged: u64,
    pub copied: u64,
    pub skipped_existing: u64,
    pub rows_written: u64,
    /// English files of pairs that could not be merged
    pub failed: Vec<PathBuf>,
}

impl MergeStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_merged(&mut self, rows: u64) {
        self.merged += 1;
        self.rows_written += rows;
    }

    pub fn inc_copied(&mut self) {
        self.copied += 1;
    }

    pub fn inc_skipped(&mut self) {
        self.skipped_existing += 1;
    }

    pub fn record_failure(&mut self, file: &Path) {
        self.failed.push(file.to_path_buf());
    }

    pub fn has_failures(&self) -> bool {
        !self.failed.is_empty()
    }
}
