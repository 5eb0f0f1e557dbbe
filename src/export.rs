//! Chunked export of REDCap forms to CSV files.
//!
//! Each form is exported in three steps:
//!
//! 1. **Enumerate** -- fetch the definition field for every record and collapse
//!    duplicate identifiers (longitudinal projects return one row per event)
//! 2. **Chunk** -- request the selected forms/fields for `chunk_size` records at a time
//! 3. **Write** -- append every chunk to one CSV file, keeping only the first chunk's header

use crate::catalog::{form_selection, FormCatalogEntry};
use crate::config::{EXPORT_EVENT_NAME, WRITE_BUFFER_SIZE};
use crate::error::{ExportError, Result};
use crate::project::{value_as_string, ExportRequest, Project};
use crate::stats::ExportStats;
use indicatif::{ProgressBar, ProgressStyle};
use rustc_hash::FxHashSet;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy)]
pub struct ExportOptions {
    pub chunk_size: usize,
    /// Continue with the remaining forms when one form's export fails
    pub keep_going: bool,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            chunk_size: crate::config::DEFAULT_CHUNK_SIZE,
            keep_going: false,
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ChunkWriteSummary {
    pub chunks: u64,
    pub bytes: u64,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FormExportSummary {
    pub records: u64,
    pub chunks: u64,
    pub bytes: u64,
}

/// Returns the distinct record identifiers of a project, sorted.
pub fn collect_record_ids(project: &dyn Project) -> Result<Vec<String>> {
    let def_field = project.definition_field();
    let request = ExportRequest::json().fields(&[def_field.to_string()]);
    let rows = project.export_records(&request)?.into_rows()?;

    let mut seen = FxHashSet::default();
    let mut missing = 0usize;
    for row in &rows {
        match row.get(def_field) {
            Some(value) => {
                seen.insert(value_as_string(value));
            }
            None => missing += 1,
        }
    }

    let mut ids: Vec<String> = seen.into_iter().collect();
    ids.sort_unstable();
    if missing > 0 {
        warn!(missing, def_field, "Rows without a definition field value");
    }
    debug!(rows = rows.len(), distinct = ids.len(), "Collected record ids");
    Ok(ids)
}

/// Splits ids into consecutive chunks of at most `size` (a size of 0 is treated as 1).
pub fn chunk_ids(ids: &[String], size: usize) -> std::slice::Chunks<'_, String> {
    ids.chunks(size.max(1))
}

/// Iterator over the CSV text of each chunk of a form export.
///
/// An empty response ends the sequence. A failed call yields one
/// [`ExportError::Transport`] and then ends the sequence.
pub struct CsvChunks<'a> {
    project: &'a dyn Project,
    pid: &'a str,
    form_name: &'a str,
    field_names: &'a [String],
    chunks: std::vec::IntoIter<Vec<String>>,
    done: bool,
}

impl<'a> CsvChunks<'a> {
    pub fn new(
        project: &'a dyn Project,
        pid: &'a str,
        entry: &'a FormCatalogEntry,
        ids: &[String],
        chunk_size: usize,
    ) -> Self {
        let chunks: Vec<Vec<String>> = chunk_ids(ids, chunk_size)
            .map(<[String]>::to_vec)
            .collect();
        Self {
            project,
            pid,
            form_name: &entry.form_name,
            field_names: &entry.field_names,
            chunks: chunks.into_iter(),
            done: false,
        }
    }
}

impl Iterator for CsvChunks<'_> {
    type Item = Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let chunk = self.chunks.next()?;
        info!(
            first = %chunk[0],
            last = %chunk[chunk.len() - 1],
            "Chunk"
        );

        let request = ExportRequest::csv()
            .records(&chunk)
            .forms(&[self.form_name.to_string()])
            .fields(self.field_names)
            .event_name(EXPORT_EVENT_NAME);

        let result = self
            .project
            .export_records(&request)
            .and_then(|response| response.into_text());

        match result {
            Ok(text) if text.is_empty() => {
                self.done = true;
                None
            }
            Ok(text) => Some(Ok(text)),
            Err(e) => {
                self.done = true;
                error!(
                    pid = self.pid,
                    form = self.form_name,
                    error = %e,
                    "Chunked export failed"
                );
                Some(Err(ExportError::transport(self.pid, self.form_name, e)))
            }
        }
    }
}

/// Writes chunks in order, keeping the header line of the first chunk only.
///
/// Every chunk is expected to start with the same header line.
pub fn write_chunks<I, W>(chunks: I, writer: &mut W) -> Result<ChunkWriteSummary>
where
    I: IntoIterator<Item = Result<String>>,
    W: Write,
{
    let mut summary = ChunkWriteSummary::default();

    for chunk in chunks {
        let chunk = chunk?;
        let data = if summary.chunks == 0 {
            chunk.as_str()
        } else {
            chunk.split_once('\n').map(|(_, rest)| rest).unwrap_or("")
        };
        writer.write_all(data.as_bytes())?;
        summary.chunks += 1;
        summary.bytes += data.len() as u64;
    }

    writer.flush()?;
    Ok(summary)
}

fn partial_path(dest: &Path) -> PathBuf {
    let mut name = dest.file_name().map(OsString::from).unwrap_or_default();
    name.push(".part");
    dest.with_file_name(name)
}

/// Exports one catalog entry from `project` into `dest`.
pub fn export_form(
    project: &dyn Project,
    pid: &str,
    entry: &FormCatalogEntry,
    dest: &Path,
    chunk_size: usize,
) -> Result<FormExportSummary> {
    info!(pid, form = %entry.form_name, "Initiating export of data");

    let ids = collect_record_ids(project).map_err(|e| {
        error!(pid, form = %entry.form_name, error = %e, "Record enumeration failed");
        ExportError::transport(pid, &entry.form_name, e)
    })?;
    let records = ids.len() as u64;

    // `<dest>.part` is renamed to `dest` only after the last chunk is written
    let part = partial_path(dest);
    let written = {
        let file = File::create(&part)?;
        let mut writer = BufWriter::with_capacity(WRITE_BUFFER_SIZE, file);
        let chunks = CsvChunks::new(project, pid, entry, &ids, chunk_size);
        write_chunks(chunks, &mut writer)
    };
    let written = match written {
        Ok(written) => written,
        Err(e) => {
            if let Err(rm) = fs::remove_file(&part) {
                warn!(part = ?part, error = %rm, "Failed to remove partial export");
            }
            return Err(e);
        }
    };
    fs::rename(&part, dest)?;

    info!(
        pid,
        form = %entry.form_name,
        chunks = written.chunks,
        dest = ?dest,
        "Completed the export of data"
    );

    Ok(FormExportSummary {
        records,
        chunks: written.chunks,
        bytes: written.bytes,
    })
}

/// Exports every form listed in the bootstrap project into `dest_dir`.
pub fn run_export(
    bootstrap: &dyn Project,
    data: &dyn Project,
    pid: &str,
    dest_dir: &Path,
    options: &ExportOptions,
) -> Result<ExportStats> {
    fs::create_dir_all(dest_dir)?;

    let entries: Vec<FormCatalogEntry> =
        form_selection(bootstrap, pid, data.definition_field())?.collect();

    let pb = make_progress_bar(entries.len() as u64);
    let mut stats = ExportStats::new();

    for entry in &entries {
        pb.set_message(entry.form_name.clone());
        let dest = entry.destination(dest_dir);

        match export_form(data, pid, entry, &dest, options.chunk_size) {
            Ok(summary) => stats.record_form(summary.records, summary.chunks),
            Err(e) if options.keep_going && e.is_transport() => {
                warn!(pid, form = %entry.form_name, error = %e, "Skipping failed form");
                stats.record_failure(&entry.form_name);
            }
            Err(e) => {
                pb.abandon();
                return Err(e);
            }
        }
        pb.inc(1);
    }

    pb.finish_and_clear();
    Ok(stats)
}

fn make_progress_bar(total: u64) -> ProgressBar {
    let pb = ProgressBar::new(total);
    let template = "{spinner:.cyan} [{bar:30.cyan/blue}] {pos}/{len} forms {msg}";
    if let Ok(style) = ProgressStyle::default_bar().template(template) {
        pb.set_style(style);
    }
    pb
}
