use crate::config::{ENGLISH_DIR, SPANISH_DIR, TEMP_DIR};
use crate::error::{ExportError, Result};
use crate::pairing::{list_files, pair};
use crate::stats::MergeStats;
use crate::table::CsvTable;
use rustc_hash::{FxHashMap, FxHashSet};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopyOutcome {
    Copied,
    AlreadyPresent,
}

/// English columns in order, then columns only the Spanish table has.
pub fn merged_columns(english: &[String], spanish: &[String]) -> Vec<String> {
    let known: FxHashSet<&String> = english.iter().collect();
    let mut columns = english.to_vec();
    columns.extend(spanish.iter().filter(|c| !known.contains(c)).cloned());
    columns
}

/// Stacks sanitized English rows on top of sanitized Spanish rows.
///
/// Rows are appended positionally, never joined by key. Cells for columns a
/// table lacks are filled with empty strings.
pub fn merge_tables(english: &CsvTable, spanish: &CsvTable) -> CsvTable {
    let columns = merged_columns(&english.columns, &spanish.columns);
    let mut rows = Vec::with_capacity(english.len() + spanish.len());
    rows.extend(project_rows(&english.sanitized(), &columns));
    rows.extend(project_rows(&spanish.sanitized(), &columns));
    CsvTable::new(columns, rows)
}

fn project_rows(table: &CsvTable, columns: &[String]) -> Vec<Vec<String>> {
    let positions: FxHashMap<&str, usize> = table
        .columns
        .iter()
        .enumerate()
        .map(|(i, c)| (c.as_str(), i))
        .collect();
    let source: Vec<Option<usize>> = columns
        .iter()
        .map(|c| positions.get(c.as_str()).copied())
        .collect();

    table
        .rows
        .iter()
        .map(|row| {
            source
                .iter()
                .map(|pos| pos.map(|i| row[i].clone()).unwrap_or_default())
                .collect()
        })
        .collect()
}

/// Merges one English/Spanish pair into `dest_dir/<english file name>`.
///
/// Returns the number of data rows written.
pub fn merge_pair(english: &Path, spanish: &Path, dest_dir: &Path) -> Result<u64> {
    let file_name = english.file_name().ok_or_else(|| ExportError::MergeStructure {
        file: english.to_path_buf(),
        reason: "path has no file name".to_string(),
    })?;

    let eng = CsvTable::read(english)?;
    let esp = CsvTable::read(spanish)?;
    let merged = merge_tables(&eng, &esp);

    let dest = dest_dir.join(file_name);
    merged.write(&dest)?;
    info!(
        file = ?file_name,
        english_rows = eng.len(),
        spanish_rows = esp.len(),
        columns = merged.columns.len(),
        "Merged export pair"
    );
    Ok(merged.len() as u64)
}

/// Copies an unmatched file into `dest_dir` unless a file of that name is already there.
pub fn copy_unmatched(file: &Path, dest_dir: &Path) -> Result<CopyOutcome> {
    let file_name = file.file_name().ok_or_else(|| ExportError::MergeStructure {
        file: file.to_path_buf(),
        reason: "path has no file name".to_string(),
    })?;
    let dest = dest_dir.join(file_name);
    if dest.exists() {
        return Ok(CopyOutcome::AlreadyPresent);
    }
    fs::copy(file, &dest)?;
    Ok(CopyOutcome::Copied)
}

/// Directory holding the per-language exports: `<export_root>/temp`.
pub fn temp_dir(export_root: &Path) -> PathBuf {
    export_root.join(TEMP_DIR)
}

/// Merges `<root>/temp/English` with `<root>/temp/Spanish` into `<root>`.
///
/// Merged files are rewritten on every run; unmatched files are copied only once.
/// A pair that cannot be merged is recorded in the stats and skipped.
pub fn run_merge(export_root: &Path) -> Result<MergeStats> {
    let temp = temp_dir(export_root);
    println!("Detecting export files in: {}", temp.display());

    let english = list_files(&temp.join(ENGLISH_DIR))?;
    let spanish = list_files(&temp.join(SPANISH_DIR))?;
    let set = pair(&english, &spanish);
    println!(
        "  Found {} pairs, {} English-only, {} Spanish-only",
        set.paired.len(),
        set.english_only.len(),
        set.spanish_only.len()
    );

    let mut stats = MergeStats::new();
    for (eng, esp) in &set.paired {
        println!("  Merging {}...", eng.display());
        match merge_pair(eng, esp, export_root) {
            Ok(rows) => stats.add_merged(rows),
            Err(e) => {
                error!(file = ?eng.file_name(), error = %e, "Failed to merge export pair");
                stats.record_failure(eng);
            }
        }
    }

    for file in set.unmatched() {
        match copy_unmatched(file, export_root)? {
            CopyOutcome::Copied => {
                println!("  Copied {}", file.display());
                stats.inc_copied();
            }
            CopyOutcome::AlreadyPresent => {
                warn!(file = ?file, "Unmatched file already present, not copying");
                stats.inc_skipped();
            }
        }
    }

    if stats.has_failures() {
        println!("Merge finished with {} failed pair(s).", stats.failed.len());
    } else {
        println!("Merge complete.");
    }
    Ok(stats)
}
