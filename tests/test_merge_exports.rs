//! Tests for merging English and Spanish exports.
//!
//! This module validates `merge::run_merge()`, which reads the per-language
//! exports under `<root>/temp/English` and `<root>/temp/Spanish` and writes into `<root>`:
//!
//! - **Paired files** -- same file name in both directories; stacked into one CSV
//!   with English columns first and Spanish-only columns appended
//! - **Unmatched files** -- copied through unchanged, but never over an existing file
//!
//! Fixtures are written with `write_export()` into a fresh TempDir per test.

use anyhow::Result;
use edc_export::merge;
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;
use tempfile::TempDir;

fn write_export(
    root: &Path,
    language: &str,
    name: &str,
    header: &str,
    rows: &[&str],
) -> Result<()> {
    let dir = root.join("temp").join(language);
    fs::create_dir_all(&dir)?;
    let mut file = File::create(dir.join(name))?;
    writeln!(file, "{}", header)?;
    for row in rows {
        writeln!(file, "{}", row)?;
    }
    Ok(())
}

#[test]
fn test_merge_pairs_and_copies() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let root = temp_dir.path();

    write_export(root, "English", "demographics.csv", "age,id", &["32,p1", "45,p2"])?;
    write_export(root, "Spanish", "demographics.csv", "age,id,height", &["28,p3,160"])?;
    write_export(root, "English", "consent.csv", "id,signed", &["p1,1"])?;
    write_export(root, "Spanish", "encuesta.csv", "id,respuesta", &["p3,sí"])?;

    let stats = merge::run_merge(root)?;
    assert_eq!(stats.merged, 1);
    assert_eq!(stats.rows_written, 3);
    assert_eq!(stats.copied, 2);

    let merged = fs::read_to_string(root.join("demographics.csv"))?;
    assert_eq!(merged, "age,id,height\n32,p1,\n45,p2,\n28,p3,160\n");

    assert_eq!(fs::read_to_string(root.join("consent.csv"))?, "id,signed\np1,1\n");
    assert_eq!(
        fs::read_to_string(root.join("encuesta.csv"))?,
        "id,respuesta\np3,sí\n"
    );
    Ok(())
}

#[test]
fn test_values_are_not_coerced() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let root = temp_dir.path();

    write_export(root, "English", "labs.csv", "id,glucose", &["007,5.50", "008,"])?;
    write_export(root, "Spanish", "labs.csv", "id,glucose", &["009,1e3"])?;

    merge::run_merge(root)?;
    let merged = fs::read_to_string(root.join("labs.csv"))?;
    assert_eq!(merged, "id,glucose\n007,5.50\n008,\n009,1e3\n");
    Ok(())
}

#[test]
fn test_rerun_regenerates_merges_but_not_copies() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let root = temp_dir.path();

    write_export(root, "English", "visits.csv", "id", &["p1"])?;
    write_export(root, "Spanish", "visits.csv", "id", &["p2"])?;
    write_export(root, "English", "notes.csv", "id,note", &["p1,first"])?;

    let first = merge::run_merge(root)?;
    assert_eq!(first.copied, 1);

    // Source changes after the first run
    write_export(root, "English", "visits.csv", "id", &["p1", "p4"])?;
    write_export(root, "English", "notes.csv", "id,note", &["p1,second"])?;

    let second = merge::run_merge(root)?;
    assert_eq!(second.copied, 0);
    assert_eq!(second.skipped_existing, 1);

    assert_eq!(fs::read_to_string(root.join("visits.csv"))?, "id\np1\np4\np2\n");
    assert_eq!(fs::read_to_string(root.join("notes.csv"))?, "id,note\np1,first\n");
    Ok(())
}

#[test]
fn test_header_only_files_merge() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let root = temp_dir.path();

    write_export(root, "English", "ae.csv", "id,event", &[])?;
    write_export(root, "Spanish", "ae.csv", "id,evento", &[])?;

    let stats = merge::run_merge(root)?;
    assert_eq!(stats.rows_written, 0);
    assert_eq!(fs::read_to_string(root.join("ae.csv"))?, "id,event,evento\n");
    Ok(())
}

#[test]
fn test_failed_pair_does_not_stop_run() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let root = temp_dir.path();

    write_export(root, "English", "a.csv", "id", &["p1"])?;
    write_export(root, "Spanish", "a.csv", "id", &["p2"])?;
    write_export(root, "English", "b.csv", "id", &["p3"])?;
    File::create(root.join("temp").join("Spanish").join("b.csv"))?;
    write_export(root, "English", "z.csv", "id", &["p9"])?;

    let stats = merge::run_merge(root)?;
    assert_eq!(stats.merged, 1);
    assert_eq!(stats.copied, 1);
    assert_eq!(
        stats.failed,
        vec![root.join("temp").join("English").join("b.csv")]
    );

    assert_eq!(fs::read_to_string(root.join("a.csv"))?, "id\np1\np2\n");
    assert!(!root.join("b.csv").exists());
    assert_eq!(fs::read_to_string(root.join("z.csv"))?, "id\np9\n");
    Ok(())
}

#[test]
fn test_latin1_cells_are_decoded_lossily() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let root = temp_dir.path();

    write_export(root, "English", "demo.csv", "id,name", &["p1,Jose"])?;
    let spanish_dir = root.join("temp").join("Spanish");
    fs::create_dir_all(&spanish_dir)?;
    fs::write(spanish_dir.join("demo.csv"), b"id,name\np2,ni\xf1o\np3,\xe9\xe9\n")?;

    let stats = merge::run_merge(root)?;
    assert!(stats.failed.is_empty());

    let merged = fs::read_to_string(root.join("demo.csv"))?;
    assert_eq!(merged, "id,name\np1,Jose\np2,ni\u{FFFD}o\np3,\u{FFFD}\n");
    assert_eq!(merged.matches('\u{FFFD}').count(), 2);
    Ok(())
}

#[test]
fn test_missing_spanish_directory_copies_english() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let root = temp_dir.path();

    write_export(root, "English", "a.csv", "id", &["p1"])?;

    let stats = merge::run_merge(root)?;
    assert_eq!(stats.merged, 0);
    assert_eq!(stats.copied, 1);
    assert!(root.join("a.csv").exists());
    Ok(())
}
