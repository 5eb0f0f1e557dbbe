use crate::error::Result;
use rustc_hash::{FxHashMap, FxHashSet};
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Files from the English and Spanish export directories, classified by file name.
///
/// Every input file lands in exactly one bucket.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PairedFileSet {
    pub paired: Vec<(PathBuf, PathBuf)>,
    pub english_only: Vec<PathBuf>,
    pub spanish_only: Vec<PathBuf>,
}

impl PairedFileSet {
    pub fn total_files(&self) -> usize {
        self.paired.len() * 2 + self.english_only.len() + self.spanish_only.len()
    }

    /// Unmatched files from both sides, English first.
    pub fn unmatched(&self) -> impl Iterator<Item = &PathBuf> {
        self.english_only.iter().chain(self.spanish_only.iter())
    }
}

/// Lists the regular files directly inside `dir`, sorted by name.
///
/// A missing directory yields an empty list.
pub fn list_files(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.exists() {
        warn!(dir = ?dir, "Export directory not found");
        return Ok(Vec::new());
    }

    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_type()?.is_file() {
            files.push(entry.path());
        }
    }
    files.sort();
    debug!(dir = ?dir, count = files.len(), "Listed export files");
    Ok(files)
}

fn file_key(path: &Path) -> OsString {
    path.file_name().map(OsString::from).unwrap_or_default()
}

/// Pairs files by exact (case-sensitive) file name.
///
/// Spanish files are indexed by name and probed once per English file; matched
/// names are removed from the index, never from the lists being iterated.
pub fn pair(english: &[PathBuf], spanish: &[PathBuf]) -> PairedFileSet {
    let mut index: FxHashMap<OsString, &PathBuf> = FxHashMap::default();
    for file in spanish {
        index.entry(file_key(file)).or_insert(file);
    }

    let mut set = PairedFileSet::default();
    for file in english {
        match index.remove(&file_key(file)) {
            Some(esp) => set.paired.push((file.clone(), esp.clone())),
            None => set.english_only.push(file.clone()),
        }
    }

    // Spanish files that were never claimed, in their original order
    let claimed: FxHashSet<&PathBuf> = set.paired.iter().map(|(_, esp)| esp).collect();
    set.spanish_only = spanish
        .iter()
        .filter(|f| !claimed.contains(f))
        .cloned()
        .collect();

    set
}
