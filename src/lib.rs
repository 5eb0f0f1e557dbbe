//! edc-export: REDCap form export and English/Spanish CSV merge
//!
//! This crate provides two independent batch pipelines used to prepare
//! clinical-research data extracts:
//!
//! 1. **Export** -- Read the bootstrap `form_selection` form of a project, then export
//!    every listed form from the data project to its own CSV file. Records are
//!    requested in fixed-size chunks and only the first chunk's header is kept.
//! 2. **Merge** -- Pair same-named CSV files from `temp/English` and `temp/Spanish`,
//!    stack each pair into one file with reconciled columns, and copy unpaired files
//!    through unchanged.
//!
//! # Key Modules
//!
//! - [`project`] -- The [`project::Project`] interface and its REDCap HTTP implementation
//! - [`catalog`] -- Bootstrap form catalog entries
//! - [`export`] -- Record enumeration, chunked CSV export, header de-duplication
//! - [`pairing`] -- File enumeration and name-based pairing
//! - [`sanitize`] -- Per-cell cleanup of mis-decoded text
//! - [`table`] -- In-memory string-only CSV tables
//! - [`merge`] -- Column reconciliation and the merge driver
//! - [`stats`] -- Run summaries
//! - [`config`] -- Constants and the TOML configuration file
//! - [`error`] -- Error taxonomy
//!
//! # Example Usage
//!
//! ```bash
//! # Export every form listed for project 11
//! edc-export export exports.toml 11
//!
//! # Merge exports/study11/temp/{English,Spanish} into exports/study11
//! edc-export merge exports/study11
//! ```

pub mod catalog;
pub mod config;
pub mod error;
pub mod export;
pub mod merge;
pub mod pairing;
pub mod project;
pub mod sanitize;
pub mod stats;
pub mod table;

pub use error::{ExportError, Result};
