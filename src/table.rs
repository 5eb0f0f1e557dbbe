use crate::config::WRITE_BUFFER_SIZE;
use crate::error::{ExportError, Result};
use crate::sanitize::sanitize;
use csv::{ReaderBuilder, Writer};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

/// A CSV file held in memory with every cell kept as a string.
///
/// Missing cells are empty strings; nothing is parsed as a number.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CsvTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl CsvTable {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self { columns, rows }
    }

    pub fn read(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        Self::from_reader(BufReader::new(file)).map_err(|e| match e {
            ExportError::MergeStructure { reason, .. } => ExportError::MergeStructure {
                file: path.to_path_buf(),
                reason,
            },
            other => other,
        })
    }

    /// Parses CSV data. Short rows are padded and long rows truncated to the header width.
    ///
    /// Bytes that are not valid UTF-8 become U+FFFD instead of failing the read.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut reader = ReaderBuilder::new().flexible(true).from_reader(reader);

        let columns: Vec<String> = reader
            .byte_headers()?
            .iter()
            .map(decode_cell)
            .collect();
        if columns.is_empty() {
            return Err(ExportError::MergeStructure {
                file: Default::default(),
                reason: "table has no columns".to_string(),
            });
        }

        let width = columns.len();
        let mut rows = Vec::new();
        for result in reader.byte_records() {
            let record = result?;
            let mut row: Vec<String> = record
                .iter()
                .take(width)
                .map(decode_cell)
                .collect();
            row.resize(width, String::new());
            rows.push(row);
        }

        Ok(Self { columns, rows })
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Returns a copy with every cell passed through [`sanitize`].
    pub fn sanitized(&self) -> Self {
        let rows = self
            .rows
            .iter()
            .map(|row| row.iter().map(|cell| sanitize(cell).into_owned()).collect())
            .collect();
        Self {
            columns: self.columns.clone(),
            rows,
        }
    }

    /// Writes the table with a header row and no index column.
    pub fn write(&self, path: &Path) -> Result<()> {
        let file = File::create(path)?;
        self.write_to(BufWriter::with_capacity(WRITE_BUFFER_SIZE, file))
    }

    pub fn write_to<W: Write>(&self, writer: W) -> Result<()> {
        let mut writer = Writer::from_writer(writer);
        writer.write_record(&self.columns)?;
        for row in &self.rows {
            writer.write_record(row)?;
        }
        writer.flush()?;
        Ok(())
    }
}

fn decode_cell(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}
