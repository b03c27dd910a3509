//! Spreadsheet input and export.
//!
//! A [`Sheet`] is the first worksheet of the input as plain text cells: one
//! header row followed by data rows. Data row `i` becomes the publication
//! with id `i`, so results can always be joined back to their source row.

mod reader;
mod writer;

pub use reader::read_sheet;
pub use writer::{write_export, ExportOptions, ExportSummary, MODEL_INFO_SHEET, RESULTS_SHEET, SCORE_COLUMN, STATUS_COLUMN};

use crate::model::PublicationRow;
use crate::{Error, Result};

/// Which header holds each publication field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMapping {
    pub title: String,
    pub abstract_text: Option<String>,
    pub keywords: Option<String>,
    pub categories: Option<String>,
}

impl Default for ColumnMapping {
    fn default() -> Self {
        Self {
            title: "Title".to_string(),
            abstract_text: Some("Abstract".to_string()),
            keywords: None,
            categories: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Sheet {
    pub headers: Vec<String>,
    /// Data rows, each padded to the header width
    pub rows: Vec<Vec<String>>,
}

impl Sheet {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        let headers: Vec<String> = headers.into_iter().map(|h| h.trim().to_string()).collect();
        let width = headers.len();
        let rows = rows
            .into_iter()
            .map(|mut row| {
                row.resize(width, String::new());
                row
            })
            .collect();
        Self { headers, rows }
    }

    pub fn columns(&self) -> &[String] {
        &self.headers
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Exact match after trimming
    pub fn column_index(&self, name: &str) -> Option<usize> {
        let name = name.trim();
        self.headers.iter().position(|h| h == name)
    }

    pub fn cell(&self, row: usize, column: usize) -> &str {
        self.rows
            .get(row)
            .and_then(|r| r.get(column))
            .map(String::as_str)
            .unwrap_or("")
    }

    fn require_column(&self, name: &str) -> Result<usize> {
        self.column_index(name)
            .ok_or_else(|| Error::MissingColumn(name.trim().to_string()))
    }

    /// One publication per data row, blank rows included
    pub fn publication_rows(&self, mapping: &ColumnMapping) -> Result<Vec<PublicationRow>> {
        let title = self.require_column(&mapping.title)?;
        let optional = |name: &Option<String>| -> Result<Option<usize>> {
            name.as_deref().map(|n| self.require_column(n)).transpose()
        };
        let abstract_text = optional(&mapping.abstract_text)?;
        let keywords = optional(&mapping.keywords)?;
        let categories = optional(&mapping.categories)?;

        let field = |row: usize, column: Option<usize>| -> Option<String> {
            column
                .map(|c| self.cell(row, c).trim())
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };

        let rows = (0..self.rows.len())
            .map(|i| PublicationRow {
                id: i,
                title: self.cell(i, title).trim().to_string(),
                abstract_text: field(i, abstract_text),
                keywords: field(i, keywords),
                categories: field(i, categories),
            })
            .collect();

        Ok(rows)
    }
}
