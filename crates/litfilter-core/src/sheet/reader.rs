use std::path::Path;

use calamine::{open_workbook_auto, Data, Reader};

use super::Sheet;
use crate::{Error, Result};

const WORKBOOK_EXTENSIONS: &[&str] = &["xlsx", "xlsm", "xlsb", "xls", "ods"];

fn extension(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default()
}

/// Read the first worksheet of a spreadsheet, or a CSV/TSV file
pub fn read_sheet(path: &Path) -> Result<Sheet> {
    if !path.exists() {
        return Err(Error::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("Input file not found: {}", path.display()),
        )));
    }

    let ext = extension(path);
    let sheet = match ext.as_str() {
        "csv" => read_delimited(path, b',')?,
        "tsv" => read_delimited(path, b'\t')?,
        e if WORKBOOK_EXTENSIONS.contains(&e) => read_workbook(path)?,
        other => {
            return Err(Error::Spreadsheet(format!(
                "Unsupported input format '.{}' (expected .xlsx, .xls, .ods, .csv or .tsv)",
                other
            )))
        }
    };

    tracing::info!(
        path = %path.display(),
        columns = sheet.headers.len(),
        rows = sheet.rows.len(),
        "Loaded spreadsheet"
    );
    Ok(sheet)
}

fn read_delimited(path: &Path, delimiter: u8) -> Result<Sheet> {
    let data = std::fs::read(path)?;
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .has_headers(true)
        .from_reader(data.as_slice());

    let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
    let mut rows: Vec<Vec<String>> = Vec::new();
    let mut record = csv::StringRecord::new();
    while reader.read_record(&mut record)? {
        // The csv reader skips empty lines; keep them so row ids match the file
        let start = record.position().map_or(0, |p| p.byte() as usize);
        rows.extend(std::iter::repeat_with(Vec::new).take(empty_lines_at(&data, start)));
        rows.push(record.iter().map(str::to_string).collect());
    }

    Ok(Sheet::new(headers, rows))
}

/// Empty lines starting at `offset`, where the previous record ended
fn empty_lines_at(data: &[u8], offset: usize) -> usize {
    let mut rest = data.get(offset..).unwrap_or_default();
    // A CRLF terminator may be split: the record ends on '\r' and the '\n' is still pending
    if offset > 0 && data.get(offset - 1) == Some(&b'\r') {
        if let Some(tail) = rest.strip_prefix(b"\n") {
            rest = tail;
        }
    }

    let mut count = 0;
    loop {
        rest = match rest {
            [b'\r', b'\n', tail @ ..] | [b'\n', tail @ ..] | [b'\r', tail @ ..] => tail,
            _ => return count,
        };
        count += 1;
    }
}

fn read_workbook(path: &Path) -> Result<Sheet> {
    let mut workbook = open_workbook_auto(path)
        .map_err(|e| Error::Spreadsheet(format!("Failed to open {}: {}", path.display(), e)))?;

    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| Error::Spreadsheet(format!("{} contains no worksheets", path.display())))?
        .map_err(|e| Error::Spreadsheet(e.to_string()))?;

    let mut rows = range.rows();
    let headers: Vec<String> = match rows.next() {
        Some(header) => header.iter().map(cell_text).collect(),
        None => return Ok(Sheet::default()),
    };
    let rows: Vec<Vec<String>> = rows.map(|row| row.iter().map(cell_text).collect()).collect();

    Ok(Sheet::new(headers, rows))
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        // Whole numbers (years, counts) read back without a trailing ".0"
        Data::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", *f as i64),
        Data::Float(f) => f.to_string(),
        Data::Int(i) => i.to_string(),
        Data::Bool(b) => b.to_string(),
        other => other.to_string(),
    }
}
