//! CSV text to row objects and back.
//!
//! Thin wrapper over the `csv` crate: headers and values are trimmed on
//! read, quoting on write is minimal (only fields containing the delimiter,
//! a quote, or a line break are quoted, with internal quotes doubled).
//! Tokenization failures here are fatal `GbError`s, distinct from content
//! diagnostics.

use crate::compile::Row;
use crate::error::{GbError, GbResult};

fn csv_error(file: &str, message: impl ToString) -> GbError {
    GbError::CsvParse {
        file: file.to_string(),
        message: message.to_string(),
    }
}

/// Parses CSV text into header-keyed row maps. Blank lines are skipped.
pub fn rows_from_csv(file: &str, text: &str) -> GbResult<Vec<Row>> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());

    let headers = reader
        .headers()
        .map_err(|err| csv_error(file, err))?
        .clone();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|err| csv_error(file, err))?;
        if record.len() == 0 || (record.len() == 1 && record.get(0) == Some("")) {
            continue;
        }
        let mut row = Row::new();
        for (header, value) in headers.iter().zip(record.iter()) {
            row.insert(header.to_string(), value.to_string());
        }
        rows.push(row);
    }
    Ok(rows)
}

/// Writes headers plus rows as CSV text.
pub fn rows_to_csv(file: &str, headers: &[&str], rows: &[Vec<String>]) -> GbResult<String> {
    let mut writer = csv::WriterBuilder::new().from_writer(Vec::new());
    writer
        .write_record(headers)
        .map_err(|err| csv_error(file, err))?;
    for row in rows {
        writer.write_record(row).map_err(|err| csv_error(file, err))?;
    }
    let bytes = writer.into_inner().map_err(|err| csv_error(file, err))?;
    String::from_utf8(bytes).map_err(|err| csv_error(file, err))
}
