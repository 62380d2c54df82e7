//! Delimited-text file loading into an untyped [`RawTable`].

use anyhow::{anyhow, Context, Result};
use arrow::{
    array::{Array, StringArray},
    csv::ReaderBuilder,
    datatypes::{DataType, Field, Schema},
};
use std::{fs, io::Cursor, path::Path, sync::Arc};
use tracing::debug;

use crate::table::parse::clean_str;

/// A freshly read table: the column names the file claims, plus every data
/// row as one string per field. Typing happens later, in the mapper.
#[derive(Debug, Clone)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// Read a comma-delimited file with a header row. All fields are parsed as
/// nullable strings; nulls come back as empty strings.
pub fn read_delimited(path: &Path) -> Result<RawTable> {
    let content =
        fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;

    let header_line = content
        .lines()
        .next()
        .ok_or_else(|| anyhow!("file {} is empty", path.display()))?;
    let headers: Vec<String> = header_line.split(',').map(clean_str).collect();

    // Parse everything as Utf8 first; the mapper decides which columns are
    // numeric or dates.
    let fields: Vec<Field> = headers
        .iter()
        .map(|n| Field::new(n, DataType::Utf8, true))
        .collect();
    let schema = Arc::new(Schema::new(fields));

    let cursor = Cursor::new(content.as_bytes());
    let reader = ReaderBuilder::new(schema)
        .with_header(true)
        .with_batch_size(8192)
        .with_quote(b'"')
        .with_delimiter(b',')
        .build(cursor)
        .with_context(|| format!("creating CSV reader for {}", path.display()))?;

    let mut rows = Vec::new();
    for batch in reader {
        let batch = batch.with_context(|| format!("reading CSV batch from {}", path.display()))?;
        let columns: Vec<&StringArray> = batch
            .columns()
            .iter()
            .map(|c| {
                c.as_any()
                    .downcast_ref::<StringArray>()
                    .ok_or_else(|| anyhow!("non-string column in CSV batch"))
            })
            .collect::<Result<_>>()?;

        for i in 0..batch.num_rows() {
            let row: Vec<String> = columns
                .iter()
                .map(|col| {
                    if col.is_valid(i) {
                        col.value(i).to_string()
                    } else {
                        String::new()
                    }
                })
                .collect();
            rows.push(row);
        }
    }

    debug!(
        "read {}: {} columns, {} rows",
        path.display(),
        headers.len(),
        rows.len()
    );

    Ok(RawTable { headers, rows })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn reads_headers_and_rows() -> Result<()> {
        let mut f = NamedTempFile::new()?;
        writeln!(f, "Player,Date,Load")?;
        writeln!(f, "Alice,2024-01-01,42")?;
        writeln!(f, "Bob,2024-01-02,")?;

        let raw = read_delimited(f.path())?;
        assert_eq!(raw.headers, vec!["Player", "Date", "Load"]);
        assert_eq!(raw.rows.len(), 2);
        assert_eq!(raw.rows[0], vec!["Alice", "2024-01-01", "42"]);
        assert_eq!(raw.rows[1][2], "");
        Ok(())
    }

    #[test]
    fn empty_file_is_an_error() -> Result<()> {
        let f = NamedTempFile::new()?;
        assert!(read_delimited(f.path()).is_err());
        Ok(())
    }
}
