//! Multi-file ingestion: map each file independently, tag provenance, and
//! concatenate positionally. One unreadable file does not abort the batch;
//! its failure is captured in the combined report instead.

use serde::Serialize;
use std::path::Path;
use tracing::{error, info};

use super::mapper::{ColumnMapper, MappingReport};
use super::read::read_delimited;
use crate::table::{Table, COL_SOURCE};

/// Per-file record in the combined mapping report: either a mapping report
/// or the error that prevented one.
#[derive(Debug, Clone, Serialize)]
pub struct FileOutcome {
    pub file: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<MappingReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CombinedIngest {
    pub table: Table,
    pub outcomes: Vec<FileOutcome>,
    /// True iff any successfully mapped file used the RPE x Time derivation.
    pub has_srpe_columns: bool,
}

pub fn combine_files<P: AsRef<Path>>(paths: &[P]) -> CombinedIngest {
    let mut combined = Table::default();
    let mut outcomes = Vec::with_capacity(paths.len());
    let mut has_srpe = false;

    for path in paths {
        let path = path.as_ref();
        let display_path = path.display().to_string();

        match read_delimited(path) {
            Ok(raw) => {
                let mut mapper = ColumnMapper::new(&raw);
                mapper.detect_columns();
                let mut table = mapper.apply_mapping();
                has_srpe |= mapper.has_srpe_columns();

                // Provenance marker for every row of this file.
                for row in &mut table.rows {
                    row.source_file = Some(display_path.clone());
                }
                table.push_column(COL_SOURCE);

                info!("processed file: {} ({} rows)", display_path, table.rows.len());

                // Column union keeps rename results from every file; rows
                // from a file lacking a column carry missing values there.
                for col in &table.columns {
                    combined.push_column(col);
                }
                combined.rows.extend(table.rows);

                outcomes.push(FileOutcome {
                    file: display_path,
                    report: Some(mapper.report()),
                    error: None,
                });
            }
            Err(e) => {
                error!("failed to process file {}: {:#}", display_path, e);
                outcomes.push(FileOutcome {
                    file: display_path,
                    report: None,
                    error: Some(format!("{e:#}")),
                });
            }
        }
    }

    info!(
        "combined {} file(s) into {} total rows",
        outcomes.iter().filter(|o| o.error.is_none()).count(),
        combined.rows.len()
    );

    CombinedIngest {
        table: combined,
        outcomes,
        has_srpe_columns: has_srpe,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_csv(lines: &[&str]) -> Result<NamedTempFile> {
        let mut f = NamedTempFile::new()?;
        for line in lines {
            writeln!(f, "{line}")?;
        }
        Ok(f)
    }

    #[test]
    fn combines_files_with_provenance() -> Result<()> {
        let a = write_csv(&["Player,Date,Load", "Alice,2024-01-01,10"])?;
        let b = write_csv(&["Athlete,Day,RPE,Duration", "Bob,2024-01-02,6,30"])?;

        let combined = combine_files(&[a.path(), b.path()]);
        assert_eq!(combined.table.rows.len(), 2);
        assert!(combined.has_srpe_columns);
        assert_eq!(
            combined.table.columns,
            vec!["player_name", "date", "data", "source_file"]
        );
        assert_eq!(
            combined.table.rows[0].source_file.as_deref(),
            Some(a.path().display().to_string().as_str())
        );
        assert_eq!(combined.table.rows[1].data, Some(180.0));
        assert_eq!(combined.outcomes.len(), 2);
        assert!(combined.outcomes.iter().all(|o| o.error.is_none()));
        Ok(())
    }

    #[test]
    fn one_bad_file_does_not_abort_the_batch() -> Result<()> {
        let good = write_csv(&["Player,Date,Load", "Alice,2024-01-01,10"])?;
        let missing = std::path::PathBuf::from("/nonexistent/nope.csv");

        let combined = combine_files(&[good.path().to_path_buf(), missing]);
        assert_eq!(combined.table.rows.len(), 1);
        assert_eq!(combined.outcomes.len(), 2);
        assert!(combined.outcomes[0].error.is_none());
        assert!(combined.outcomes[1].error.is_some());
        Ok(())
    }

    #[test]
    fn unmappable_files_leave_required_columns_absent() -> Result<()> {
        let f = write_csv(&["foo,bar", "1,2"])?;
        let combined = combine_files(&[f.path()]);
        assert!(!combined.has_srpe_columns);
        assert!(!combined.table.has_column("data"));
        Ok(())
    }
}
