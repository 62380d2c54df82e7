//! Session workflow: ingest → process → save, with every failure caught at
//! the stage boundary and turned into a terminal `Failed` status instead of
//! propagating. A session always ends `Completed` (with a full derived
//! table and statistics) or `Failed` (with a message naming stage and
//! cause), never in between.

use anyhow::{bail, Context, Result};
use serde::Serialize;
use serde_json::json;
use std::path::PathBuf;
use tracing::{error, info};

use crate::cache::{TableCache, TableHandle, TableShape};
use crate::calc::{LoadCalculator, SummaryStats};
use crate::output::save_processed;
use crate::schema::{combine_files, read_delimited, ColumnMapper};
use crate::settings::Settings;
use crate::table::{Table, COL_DATA, COL_DATE, COL_PLAYER};

const STAGE_INGEST: &str = "data_ingest";
const STAGE_PROCESS: &str = "data_process";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionState {
    pub session_id: String,
    pub uploaded_files: Vec<String>,
    pub raw_data: Option<TableHandle>,
    /// Mapping report: a single file's report, or `{"files": [...]}` with
    /// one outcome per input file.
    pub column_mapping: Option<serde_json::Value>,
    pub has_srpe_columns: bool,
    pub processed_data: Option<TableHandle>,
    pub processed_csv_path: Option<PathBuf>,
    pub processed_excel_path: Option<PathBuf>,
    pub summary: Option<SummaryStats>,
    pub status: SessionStatus,
    pub current_stage: Option<String>,
    pub error_message: Option<String>,
}

impl SessionState {
    pub fn new(session_id: impl Into<String>, uploaded_files: Vec<String>) -> Self {
        SessionState {
            session_id: session_id.into(),
            uploaded_files,
            raw_data: None,
            column_mapping: None,
            has_srpe_columns: false,
            processed_data: None,
            processed_csv_path: None,
            processed_excel_path: None,
            summary: None,
            status: SessionStatus::Pending,
            current_stage: None,
            error_message: None,
        }
    }

    fn fail(&mut self, stage: &str, message: String) {
        error!("{} failed: {}", stage, message);
        self.status = SessionStatus::Failed;
        self.current_stage = Some(stage.to_string());
        self.error_message = Some(message);
    }
}

/// Load files, standardize columns, and commit the raw table to cache.
pub fn ingest(settings: &Settings, state: &mut SessionState) {
    info!("=== data ingest: session {} ===", state.session_id);

    if state.uploaded_files.is_empty() {
        state.fail(STAGE_INGEST, "no files uploaded for processing".into());
        return;
    }

    match ingest_inner(settings, state) {
        Ok(()) => {
            state.status = SessionStatus::Processing;
            state.current_stage = Some(STAGE_INGEST.to_string());
        }
        Err(e) => state.fail(STAGE_INGEST, format!("data ingestion error: {e:#}")),
    }
}

fn ingest_inner(settings: &Settings, state: &mut SessionState) -> Result<()> {
    let files = &state.uploaded_files;
    info!("processing {} file(s)", files.len());

    let (table, mapping, has_srpe) = if files.len() == 1 {
        let raw = read_delimited(files[0].as_ref())?;
        let mut mapper = ColumnMapper::new(&raw);
        mapper.detect_columns();
        let table = mapper.apply_mapping();
        let report = serde_json::to_value(mapper.report())?;
        (table, report, mapper.has_srpe_columns())
    } else {
        let combined = combine_files(files);
        let report = json!({ "files": combined.outcomes });
        (combined.table, report, combined.has_srpe_columns)
    };

    // Wholly blank rows never survive cleaning, so a table of nothing but
    // blanks is as fatal as an empty one.
    let no_valid_rows = table
        .rows
        .iter()
        .all(|r| r.player_name.trim().is_empty() && r.date.is_none() && r.data.is_none());
    if table.rows.is_empty() || no_valid_rows {
        bail!("no valid data found in uploaded files");
    }
    validate_required_columns(&table)?;

    let cache = TableCache::new(&settings.cache_dir)?;
    let handle = cache.commit(
        &table,
        files,
        &["ingest".to_string(), "column_mapping".to_string()],
        "rows",
    )?;

    info!(
        "ingestion complete: {} rows, {} players",
        handle.shape.0,
        table.unique_players().len()
    );

    state.raw_data = Some(handle);
    state.column_mapping = Some(mapping);
    state.has_srpe_columns = has_srpe;
    Ok(())
}

fn validate_required_columns(table: &Table) -> Result<()> {
    let missing: Vec<&str> = [COL_PLAYER, COL_DATE, COL_DATA]
        .into_iter()
        .filter(|c| !table.has_column(c))
        .collect();
    if !missing.is_empty() {
        bail!(
            "missing required columns: {missing:?}; ensure the data has player identifier, \
             date, and load (or RPE + Time) columns"
        );
    }
    Ok(())
}

/// Run the load calculator over the raw handle, save outputs, and commit
/// the processed table.
pub fn process(settings: &Settings, state: &mut SessionState) {
    info!("=== data process: session {} ===", state.session_id);

    let Some(raw) = state.raw_data.clone() else {
        state.fail(STAGE_PROCESS, "no raw data available for processing".into());
        return;
    };

    match process_inner(settings, state, &raw) {
        Ok(()) => {
            state.status = SessionStatus::Completed;
            state.current_stage = Some(STAGE_PROCESS.to_string());
        }
        Err(e) => state.fail(STAGE_PROCESS, format!("data processing error: {e:#}")),
    }
}

fn process_inner(settings: &Settings, state: &mut SessionState, raw: &TableHandle) -> Result<()> {
    let table = raw
        .load(TableShape::Rows)?
        .into_table()
        .context("loading raw table from cache")?;
    info!("loaded raw data: {:?}", table.shape());

    let mut calculator = LoadCalculator::new(table);
    calculator.process_all()?;
    let result = calculator.get_result();
    if result.rows.is_empty() {
        bail!("no valid rows remain after cleaning");
    }
    let stats = calculator.get_summary_stats();

    let csv_path = settings
        .outputs_dir
        .join(format!("{}_processed.csv", state.session_id));
    let xlsx_path = settings
        .outputs_dir
        .join(format!("{}_processed.xlsx", state.session_id));
    save_processed(&result, &csv_path, &xlsx_path)?;

    let mut fingerprints = raw.processing_fingerprints.clone();
    fingerprints.extend(
        ["clean", "short_term_ave", "long_term_ave", "load_quality"]
            .iter()
            .map(|s| s.to_string()),
    );
    let cache = TableCache::new(&settings.cache_dir)?;
    let handle = cache.commit(&result, &raw.sources, &fingerprints, "rows")?;

    info!("processing complete: {} rows", handle.shape.0);

    state.processed_data = Some(handle);
    state.processed_csv_path = Some(csv_path);
    state.processed_excel_path = Some(xlsx_path);
    state.summary = Some(stats);
    Ok(())
}

/// Run a full session over the given input files.
pub fn run(settings: &Settings, session_id: &str, files: &[String]) -> SessionState {
    let mut state = SessionState::new(session_id, files.to_vec());
    ingest(settings, &mut state);
    if state.status != SessionStatus::Failed {
        process(settings, &mut state);
    }
    state
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn settings(dir: &TempDir) -> Settings {
        Settings {
            cache_dir: dir.path().join("cache"),
            outputs_dir: dir.path().join("outputs"),
        }
    }

    fn write_file(dir: &TempDir, name: &str, lines: &[&str]) -> Result<String> {
        let path = dir.path().join(name);
        let mut f = std::fs::File::create(&path)?;
        for line in lines {
            writeln!(f, "{line}")?;
        }
        Ok(path.display().to_string())
    }

    #[test]
    fn full_session_completes_with_outputs_and_handles() -> Result<()> {
        let dir = TempDir::new()?;
        let settings = settings(&dir);
        settings.ensure_dirs()?;

        let mut lines = vec!["Player,Date,Load".to_string()];
        // Three weeks of daily data starting on a Sunday.
        let start = chrono::NaiveDate::from_ymd_opt(2024, 1, 7).unwrap();
        for i in 0..21 {
            let date = start + chrono::Duration::days(i);
            lines.push(format!("Alice,{},{}", date.format("%Y-%m-%d"), 100 + i));
        }
        let refs: Vec<&str> = lines.iter().map(String::as_str).collect();
        let file = write_file(&dir, "training.csv", &refs)?;

        let state = run(&settings, "s1", &[file]);
        assert_eq!(state.status, SessionStatus::Completed);
        assert!(state.error_message.is_none());

        let raw = state.raw_data.as_ref().unwrap();
        assert_eq!(
            raw.processing_fingerprints,
            vec!["ingest".to_string(), "column_mapping".to_string()]
        );
        let processed = state.processed_data.as_ref().unwrap();
        assert_eq!(processed.processing_fingerprints.len(), 6);
        assert!(processed.columns.contains(&"load_quality".to_string()));

        assert!(state.processed_csv_path.as_ref().unwrap().exists());
        assert!(state.processed_excel_path.as_ref().unwrap().exists());

        let stats = state.summary.as_ref().unwrap();
        assert_eq!(stats.unique_players, 1);
        assert_eq!(stats.total_records, 21);

        // The processed handle reloads content-for-content.
        let table = processed.load(TableShape::Rows)?.into_table()?;
        assert_eq!(table.shape().0, 21);
        Ok(())
    }

    #[test]
    fn no_files_fails_immediately() -> Result<()> {
        let dir = TempDir::new()?;
        let state = run(&settings(&dir), "s2", &[]);
        assert_eq!(state.status, SessionStatus::Failed);
        assert_eq!(state.current_stage.as_deref(), Some(STAGE_INGEST));
        assert!(state
            .error_message
            .as_deref()
            .unwrap()
            .contains("no files uploaded"));
        Ok(())
    }

    #[test]
    fn all_blank_sole_file_is_a_fatal_ingestion_failure() -> Result<()> {
        let dir = TempDir::new()?;
        let settings = settings(&dir);
        settings.ensure_dirs()?;

        let file = write_file(&dir, "blank.csv", &["Player,Date,Load", ",,", ",,"])?;
        let state = run(&settings, "s3", &[file]);

        // Mapping resolves the columns but every row is blank, which is as
        // fatal as an empty table.
        assert_eq!(state.status, SessionStatus::Failed);
        assert_eq!(state.current_stage.as_deref(), Some(STAGE_INGEST));
        assert!(state
            .error_message
            .as_deref()
            .unwrap()
            .contains("no valid data"));
        Ok(())
    }

    #[test]
    fn unmappable_columns_fail_with_a_descriptive_message() -> Result<()> {
        let dir = TempDir::new()?;
        let settings = settings(&dir);
        settings.ensure_dirs()?;

        let file = write_file(&dir, "odd.csv", &["foo,bar", "1,2"])?;
        let state = run(&settings, "s4", &[file]);

        assert_eq!(state.status, SessionStatus::Failed);
        assert_eq!(state.current_stage.as_deref(), Some(STAGE_INGEST));
        assert!(state
            .error_message
            .as_deref()
            .unwrap()
            .contains("missing required columns"));
        Ok(())
    }

    #[test]
    fn multi_file_session_tracks_per_file_outcomes() -> Result<()> {
        let dir = TempDir::new()?;
        let settings = settings(&dir);
        settings.ensure_dirs()?;

        let a = write_file(
            &dir,
            "a.csv",
            &[
                "Player,Date,Load",
                "Alice,2024-01-01,100",
                "Alice,2024-01-02,110",
                "Alice,2024-01-03,120",
            ],
        )?;
        let b = write_file(
            &dir,
            "b.csv",
            &[
                "Athlete,Day,RPE,Duration",
                "Bob,2024-01-01,6,30",
                "Bob,2024-01-02,7,45",
            ],
        )?;

        let state = run(&settings, "s5", &[a, b]);
        assert_eq!(state.status, SessionStatus::Completed);
        assert!(state.has_srpe_columns);

        let mapping = state.column_mapping.as_ref().unwrap();
        assert_eq!(mapping["files"].as_array().unwrap().len(), 2);
        Ok(())
    }
}
