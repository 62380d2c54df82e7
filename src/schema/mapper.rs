//! Column detection and standardization.
//!
//! Maps arbitrary input column names onto the canonical
//! `player_name, date, data` shape. Detection walks the table's columns in
//! their original left-to-right order and takes the first column matching
//! any pattern in a family. When no direct load column exists but both an
//! RPE and a duration column do, `data` is derived as RPE × duration.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::patterns;
use super::read::RawTable;
use crate::table::{
    parse::{parse_date, parse_numeric},
    Row, Table, COL_DATA, COL_DATE, COL_PLAYER,
};

/// Outcome of column detection for one source table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MappingReport {
    pub original_columns: Vec<String>,
    /// Original → canonical renames, in detection order.
    pub mapping: Vec<(String, String)>,
    pub has_srpe_columns: bool,
    pub rpe_column: Option<String>,
    pub time_column: Option<String>,
}

pub struct ColumnMapper<'a> {
    raw: &'a RawTable,
    mapping: Vec<(String, String)>,
    player_idx: Option<usize>,
    date_idx: Option<usize>,
    data_idx: Option<usize>,
    has_srpe_columns: bool,
    rpe_idx: Option<usize>,
    time_idx: Option<usize>,
}

impl<'a> ColumnMapper<'a> {
    pub fn new(raw: &'a RawTable) -> Self {
        ColumnMapper {
            raw,
            mapping: Vec::new(),
            player_idx: None,
            date_idx: None,
            data_idx: None,
            has_srpe_columns: false,
            rpe_idx: None,
            time_idx: None,
        }
    }

    /// First column (in table order) matching any pattern in the family.
    fn match_column(&self, family: &[regex::Regex]) -> Option<usize> {
        for (idx, col) in self.raw.headers.iter().enumerate() {
            let name = col.trim();
            if family.iter().any(|re| re.is_match(name)) {
                return Some(idx);
            }
        }
        None
    }

    pub fn detect_columns(&mut self) {
        if let Some(idx) = self.match_column(&patterns::PLAYER_PATTERNS) {
            let col = self.raw.headers[idx].clone();
            info!("detected player column: '{}' -> '{}'", col, COL_PLAYER);
            self.mapping.push((col, COL_PLAYER.to_string()));
            self.player_idx = Some(idx);
        } else {
            warn!("could not detect player identifier column");
        }

        if let Some(idx) = self.match_column(&patterns::DATE_PATTERNS) {
            let col = self.raw.headers[idx].clone();
            info!("detected date column: '{}' -> '{}'", col, COL_DATE);
            self.mapping.push((col, COL_DATE.to_string()));
            self.date_idx = Some(idx);
        } else {
            warn!("could not detect date column");
        }

        if let Some(idx) = self.match_column(&patterns::LOAD_PATTERNS) {
            let col = self.raw.headers[idx].clone();
            info!("detected load column: '{}' -> '{}'", col, COL_DATA);
            self.mapping.push((col, COL_DATA.to_string()));
            self.data_idx = Some(idx);
        } else {
            let rpe = self.match_column(&patterns::RPE_PATTERNS);
            let time = self.match_column(&patterns::TIME_PATTERNS);
            if let (Some(r), Some(t)) = (rpe, time) {
                self.has_srpe_columns = true;
                self.rpe_idx = Some(r);
                self.time_idx = Some(t);
                info!(
                    "detected sRPE columns: RPE='{}', Time='{}' -> will calculate '{}' = RPE x Time",
                    self.raw.headers[r], self.raw.headers[t], COL_DATA
                );
            } else {
                warn!("could not detect load column or RPE/Time columns for sRPE calculation");
            }
        }
    }

    /// Project the raw table onto the canonical columns that were resolved.
    /// Unresolved canonical columns are simply absent from the output; the
    /// caller validates completeness.
    pub fn apply_mapping(&self) -> Table {
        let mut columns = Vec::new();
        if self.player_idx.is_some() {
            columns.push(COL_PLAYER.to_string());
        }
        if self.date_idx.is_some() {
            columns.push(COL_DATE.to_string());
        }
        let derives_data = self.has_srpe_columns && self.rpe_idx.is_some() && self.time_idx.is_some();
        if self.data_idx.is_some() || derives_data {
            columns.push(COL_DATA.to_string());
        }

        if columns.len() < 3 {
            warn!(
                "missing required columns after mapping: have {:?}, need [{}, {}, {}]",
                columns, COL_PLAYER, COL_DATE, COL_DATA
            );
        }

        let rows = self
            .raw
            .rows
            .iter()
            .map(|raw_row| {
                let field = |idx: Option<usize>| idx.and_then(|i| raw_row.get(i));
                let data = if let Some(v) = field(self.data_idx) {
                    parse_numeric(v)
                } else if derives_data {
                    let rpe = field(self.rpe_idx).and_then(|v| parse_numeric(v));
                    let time = field(self.time_idx).and_then(|v| parse_numeric(v));
                    match (rpe, time) {
                        (Some(r), Some(t)) => Some(r * t),
                        _ => None,
                    }
                } else {
                    None
                };
                Row {
                    player_name: field(self.player_idx)
                        .map(|v| v.trim().to_string())
                        .unwrap_or_default(),
                    date: field(self.date_idx).and_then(|v| parse_date(v)),
                    data,
                    ..Row::default()
                }
            })
            .collect();

        Table::new(columns, rows)
    }

    pub fn has_srpe_columns(&self) -> bool {
        self.has_srpe_columns
    }

    pub fn report(&self) -> MappingReport {
        MappingReport {
            original_columns: self.raw.headers.clone(),
            mapping: self.mapping.clone(),
            has_srpe_columns: self.has_srpe_columns,
            rpe_column: self.rpe_idx.map(|i| self.raw.headers[i].clone()),
            time_column: self.time_idx.map(|i| self.raw.headers[i].clone()),
        }
    }
}
