//! Canonical in-memory table for training-load records.
//!
//! A [`Table`] is a row store plus the ordered list of canonical columns that
//! are actually present. The schema mapper emits only the columns it could
//! resolve, so callers detect an unmappable input by the absence of a
//! required column rather than by an error value.

pub mod parse;

use anyhow::{anyhow, Context, Result};
use arrow::{
    array::{
        Array, ArrayRef, Date32Array, Date32Builder, Float64Array, Float64Builder, Int64Array,
        Int64Builder, StringArray, StringBuilder,
    },
    datatypes::{DataType, Field, Schema},
    record_batch::RecordBatch,
};
use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub const COL_PLAYER: &str = "player_name";
pub const COL_DATE: &str = "date";
pub const COL_DATA: &str = "data";
pub const COL_SOURCE: &str = "source_file";
pub const COL_SHORT_TERM: &str = "short_term_ave";
pub const COL_WEEK: &str = "week_index";
pub const COL_LONG_TERM: &str = "long_term_ave";
pub const COL_LOAD: &str = "load";
pub const COL_QUALITY: &str = "load_quality";

/// ACWR risk category. `from_load` uses the exact comparison constant
/// 0.6667 for the low boundary, not the rounded 0.67 shown in reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadQuality {
    High,
    Medium,
    Low,
}

impl LoadQuality {
    pub fn from_load(load: f64) -> Self {
        if load > 1.5 {
            LoadQuality::High
        } else if load < 0.6667 {
            LoadQuality::Low
        } else {
            LoadQuality::Medium
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LoadQuality::High => "high",
            LoadQuality::Medium => "medium",
            LoadQuality::Low => "low",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "high" => Some(LoadQuality::High),
            "medium" => Some(LoadQuality::Medium),
            "low" => Some(LoadQuality::Low),
            _ => None,
        }
    }
}

/// One canonical record. An empty `player_name` means the identifier was
/// blank in the source; clean-up drops such rows only when date and data are
/// missing as well. Derived fields stay `None` until their stage runs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    pub player_name: String,
    pub date: Option<NaiveDate>,
    pub data: Option<f64>,
    pub source_file: Option<String>,
    pub short_term_ave: Option<f64>,
    /// Sunday-to-Saturday week bucket; -1 marks an invalid date.
    pub week_index: Option<i64>,
    pub long_term_ave: Option<f64>,
    pub load: Option<f64>,
    pub load_quality: Option<LoadQuality>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    /// Canonical columns present, in order.
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
}

impl Table {
    pub fn new(columns: Vec<String>, rows: Vec<Row>) -> Self {
        Table { columns, rows }
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.rows.len(), self.columns.len())
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c == name)
    }

    /// Append a column name if it is not already present.
    pub fn push_column(&mut self, name: &str) {
        if !self.has_column(name) {
            self.columns.push(name.to_string());
        }
    }

    /// Distinct player names in first-appearance order.
    pub fn unique_players(&self) -> Vec<String> {
        let mut seen = Vec::new();
        for row in &self.rows {
            if !seen.contains(&row.player_name) {
                seen.push(row.player_name.clone());
            }
        }
        seen
    }

    /// Columnar view of the table: Utf8 for strings, Date32 for dates,
    /// Float64 / Int64 for the numeric columns.
    pub fn to_record_batch(&self) -> Result<RecordBatch> {
        if self.columns.is_empty() {
            return Ok(RecordBatch::new_empty(Arc::new(Schema::empty())));
        }

        let mut fields = Vec::with_capacity(self.columns.len());
        let mut arrays: Vec<ArrayRef> = Vec::with_capacity(self.columns.len());

        for col in &self.columns {
            let (dtype, array): (DataType, ArrayRef) = match col.as_str() {
                COL_PLAYER => {
                    let mut b = StringBuilder::new();
                    for r in &self.rows {
                        b.append_value(&r.player_name);
                    }
                    (DataType::Utf8, Arc::new(b.finish()))
                }
                COL_DATE => {
                    let mut b = Date32Builder::new();
                    for r in &self.rows {
                        b.append_option(r.date.map(date_to_days));
                    }
                    (DataType::Date32, Arc::new(b.finish()))
                }
                COL_DATA | COL_SHORT_TERM | COL_LONG_TERM | COL_LOAD => {
                    let mut b = Float64Builder::new();
                    for r in &self.rows {
                        b.append_option(match col.as_str() {
                            COL_DATA => r.data,
                            COL_SHORT_TERM => r.short_term_ave,
                            COL_LONG_TERM => r.long_term_ave,
                            _ => r.load,
                        });
                    }
                    (DataType::Float64, Arc::new(b.finish()))
                }
                COL_WEEK => {
                    let mut b = Int64Builder::new();
                    for r in &self.rows {
                        b.append_option(r.week_index);
                    }
                    (DataType::Int64, Arc::new(b.finish()))
                }
                COL_SOURCE | COL_QUALITY => {
                    let mut b = StringBuilder::new();
                    for r in &self.rows {
                        let v = if col == COL_SOURCE {
                            r.source_file.clone()
                        } else {
                            r.load_quality.map(|q| q.as_str().to_string())
                        };
                        b.append_option(v);
                    }
                    (DataType::Utf8, Arc::new(b.finish()))
                }
                other => return Err(anyhow!("unknown canonical column `{}`", other)),
            };
            fields.push(Field::new(col, dtype, true));
            arrays.push(array);
        }

        RecordBatch::try_new(Arc::new(Schema::new(fields)), arrays)
            .context("building record batch from table")
    }

    /// Rebuild a row-oriented table from a columnar batch.
    pub fn from_record_batch(batch: &RecordBatch) -> Result<Table> {
        let mut rows = vec![Row::default(); batch.num_rows()];
        let mut columns = Vec::with_capacity(batch.num_columns());

        for (idx, field) in batch.schema().fields().iter().enumerate() {
            let name = field.name().clone();
            let arr = batch.column(idx);
            match name.as_str() {
                COL_PLAYER => {
                    let a = downcast::<StringArray>(arr, &name)?;
                    for (i, row) in rows.iter_mut().enumerate() {
                        row.player_name = if a.is_valid(i) {
                            a.value(i).to_string()
                        } else {
                            String::new()
                        };
                    }
                }
                COL_DATE => {
                    let a = downcast::<Date32Array>(arr, &name)?;
                    for (i, row) in rows.iter_mut().enumerate() {
                        row.date = a.is_valid(i).then(|| days_to_date(a.value(i)));
                    }
                }
                COL_DATA | COL_SHORT_TERM | COL_LONG_TERM | COL_LOAD => {
                    let a = downcast::<Float64Array>(arr, &name)?;
                    for (i, row) in rows.iter_mut().enumerate() {
                        let v = a.is_valid(i).then(|| a.value(i));
                        match name.as_str() {
                            COL_DATA => row.data = v,
                            COL_SHORT_TERM => row.short_term_ave = v,
                            COL_LONG_TERM => row.long_term_ave = v,
                            _ => row.load = v,
                        }
                    }
                }
                COL_WEEK => {
                    let a = downcast::<Int64Array>(arr, &name)?;
                    for (i, row) in rows.iter_mut().enumerate() {
                        row.week_index = a.is_valid(i).then(|| a.value(i));
                    }
                }
                COL_SOURCE => {
                    let a = downcast::<StringArray>(arr, &name)?;
                    for (i, row) in rows.iter_mut().enumerate() {
                        row.source_file = a.is_valid(i).then(|| a.value(i).to_string());
                    }
                }
                COL_QUALITY => {
                    let a = downcast::<StringArray>(arr, &name)?;
                    for (i, row) in rows.iter_mut().enumerate() {
                        row.load_quality = if a.is_valid(i) {
                            LoadQuality::parse(a.value(i))
                        } else {
                            None
                        };
                    }
                }
                other => return Err(anyhow!("unknown canonical column `{}`", other)),
            }
            columns.push(name);
        }

        Ok(Table { columns, rows })
    }
}

fn downcast<'a, T: 'static>(arr: &'a ArrayRef, name: &str) -> Result<&'a T> {
    arr.as_any()
        .downcast_ref::<T>()
        .ok_or_else(|| anyhow!("unexpected array type for column `{}`", name))
}

fn unix_epoch() -> NaiveDate {
    NaiveDate::from_ymd_opt(1970, 1, 1).unwrap()
}

fn date_to_days(d: NaiveDate) -> i32 {
    (d - unix_epoch()).num_days() as i32
}

fn days_to_date(days: i32) -> NaiveDate {
    unix_epoch() + Duration::days(days as i64)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn sample_table() -> Table {
        let rows = vec![
            Row {
                player_name: "Alice".into(),
                date: Some(d(2024, 1, 1)),
                data: Some(10.0),
                source_file: Some("a.csv".into()),
                short_term_ave: None,
                week_index: Some(0),
                long_term_ave: None,
                load: Some(1.25),
                load_quality: Some(LoadQuality::Medium),
            },
            Row {
                player_name: "Bob".into(),
                date: None,
                data: None,
                source_file: None,
                short_term_ave: Some(12.34),
                week_index: Some(-1),
                long_term_ave: Some(8.0),
                load: None,
                load_quality: None,
            },
        ];
        Table::new(
            vec![
                COL_PLAYER.into(),
                COL_DATE.into(),
                COL_DATA.into(),
                COL_SOURCE.into(),
                COL_SHORT_TERM.into(),
                COL_WEEK.into(),
                COL_LONG_TERM.into(),
                COL_LOAD.into(),
                COL_QUALITY.into(),
            ],
            rows,
        )
    }

    #[test]
    fn record_batch_round_trip_preserves_values() -> Result<()> {
        let table = sample_table();
        let batch = table.to_record_batch()?;
        assert_eq!(batch.num_rows(), 2);
        assert_eq!(batch.num_columns(), 9);

        let back = Table::from_record_batch(&batch)?;
        assert_eq!(back, table);
        Ok(())
    }

    #[test]
    fn quality_boundaries_use_exact_constant() {
        assert_eq!(LoadQuality::from_load(1.5001), LoadQuality::High);
        assert_eq!(LoadQuality::from_load(1.5), LoadQuality::Medium);
        assert_eq!(LoadQuality::from_load(0.6667), LoadQuality::Medium);
        assert_eq!(LoadQuality::from_load(0.6666), LoadQuality::Low);
        // The rounded user-facing 0.67 must NOT be the comparison boundary.
        assert_eq!(LoadQuality::from_load(0.669), LoadQuality::Medium);
    }

    #[test]
    fn push_column_is_idempotent() {
        let mut t = Table::new(vec![COL_PLAYER.into()], vec![]);
        t.push_column(COL_DATE);
        t.push_column(COL_DATE);
        assert_eq!(t.columns, vec![COL_PLAYER.to_string(), COL_DATE.to_string()]);
    }
}
