//! Load Calculator: the ACWR time-series derivation.
//!
//! A stage machine over a standardized table, applied in strict order:
//! clean → fill missing dates → short-term average → week indexing →
//! long-term average → load + quality. Each per-player computation is
//! self-contained, so players are processed in parallel and merged back by
//! row position.

pub mod stats;

use anyhow::{bail, Result};
use chrono::{Datelike, Duration, NaiveDate};
use rayon::prelude::*;
use std::collections::BTreeMap;
use tracing::{info, warn};

use crate::table::{
    LoadQuality, Row, Table, COL_LOAD, COL_LONG_TERM, COL_QUALITY, COL_SHORT_TERM, COL_WEEK,
};

pub use stats::{summarize, DateRange, LoadStats, SummaryStats};

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

fn round4(v: f64) -> f64 {
    (v * 10_000.0).round() / 10_000.0
}

pub struct LoadCalculator {
    table: Table,
    has_short_term: bool,
    has_weeks: bool,
    has_long_term: bool,
}

impl LoadCalculator {
    /// Expects a table with the canonical `player_name`, `date`, `data`
    /// columns already resolved by the schema mapper.
    pub fn new(table: Table) -> Self {
        LoadCalculator {
            table,
            has_short_term: false,
            has_weeks: false,
            has_long_term: false,
        }
    }

    /// Drop wholly empty rows (player, date and data all missing), then rows
    /// with a missing date — the series has no position for them. Rows with
    /// a valid date but missing data are retained; they keep the date index
    /// contiguous without contributing to any average.
    pub fn clean_data(&mut self) {
        let initial_len = self.table.rows.len();

        let empty_count = self
            .table
            .rows
            .iter()
            .filter(|r| r.player_name.trim().is_empty() && r.date.is_none() && r.data.is_none())
            .count();
        self.table
            .rows
            .retain(|r| !(r.player_name.trim().is_empty() && r.date.is_none() && r.data.is_none()));

        let missing_dates_count = self.table.rows.iter().filter(|r| r.date.is_none()).count();
        if missing_dates_count > 0 {
            warn!(
                "dropping {} rows with missing dates (required for time-series ACWR calculations)",
                missing_dates_count
            );
            self.table.rows.retain(|r| r.date.is_some());
        }

        let missing_data = self.table.rows.iter().filter(|r| r.data.is_none()).count();
        info!(
            "cleaned data: dropped {} empty rows, {} rows with missing dates, \
             {} rows with missing load values (kept), {}/{} rows retained",
            empty_count,
            missing_dates_count,
            missing_data,
            self.table.rows.len(),
            initial_len
        );
    }

    /// Synthesize one row per calendar day in the global `[min, max]` range
    /// for every player, left-joining existing rows onto the scaffold. Days
    /// with no original record get missing data. Rows end up sorted by
    /// (player, date).
    pub fn fill_missing_dates(&mut self) {
        if self.table.rows.is_empty() {
            return;
        }

        let min_date = self.table.rows.iter().filter_map(|r| r.date).min();
        let max_date = self.table.rows.iter().filter_map(|r| r.date).max();
        let (Some(min_date), Some(max_date)) = (min_date, max_date) else {
            return;
        };
        let total_days = (max_date - min_date).num_days() + 1;
        info!(
            "filling missing dates: range {} to {} ({} days)",
            min_date, max_date, total_days
        );

        // Partition existing rows per player and date, keeping duplicates in
        // their original order (left-join semantics). Rows without a date
        // have no scaffold slot to join onto, matching the join drop.
        let original_count = self.table.rows.len();
        let mut by_player: BTreeMap<String, BTreeMap<NaiveDate, Vec<Row>>> = BTreeMap::new();
        for row in self.table.rows.drain(..) {
            let Some(date) = row.date else { continue };
            by_player
                .entry(row.player_name.clone())
                .or_default()
                .entry(date)
                .or_default()
                .push(row);
        }

        let mut filled = Vec::new();
        for (player, mut dates) in by_player {
            let mut day = min_date;
            while day <= max_date {
                match dates.remove(&day) {
                    Some(existing) => filled.extend(existing),
                    None => filled.push(Row {
                        player_name: player.clone(),
                        date: Some(day),
                        ..Row::default()
                    }),
                }
                day += Duration::days(1);
            }
        }

        let added = filled.len().saturating_sub(original_count);
        info!(
            "added {} rows for missing dates, total rows: {}",
            added,
            filled.len()
        );
        self.table.rows = filled;
    }

    fn sort_rows(&mut self) {
        self.table
            .rows
            .sort_by(|a, b| a.player_name.cmp(&b.player_name).then(a.date.cmp(&b.date)));
    }

    /// Contiguous (start, end) row ranges per player. Requires sorted rows.
    fn player_ranges(&self) -> Vec<(usize, usize)> {
        let rows = &self.table.rows;
        let mut ranges = Vec::new();
        let mut start = 0;
        for i in 1..=rows.len() {
            if i == rows.len() || rows[i].player_name != rows[start].player_name {
                ranges.push((start, i));
                start = i;
            }
        }
        ranges
    }

    /// 3-value short-term rolling average per player, in date order. The
    /// window holds the 3 most recent non-missing values, skipping missing
    /// days; output is missing for the first two rows of a player's series
    /// and until 3 non-missing values have been seen.
    pub fn add_short_term_average(&mut self) {
        self.sort_rows();
        let ranges = self.player_ranges();

        let rows = &self.table.rows;
        let computed: Vec<Vec<Option<f64>>> = ranges
            .par_iter()
            .map(|&(s, e)| short_term_series(&rows[s..e]))
            .collect();

        for (&(s, _), values) in ranges.iter().zip(&computed) {
            for (i, v) in values.iter().enumerate() {
                self.table.rows[s + i].short_term_ave = *v;
            }
        }

        self.table.push_column(COL_SHORT_TERM);
        self.has_short_term = true;
        info!("added {} column", COL_SHORT_TERM);
    }

    /// Week 0 runs from the global minimum date up to (exclusive) the first
    /// Sunday on or after it; every following Sunday-to-Saturday block is
    /// one incrementing index. Missing dates get the -1 sentinel.
    pub fn assign_weeks(&mut self) {
        let start = self.table.rows.iter().filter_map(|r| r.date).min();
        let Some(start) = start else {
            for row in &mut self.table.rows {
                row.week_index = Some(0);
            }
            self.table.push_column(COL_WEEK);
            self.has_weeks = true;
            return;
        };

        let offset_to_sunday = (6 - start.weekday().num_days_from_monday()) % 7;
        let first_sunday = start + Duration::days(i64::from(offset_to_sunday));

        for row in &mut self.table.rows {
            row.week_index = Some(match row.date {
                None => -1,
                Some(d) if d < first_sunday => 0,
                Some(d) => 1 + (d - first_sunday).num_days() / 7,
            });
        }

        self.table.push_column(COL_WEEK);
        self.has_weeks = true;
    }

    /// Long-term average per player and week `w >= 2`: the arithmetic mean
    /// of all non-missing data pooled from weeks `w-2` and `w-1`, broadcast
    /// to every row in week `w`. Weeks 0 and 1 have no history.
    pub fn add_long_term_average(&mut self) {
        if !self.has_weeks {
            self.assign_weeks();
        }
        self.sort_rows();
        let ranges = self.player_ranges();

        let rows = &self.table.rows;
        let computed: Vec<Vec<Option<f64>>> = ranges
            .par_iter()
            .map(|&(s, e)| long_term_series(&rows[s..e]))
            .collect();

        for (&(s, _), values) in ranges.iter().zip(&computed) {
            for (i, v) in values.iter().enumerate() {
                self.table.rows[s + i].long_term_ave = *v;
            }
        }

        self.table.push_column(COL_LONG_TERM);
        self.has_long_term = true;
        info!("added {} column", COL_LONG_TERM);
    }

    /// `load = short_term_ave / long_term_ave` (ACWR), missing when either
    /// operand is missing, then the categorical quality. Fails if either
    /// average stage has not run yet.
    pub fn add_load_and_quality(&mut self) -> Result<()> {
        if !self.has_short_term {
            bail!("short_term_ave column missing; call add_short_term_average() first");
        }
        if !self.has_long_term {
            bail!("long_term_ave column missing; call add_long_term_average() first");
        }

        for row in &mut self.table.rows {
            row.load = match (row.short_term_ave, row.long_term_ave) {
                (Some(s), Some(l)) => {
                    let ratio = s / l;
                    if ratio.is_nan() {
                        None
                    } else {
                        Some(round4(ratio))
                    }
                }
                _ => None,
            };
            row.load_quality = row.load.map(LoadQuality::from_load);
        }

        self.table.push_column(COL_LOAD);
        self.table.push_column(COL_QUALITY);
        info!("added {} and {} columns", COL_LOAD, COL_QUALITY);
        Ok(())
    }

    /// Run the full derivation in order.
    pub fn process_all(&mut self) -> Result<()> {
        self.clean_data();
        self.fill_missing_dates();
        self.add_short_term_average();
        self.add_long_term_average();
        self.add_load_and_quality()
    }

    /// The processed table, all derived columns included.
    pub fn get_result(&self) -> Table {
        self.table.clone()
    }

    pub fn get_summary_stats(&self) -> SummaryStats {
        stats::summarize(&self.table)
    }
}

fn short_term_series(rows: &[Row]) -> Vec<Option<f64>> {
    let mut out = Vec::with_capacity(rows.len());
    let mut non_missing: Vec<f64> = Vec::new();

    for (idx, row) in rows.iter().enumerate() {
        if let Some(v) = row.data {
            non_missing.push(v);
        }
        if idx < 2 || non_missing.len() < 3 {
            out.push(None);
        } else {
            let window = &non_missing[non_missing.len() - 3..];
            out.push(Some(round2(window.iter().sum::<f64>() / 3.0)));
        }
    }
    out
}

fn long_term_series(rows: &[Row]) -> Vec<Option<f64>> {
    // Pool non-missing data per week once, then broadcast per row.
    let mut by_week: BTreeMap<i64, Vec<f64>> = BTreeMap::new();
    for row in rows {
        if let (Some(w), Some(v)) = (row.week_index, row.data) {
            by_week.entry(w).or_default().push(v);
        }
    }

    rows.iter()
        .map(|row| {
            let w = row.week_index.unwrap_or(-1);
            if w < 2 {
                return None;
            }
            let pooled: Vec<f64> = [w - 2, w - 1]
                .iter()
                .filter_map(|pw| by_week.get(pw))
                .flatten()
                .copied()
                .collect();
            if pooled.is_empty() {
                None
            } else {
                Some(round2(pooled.iter().sum::<f64>() / pooled.len() as f64))
            }
        })
        .collect()
}
