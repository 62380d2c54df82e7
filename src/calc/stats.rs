//! Read-only summary statistics over a processed table.

use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeMap;

use crate::table::{LoadQuality, Table, COL_LOAD, COL_QUALITY};

#[derive(Debug, Clone, Serialize)]
pub struct DateRange {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

/// Load-column aggregates, rounded to 4 decimal places. Absent entirely
/// when the table has no non-missing load values.
#[derive(Debug, Clone, Serialize)]
pub struct LoadStats {
    pub mean: f64,
    pub median: f64,
    pub min: f64,
    pub max: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SummaryStats {
    pub total_records: usize,
    pub unique_players: usize,
    pub date_range: DateRange,
    pub missing_data_count: usize,
    pub load_quality_distribution: BTreeMap<String, usize>,
    pub high_load_players: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub load_stats: Option<LoadStats>,
}

fn round4(v: f64) -> f64 {
    (v * 10_000.0).round() / 10_000.0
}

pub fn summarize(table: &Table) -> SummaryStats {
    let rows = &table.rows;

    let mut distribution: BTreeMap<String, usize> = BTreeMap::new();
    let mut high_players: Vec<String> = Vec::new();
    if table.has_column(COL_QUALITY) {
        for row in rows {
            if let Some(q) = row.load_quality {
                *distribution.entry(q.as_str().to_string()).or_default() += 1;
                if q == LoadQuality::High && !high_players.contains(&row.player_name) {
                    high_players.push(row.player_name.clone());
                }
            }
        }
    }

    let load_stats = if table.has_column(COL_LOAD) {
        let mut loads: Vec<f64> = rows.iter().filter_map(|r| r.load).collect();
        if loads.is_empty() {
            None
        } else {
            loads.sort_by(|a, b| a.total_cmp(b));
            let n = loads.len();
            let median = if n % 2 == 1 {
                loads[n / 2]
            } else {
                (loads[n / 2 - 1] + loads[n / 2]) / 2.0
            };
            Some(LoadStats {
                mean: round4(loads.iter().sum::<f64>() / n as f64),
                median: round4(median),
                min: round4(loads[0]),
                max: round4(loads[n - 1]),
            })
        }
    } else {
        None
    };

    SummaryStats {
        total_records: rows.len(),
        unique_players: table.unique_players().len(),
        date_range: DateRange {
            start: rows.iter().filter_map(|r| r.date).min(),
            end: rows.iter().filter_map(|r| r.date).max(),
        },
        missing_data_count: rows.iter().filter(|r| r.data.is_none()).count(),
        load_quality_distribution: distribution,
        high_load_players: high_players,
        load_stats,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::{Row, COL_DATA, COL_DATE, COL_PLAYER};

    #[test]
    fn median_of_even_and_odd_counts() {
        let mut rows: Vec<Row> = [0.5, 1.0, 2.0, 4.0]
            .iter()
            .map(|&l| Row {
                player_name: "A".into(),
                load: Some(l),
                ..Row::default()
            })
            .collect();

        let mut table = Table::new(
            vec![COL_PLAYER.into(), COL_DATE.into(), COL_DATA.into()],
            rows.clone(),
        );
        table.push_column(COL_LOAD);
        let stats = summarize(&table);
        let ls = stats.load_stats.unwrap();
        assert_eq!(ls.median, 1.5);
        assert_eq!(ls.mean, 1.875);

        rows.push(Row {
            player_name: "A".into(),
            load: Some(8.0),
            ..Row::default()
        });
        let mut table = Table::new(
            vec![COL_PLAYER.into(), COL_DATE.into(), COL_DATA.into()],
            rows,
        );
        table.push_column(COL_LOAD);
        let stats = summarize(&table);
        assert_eq!(stats.load_stats.unwrap().median, 2.0);
    }

    #[test]
    fn high_players_are_deduplicated_in_first_appearance_order() {
        let row = |p: &str, q: LoadQuality| Row {
            player_name: p.into(),
            load: Some(2.0),
            load_quality: Some(q),
            ..Row::default()
        };
        let mut table = Table::new(
            vec![COL_PLAYER.into(), COL_DATE.into(), COL_DATA.into()],
            vec![
                row("B", LoadQuality::High),
                row("A", LoadQuality::Medium),
                row("B", LoadQuality::High),
                row("A", LoadQuality::High),
            ],
        );
        table.push_column(COL_LOAD);
        table.push_column(COL_QUALITY);

        let stats = summarize(&table);
        assert_eq!(stats.high_load_players, vec!["B".to_string(), "A".to_string()]);
        assert_eq!(stats.load_quality_distribution.get("high"), Some(&3));
        assert_eq!(stats.load_quality_distribution.get("medium"), Some(&1));
    }

    #[test]
    fn no_loads_means_no_load_stats() {
        let mut table = Table::new(
            vec![COL_PLAYER.into(), COL_DATE.into(), COL_DATA.into()],
            vec![Row {
                player_name: "A".into(),
                ..Row::default()
            }],
        );
        table.push_column(COL_LOAD);
        assert!(summarize(&table).load_stats.is_none());
    }
}
