//! Processed-table persistence: a delimited-text file plus a spreadsheet
//! with the `load_quality` column highlighted by category. A spreadsheet
//! formatting failure degrades to a plain workbook instead of failing the
//! whole save.

use anyhow::{Context, Result};
use rust_xlsxwriter::{
    Color, ConditionalFormatCell, ConditionalFormatCellRule, Format, Workbook,
};
use std::{fs::File, path::Path};
use tracing::{info, warn};

use crate::table::{Row, Table, COL_DATA, COL_DATE, COL_LOAD, COL_LONG_TERM, COL_PLAYER,
    COL_QUALITY, COL_SHORT_TERM, COL_SOURCE, COL_WEEK,
};

const HIGH_COLOR: u32 = 0xFF9999;
const MEDIUM_COLOR: u32 = 0xFFFF99;
const LOW_COLOR: u32 = 0xCCFFCC;

pub fn save_processed(table: &Table, csv_path: &Path, xlsx_path: &Path) -> Result<()> {
    write_csv(table, csv_path)?;
    info!("saved CSV to {}", csv_path.display());

    if let Err(e) = write_xlsx(table, xlsx_path, true) {
        warn!(
            "could not create colored spreadsheet: {:#}; writing plain workbook",
            e
        );
        write_xlsx(table, xlsx_path, false)?;
    }
    info!("saved spreadsheet to {}", xlsx_path.display());
    Ok(())
}

fn write_csv(table: &Table, path: &Path) -> Result<()> {
    let batch = table.to_record_batch()?;
    let file =
        File::create(path).with_context(|| format!("creating file {}", path.display()))?;
    let mut writer = arrow::csv::WriterBuilder::new().with_header(true).build(file);
    writer
        .write(&batch)
        .with_context(|| format!("writing CSV to {}", path.display()))?;
    Ok(())
}

enum Cell {
    Text(String),
    Number(f64),
    Empty,
}

fn cell_value(row: &Row, col: &str) -> Cell {
    match col {
        COL_PLAYER => Cell::Text(row.player_name.clone()),
        COL_DATE => match row.date {
            Some(d) => Cell::Text(d.format("%Y-%m-%d").to_string()),
            None => Cell::Empty,
        },
        COL_DATA => row.data.map_or(Cell::Empty, Cell::Number),
        COL_SOURCE => row
            .source_file
            .clone()
            .map_or(Cell::Empty, Cell::Text),
        COL_SHORT_TERM => row.short_term_ave.map_or(Cell::Empty, Cell::Number),
        COL_WEEK => row
            .week_index
            .map_or(Cell::Empty, |w| Cell::Number(w as f64)),
        COL_LONG_TERM => row.long_term_ave.map_or(Cell::Empty, Cell::Number),
        COL_LOAD => row.load.map_or(Cell::Empty, Cell::Number),
        COL_QUALITY => row
            .load_quality
            .map_or(Cell::Empty, |q| Cell::Text(q.as_str().to_string())),
        _ => Cell::Empty,
    }
}

fn write_xlsx(table: &Table, path: &Path, with_formats: bool) -> Result<()> {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name("data")?;

    for (c, col) in table.columns.iter().enumerate() {
        worksheet.write_string(0, c as u16, col)?;
    }
    for (r, row) in table.rows.iter().enumerate() {
        let r = r as u32 + 1;
        for (c, col) in table.columns.iter().enumerate() {
            match cell_value(row, col) {
                Cell::Text(s) => {
                    worksheet.write_string(r, c as u16, &s)?;
                }
                Cell::Number(v) => {
                    worksheet.write_number(r, c as u16, v)?;
                }
                Cell::Empty => {}
            }
        }
    }

    if with_formats {
        if let Some(q_idx) = table.columns.iter().position(|c| c == COL_QUALITY) {
            let q_col = q_idx as u16;
            let last_row = table.rows.len() as u32;
            for (value, color) in [
                ("high", HIGH_COLOR),
                ("medium", MEDIUM_COLOR),
                ("low", LOW_COLOR),
            ] {
                let format = Format::new().set_background_color(Color::RGB(color));
                let rule = ConditionalFormatCell::new()
                    .set_rule(ConditionalFormatCellRule::EqualTo(value.to_string()))
                    .set_format(format);
                worksheet.add_conditional_format(1, q_col, last_row, q_col, &rule)?;
            }
        }
    }

    workbook
        .save(path)
        .with_context(|| format!("saving spreadsheet {}", path.display()))?;
    Ok(())
}
