//! File exports of the report rows. Values are written unrounded and
//! absent values become empty cells.

use crate::core::{Report, ReportRow};
use anyhow::{Context, Result};
use rust_xlsxwriter::{Format, Workbook};
use std::io::Write;
use std::path::Path;
use tracing::info;

pub const EXPORT_HEADERS: [&str; 9] = [
    "Company",
    "Ticker",
    "Native Currency",
    "Last Price (native)",
    "Market Cap (USD)",
    "Revenue TTM (USD)",
    "P/E (TTM)",
    "Daily % Change",
    "Updated (UTC)",
];

pub const XLSX_SHEET_NAME: &str = "Report";

enum Field {
    Text(String),
    Number(Option<f64>),
}

fn fields(row: &ReportRow) -> [Field; 9] {
    [
        Field::Text(row.company.clone()),
        Field::Text(row.symbol.clone()),
        Field::Text(row.native_currency.clone()),
        Field::Number(row.last_price_native),
        Field::Number(row.market_cap_usd),
        Field::Number(row.revenue_ttm_usd),
        Field::Number(row.pe_ratio),
        Field::Number(row.daily_pct_change),
        Field::Text(row.timestamp_utc.format("%Y-%m-%d %H:%M:%S").to_string()),
    ]
}

fn csv_record(row: &ReportRow) -> Vec<String> {
    fields(row)
        .into_iter()
        .map(|field| match field {
            Field::Text(text) => text,
            Field::Number(value) => value.map(|v| v.to_string()).unwrap_or_default(),
        })
        .collect()
}

pub fn rows_to_csv<W: Write>(rows: &[ReportRow], writer: W) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(EXPORT_HEADERS)?;
    for row in rows {
        wtr.write_record(csv_record(row))?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_csv<P: AsRef<Path>>(report: &Report, path: P) -> Result<()> {
    let path = path.as_ref();
    let file = std::fs::File::create(path)
        .with_context(|| format!("Failed to create export file: {}", path.display()))?;
    rows_to_csv(&report.rows, file)
        .with_context(|| format!("Failed to write CSV to {}", path.display()))?;
    info!("Exported {} rows to {}", report.rows.len(), path.display());
    Ok(())
}

/// Builds a single-sheet workbook with numeric cells for the figures.
pub fn rows_to_workbook(rows: &[ReportRow]) -> Result<Workbook> {
    let mut workbook = Workbook::new();
    let header_format = Format::new().set_bold();
    let sheet = workbook.add_worksheet();
    sheet.set_name(XLSX_SHEET_NAME)?;

    for (col, header) in EXPORT_HEADERS.iter().enumerate() {
        sheet.write_string_with_format(0, col as u16, *header, &header_format)?;
    }
    for (idx, row) in rows.iter().enumerate() {
        let line = idx as u32 + 1;
        for (col, field) in fields(row).into_iter().enumerate() {
            let col = col as u16;
            match field {
                Field::Text(text) => {
                    sheet.write_string(line, col, text)?;
                }
                Field::Number(Some(value)) => {
                    sheet.write_number(line, col, value)?;
                }
                Field::Number(None) => {}
            }
        }
    }
    Ok(workbook)
}

pub fn write_xlsx<P: AsRef<Path>>(report: &Report, path: P) -> Result<()> {
    let path = path.as_ref();
    let mut workbook = rows_to_workbook(&report.rows)?;
    workbook
        .save(path)
        .with_context(|| format!("Failed to write spreadsheet to {}", path.display()))?;
    info!("Exported {} rows to {}", report.rows.len(), path.display());
    Ok(())
}
