use super::ui;
use crate::core::config::RosterEntry;
use crate::core::{Report, ReportPipeline};
use anyhow::Result;
use comfy_table::{Cell, Table};
use std::sync::Arc;

impl Report {
    /// Renders the rows with market cap and revenue in billions.
    pub fn to_table(&self) -> Table {
        let mut table = ui::new_styled_table();
        table.set_header(vec![
            ui::header_cell("Company"),
            ui::header_cell("Ticker"),
            ui::header_cell("Currency"),
            ui::header_cell("Last Price"),
            ui::header_cell("Market Cap (USD)"),
            ui::header_cell("Revenue TTM (USD)"),
            ui::header_cell("P/E (TTM)"),
            ui::header_cell("Daily %"),
        ]);

        for row in &self.rows {
            table.add_row(vec![
                Cell::new(&row.company),
                Cell::new(&row.symbol),
                Cell::new(&row.native_currency),
                ui::format_optional_cell(row.last_price_native, |v| format!("{v:.2}")),
                ui::format_optional_cell(row.market_cap_usd, ui::billions),
                ui::format_optional_cell(row.revenue_ttm_usd, ui::billions),
                ui::format_optional_cell(row.pe_ratio, |v| format!("{v:.2}")),
                ui::change_cell(row.daily_pct_change),
            ]);
        }
        table
    }

    pub fn display_as_table(&self) {
        println!(
            "\n{}",
            ui::style_text("Sportswear Market Snapshot", ui::StyleType::Title)
        );
        println!("{}", self.to_table());
        println!(
            "{}",
            ui::style_text(
                &format!(
                    "Generated at {} UTC",
                    self.generated_at.format("%Y-%m-%d %H:%M:%S")
                ),
                ui::StyleType::Subtle
            )
        );

        if !self.notes.is_empty() {
            println!("\nNotes:");
            for note in &self.notes {
                println!("{}", ui::style_text(&format!("- {note}"), ui::StyleType::Note));
            }
        }
    }
}

/// Builds the report behind a progress bar. A cached report returns at once.
pub async fn fetch_with_progress(pipeline: &ReportPipeline) -> Arc<Report> {
    let pb = ui::new_progress_bar(pipeline.roster().len() as u64, true);
    let on_entity = |entry: &RosterEntry| {
        pb.set_message(entry.name.clone());
        pb.inc(1);
    };
    let report = pipeline.build_report_with_progress(&on_entity).await;
    pb.finish_and_clear();
    report
}

pub async fn run(pipeline: &ReportPipeline, refresh: bool) -> Result<()> {
    if refresh {
        pipeline.force_refresh().await;
    }
    let report = fetch_with_progress(pipeline).await;
    report.display_as_table();
    Ok(())
}
