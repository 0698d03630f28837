//! Interactive loop over a long-lived pipeline.
//!
//! Re-renders are served from the report cache while it is fresh; `refresh`
//! is the only way to force a live fetch inside the TTL.

use super::{export, report, ui};
use crate::core::ReportPipeline;
use anyhow::Result;
use std::io::Write;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq)]
pub enum SessionCommand {
    Show,
    Refresh,
    ExportCsv(PathBuf),
    ExportXlsx(PathBuf),
    Quit,
    Unknown(String),
}

impl SessionCommand {
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        let (cmd, arg) = match line.split_once(char::is_whitespace) {
            Some((cmd, arg)) => (cmd, arg.trim()),
            None => (line, ""),
        };
        match (cmd.to_lowercase().as_str(), arg) {
            ("" | "show" | "s", _) => SessionCommand::Show,
            ("r" | "refresh", _) => SessionCommand::Refresh,
            ("e" | "export", path) if !path.is_empty() => SessionCommand::ExportCsv(path.into()),
            ("x" | "xlsx", path) if !path.is_empty() => SessionCommand::ExportXlsx(path.into()),
            ("q" | "quit" | "exit", _) => SessionCommand::Quit,
            _ => SessionCommand::Unknown(line.to_string()),
        }
    }
}

const HELP: &str =
    "[Enter] show  [r] refresh  [e <path>] export CSV  [x <path>] export xlsx  [q] quit";

/// Runs the session on stdin until `q` or end of input.
pub async fn run(pipeline: &ReportPipeline) -> Result<()> {
    let stdin = BufReader::new(tokio::io::stdin());
    run_with(pipeline, stdin, std::io::stdout()).await
}

pub async fn run_with<R, W>(pipeline: &ReportPipeline, input: R, mut out: W) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    let report = report::fetch_with_progress(pipeline).await;
    report.display_as_table();

    let mut lines = input.lines();
    loop {
        writeln!(out, "{}", ui::style_text(HELP, ui::StyleType::Subtle))?;
        out.flush()?;

        let Some(line) = lines.next_line().await? else {
            debug!("Session input closed");
            break;
        };

        match SessionCommand::parse(&line) {
            SessionCommand::Show => {
                ui::print_separator();
                report::fetch_with_progress(pipeline)
                    .await
                    .display_as_table();
            }
            SessionCommand::Refresh => {
                pipeline.force_refresh().await;
                ui::print_separator();
                report::fetch_with_progress(pipeline)
                    .await
                    .display_as_table();
            }
            SessionCommand::ExportCsv(path) => {
                let report = pipeline.build_report().await;
                report_export(&mut out, &path, export::write_csv(&report, &path))?;
            }
            SessionCommand::ExportXlsx(path) => {
                let report = pipeline.build_report().await;
                report_export(&mut out, &path, export::write_xlsx(&report, &path))?;
            }
            SessionCommand::Quit => break,
            SessionCommand::Unknown(cmd) => writeln!(
                out,
                "{}",
                ui::style_text(&format!("Unknown command: {cmd}"), ui::StyleType::Error)
            )?,
        }
    }
    Ok(())
}

fn report_export<W: Write>(out: &mut W, path: &Path, result: Result<()>) -> Result<()> {
    match result {
        Ok(()) => writeln!(out, "Exported to {}", path.display())?,
        Err(e) => {
            warn!("Export failed: {:#}", e);
            writeln!(
                out,
                "{}",
                ui::style_text(&format!("Export failed: {e:#}"), ui::StyleType::Error)
            )?;
        }
    }
    Ok(())
}
