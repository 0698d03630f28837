pub mod cli;
pub mod core;
pub mod providers;
pub mod store;

use crate::core::config::AppConfig;
use crate::core::market::MarketDataSource;
use crate::core::{CachedRates, CurrencyRateResolver, Report, ReportPipeline};
use crate::providers::YahooFinanceSource;
use crate::store::MemoryCache;
use anyhow::Result;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

pub enum AppCommand {
    Report { refresh: bool },
    Export {
        csv: Option<PathBuf>,
        xlsx: Option<PathBuf>,
        refresh: bool,
    },
    Session,
}

/// Wires the Yahoo source, both caches and the configured roster together.
pub fn build_pipeline(config: &AppConfig) -> Result<ReportPipeline> {
    let source: Arc<dyn MarketDataSource> = Arc::new(YahooFinanceSource::new(&config.yahoo())?);

    let rates = CurrencyRateResolver::new(
        Arc::clone(&source),
        Arc::new(MemoryCache::<String, CachedRates>::named("fx-rates")),
        config.policy.cache_ttl(),
        config.policy.fx_lookback,
    );
    let report_cache = Arc::new(MemoryCache::<String, Arc<Report>>::named("report"));

    Ok(ReportPipeline::new(source, rates, report_cache, config))
}

pub async fn run_command(command: AppCommand, config_path: Option<&str>) -> Result<()> {
    info!("sportstrack starting...");

    let config = match config_path {
        Some(path) => AppConfig::load_from_path(path)?,
        None => AppConfig::load()?,
    };
    debug!("Loaded config: {config:#?}");

    let pipeline = build_pipeline(&config)?;

    match command {
        AppCommand::Report { refresh } => cli::report::run(&pipeline, refresh).await,
        AppCommand::Export { csv, xlsx, refresh } => {
            if refresh {
                pipeline.force_refresh().await;
            }
            let report = cli::report::fetch_with_progress(&pipeline).await;
            if let Some(path) = csv {
                cli::export::write_csv(&report, &path)?;
                println!("Exported {} rows to {}", report.rows.len(), path.display());
            }
            if let Some(path) = xlsx {
                cli::export::write_xlsx(&report, &path)?;
                println!("Exported {} rows to {}", report.rows.len(), path.display());
            }
            Ok(())
        }
        AppCommand::Session => cli::session::run(&pipeline).await,
    }
}
