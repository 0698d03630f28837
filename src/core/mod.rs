//! Core business logic abstractions

pub mod advisory;
pub mod cache;
pub mod config;
pub mod currency;
pub mod log;
pub mod market;
pub mod metrics;
pub mod report;
pub mod throttle;

#[cfg(test)]
pub(crate) mod testing;

// Re-export main types for cleaner imports
pub use currency::{CachedRates, CurrencyRateResolver, RateTable};
pub use market::{HistoricalPeriod, MarketDataSource, QuarterlyFinancials, Snapshot};
pub use report::{Report, ReportPipeline, ReportRow};
