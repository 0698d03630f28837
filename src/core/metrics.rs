//! Per-entity metric fetching with field-level fault isolation.
//!
//! Each field of [`EntityMetrics`] is obtained through its own chain of
//! upstream calls. A failure anywhere in a chain leaves that field absent and
//! never affects the other fields.
use crate::core::currency::REPORTING_CURRENCY;
use crate::core::market::{HistoricalPeriod, MarketDataSource, Snapshot};
use tracing::{debug, instrument, warn};

/// Raw per-entity figures in the entity's native currency.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityMetrics {
    pub native_currency: String,
    pub last_price_native: Option<f64>,
    pub market_cap_native: Option<f64>,
    pub revenue_ttm_native: Option<f64>,
    pub pe_ratio: Option<f64>,
    pub daily_pct_change: Option<f64>,
}

impl EntityMetrics {
    /// Metrics with every field absent.
    pub fn unavailable(native_currency: &str) -> Self {
        EntityMetrics {
            native_currency: native_currency.to_string(),
            last_price_native: None,
            market_cap_native: None,
            revenue_ttm_native: None,
            pe_ratio: None,
            daily_pct_change: None,
        }
    }
}

/// Outcome of a percent change computation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DailyChange {
    Computed(f64),
    /// Computable but beyond the outlier threshold.
    Rejected(f64),
    /// Inputs missing or the previous close is not positive.
    Unavailable,
}

fn finite(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite())
}

fn non_zero(value: Option<f64>) -> Option<f64> {
    finite(value).filter(|v| *v != 0.0)
}

fn present(series: &[Option<f64>]) -> Vec<f64> {
    series.iter().filter_map(|v| finite(*v)).collect()
}

/// Reporting currency code from a snapshot: financial currency first, then
/// listing currency. Blank codes count as missing.
pub fn currency_from_snapshot(snapshot: &Snapshot) -> Option<String> {
    [&snapshot.financial_currency, &snapshot.currency]
        .into_iter()
        .flatten()
        .map(|code| code.trim())
        .find(|code| !code.is_empty())
        .map(str::to_uppercase)
}

/// Percent change between two closes with the zero guard and outlier filter.
pub fn compute_daily_change(
    prev: Option<f64>,
    last: Option<f64>,
    outlier_threshold_pct: f64,
) -> DailyChange {
    let (Some(prev), Some(last)) = (finite(prev), finite(last)) else {
        return DailyChange::Unavailable;
    };
    if prev <= 0.0 {
        return DailyChange::Unavailable;
    }

    let change = (last - prev) / prev * 100.0;
    if change.abs() > outlier_threshold_pct {
        DailyChange::Rejected(change)
    } else {
        DailyChange::Computed(change)
    }
}

/// Sum of the four most recent quarters that carry a value.
/// `quarters` is ordered newest first.
pub fn trailing_revenue(quarters: &[Option<f64>]) -> Option<f64> {
    let values = present(quarters);
    if values.is_empty() {
        return None;
    }
    Some(values.iter().take(4).sum())
}

/// Lightweight currency discovery for one symbol. Falls back to the
/// reporting currency on any failure.
#[instrument(name = "CurrencyDiscovery", skip(source), fields(symbol = %symbol))]
pub async fn fetch_currency(source: &dyn MarketDataSource, symbol: &str) -> String {
    match source.fetch_snapshot(symbol).await {
        Ok(snapshot) => {
            currency_from_snapshot(&snapshot).unwrap_or_else(|| REPORTING_CURRENCY.to_string())
        }
        Err(e) => {
            debug!("Currency lookup failed for {}: {}", symbol, e);
            REPORTING_CURRENCY.to_string()
        }
    }
}

/// Fetches every metric for one symbol.
///
/// `fallback_currency` is used when the snapshot carries no currency.
#[instrument(name = "EntityFetch", skip(source), fields(symbol = %symbol))]
pub async fn fetch_entity(
    source: &dyn MarketDataSource,
    symbol: &str,
    fallback_currency: &str,
    outlier_threshold_pct: f64,
) -> EntityMetrics {
    let snapshot = match source.fetch_snapshot(symbol).await {
        Ok(snapshot) => Some(snapshot),
        Err(e) => {
            warn!("Snapshot unavailable for {}: {}", symbol, e);
            None
        }
    };

    let native_currency = snapshot
        .as_ref()
        .and_then(currency_from_snapshot)
        .or_else(|| {
            let code = fallback_currency.trim();
            (!code.is_empty()).then(|| code.to_uppercase())
        })
        .unwrap_or_else(|| REPORTING_CURRENCY.to_string());

    let market_cap_native = snapshot.as_ref().and_then(|s| non_zero(s.market_cap));
    let pe_ratio = snapshot.as_ref().and_then(|s| finite(s.trailing_pe));
    let revenue_ttm_native = non_zero(revenue_ttm(source, symbol, snapshot.as_ref()).await);
    let daily_pct_change =
        daily_pct_change(source, symbol, snapshot.as_ref(), outlier_threshold_pct).await;
    let last_price_native = last_price(source, symbol, snapshot.as_ref()).await;

    let metrics = EntityMetrics {
        native_currency,
        last_price_native,
        market_cap_native,
        revenue_ttm_native,
        pe_ratio,
        daily_pct_change,
    };
    debug!(?metrics, "Fetched entity metrics");
    metrics
}

async fn revenue_ttm(
    source: &dyn MarketDataSource,
    symbol: &str,
    snapshot: Option<&Snapshot>,
) -> Option<f64> {
    match source.fetch_quarterly_financials(symbol).await {
        Ok(financials) => {
            if let Some(total) = financials.revenue().and_then(trailing_revenue) {
                return Some(total);
            }
            debug!("No quarterly revenue for {}, using snapshot total", symbol);
        }
        Err(e) => debug!("Quarterly financials unavailable for {}: {}", symbol, e),
    }
    snapshot.and_then(|s| finite(s.total_revenue))
}

async fn daily_pct_change(
    source: &dyn MarketDataSource,
    symbol: &str,
    snapshot: Option<&Snapshot>,
    outlier_threshold_pct: f64,
) -> Option<f64> {
    match source
        .fetch_daily_closes(symbol, HistoricalPeriod::TwoDays)
        .await
    {
        Ok(series) => {
            let closes = present(&series);
            if let [.., prev, last] = closes.as_slice() {
                match compute_daily_change(Some(*prev), Some(*last), outlier_threshold_pct) {
                    DailyChange::Computed(change) => return Some(change),
                    DailyChange::Rejected(change) => {
                        warn!(
                            "Discarding {:.2}% daily move for {} as a data glitch",
                            change, symbol
                        );
                        return None;
                    }
                    DailyChange::Unavailable => {}
                }
            }
        }
        Err(e) => debug!("Close history unavailable for {}: {}", symbol, e),
    }

    let snapshot = snapshot?;
    match compute_daily_change(
        snapshot.previous_close,
        snapshot.current_price,
        outlier_threshold_pct,
    ) {
        DailyChange::Computed(change) => Some(change),
        DailyChange::Rejected(change) => {
            warn!(
                "Discarding {:.2}% snapshot move for {} as a data glitch",
                change, symbol
            );
            None
        }
        DailyChange::Unavailable => None,
    }
}

async fn last_price(
    source: &dyn MarketDataSource,
    symbol: &str,
    snapshot: Option<&Snapshot>,
) -> Option<f64> {
    if let Some(price) = snapshot.and_then(|s| finite(s.current_price)) {
        return Some(price);
    }
    match source
        .fetch_daily_closes(symbol, HistoricalPeriod::OneDay)
        .await
    {
        Ok(series) => present(&series).last().copied(),
        Err(e) => {
            debug!("Latest close unavailable for {}: {}", symbol, e);
            None
        }
    }
}
