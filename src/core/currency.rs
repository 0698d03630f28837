//! FX rate resolution into the reporting currency.

use crate::core::cache::Cache;
use crate::core::market::{HistoricalPeriod, MarketDataSource};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

pub const REPORTING_CURRENCY: &str = "USD";

/// Upstream symbol of the `{code}` to reporting currency pair.
pub fn fx_symbol(code: &str) -> String {
    format!("{code}{REPORTING_CURRENCY}=X")
}

/// Multiplicative rates from currency code to the reporting currency.
///
/// The reporting currency itself is always present at 1.0.
#[derive(Debug, Clone, PartialEq)]
pub struct RateTable {
    rates: HashMap<String, f64>,
}

impl RateTable {
    pub fn new() -> Self {
        let mut rates = HashMap::new();
        rates.insert(REPORTING_CURRENCY.to_string(), 1.0);
        RateTable { rates }
    }

    /// Records a rate. The reporting currency entry cannot be overridden.
    pub fn insert(&mut self, code: &str, rate: f64) {
        let code = code.to_uppercase();
        if code != REPORTING_CURRENCY {
            self.rates.insert(code, rate);
        }
    }

    pub fn rate(&self, code: &str) -> Option<f64> {
        self.rates.get(&code.to_uppercase()).copied()
    }

    /// Rate applied when converting: an unresolved currency passes through at 1.0.
    pub fn conversion_rate(&self, code: &str) -> f64 {
        self.rate(code).unwrap_or(1.0)
    }

    pub fn convert(&self, value: Option<f64>, code: &str) -> Option<f64> {
        value.map(|v| v * self.conversion_rate(code))
    }

    pub fn len(&self) -> usize {
        self.rates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rates.is_empty()
    }
}

impl Default for RateTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Normalised code set: upper-cased, blanks dropped, sorted, deduplicated.
pub fn normalize_codes<I, S>(codes: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    codes
        .into_iter()
        .map(|code| code.as_ref().trim().to_uppercase())
        .filter(|code| !code.is_empty())
        .collect()
}

pub const RATES_CACHE_KEY: &str = "rates";

/// The last resolved table together with the code set it was resolved for.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedRates {
    pub codes: BTreeSet<String>,
    pub table: RateTable,
}

/// Resolves rate tables for sets of currency codes, caching the most
/// recent one. A request for a different code set replaces it.
pub struct CurrencyRateResolver {
    source: Arc<dyn MarketDataSource>,
    cache: Arc<dyn Cache<String, CachedRates>>,
    ttl: Duration,
    lookback: HistoricalPeriod,
}

impl CurrencyRateResolver {
    pub fn new(
        source: Arc<dyn MarketDataSource>,
        cache: Arc<dyn Cache<String, CachedRates>>,
        ttl: Duration,
        lookback: HistoricalPeriod,
    ) -> Self {
        CurrencyRateResolver {
            source,
            cache,
            ttl,
            lookback,
        }
    }

    /// Returns a rate table covering `codes`. Codes whose rate cannot be
    /// fetched are left out of the table.
    pub async fn resolve_rates<I, S>(&self, codes: I) -> RateTable
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let codes = normalize_codes(codes);
        let key = RATES_CACHE_KEY.to_string();
        match self.cache.get(&key).await {
            Some(cached) if cached.codes == codes => return cached.table,
            Some(_) => debug!("Cached rates cover a different code set, refetching"),
            None => {}
        }

        let mut table = RateTable::new();
        for code in codes.iter().filter(|c| c.as_str() != REPORTING_CURRENCY) {
            match self.fetch_rate(code).await {
                Some(rate) => {
                    debug!("Resolved {} rate: {}", fx_symbol(code), rate);
                    table.insert(code, rate);
                }
                None => warn!("No rate for {}, conversions will pass through", code),
            }
        }

        let cached = CachedRates {
            codes,
            table: table.clone(),
        };
        self.cache.put(key, cached, Some(self.ttl)).await;
        table
    }

    /// Drops the cached table.
    pub async fn invalidate(&self) {
        info!("Invalidating cached FX rates");
        self.cache.clear().await;
    }

    async fn fetch_rate(&self, code: &str) -> Option<f64> {
        let symbol = fx_symbol(code);
        match self.source.fetch_daily_closes(&symbol, self.lookback).await {
            Ok(closes) => closes
                .into_iter()
                .rev()
                .flatten()
                .find(|rate| rate.is_finite() && *rate > 0.0),
            Err(e) => {
                debug!("Rate fetch failed for {}: {}", symbol, e);
                None
            }
        }
    }
}
