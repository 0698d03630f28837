//! Aggregation pipeline assembling the cached report table.
use crate::core::advisory::AdvisoryTable;
use crate::core::cache::Cache;
use crate::core::config::{AppConfig, PolicyConfig, RosterEntry};
use crate::core::currency::{CurrencyRateResolver, REPORTING_CURRENCY, RateTable};
use crate::core::market::MarketDataSource;
use crate::core::metrics::{self, EntityMetrics};
use crate::core::throttle::Throttle;
use chrono::{DateTime, Utc};
use std::cmp::Ordering;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

pub const REPORT_CACHE_KEY: &str = "report";

/// One company's figures with monetary values in the reporting currency.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportRow {
    pub company: String,
    pub symbol: String,
    pub native_currency: String,
    pub last_price_native: Option<f64>,
    pub market_cap_usd: Option<f64>,
    pub revenue_ttm_usd: Option<f64>,
    pub pe_ratio: Option<f64>,
    pub daily_pct_change: Option<f64>,
    pub timestamp_utc: DateTime<Utc>,
}

impl ReportRow {
    /// Converts `metrics` with `rates`, stamping the row with the current time.
    pub fn from_metrics(entry: &RosterEntry, metrics: &EntityMetrics, rates: &RateTable) -> Self {
        let currency = &metrics.native_currency;
        ReportRow {
            company: entry.name.clone(),
            symbol: entry.clean_symbol(),
            native_currency: currency.clone(),
            last_price_native: metrics.last_price_native,
            market_cap_usd: rates.convert(metrics.market_cap_native, currency),
            revenue_ttm_usd: rates.convert(metrics.revenue_ttm_native, currency),
            pe_ratio: metrics.pe_ratio,
            daily_pct_change: metrics.daily_pct_change,
            timestamp_utc: Utc::now(),
        }
    }
}

/// Sorted rows and the advisory notes of one fetch cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    pub rows: Vec<ReportRow>,
    pub notes: Vec<String>,
    pub generated_at: DateTime<Utc>,
}

/// Orders rows by reporting-currency market cap, largest first. Rows without
/// a market cap go last. The sort is stable.
pub fn sort_by_market_cap(rows: &mut [ReportRow]) {
    rows.sort_by(|a, b| match (a.market_cap_usd, b.market_cap_usd) {
        (Some(x), Some(y)) => y.total_cmp(&x),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });
}

fn pass_through_note(metrics: &EntityMetrics, symbol: &str, rates: &RateTable) -> Option<String> {
    let has_money = metrics.market_cap_native.is_some() || metrics.revenue_ttm_native.is_some();
    let unresolved = rates.rate(&metrics.native_currency).is_none();
    (has_money && unresolved).then(|| {
        format!(
            "{symbol}: no {}→{REPORTING_CURRENCY} rate available; monetary values are shown unconverted.",
            metrics.native_currency
        )
    })
}

/// Builds the report for a fixed roster and caches it for the configured TTL.
pub struct ReportPipeline {
    source: Arc<dyn MarketDataSource>,
    rates: CurrencyRateResolver,
    cache: Arc<dyn Cache<String, Arc<Report>>>,
    roster: Vec<RosterEntry>,
    advisories: AdvisoryTable,
    policy: PolicyConfig,
    throttle: Throttle,
    build_lock: Mutex<()>,
}

impl ReportPipeline {
    pub fn new(
        source: Arc<dyn MarketDataSource>,
        rates: CurrencyRateResolver,
        cache: Arc<dyn Cache<String, Arc<Report>>>,
        config: &AppConfig,
    ) -> Self {
        ReportPipeline {
            source,
            rates,
            cache,
            roster: config.companies.clone(),
            advisories: AdvisoryTable::new(&config.advisories),
            throttle: Throttle::new(config.policy.fetch_delay()),
            policy: config.policy.clone(),
            build_lock: Mutex::new(()),
        }
    }

    pub fn roster(&self) -> &[RosterEntry] {
        &self.roster
    }

    pub async fn build_report(&self) -> Arc<Report> {
        self.build_report_with_progress(&|_: &RosterEntry| ()).await
    }

    /// Returns the cached report, or runs a full fetch cycle when none is
    /// cached. `on_entity` is called after each roster entry is fetched.
    pub async fn build_report_with_progress(
        &self,
        on_entity: &(dyn Fn(&RosterEntry) + Sync),
    ) -> Arc<Report> {
        let key = REPORT_CACHE_KEY.to_string();
        if let Some(report) = self.cache.get(&key).await {
            return report;
        }

        // Concurrent readers wait for the cycle in flight instead of starting another
        let _guard = self.build_lock.lock().await;
        if let Some(report) = self.cache.get(&key).await {
            return report;
        }

        let report = Arc::new(self.run_cycle(on_entity).await);
        self.cache
            .put(key, Arc::clone(&report), Some(self.policy.cache_ttl()))
            .await;
        report
    }

    /// Invalidates the report and rate caches so the next read fetches live.
    pub async fn force_refresh(&self) {
        info!("Forcing refresh of report and FX rates");
        self.cache.remove(&REPORT_CACHE_KEY.to_string()).await;
        self.rates.invalidate().await;
    }

    async fn run_cycle(&self, on_entity: &(dyn Fn(&RosterEntry) + Sync)) -> Report {
        info!("Fetching report for {} companies", self.roster.len());
        let source = self.source.as_ref();

        let mut currencies = Vec::with_capacity(self.roster.len());
        for entry in &self.roster {
            currencies.push(metrics::fetch_currency(source, &entry.clean_symbol()).await);
        }
        let rates = self.rates.resolve_rates(&currencies).await;
        debug!(?rates, "Resolved rate table");

        let mut rows = Vec::with_capacity(self.roster.len());
        let mut notes = Vec::new();
        for (entry, currency) in self.roster.iter().zip(&currencies) {
            self.throttle.until_ready().await;

            let symbol = entry.clean_symbol();
            let metrics = metrics::fetch_entity(
                source,
                &symbol,
                currency,
                self.policy.outlier_threshold_pct,
            )
            .await;

            notes.extend(self.advisories.notes_for(&symbol, &metrics));
            notes.extend(pass_through_note(&metrics, &symbol, &rates));
            rows.push(ReportRow::from_metrics(entry, &metrics, &rates));
            on_entity(entry);
        }

        sort_by_market_cap(&mut rows);
        Report {
            rows,
            notes,
            generated_at: Utc::now(),
        }
    }
}
