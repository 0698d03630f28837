//! Scripted market data source for unit tests.

use crate::core::market::{HistoricalPeriod, MarketDataSource, QuarterlyFinancials, Snapshot};
use anyhow::{Result, anyhow};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

/// Serves canned responses and records every call it receives.
///
/// Anything not scripted fails, the way an unknown symbol does upstream.
#[derive(Default)]
pub struct ScriptedSource {
    snapshots: HashMap<String, Snapshot>,
    financials: HashMap<String, QuarterlyFinancials>,
    closes: HashMap<(String, HistoricalPeriod), Vec<Option<f64>>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_snapshot(mut self, symbol: &str, snapshot: Snapshot) -> Self {
        self.snapshots.insert(symbol.to_string(), snapshot);
        self
    }

    pub fn with_quarters(mut self, symbol: &str, quarters: Vec<Option<f64>>) -> Self {
        let mut financials = QuarterlyFinancials::default();
        financials
            .line_items
            .insert("Total Revenue".to_string(), quarters);
        self.financials.insert(symbol.to_string(), financials);
        self
    }

    pub fn with_financials(mut self, symbol: &str, financials: QuarterlyFinancials) -> Self {
        self.financials.insert(symbol.to_string(), financials);
        self
    }

    pub fn with_closes(
        mut self,
        symbol: &str,
        period: HistoricalPeriod,
        closes: Vec<Option<f64>>,
    ) -> Self {
        self.closes.insert((symbol.to_string(), period), closes);
        self
    }

    /// Number of recorded calls whose label starts with `prefix`.
    pub fn count(&self, prefix: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|call| call.starts_with(prefix))
            .count()
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl MarketDataSource for ScriptedSource {
    async fn fetch_snapshot(&self, symbol: &str) -> Result<Snapshot> {
        self.record(format!("snapshot:{symbol}"));
        self.snapshots
            .get(symbol)
            .cloned()
            .ok_or_else(|| anyhow!("No snapshot for {}", symbol))
    }

    async fn fetch_quarterly_financials(&self, symbol: &str) -> Result<QuarterlyFinancials> {
        self.record(format!("quarterly:{symbol}"));
        self.financials
            .get(symbol)
            .cloned()
            .ok_or_else(|| anyhow!("No financials for {}", symbol))
    }

    async fn fetch_daily_closes(
        &self,
        symbol: &str,
        period: HistoricalPeriod,
    ) -> Result<Vec<Option<f64>>> {
        self.record(format!("closes:{symbol}:{period}"));
        self.closes
            .get(&(symbol.to_string(), period))
            .cloned()
            .ok_or_else(|| anyhow!("No closes for {} over {}", symbol, period))
    }
}
