//! Declarative per-entity advisory rules.
//!
//! A rule names a symbol, the conditions over its fetched metrics that make
//! the data suspect, and the note to surface when any of them holds.

use crate::core::metrics::EntityMetrics;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdvisoryCondition {
    DailyChangeMissing,
    MarketCapMissing,
    RevenueMissing,
    PriceMissing,
}

impl AdvisoryCondition {
    pub fn holds(&self, metrics: &EntityMetrics) -> bool {
        match self {
            AdvisoryCondition::DailyChangeMissing => metrics.daily_pct_change.is_none(),
            AdvisoryCondition::MarketCapMissing => metrics.market_cap_native.is_none(),
            AdvisoryCondition::RevenueMissing => metrics.revenue_ttm_native.is_none(),
            AdvisoryCondition::PriceMissing => metrics.last_price_native.is_none(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdvisoryRule {
    pub symbol: String,
    pub when: Vec<AdvisoryCondition>,
    pub note: String,
}

impl AdvisoryRule {
    /// Returns the note if any of the rule's conditions holds.
    pub fn evaluate(&self, metrics: &EntityMetrics) -> Option<&str> {
        self.when
            .iter()
            .any(|condition| condition.holds(metrics))
            .then_some(self.note.as_str())
    }
}

/// Rules indexed by symbol, in declaration order.
#[derive(Debug, Clone, Default)]
pub struct AdvisoryTable {
    rules: HashMap<String, Vec<AdvisoryRule>>,
}

impl AdvisoryTable {
    pub fn new(rules: &[AdvisoryRule]) -> Self {
        let mut table = AdvisoryTable::default();
        for rule in rules {
            table
                .rules
                .entry(rule.symbol.trim().to_uppercase())
                .or_default()
                .push(rule.clone());
        }
        table
    }

    pub fn notes_for(&self, symbol: &str, metrics: &EntityMetrics) -> Vec<String> {
        self.rules
            .get(&symbol.to_uppercase())
            .map(|rules| {
                rules
                    .iter()
                    .filter_map(|rule| rule.evaluate(metrics))
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }
}
