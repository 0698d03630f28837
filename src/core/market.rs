//! Market data abstractions and core types

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt::Display;
use std::str::FromStr;

/// Line item names under which upstream statements report revenue.
pub const REVENUE_LINE_ITEMS: [&str; 2] = ["Total Revenue", "TotalRevenue"];

/// Lookback window for a daily close history request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub enum HistoricalPeriod {
    #[serde(rename = "1D")]
    OneDay,
    #[serde(rename = "2D")]
    TwoDays,
    #[serde(rename = "5D")]
    FiveDays,
}

impl Display for HistoricalPeriod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                HistoricalPeriod::OneDay => "1D",
                HistoricalPeriod::TwoDays => "2D",
                HistoricalPeriod::FiveDays => "5D",
            }
        )
    }
}

impl FromStr for HistoricalPeriod {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "1D" => Ok(HistoricalPeriod::OneDay),
            "2D" => Ok(HistoricalPeriod::TwoDays),
            "5D" => Ok(HistoricalPeriod::FiveDays),
            _ => Err(anyhow::anyhow!("Invalid historical period: {}", s)),
        }
    }
}

/// Point-in-time bundle of named financial facts about one symbol.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    pub financial_currency: Option<String>,
    pub currency: Option<String>,
    pub market_cap: Option<f64>,
    pub trailing_pe: Option<f64>,
    pub current_price: Option<f64>,
    pub previous_close: Option<f64>,
    pub total_revenue: Option<f64>,
}

/// Quarterly statement: line item name to values, newest quarter first.
/// A `None` marks a quarter the upstream reported without a value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QuarterlyFinancials {
    pub line_items: HashMap<String, Vec<Option<f64>>>,
}

impl QuarterlyFinancials {
    pub fn line_item(&self, name: &str) -> Option<&[Option<f64>]> {
        self.line_items.get(name).map(Vec::as_slice)
    }

    /// First revenue series with at least one value under any of the known
    /// line item names.
    pub fn revenue(&self) -> Option<&[Option<f64>]> {
        REVENUE_LINE_ITEMS.iter().find_map(|name| {
            self.line_item(name)
                .filter(|series| series.iter().any(Option::is_some))
        })
    }
}

/// The upstream market data collaborator.
///
/// Every call may fail; callers treat a failure as "no data".
#[async_trait]
pub trait MarketDataSource: Send + Sync {
    async fn fetch_snapshot(&self, symbol: &str) -> Result<Snapshot>;

    async fn fetch_quarterly_financials(&self, symbol: &str) -> Result<QuarterlyFinancials>;

    /// Daily closes over `period`, oldest first. Days without a close are `None`.
    async fn fetch_daily_closes(
        &self,
        symbol: &str,
        period: HistoricalPeriod,
    ) -> Result<Vec<Option<f64>>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_period_round_trips_through_display() {
        for period in [
            HistoricalPeriod::OneDay,
            HistoricalPeriod::TwoDays,
            HistoricalPeriod::FiveDays,
        ] {
            assert_eq!(period.to_string().parse::<HistoricalPeriod>().unwrap(), period);
        }
        assert!("1Y".parse::<HistoricalPeriod>().is_err());
    }

    #[test]
    fn test_revenue_accepts_either_line_item_name() {
        let mut financials = QuarterlyFinancials::default();
        assert!(financials.revenue().is_none());

        financials
            .line_items
            .insert("TotalRevenue".to_string(), vec![Some(1.0)]);
        assert_eq!(financials.revenue(), Some(&[Some(1.0)][..]));

        financials
            .line_items
            .insert("Total Revenue".to_string(), vec![Some(2.0)]);
        assert_eq!(financials.revenue(), Some(&[Some(2.0)][..]));
    }

    #[test]
    fn test_revenue_skips_line_item_without_values() {
        let mut financials = QuarterlyFinancials::default();
        financials
            .line_items
            .insert("Total Revenue".to_string(), vec![None, None]);
        assert!(financials.revenue().is_none());

        financials
            .line_items
            .insert("TotalRevenue".to_string(), vec![Some(1.0), Some(2.0)]);
        assert_eq!(financials.revenue(), Some(&[Some(1.0), Some(2.0)][..]));
    }
}
