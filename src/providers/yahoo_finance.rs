use anyhow::{Result, anyhow};
use async_trait::async_trait;
use reqwest::{Response, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, instrument};

use crate::core::config::YahooProviderConfig;
use crate::core::market::{HistoricalPeriod, MarketDataSource, QuarterlyFinancials, Snapshot};

const USER_AGENT: &str = "Mozilla/5.0 (compatible; sportstrack/0.1)";

const SNAPSHOT_MODULES: &str = "price,summaryDetail,financialData";
const QUARTERLY_MODULES: &str = "incomeStatementHistoryQuarterly";

fn chart_range(period: HistoricalPeriod) -> &'static str {
    match period {
        HistoricalPeriod::OneDay => "1d",
        HistoricalPeriod::TwoDays => "2d",
        HistoricalPeriod::FiveDays => "5d",
    }
}

/// A Yahoo numeric field, e.g. `{"raw": 1.5, "fmt": "1.50"}`. Missing
/// values come back as `{}`.
#[derive(Debug, Default, Deserialize)]
struct RawValue {
    #[serde(default)]
    raw: Option<f64>,
}

fn raw(value: &Option<RawValue>) -> Option<f64> {
    value.as_ref().and_then(|v| v.raw)
}

#[derive(Debug, Deserialize)]
struct QuoteSummaryResponse {
    #[serde(rename = "quoteSummary")]
    quote_summary: QuoteSummaryResult,
}

#[derive(Debug, Deserialize)]
struct QuoteSummaryResult {
    result: Option<Vec<QuoteSummaryItem>>,
    error: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QuoteSummaryItem {
    #[serde(default)]
    price: Option<PriceModule>,
    #[serde(default)]
    summary_detail: Option<SummaryDetailModule>,
    #[serde(default)]
    financial_data: Option<FinancialDataModule>,
    #[serde(default)]
    income_statement_history_quarterly: Option<IncomeStatementHistory>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PriceModule {
    currency: Option<String>,
    market_cap: Option<RawValue>,
    regular_market_price: Option<RawValue>,
    regular_market_previous_close: Option<RawValue>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SummaryDetailModule {
    currency: Option<String>,
    market_cap: Option<RawValue>,
    #[serde(rename = "trailingPE")]
    trailing_pe: Option<RawValue>,
    previous_close: Option<RawValue>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FinancialDataModule {
    financial_currency: Option<String>,
    current_price: Option<RawValue>,
    total_revenue: Option<RawValue>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IncomeStatementHistory {
    #[serde(default)]
    income_statement_history: Vec<IncomeStatement>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IncomeStatement {
    end_date: Option<RawValue>,
    total_revenue: Option<RawValue>,
}

impl From<QuoteSummaryItem> for Snapshot {
    fn from(item: QuoteSummaryItem) -> Self {
        let price = item.price.unwrap_or_default();
        let detail = item.summary_detail.unwrap_or_default();
        let financial = item.financial_data.unwrap_or_default();

        Snapshot {
            financial_currency: financial.financial_currency,
            currency: price.currency.or(detail.currency),
            market_cap: raw(&price.market_cap).or(raw(&detail.market_cap)),
            trailing_pe: raw(&detail.trailing_pe),
            current_price: raw(&financial.current_price).or(raw(&price.regular_market_price)),
            previous_close: raw(&detail.previous_close)
                .or(raw(&price.regular_market_previous_close)),
            total_revenue: raw(&financial.total_revenue),
        }
    }
}

impl From<IncomeStatementHistory> for QuarterlyFinancials {
    fn from(history: IncomeStatementHistory) -> Self {
        let mut statements = history.income_statement_history;
        // Newest first; undated statements sort last
        statements.sort_by_key(|s| std::cmp::Reverse(raw(&s.end_date).map(|ts| ts as i64)));

        let revenue = statements
            .iter()
            .map(|s| raw(&s.total_revenue))
            .collect::<Vec<_>>();

        let mut financials = QuarterlyFinancials::default();
        if !revenue.is_empty() {
            financials
                .line_items
                .insert("Total Revenue".to_string(), revenue);
        }
        financials
    }
}

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartResult,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    result: Option<Vec<ChartItem>>,
    error: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct ChartItem {
    indicators: Option<Indicators>,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    quote: Vec<Quote>,
}

#[derive(Debug, Deserialize)]
struct Quote {
    close: Option<Vec<Option<f64>>>,
}

fn upstream_error(error: &Option<serde_json::Value>) -> Option<&serde_json::Value> {
    error.as_ref().filter(|e| !e.is_null())
}

/// Yahoo Finance backed [`MarketDataSource`].
///
/// Chart requests are anonymous. quoteSummary requests carry a crumb bound
/// to a session cookie; the client fetches it on first use and keeps it
/// until upstream rejects it.
pub struct YahooFinanceSource {
    base_url: String,
    cookie_url: String,
    client: reqwest::Client,
    crumb: Mutex<Option<String>>,
}

impl YahooFinanceSource {
    pub fn new(config: &YahooProviderConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .cookie_store(true)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(YahooFinanceSource {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            cookie_url: config.cookie_url.clone(),
            client,
            crumb: Mutex::new(None),
        })
    }

    async fn send(&self, url: &str, query: &[(&str, &str)], symbol: &str) -> Result<Response> {
        debug!("Requesting {} {:?}", url, query);
        self.client
            .get(url)
            .query(query)
            .send()
            .await
            .map_err(|e| anyhow!("Request error: {} for symbol: {}", e, symbol))
    }

    async fn read_json<T: DeserializeOwned>(response: Response, symbol: &str) -> Result<T> {
        if !response.status().is_success() {
            return Err(anyhow!(
                "HTTP error: {} for symbol: {}",
                response.status(),
                symbol
            ));
        }

        let text = response.text().await?;
        serde_json::from_str(&text)
            .map_err(|e| anyhow!("Failed to parse JSON response for {}: {}", symbol, e))
    }

    /// Returns the session crumb, running the cookie handshake when none is held.
    async fn crumb(&self) -> Result<String> {
        let mut held = self.crumb.lock().await;
        if let Some(crumb) = held.as_ref() {
            return Ok(crumb.clone());
        }

        // The cookie page answers with an error status but still sets the cookie
        debug!("Requesting session cookie from {}", self.cookie_url);
        if let Err(e) = self.client.get(&self.cookie_url).send().await {
            debug!("Session cookie request failed: {}", e);
        }

        let url = format!("{}/v1/test/getcrumb", self.base_url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| anyhow!("Request error: {} while fetching crumb", e))?;
        if !response.status().is_success() {
            return Err(anyhow!(
                "HTTP error: {} while fetching crumb",
                response.status()
            ));
        }

        let crumb = response.text().await?.trim().to_string();
        if crumb.is_empty() || crumb.contains('<') {
            return Err(anyhow!("Invalid crumb received from {}", url));
        }
        debug!("Obtained quoteSummary crumb");
        *held = Some(crumb.clone());
        Ok(crumb)
    }

    async fn quote_summary(&self, symbol: &str, modules: &str) -> Result<QuoteSummaryItem> {
        let crumb = self.crumb().await?;
        let url = format!("{}/v10/finance/quoteSummary/{}", self.base_url, symbol);
        let response = self
            .send(&url, &[("modules", modules), ("crumb", &crumb)], symbol)
            .await?;
        if response.status() == StatusCode::UNAUTHORIZED {
            debug!("Crumb rejected for {}, dropping it", symbol);
            self.crumb.lock().await.take();
        }

        let data: QuoteSummaryResponse = Self::read_json(response, symbol).await?;
        if let Some(err) = upstream_error(&data.quote_summary.error) {
            return Err(anyhow!("Upstream error for {}: {}", symbol, err));
        }
        data.quote_summary
            .result
            .and_then(|items| items.into_iter().next())
            .ok_or_else(|| anyhow!("No data found for symbol: {}", symbol))
    }
}

#[async_trait]
impl MarketDataSource for YahooFinanceSource {
    #[instrument(name = "YahooSnapshot", skip(self), fields(symbol = %symbol))]
    async fn fetch_snapshot(&self, symbol: &str) -> Result<Snapshot> {
        let item = self.quote_summary(symbol, SNAPSHOT_MODULES).await?;
        Ok(item.into())
    }

    #[instrument(name = "YahooQuarterly", skip(self), fields(symbol = %symbol))]
    async fn fetch_quarterly_financials(&self, symbol: &str) -> Result<QuarterlyFinancials> {
        let item = self.quote_summary(symbol, QUARTERLY_MODULES).await?;
        Ok(item
            .income_statement_history_quarterly
            .map(QuarterlyFinancials::from)
            .unwrap_or_default())
    }

    #[instrument(name = "YahooCloses", skip(self), fields(symbol = %symbol, period = %period))]
    async fn fetch_daily_closes(
        &self,
        symbol: &str,
        period: HistoricalPeriod,
    ) -> Result<Vec<Option<f64>>> {
        let url = format!("{}/v8/finance/chart/{}", self.base_url, symbol);
        let response = self
            .send(&url, &[("interval", "1d"), ("range", chart_range(period))], symbol)
            .await?;
        let data: ChartResponse = Self::read_json(response, symbol).await?;
        if let Some(err) = upstream_error(&data.chart.error) {
            return Err(anyhow!("Upstream error for {}: {}", symbol, err));
        }

        let item = data
            .chart
            .result
            .and_then(|items| items.into_iter().next())
            .ok_or_else(|| anyhow!("No data found for symbol: {}", symbol))?;

        Ok(item
            .indicators
            .and_then(|inds| inds.quote.into_iter().next())
            .and_then(|q| q.close)
            .unwrap_or_default())
    }
}
