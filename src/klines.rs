use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;

const YAHOO_CHART_BASE: &str = "https://query1.finance.yahoo.com";

// Yahoo rejects requests without a browser-looking agent.
const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36";

// --- Domain Types ---

#[derive(Debug, Clone, PartialEq)]
pub struct Candle {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// Price history for one ticker, ascending by timestamp.
#[derive(Debug, Clone, Default)]
pub struct PriceSeries {
    pub ticker: String,
    pub candles: Vec<Candle>,
}

impl PriceSeries {
    pub fn empty(ticker: &str) -> Self {
        Self {
            ticker: ticker.to_string(),
            candles: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }

    pub fn len(&self) -> usize {
        self.candles.len()
    }

    pub fn closes(&self) -> Vec<f64> {
        self.candles.iter().map(|c| c.close).collect()
    }
}

/// Source of historical bars. An empty series means "no data", not a failure.
#[async_trait]
pub trait PriceSource {
    async fn fetch(&self, ticker: &str, lookback_days: u32, interval: &str) -> Result<PriceSeries>;
}

// --- Yahoo chart response ---

#[derive(Deserialize, Debug)]
pub struct ChartResponse {
    chart: ChartEnvelope,
}

#[derive(Deserialize, Debug)]
struct ChartEnvelope {
    #[serde(default)]
    result: Option<Vec<ChartResult>>,
    #[serde(default)]
    error: Option<ChartError>,
}

#[derive(Deserialize, Debug)]
struct ChartError {
    code: String,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Deserialize, Debug)]
struct ChartResult {
    #[serde(default)]
    timestamp: Vec<i64>,
    indicators: Indicators,
}

#[derive(Deserialize, Debug)]
struct Indicators {
    #[serde(default)]
    quote: Vec<Quote>,
}

#[derive(Deserialize, Debug, Default)]
struct Quote {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<f64>>,
}

fn value_at(values: &[Option<f64>], i: usize) -> Option<f64> {
    values.get(i).copied().flatten()
}

/// Turns a chart payload into a series. Rows without a close are dropped.
pub fn parse_chart(ticker: &str, response: &ChartResponse) -> PriceSeries {
    if let Some(err) = &response.chart.error {
        log::debug!(
            "{}: provider error {} ({})",
            ticker,
            err.code,
            err.description.as_deref().unwrap_or("no description")
        );
        return PriceSeries::empty(ticker);
    }

    let Some(result) = response.chart.result.as_ref().and_then(|r| r.first()) else {
        return PriceSeries::empty(ticker);
    };
    let Some(quote) = result.indicators.quote.first() else {
        return PriceSeries::empty(ticker);
    };

    let mut candles: Vec<Candle> = result
        .timestamp
        .iter()
        .enumerate()
        .filter_map(|(i, &ts)| {
            let close = value_at(&quote.close, i)?;
            let timestamp = DateTime::from_timestamp(ts, 0)?;
            Some(Candle {
                timestamp,
                open: value_at(&quote.open, i).unwrap_or(f64::NAN),
                high: value_at(&quote.high, i).unwrap_or(f64::NAN),
                low: value_at(&quote.low, i).unwrap_or(f64::NAN),
                close,
                volume: value_at(&quote.volume, i).unwrap_or(0.0),
            })
        })
        .collect();

    candles.sort_by_key(|c| c.timestamp);

    PriceSeries {
        ticker: ticker.to_string(),
        candles,
    }
}

// --- Fetcher ---

pub struct YahooSource {
    client: Client,
    base_url: String,
}

impl YahooSource {
    pub fn new() -> Result<Self> {
        Self::with_base_url(YAHOO_CHART_BASE)
    }

    pub fn with_base_url(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to build market data HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn chart_url(&self, ticker: &str) -> String {
        format!("{}/v8/finance/chart/{}", self.base_url, ticker)
    }
}

#[async_trait]
impl PriceSource for YahooSource {
    async fn fetch(&self, ticker: &str, lookback_days: u32, interval: &str) -> Result<PriceSeries> {
        let url = self.chart_url(ticker);
        let query = [
            ("range", format!("{}d", lookback_days)),
            ("interval", interval.to_string()),
            ("includePrePost", "false".to_string()),
            ("events", "div,splits".to_string()),
        ];
        log::debug!("GET {} {:?}", url, query);

        let response = self
            .client
            .get(&url)
            .query(&query)
            .send()
            .await
            .with_context(|| format!("Market data request for {} failed", ticker))?;

        let status = response.status();

        // Unknown or delisted symbols come back as 404.
        if status == StatusCode::NOT_FOUND {
            return Ok(PriceSeries::empty(ticker));
        }

        if !status.is_success() {
            log::warn!("{}: market data provider answered {}, treating as no data", ticker, status);
            return Ok(PriceSeries::empty(ticker));
        }

        let payload: ChartResponse = response
            .json()
            .await
            .with_context(|| format!("Malformed chart payload for {}", ticker))?;

        let series = parse_chart(ticker, &payload);
        log::debug!("{}: {} samples", ticker, series.len());
        Ok(series)
    }
}
