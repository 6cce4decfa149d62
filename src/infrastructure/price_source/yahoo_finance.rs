use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use crate::domain::price::PriceSource;
use crate::shared::errors::PriceError;

const DEFAULT_BASE_URL: &str = "https://query1.finance.yahoo.com";
const USER_AGENT: &str = concat!("price-tracker/", env!("CARGO_PKG_VERSION"));
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Chart endpoint response: one-minute bars for the current trading day
#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: Chart,
}

#[derive(Debug, Deserialize)]
struct Chart {
    result: Option<Vec<ChartResult>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    quote: Vec<Quote>,
}

#[derive(Debug, Deserialize)]
struct Quote {
    #[serde(default)]
    close: Vec<Option<f64>>,
}

/// Latest one-minute close from the Yahoo Finance chart API
pub struct YahooFinanceSource {
    http_client: Client,
    base_url: String,
}

impl YahooFinanceSource {
    pub fn new() -> Result<Self, PriceError> {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self, PriceError> {
        let http_client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            http_client,
            base_url: base_url.into(),
        })
    }

    fn chart_url(&self, ticker: &str) -> String {
        format!(
            "{}/v8/finance/chart/{}?range=1d&interval=1m",
            self.base_url.trim_end_matches('/'),
            ticker
        )
    }
}

/// Last non-null close of the first result, `None` when the day has no bars yet
fn parse_chart(body: &str) -> Result<Option<f64>, PriceError> {
    let response: ChartResponse =
        serde_json::from_str(body).map_err(|e| PriceError::Parse(e.to_string()))?;

    if let Some(err) = response.chart.error {
        return Err(PriceError::Http(format!(
            "{}: {}",
            err.code,
            err.description.unwrap_or_default()
        )));
    }

    let close = response
        .chart
        .result
        .unwrap_or_default()
        .into_iter()
        .next()
        .and_then(|result| result.indicators.quote.into_iter().next())
        .and_then(|quote| quote.close.into_iter().rev().flatten().next());

    Ok(close)
}

#[async_trait]
impl PriceSource for YahooFinanceSource {
    fn name(&self) -> &str {
        "yahoo-finance"
    }

    async fn get_latest_price(&self, ticker: &str) -> Result<Option<f64>, PriceError> {
        let url = self.chart_url(ticker);
        let response = self.http_client.get(&url).send().await?;

        match response.status() {
            StatusCode::NOT_FOUND => return Err(PriceError::UnknownSymbol(ticker.to_string())),
            status if !status.is_success() => {
                return Err(PriceError::Http(format!(
                    "Yahoo Finance request failed with status: {}",
                    status
                )))
            }
            _ => {}
        }

        let body = response.text().await?;
        let price = parse_chart(&body)?;
        debug!(ticker, ?price, "Chart response parsed");
        Ok(price)
    }
}
