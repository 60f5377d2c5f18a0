//! Yahoo Finance chart API for commodity futures and other exchange prices.

use chrono::{DateTime, NaiveDate, Utc};
use reqwest::blocking::Client;
use serde::Deserialize;

use crate::domain::RawObservation;
use crate::error::AppError;

const BASE_URL: &str = "https://query1.finance.yahoo.com/v8/finance/chart";
const USER_AGENT: &str = concat!("tsh/", env!("CARGO_PKG_VERSION"));

pub struct YahooClient {
    client: Client,
}

impl YahooClient {
    pub fn new() -> Result<Self, AppError> {
        // The chart endpoint rejects requests without a user agent.
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| AppError::new(2, format!("Failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }

    /// Fetch daily closes for `symbol` from `start` (default: 1970-01-01) to now.
    ///
    /// Days where the exchange reports no close come back as `value: None`.
    pub fn fetch_closes(&self, symbol: &str, start: Option<NaiveDate>) -> Result<Vec<RawObservation>, AppError> {
        let period1 = start
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|dt| dt.and_utc().timestamp())
            .unwrap_or(0);
        let period2 = Utc::now().timestamp();

        let url = format!("{BASE_URL}/{symbol}");
        let resp = self
            .client
            .get(&url)
            .query(&[
                ("period1", period1.to_string()),
                ("period2", period2.to_string()),
                ("interval", "1d".to_string()),
            ])
            .send()
            .map_err(|e| AppError::new(4, format!("Yahoo request for {symbol} failed: {e}")))?;

        if !resp.status().is_success() {
            return Err(AppError::new(
                4,
                format!("Yahoo request for {symbol} failed with status {}.", resp.status()),
            ));
        }

        let body: ChartResponse = resp
            .json()
            .map_err(|e| AppError::new(4, format!("Failed to parse Yahoo response for {symbol}: {e}")))?;

        parse_chart(symbol, body)
    }
}

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: Chart,
}

#[derive(Debug, Deserialize)]
struct Chart {
    #[serde(default)]
    result: Option<Vec<ChartResult>>,
    #[serde(default)]
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    #[serde(default)]
    timestamp: Vec<i64>,
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

fn parse_chart(symbol: &str, body: ChartResponse) -> Result<Vec<RawObservation>, AppError> {
    if let Some(err) = body.chart.error {
        return Err(AppError::new(4, format!("Yahoo error for {symbol}: {}", err.description)));
    }

    let result = body
        .chart
        .result
        .and_then(|r| r.into_iter().next())
        .ok_or_else(|| AppError::new(4, format!("No Yahoo chart data for {symbol}.")))?;

    let closes = result
        .indicators
        .quote
        .into_iter()
        .next()
        .map(|q| q.close)
        .unwrap_or_default();

    result
        .timestamp
        .iter()
        .enumerate()
        .map(|(i, ts)| {
            let date = DateTime::from_timestamp(*ts, 0)
                .map(|dt| dt.date_naive())
                .ok_or_else(|| AppError::new(4, format!("Invalid Yahoo timestamp {ts} for {symbol}.")))?;
            let value = closes.get(i).copied().flatten().filter(|v| v.is_finite());
            Ok(RawObservation::new(date, value))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_closes_with_null_gaps() {
        let body: ChartResponse = serde_json::from_str(
            r#"{"chart": {"result": [{
                "meta": {"symbol": "ZC=F"},
                "timestamp": [1577836800, 1577923200],
                "indicators": {"quote": [{"close": [387.5, null]}]}
            }], "error": null}}"#,
        )
        .unwrap();

        let obs = parse_chart("ZC=F", body).unwrap();
        assert_eq!(obs.len(), 2);
        assert_eq!(obs[0], RawObservation::new(NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(), Some(387.5)));
        assert_eq!(obs[1].date, NaiveDate::from_ymd_opt(2020, 1, 2).unwrap());
        assert_eq!(obs[1].value, None);
    }

    #[test]
    fn api_error_is_surfaced() {
        let body: ChartResponse = serde_json::from_str(
            r#"{"chart": {"result": null, "error": {"code": "Not Found", "description": "No data found"}}}"#,
        )
        .unwrap();
        let err = parse_chart("NOPE", body).unwrap_err();
        assert_eq!(err.exit_code(), 4);
        assert!(err.message().contains("No data found"));
    }
}
