use chrono::{DateTime, NaiveTime, Utc};
use reqwest::blocking::Client;
use reqwest::StatusCode;
use serde::Deserialize;
use std::time::{Duration, Instant};
use stockpipe_domain::errors::SourceError;
use stockpipe_domain::repositories::market_data::{FetchPlan, MarketDataSource};
use stockpipe_domain::value_objects::bar::{RawBar, RawBarSeries};
use stockpipe_domain::value_objects::ticker::Ticker;

pub const YAHOO_CHART_BASE: &str = "https://query2.finance.yahoo.com";

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartBody,
}

#[derive(Debug, Deserialize)]
struct ChartBody {
    result: Option<Vec<ChartData>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartData {
    meta: Option<ChartMeta>,
    #[serde(default)]
    timestamp: Vec<i64>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
struct ChartMeta {
    #[serde(default)]
    gmtoffset: i64,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    #[serde(default)]
    quote: Vec<QuoteData>,
}

#[derive(Debug, Default, Deserialize)]
struct QuoteData {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<u64>>,
}

/// Daily bars from the Yahoo Finance v8 chart endpoint.
///
/// Blank quote cells are passed through as `None`; repairing them is the gap filler's job.
pub struct YahooChartSource {
    base_url: String,
    client: Client,
}

impl YahooChartSource {
    pub fn new(base_url: Option<&str>, timeout_ms: u64) -> Result<Self, String> {
        let client = Client::builder()
            .timeout(Duration::from_millis(timeout_ms))
            .pool_idle_timeout(Duration::from_secs(90))
            .user_agent(concat!("stockpipe/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|err| format!("failed to build http client: {err}"))?;
        Ok(Self {
            base_url: base_url
                .unwrap_or(YAHOO_CHART_BASE)
                .trim_end_matches('/')
                .to_string(),
            client,
        })
    }

    fn period_bounds(plan: &FetchPlan, now: DateTime<Utc>) -> (i64, i64) {
        let period1 = plan
            .start()
            .map(|start| start.and_time(NaiveTime::MIN).and_utc().timestamp())
            .unwrap_or(0);
        (period1, now.timestamp())
    }

    fn request(
        &self,
        ticker: &Ticker,
        period1: i64,
        period2: i64,
    ) -> Result<ChartResponse, SourceError> {
        let url = format!("{}/v8/finance/chart/{}", self.base_url, ticker);

        let response = self
            .client
            .get(&url)
            .query(&[
                ("period1", period1.to_string()),
                ("period2", period2.to_string()),
                ("interval", "1d".to_string()),
                ("events", "history".to_string()),
            ])
            .send()
            .map_err(|err| SourceError::Unreachable(format!("chart request failed: {err}")))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(SourceError::UnknownTicker(ticker.to_string()));
        }
        if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
            return Err(SourceError::Unreachable(format!(
                "chart request failed with status {}",
                status.as_u16()
            )));
        }
        if !status.is_success() {
            return Err(SourceError::InvalidResponse(format!(
                "chart request failed with status {}",
                status.as_u16()
            )));
        }

        response
            .json::<ChartResponse>()
            .map_err(|err| SourceError::InvalidResponse(format!("chart response parse failed: {err}")))
    }
}

impl MarketDataSource for YahooChartSource {
    fn name(&self) -> &str {
        "yahoo"
    }

    fn fetch(&self, ticker: &Ticker, plan: &FetchPlan) -> Result<RawBarSeries, SourceError> {
        let start = Instant::now();
        let span = tracing::info_span!(
            "infra.yahoo.fetch",
            ticker = %ticker,
            since = ?plan.start()
        );
        let _enter = span.enter();

        // Same-day reruns plan from tomorrow; the endpoint answers 400 when period1 > period2.
        let (period1, period2) = Self::period_bounds(plan, Utc::now());
        let result = if period1 > period2 {
            tracing::debug!(period1, period2, "plan starts after now, nothing to fetch");
            Ok(RawBarSeries::empty(ticker.clone()))
        } else {
            self.request(ticker, period1, period2)
                .and_then(|payload| parse_chart(ticker, plan, payload))
        };

        metrics::histogram!("stockpipe.infra.source.fetch_ms", "source" => "yahoo")
            .record(start.elapsed().as_secs_f64() * 1000.0);
        match &result {
            Ok(series) => {
                metrics::counter!("stockpipe.infra.source.fetch_total", "source" => "yahoo", "result" => "ok")
                    .increment(1);
                tracing::debug!(bars = series.len(), "fetched chart");
            }
            Err(err) => {
                metrics::counter!("stockpipe.infra.source.fetch_total", "source" => "yahoo", "result" => "err")
                    .increment(1);
                tracing::warn!(error = %err, "chart fetch failed");
            }
        }
        result
    }
}

fn parse_chart(
    ticker: &Ticker,
    plan: &FetchPlan,
    payload: ChartResponse,
) -> Result<RawBarSeries, SourceError> {
    if let Some(err) = payload.chart.error {
        if err.code.eq_ignore_ascii_case("not found") {
            return Err(SourceError::UnknownTicker(ticker.to_string()));
        }
        return Err(SourceError::InvalidResponse(format!(
            "{}: {}",
            err.code, err.description
        )));
    }

    let Some(data) = payload.chart.result.and_then(|r| r.into_iter().next()) else {
        return Err(SourceError::InvalidResponse("chart result is empty".to_string()));
    };

    let gmtoffset = data.meta.map(|meta| meta.gmtoffset).unwrap_or(0);
    let quote = data.indicators.quote.into_iter().next().unwrap_or_default();

    let mut bars = Vec::with_capacity(data.timestamp.len());
    for (idx, ts) in data.timestamp.iter().copied().enumerate() {
        // Timestamps mark the session open in UTC; shifting by the exchange offset
        // yields the exchange-local trading day.
        let date = DateTime::from_timestamp(ts + gmtoffset, 0)
            .map(|dt| dt.date_naive())
            .ok_or_else(|| SourceError::InvalidResponse(format!("invalid timestamp: {ts}")))?;
        if !plan.includes(date) {
            continue;
        }

        let bar = RawBar {
            date,
            open: quote.open.get(idx).copied().flatten(),
            high: quote.high.get(idx).copied().flatten(),
            low: quote.low.get(idx).copied().flatten(),
            close: quote.close.get(idx).copied().flatten(),
            volume: quote.volume.get(idx).copied().flatten(),
        };

        // All-blank rows are holidays the endpoint pads in, not gaps.
        if bar.open.is_none()
            && bar.high.is_none()
            && bar.low.is_none()
            && bar.close.is_none()
            && bar.volume.is_none()
        {
            continue;
        }
        bars.push(bar);
    }

    Ok(RawBarSeries::new(ticker.clone(), bars))
}
