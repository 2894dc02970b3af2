use chrono::NaiveDate;
use serde::Deserialize;
use std::fs::File;
use std::io::{ErrorKind, Read};
use std::path::PathBuf;
use stockpipe_domain::errors::SourceError;
use stockpipe_domain::repositories::market_data::{FetchPlan, MarketDataSource};
use stockpipe_domain::value_objects::bar::{RawBar, RawBarSeries};
use stockpipe_domain::value_objects::ticker::Ticker;

#[derive(Debug, Deserialize)]
struct DailyRecord {
    date: String,
    open: Option<f64>,
    high: Option<f64>,
    low: Option<f64>,
    close: Option<f64>,
    volume: Option<f64>,
}

/// Reads `<dir>/<TICKER>.csv` exports with a `date,open,high,low,close,volume` header.
/// Empty cells are treated as missing values.
#[derive(Debug, Clone)]
pub struct CsvFileSource {
    dir: PathBuf,
}

impl CsvFileSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, ticker: &Ticker) -> PathBuf {
        self.dir.join(format!("{}.csv", ticker))
    }
}

impl MarketDataSource for CsvFileSource {
    fn name(&self) -> &str {
        "csv"
    }

    fn fetch(&self, ticker: &Ticker, plan: &FetchPlan) -> Result<RawBarSeries, SourceError> {
        let path = self.path_for(ticker);
        let file = File::open(&path).map_err(|err| match err.kind() {
            ErrorKind::NotFound => SourceError::UnknownTicker(ticker.to_string()),
            _ => SourceError::Unreachable(format!("failed to open {}: {err}", path.display())),
        })?;
        let series = read_daily_csv(ticker, plan, file).map_err(|err| match err {
            SourceError::InvalidResponse(msg) => {
                SourceError::InvalidResponse(format!("{}: {msg}", path.display()))
            }
            other => other,
        })?;
        tracing::debug!(ticker = %ticker, path = %path.display(), bars = series.len(), "loaded daily csv");
        Ok(series)
    }
}

pub fn read_daily_csv<R: Read>(
    ticker: &Ticker,
    plan: &FetchPlan,
    reader: R,
) -> Result<RawBarSeries, SourceError> {
    let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);

    let mut bars = Vec::new();
    for (line, result) in reader.deserialize::<DailyRecord>().enumerate() {
        let record = result.map_err(|err| {
            SourceError::InvalidResponse(format!("failed to parse CSV row {}: {err}", line + 1))
        })?;
        let date = parse_date(&record.date)?;
        if !plan.includes(date) {
            continue;
        }
        bars.push(RawBar {
            date,
            open: record.open,
            high: record.high,
            low: record.low,
            close: record.close,
            volume: record
                .volume
                .filter(|v| v.is_finite() && *v >= 0.0)
                .map(|v| v.round() as u64),
        });
    }

    Ok(RawBarSeries::new(ticker.clone(), bars))
}

fn parse_date(value: &str) -> Result<NaiveDate, SourceError> {
    // Accept `2024-01-02`, `2024-01-02 00:00:00` and `2024-01-02T00:00:00Z`.
    let day = value.split([' ', 'T']).next().unwrap_or(value);
    NaiveDate::parse_from_str(day, "%Y-%m-%d")
        .map_err(|_| SourceError::InvalidResponse(format!("invalid date: {value}")))
}
