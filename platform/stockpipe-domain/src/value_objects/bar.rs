use crate::value_objects::ticker::Ticker;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One complete end-of-day bar. Prices are positive, dates are exchange-local calendar days.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
}

/// A bar as reported by a provider. `None` marks a value the provider left blank.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawBar {
    pub date: NaiveDate,
    pub open: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub close: Option<f64>,
    pub volume: Option<u64>,
}

impl From<Bar> for RawBar {
    fn from(bar: Bar) -> Self {
        Self {
            date: bar.date,
            open: Some(bar.open),
            high: Some(bar.high),
            low: Some(bar.low),
            close: Some(bar.close),
            volume: Some(bar.volume),
        }
    }
}

/// Prices that are NaN, infinite or non-positive count as missing.
pub fn valid_price(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite() && *v > 0.0)
}

/// Provider output for one ticker: sorted by date, one bar per date.
#[derive(Debug, Clone, PartialEq)]
pub struct RawBarSeries {
    ticker: Ticker,
    bars: Vec<RawBar>,
    duplicates: usize,
}

impl RawBarSeries {
    /// Sorts by date; when a date repeats the later occurrence wins.
    pub fn new(ticker: Ticker, bars: Vec<RawBar>) -> Self {
        let (bars, duplicates) = canonicalize_by_date(bars, |bar| bar.date);
        Self {
            ticker,
            bars,
            duplicates,
        }
    }

    pub fn empty(ticker: Ticker) -> Self {
        Self {
            ticker,
            bars: Vec::new(),
            duplicates: 0,
        }
    }

    pub fn ticker(&self) -> &Ticker {
        &self.ticker
    }

    pub fn bars(&self) -> &[RawBar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn duplicates(&self) -> usize {
        self.duplicates
    }

    pub fn into_parts(self) -> (Ticker, Vec<RawBar>) {
        (self.ticker, self.bars)
    }
}

/// Gap-free series for one ticker, ascending by date.
#[derive(Debug, Clone, PartialEq)]
pub struct BarSeries {
    ticker: Ticker,
    bars: Vec<Bar>,
}

impl BarSeries {
    pub fn new(ticker: Ticker, bars: Vec<Bar>) -> Self {
        let (bars, _) = canonicalize_by_date(bars, |bar| bar.date);
        Self { ticker, bars }
    }

    pub fn ticker(&self) -> &Ticker {
        &self.ticker
    }

    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }
}

fn canonicalize_by_date<T>(mut items: Vec<T>, date_of: impl Fn(&T) -> NaiveDate) -> (Vec<T>, usize) {
    // Stable sort keeps provider order among equal dates, so "last wins" is well defined.
    items.sort_by_key(|item| date_of(item));

    let mut duplicates = 0usize;
    let mut out: Vec<T> = Vec::with_capacity(items.len());
    for item in items {
        if let Some(last) = out.last_mut() {
            if date_of(last) == date_of(&item) {
                duplicates += 1;
                *last = item;
                continue;
            }
        }
        out.push(item);
    }
    (out, duplicates)
}

#[cfg(test)]
mod tests {
    use super::{valid_price, Bar, RawBar, RawBarSeries};
    use crate::value_objects::ticker::Ticker;
    use chrono::NaiveDate;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    fn raw(d: u32, close: f64) -> RawBar {
        RawBar::from(Bar {
            date: day(d),
            open: close,
            high: close,
            low: close,
            close,
            volume: 10,
        })
    }

    #[test]
    fn raw_series_sorts_and_keeps_last_duplicate() {
        let ticker = Ticker::parse("AAPL").unwrap();
        let series = RawBarSeries::new(ticker, vec![raw(3, 3.0), raw(1, 1.0), raw(3, 30.0)]);

        assert_eq!(series.len(), 2);
        assert_eq!(series.duplicates(), 1);
        assert_eq!(series.bars()[0].date, day(1));
        assert_eq!(series.bars()[1].date, day(3));
        assert_eq!(series.bars()[1].close, Some(30.0));
    }

    #[test]
    fn valid_price_rejects_nan_and_non_positive() {
        assert_eq!(valid_price(Some(f64::NAN)), None);
        assert_eq!(valid_price(Some(0.0)), None);
        assert_eq!(valid_price(Some(-1.0)), None);
        assert_eq!(valid_price(Some(2.5)), Some(2.5));
    }
}
