use crate::value_objects::bar::{valid_price, Bar, BarSeries, RawBarSeries};
use serde::Serialize;

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct GapFillReport {
    pub input_rows: usize,
    /// Provider rows discarded because a later row carried the same date.
    pub duplicate_dates: usize,
    /// Cells filled from the nearest preceding valid value.
    pub forward_filled: usize,
    /// Leading cells filled from the nearest following valid value.
    pub backward_filled: usize,
    pub dropped_rows: usize,
}

/// Repairs missing OHLCV cells, one column at a time.
///
/// Each column is forward-filled, then any leading gap is back-filled from the first
/// observed value. A row that still lacks a value afterwards (the column was never
/// observed in this series) is dropped rather than fabricated.
#[derive(Debug, Default, Clone, Copy)]
pub struct GapFiller;

impl GapFiller {
    pub fn new() -> Self {
        Self
    }

    pub fn fill(&self, series: RawBarSeries) -> BarSeries {
        self.fill_with_report(series).0
    }

    pub fn fill_with_report(&self, series: RawBarSeries) -> (BarSeries, GapFillReport) {
        let duplicate_dates = series.duplicates();
        let (ticker, raw) = series.into_parts();
        let mut report = GapFillReport {
            input_rows: raw.len(),
            duplicate_dates,
            ..GapFillReport::default()
        };

        let mut open: Vec<Option<f64>> = raw.iter().map(|b| valid_price(b.open)).collect();
        let mut high: Vec<Option<f64>> = raw.iter().map(|b| valid_price(b.high)).collect();
        let mut low: Vec<Option<f64>> = raw.iter().map(|b| valid_price(b.low)).collect();
        let mut close: Vec<Option<f64>> = raw.iter().map(|b| valid_price(b.close)).collect();
        let mut volume: Vec<Option<u64>> = raw.iter().map(|b| b.volume).collect();

        for counts in [
            fill_column(&mut open),
            fill_column(&mut high),
            fill_column(&mut low),
            fill_column(&mut close),
            fill_column(&mut volume),
        ] {
            report.forward_filled += counts.0;
            report.backward_filled += counts.1;
        }

        let mut bars = Vec::with_capacity(raw.len());
        for (idx, row) in raw.iter().enumerate() {
            match (open[idx], high[idx], low[idx], close[idx], volume[idx]) {
                (Some(open), Some(high), Some(low), Some(close), Some(volume)) => bars.push(Bar {
                    date: row.date,
                    open,
                    high,
                    low,
                    close,
                    volume,
                }),
                _ => report.dropped_rows += 1,
            }
        }

        (BarSeries::new(ticker, bars), report)
    }
}

/// Returns `(forward_filled, backward_filled)`.
fn fill_column<T: Copy>(values: &mut [Option<T>]) -> (usize, usize) {
    let mut forward = 0usize;
    let mut last_seen: Option<T> = None;
    for slot in values.iter_mut() {
        match *slot {
            Some(value) => last_seen = Some(value),
            None => {
                if let Some(value) = last_seen {
                    *slot = Some(value);
                    forward += 1;
                }
            }
        }
    }

    let mut backward = 0usize;
    let mut next_seen: Option<T> = None;
    for slot in values.iter_mut().rev() {
        match *slot {
            Some(value) => next_seen = Some(value),
            None => {
                if let Some(value) = next_seen {
                    *slot = Some(value);
                    backward += 1;
                }
            }
        }
    }

    (forward, backward)
}
