use chrono::NaiveDate;
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet};
use stockpipe_domain::errors::StoreError;
use stockpipe_domain::repositories::series_store::PersistedSeriesStore;
use stockpipe_domain::value_objects::feature_row::FeatureRow;
use stockpipe_domain::value_objects::ticker::Ticker;

#[derive(Debug, Default)]
struct State {
    rows: BTreeMap<(Ticker, NaiveDate), FeatureRow>,
    fail_next_upsert: Option<StoreError>,
    upsert_calls: usize,
}

/// Process-local store with the same insert-or-ignore contract as the Postgres table.
/// Used by `--dry-run` and by tests.
#[derive(Debug, Default)]
pub struct InMemorySeriesStore {
    state: Mutex<State>,
}

impl InMemorySeriesStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `upsert_batch` fail with `err` without applying anything.
    pub fn fail_next_upsert(&self, err: StoreError) {
        self.state.lock().fail_next_upsert = Some(err);
    }

    pub fn len(&self) -> usize {
        self.state.lock().rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn upsert_calls(&self) -> usize {
        self.state.lock().upsert_calls
    }

    pub fn rows_for(&self, ticker: &Ticker) -> Vec<FeatureRow> {
        let state = self.state.lock();
        state
            .rows
            .range(ticker_range(ticker))
            .map(|(_, row)| row.clone())
            .collect()
    }
}

fn ticker_range(ticker: &Ticker) -> std::ops::RangeInclusive<(Ticker, NaiveDate)> {
    (ticker.clone(), NaiveDate::MIN)..=(ticker.clone(), NaiveDate::MAX)
}

impl PersistedSeriesStore for InMemorySeriesStore {
    fn last_persisted_date(&self, ticker: &Ticker) -> Result<Option<NaiveDate>, StoreError> {
        let state = self.state.lock();
        Ok(state
            .rows
            .range(ticker_range(ticker))
            .next_back()
            .map(|((_, date), _)| *date))
    }

    fn upsert_batch(&self, ticker: &Ticker, rows: &[FeatureRow]) -> Result<u64, StoreError> {
        let mut state = self.state.lock();
        state.upsert_calls += 1;
        if let Some(err) = state.fail_next_upsert.take() {
            return Err(err);
        }

        // Stage first so a rejected batch leaves the map untouched.
        let mut staged_keys = BTreeSet::new();
        let mut staged = Vec::new();
        for row in rows {
            let key = (ticker.clone(), row.date());
            if state.rows.contains_key(&key) || !staged_keys.insert(key.clone()) {
                continue;
            }
            staged.push((key, row.clone()));
        }

        let inserted = staged.len() as u64;
        state.rows.extend(staged);
        Ok(inserted)
    }
}

#[cfg(test)]
mod tests {
    use super::InMemorySeriesStore;
    use chrono::NaiveDate;
    use stockpipe_domain::errors::StoreError;
    use stockpipe_domain::repositories::series_store::PersistedSeriesStore;
    use stockpipe_domain::value_objects::bar::Bar;
    use stockpipe_domain::value_objects::feature_row::FeatureRow;
    use stockpipe_domain::value_objects::ticker::Ticker;

    fn row(d: u32, close: f64) -> FeatureRow {
        FeatureRow {
            bar: Bar {
                date: NaiveDate::from_ymd_opt(2024, 5, d).unwrap(),
                open: close,
                high: close,
                low: close,
                close,
                volume: 10,
            },
            daily_return: None,
            volatility: None,
            moving_average: None,
        }
    }

    fn ticker(raw: &str) -> Ticker {
        Ticker::parse(raw).unwrap()
    }

    #[test]
    fn overlapping_batches_store_each_key_once() {
        let store = InMemorySeriesStore::new();
        let aapl = ticker("AAPL");

        assert_eq!(store.upsert_batch(&aapl, &[row(1, 1.0), row(2, 2.0)]).unwrap(), 2);
        assert_eq!(store.upsert_batch(&aapl, &[row(2, 99.0), row(3, 3.0)]).unwrap(), 1);
        assert_eq!(store.upsert_batch(&aapl, &[row(1, 1.0), row(2, 2.0)]).unwrap(), 0);

        let rows = store.rows_for(&aapl);
        assert_eq!(rows.len(), 3);
        // Existing rows are never overwritten.
        assert_eq!(rows[1].bar.close, 2.0);
    }

    #[test]
    fn duplicate_dates_within_one_batch_keep_the_first() {
        let store = InMemorySeriesStore::new();
        let aapl = ticker("AAPL");
        assert_eq!(store.upsert_batch(&aapl, &[row(1, 1.0), row(1, 5.0)]).unwrap(), 1);
        assert_eq!(store.rows_for(&aapl)[0].bar.close, 1.0);
    }

    #[test]
    fn last_date_is_scoped_per_ticker() {
        let store = InMemorySeriesStore::new();
        store.upsert_batch(&ticker("AAPL"), &[row(1, 1.0), row(9, 1.0)]).unwrap();
        store.upsert_batch(&ticker("MSFT"), &[row(20, 1.0)]).unwrap();

        assert_eq!(
            store.last_persisted_date(&ticker("AAPL")).unwrap(),
            NaiveDate::from_ymd_opt(2024, 5, 9)
        );
        assert_eq!(store.last_persisted_date(&ticker("GOOG")).unwrap(), None);
    }

    #[test]
    fn failed_batch_commits_nothing() {
        let store = InMemorySeriesStore::new();
        let aapl = ticker("AAPL");
        store.fail_next_upsert(StoreError::Transaction("connection reset".to_string()));

        assert!(store.upsert_batch(&aapl, &[row(1, 1.0)]).is_err());
        assert!(store.is_empty());
        assert_eq!(store.upsert_batch(&aapl, &[row(1, 1.0)]).unwrap(), 1);
    }
}
