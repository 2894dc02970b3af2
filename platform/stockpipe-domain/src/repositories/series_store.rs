use crate::errors::StoreError;
use crate::value_objects::feature_row::FeatureRow;
use crate::value_objects::ticker::Ticker;
use chrono::NaiveDate;

/// Durable table of feature rows keyed by `(date, ticker)`.
pub trait PersistedSeriesStore {
    fn last_persisted_date(&self, ticker: &Ticker) -> Result<Option<NaiveDate>, StoreError>;

    /// Inserts every row whose `(date, ticker)` key is new and leaves existing rows
    /// untouched. The batch is atomic: on error nothing from it is visible.
    /// Returns the number of rows actually inserted.
    fn upsert_batch(&self, ticker: &Ticker, rows: &[FeatureRow]) -> Result<u64, StoreError>;
}

impl<S: PersistedSeriesStore + ?Sized> PersistedSeriesStore for Box<S> {
    fn last_persisted_date(&self, ticker: &Ticker) -> Result<Option<NaiveDate>, StoreError> {
        (**self).last_persisted_date(ticker)
    }

    fn upsert_batch(&self, ticker: &Ticker, rows: &[FeatureRow]) -> Result<u64, StoreError> {
        (**self).upsert_batch(ticker, rows)
    }
}
