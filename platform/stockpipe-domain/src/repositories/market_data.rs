use crate::errors::SourceError;
use crate::value_objects::bar::RawBarSeries;
use crate::value_objects::ticker::Ticker;
use chrono::{Days, NaiveDate};

/// How much history to request from a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchPlan {
    FullHistory,
    /// Bars dated on or after the given day.
    Since(NaiveDate),
}

impl FetchPlan {
    /// Plan for a store whose newest row is `last_persisted`: everything after that day,
    /// or the whole history for a ticker that was never ingested.
    pub fn after(last_persisted: Option<NaiveDate>) -> Self {
        match last_persisted {
            Some(last) => {
                FetchPlan::Since(last.checked_add_days(Days::new(1)).unwrap_or(NaiveDate::MAX))
            }
            None => FetchPlan::FullHistory,
        }
    }

    pub fn start(&self) -> Option<NaiveDate> {
        match self {
            FetchPlan::FullHistory => None,
            FetchPlan::Since(start) => Some(*start),
        }
    }

    pub fn includes(&self, date: NaiveDate) -> bool {
        match self {
            FetchPlan::FullHistory => true,
            FetchPlan::Since(start) => date >= *start,
        }
    }
}

/// Daily bar provider. Implementations return bars ascending by date and an empty
/// series (not an error) when the requested range holds no trading days.
pub trait MarketDataSource {
    fn name(&self) -> &str;

    fn fetch(&self, ticker: &Ticker, plan: &FetchPlan) -> Result<RawBarSeries, SourceError>;

    fn fetch_all(&self, ticker: &Ticker) -> Result<RawBarSeries, SourceError> {
        self.fetch(ticker, &FetchPlan::FullHistory)
    }

    fn fetch_since(&self, ticker: &Ticker, start: NaiveDate) -> Result<RawBarSeries, SourceError> {
        self.fetch(ticker, &FetchPlan::Since(start))
    }
}

impl<S: MarketDataSource + ?Sized> MarketDataSource for Box<S> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn fetch(&self, ticker: &Ticker, plan: &FetchPlan) -> Result<RawBarSeries, SourceError> {
        (**self).fetch(ticker, plan)
    }
}

#[cfg(test)]
mod tests {
    use super::FetchPlan;
    use chrono::NaiveDate;

    #[test]
    fn plan_starts_the_day_after_last_persisted() {
        let last = NaiveDate::from_ymd_opt(2023, 12, 31).unwrap();
        let plan = FetchPlan::after(Some(last));
        assert_eq!(plan.start(), NaiveDate::from_ymd_opt(2024, 1, 1));
        assert!(!plan.includes(last));
        assert!(plan.includes(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()));
    }

    #[test]
    fn plan_without_history_fetches_everything() {
        let plan = FetchPlan::after(None);
        assert_eq!(plan, FetchPlan::FullHistory);
        assert_eq!(plan.start(), None);
        assert!(plan.includes(NaiveDate::from_ymd_opt(1980, 12, 12).unwrap()));
    }
}
