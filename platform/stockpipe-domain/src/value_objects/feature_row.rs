use crate::value_objects::bar::Bar;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A bar plus the derived columns persisted alongside it.
///
/// `None` means "not enough history yet", never zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureRow {
    pub bar: Bar,
    pub daily_return: Option<f64>,
    pub volatility: Option<f64>,
    pub moving_average: Option<f64>,
}

impl FeatureRow {
    pub fn date(&self) -> NaiveDate {
        self.bar.date
    }
}
