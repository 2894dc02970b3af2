use crate::value_objects::bar::BarSeries;
use crate::value_objects::feature_row::FeatureRow;
use serde::{Deserialize, Serialize};

mod rolling;

pub use rolling::{RollingSma, RollingStd};

pub const DEFAULT_WINDOW: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct FeatureConfig {
    #[serde(default = "default_window")]
    pub moving_average_window: usize,
    #[serde(default = "default_window")]
    pub volatility_window: usize,
}

fn default_window() -> usize {
    DEFAULT_WINDOW
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            moving_average_window: DEFAULT_WINDOW,
            volatility_window: DEFAULT_WINDOW,
        }
    }
}

impl FeatureConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.moving_average_window < 2 {
            return Err("features.moving_average_window must be >= 2".to_string());
        }
        if self.volatility_window < 2 {
            return Err("features.volatility_window must be >= 2".to_string());
        }
        Ok(())
    }
}

/// Adds return, volatility and moving-average columns to a gap-free series.
///
/// All windows are strictly trailing and include the current bar:
/// - `daily_return[i] = close[i] / close[i-1] - 1`, undefined at `i = 0`;
/// - `moving_average[i]` is the mean of the last `moving_average_window` closes,
///   defined from `i = moving_average_window - 1`;
/// - `volatility[i]` is the sample standard deviation of the last `volatility_window`
///   returns. The undefined return at `i = 0` never enters a window, so the first
///   defined value is at `i = volatility_window`.
#[derive(Debug, Clone, Default)]
pub struct FeatureDeriver {
    config: FeatureConfig,
}

impl FeatureDeriver {
    pub fn new(config: FeatureConfig) -> Self {
        Self { config }
    }

    pub fn derive(&self, series: &BarSeries) -> Vec<FeatureRow> {
        let mut sma = RollingSma::new(self.config.moving_average_window);
        let mut vol = RollingStd::new(self.config.volatility_window);
        let mut prev_close: Option<f64> = None;
        let mut rows = Vec::with_capacity(series.len());

        for bar in series.bars() {
            let daily_return = prev_close.map(|prev| bar.close / prev - 1.0);
            prev_close = Some(bar.close);

            let volatility = daily_return.and_then(|ret| vol.update(ret));
            let moving_average = sma.update(bar.close);

            rows.push(FeatureRow {
                bar: bar.clone(),
                daily_return,
                volatility,
                moving_average,
            });
        }

        rows
    }
}
