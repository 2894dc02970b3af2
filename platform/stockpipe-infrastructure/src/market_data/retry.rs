use std::time::Duration;
use stockpipe_domain::errors::SourceError;
use stockpipe_domain::repositories::market_data::{FetchPlan, MarketDataSource};
use stockpipe_domain::value_objects::bar::RawBarSeries;
use stockpipe_domain::value_objects::ticker::Ticker;

/// Retries transient source failures with exponential backoff.
///
/// Attempt `n` (1-based) that fails transiently is followed by a sleep of
/// `base_delay * 2^(n-1)`. Non-transient errors are returned immediately.
pub struct RetryingSource<S> {
    inner: S,
    max_attempts: u32,
    base_delay: Duration,
}

impl<S: MarketDataSource> RetryingSource<S> {
    pub fn new(inner: S, retries: u32, base_delay: Duration) -> Self {
        Self {
            inner,
            max_attempts: retries.saturating_add(1),
            base_delay,
        }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    fn backoff(&self, attempt: u32) -> Duration {
        self.base_delay
            .saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1)))
    }
}

impl<S: MarketDataSource> MarketDataSource for RetryingSource<S> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn fetch(&self, ticker: &Ticker, plan: &FetchPlan) -> Result<RawBarSeries, SourceError> {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match self.inner.fetch(ticker, plan) {
                Ok(series) => return Ok(series),
                Err(err) if err.is_transient() && attempt < self.max_attempts => {
                    let delay = self.backoff(attempt);
                    metrics::counter!("stockpipe.infra.source.retries_total", "source" => self.inner.name().to_string())
                        .increment(1);
                    tracing::warn!(
                        ticker = %ticker,
                        attempt,
                        max_attempts = self.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "transient source failure, retrying"
                    );
                    std::thread::sleep(delay);
                }
                Err(err) => return Err(err),
            }
        }
    }
}
