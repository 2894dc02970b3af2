mod batch;

pub use batch::{BatchSummary, IngestionBatch, TickerOutcome};

use chrono::NaiveDate;
use serde::Serialize;
use std::time::Instant;
use stockpipe_domain::errors::IngestError;
use stockpipe_domain::repositories::market_data::{FetchPlan, MarketDataSource};
use stockpipe_domain::repositories::series_store::PersistedSeriesStore;
use stockpipe_domain::services::features::{FeatureConfig, FeatureDeriver};
use stockpipe_domain::services::gap_fill::{GapFillReport, GapFiller};
use stockpipe_domain::value_objects::ticker::Ticker;
use tracing::info_span;

/// Outcome of one incremental pass for one ticker.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunResult {
    pub ticker: Ticker,
    /// First day requested from the source; `None` means full history.
    pub since: Option<NaiveDate>,
    pub fetched: usize,
    pub rows_written: u64,
    pub range_start: Option<NaiveDate>,
    pub range_end: Option<NaiveDate>,
    pub gap_fill: GapFillReport,
}

impl RunResult {
    fn up_to_date(ticker: Ticker, plan: &FetchPlan, fetched: usize) -> Self {
        Self {
            ticker,
            since: plan.start(),
            fetched,
            rows_written: 0,
            range_start: None,
            range_end: None,
            gap_fill: GapFillReport::default(),
        }
    }
}

/// Brings the stored series for a ticker up to date: read the last stored day, fetch
/// what came after it, gap-fill, derive features, insert.
///
/// Component errors are returned unchanged; retrying belongs to the source adapter.
pub struct IncrementalIngestion<'a> {
    source: &'a dyn MarketDataSource,
    store: &'a dyn PersistedSeriesStore,
    gap_filler: GapFiller,
    deriver: FeatureDeriver,
}

impl<'a> IncrementalIngestion<'a> {
    pub fn new(
        source: &'a dyn MarketDataSource,
        store: &'a dyn PersistedSeriesStore,
        features: FeatureConfig,
    ) -> Self {
        Self {
            source,
            store,
            gap_filler: GapFiller::new(),
            deriver: FeatureDeriver::new(features),
        }
    }

    pub fn run(&self, ticker: &str) -> Result<RunResult, IngestError> {
        let started = Instant::now();
        let outcome = Ticker::parse(ticker)
            .map_err(IngestError::InvalidTicker)
            .and_then(|ticker| self.run_ticker(ticker));

        let result = match &outcome {
            Ok(_) => "ok",
            Err(err) => err.kind(),
        };
        metrics::counter!("stockpipe.app.ingestion.runs_total", "result" => result).increment(1);
        metrics::histogram!("stockpipe.app.ingestion.run_ms")
            .record(started.elapsed().as_secs_f64() * 1000.0);
        if let Ok(run) = &outcome {
            metrics::counter!("stockpipe.app.ingestion.rows_written_total")
                .increment(run.rows_written);
        }
        outcome
    }

    fn run_ticker(&self, ticker: Ticker) -> Result<RunResult, IngestError> {
        let _span = info_span!(
            "app.ingestion.run",
            ticker = %ticker,
            source = self.source.name()
        )
        .entered();

        let last_persisted = self.store.last_persisted_date(&ticker)?;
        let plan = FetchPlan::after(last_persisted);
        tracing::debug!(last_persisted = ?last_persisted, since = ?plan.start(), "fetch plan");

        let raw = self.source.fetch(&ticker, &plan)?;
        let fetched = raw.len();
        if raw.is_empty() {
            tracing::info!(fetched, rows_written = 0u64, "already up to date");
            return Ok(RunResult::up_to_date(ticker, &plan, fetched));
        }

        let (series, gap_fill) = self.gap_filler.fill_with_report(raw);
        if gap_fill.dropped_rows > 0 {
            tracing::warn!(
                dropped_rows = gap_fill.dropped_rows,
                "rows dropped after gap fill (column never observed)"
            );
        }
        if series.is_empty() {
            let mut result = RunResult::up_to_date(ticker, &plan, fetched);
            result.gap_fill = gap_fill;
            return Ok(result);
        }

        let rows = self.deriver.derive(&series);
        let range_start = rows.first().map(|row| row.date());
        let range_end = rows.last().map(|row| row.date());
        let rows_written = self.store.upsert_batch(&ticker, &rows)?;

        tracing::info!(
            fetched,
            rows_written,
            duplicate_dates = gap_fill.duplicate_dates,
            forward_filled = gap_fill.forward_filled,
            backward_filled = gap_fill.backward_filled,
            dropped_rows = gap_fill.dropped_rows,
            start = ?range_start,
            end = ?range_end,
            "ingestion run complete"
        );

        Ok(RunResult {
            ticker,
            since: plan.start(),
            fetched,
            rows_written,
            range_start,
            range_end,
            gap_fill,
        })
    }
}
