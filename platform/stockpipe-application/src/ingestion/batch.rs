use super::{IncrementalIngestion, RunResult};
use serde_json::{json, Value};
use stockpipe_domain::errors::IngestError;

#[derive(Debug, Clone, PartialEq)]
pub struct TickerOutcome {
    /// Ticker as requested, before normalization.
    pub ticker: String,
    pub result: Result<RunResult, IngestError>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchSummary {
    pub outcomes: Vec<TickerOutcome>,
}

impl BatchSummary {
    pub fn failed(&self) -> usize {
        self.outcomes.iter().filter(|o| o.result.is_err()).count()
    }

    pub fn succeeded(&self) -> usize {
        self.outcomes.len() - self.failed()
    }

    pub fn rows_written(&self) -> u64 {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().ok())
            .map(|run| run.rows_written)
            .sum()
    }

    pub fn to_json(&self) -> Value {
        let tickers: Vec<Value> = self
            .outcomes
            .iter()
            .map(|outcome| match &outcome.result {
                Ok(run) => json!({
                    "ticker": run.ticker,
                    "status": "ok",
                    "since": run.since,
                    "fetched": run.fetched,
                    "rows_written": run.rows_written,
                    "range_start": run.range_start,
                    "range_end": run.range_end,
                    "gap_fill": run.gap_fill,
                }),
                Err(err) => json!({
                    "ticker": outcome.ticker,
                    "status": err.kind(),
                    "error": err.to_string(),
                }),
            })
            .collect();

        json!({
            "succeeded": self.succeeded(),
            "failed": self.failed(),
            "rows_written": self.rows_written(),
            "tickers": tickers,
        })
    }
}

/// Runs one incremental pass per ticker, in order. A failing ticker is recorded and
/// the batch moves on.
pub struct IngestionBatch<'a> {
    ingestion: IncrementalIngestion<'a>,
}

impl<'a> IngestionBatch<'a> {
    pub fn new(ingestion: IncrementalIngestion<'a>) -> Self {
        Self { ingestion }
    }

    pub fn run_all<T: AsRef<str>>(&self, tickers: &[T]) -> BatchSummary {
        let mut summary = BatchSummary::default();
        for ticker in tickers {
            let ticker = ticker.as_ref();
            let result = self.ingestion.run(ticker);
            if let Err(err) = &result {
                tracing::error!(ticker, error = %err, kind = err.kind(), "ticker ingestion failed");
            }
            summary.outcomes.push(TickerOutcome {
                ticker: ticker.to_string(),
                result,
            });
        }
        tracing::info!(
            succeeded = summary.succeeded(),
            failed = summary.failed(),
            rows_written = summary.rows_written(),
            "batch complete"
        );
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::{BatchSummary, TickerOutcome};
    use crate::ingestion::RunResult;
    use stockpipe_domain::errors::{IngestError, SourceError};
    use stockpipe_domain::services::gap_fill::GapFillReport;
    use stockpipe_domain::value_objects::ticker::Ticker;

    #[test]
    fn summary_counts_and_json_shape() {
        let summary = BatchSummary {
            outcomes: vec![
                TickerOutcome {
                    ticker: "aapl".to_string(),
                    result: Ok(RunResult {
                        ticker: Ticker::parse("aapl").unwrap(),
                        since: None,
                        fetched: 3,
                        rows_written: 3,
                        range_start: None,
                        range_end: None,
                        gap_fill: GapFillReport {
                            duplicate_dates: 1,
                            ..GapFillReport::default()
                        },
                    }),
                },
                TickerOutcome {
                    ticker: "ZZZZ".to_string(),
                    result: Err(IngestError::SourceUnavailable(SourceError::UnknownTicker(
                        "ZZZZ".to_string(),
                    ))),
                },
            ],
        };

        assert_eq!(summary.succeeded(), 1);
        assert_eq!(summary.failed(), 1);
        assert_eq!(summary.rows_written(), 3);

        let json = summary.to_json();
        assert_eq!(json["tickers"][0]["ticker"], "AAPL");
        assert_eq!(json["tickers"][0]["status"], "ok");
        assert_eq!(json["tickers"][0]["gap_fill"]["duplicate_dates"], 1);
        assert_eq!(json["tickers"][1]["status"], "source_unavailable");
        assert_eq!(json["rows_written"], 3);
    }
}
