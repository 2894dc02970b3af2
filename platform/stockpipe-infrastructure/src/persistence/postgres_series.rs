use chrono::NaiveDate;
use postgres::NoTls;
use r2d2::{Pool, PooledConnection};
use r2d2_postgres::PostgresConnectionManager;
use std::time::Instant;
use stockpipe_domain::errors::StoreError;
use stockpipe_domain::repositories::series_store::PersistedSeriesStore;
use stockpipe_domain::value_objects::feature_row::FeatureRow;
use stockpipe_domain::value_objects::ticker::Ticker;

type PgPool = Pool<PostgresConnectionManager<NoTls>>;

/// Feature rows in a `processed_data`-shaped table keyed by `(date, ticker_symbol)`.
#[derive(Debug, Clone)]
pub struct PostgresSeriesStore {
    pool: PgPool,
    table: String,
}

impl PostgresSeriesStore {
    pub fn new(db_url: &str, table: &str, pool_max_size: u32) -> Result<Self, String> {
        validate_table_name(table).map_err(|err| format!("invalid table '{table}': {err}"))?;

        let config = db_url
            .parse::<postgres::Config>()
            .map_err(|err| format!("invalid postgres db url: {err}"))?;
        let manager = PostgresConnectionManager::new(config, NoTls);
        let pool = Pool::builder()
            .max_size(pool_max_size.max(1))
            .build(manager)
            .map_err(|err| format!("failed to build postgres pool: {err}"))?;

        Ok(Self {
            pool,
            table: table.to_string(),
        })
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Creates the table and its key if they do not exist yet.
    pub fn migrate(&self) -> Result<(), StoreError> {
        let mut client = self.checkout("migrate")?;
        client
            .batch_execute(&schema_sql(&self.table))
            .map_err(|err| StoreError::Query(format!("failed to apply schema: {err}")))?;
        tracing::info!(table = %self.table, "schema ready");
        Ok(())
    }

    fn checkout(
        &self,
        op: &'static str,
    ) -> Result<PooledConnection<PostgresConnectionManager<NoTls>>, StoreError> {
        let get_start = Instant::now();
        let client = self.pool.get().map_err(|err| {
            metrics::counter!("stockpipe.infra.postgres.errors_total", "op" => op, "stage" => "pool_get")
                .increment(1);
            tracing::error!(error = %err, op, "failed to checkout postgres connection");
            StoreError::Connection(format!("failed to checkout postgres connection: {err}"))
        })?;
        metrics::histogram!("stockpipe.infra.postgres.pool.get_ms")
            .record(get_start.elapsed().as_secs_f64() * 1000.0);
        Ok(client)
    }
}

impl PersistedSeriesStore for PostgresSeriesStore {
    fn last_persisted_date(&self, ticker: &Ticker) -> Result<Option<NaiveDate>, StoreError> {
        let span = tracing::info_span!("infra.postgres.last_persisted_date", table = %self.table, ticker = %ticker);
        let _enter = span.enter();

        let mut client = self.checkout("last_persisted_date")?;
        let row = client
            .query_one(&last_date_sql(&self.table), &[&ticker.as_str()])
            .map_err(|err| {
                metrics::counter!("stockpipe.infra.postgres.errors_total", "op" => "last_persisted_date", "stage" => "query")
                    .increment(1);
                StoreError::Query(format!("failed to query last date: {err}"))
            })?;
        let last: Option<NaiveDate> = row
            .try_get(0)
            .map_err(|err| StoreError::Query(format!("unexpected MAX(date) value: {err}")))?;
        tracing::debug!(last = ?last, "resolved last persisted date");
        Ok(last)
    }

    fn upsert_batch(&self, ticker: &Ticker, rows: &[FeatureRow]) -> Result<u64, StoreError> {
        let overall_start = Instant::now();
        let span = tracing::info_span!(
            "infra.postgres.upsert_batch",
            table = %self.table,
            ticker = %ticker,
            rows = rows.len()
        );
        let _enter = span.enter();

        if rows.is_empty() {
            return Ok(0);
        }

        let mut client = self.checkout("upsert_batch")?;
        // Dropping the transaction without commit rolls it back, so every early return
        // below leaves the table as it was.
        let mut transaction = client
            .transaction()
            .map_err(|err| StoreError::Transaction(format!("failed to start transaction: {err}")))?;
        let statement = transaction
            .prepare(&insert_sql(&self.table))
            .map_err(|err| StoreError::Query(format!("failed to prepare insert: {err}")))?;

        let mut inserted = 0u64;
        for row in rows {
            let volume = volume_param(row)?;
            inserted += transaction
                .execute(
                    &statement,
                    &[
                        &row.date(),
                        &ticker.as_str(),
                        &row.bar.open,
                        &row.bar.high,
                        &row.bar.low,
                        &row.bar.close,
                        &volume,
                        &row.moving_average,
                        &row.volatility,
                        &row.daily_return,
                    ],
                )
                .map_err(|err| {
                    metrics::counter!("stockpipe.infra.postgres.errors_total", "op" => "upsert_batch", "stage" => "execute")
                        .increment(1);
                    StoreError::Query(format!("insert failed on {}: {err}", row.date()))
                })?;
        }

        transaction
            .commit()
            .map_err(|err| StoreError::Transaction(format!("failed to commit: {err}")))?;

        metrics::histogram!("stockpipe.infra.postgres.upsert_batch_ms")
            .record(overall_start.elapsed().as_secs_f64() * 1000.0);
        metrics::counter!("stockpipe.infra.postgres.rows_inserted_total").increment(inserted);
        tracing::debug!(inserted, skipped = rows.len() as u64 - inserted, "batch committed");
        Ok(inserted)
    }
}

/// `volume` is BIGINT; counts above `i64::MAX` are refused rather than wrapped.
fn volume_param(row: &FeatureRow) -> Result<i64, StoreError> {
    i64::try_from(row.bar.volume)
        .map_err(|_| StoreError::InvalidRow(format!("volume out of range on {}", row.date())))
}

fn schema_sql(table: &str) -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS {table} (
            date DATE NOT NULL,
            ticker_symbol TEXT NOT NULL,
            open_price DOUBLE PRECISION NOT NULL,
            high_price DOUBLE PRECISION NOT NULL,
            low_price DOUBLE PRECISION NOT NULL,
            close_price DOUBLE PRECISION NOT NULL,
            volume BIGINT NOT NULL,
            moving_average DOUBLE PRECISION,
            volatility DOUBLE PRECISION,
            daily_returns DOUBLE PRECISION,
            PRIMARY KEY (date, ticker_symbol)
        )"
    )
}

fn last_date_sql(table: &str) -> String {
    format!("SELECT MAX(date) FROM {table} WHERE ticker_symbol = $1")
}

fn insert_sql(table: &str) -> String {
    format!(
        "INSERT INTO {table} (
            date, ticker_symbol, open_price, high_price, low_price, close_price,
            volume, moving_average, volatility, daily_returns
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        ON CONFLICT (date, ticker_symbol) DO NOTHING"
    )
}

/// Accepts `table` or `schema.table` made of `[A-Za-z_][A-Za-z0-9_]*` parts.
/// Table names are interpolated into SQL, so anything else is refused.
pub fn validate_table_name(table: &str) -> Result<(), String> {
    if table.is_empty() {
        return Err("table name is empty".to_string());
    }
    let parts: Vec<&str> = table.split('.').collect();
    if parts.len() > 2 {
        return Err(format!("too many qualifiers in table name: {table}"));
    }
    let is_ident = |part: &str| {
        let mut chars = part.chars();
        matches!(chars.next(), Some(ch) if ch.is_ascii_alphabetic() || ch == '_')
            && chars.all(|ch| ch.is_ascii_alphanumeric() || ch == '_')
    };
    if !parts.iter().all(|part| is_ident(part)) {
        return Err(format!("invalid table name: {table}"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{
        insert_sql, last_date_sql, schema_sql, validate_table_name, volume_param,
        PostgresSeriesStore,
    };
    use chrono::NaiveDate;
    use stockpipe_domain::errors::StoreError;
    use stockpipe_domain::value_objects::bar::Bar;
    use stockpipe_domain::value_objects::feature_row::FeatureRow;

    fn row_with_volume(volume: u64) -> FeatureRow {
        FeatureRow {
            bar: Bar {
                date: NaiveDate::from_ymd_opt(2024, 3, 4).unwrap(),
                open: 10.0,
                high: 11.0,
                low: 9.0,
                close: 10.5,
                volume,
            },
            daily_return: None,
            volatility: None,
            moving_average: None,
        }
    }

    #[test]
    fn volume_converts_to_bigint() {
        assert_eq!(volume_param(&row_with_volume(1_000)), Ok(1_000));
        assert_eq!(volume_param(&row_with_volume(i64::MAX as u64)), Ok(i64::MAX));
    }

    #[test]
    fn volume_above_bigint_range_is_invalid_row() {
        let err = volume_param(&row_with_volume(u64::MAX)).expect_err("overflow");
        assert_eq!(
            err,
            StoreError::InvalidRow("volume out of range on 2024-03-04".to_string())
        );
    }

    #[test]
    fn validate_table_name_accepts_schema_qualified() {
        assert!(validate_table_name("processed_data").is_ok());
        assert!(validate_table_name("analytics.processed_data").is_ok());
        assert!(validate_table_name("").is_err());
        assert!(validate_table_name("a.b.c").is_err());
        assert!(validate_table_name("processed_data;drop").is_err());
        assert!(validate_table_name("1table").is_err());
        assert!(validate_table_name("public.").is_err());
    }

    #[test]
    fn new_rejects_invalid_table_before_connect() {
        let err = PostgresSeriesStore::new("postgres://invalid", "x;drop", 1)
            .expect_err("invalid table name");
        assert!(err.contains("invalid table"));
    }

    #[test]
    fn new_rejects_invalid_db_url() {
        let err = PostgresSeriesStore::new("not a url", "processed_data", 1)
            .expect_err("invalid db url should fail fast");
        assert!(err.contains("invalid postgres db url"));
    }

    #[test]
    fn statements_use_ticker_symbol_key_and_ignore_conflicts() {
        let insert = insert_sql("processed_data");
        assert!(insert.contains("ON CONFLICT (date, ticker_symbol) DO NOTHING"));
        assert!(!insert.contains("DO UPDATE"));
        assert_eq!(
            last_date_sql("processed_data"),
            "SELECT MAX(date) FROM processed_data WHERE ticker_symbol = $1"
        );
        assert!(schema_sql("processed_data").contains("PRIMARY KEY (date, ticker_symbol)"));
    }
}
