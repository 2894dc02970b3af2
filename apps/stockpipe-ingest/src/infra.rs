use std::time::Duration;
use stockpipe_application::config::{resolve_db_url_from_env, Config, Provider};
use stockpipe_domain::repositories::market_data::MarketDataSource;
use stockpipe_infrastructure::market_data::csv_file::CsvFileSource;
use stockpipe_infrastructure::market_data::retry::RetryingSource;
use stockpipe_infrastructure::market_data::yahoo::YahooChartSource;
use stockpipe_infrastructure::persistence::postgres_series::PostgresSeriesStore;

const DEFAULT_POOL_MAX_SIZE: u32 = 4;

pub fn build_source(config: &Config) -> Result<Box<dyn MarketDataSource>, String> {
    let retries = config.source.retries;
    let backoff = Duration::from_millis(config.source.backoff_ms);

    match config.source.provider {
        Provider::Yahoo => {
            let yahoo =
                YahooChartSource::new(config.source.base_url.as_deref(), config.source.timeout_ms)
                    .map_err(|err| format!("failed to init yahoo source: {err}"))?;
            Ok(Box::new(RetryingSource::new(yahoo, retries, backoff)))
        }
        Provider::Csv => {
            let dir = config
                .source
                .csv_dir
                .as_deref()
                .ok_or_else(|| "source.csv_dir is required for the csv provider".to_string())?;
            Ok(Box::new(RetryingSource::new(
                CsvFileSource::new(dir),
                retries,
                backoff,
            )))
        }
    }
}

pub fn build_postgres_store(
    config: &Config,
    db_url_flag: Option<&str>,
) -> Result<PostgresSeriesStore, String> {
    let db_url = resolve_db_url_from_env(config, db_url_flag)?;
    PostgresSeriesStore::new(
        &db_url,
        &config.db.table,
        config.db.pool_max_size.unwrap_or(DEFAULT_POOL_MAX_SIZE),
    )
}

#[cfg(test)]
mod tests {
    use super::build_source;
    use stockpipe_application::config::{Config, Provider};

    #[test]
    fn csv_provider_requires_dir() {
        let mut config = Config::default();
        config.source.provider = Provider::Csv;
        let err = build_source(&config).err().expect("missing csv_dir");
        assert!(err.contains("csv_dir"));

        config.source.csv_dir = Some("data/daily".to_string());
        assert_eq!(build_source(&config).unwrap().name(), "csv");
    }

    #[test]
    fn yahoo_provider_is_the_default() {
        let source = build_source(&Config::default()).unwrap();
        assert_eq!(source.name(), "yahoo");
    }
}
