pub mod market_data;
pub mod series_store;
