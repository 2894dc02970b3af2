pub mod config;
pub mod ingestion;
