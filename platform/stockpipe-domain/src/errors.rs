use thiserror::Error;

/// Failures raised by a `MarketDataSource`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SourceError {
    /// Network failure, timeout, rate limiting or a 5xx from the provider.
    #[error("provider unreachable: {0}")]
    Unreachable(String),

    /// The provider does not know the requested symbol.
    #[error("unknown ticker: {0}")]
    UnknownTicker(String),

    /// The provider answered with something that could not be parsed.
    #[error("invalid provider response: {0}")]
    InvalidResponse(String),
}

impl SourceError {
    /// Only connectivity problems are worth retrying.
    pub fn is_transient(&self) -> bool {
        matches!(self, SourceError::Unreachable(_))
    }
}

/// Failures raised by a `PersistedSeriesStore`. Any of these means nothing was committed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("store connection failed: {0}")]
    Connection(String),

    #[error("store query failed: {0}")]
    Query(String),

    #[error("store transaction failed: {0}")]
    Transaction(String),

    #[error("row cannot be stored: {0}")]
    InvalidRow(String),
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum IngestError {
    #[error("source unavailable: {0}")]
    SourceUnavailable(#[from] SourceError),

    #[error("persist failed: {0}")]
    PersistFailed(#[from] StoreError),

    #[error("invalid ticker: {0}")]
    InvalidTicker(String),
}

impl IngestError {
    pub fn kind(&self) -> &'static str {
        match self {
            IngestError::SourceUnavailable(_) => "source_unavailable",
            IngestError::PersistFailed(_) => "persist_failed",
            IngestError::InvalidTicker(_) => "invalid_ticker",
        }
    }
}
