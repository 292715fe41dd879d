use thiserror::Error;

#[derive(Error, Debug)]
pub enum GigfeedError {
    /// No location signal could be resolved. The only fatal, run-level
    /// failure: it aborts a query before any adapter dispatch.
    #[error("Location unresolvable: {0}")]
    Unresolvable(String),

    /// A geocoding or IP-lookup provider failed. Absorbed by the
    /// resolver's fallback chain; fatal only if every step fails.
    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}
