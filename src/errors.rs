use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ChainError {
    #[error("RPC error: {0}")]
    Provider(#[from] ethers::providers::ProviderError),

    #[error("invalid {what}: {reason}")]
    Invalid { what: &'static str, reason: String },

    #[error("contract call failed: {0}")]
    Contract(String),

    #[error("no live feed connection")]
    Disconnected,
}

#[derive(Error, Debug)]
pub enum OracleError {
    #[error("oracle request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("oracle returned HTTP {0}")]
    Status(u16),

    #[error("oracle response of {size} bytes exceeds limit of {limit}")]
    TooLarge { size: usize, limit: usize },

    #[error("malformed oracle response: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Why a finding did not make it on-chain.
#[derive(Error, Debug)]
pub enum ReportError {
    /// The ledger refused the call (revert or failed receipt).
    #[error("ledger rejected finding: {0}")]
    Rejected(String),

    #[error("submission transport error: {0}")]
    Transport(String),

    #[error("no inclusion within {0:?}")]
    Timeout(Duration),
}

/// Anything that stops the process before the pipeline starts.
#[derive(Error, Debug)]
pub enum StartupError {
    #[error("configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    #[error("chain setup failed: {0}")]
    Chain(#[from] ChainError),

    #[error("oracle client setup failed: {0}")]
    Oracle(#[from] OracleError),

    #[error("failed to start runtime: {0}")]
    Runtime(#[from] std::io::Error),
}
