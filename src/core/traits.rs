use async_trait::async_trait;
use ethers::types::{Address, H256};

use crate::core::finding::FraudFinding;
use crate::core::{PendingTxRef, RawTransaction, ScoringRequest, ScoringVerdict};
use crate::errors::{ChainError, OracleError, ReportError};

/// Resolves a pending reference into the full transaction body.
#[async_trait]
pub trait TxLookup: Send + Sync {
    /// `Ok(None)` when the node no longer knows the transaction.
    async fn resolve(&self, tx_ref: PendingTxRef) -> Result<Option<RawTransaction>, ChainError>;
}

/// Fraud scoring oracle.
#[async_trait]
pub trait Scorer: Send + Sync {
    async fn score(&self, request: &ScoringRequest) -> Result<ScoringVerdict, OracleError>;
}

/// Submits findings on-chain and waits for inclusion.
#[async_trait]
pub trait FindingReporter: Send + Sync {
    async fn report(&self, finding: &FraudFinding) -> Result<H256, ReportError>;
}

/// Read access to the ledger's reporter allow-list.
#[async_trait]
pub trait ReporterRegistry: Send + Sync {
    async fn is_reporter(&self, identity: Address) -> Result<bool, ChainError>;
}
