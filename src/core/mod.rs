pub mod finding;
pub mod pipeline;
pub mod seen;
pub mod traits;
pub mod tx;

use ethers::types::{Address, H256, U256};
use serde::{Deserialize, Serialize};

/// Identifier announced by the node when a transaction enters its pending pool.
pub type PendingTxRef = H256;

/// A lifecycle or data event from the pending-transaction feed.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedEvent {
    Connected,
    Pending(PendingTxRef),
    Error(String),
    Closed,
}

/// A pending transaction resolved from the node.
#[derive(Debug, Clone, PartialEq)]
pub struct RawTransaction {
    pub hash: H256,
    pub from: Address,
    pub to: Option<Address>,
    /// Transferred value in wei.
    pub value: U256,
    pub gas_price: Option<U256>,
    pub gas_limit: U256,
}

/// Payload posted to the scoring oracle.
///
/// The oracle schema is DEX-oriented, so pair, liquidity and price fields
/// are sent as neutral zeros for plain native transfers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoringRequest {
    #[serde(rename = "txHash", skip_serializing_if = "Option::is_none")]
    pub tx_hash: Option<H256>,
    pub wallet_address: Address,
    /// UTC, `YYYY-MM-DD HH:MM:SS`.
    pub timestamp: String,
    pub token_pair: String,
    /// Transferred value in ether.
    pub amount: f64,
    pub total_value_locked_usd: f64,
    pub liquidity_change: f64,
    pub price_usd: f64,
    pub price_change: f64,
    /// Gas price in wei.
    #[serde(rename = "gasPrice")]
    pub gas_price: f64,
    /// Gas limit of the pending transaction (the oracle names it `gasUsed`).
    #[serde(rename = "gasUsed")]
    pub gas_used: f64,
    pub value: f64,
    pub from_address: Address,
    pub to_address: Option<Address>,
    /// Exact transferred value, carried through to the on-chain finding.
    #[serde(skip)]
    pub value_wei: U256,
}

/// Oracle response body.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ScoringVerdict {
    pub fraud_score: f64,
    #[serde(default)]
    pub fraud_type: Option<u8>,
    #[serde(default, alias = "reason")]
    pub explanation: Option<String>,
}

impl ScoringVerdict {
    /// Fraud category code, `0` when the oracle gave none.
    pub fn category(&self) -> u8 {
        self.fraud_type.unwrap_or(0)
    }
}

/// Terminal state of one observed pending transaction.
#[derive(Debug, Clone, PartialEq)]
pub enum TxOutcome {
    /// Not found in the pool, or carrying no value.
    Excluded(Exclusion),
    /// Already seen within the de-duplication window.
    Duplicate,
    /// Dropped because the in-flight limit was reached.
    Throttled,
    ScoreFailed,
    BelowThreshold { score: f64 },
    Reported { score: f64, submission: H256 },
    ReportFailed { score: f64 },
    /// Shutdown interrupted processing.
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exclusion {
    NotFound,
    LookupFailed,
    ZeroValue,
}
