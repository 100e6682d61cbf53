use ethers::types::{Address, H160, H256, U256};
use ethers::utils::keccak256;

use crate::core::{ScoringRequest, ScoringVerdict};

/// Token address standing for the chain's native asset.
pub const NATIVE_TOKEN: Address = H160([0u8; 20]);

/// Arguments of the ledger's `logFraud` call.
#[derive(Debug, Clone, PartialEq)]
pub struct FraudFinding {
    pub tx_hash: H256,
    pub sender: Address,
    pub score: u64,
    pub fraud_type: u8,
    pub token_in: Address,
    pub token_out: Address,
    pub amount_in: U256,
    pub amount_out: U256,
}

impl FraudFinding {
    /// Build the finding for a plain value transfer.
    pub fn from_verdict(request: &ScoringRequest, verdict: &ScoringVerdict, scale: u32) -> Self {
        let tx_hash = request.tx_hash.unwrap_or_else(|| derive_tx_hash(request));
        Self {
            tx_hash,
            sender: request.from_address,
            score: scaled_score(verdict.fraud_score, scale),
            fraud_type: verdict.category(),
            token_in: NATIVE_TOKEN,
            token_out: NATIVE_TOKEN,
            amount_in: request.value_wei,
            amount_out: request.value_wei,
        }
    }
}

/// `floor(fraction * scale)`, clamped at zero.
pub fn scaled_score(fraction: f64, scale: u32) -> u64 {
    (fraction * f64::from(scale)).floor().max(0.0) as u64
}

/// Stable identifier for a request that carries no transaction hash:
/// keccak256 of its JSON payload.
pub fn derive_tx_hash(request: &ScoringRequest) -> H256 {
    let payload = serde_json::to_vec(request).unwrap_or_default();
    H256(keccak256(payload))
}

/// Strictly greater than; a score equal to the threshold is not reported.
pub fn exceeds_threshold(score: f64, threshold: f64) -> bool {
    score > threshold
}
