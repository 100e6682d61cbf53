use chrono::{DateTime, Utc};
use ethers::types::U256;

use crate::core::{RawTransaction, ScoringRequest};

const WEI_PER_ETHER: f64 = 1e18;
const WEI_PER_GWEI: f64 = 1e9;

/// Token pair label the oracle expects for native transfers.
pub const NATIVE_PAIR: &str = "ETH/ETH";

/// Build the scoring request for a pending transaction.
///
/// Returns `None` for transactions that move no value (pure contract calls,
/// zero-value transfers); those are never sent to the oracle.
pub fn normalize(tx: &RawTransaction, seen_at: DateTime<Utc>) -> Option<ScoringRequest> {
    if tx.value.is_zero() {
        return None;
    }
    let ether = wei_to_ether(tx.value);
    Some(ScoringRequest {
        tx_hash: Some(tx.hash),
        wallet_address: tx.from,
        timestamp: seen_at.format("%Y-%m-%d %H:%M:%S").to_string(),
        token_pair: NATIVE_PAIR.to_string(),
        amount: ether,
        total_value_locked_usd: 0.0,
        liquidity_change: 0.0,
        price_usd: 0.0,
        price_change: 0.0,
        gas_price: u256_to_f64(tx.gas_price.unwrap_or_default()),
        gas_used: u256_to_f64(tx.gas_limit),
        value: ether,
        from_address: tx.from,
        to_address: tx.to,
        value_wei: tx.value,
    })
}

/// Lossy conversion that stays finite for any input.
pub fn u256_to_f64(v: U256) -> f64 {
    if v > U256::from(u128::MAX) {
        return f64::MAX;
    }
    v.as_u128() as f64
}

pub fn wei_to_ether(v: U256) -> f64 {
    u256_to_f64(v) / WEI_PER_ETHER
}

pub fn wei_to_gwei(v: U256) -> f64 {
    u256_to_f64(v) / WEI_PER_GWEI
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use ethers::types::{Address, H256};

    fn make_tx(value: U256) -> RawTransaction {
        RawTransaction {
            hash: H256::repeat_byte(0x11),
            from: Address::repeat_byte(0xaa),
            to: Some(Address::repeat_byte(0xbb)),
            value,
            gas_price: Some(U256::from(30_000_000_000u64)),
            gas_limit: U256::from(21_000u64),
        }
    }

    fn seen_at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 45).unwrap()
    }

    #[test]
    fn zero_value_excluded() {
        assert!(normalize(&make_tx(U256::zero()), seen_at()).is_none());
    }

    #[test]
    fn one_wei_is_a_candidate() {
        assert!(normalize(&make_tx(U256::one()), seen_at()).is_some());
    }

    #[test]
    fn value_transfer_normalized() {
        let wei = U256::from(2_500_000_000_000_000_000u128);
        let req = normalize(&make_tx(wei), seen_at()).unwrap();
        assert_eq!(req.amount, 2.5);
        assert_eq!(req.value, 2.5);
        assert_eq!(req.value_wei, wei);
        assert_eq!(req.timestamp, "2024-05-01 12:30:45");
        assert_eq!(req.token_pair, "ETH/ETH");
        assert_eq!(req.gas_price, 30_000_000_000.0);
        assert_eq!(req.gas_used, 21_000.0);
        assert_eq!(req.tx_hash, Some(H256::repeat_byte(0x11)));
        assert_eq!(req.from_address, Address::repeat_byte(0xaa));
        assert_eq!(req.wallet_address, Address::repeat_byte(0xaa));
    }

    #[test]
    fn context_fields_default_to_zero() {
        let req = normalize(&make_tx(U256::from(10u64)), seen_at()).unwrap();
        assert_eq!(req.total_value_locked_usd, 0.0);
        assert_eq!(req.liquidity_change, 0.0);
        assert_eq!(req.price_usd, 0.0);
        assert_eq!(req.price_change, 0.0);
    }

    #[test]
    fn missing_gas_price_is_zero() {
        let mut tx = make_tx(U256::from(1u64));
        tx.gas_price = None;
        let req = normalize(&tx, seen_at()).unwrap();
        assert_eq!(req.gas_price, 0.0);
    }

    #[test]
    fn huge_values_stay_finite() {
        let req = normalize(&make_tx(U256::MAX), seen_at()).unwrap();
        assert!(req.amount.is_finite() && req.amount > 0.0);
        assert!(req.value.is_finite());
    }

    #[test]
    fn payload_uses_oracle_field_names() {
        let req = normalize(&make_tx(U256::from(1_000_000_000_000_000_000u128)), seen_at()).unwrap();
        let json = serde_json::to_value(&req).unwrap();
        assert!(json.get("txHash").is_some());
        assert!(json.get("gasPrice").is_some());
        assert!(json.get("gasUsed").is_some());
        assert_eq!(json["amount"], 1.0);
        assert!(json.get("value_wei").is_none());
        assert_eq!(
            json["from_address"],
            "0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa"
        );
    }

    #[test]
    fn gwei_formatting() {
        assert_eq!(wei_to_gwei(U256::from(30_000_000_000u64)), 30.0);
    }
}
