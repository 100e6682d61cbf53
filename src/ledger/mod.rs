//! FraudLogger contract access: finding submission and reporter status.
pub mod gate;

use std::sync::Arc;

use async_trait::async_trait;
use ethers::contract::ContractError;
use ethers::middleware::SignerMiddleware;
use ethers::prelude::abigen;
use ethers::providers::{Http, Middleware, Provider};
use ethers::signers::{LocalWallet, Signer};
use ethers::types::{Address, H256, U64, U256};
use tokio::sync::OnceCell;
use tracing::{debug, info};

use crate::core::finding::FraudFinding;
use crate::core::traits::{FindingReporter, ReporterRegistry};
use crate::errors::{ChainError, ReportError};

abigen!(
    FraudLogger,
    r#"[
        function logFraud(bytes32 txHash, address sender, uint256 score, uint8 fraudType, address tokenIn, address tokenOut, uint256 amountIn, uint256 amountOut) external
        function setReporter(address r, bool v) external
        function reporters(address) external view returns (bool)
    ]"#,
);

type SignerClient = SignerMiddleware<Provider<Http>, LocalWallet>;

/// FraudLogger access for one reporter key.
///
/// Reads go through the bare provider. The signing client is bound to the
/// chain id on first submission, so an unreachable node at startup only
/// degrades the authorization check instead of stopping the process.
pub struct LedgerClient {
    provider: Provider<Http>,
    address: Address,
    wallet: LocalWallet,
    chain_id: Option<u64>,
    registry: FraudLogger<Provider<Http>>,
    submitter: OnceCell<(u64, FraudLogger<SignerClient>)>,
}

impl LedgerClient {
    /// `chain_id` pins the signing chain; `None` asks the node when the
    /// first finding is submitted.
    pub fn new(
        provider: Provider<Http>,
        contract_address: &str,
        private_key: &str,
        chain_id: Option<u64>,
    ) -> Result<Self, ChainError> {
        let address = parse_address(contract_address)?;
        let wallet: LocalWallet = private_key.trim().parse().map_err(|e: ethers::signers::WalletError| {
            ChainError::Invalid {
                what: "reporter private key",
                reason: e.to_string(),
            }
        })?;

        Ok(Self {
            registry: FraudLogger::new(address, Arc::new(provider.clone())),
            provider,
            address,
            wallet,
            chain_id,
            submitter: OnceCell::new(),
        })
    }

    /// Address findings are submitted from.
    pub fn reporter(&self) -> Address {
        self.wallet.address()
    }

    /// Signing chain, once known.
    pub fn chain_id(&self) -> Option<u64> {
        self.submitter.get().map(|(id, _)| *id).or(self.chain_id)
    }

    async fn submitter(&self) -> Result<&FraudLogger<SignerClient>, ReportError> {
        let (_, contract) = self
            .submitter
            .get_or_try_init(|| async {
                let chain_id = match self.chain_id {
                    Some(id) => id,
                    None => self
                        .provider
                        .get_chainid()
                        .await
                        .map_err(|e| ReportError::Transport(format!("chain id unavailable: {e}")))?
                        .as_u64(),
                };
                let wallet = self.wallet.clone().with_chain_id(chain_id);
                info!(chain_id, "Reporter key bound to chain");
                let client = Arc::new(SignerMiddleware::new(self.provider.clone(), wallet));
                Ok::<_, ReportError>((chain_id, FraudLogger::new(self.address, client)))
            })
            .await?;
        Ok(contract)
    }
}

pub fn parse_address(s: &str) -> Result<Address, ChainError> {
    s.trim().parse::<Address>().map_err(|e| ChainError::Invalid {
        what: "contract address",
        reason: e.to_string(),
    })
}

#[async_trait]
impl FindingReporter for LedgerClient {
    async fn report(&self, finding: &FraudFinding) -> Result<H256, ReportError> {
        let contract = self.submitter().await?;
        let call = contract.log_fraud(
            finding.tx_hash.0,
            finding.sender,
            U256::from(finding.score),
            finding.fraud_type,
            finding.token_in,
            finding.token_out,
            finding.amount_in,
            finding.amount_out,
        );
        let pending = call.send().await.map_err(classify_send_error)?;
        let submission = pending.tx_hash();
        debug!(tx = ?finding.tx_hash, submission = ?submission, "logFraud submitted, awaiting inclusion");

        let receipt = pending
            .await
            .map_err(|e| ReportError::Transport(e.to_string()))?
            .ok_or_else(|| ReportError::Transport(format!("{submission:?} dropped before inclusion")))?;

        if receipt.status == Some(U64::from(1)) {
            Ok(submission)
        } else {
            Err(ReportError::Rejected(format!("{submission:?} reverted")))
        }
    }
}

#[async_trait]
impl ReporterRegistry for LedgerClient {
    async fn is_reporter(&self, identity: Address) -> Result<bool, ChainError> {
        self.registry
            .reporters(identity)
            .call()
            .await
            .map_err(|e| ChainError::Contract(e.to_string()))
    }
}

fn classify_send_error(err: ContractError<SignerClient>) -> ReportError {
    if err.is_revert() {
        ReportError::Rejected(err.to_string())
    } else {
        ReportError::Transport(err.to_string())
    }
}
