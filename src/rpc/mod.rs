pub mod feed;

use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use ethers::providers::{Http, Middleware, Provider, Ws};
use ethers::types::Transaction;

use crate::core::traits::TxLookup;
use crate::core::{PendingTxRef, RawTransaction};
use crate::errors::ChainError;

/// JSON-RPC provider for contract calls.
pub fn http_provider(rpc_url: &str) -> Result<Provider<Http>, ChainError> {
    Provider::<Http>::try_from(rpc_url.trim()).map_err(|e| ChainError::Invalid {
        what: "RPC URL",
        reason: e.to_string(),
    })
}

/// The websocket connection of the live feed session, shared with lookups.
///
/// Pending hashes are only known to the node that announced them, so bodies
/// are resolved over the same connection. The feed session installs its
/// provider on connect and clears it when the session ends.
#[derive(Clone, Default)]
pub struct FeedProvider {
    current: Arc<RwLock<Option<Provider<Ws>>>>,
}

impl FeedProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn install(&self, provider: Provider<Ws>) {
        *self.write() = Some(provider);
    }

    pub(crate) fn clear(&self) {
        *self.write() = None;
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Option<Provider<Ws>>> {
        self.current.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Option<Provider<Ws>>> {
        self.current.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl TxLookup for FeedProvider {
    async fn resolve(&self, tx_ref: PendingTxRef) -> Result<Option<RawTransaction>, ChainError> {
        let provider = self.read().clone().ok_or(ChainError::Disconnected)?;
        let tx = provider.get_transaction(tx_ref).await?;
        Ok(tx.map(raw_from_node))
    }
}

fn raw_from_node(tx: Transaction) -> RawTransaction {
    RawTransaction {
        hash: tx.hash,
        from: tx.from,
        to: tx.to,
        value: tx.value,
        gas_price: tx.gas_price,
        gas_limit: tx.gas,
    }
}
