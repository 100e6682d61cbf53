use ethers::providers::{Middleware, Provider, Ws};
use futures::StreamExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::core::FeedEvent;
use crate::errors::ChainError;
use crate::rpc::FeedProvider;

/// How a feed session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// The node closed the subscription stream.
    Closed,
    /// Shutdown was requested.
    Cancelled,
    /// Nobody is listening for events any more.
    ReceiverGone,
}

/// Run one websocket session against the node's pending-transaction feed.
///
/// Emits `Connected` once subscribed, then one `Pending` per announced
/// hash. The connected provider is installed into `lookups` for the
/// lifetime of the session. Reconnecting after the session ends is left to
/// the caller.
pub async fn run_session(
    ws_url: String,
    lookups: FeedProvider,
    tx: mpsc::UnboundedSender<FeedEvent>,
    cancel: CancellationToken,
) -> Result<SessionEnd, ChainError> {
    let provider = tokio::select! {
        _ = cancel.cancelled() => return Ok(SessionEnd::Cancelled),
        provider = Provider::<Ws>::connect(ws_url.as_str()) => provider?,
    };
    lookups.install(provider.clone());
    let end = forward_pending(&provider, &ws_url, &tx, &cancel).await;
    lookups.clear();
    end
}

async fn forward_pending(
    provider: &Provider<Ws>,
    ws_url: &str,
    tx: &mpsc::UnboundedSender<FeedEvent>,
    cancel: &CancellationToken,
) -> Result<SessionEnd, ChainError> {
    let mut stream = provider.subscribe_pending_txs().await?;
    info!(endpoint = %ws_url, "Pending-transaction subscription established");
    if tx.send(FeedEvent::Connected).is_err() {
        return Ok(SessionEnd::ReceiverGone);
    }

    let end = loop {
        tokio::select! {
            _ = cancel.cancelled() => break SessionEnd::Cancelled,
            next = stream.next() => match next {
                Some(hash) => {
                    if tx.send(FeedEvent::Pending(hash)).is_err() {
                        break SessionEnd::ReceiverGone;
                    }
                }
                None => break SessionEnd::Closed,
            },
        }
    };

    if end != SessionEnd::Closed {
        if let Err(e) = stream.unsubscribe().await {
            debug!("Unsubscribe failed: {e}");
        }
    }
    Ok(end)
}
