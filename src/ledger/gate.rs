use ethers::types::Address;
use tracing::{info, warn};

use crate::core::traits::ReporterRegistry;

/// Whether `identity` may log findings.
///
/// Advisory only: read errors count as unauthorized and callers keep
/// submitting, since the contract enforces the allow-list itself.
pub async fn check_authorized(registry: &dyn ReporterRegistry, identity: Address) -> bool {
    match registry.is_reporter(identity).await {
        Ok(true) => {
            info!(reporter = ?identity, "Reporter is authorized on the ledger");
            true
        }
        Ok(false) => {
            warn!(reporter = ?identity, "Reporter is NOT authorized; logFraud calls will be rejected until setReporter is called");
            false
        }
        Err(e) => {
            warn!(reporter = ?identity, "Could not read reporter status, assuming unauthorized: {e}");
            false
        }
    }
}
