use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{Semaphore, mpsc};
use tokio::task::JoinSet;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::PipelineConfig;
use crate::core::finding::{FraudFinding, exceeds_threshold};
use crate::core::seen::RecentTxs;
use crate::core::traits::{FindingReporter, Scorer, TxLookup};
use crate::core::tx::{normalize, wei_to_gwei};
use crate::core::{Exclusion, FeedEvent, PendingTxRef, RawTransaction, TxOutcome};
use crate::db::{ReportStatus, SharedDatabase};
use crate::errors::{ChainError, ReportError};
use crate::rpc::feed::SessionEnd;

/// Intake → resolve → normalize → score → report, one task per pending hash.
pub struct Pipeline {
    lookup: Arc<dyn TxLookup>,
    scorer: Arc<dyn Scorer>,
    reporter: Arc<dyn FindingReporter>,
    journal: Option<SharedDatabase>,
    config: PipelineConfig,
    recent: Mutex<RecentTxs>,
    admission: Arc<Semaphore>,
    stats: PipelineStats,
}

impl Pipeline {
    pub fn new(
        lookup: Arc<dyn TxLookup>,
        scorer: Arc<dyn Scorer>,
        reporter: Arc<dyn FindingReporter>,
        config: PipelineConfig,
    ) -> Self {
        let permits = match config.max_in_flight {
            0 => Semaphore::MAX_PERMITS,
            n => n,
        };
        Self {
            lookup,
            scorer,
            reporter,
            journal: None,
            recent: Mutex::new(RecentTxs::new(config.dedup_ttl(), config.dedup_capacity)),
            admission: Arc::new(Semaphore::new(permits)),
            stats: PipelineStats::default(),
            config,
        }
    }

    /// Journal every report attempt to `db`.
    pub fn with_journal(mut self, db: SharedDatabase) -> Self {
        self.journal = Some(db);
        self
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Consume feed events until the channel closes or `cancel` fires.
    ///
    /// Each pending hash is handled by its own task. Once intake stops,
    /// remaining tasks are awaited; on cancellation they abandon at their
    /// next suspension point.
    pub async fn run(
        self: Arc<Self>,
        mut rx: mpsc::UnboundedReceiver<FeedEvent>,
        cancel: CancellationToken,
    ) -> StatsSnapshot {
        let mut tasks: JoinSet<TxOutcome> = JoinSet::new();
        info!(threshold = self.config.fraud_threshold, "Pipeline started, waiting for pending transactions...");

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                event = rx.recv() => match event {
                    Some(FeedEvent::Pending(tx_ref)) => self.admit(tx_ref, &mut tasks, &cancel),
                    Some(FeedEvent::Connected) => info!("Feed connected"),
                    Some(FeedEvent::Error(e)) => warn!("Feed transport error: {e}"),
                    Some(FeedEvent::Closed) => info!("Feed connection closed"),
                    None => break,
                },
                Some(joined) = tasks.join_next(), if !tasks.is_empty() => reap(joined),
            }
        }

        while let Some(joined) = tasks.join_next().await {
            reap(joined);
        }
        let snapshot = self.stats();
        info!("Pipeline shutting down: {snapshot}");
        snapshot
    }

    fn admit(self: &Arc<Self>, tx_ref: PendingTxRef, tasks: &mut JoinSet<TxOutcome>, cancel: &CancellationToken) {
        let observed = self.stats.observed.fetch_add(1, Ordering::Relaxed) + 1;
        if self.config.stats_interval > 0 && observed % self.config.stats_interval == 0 {
            let tracked = self.recent.lock().map(|r| r.len()).unwrap_or(0);
            info!(tracked, "Pipeline progress: {}", self.stats());
        }

        // Only admitted hashes are marked seen, so a throttled one can be
        // picked up when the node announces it again.
        let permit = match Arc::clone(&self.admission).try_acquire_owned() {
            Ok(permit) => permit,
            Err(_) => {
                debug!(tx = ?tx_ref, "In-flight limit reached, dropping");
                self.stats.record(&TxOutcome::Throttled);
                return;
            }
        };
        if !self.mark_seen(tx_ref) {
            debug!(tx = ?tx_ref, "Already processed recently, skipping");
            self.stats.record(&TxOutcome::Duplicate);
            return;
        }

        let pipeline = Arc::clone(self);
        let cancel = cancel.clone();
        tasks.spawn(async move {
            let _permit = permit;
            let outcome = tokio::select! {
                _ = cancel.cancelled() => TxOutcome::Cancelled,
                outcome = pipeline.process(tx_ref) => outcome,
            };
            pipeline.stats.record(&outcome);
            outcome
        });
    }

    fn mark_seen(&self, tx_ref: PendingTxRef) -> bool {
        match self.recent.lock() {
            Ok(mut recent) => recent.insert(tx_ref, Instant::now()),
            Err(poisoned) => poisoned.into_inner().insert(tx_ref, Instant::now()),
        }
    }

    /// Drive one pending hash to a terminal state.
    pub async fn process(&self, tx_ref: PendingTxRef) -> TxOutcome {
        let raw = match self.resolve(tx_ref).await {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                debug!(tx = ?tx_ref, "Transaction no longer pending");
                return TxOutcome::Excluded(Exclusion::NotFound);
            }
            Err(e) => {
                debug!(tx = ?tx_ref, "Error fetching transaction: {e}");
                return TxOutcome::Excluded(Exclusion::LookupFailed);
            }
        };

        let Some(request) = normalize(&raw, Utc::now()) else {
            return TxOutcome::Excluded(Exclusion::ZeroValue);
        };
        info!(
            tx = ?tx_ref,
            from = ?raw.from,
            to = ?raw.to,
            value_eth = request.amount,
            gas_gwei = wei_to_gwei(raw.gas_price.unwrap_or_default()),
            "New pending transaction"
        );

        let verdict = match self.scorer.score(&request).await {
            Ok(verdict) => verdict,
            Err(e) => {
                warn!(tx = ?tx_ref, "No fraud verdict, skipping: {e}");
                return TxOutcome::ScoreFailed;
            }
        };
        let score = verdict.fraud_score;
        if !exceeds_threshold(score, self.config.fraud_threshold) {
            debug!(tx = ?tx_ref, score, "Low fraud score, not reporting");
            return TxOutcome::BelowThreshold { score };
        }

        let finding = FraudFinding::from_verdict(&request, &verdict, self.config.score_scale);
        warn!(
            tx = ?tx_ref,
            score,
            fraud_type = finding.fraud_type,
            explanation = verdict.explanation.as_deref().unwrap_or(""),
            "High fraud score detected, logging to ledger"
        );

        let (outcome, status) = match self.submit(&finding).await {
            Ok(submission) => {
                info!(tx = ?tx_ref, submission = ?submission, "Fraud logged on-chain");
                (TxOutcome::Reported { score, submission }, ReportStatus::Reported { submission })
            }
            Err(e) => {
                error!(tx = ?tx_ref, "Failed to log fraud on-chain: {e}");
                (TxOutcome::ReportFailed { score }, ReportStatus::Failed { error: e.to_string() })
            }
        };
        if let Some(journal) = &self.journal {
            if let Err(e) = journal.record_finding(&finding, &status) {
                warn!(tx = ?tx_ref, "Failed to journal finding: {e}");
            }
        }
        outcome
    }

    /// Wait, then look the hash up; absent results are retried up to
    /// `resolve_attempts` lookups in total.
    async fn resolve(&self, tx_ref: PendingTxRef) -> Result<Option<RawTransaction>, ChainError> {
        let attempts = self.config.resolve_attempts.max(1);
        for attempt in 1..=attempts {
            tokio::time::sleep(self.config.resolve_delay()).await;
            if let Some(raw) = self.lookup.resolve(tx_ref).await? {
                return Ok(Some(raw));
            }
            debug!(tx = ?tx_ref, attempt, "Transaction body not available yet");
        }
        Ok(None)
    }

    async fn submit(&self, finding: &FraudFinding) -> Result<ethers::types::H256, ReportError> {
        if self.config.report_timeout_secs == 0 {
            return self.reporter.report(finding).await;
        }
        let limit = self.config.report_timeout();
        match tokio::time::timeout(limit, self.reporter.report(finding)).await {
            Ok(result) => result,
            Err(_) => Err(ReportError::Timeout(limit)),
        }
    }
}

fn reap(joined: Result<TxOutcome, tokio::task::JoinError>) {
    if let Err(e) = joined {
        if e.is_panic() {
            error!("Transaction task panicked: {e}");
        }
    }
}

/// Keep the feed connected until `cancel` fires, reconnecting after
/// `reconnect_delay` whenever a session closes or fails.
///
/// `session` runs one connection (see [`crate::rpc::feed::run_session`]) and reports
/// how it ended.
pub async fn supervise_feed<S, Fut>(
    mut session: S,
    reconnect_delay: Duration,
    tx: mpsc::UnboundedSender<FeedEvent>,
    cancel: CancellationToken,
) where
    S: FnMut(mpsc::UnboundedSender<FeedEvent>, CancellationToken) -> Fut,
    Fut: Future<Output = Result<SessionEnd, ChainError>>,
{
    loop {
        let event = match session(tx.clone(), cancel.clone()).await {
            Ok(SessionEnd::Cancelled) | Ok(SessionEnd::ReceiverGone) => break,
            Ok(SessionEnd::Closed) => FeedEvent::Closed,
            Err(e) => {
                warn!("Feed session failed: {e}");
                FeedEvent::Error(e.to_string())
            }
        };
        if tx.send(event).is_err() {
            break;
        }
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(reconnect_delay) => {}
        }
        info!("Reconnecting to pending-transaction feed");
    }
    let _ = tx.send(FeedEvent::Closed);
    info!("Feed supervisor stopped");
}

/// Per-outcome counters.
#[derive(Debug, Default)]
pub struct PipelineStats {
    observed: AtomicU64,
    excluded: AtomicU64,
    duplicate: AtomicU64,
    throttled: AtomicU64,
    score_failed: AtomicU64,
    below_threshold: AtomicU64,
    reported: AtomicU64,
    report_failed: AtomicU64,
    cancelled: AtomicU64,
}

impl PipelineStats {
    fn record(&self, outcome: &TxOutcome) {
        let counter = match outcome {
            TxOutcome::Excluded(_) => &self.excluded,
            TxOutcome::Duplicate => &self.duplicate,
            TxOutcome::Throttled => &self.throttled,
            TxOutcome::ScoreFailed => &self.score_failed,
            TxOutcome::BelowThreshold { .. } => &self.below_threshold,
            TxOutcome::Reported { .. } => &self.reported,
            TxOutcome::ReportFailed { .. } => &self.report_failed,
            TxOutcome::Cancelled => &self.cancelled,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> StatsSnapshot {
        let get = |c: &AtomicU64| c.load(Ordering::Relaxed);
        StatsSnapshot {
            observed: get(&self.observed),
            excluded: get(&self.excluded),
            duplicate: get(&self.duplicate),
            throttled: get(&self.throttled),
            score_failed: get(&self.score_failed),
            below_threshold: get(&self.below_threshold),
            reported: get(&self.reported),
            report_failed: get(&self.report_failed),
            cancelled: get(&self.cancelled),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub observed: u64,
    pub excluded: u64,
    pub duplicate: u64,
    pub throttled: u64,
    pub score_failed: u64,
    pub below_threshold: u64,
    pub reported: u64,
    pub report_failed: u64,
    pub cancelled: u64,
}

impl std::fmt::Display for StatsSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "observed={} excluded={} duplicate={} throttled={} score_failed={} below_threshold={} reported={} report_failed={} cancelled={}",
            self.observed,
            self.excluded,
            self.duplicate,
            self.throttled,
            self.score_failed,
            self.below_threshold,
            self.reported,
            self.report_failed,
            self.cancelled,
        )
    }
}
