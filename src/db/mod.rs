pub mod schema;

use chrono::Utc;
use ethers::types::H256;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::{Arc, Mutex};

use crate::core::finding::FraudFinding;

pub const STATUS_REPORTED: &str = "reported";
pub const STATUS_FAILED: &str = "failed";

/// Outcome of a report attempt, as journaled.
#[derive(Debug, Clone, PartialEq)]
pub enum ReportStatus {
    Reported { submission: H256 },
    Failed { error: String },
}

/// A journaled finding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FindingRecord {
    pub id: i64,
    pub tx_hash: String,
    pub sender: String,
    pub score: u64,
    pub fraud_type: u8,
    pub amount_wei: String,
    pub status: String,
    pub submission: Option<String>,
    pub error: Option<String>,
    pub created_at: String,
}

pub struct Database {
    conn: Connection,
}

/// Thread-safe wrapper around Database.
#[derive(Clone)]
pub struct SharedDatabase {
    inner: Arc<Mutex<Database>>,
}

impl SharedDatabase {
    pub fn open(path: &Path) -> Result<Self, rusqlite::Error> {
        let db = Database::open(path)?;
        Ok(Self {
            inner: Arc::new(Mutex::new(db)),
        })
    }

    pub fn record_finding(&self, finding: &FraudFinding, status: &ReportStatus) -> Result<(), rusqlite::Error> {
        let db = self.lock();
        db.record_finding(finding, status)
    }

    pub fn recent_findings(&self, limit: usize) -> Result<Vec<FindingRecord>, rusqlite::Error> {
        let db = self.lock();
        db.recent_findings(limit)
    }

    pub fn count_by_status(&self, status: &str) -> Result<usize, rusqlite::Error> {
        let db = self.lock();
        db.count_by_status(status)
    }

    #[cfg(test)]
    pub fn finding_count(&self) -> Result<usize, rusqlite::Error> {
        let db = self.lock();
        db.finding_count()
    }

    /// Total findings and when the newest was journaled.
    pub fn summary(&self) -> Result<(usize, Option<String>), rusqlite::Error> {
        let db = self.lock();
        let count = db.finding_count()?;
        let last = db.recent_findings(1)?.pop().map(|r| r.created_at);
        Ok((count, last))
    }

    // A panic while holding the lock leaves the connection usable.
    fn lock(&self) -> std::sync::MutexGuard<'_, Database> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Database {
    pub fn open(path: &Path) -> Result<Self, rusqlite::Error> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
        schema::migrate(&conn)?;
        Ok(Self { conn })
    }

    /// Journal one report attempt.
    pub fn record_finding(&self, finding: &FraudFinding, status: &ReportStatus) -> Result<(), rusqlite::Error> {
        let (status_str, submission, error) = match status {
            ReportStatus::Reported { submission } => (STATUS_REPORTED, Some(format!("{submission:?}")), None),
            ReportStatus::Failed { error } => (STATUS_FAILED, None, Some(error.clone())),
        };
        self.conn.execute(
            "INSERT INTO findings (tx_hash, sender, score, fraud_type, amount_wei, status, submission, error, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            rusqlite::params![
                format!("{:?}", finding.tx_hash),
                format!("{:?}", finding.sender),
                finding.score as i64,
                finding.fraud_type,
                finding.amount_in.to_string(),
                status_str,
                submission,
                error,
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    fn row_to_finding(row: &rusqlite::Row) -> rusqlite::Result<FindingRecord> {
        let score: i64 = row.get(3)?;
        Ok(FindingRecord {
            id: row.get(0)?,
            tx_hash: row.get(1)?,
            sender: row.get(2)?,
            score: score.max(0) as u64,
            fraud_type: row.get(4)?,
            amount_wei: row.get(5)?,
            status: row.get(6)?,
            submission: row.get(7)?,
            error: row.get(8)?,
            created_at: row.get(9)?,
        })
    }

    /// Most recent findings, newest first.
    pub fn recent_findings(&self, limit: usize) -> Result<Vec<FindingRecord>, rusqlite::Error> {
        let mut stmt = self.conn.prepare(
            "SELECT id, tx_hash, sender, score, fraud_type, amount_wei, status, submission, error, created_at
             FROM findings ORDER BY id DESC LIMIT ?1",
        )?;
        let rows = stmt.query_map(rusqlite::params![limit as i64], Self::row_to_finding)?;
        rows.collect()
    }

    pub fn finding_count(&self) -> Result<usize, rusqlite::Error> {
        let count: i64 = self.conn.query_row("SELECT COUNT(*) FROM findings", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    pub fn count_by_status(&self, status: &str) -> Result<usize, rusqlite::Error> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM findings WHERE status = ?1",
            rusqlite::params![status],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }
}
