use rusqlite::Connection;

pub fn migrate(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS findings (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            tx_hash     TEXT NOT NULL,
            sender      TEXT NOT NULL,
            score       INTEGER NOT NULL,
            fraud_type  INTEGER NOT NULL,
            amount_wei  TEXT NOT NULL, -- decimal string, exceeds i64
            status      TEXT NOT NULL, -- 'reported' | 'failed'
            submission  TEXT,
            error       TEXT,
            created_at  TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_findings_tx ON findings(tx_hash);
        CREATE INDEX IF NOT EXISTS idx_findings_created ON findings(created_at DESC);
        ",
    )?;
    Ok(())
}
