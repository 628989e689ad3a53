use anyhow::Result;
use rusqlite::Connection;
use tracing::debug;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS session (
            slot        INTEGER PRIMARY KEY CHECK (slot = 1),
            token       TEXT NOT NULL,
            token_type  TEXT NOT NULL DEFAULT 'bearer',
            expires_at  TEXT NOT NULL,
            created_at  TEXT NOT NULL DEFAULT (datetime('now'))
        );
        ",
    )?;

    debug!("Session store migrations complete");
    Ok(())
}
