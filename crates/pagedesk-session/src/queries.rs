use anyhow::{Result, anyhow};
use chrono::{DateTime, Duration, Utc};
use rusqlite::{Connection, OptionalExtension};
use tracing::{debug, warn};

use pagedesk_types::models::Session;

use crate::SessionStore;
use crate::models::SessionRow;

impl SessionStore {
    /// Current session, or `None` when absent, expired, or unreadable.
    pub fn get(&self) -> Option<Session> {
        self.get_at(Utc::now())
    }

    pub fn get_at(&self, now: DateTime<Utc>) -> Option<Session> {
        let row = match self.with_conn(query_session) {
            Ok(row) => row?,
            Err(e) => {
                warn!("Session store unavailable, treating session as absent: {}", e);
                return None;
            }
        };

        let session = match row_to_session(row) {
            Ok(session) => session,
            Err(e) => {
                warn!("Discarding unreadable session: {}", e);
                self.clear().ok();
                return None;
            }
        };

        if session.is_expired_at(now) {
            debug!("Stored session expired at {}", session.expires_at);
            self.clear().ok();
            return None;
        }

        Some(session)
    }

    pub fn is_present(&self) -> bool {
        self.get().is_some()
    }

    /// Store a new session that expires after `ttl`, replacing any other.
    pub fn set(&self, token: &str, token_type: &str, ttl: Duration) -> Result<Session> {
        let session = Session::new(token, token_type, ttl);
        self.save(&session)?;
        Ok(session)
    }

    pub fn save(&self, session: &Session) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO session (slot, token, token_type, expires_at)
                 VALUES (1, ?1, ?2, ?3)
                 ON CONFLICT(slot) DO UPDATE SET
                    token = excluded.token,
                    token_type = excluded.token_type,
                    expires_at = excluded.expires_at,
                    created_at = datetime('now')",
                (
                    &session.token,
                    &session.token_type,
                    session.expires_at.to_rfc3339(),
                ),
            )?;
            Ok(())
        })?;
        debug!("Session saved, expires at {}", session.expires_at);
        Ok(())
    }

    /// Remove the session. Clearing an empty store is not an error.
    pub fn clear(&self) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute("DELETE FROM session", [])?;
            Ok(())
        })
    }
}

fn query_session(conn: &Connection) -> Result<Option<SessionRow>> {
    let mut stmt =
        conn.prepare("SELECT token, token_type, expires_at FROM session WHERE slot = 1")?;

    let row = stmt
        .query_row([], |row| {
            Ok(SessionRow {
                token: row.get(0)?,
                token_type: row.get(1)?,
                expires_at: row.get(2)?,
            })
        })
        .optional()?;

    Ok(row)
}

fn row_to_session(row: SessionRow) -> Result<Session> {
    let expires_at = DateTime::parse_from_rfc3339(&row.expires_at)
        .map_err(|e| anyhow!("Corrupt expires_at '{}': {}", row.expires_at, e))?
        .with_timezone(&Utc);

    Ok(Session {
        token: row.token,
        token_type: row.token_type,
        expires_at,
    })
}
