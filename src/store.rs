//! Per-slug publication state, persisted in SQLite.
//!
//! One row per slug, upserted on every write, never deleted. The row is
//! the sole source of truth for "this slug's post is already on the main
//! branch"; the scheduler trusts it over anything in the CSV or on disk.
//!
//! Ordering invariant (shared with [`crate::schedule`]): the markdown file
//! is written before the state row. The two are not atomic; a crash in
//! between leaves a file without state, which the next run repairs by
//! overwriting the file and recording the state it missed.

use chrono::NaiveDate;
use rusqlite::{Connection, params};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("corrupt state row for {slug}: {detail}")]
    Corrupt { slug: String, detail: String },
}

/// Lifecycle state of a slug. `Published` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PubState {
    Draft,
    Published,
}

impl PubState {
    pub fn as_str(self) -> &'static str {
        match self {
            PubState::Draft => "draft",
            PubState::Published => "published",
        }
    }

    fn parse(raw: &str) -> Option<Self> {
        match raw {
            "draft" => Some(PubState::Draft),
            "published" => Some(PubState::Published),
            _ => None,
        }
    }
}

/// What the store knows about one slug.
#[derive(Debug, Clone, PartialEq)]
pub struct StateEntry {
    pub state: PubState,
    pub scheduled_date: NaiveDate,
}

/// Handle over the state database.
pub struct StateStore {
    conn: Connection,
}

impl StateStore {
    /// Open (or create) the database and ensure the schema exists.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;

            CREATE TABLE IF NOT EXISTS items (
                slug           TEXT PRIMARY KEY,
                state          TEXT NOT NULL,
                scheduled_date TEXT NOT NULL,
                updated_at     TEXT NOT NULL DEFAULT (datetime('now'))
            );
            ",
        )?;
        Ok(Self { conn })
    }

    /// Look up a slug's entry, if it has ever been recorded.
    pub fn get(&self, slug: &str) -> Result<Option<StateEntry>, StoreError> {
        let mut stmt = self
            .conn
            .prepare("SELECT state, scheduled_date FROM items WHERE slug = ?1")?;
        let mut rows = stmt.query([slug])?;

        let Some(row) = rows.next()? else {
            return Ok(None);
        };
        let state_raw: String = row.get(0)?;
        let date_raw: String = row.get(1)?;

        let state = PubState::parse(&state_raw).ok_or_else(|| StoreError::Corrupt {
            slug: slug.to_string(),
            detail: format!("unknown state {state_raw:?}"),
        })?;
        let scheduled_date =
            NaiveDate::parse_from_str(&date_raw, "%Y-%m-%d").map_err(|e| StoreError::Corrupt {
                slug: slug.to_string(),
                detail: format!("bad scheduled_date {date_raw:?}: {e}"),
            })?;

        Ok(Some(StateEntry {
            state,
            scheduled_date,
        }))
    }

    /// Record (or overwrite) a slug's state. One statement, one transaction.
    pub fn upsert(
        &self,
        slug: &str,
        state: PubState,
        scheduled_date: NaiveDate,
    ) -> Result<(), StoreError> {
        self.conn.execute(
            "
            INSERT INTO items (slug, state, scheduled_date, updated_at)
            VALUES (?1, ?2, ?3, datetime('now'))
            ON CONFLICT(slug) DO UPDATE SET
                state = excluded.state,
                scheduled_date = excluded.scheduled_date,
                updated_at = datetime('now')
            ",
            params![
                slug,
                state.as_str(),
                scheduled_date.format("%Y-%m-%d").to_string()
            ],
        )?;
        Ok(())
    }
}
