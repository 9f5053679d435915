//! Local key-value store
//!
//! A single-file SQLite table mapping string keys to opaque string values.
//! This is the only state shared between the UI surfaces (task list, menubar,
//! stop command); they run as separate processes and communicate through it.
//!
//! Multi-key updates go through one transaction, so a reader in another
//! process never observes a partially-written timer state.

use std::path::Path;

use rusqlite::{params, Connection, OptionalExtension};

use crate::config::Config;
use crate::error::Result;

/// Durable string-keyed store backed by SQLite.
pub struct KvStore {
    conn: Connection,
}

impl KvStore {
    /// Open (and create if needed) the store at the given path.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        // WAL lets the menubar poll while another surface writes.
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS kv (
                key   TEXT PRIMARY KEY,
                value TEXT NOT NULL
            )",
            [],
        )?;

        Ok(Self { conn })
    }

    /// Open the store at the default XDG data path.
    pub fn open_default() -> Result<Self> {
        Self::open(&Config::store_path())
    }

    pub fn get(&self, key: &str) -> Result<Option<String>> {
        let value = self
            .conn
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(value)
    }

    pub fn set(&self, key: &str, value: &str) -> Result<()> {
        self.conn.execute(
            "INSERT INTO kv (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, value],
        )?;
        Ok(())
    }

    pub fn remove(&self, key: &str) -> Result<()> {
        self.conn
            .execute("DELETE FROM kv WHERE key = ?1", params![key])?;
        Ok(())
    }

    /// Write several keys and delete others in one transaction.
    pub fn replace_many(&mut self, entries: &[(&str, String)], removals: &[&str]) -> Result<()> {
        let tx = self.conn.transaction()?;

        for (key, value) in entries {
            tx.execute(
                "INSERT INTO kv (key, value) VALUES (?1, ?2)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                params![key, value],
            )?;
        }
        for key in removals {
            tx.execute("DELETE FROM kv WHERE key = ?1", params![key])?;
        }

        tx.commit()?;
        Ok(())
    }

    /// Delete several keys in one transaction.
    pub fn remove_many(&mut self, keys: &[&str]) -> Result<()> {
        self.replace_many(&[], keys)
    }
}
