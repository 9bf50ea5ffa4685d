//! Connection Management Module
//!
//! This module provides the database connection: opening, plain SQL
//! execution, statement preparation, and connection-scoped engine state
//! (last inserted rowid, last error message).

use super::raw::{self, RawStatement};
use super::statement::PreparedStatement;
use crate::core::error::engine_message;
use crate::core::{BindingError, Result};
use rusqlite::OpenFlags;
use serde::Deserialize;
use std::cell::RefCell;
use std::time::Duration;
use tracing::{debug, warn};

/// Options applied when opening a database.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct OpenOptions {
    /// Create the database file if it does not exist
    pub create: bool,
    /// Open the database read-only
    pub read_only: bool,
    /// Engine-side busy timeout in milliseconds; 0 reports `busy` at once
    pub busy_timeout_ms: u64,
}

impl Default for OpenOptions {
    fn default() -> Self {
        OpenOptions {
            create: true,
            read_only: false,
            busy_timeout_ms: 0,
        }
    }
}

impl OpenOptions {
    fn flags(&self) -> OpenFlags {
        let mut flags = OpenFlags::SQLITE_OPEN_URI | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        if self.read_only {
            flags |= OpenFlags::SQLITE_OPEN_READ_ONLY;
        } else {
            flags |= OpenFlags::SQLITE_OPEN_READ_WRITE;
            if self.create {
                flags |= OpenFlags::SQLITE_OPEN_CREATE;
            }
        }
        flags
    }
}

/// An open database.
///
/// Statements prepared from a connection borrow it, so `close()` (which
/// takes `&mut self`) cannot be called while any statement is alive. After
/// `close()` every other operation fails with `BindingError::Closed`.
#[derive(Debug)]
pub struct Connection {
    name: String,
    inner: Option<rusqlite::Connection>,
    last_error: RefCell<Option<String>>,
}

impl Connection {
    /// Opens or creates the named database with default options.
    ///
    /// # Arguments
    ///
    /// * `name` - Path to the database file, or ":memory:" for an in-memory database
    ///
    /// # Examples
    ///
    /// ```
    /// use sqlite3_db::Connection;
    ///
    /// let db = Connection::open(":memory:")?;
    /// assert!(db.execute("create table t (a, b, c);")?);
    /// # Ok::<_, sqlite3_db::BindingError>(())
    /// ```
    pub fn open(name: &str) -> Result<Self> {
        Self::open_with(name, &OpenOptions::default())
    }

    /// Opens the named database with explicit options.
    ///
    /// Fails with `BindingError::Open` if the file cannot be opened or is not
    /// a database. The header is read eagerly so a foreign file is rejected
    /// here rather than on first use.
    pub fn open_with(name: &str, options: &OpenOptions) -> Result<Self> {
        let open_error = |e: rusqlite::Error| BindingError::Open {
            name: name.to_string(),
            message: engine_message(&e),
        };

        let conn = rusqlite::Connection::open_with_flags(name, options.flags()).map_err(open_error)?;
        conn.busy_timeout(Duration::from_millis(options.busy_timeout_ms))
            .map_err(open_error)?;
        conn.query_row("PRAGMA schema_version", [], |row| row.get::<_, i64>(0))
            .map_err(open_error)?;

        debug!("Opened database {} with {:?}", name, options);
        Ok(Connection {
            name: name.to_string(),
            inner: Some(conn),
            last_error: RefCell::new(None),
        })
    }

    /// The name the database was opened with.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_open(&self) -> bool {
        self.inner.is_some()
    }

    /// Liveness check used by every operation.
    fn handle(&self) -> Result<&rusqlite::Connection> {
        self.inner.as_ref().ok_or(BindingError::Closed)
    }

    pub(crate) fn record_error(&self, message: String) {
        *self.last_error.borrow_mut() = Some(message);
    }

    /// Runs one or more statements without parameters or result rows.
    ///
    /// SQL failures are reported as `Ok(false)`; the detail is available
    /// from `last_error_message()`. Only a closed connection is an `Err`.
    pub fn execute(&self, sql: &str) -> Result<bool> {
        let conn = self.handle()?;
        match conn.execute_batch(sql) {
            Ok(()) => Ok(true),
            Err(e) => {
                let mut message = engine_message(&e);
                if message.is_empty() {
                    message = format!("execute failed: {}", e);
                }
                warn!("execute failed on {}: {}", self.name, message);
                self.record_error(message);
                Ok(false)
            }
        }
    }

    /// Compiles the first statement in `sql`. Trailing text is ignored; use
    /// `execute` for multi-statement scripts.
    pub fn prepare(&self, sql: &str) -> Result<PreparedStatement<'_>> {
        let conn = self.handle()?;
        match RawStatement::prepare(conn, sql) {
            Ok(Some(raw)) => {
                debug!("Prepared `{}`", sql);
                Ok(PreparedStatement::new(self, raw, sql))
            }
            Ok(None) => {
                let message = "SQL text contains no statement".to_string();
                self.record_error(message.clone());
                Err(BindingError::Prepare(message))
            }
            Err(failure) => {
                warn!("prepare failed for `{}`: {}", sql, failure.message);
                self.record_error(failure.message.clone());
                Err(BindingError::Prepare(failure.message))
            }
        }
    }

    /// Rowid of the most recent successful insert on this connection, from
    /// any statement.
    pub fn last_insert_rowid(&self) -> Result<i64> {
        Ok(self.handle()?.last_insert_rowid())
    }

    /// Rows modified by the most recently completed statement.
    pub fn changes(&self) -> Result<u64> {
        Ok(self.handle()?.changes() as u64)
    }

    /// The most recent error message, stable until the next failing call.
    pub fn last_error_message(&self) -> Result<String> {
        let conn = self.handle()?;
        if let Some(message) = self.last_error.borrow().as_ref() {
            return Ok(message.clone());
        }
        Ok(raw::connection_errmsg(conn))
    }

    /// Releases the engine handle. Calling it again is a no-op.
    pub fn close(&mut self) -> Result<()> {
        let Some(conn) = self.inner.take() else {
            return Ok(());
        };
        debug!("Closing database {}", self.name);
        conn.close().map_err(|(_, e)| {
            warn!("close of {} reported: {}", self.name, e);
            BindingError::Database(e)
        })
    }
}
