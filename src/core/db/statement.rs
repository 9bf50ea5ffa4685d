//! Prepared Statement Module
//!
//! Stepwise execution over one compiled statement. Parameters are 1-based
//! and columns are 0-based, mirroring the engine's C API; both conventions
//! are part of the public contract and must not be unified.

use super::connection::Connection;
use super::raw::{RawStatement, RawStep};
use super::value::Value;
use crate::core::{BindingError, Result};
use std::collections::BTreeMap;
use std::fmt;
use tracing::{debug, trace, warn};

/// Execution state of a prepared statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementState {
    /// Prepared or reset, not yet stepped
    Ready,
    /// A result row is available
    Row,
    /// Execution finished (or failed); `reset()` is required before reuse
    Done,
    /// Handle released; only `finalize()` is accepted
    Finalized,
}

/// Outcome of a single `step()`.
#[derive(Debug, Clone, PartialEq)]
pub enum StepResult {
    /// A result row is available
    Row,
    /// Execution finished; no more rows
    Done,
    /// The database is locked by another connection; retry later
    Busy,
    /// The engine reported an error; detail is also in `last_error_message()`
    Error(String),
}

impl StepResult {
    /// The script-facing name of the result, `None` for engine errors.
    pub fn as_str(&self) -> Option<&'static str> {
        match self {
            StepResult::Row => Some("row"),
            StepResult::Done => Some("done"),
            StepResult::Busy => Some("busy"),
            StepResult::Error(_) => None,
        }
    }
}

impl fmt::Display for StepResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str().unwrap_or("null"))
    }
}

/// A compiled statement bound to the connection that prepared it.
///
/// The statement borrows its connection, so the connection cannot be closed
/// or dropped while the statement is alive. Dropping the statement
/// finalizes it.
pub struct PreparedStatement<'conn> {
    conn: &'conn Connection,
    raw: Option<RawStatement<'conn>>,
    sql: String,
    parameter_count: usize,
    column_count: usize,
    state: StatementState,
    /// The engine program has been stepped since the last reset, so direct
    /// binds would be rejected.
    running: bool,
    /// Binds received while running, applied at the next reset.
    pending: BTreeMap<usize, Value>,
}

impl<'conn> PreparedStatement<'conn> {
    pub(crate) fn new(conn: &'conn Connection, raw: RawStatement<'conn>, sql: &str) -> Self {
        let parameter_count = raw.parameter_count();
        let column_count = raw.column_count();
        PreparedStatement {
            conn,
            raw: Some(raw),
            sql: sql.to_string(),
            parameter_count,
            column_count,
            state: StatementState::Ready,
            running: false,
            pending: BTreeMap::new(),
        }
    }

    fn live(&self) -> Result<&RawStatement<'conn>> {
        self.raw.as_ref().ok_or(BindingError::Finalized)
    }

    fn live_mut(&mut self) -> Result<&mut RawStatement<'conn>> {
        self.raw.as_mut().ok_or(BindingError::Finalized)
    }

    /// The SQL text the statement was prepared from.
    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn state(&self) -> StatementState {
        self.state
    }

    pub fn is_finalized(&self) -> bool {
        self.state == StatementState::Finalized
    }

    /// Advances execution by one row.
    ///
    /// Busy and engine errors are reported in the returned value; only
    /// misuse (finalized statement, stepping an exhausted statement) is an
    /// `Err`.
    pub fn step(&mut self) -> Result<StepResult> {
        if self.state == StatementState::Done {
            return Err(BindingError::State(
                "statement is done; call reset() before stepping again".to_string(),
            ));
        }
        let raw = self.live_mut()?;
        let outcome = raw.step();
        self.running = true;

        let result = match outcome {
            RawStep::Row => {
                self.state = StatementState::Row;
                StepResult::Row
            }
            RawStep::Done => {
                self.state = StatementState::Done;
                StepResult::Done
            }
            RawStep::Busy => {
                // Nothing was produced yet, so rewinding is invisible to the
                // caller and lets binds made before the retry apply directly.
                self.rewind()?;
                StepResult::Busy
            }
            RawStep::Failed(failure) => {
                warn!("step failed for `{}`: {}", self.sql, failure.message);
                self.conn.record_error(failure.message.clone());
                self.state = StatementState::Done;
                StepResult::Error(failure.message)
            }
        };
        trace!("step `{}` -> {}", self.sql, result);
        Ok(result)
    }

    /// Rewinds to the start of the result set, keeping bound values.
    ///
    /// Values bound while the statement was running take effect here.
    pub fn reset(&mut self) -> Result<()> {
        self.rewind()
    }

    /// Rewinds the engine program, then applies every queued bind. All of
    /// them are attempted; the first failure is returned.
    fn rewind(&mut self) -> Result<()> {
        let raw = self.live_mut()?;
        let rc = raw.reset();
        if rc != rusqlite::ffi::SQLITE_OK {
            debug!("reset of `{}` echoed last step code {}", self.sql, rc);
        }
        self.running = false;
        self.state = StatementState::Ready;

        let pending = std::mem::take(&mut self.pending);
        let mut first_error = None;
        for (ordinal, value) in pending {
            if let Err(e) = self.bind_now(ordinal, &value) {
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    /// Sets every parameter back to NULL without touching execution state.
    pub fn clear_bindings(&mut self) -> Result<()> {
        let raw = self.live_mut()?;
        raw.clear_bindings();
        self.pending.clear();
        Ok(())
    }

    /// Releases the compiled handle. Calling it again is a no-op.
    pub fn finalize(&mut self) {
        if let Some(raw) = self.raw.take() {
            let rc = raw.finalize();
            debug!("finalized `{}` (rc {})", self.sql, rc);
        }
        self.pending.clear();
        self.running = false;
        self.state = StatementState::Finalized;
    }

    /// Number of parameter slots, fixed at prepare time.
    pub fn bind_parameter_count(&self) -> Result<usize> {
        self.live()?;
        Ok(self.parameter_count)
    }

    /// Declared name of the parameter at a 1-based ordinal (for example
    /// `?2` or `:name`), `None` for bare `?` placeholders.
    pub fn bind_parameter_name(&self, ordinal: usize) -> Result<Option<String>> {
        let raw = self.live()?;
        self.check_ordinal(ordinal)?;
        Ok(raw.parameter_name(ordinal))
    }

    /// Ordinal of a named parameter, 0 when no parameter has that name.
    pub fn bind_parameter_index(&self, name: &str) -> Result<usize> {
        Ok(self.live()?.parameter_index(name))
    }

    /// Binds `value` at a 1-based ordinal.
    ///
    /// Binding after a step and before `reset()` is accepted; the value is
    /// held back and applied when the statement is reset.
    pub fn bind<V: Into<Value>>(&mut self, ordinal: usize, value: V) -> Result<()> {
        self.live()?;
        self.check_ordinal(ordinal)?;
        let value = value.into();
        if self.running {
            trace!("deferring bind of ?{} on `{}` until reset", ordinal, self.sql);
            self.pending.insert(ordinal, value);
            Ok(())
        } else {
            self.bind_now(ordinal, &value)
        }
    }

    fn bind_now(&mut self, ordinal: usize, value: &Value) -> Result<()> {
        let raw = self.live_mut()?;
        if let Err(failure) = raw.bind(ordinal, value) {
            self.conn.record_error(failure.message.clone());
            return Err(BindingError::Database(failure.into_rusqlite()));
        }
        Ok(())
    }

    fn check_ordinal(&self, ordinal: usize) -> Result<()> {
        if ordinal == 0 || ordinal > self.parameter_count {
            return Err(BindingError::parameter_range(ordinal, self.parameter_count));
        }
        Ok(())
    }

    /// Number of result columns, fixed at prepare time. Zero for statements
    /// that return no rows.
    pub fn column_count(&self) -> Result<usize> {
        self.live()?;
        Ok(self.column_count)
    }

    /// Name of the column at a 0-based index. Available before the first
    /// step.
    pub fn column_name(&self, index: usize) -> Result<String> {
        let raw = self.live()?;
        self.check_index(index)?;
        raw.column_name(index).ok_or_else(|| {
            BindingError::Database(rusqlite::Error::SqliteFailure(
                rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_NOMEM),
                Some(format!("no name available for column {}", index)),
            ))
        })
    }

    /// Value of the current row at a 0-based index.
    pub fn column_value(&self, index: usize) -> Result<Value> {
        let raw = self.current_row(index)?;
        Ok(raw.column_value(index))
    }

    /// Text rendering of the current row's column at a 0-based index, `None`
    /// for NULL.
    pub fn column_text(&self, index: usize) -> Result<Option<String>> {
        let raw = self.current_row(index)?;
        Ok(raw.column_text(index))
    }

    fn current_row(&self, index: usize) -> Result<&RawStatement<'conn>> {
        let raw = self.live()?;
        if self.state != StatementState::Row {
            return Err(BindingError::State(format!(
                "no current row (statement is {:?})",
                self.state
            )));
        }
        self.check_index(index)?;
        Ok(raw)
    }

    fn check_index(&self, index: usize) -> Result<()> {
        if index >= self.column_count {
            return Err(BindingError::column_range(index, self.column_count));
        }
        Ok(())
    }
}

impl fmt::Debug for PreparedStatement<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PreparedStatement")
            .field("sql", &self.sql)
            .field("state", &self.state)
            .field("parameter_count", &self.parameter_count)
            .field("column_count", &self.column_count)
            .finish()
    }
}
