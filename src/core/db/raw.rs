//! Raw Statement Module
//!
//! Owned wrapper around an engine `sqlite3_stmt` handle. This is the only
//! place in the crate that touches the C API directly; everything above it
//! works with safe types. The handle is finalized exactly once, either
//! through [`RawStatement::finalize`] or on drop.

use super::value::Value;
use rusqlite::ffi;
use std::ffi::{CStr, CString};
use std::marker::PhantomData;
use std::os::raw::{c_char, c_int};
use std::ptr::{self, NonNull};

/// A failed engine call: primary result code plus the engine's message.
#[derive(Debug, Clone)]
pub(crate) struct EngineFailure {
    pub code: c_int,
    pub message: String,
}

impl EngineFailure {
    fn from_db(db: *mut ffi::sqlite3, code: c_int) -> Self {
        EngineFailure {
            code,
            message: db_errmsg(db),
        }
    }

    /// Converts the failure into the rusqlite error it corresponds to.
    pub fn into_rusqlite(self) -> rusqlite::Error {
        rusqlite::Error::SqliteFailure(ffi::Error::new(self.code), Some(self.message))
    }
}

/// Engine outcome of a single `sqlite3_step` call.
#[derive(Debug, Clone)]
pub(crate) enum RawStep {
    Row,
    Done,
    Busy,
    Failed(EngineFailure),
}

/// Reads the engine's most recent message for a database handle.
fn db_errmsg(db: *mut ffi::sqlite3) -> String {
    // SAFETY: `db` comes from a live rusqlite connection; sqlite3_errmsg
    // never returns a dangling pointer for a valid handle.
    unsafe {
        let msg = ffi::sqlite3_errmsg(db);
        if msg.is_null() {
            String::new()
        } else {
            CStr::from_ptr(msg).to_string_lossy().into_owned()
        }
    }
}

/// Returns the engine's most recent message for a connection.
pub(crate) fn connection_errmsg(conn: &rusqlite::Connection) -> String {
    // SAFETY: the handle is only read for the duration of this call.
    db_errmsg(unsafe { conn.handle() })
}

fn cstr_to_string(p: *const c_char) -> Option<String> {
    if p.is_null() {
        None
    } else {
        // SAFETY: the engine returns NUL-terminated strings that stay valid
        // until the statement is finalized or re-prepared.
        Some(unsafe { CStr::from_ptr(p) }.to_string_lossy().into_owned())
    }
}

fn to_c_int(n: usize) -> c_int {
    c_int::try_from(n).unwrap_or(c_int::MAX)
}

/// An owned compiled statement borrowed from a rusqlite connection.
pub(crate) struct RawStatement<'conn> {
    stmt: NonNull<ffi::sqlite3_stmt>,
    db: *mut ffi::sqlite3,
    _conn: PhantomData<&'conn rusqlite::Connection>,
}

impl<'conn> RawStatement<'conn> {
    /// Compiles the first statement in `sql`; anything after it is ignored.
    ///
    /// Returns `Ok(None)` when the text holds no statement at all (empty
    /// input, whitespace or comments only).
    pub fn prepare(
        conn: &'conn rusqlite::Connection,
        sql: &str,
    ) -> std::result::Result<Option<Self>, EngineFailure> {
        // SAFETY: the pointer is tied to `'conn` through PhantomData, so it
        // cannot outlive the connection it came from.
        let db = unsafe { conn.handle() };
        let len = c_int::try_from(sql.len()).map_err(|_| EngineFailure {
            code: ffi::SQLITE_TOOBIG,
            message: "SQL text too long".to_string(),
        })?;

        let mut stmt: *mut ffi::sqlite3_stmt = ptr::null_mut();
        // SAFETY: `sql` is valid for `len` bytes and the engine never reads
        // past that bound.
        let rc = unsafe {
            ffi::sqlite3_prepare_v2(
                db,
                sql.as_ptr().cast::<c_char>(),
                len,
                &mut stmt,
                ptr::null_mut(),
            )
        };
        if rc != ffi::SQLITE_OK {
            return Err(EngineFailure::from_db(db, rc));
        }

        Ok(NonNull::new(stmt).map(|stmt| RawStatement {
            stmt,
            db,
            _conn: PhantomData,
        }))
    }

    fn as_ptr(&self) -> *mut ffi::sqlite3_stmt {
        self.stmt.as_ptr()
    }

    pub fn step(&mut self) -> RawStep {
        // SAFETY: the handle is live until finalize/drop.
        let rc = unsafe { ffi::sqlite3_step(self.as_ptr()) };
        // Connections opened by rusqlite report extended codes.
        match rc & 0xff {
            ffi::SQLITE_ROW => RawStep::Row,
            ffi::SQLITE_DONE => RawStep::Done,
            ffi::SQLITE_BUSY => RawStep::Busy,
            _ => RawStep::Failed(EngineFailure::from_db(self.db, rc)),
        }
    }

    /// Rewinds the statement. The returned code echoes the last step's
    /// failure, if any; the rewind itself always happens.
    pub fn reset(&mut self) -> c_int {
        // SAFETY: the handle is live until finalize/drop.
        unsafe { ffi::sqlite3_reset(self.as_ptr()) }
    }

    pub fn clear_bindings(&mut self) -> c_int {
        // SAFETY: the handle is live until finalize/drop.
        unsafe { ffi::sqlite3_clear_bindings(self.as_ptr()) }
    }

    pub fn parameter_count(&self) -> usize {
        // SAFETY: the handle is live until finalize/drop.
        let n = unsafe { ffi::sqlite3_bind_parameter_count(self.as_ptr()) };
        usize::try_from(n).unwrap_or(0)
    }

    pub fn parameter_name(&self, ordinal: usize) -> Option<String> {
        // SAFETY: out-of-range ordinals make the engine return NULL.
        cstr_to_string(unsafe {
            ffi::sqlite3_bind_parameter_name(self.as_ptr(), to_c_int(ordinal))
        })
    }

    pub fn parameter_index(&self, name: &str) -> usize {
        let Ok(name) = CString::new(name) else {
            return 0;
        };
        // SAFETY: `name` is NUL-terminated and outlives the call.
        let n = unsafe { ffi::sqlite3_bind_parameter_index(self.as_ptr(), name.as_ptr()) };
        usize::try_from(n).unwrap_or(0)
    }

    /// Binds `value` at a 1-based ordinal. Text and blobs are copied by the
    /// engine before this returns.
    pub fn bind(&mut self, ordinal: usize, value: &Value) -> std::result::Result<(), EngineFailure> {
        let stmt = self.as_ptr();
        let i = to_c_int(ordinal);
        // SAFETY: SQLITE_TRANSIENT makes the engine copy the buffers, so the
        // borrowed data only has to live for the duration of the call.
        let rc = unsafe {
            match value {
                Value::Null => ffi::sqlite3_bind_null(stmt, i),
                Value::Integer(v) => ffi::sqlite3_bind_int64(stmt, i, *v),
                Value::Real(v) => ffi::sqlite3_bind_double(stmt, i, *v),
                Value::Text(s) => match c_int::try_from(s.len()) {
                    Ok(len) => ffi::sqlite3_bind_text(
                        stmt,
                        i,
                        s.as_ptr().cast::<c_char>(),
                        len,
                        ffi::SQLITE_TRANSIENT(),
                    ),
                    Err(_) => ffi::SQLITE_TOOBIG,
                },
                Value::Blob(b) if b.is_empty() => ffi::sqlite3_bind_zeroblob(stmt, i, 0),
                Value::Blob(b) => match c_int::try_from(b.len()) {
                    Ok(len) => ffi::sqlite3_bind_blob(
                        stmt,
                        i,
                        b.as_ptr().cast(),
                        len,
                        ffi::SQLITE_TRANSIENT(),
                    ),
                    Err(_) => ffi::SQLITE_TOOBIG,
                },
            }
        };
        if rc == ffi::SQLITE_OK {
            Ok(())
        } else {
            Err(EngineFailure::from_db(self.db, rc))
        }
    }

    pub fn column_count(&self) -> usize {
        // SAFETY: the handle is live until finalize/drop.
        let n = unsafe { ffi::sqlite3_column_count(self.as_ptr()) };
        usize::try_from(n).unwrap_or(0)
    }

    pub fn column_name(&self, index: usize) -> Option<String> {
        // SAFETY: callers range-check `index`; NULL only on allocation failure.
        cstr_to_string(unsafe { ffi::sqlite3_column_name(self.as_ptr(), to_c_int(index)) })
    }

    /// Reads the current row's value at `index`. Only meaningful right after
    /// a step that produced a row.
    pub fn column_value(&self, index: usize) -> Value {
        let stmt = self.as_ptr();
        let i = to_c_int(index);
        // SAFETY: the pointers returned by column_text/column_blob are valid
        // until the next step/reset/finalize, and are copied out here before
        // any of those can run.
        unsafe {
            match ffi::sqlite3_column_type(stmt, i) {
                ffi::SQLITE_NULL => Value::Null,
                ffi::SQLITE_INTEGER => Value::Integer(ffi::sqlite3_column_int64(stmt, i)),
                ffi::SQLITE_FLOAT => Value::Real(ffi::sqlite3_column_double(stmt, i)),
                ffi::SQLITE_BLOB => {
                    let data = ffi::sqlite3_column_blob(stmt, i);
                    let len = usize::try_from(ffi::sqlite3_column_bytes(stmt, i)).unwrap_or(0);
                    if data.is_null() || len == 0 {
                        Value::Blob(Vec::new())
                    } else {
                        Value::Blob(std::slice::from_raw_parts(data.cast::<u8>(), len).to_vec())
                    }
                }
                _ => Value::Text(self.read_text(i).unwrap_or_default()),
            }
        }
    }

    /// The engine's text rendering of the column, `None` for NULL.
    pub fn column_text(&self, index: usize) -> Option<String> {
        let i = to_c_int(index);
        // SAFETY: see `column_value`.
        unsafe {
            if ffi::sqlite3_column_type(self.as_ptr(), i) == ffi::SQLITE_NULL {
                None
            } else {
                self.read_text(i)
            }
        }
    }

    unsafe fn read_text(&self, i: c_int) -> Option<String> {
        let stmt = self.as_ptr();
        let text = ffi::sqlite3_column_text(stmt, i);
        if text.is_null() {
            return None;
        }
        let len = usize::try_from(ffi::sqlite3_column_bytes(stmt, i)).unwrap_or(0);
        let bytes = std::slice::from_raw_parts(text, len);
        Some(String::from_utf8_lossy(bytes).into_owned())
    }

    /// Releases the handle now and returns the engine's result code.
    pub fn finalize(self) -> c_int {
        let stmt = self.stmt;
        std::mem::forget(self);
        // SAFETY: `self` was forgotten, so Drop will not finalize again.
        unsafe { ffi::sqlite3_finalize(stmt.as_ptr()) }
    }
}

impl Drop for RawStatement<'_> {
    fn drop(&mut self) {
        // SAFETY: the handle has not been finalized (finalize() forgets self).
        unsafe {
            ffi::sqlite3_finalize(self.as_ptr());
        }
    }
}
