//! # Test Utilities Module
//!
//! Testing infrastructure for the binding:
//! - File-backed database fixtures in a private temporary directory
//! - Error assertion helpers for `BindingError`
//! - Row collection helpers for prepared statements

use crate::core::db::{Connection, OpenOptions, PreparedStatement, StepResult, Value};
use crate::core::Result;
use std::path::PathBuf;
use tempfile::TempDir;

/// Isolated on-disk database fixture.
///
/// The directory (and the database in it) is removed when the fixture drops.
pub struct DatabaseFixture {
    pub name: String,
    pub path: PathBuf,
    _dir: TempDir,
}

impl DatabaseFixture {
    /// Creates an empty fixture; the database file appears on first open.
    pub fn new(name: &str) -> Result<Self> {
        let dir = TempDir::new()?;
        let path = dir.path().join(format!("{}.db", name));
        Ok(DatabaseFixture {
            name: name.to_string(),
            path,
            _dir: dir,
        })
    }

    /// Fixture whose database already holds table `t (a, b, c)` with two rows.
    pub fn with_sample_table(name: &str) -> Result<Self> {
        let fixture = Self::new(name)?;
        let mut conn = fixture.open()?;
        let created = conn.execute(
            "
            create table t (a, b, c);
            insert into t values (1, 2, 3);
            insert into t values ('x', 2.5, x'0102');
            ",
        )?;
        assert!(created, "sample schema failed: {}", conn.last_error_message()?);
        conn.close()?;
        Ok(fixture)
    }

    pub fn path_str(&self) -> &str {
        self.path.to_str().unwrap_or_default()
    }

    /// Opens a new connection to the fixture database.
    pub fn open(&self) -> Result<Connection> {
        Connection::open(self.path_str())
    }

    pub fn open_with(&self, options: &OpenOptions) -> Result<Connection> {
        Connection::open_with(self.path_str(), options)
    }
}

/// Steps `st` to completion and returns every row's values.
pub fn collect_rows(st: &mut PreparedStatement<'_>) -> Result<Vec<Vec<Value>>> {
    let columns = st.column_count()?;
    let mut rows = Vec::new();
    loop {
        match st.step()? {
            StepResult::Row => {
                let row = (0..columns)
                    .map(|i| st.column_value(i))
                    .collect::<Result<Vec<_>>>()?;
                rows.push(row);
            }
            StepResult::Done => return Ok(rows),
            other => panic!("unexpected step result {:?} for `{}`", other, st.sql()),
        }
    }
}

/// Error testing utilities specific to BindingError patterns
pub mod error_testing {
    /// Test that a result is an error matching a predicate
    pub fn assert_error_type<T, E>(
        result: &std::result::Result<T, E>,
        expected_variant: fn(&E) -> bool,
        message: &str,
    ) {
        if let Err(ref err) = result {
            assert!(expected_variant(err), "{}", message);
        } else {
            panic!("Expected error but got Ok: {}", message);
        }
    }

    /// Verify error message quality (non-empty and says what went wrong)
    pub fn verify_error_message_quality(message: &str, context: &str) {
        assert!(!message.is_empty(), "Error message should not be empty in {}", context);
        assert!(message.len() > 10, "Error message should be descriptive in {}", context);
    }
}
