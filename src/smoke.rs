//! Smoke scenario exercising the whole binding surface against one database.
//!
//! Creates table `t (a, b, c)`, inserts a literal row, inspects a numbered
//! parameter insert, then selects everything back. The transcript is written
//! line by line to the given writer.

use crate::core::db::{Connection, StepResult};
use crate::core::Result;
use std::io::Write;
use tracing::{info, warn};

/// What the scenario observed, for callers that want more than the transcript.
#[derive(Debug, Clone, PartialEq)]
pub struct SmokeReport {
    /// Whether `create table` succeeded (false when the table already existed)
    pub created_table: bool,
    /// Result of stepping the literal insert
    pub insert_step: StepResult,
    pub last_insert_rowid: i64,
    pub column_names: Vec<String>,
    /// Rows returned by the final select
    pub rows: usize,
    /// The step result that ended the select loop
    pub final_step: StepResult,
}

/// Runs the scenario against `db`, writing the transcript to `out`.
pub fn run_smoke<W: Write>(db: &Connection, out: &mut W) -> Result<SmokeReport> {
    info!("Running smoke scenario against {}", db.name());
    writeln!(out, "sqlite3 test")?;

    let created_table = db.execute("create table t (a, b, c);")?;
    if !created_table {
        let message = db.last_error_message()?;
        warn!("create table failed: {}", message);
        writeln!(out, "{}", message)?;
    }

    let mut st = db.prepare("insert into t (a, b, c) values (1, 2, 3);")?;
    writeln!(out, "bind parameter count = {}", st.bind_parameter_count()?)?;
    let insert_step = st.step()?;
    writeln!(out, "step result = {}", insert_step)?;
    st.reset()?;
    st.clear_bindings()?;
    st.finalize();
    let last_insert_rowid = db.last_insert_rowid()?;
    writeln!(out, "last insert rowid = {}", last_insert_rowid)?;

    let mut st = db.prepare("insert into t (a, b, c) values (?1, ?2, ?3);")?;
    writeln!(out, "bind parameter count = {}", st.bind_parameter_count()?)?;
    // Parameters count from 1.
    writeln!(out, "{}", st.bind_parameter_name(1)?.unwrap_or_default())?;
    writeln!(out, "{}", st.bind_parameter_index("?2")?)?;
    writeln!(out, "{}", st.column_count()?)?;
    st.bind(1, ())?;
    st.bind(2, ())?;
    st.bind(3, ())?;
    st.finalize();

    writeln!(out, "select")?;
    let mut st = db.prepare("select * from t;")?;
    st.step()?;
    let column_count = st.column_count()?;
    writeln!(out, "{}", column_count)?;
    writeln!(out, "begin column names...")?;
    // Columns count from 0.
    let mut column_names = Vec::with_capacity(column_count);
    for i in 0..column_count {
        let name = st.column_name(i)?;
        writeln!(out, "{}", name)?;
        column_names.push(name);
    }
    writeln!(out, "... end column names")?;

    st.reset()?;
    let mut rows = 0;
    let final_step = loop {
        let step = st.step()?;
        if step != StepResult::Row {
            break step;
        }
        rows += 1;
        let values = (0..column_count)
            .map(|i| st.column_value(i).map(|v| v.to_string()))
            .collect::<Result<Vec<_>>>()?;
        writeln!(out, "row {}", values.join(" "))?;
    };
    writeln!(out, "{}", final_step)?;
    st.finalize();

    Ok(SmokeReport {
        created_table,
        insert_step,
        last_insert_rowid,
        column_names,
        rows,
        final_step,
    })
}
