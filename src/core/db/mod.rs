//! Database Module
//!
//! The binding core, organized into focused submodules.
//!
//! ## Architecture
//!
//! - **Connection** (`connection.rs`): opening, plain execution, preparation, connection-scoped state
//! - **Prepared statements** (`statement.rs`): binding, stepping, column introspection
//! - **Values** (`value.rs`): the SQL value type exchanged with the engine
//! - **Raw handles** (`raw.rs`): the owned engine statement handle; the only `unsafe` code
//!
//! ## Indexing
//!
//! Parameter ordinals are 1-based, column indices are 0-based. This follows
//! the engine's C API and is kept as-is.
pub mod connection;
mod raw;
pub mod statement;
pub mod value;

pub use connection::*;
pub use statement::*;
pub use value::*;
