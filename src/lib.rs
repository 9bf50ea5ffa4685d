// Core infrastructure modules
pub mod core;

// Feature-specific modules
pub mod config;
pub mod smoke;

#[cfg(test)]
mod integration_tests;
#[cfg(test)]
mod test_utils;

pub use crate::core::db::{
    Connection, OpenOptions, PreparedStatement, StatementState, StepResult, Value,
};
pub use crate::core::{BindingError, Result};
