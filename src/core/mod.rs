//! Core Module
//!
//! The connection and prepared-statement binding plus the error type shared
//! across the crate.

pub mod db;
pub mod error;

// Re-export commonly used types for convenience
pub use error::{BindingError, Result};
