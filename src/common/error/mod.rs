//! Unified error types for the Longan library.
//!
//! This module provides a single error type covering package access, XML
//! parsing, configuration and referential integrity failures.

// Submodule declarations
pub mod conversions;
pub mod types;

// Re-exports
pub use types::{Error, Result};
