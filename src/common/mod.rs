//! Common types and utilities shared by the IDML layers.
//!
//! This module provides the unified error type, XML event plumbing and
//! event id generation.

// Submodule declarations
pub mod error;
pub mod id;
pub mod xml;

// Re-exports for convenience
pub use error::{Error, Result};
pub use id::{IdGenerator, root_id};
