//! Utility modules for the backup core.

pub mod errors;
pub mod format;
pub mod logger;

pub use errors::{CoreError, Result};
