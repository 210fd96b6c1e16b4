//! AppTest Common Library
//!
//! Shared errors, configuration and address types used by the data model
//! and by provider implementations.

pub mod config;
pub mod error;
pub mod types;

pub use config::EngineConfig;
pub use error::{Error, Result};
pub use types::{ItemPath, PropertyEnvelope};

/// AppTest version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
