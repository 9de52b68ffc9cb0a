//! # Locus Common Library
//!
//! Shared code for the Locus location service and beacon agent:
//! - Error and result types
//! - Configuration loading
//! - Telemetry wire types (beacon -> server)
//! - Broadcast event types (server -> observers)
//! - Database schema initialization
//! - Time helpers

pub mod config;
#[cfg(feature = "sqlx")]
pub mod db;
pub mod error;
pub mod events;
pub mod telemetry;
pub mod time;

pub use error::{Error, Result};
