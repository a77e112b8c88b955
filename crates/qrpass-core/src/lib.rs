//! QR-Pass Core Library
//!
//! Shared functionality for QR-Pass components:
//! - base64url / JSON codec used at every textual boundary
//! - Configuration resolution and hierarchy
//! - `SQLite` pool helpers and the `define_database!` macro
//! - Common error types

pub mod codec;
pub mod config;
pub mod db;
pub mod error;
pub mod tracing_init;

pub use config::Config;
pub use error::{Error, Result};
