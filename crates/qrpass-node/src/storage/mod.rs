//! `SQLite` storage for QR-Pass.
//!
//! Provides persistence for encounters (peers seen) and messages carried
//! for or received from them.

mod db;
mod models;
mod queries;

pub use db::{Database, DatabaseError};
pub use models::*;
