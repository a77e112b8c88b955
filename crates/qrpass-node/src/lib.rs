//! QR-Pass node library
//!
//! Everything one device needs to take part in a QR-Pass exchange:
//! - Beacon/response payloads and the scan classification state machine
//! - SQLite message store for encounters and carried messages
//! - Store-and-forward delivery decisions (gossip)
//! - Sealing and opening notes for a peer

pub mod error;
pub mod exchange;
pub mod gossip;
pub mod service;
pub mod storage;

pub use error::{NodeError, Result};
