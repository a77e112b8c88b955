//! Database connection and initialization.

pub use qrpass_core::db::DatabaseError;

qrpass_core::define_database!(Database, "Message store migrations complete");
