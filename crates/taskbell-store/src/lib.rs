//! # taskbell-store
//!
//! Persistent user and task store for taskbell (SQLite-backed).

pub mod store;

pub use store::Store;
