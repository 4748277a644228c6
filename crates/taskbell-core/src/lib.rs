//! # taskbell-core
//!
//! Core types, traits, configuration, and error handling for taskbell.

pub mod config;
pub mod deadline;
pub mod error;
pub mod message;
pub mod model;
pub mod traits;
