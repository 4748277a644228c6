//! # taskbell-providers
//!
//! AI task breakdown providers for Taskbell.

pub mod openai;
