//! # taskbell-channels
//!
//! Messaging platform integrations for Taskbell.

pub mod telegram;
