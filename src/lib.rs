//! WordPress blog poster library.
//!
//! Turns markdown drafts written in AI chat sessions into WordPress posts:
//! draft detection and rendering, an authenticated REST client with token
//! transport fallback, image rehosting, taxonomy resolution and a
//! single-consumer publishing worker.

// Allow raw string hashes for safety - they're harmless and prevent issues if content changes
#![allow(clippy::needless_raw_string_hashes)]

pub mod config;
pub mod constants;
pub mod content;
pub mod date;
pub mod feedback;
pub mod messages;
pub mod service;
pub mod settings;
pub mod wordpress;
pub mod worker;
