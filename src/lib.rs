//! Group Ops Bot Library
//!
//! A Telegram console for account operations: login, member scraping,
//! throttled mass-adding, messaging and spam-status checks.
//!
//! This crate provides the core functionality for:
//! - Managing per-account grammers sessions keyed by phone number
//! - Connecting to Telegram via `MTProto`
//! - Pacing batch actions with a jittered delay policy and flood-wait
//!   cooldowns
//! - Classifying per-item failures and halting runs that look unsafe

pub mod batch;
pub mod config;
pub mod ops;
pub mod session;
pub mod telegram;
