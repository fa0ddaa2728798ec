//! Telegram client wrapper module.
//!
//! Provides high-level abstractions for interacting with Telegram:
//! authentication, member scraping, invites, messaging and the
//! @SpamBot status check.

mod client;

pub use client::{
    PwdToken as PasswordToken, ScrapedMember, TelegramError, TelegramOps, Token as LoginToken,
};
