//! Telegram client wrapper for group operations.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use grammers_client::client::{LoginToken, PasswordToken};
use grammers_client::types::Chat;
use grammers_client::{Client, InvocationError, SenderPool, SignInError, sender};
use grammers_session::storages::SqliteSession;
use grammers_tl_types as tl;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::batch::{ActionError, extract_flood_wait_seconds};
use crate::config::TelegramConfig;

/// Re-export types for external use.
pub use grammers_client::client::{LoginToken as Token, PasswordToken as PwdToken};

/// Errors that can occur during Telegram operations.
#[derive(Debug, Error)]
pub enum TelegramError {
    #[error("Not authorized. Please sign in first.")]
    NotAuthorized,

    #[error("Sign in failed: {0}")]
    SignInFailed(String),

    #[error("Password required for 2FA")]
    PasswordRequired(PasswordToken),

    #[error("Invalid password")]
    InvalidPassword(PasswordToken),

    #[error("Group or channel not found: {0}")]
    GroupNotFound(String),

    #[error("User not found: {0}")]
    UserNotFound(String),

    #[error("Target is not a channel or supergroup: {0}")]
    NotAChannel(String),

    #[error("Flood wait required: {0} seconds")]
    FloodWait(u32),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Session error: {0}")]
    Session(String),

    #[error("API invocation error: {0}")]
    Invocation(String),
}

impl From<InvocationError> for TelegramError {
    fn from(err: InvocationError) -> Self {
        let err_str = err.to_string();

        // Check for flood wait errors
        if (err_str.contains("FLOOD_WAIT") || err_str.contains("flood"))
            && let Some(seconds) = extract_flood_wait_seconds(&err_str)
        {
            return Self::FloodWait(seconds);
        }

        Self::Invocation(err_str)
    }
}

impl From<TelegramError> for ActionError {
    fn from(err: TelegramError) -> Self {
        // Keep the machine-readable flood tag so the classifier can
        // recover the wait hint from the reason string.
        match err {
            TelegramError::FloodWait(seconds) => Self::new(format!("FLOOD_WAIT_{seconds}")),
            other => Self::new(other.to_string()),
        }
    }
}

/// A group member captured by a scrape.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScrapedMember {
    /// Telegram user ID.
    pub id: i64,

    /// Public username, when the member has one.
    pub username: Option<String>,

    /// First name as shown in the profile.
    pub first_name: String,

    /// Last name, when set.
    pub last_name: Option<String>,
}

/// High-level Telegram client for one account.
pub struct TelegramOps {
    /// The underlying grammers client.
    client: Client,

    /// Handle to the sender pool for disconnection.
    handle: sender::SenderPoolHandle,

    /// Background task running the sender pool.
    _pool_task: JoinHandle<()>,
}

impl TelegramOps {
    /// Connects to Telegram using the given account session file.
    ///
    /// # Errors
    ///
    /// Returns an error if the session cannot be opened or the
    /// connection fails.
    pub async fn connect(
        config: &TelegramConfig,
        session_path: &Path,
    ) -> Result<Self, TelegramError> {
        info!("Connecting to Telegram...");

        let session = Arc::new(
            SqliteSession::open(session_path)
                .await
                .map_err(|e| TelegramError::Session(e.to_string()))?,
        );

        let SenderPool {
            runner,
            updates: _updates,
            handle,
        } = SenderPool::new(Arc::clone(&session), config.api_id);

        let client = Client::new(handle.clone());

        // Spawn the sender pool runner
        let pool_task = tokio::spawn(async move {
            runner.run().await;
        });

        let is_authorized = client
            .is_authorized()
            .await
            .map_err(|e| TelegramError::Connection(e.to_string()))?;

        info!("Connected to Telegram. Authorized: {}", is_authorized);

        Ok(Self {
            client,
            handle: handle.thin,
            _pool_task: pool_task,
        })
    }

    /// Checks if the client is authorized.
    ///
    /// # Errors
    ///
    /// Returns an error if the check fails.
    pub async fn is_authorized(&self) -> Result<bool, TelegramError> {
        self.client
            .is_authorized()
            .await
            .map_err(|e| TelegramError::Connection(e.to_string()))
    }

    /// Requests a login code to be sent to the phone number.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn request_login_code(
        &self,
        phone: &str,
        api_hash: &str,
    ) -> Result<LoginToken, TelegramError> {
        info!("Requesting login code for phone: {}...", mask_phone(phone));

        self.client
            .request_login_code(phone, api_hash)
            .await
            .map_err(|e| TelegramError::SignInFailed(e.to_string()))
    }

    /// Signs in with the login code.
    ///
    /// # Errors
    ///
    /// Returns an error if sign in fails.
    pub async fn sign_in(&self, token: &LoginToken, code: &str) -> Result<(), TelegramError> {
        info!("Signing in with login code...");

        match self.client.sign_in(token, code).await {
            Ok(_user) => {
                info!("Successfully signed in!");
                Ok(())
            }
            Err(SignInError::PasswordRequired(password_token)) => {
                debug!("2FA password required, hint: {:?}", password_token.hint());
                Err(TelegramError::PasswordRequired(password_token))
            }
            Err(SignInError::InvalidCode) => {
                Err(TelegramError::SignInFailed("Invalid code".to_owned()))
            }
            Err(e) => Err(TelegramError::SignInFailed(e.to_string())),
        }
    }

    /// Checks the 2FA password.
    ///
    /// # Errors
    ///
    /// Returns an error if the password is invalid.
    pub async fn check_password(
        &self,
        password_token: PasswordToken,
        password: &str,
    ) -> Result<(), TelegramError> {
        info!("Checking 2FA password...");

        match self.client.check_password(password_token, password).await {
            Ok(_user) => {
                info!("Successfully authenticated with 2FA!");
                Ok(())
            }
            Err(SignInError::InvalidPassword(token)) => Err(TelegramError::InvalidPassword(token)),
            Err(e) => Err(TelegramError::SignInFailed(e.to_string())),
        }
    }

    /// Resolves a group link or `@name` to a chat.
    ///
    /// # Errors
    ///
    /// Returns an error if the group cannot be found.
    pub async fn resolve_group(&self, link: &str) -> Result<Chat, TelegramError> {
        let name = normalize_username(link);
        debug!("Resolving group '{}'", name);

        self.client
            .resolve_username(&name)
            .await
            .map_err(TelegramError::from)?
            .ok_or_else(|| TelegramError::GroupNotFound(link.to_owned()))
    }

    /// Fetches up to `limit` members of a group.
    ///
    /// Members without a public username are kept; callers decide what
    /// to do with them.
    ///
    /// # Errors
    ///
    /// Returns an error if not authorized or the listing fails.
    pub async fn scrape_members(
        &self,
        group: &str,
        limit: usize,
    ) -> Result<Vec<ScrapedMember>, TelegramError> {
        if !self.is_authorized().await? {
            return Err(TelegramError::NotAuthorized);
        }

        let chat = self.resolve_group(group).await?;
        info!("Scraping up to {} members from '{}'", limit, chat.name());

        let mut members = Vec::new();
        let mut participants = self.client.iter_participants(chat.pack()).limit(limit);

        while let Some(participant) = participants.next().await.map_err(TelegramError::from)? {
            let user = participant.user;
            members.push(ScrapedMember {
                id: user.id(),
                username: user.username().map(str::to_owned),
                first_name: user.first_name().to_owned(),
                last_name: user.last_name().map(str::to_owned),
            });
        }

        info!("Scraped {} members", members.len());
        Ok(members)
    }

    /// Invites one user, by username, into a channel or supergroup.
    ///
    /// One user per call: batch pacing is the executor's job, and
    /// multi-user invites burn the whole batch on one bad member.
    ///
    /// # Errors
    ///
    /// Returns an error with the transport's reason tag on rejection.
    pub async fn invite_to_group(
        &self,
        group: &Chat,
        username: &str,
    ) -> Result<(), TelegramError> {
        let channel = group
            .pack()
            .try_to_input_channel()
            .ok_or_else(|| TelegramError::NotAChannel(group.name().to_owned()))?;

        let user_chat = self
            .client
            .resolve_username(&normalize_username(username))
            .await
            .map_err(TelegramError::from)?
            .ok_or_else(|| TelegramError::UserNotFound(username.to_owned()))?;

        let user = user_chat
            .pack()
            .try_to_input_user()
            .ok_or_else(|| TelegramError::UserNotFound(username.to_owned()))?;

        let request = tl::functions::channels::InviteToChannel {
            channel,
            users: vec![user],
        };

        self.client
            .invoke(&request)
            .await
            .map(|_| ())
            .map_err(TelegramError::from)
    }

    /// Sends a direct message to a user or chat by username.
    ///
    /// # Errors
    ///
    /// Returns an error with the transport's reason tag on rejection.
    pub async fn send_direct_message(
        &self,
        target: &str,
        text: &str,
    ) -> Result<(), TelegramError> {
        let chat = self
            .client
            .resolve_username(&normalize_username(target))
            .await
            .map_err(TelegramError::from)?
            .ok_or_else(|| TelegramError::UserNotFound(target.to_owned()))?;

        debug!("Sending message to '{}'", chat.name());

        self.client
            .send_message(chat.pack(), text)
            .await
            .map(|_msg| ())
            .map_err(TelegramError::from)
    }

    /// Asks @SpamBot about the account's restriction status and returns
    /// its reply verbatim.
    ///
    /// # Errors
    ///
    /// Returns an error if not authorized or the exchange fails.
    pub async fn spam_status(&self) -> Result<String, TelegramError> {
        if !self.is_authorized().await? {
            return Err(TelegramError::NotAuthorized);
        }

        let bot = self
            .client
            .resolve_username("SpamBot")
            .await
            .map_err(TelegramError::from)?
            .ok_or_else(|| TelegramError::UserNotFound("SpamBot".to_owned()))?;

        self.client
            .send_message(bot.pack(), "/start")
            .await
            .map_err(TelegramError::from)?;

        // Give the bot a moment to answer before reading the chat back.
        tokio::time::sleep(Duration::from_secs(2)).await;

        let mut messages = self.client.iter_messages(bot.pack()).limit(1);
        match messages.next().await.map_err(TelegramError::from)? {
            Some(message) => Ok(message.text().to_owned()),
            None => {
                warn!("No reply from @SpamBot");
                Ok(String::new())
            }
        }
    }

    /// Returns a reference to the underlying client for advanced operations.
    #[must_use]
    pub fn inner(&self) -> &Client {
        &self.client
    }

    /// Disconnects from Telegram.
    pub fn disconnect(&self) {
        info!("Disconnecting from Telegram...");
        self.handle.quit();
    }
}

impl std::fmt::Debug for TelegramOps {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramOps").finish_non_exhaustive()
    }
}

/// Strips link prefixes and `@` so resolution gets a bare username.
fn normalize_username(raw: &str) -> String {
    let trimmed = raw.trim();
    let stripped = trimmed
        .strip_prefix("https://t.me/")
        .or_else(|| trimmed.strip_prefix("http://t.me/"))
        .or_else(|| trimmed.strip_prefix("t.me/"))
        .unwrap_or(trimmed);
    stripped.trim_start_matches('@').trim_end_matches('/').to_owned()
}

/// Masks a phone number for logging (shows last 4 digits).
fn mask_phone(phone: &str) -> String {
    let digits: String = phone.chars().filter(char::is_ascii_digit).collect();
    if digits.len() > 4 {
        format!("***{}", &digits[digits.len() - 4..])
    } else {
        "****".to_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_phone() {
        assert_eq!(mask_phone("+1234567890"), "***7890");
        assert_eq!(mask_phone("123"), "****");
        assert_eq!(mask_phone("+7 (999) 123-45-67"), "***4567");
    }

    #[test]
    fn test_normalize_username() {
        assert_eq!(normalize_username("@some_group"), "some_group");
        assert_eq!(normalize_username("https://t.me/some_group"), "some_group");
        assert_eq!(normalize_username("t.me/some_group/"), "some_group");
        assert_eq!(normalize_username("  plain_name "), "plain_name");
    }

    #[test]
    fn test_flood_wait_becomes_tagged_action_error() {
        let err: ActionError = TelegramError::FloodWait(45).into();
        assert_eq!(err.reason, "FLOOD_WAIT_45");
    }

    #[test]
    fn test_connection_error_keeps_prefix() {
        let err: ActionError = TelegramError::Connection("reset by peer".to_owned()).into();
        assert!(err.reason.starts_with("Connection error"));
    }

    #[test]
    fn test_scraped_member_json_roundtrip() {
        let member = ScrapedMember {
            id: 42,
            username: Some("alice".to_owned()),
            first_name: "Alice".to_owned(),
            last_name: None,
        };

        let json = serde_json::to_string(&member).expect("serialize");
        let back: ScrapedMember = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, member);
    }
}
