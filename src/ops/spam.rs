//! Account restriction check via @SpamBot.

use tracing::info;

use crate::telegram::{TelegramError, TelegramOps};

/// What @SpamBot's reply says about the account.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpamVerdict {
    /// No restrictions reported.
    Clean,

    /// The account is limited or restricted.
    Restricted,

    /// The reply did not match any known phrasing.
    Unknown,
}

/// Result of a spam status check.
#[derive(Debug, Clone)]
pub struct SpamStatus {
    /// The bot's reply, verbatim.
    pub raw: String,

    /// Interpretation of the reply.
    pub verdict: SpamVerdict,
}

/// Interprets a @SpamBot reply.
///
/// The bot answers in prose, so this is a phrase match on the wordings
/// it has used for years. Anything unrecognized is reported as such
/// rather than guessed at.
#[must_use]
pub fn interpret_spam_reply(reply: &str) -> SpamVerdict {
    let lower = reply.to_lowercase();

    if lower.contains("no limits") || lower.contains("free as a bird") || lower.contains("good news")
    {
        return SpamVerdict::Clean;
    }

    if lower.contains("restrict") || lower.contains("limited until") || lower.contains("banned") {
        return SpamVerdict::Restricted;
    }

    SpamVerdict::Unknown
}

/// Asks @SpamBot about the account and interprets the reply.
///
/// # Errors
///
/// Returns an error if not authorized or the exchange fails.
pub async fn check_spam(tg: &TelegramOps) -> Result<SpamStatus, TelegramError> {
    let raw = tg.spam_status().await?;
    let verdict = interpret_spam_reply(&raw);

    info!("Spam check verdict: {:?}", verdict);
    Ok(SpamStatus { raw, verdict })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_reply() {
        assert_eq!(
            interpret_spam_reply("Good news, no limits are currently applied to your account."),
            SpamVerdict::Clean
        );
        assert_eq!(
            interpret_spam_reply("You're free as a bird!"),
            SpamVerdict::Clean
        );
    }

    #[test]
    fn test_restricted_reply() {
        assert_eq!(
            interpret_spam_reply(
                "I'm afraid your account is limited until 2026-01-01. Some actions are restricted."
            ),
            SpamVerdict::Restricted
        );
    }

    #[test]
    fn test_unknown_reply() {
        assert_eq!(interpret_spam_reply(""), SpamVerdict::Unknown);
        assert_eq!(
            interpret_spam_reply("Please choose an option below."),
            SpamVerdict::Unknown
        );
    }
}
