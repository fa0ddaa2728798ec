//! Group Ops Bot - Main Entry Point
//!
//! A Telegram console for account operations: login, member scraping,
//! throttled mass-adding, messaging and spam-status checks.

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use dialoguer::{Input, Password};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use group_ops_bot::batch::CancelToken;
use group_ops_bot::config::{OpsSettings, TelegramConfig};
use group_ops_bot::ops;
use group_ops_bot::session::SessionRegistry;
use group_ops_bot::telegram::{ScrapedMember, TelegramError, TelegramOps};

/// Telegram console for member scraping, throttled mass-adding and messaging.
#[derive(Parser, Debug)]
#[command(name = "group_ops")]
#[command(about = "Operate Telegram accounts: scrape, add members, message, spam-check")]
#[command(version)]
struct Args {
    /// Path to the .env file for environment variables.
    #[arg(long, default_value = ".env")]
    env_file: String,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short, long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Log an account in and register its session.
    Login {
        /// Phone number with country code.
        #[arg(short, long)]
        phone: String,
    },

    /// Remove an account's session from the registry.
    Logout {
        /// Phone number the account was registered under.
        #[arg(short, long)]
        phone: String,
    },

    /// List registered account sessions.
    Sessions,

    /// Scrape members of a group into a JSON file.
    Scrape {
        /// Phone number of the account to use.
        #[arg(short, long)]
        phone: String,

        /// Group link or @username to scrape.
        #[arg(short, long)]
        group: String,

        /// Maximum number of members to fetch.
        #[arg(long, default_value_t = 500)]
        limit: usize,

        /// Output file for the scraped members.
        #[arg(short, long, default_value = "members.json")]
        output: PathBuf,
    },

    /// Add previously scraped members to a target group.
    AddMembers {
        /// Phone number of the account to use.
        #[arg(short, long)]
        phone: String,

        /// Target group link or @username.
        #[arg(short, long)]
        group: String,

        /// JSON file with scraped members.
        #[arg(short, long, default_value = "members.json")]
        members: PathBuf,
    },

    /// Send a direct message to one or more targets.
    SendMessage {
        /// Phone number of the account to use.
        #[arg(short, long)]
        phone: String,

        /// Target @username (repeatable).
        #[arg(short, long = "target")]
        targets: Vec<String>,

        /// File with one target username per line.
        #[arg(long)]
        targets_file: Option<PathBuf>,

        /// Message text to send.
        #[arg(short, long)]
        message: String,
    },

    /// Ask @SpamBot whether the account is restricted.
    SpamCheck {
        /// Phone number of the account to use.
        #[arg(short, long)]
        phone: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    init_logging(&args.log_level);

    // Load environment variables
    if let Err(e) = dotenvy::from_filename(&args.env_file) {
        debug!("Could not load .env file ({}): {}", args.env_file, e);
    }

    let config = TelegramConfig::from_env()
        .context("Failed to load Telegram configuration from environment")?;
    let settings = OpsSettings::from_env_with_defaults();

    let mut registry = SessionRegistry::load(&config.sessions_dir)
        .context("Failed to open the session registry")?;

    match args.command {
        Command::Login { phone } => login(&config, &mut registry, &phone).await,
        Command::Logout { phone } => {
            let record = registry.remove(&phone)?;
            info!("Removed session for {}", record.phone);
            Ok(())
        }
        Command::Sessions => {
            if registry.list().is_empty() {
                println!("No sessions registered. Run 'group_ops login' first.");
            }
            for record in registry.list() {
                println!(
                    "{}  (api_id {}, since {})",
                    record.phone,
                    record.api_id,
                    record.created_at.format("%Y-%m-%d")
                );
            }
            Ok(())
        }
        Command::Scrape {
            phone,
            group,
            limit,
            output,
        } => {
            let tg = connect_account(&config, &registry, &phone).await?;
            let result = scrape(&tg, &group, limit, &output).await;
            tg.disconnect();
            result
        }
        Command::AddMembers {
            phone,
            group,
            members,
        } => {
            let list = read_members(&members)?;
            let tg = connect_account(&config, &registry, &phone).await?;
            let cancel = cancel_on_ctrl_c();

            let result = ops::add_members(&tg, &group, &list, &settings, cancel)
                .await
                .context("Adding members failed");
            tg.disconnect();

            let report = result?;
            println!(
                "Added {}/{} members ({} failed, {} skipped)",
                report.succeeded(),
                report.run.items.len(),
                report.failed(),
                report.skipped_count()
            );
            if let Some(reason) = &report.run.halt_reason {
                println!("Run halted early: {reason}");
            }
            Ok(())
        }
        Command::SendMessage {
            phone,
            targets,
            targets_file,
            message,
        } => {
            let targets = collect_targets(targets, targets_file.as_deref())?;
            if targets.is_empty() {
                bail!("No targets given. Use --target or --targets-file.");
            }

            let tg = connect_account(&config, &registry, &phone).await?;
            let cancel = cancel_on_ctrl_c();

            let report = ops::send_messages(&tg, &targets, &message, &settings, cancel).await;
            tg.disconnect();

            println!(
                "Sent {}/{} messages ({} failed, {} skipped)",
                report.succeeded(),
                report.run.items.len(),
                report.failed(),
                report.skipped_count()
            );
            if let Some(reason) = &report.run.halt_reason {
                println!("Run halted early: {reason}");
            }
            Ok(())
        }
        Command::SpamCheck { phone } => {
            let tg = connect_account(&config, &registry, &phone).await?;
            let result = ops::check_spam(&tg).await.context("Spam check failed");
            tg.disconnect();

            let status = result?;
            println!("Verdict: {:?}", status.verdict);
            if !status.raw.is_empty() {
                println!("@SpamBot says:\n{}", status.raw);
            }
            Ok(())
        }
    }
}

/// Initializes the logging subsystem.
fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// Logs an account in, registering it on first use.
async fn login(
    config: &TelegramConfig,
    registry: &mut SessionRegistry,
    phone: &str,
) -> Result<()> {
    let record = match registry.get(phone) {
        Some(existing) => existing.clone(),
        None => registry
            .add(phone, config.api_id)
            .context("Failed to register the account")?,
    };

    let session_path = registry.session_path(&record);
    let tg = TelegramOps::connect(config, &session_path)
        .await
        .context("Failed to connect to Telegram")?;

    if tg
        .is_authorized()
        .await
        .context("Failed to check authorization")?
    {
        info!("Account {} is already authorized", record.phone);
        tg.disconnect();
        return Ok(());
    }

    let result = authenticate(&tg, config, phone).await;
    tg.disconnect();
    result
}

/// Handles Telegram authentication.
async fn authenticate(tg: &TelegramOps, config: &TelegramConfig, phone: &str) -> Result<()> {
    info!("Authentication required");

    let token = tg
        .request_login_code(phone, &config.api_hash)
        .await
        .context("Failed to request login code")?;

    info!("Login code sent to your Telegram app");

    let code: String = Input::new()
        .with_prompt("Enter the login code")
        .interact_text()?;

    match tg.sign_in(&token, &code).await {
        Ok(()) => {
            info!("Successfully signed in!");
            Ok(())
        }
        Err(TelegramError::PasswordRequired(password_token)) => {
            info!("Two-factor authentication is enabled");

            let hint = password_token.hint().unwrap_or("no hint");
            info!("Password hint: {}", hint);

            let password: String = Password::new()
                .with_prompt("Enter your 2FA password")
                .interact()?;

            tg.check_password(password_token, &password)
                .await
                .context("2FA authentication failed")?;

            info!("Successfully signed in with 2FA!");
            Ok(())
        }
        Err(e) => Err(e).context("Authentication failed"),
    }
}

/// Connects the account registered under a phone number.
async fn connect_account(
    config: &TelegramConfig,
    registry: &SessionRegistry,
    phone: &str,
) -> Result<TelegramOps> {
    let Some(record) = registry.get(phone) else {
        bail!("No session for {phone}. Run 'group_ops login --phone {phone}' first.");
    };

    let session_path = registry.session_path(record);
    let tg = TelegramOps::connect(config, &session_path)
        .await
        .context("Failed to connect to Telegram")?;

    if !tg
        .is_authorized()
        .await
        .context("Failed to check authorization")?
    {
        tg.disconnect();
        bail!("Session for {phone} is not authorized. Run 'group_ops login' again.");
    }

    Ok(tg)
}

/// Scrapes members and writes them to a JSON file.
async fn scrape(tg: &TelegramOps, group: &str, limit: usize, output: &std::path::Path) -> Result<()> {
    let members = tg
        .scrape_members(group, limit)
        .await
        .context("Scraping members failed")?;

    let with_username = members.iter().filter(|m| m.username.is_some()).count();
    let json = serde_json::to_string_pretty(&members)?;
    std::fs::write(output, json)
        .with_context(|| format!("Failed to write {}", output.display()))?;

    println!(
        "Scraped {} members ({} with a public username) -> {}",
        members.len(),
        with_username,
        output.display()
    );
    Ok(())
}

/// Reads a scraped-members JSON file.
fn read_members(path: &std::path::Path) -> Result<Vec<ScrapedMember>> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let members: Vec<ScrapedMember> =
        serde_json::from_str(&json).context("Failed to parse members file")?;

    if members.is_empty() {
        bail!("Members file {} is empty", path.display());
    }
    Ok(members)
}

/// Merges `--target` arguments with an optional one-per-line file.
fn collect_targets(
    mut targets: Vec<String>,
    file: Option<&std::path::Path>,
) -> Result<Vec<String>> {
    if let Some(path) = file {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        targets.extend(
            content
                .lines()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(str::to_owned),
        );
    }
    Ok(targets)
}

/// Returns a token cancelled on the first Ctrl+C.
fn cancel_on_ctrl_c() -> CancelToken {
    let cancel = CancelToken::new();
    let token = cancel.clone();

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Ctrl+C received, stopping after the current item...");
            token.cancel();
        }
    });

    cancel
}
