use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

pub mod auth;
pub mod check;
pub mod messages;
pub mod modify;

use crate::core::AppConfig;

#[derive(Subcommand)]
enum Command {
    /// Perform OAuth authorization and store the token
    Auth {},
    /// Poll the inbox until a matching message arrives or the wait budget
    /// runs out
    Check {
        /// Substring the From header must contain
        #[arg(long, default_value = "")]
        from: String,
        /// Substring the To header must contain
        #[arg(long, default_value = "")]
        to: String,
        /// Substring the Subject header must contain
        #[arg(long, default_value = "")]
        subject: String,
        #[arg(long, default_value = "INBOX")]
        label: String,
        /// Seconds between polls
        #[arg(long, default_value_t = 30)]
        interval: u64,
        /// Give up after this many seconds
        #[arg(long, default_value_t = 60)]
        timeout: u64,
        /// Skip decoding message bodies
        #[arg(long, action, default_value = "false")]
        no_body: bool,
    },
    /// Fetch recent messages once and print them as JSON
    Messages {
        #[arg(long, default_value = "INBOX")]
        label: String,
        #[arg(long, default_value_t = 25)]
        limit: u32,
        /// Skip decoding message bodies
        #[arg(long, action, default_value = "false")]
        no_body: bool,
    },
    /// Add or remove labels on a message by ID
    Modify {
        #[arg(long)]
        id: String,
        /// Label to add (repeatable)
        #[arg(long = "add-label")]
        add_labels: Vec<String>,
        /// Label to remove (repeatable), e.g. UNREAD to mark read
        #[arg(long = "remove-label")]
        remove_labels: Vec<String>,
    },
}

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

pub async fn run() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Cli::parse();
    let config = AppConfig::default();

    // Handle each sub command
    match args.command {
        Some(Command::Auth {}) => {
            auth::run(&config).await?;
        }
        Some(Command::Check {
            from,
            to,
            subject,
            label,
            interval,
            timeout,
            no_body,
        }) => {
            check::run(&config, from, to, subject, label, interval, timeout, no_body).await?;
        }
        Some(Command::Messages {
            label,
            limit,
            no_body,
        }) => {
            messages::run(&config, label, limit, no_body).await?;
        }
        Some(Command::Modify {
            id,
            add_labels,
            remove_labels,
        }) => {
            modify::run(&config, &id, &add_labels, &remove_labels).await?;
        }
        None => {}
    }

    Ok(())
}
