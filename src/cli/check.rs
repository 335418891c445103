use std::time::Duration;

use anyhow::Result;

use crate::core::AppConfig;
use crate::google::gmail::GMAIL_API_BASE;
use crate::google::oauth::{self, Credentials};
use crate::inbox::{FetchOptions, MatchCriteria, PollConfig, check_inbox};

#[allow(clippy::too_many_arguments)]
pub async fn run(
    config: &AppConfig,
    from: String,
    to: String,
    subject: String,
    label: String,
    interval: u64,
    timeout: u64,
    no_body: bool,
) -> Result<()> {
    let credentials = Credentials::from_config(config)?;
    let access_token = oauth::access_token(&credentials, &config.token_path).await?;

    let options = FetchOptions {
        include_body: !no_body,
        label,
        ..Default::default()
    };
    let criteria = MatchCriteria { from, to, subject };
    let poll = PollConfig {
        interval: Duration::from_secs(interval),
        max_wait: Duration::from_secs(timeout),
    };

    match check_inbox(GMAIL_API_BASE, &access_token, &options, &criteria, &poll).await? {
        Some(email) => {
            println!("{}", serde_json::to_string_pretty(&email)?);
            Ok(())
        }
        None => anyhow::bail!("No matching message arrived within {} seconds", timeout),
    }
}
