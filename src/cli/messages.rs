use anyhow::Result;

use crate::core::AppConfig;
use crate::google::gmail::GMAIL_API_BASE;
use crate::google::oauth::{self, Credentials};
use crate::inbox::{FetchOptions, get_messages};

pub async fn run(config: &AppConfig, label: String, limit: u32, no_body: bool) -> Result<()> {
    let credentials = Credentials::from_config(config)?;
    let access_token = oauth::access_token(&credentials, &config.token_path).await?;

    let options = FetchOptions {
        include_body: !no_body,
        label,
        max_results: limit,
    };
    let emails = get_messages(GMAIL_API_BASE, &access_token, &options).await?;
    println!("{}", serde_json::to_string_pretty(&emails)?);

    Ok(())
}
