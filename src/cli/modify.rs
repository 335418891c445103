use anyhow::Result;

use crate::core::AppConfig;
use crate::google::gmail::{GMAIL_API_BASE, modify_message};
use crate::google::oauth::{self, Credentials};

pub async fn run(
    config: &AppConfig,
    id: &str,
    add_labels: &[String],
    remove_labels: &[String],
) -> Result<()> {
    let credentials = Credentials::from_config(config)?;
    let access_token = oauth::access_token(&credentials, &config.token_path).await?;

    tracing::info!("Modifying message '{}'", id);
    let response = modify_message(GMAIL_API_BASE, &access_token, id, add_labels, remove_labels)
        .await?;
    println!(
        "Message {} now has labels: {}",
        response.id,
        response.label_ids.unwrap_or_default().join(", ")
    );

    Ok(())
}
