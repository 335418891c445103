use anyhow::{Result, anyhow};
use std::io::{self, Write};

use crate::core::AppConfig;
use crate::google::oauth::{Credentials, exchange_code_for_token};

pub async fn run(config: &AppConfig) -> Result<()> {
    let credentials = Credentials::from_config(config)?;

    println!(
        "\nPlease open the following URL in your browser and authorize access:\n\n{}\n",
        credentials.auth_url()
    );
    print!("Paste the authorization code shown by Google here: ");
    io::stdout().flush().unwrap();
    let mut code = String::new();
    io::stdin()
        .read_line(&mut code)
        .expect("Failed to read code");
    let code = code.trim();

    let token = exchange_code_for_token(&credentials, code).await?;
    if token.refresh_token.is_none() {
        return Err(anyhow!("No refresh token in response"));
    }

    token.save(&config.token_path)?;
    println!("Token saved to {}.", config.token_path);

    Ok(())
}
