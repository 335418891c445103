use std::env;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub credentials_path: String,
    pub token_path: String,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        let credentials_path = env::var("MAILPROBE_CREDENTIALS_PATH")
            .unwrap_or_else(|_| "credentials.json".to_string());
        let token_path =
            env::var("MAILPROBE_TOKEN_PATH").unwrap_or_else(|_| "token.json".to_string());
        // Optional overrides for environments without a credentials file
        let client_id = env::var("MAILPROBE_CLIENT_ID").ok();
        let client_secret = env::var("MAILPROBE_CLIENT_SECRET").ok();

        Self {
            credentials_path,
            token_path,
            client_id,
            client_secret,
        }
    }
}
