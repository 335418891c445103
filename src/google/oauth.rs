//! OAuth token exchange and refresh against Google's token endpoint

use std::path::Path;

use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::core::AppConfig;

const TOKEN_ENDPOINT: &str = "https://oauth2.googleapis.com/token";

const DEFAULT_REDIRECT_URI: &str = "urn:ietf:wg:oauth:2.0:oob";

const SCOPE: &str = "https://www.googleapis.com/auth/gmail.modify";

/// OAuth client credentials for the Gmail API
#[derive(Debug, Clone)]
pub struct Credentials {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
}

/// Shape of a Google Cloud Console `credentials.json` download. Desktop
/// clients use the `installed` key, web clients use `web`.
#[derive(Debug, Deserialize)]
struct CredentialsFile {
    installed: Option<CredentialsEntry>,
    web: Option<CredentialsEntry>,
}

#[derive(Debug, Deserialize)]
struct CredentialsEntry {
    client_id: String,
    client_secret: String,
    #[serde(default)]
    redirect_uris: Vec<String>,
}

impl Credentials {
    /// Load credentials from a `credentials.json` file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read credentials file {}", path.display()))?;
        let file: CredentialsFile = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse credentials file {}", path.display()))?;
        let entry = file
            .installed
            .or(file.web)
            .ok_or_else(|| anyhow!("Credentials file has no `installed` or `web` section"))?;
        let redirect_uri = entry
            .redirect_uris
            .first()
            .cloned()
            .unwrap_or_else(|| DEFAULT_REDIRECT_URI.to_string());

        Ok(Self {
            client_id: entry.client_id,
            client_secret: entry.client_secret,
            redirect_uri,
        })
    }

    /// Resolve credentials from the app config. Environment overrides win
    /// over the credentials file.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        if let (Some(client_id), Some(client_secret)) = (&config.client_id, &config.client_secret) {
            return Ok(Self {
                client_id: client_id.clone(),
                client_secret: client_secret.clone(),
                redirect_uri: DEFAULT_REDIRECT_URI.to_string(),
            });
        }
        Self::from_file(&config.credentials_path)
    }

    /// Build the consent URL the user opens in a browser to authorize access
    pub fn auth_url(&self) -> String {
        format!(
            "https://accounts.google.com/o/oauth2/v2/auth?client_id={}&redirect_uri={}&response_type=code&scope={}&access_type=offline&prompt=consent",
            urlencoding::encode(&self.client_id),
            urlencoding::encode(&self.redirect_uri),
            urlencoding::encode(SCOPE)
        )
    }
}

/// A stored OAuth token pair with expiry tracking
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuthToken {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl OAuthToken {
    /// Whether the access token has expired, with a 60 second margin.
    /// An unknown expiry is treated as expired.
    pub fn is_expired(&self) -> bool {
        match self.expires_at {
            Some(expires_at) => Utc::now() >= expires_at - chrono::Duration::seconds(60),
            None => true,
        }
    }

    /// Load a token from a JSON file. Returns `Ok(None)` when the file does
    /// not exist.
    pub fn load(path: impl AsRef<Path>) -> Result<Option<Self>> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read token file {}", path.display()))?;
        let token = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse token file {}", path.display()))?;
        Ok(Some(token))
    }

    /// Save the token as JSON, readable only by the owner on Unix
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create token directory {}", parent.display()))?;
        }
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write token file {}", path.display()))?;
        restrict_permissions(path)?;
        tracing::debug!("Saved token to {}", path.display());
        Ok(())
    }
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    let perms = std::fs::Permissions::from_mode(0o600);
    std::fs::set_permissions(path, perms)
        .with_context(|| format!("Failed to set permissions on {}", path.display()))
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> Result<()> {
    Ok(())
}

/// Wire format of a token endpoint response
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
}

/// Exchange an authorization code for a token
pub async fn exchange_code_for_token(credentials: &Credentials, code: &str) -> Result<OAuthToken> {
    let params = [
        ("client_id", credentials.client_id.as_str()),
        ("client_secret", credentials.client_secret.as_str()),
        ("code", code),
        ("redirect_uri", credentials.redirect_uri.as_str()),
        ("grant_type", "authorization_code"),
    ];
    request_token(TOKEN_ENDPOINT, &params, None).await
}

/// Trade a refresh token for a fresh access token. Google may or may not
/// rotate the refresh token, so the old one is kept as a fallback.
pub async fn refresh_access_token(
    credentials: &Credentials,
    refresh_token: &str,
) -> Result<OAuthToken> {
    let params = [
        ("client_id", credentials.client_id.as_str()),
        ("client_secret", credentials.client_secret.as_str()),
        ("refresh_token", refresh_token),
        ("grant_type", "refresh_token"),
    ];
    request_token(TOKEN_ENDPOINT, &params, Some(refresh_token)).await
}

async fn request_token(
    endpoint: &str,
    params: &[(&str, &str)],
    fallback_refresh_token: Option<&str>,
) -> Result<OAuthToken> {
    let client = Client::new();
    let res = client.post(endpoint).form(params).send().await?;
    let status = res.status();
    let text = res.text().await.unwrap_or_default();
    if !status.is_success() {
        let body: serde_json::Value = serde_json::from_str(&text).unwrap_or_default();
        let description = body
            .get("error_description")
            .and_then(|v| v.as_str())
            .or_else(|| body.get("error").and_then(|v| v.as_str()))
            .unwrap_or("unknown error");
        anyhow::bail!("Token request failed: {} ({})", status, description);
    }
    let token: TokenResponse = serde_json::from_str(&text)?;

    let expires_at = token
        .expires_in
        .map(|secs| Utc::now() + chrono::Duration::seconds(secs));
    let refresh_token = token
        .refresh_token
        .or_else(|| fallback_refresh_token.map(String::from));

    Ok(OAuthToken {
        access_token: token.access_token,
        refresh_token,
        expires_at,
    })
}

/// Get a usable access token for the API, refreshing the stored token when
/// it has expired and persisting the rotated token back to disk.
pub async fn access_token(credentials: &Credentials, token_path: &str) -> Result<String> {
    let token = OAuthToken::load(token_path)?.ok_or_else(|| {
        anyhow!(
            "No token found at {}. Run `mailprobe auth` to authorize first.",
            token_path
        )
    })?;

    if !token.is_expired() {
        return Ok(token.access_token);
    }

    tracing::debug!("Access token expired, refreshing");
    let refresh_token = token
        .refresh_token
        .ok_or_else(|| anyhow!("Stored token is expired and has no refresh token"))?;
    let refreshed = refresh_access_token(credentials, &refresh_token).await?;
    refreshed.save(token_path)?;
    Ok(refreshed.access_token)
}
