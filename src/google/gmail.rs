//! Gmail API client for listing recent mail, fetching full messages, and
//! modifying message labels

use base64::Engine as _;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use regex::Regex;
use reqwest::Client;
use serde::{Deserialize, Serialize};

/// Base URL for the Gmail REST API. Calls take this as a parameter so tests
/// can point them at a local mock server.
pub const GMAIL_API_BASE: &str = "https://gmail.googleapis.com/gmail/v1/users/me";

/// Message body data comes back base64url encoded, sometimes padded and
/// sometimes not, so the decoder has to accept both.
const BASE64_URL: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Message structures from the Gmail API documentation
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct MessageRef {
    pub id: String,
    #[serde(rename = "threadId")]
    pub thread_id: String,
}

#[derive(Debug, Deserialize)]
pub struct ListMessagesResponse {
    pub messages: Option<Vec<MessageRef>>,
    #[serde(rename = "nextPageToken")]
    pub next_page_token: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    #[serde(rename = "threadId")]
    pub thread_id: String,
    pub snippet: Option<String>,
    pub payload: Option<MessagePayload>,
    #[serde(rename = "labelIds")]
    pub label_ids: Option<Vec<String>>,
    #[serde(rename = "internalDate")]
    pub internal_date: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessagePartBody {
    #[serde(rename = "attachmentId")]
    pub attachment_id: Option<String>,
    pub size: u64,
    // Base64 encoded
    pub data: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessagePart {
    #[serde(rename = "partId")]
    pub part_id: String,
    #[serde(rename = "mimeType")]
    pub mimetype: String,
    pub body: Option<MessagePartBody>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessagePayload {
    pub headers: Option<Vec<MessageHeader>>,
    #[serde(rename = "mimeType")]
    pub mimetype: String,
    pub body: Option<MessagePartBody>,
    pub parts: Option<Vec<MessagePart>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageHeader {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Serialize)]
struct ModifyRequest<'a> {
    #[serde(rename = "addLabelIds")]
    add_label_ids: &'a [String],
    #[serde(rename = "removeLabelIds")]
    remove_label_ids: &'a [String],
}

#[derive(Debug, Deserialize)]
pub struct ModifyResponse {
    pub id: String,
    #[serde(rename = "threadId")]
    pub thread_id: String,
    #[serde(rename = "labelIds")]
    pub label_ids: Option<Vec<String>>,
}

pub(crate) fn decode_base64(data: &str) -> String {
    BASE64_URL
        .decode(data)
        .ok()
        .and_then(|bytes| String::from_utf8(bytes).ok())
        .unwrap_or_else(|| {
            tracing::error!("Base64 decode failed for: {}", data);
            String::new()
        })
}

/// Decode unicode characters from quoted-printable or HTML entities
pub(crate) fn clean_unicode(content: &str) -> String {
    let mut content = content.to_string();

    // Decode quoted-printable (common in Gmail headers)
    content = decode_quoted_printable(&content);

    // Decode HTML entities (e.g., &amp; &#x2019;)
    content = html_entity_decode(&content);

    // Decode literal backslash-u escape sequences (e.g. \u2019)
    let escape_re = Regex::new(r"\\u([0-9a-fA-F]{4})").unwrap();
    content = escape_re
        .replace_all(&content, |caps: &regex::Captures| {
            if let Some(hex) = caps.get(1)
                && let Ok(codepoint) = u32::from_str_radix(hex.as_str(), 16)
                && let Some(c) = char::from_u32(codepoint)
            {
                return c.to_string();
            }
            caps.get(0).unwrap().as_str().to_string()
        })
        .to_string();

    content
}

/// Decode quoted-printable encoded strings (e.g., =E2=80=99)
fn decode_quoted_printable(input: &str) -> String {
    let mut bytes = Vec::new();
    let chars: Vec<char> = input.chars().collect();
    let mut i = 0;

    while i < chars.len() {
        if chars[i] == '=' && i + 2 < chars.len() {
            if chars[i + 1] == '\n' {
                // Soft line break: =\n
                i += 2;
            } else if chars[i + 1] == '\r' && i + 3 < chars.len() && chars[i + 2] == '\n' {
                i += 3;
            } else {
                let hex_str: String = chars[i + 1..=i + 2].iter().collect();
                if let Ok(byte_val) = u8::from_str_radix(&hex_str, 16) {
                    bytes.push(byte_val);
                    i += 3;
                } else {
                    // Invalid hex, keep the '=' and continue
                    bytes.push(b'=');
                    i += 1;
                }
            }
        } else {
            for byte in chars[i].to_string().bytes() {
                bytes.push(byte);
            }
            i += 1;
        }
    }

    String::from_utf8_lossy(&bytes).to_string()
}

/// Decode HTML entities in a string
fn html_entity_decode(input: &str) -> String {
    let mut result = input.to_string();

    result = result.replace("&amp;", "&");
    result = result.replace("&lt;", "<");
    result = result.replace("&gt;", ">");
    result = result.replace("&quot;", "\"");
    result = result.replace("&apos;", "'");
    result = result.replace("&nbsp;", " ");

    // Numeric entities (&#123; or &#x1F600;)
    let numeric_entity = Regex::new(r"&(#(\d+)|#x([0-9a-fA-F]+));").unwrap();
    result = numeric_entity
        .replace_all(&result, |caps: &regex::Captures| {
            if let Some(decimal) = caps.get(2) {
                if let Ok(codepoint) = decimal.as_str().parse::<u32>()
                    && let Some(c) = char::from_u32(codepoint)
                {
                    return c.to_string();
                }
            } else if let Some(hex) = caps.get(3) {
                if let Ok(codepoint) = u32::from_str_radix(hex.as_str(), 16)
                    && let Some(c) = char::from_u32(codepoint)
                {
                    return c.to_string();
                }
            }
            caps.get(0).unwrap().as_str().to_string()
        })
        .to_string();

    result
}

/// Look up a header value by name. Header names are matched
/// case-insensitively and a missing header yields an empty string.
pub fn header_value(message: &Message, name: &str) -> String {
    let Some(payload) = &message.payload else {
        return String::new();
    };
    let Some(headers) = &payload.headers else {
        return String::new();
    };

    for header in headers {
        if header.name.eq_ignore_ascii_case(name) {
            return clean_unicode(&header.value);
        }
    }

    String::new()
}

/// List recent messages under a label
pub async fn list_messages(
    base_url: &str,
    access_token: &str,
    label: &str,
    max_results: u32,
) -> Result<Vec<MessageRef>, anyhow::Error> {
    let client = Client::new();
    let url = format!(
        "{}/messages?labelIds={}&maxResults={}",
        base_url,
        urlencoding::encode(label),
        max_results
    );
    let res = client.get(&url).bearer_auth(access_token).send().await?;
    let status = res.status();
    let text = res.text().await.unwrap_or_default();
    if !status.is_success() {
        anyhow::bail!("Message list failed: {} ({})", status, text);
    }
    let msgs: ListMessagesResponse = serde_json::from_str(&text)?;
    Ok(msgs.messages.unwrap_or_default())
}

/// Fetch the full message for a given message ID
pub async fn fetch_message(
    base_url: &str,
    access_token: &str,
    message_id: &str,
) -> Result<Message, anyhow::Error> {
    let client = Client::new();
    let url = format!("{}/messages/{}?format=full", base_url, message_id);
    let res = client.get(&url).bearer_auth(access_token).send().await?;
    let status = res.status();
    let text = res.text().await.unwrap_or_default();
    if !status.is_success() {
        anyhow::bail!("Message fetch failed: {} ({})", status, text);
    }
    let message: Message = serde_json::from_str(&text)?;
    Ok(message)
}

/// Add and remove labels on a message. Marking a message read is
/// `remove_label_ids = ["UNREAD"]`.
pub async fn modify_message(
    base_url: &str,
    access_token: &str,
    message_id: &str,
    add_label_ids: &[String],
    remove_label_ids: &[String],
) -> Result<ModifyResponse, anyhow::Error> {
    let client = Client::new();
    let url = format!("{}/messages/{}/modify", base_url, message_id);
    let res = client
        .post(&url)
        .bearer_auth(access_token)
        .json(&ModifyRequest {
            add_label_ids,
            remove_label_ids,
        })
        .send()
        .await?;
    let status = res.status();
    let text = res.text().await.unwrap_or_default();
    if !status.is_success() {
        anyhow::bail!("Message modify failed: {} ({})", status, text);
    }
    let response: ModifyResponse = serde_json::from_str(&text)?;
    Ok(response)
}
