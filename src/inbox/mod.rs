//! Message normalization and the bounded poll loop used by end-to-end test
//! suites to wait for an email to arrive.

use std::time::Duration;

use anyhow::Result;
use serde::Serialize;

use crate::google::gmail::{self, Message};

/// Decoded message body. Either side may be empty depending on which MIME
/// parts the message carries.
#[derive(Debug, Clone, Default, Serialize)]
pub struct EmailBody {
    pub text: String,
    pub html: String,
}

/// A normalized message record with the fields test suites assert on
#[derive(Debug, Clone, Serialize)]
pub struct Email {
    pub id: String,
    pub from: String,
    pub receiver: String,
    pub subject: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<EmailBody>,
}

#[derive(Debug, Clone)]
pub struct FetchOptions {
    pub include_body: bool,
    pub label: String,
    pub max_results: u32,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            include_body: true,
            label: "INBOX".to_string(),
            max_results: 25,
        }
    }
}

/// Substring predicates a message must satisfy. An empty string matches
/// anything.
#[derive(Debug, Clone, Default)]
pub struct MatchCriteria {
    pub from: String,
    pub to: String,
    pub subject: String,
}

impl MatchCriteria {
    pub fn matches(&self, email: &Email) -> bool {
        email.from.contains(&self.from)
            && email.receiver.contains(&self.to)
            && email.subject.contains(&self.subject)
    }
}

#[derive(Debug, Clone)]
pub struct PollConfig {
    /// Fixed delay between polls
    pub interval: Duration,
    /// Wall-clock budget before giving up
    pub max_wait: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(30),
            max_wait: Duration::from_secs(60),
        }
    }
}

/// Decode the body from a message payload.
///
/// A message either has a `payload.body.data` or one or more
/// `parts[].body.data`. Single-part payloads decode into text or html
/// according to the payload MIME type. Multipart payloads take the first
/// non-attachment part of each type. Parts with an `attachment_id` are
/// files, not body content.
pub fn extract_body(message: &Message) -> EmailBody {
    let mut body = EmailBody::default();

    let Some(payload) = &message.payload else {
        return body;
    };

    if let Some(part_body) = &payload.body
        && let Some(data) = &part_body.data
        && !data.is_empty()
    {
        let decoded = gmail::decode_base64(data);
        match payload.mimetype.as_str() {
            "text/html" => body.html = decoded,
            _ => body.text = decoded,
        }
        return body;
    }

    if let Some(parts) = &payload.parts {
        for part in parts {
            let Some(part_body) = &part.body else {
                continue;
            };
            if part_body.attachment_id.is_some() {
                continue;
            }
            let Some(data) = &part_body.data else {
                continue;
            };
            if data.is_empty() {
                continue;
            }

            if part.mimetype == "text/plain" && body.text.is_empty() {
                body.text = gmail::decode_base64(data);
            }
            if part.mimetype == "text/html" && body.html.is_empty() {
                body.html = gmail::decode_base64(data);
            }
        }
    }

    body
}

/// Normalize a raw API message into the record handed to callers
pub fn normalize(message: &Message, include_body: bool) -> Email {
    Email {
        id: message.id.clone(),
        from: gmail::header_value(message, "From"),
        receiver: gmail::header_value(message, "To"),
        subject: gmail::header_value(message, "Subject"),
        body: include_body.then(|| extract_body(message)),
    }
}

/// Find the first email in a batch satisfying all three predicates
pub fn find_match<'a>(emails: &'a [Email], criteria: &MatchCriteria) -> Option<&'a Email> {
    emails.iter().find(|email| criteria.matches(email))
}

/// Fetch and normalize a bounded batch of recent messages
pub async fn get_messages(
    base_url: &str,
    access_token: &str,
    options: &FetchOptions,
) -> Result<Vec<Email>> {
    let refs = gmail::list_messages(base_url, access_token, &options.label, options.max_results)
        .await?;

    let mut emails = Vec::with_capacity(refs.len());
    for message_ref in refs {
        let message = gmail::fetch_message(base_url, access_token, &message_ref.id).await?;
        emails.push(normalize(&message, options.include_body));
    }
    Ok(emails)
}

/// Poll the mailbox until a message matches the criteria or the wait budget
/// runs out.
///
/// Fetches at least once, then sleeps the fixed interval between polls.
/// Accumulated wait is counted in whole intervals and the loop gives up
/// without sleeping once it reaches `max_wait`. Fetch and auth failures
/// propagate as errors; only the not-found-within-budget outcome is `None`.
pub async fn check_inbox(
    base_url: &str,
    access_token: &str,
    options: &FetchOptions,
    criteria: &MatchCriteria,
    poll: &PollConfig,
) -> Result<Option<Email>> {
    tracing::info!(
        "Checking for message from '{}', to '{}', containing '{}' in subject",
        criteria.from,
        criteria.to,
        criteria.subject
    );

    let mut waited = Duration::ZERO;
    loop {
        let emails = get_messages(base_url, access_token, options).await?;
        if let Some(email) = find_match(&emails, criteria) {
            tracing::info!("Found matching message with id {}", email.id);
            return Ok(Some(email.clone()));
        }

        waited += poll.interval;
        if waited >= poll.max_wait {
            tracing::warn!("Maximum waiting time exceeded");
            return Ok(None);
        }
        tracing::info!(
            "Message not found. Waiting {} seconds...",
            poll.interval.as_secs()
        );
        tokio::time::sleep(poll.interval).await;
    }
}
