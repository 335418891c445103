//! End-to-end tests for the poll loop against a mocked Gmail API
use std::time::Duration;

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE;

use mailprobe::inbox::{FetchOptions, MatchCriteria, PollConfig, check_inbox, get_messages};

fn message_json(id: &str, from: &str, to: &str, subject: &str, body: &str) -> String {
    let data = URL_SAFE.encode(body);
    format!(
        r#"{{
            "id": "{id}",
            "threadId": "thr_{id}",
            "snippet": "snippet",
            "labelIds": ["INBOX", "UNREAD"],
            "internalDate": "1731401723000",
            "payload": {{
                "mimeType": "text/plain",
                "headers": [
                    {{"name": "From", "value": "{from}"}},
                    {{"name": "To", "value": "{to}"}},
                    {{"name": "Subject", "value": "{subject}"}}
                ],
                "body": {{"attachmentId": null, "size": {size}, "data": "{data}"}}
            }}
        }}"#,
        size = body.len(),
    )
}

#[tokio::test]
async fn test_check_inbox_finds_matching_message() {
    let mut server = mockito::Server::new_async().await;

    let _list = server
        .mock("GET", "/messages")
        .match_query(mockito::Matcher::Regex(r"labelIds=INBOX".to_string()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            r#"{"messages": [
                {"id": "msg_001", "threadId": "thr_msg_001"},
                {"id": "msg_002", "threadId": "thr_msg_002"}
            ]}"#,
        )
        .create();
    let _msg1 = server
        .mock("GET", "/messages/msg_001?format=full")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(message_json(
            "msg_001",
            "newsletter@other.com",
            "me@example.org",
            "Weekly digest",
            "Nothing to see here",
        ))
        .create();
    let _msg2 = server
        .mock("GET", "/messages/msg_002?format=full")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(message_json(
            "msg_002",
            "orders@shop.example.com",
            "me@example.org",
            "Order #42 confirmed",
            "Thanks for your purchase",
        ))
        .create();

    let criteria = MatchCriteria {
        from: "orders@shop.example.com".to_string(),
        to: "me@example.org".to_string(),
        subject: "Order #42".to_string(),
    };
    let poll = PollConfig {
        interval: Duration::from_millis(10),
        max_wait: Duration::from_millis(50),
    };
    let found = check_inbox(
        &server.url(),
        "test_token",
        &FetchOptions::default(),
        &criteria,
        &poll,
    )
    .await
    .unwrap()
    .expect("Expected a matching message");

    assert_eq!(found.id, "msg_002");
    assert_eq!(found.from, "orders@shop.example.com");
    assert_eq!(found.receiver, "me@example.org");
    assert_eq!(found.subject, "Order #42 confirmed");
    assert_eq!(found.body.unwrap().text, "Thanks for your purchase");
}

#[tokio::test]
async fn test_check_inbox_gives_up_after_max_wait() {
    let mut server = mockito::Server::new_async().await;

    // Two whole intervals fit in the wait budget, so the loop should fetch
    // exactly twice before giving up
    let list = server
        .mock("GET", "/messages")
        .match_query(mockito::Matcher::Any)
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"resultSizeEstimate": 0}"#)
        .expect(2)
        .create();

    let poll = PollConfig {
        interval: Duration::from_millis(20),
        max_wait: Duration::from_millis(40),
    };
    let found = check_inbox(
        &server.url(),
        "test_token",
        &FetchOptions::default(),
        &MatchCriteria::default(),
        &poll,
    )
    .await
    .unwrap();

    assert!(found.is_none());
    list.assert();
}

#[tokio::test]
async fn test_check_inbox_fetches_once_with_zero_wait() {
    let mut server = mockito::Server::new_async().await;

    let list = server
        .mock("GET", "/messages")
        .match_query(mockito::Matcher::Any)
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"resultSizeEstimate": 0}"#)
        .expect(1)
        .create();

    let poll = PollConfig {
        interval: Duration::from_secs(30),
        max_wait: Duration::ZERO,
    };
    let found = check_inbox(
        &server.url(),
        "test_token",
        &FetchOptions::default(),
        &MatchCriteria::default(),
        &poll,
    )
    .await
    .unwrap();

    assert!(found.is_none());
    list.assert();
}

#[tokio::test]
async fn test_check_inbox_propagates_api_errors() {
    let mut server = mockito::Server::new_async().await;

    let _list = server
        .mock("GET", "/messages")
        .match_query(mockito::Matcher::Any)
        .with_status(500)
        .with_body(r#"{"error": {"message": "Backend Error"}}"#)
        .create();

    let poll = PollConfig {
        interval: Duration::from_millis(10),
        max_wait: Duration::from_millis(50),
    };
    let result = check_inbox(
        &server.url(),
        "test_token",
        &FetchOptions::default(),
        &MatchCriteria::default(),
        &poll,
    )
    .await;

    assert!(result.is_err());
}

#[tokio::test]
async fn test_get_messages_without_body() {
    let mut server = mockito::Server::new_async().await;

    let _list = server
        .mock("GET", "/messages")
        .match_query(mockito::Matcher::Regex(r"maxResults=5".to_string()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"messages": [{"id": "msg_001", "threadId": "thr_msg_001"}]}"#)
        .create();
    let _msg = server
        .mock("GET", "/messages/msg_001?format=full")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(message_json(
            "msg_001",
            "alice@example.com",
            "bob@example.org",
            "Hello",
            "Body text",
        ))
        .create();

    let options = FetchOptions {
        include_body: false,
        label: "INBOX".to_string(),
        max_results: 5,
    };
    let emails = get_messages(&server.url(), "test_token", &options)
        .await
        .unwrap();

    assert_eq!(emails.len(), 1);
    assert_eq!(emails[0].subject, "Hello");
    assert!(emails[0].body.is_none());
}
