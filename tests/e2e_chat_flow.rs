//! End-to-end exercise of the HTTP surface against a running server.
//!
//! Requires the server on 127.0.0.1:8000 with a reachable database, so
//! the whole module is `#[ignore]`d for ordinary `cargo test` runs.

use std::time::{SystemTime, UNIX_EPOCH};
use once_cell::sync::Lazy;
use serde_json::{json, Value};

struct TestContext {
    client: reqwest::Client,
    base_url: String,
}

static BASE_URL: Lazy<String> =
    Lazy::new(|| "http://127.0.0.1:8000".to_string());

impl TestContext {
    fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: BASE_URL.clone(),
        }
    }

    fn get_timestamp() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_secs()
    }
}

#[tokio::test]
#[ignore = "requires a running server and database"]
async fn signup_login_chat_and_device_signout() {
    let context = TestContext::new();
    let timestamp = TestContext::get_timestamp();
    let email = format!("e2e_{}@example.com", timestamp);
    let device_id = format!("device_{}", timestamp);

    // Signup
    let signup = context
        .client
        .post(format!("{}/api/auth/signup", context.base_url))
        .json(&json!({
            "name": "E2E User",
            "email": email,
            "password": "SecurePass123!@#"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(signup.status().as_u16(), 201, "signup failed");
    let signup_body: Value = signup.json().await.unwrap();
    assert_eq!(signup_body["user"]["email"], email.as_str());

    // Duplicate signup must not create a second row
    let duplicate = context
        .client
        .post(format!("{}/api/auth/signup", context.base_url))
        .json(&json!({
            "name": "E2E User",
            "email": email,
            "password": "SecurePass123!@#"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(duplicate.status().as_u16(), 400, "duplicate email accepted");

    // Login
    let login = context
        .client
        .post(format!("{}/api/auth/login", context.base_url))
        .json(&json!({
            "email": email,
            "password": "SecurePass123!@#",
            "device_id": device_id
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(login.status().as_u16(), 200, "login failed");
    let login_body: Value = login.json().await.unwrap();
    let token = login_body["token"].as_str().unwrap().to_string();

    // Re-login from the same device replaces the session instead of conflicting
    let relogin = context
        .client
        .post(format!("{}/api/auth/login", context.base_url))
        .json(&json!({
            "email": email,
            "password": "SecurePass123!@#",
            "device_id": device_id
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(relogin.status().as_u16(), 200, "re-login failed");
    let relogin_body: Value = relogin.json().await.unwrap();
    let token = relogin_body["token"].as_str().unwrap_or(&token).to_string();

    // Create a chat
    let created = context
        .client
        .post(format!("{}/chats", context.base_url))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(created.status().as_u16(), 201, "chat creation failed");
    let chat: Value = created.json().await.unwrap();
    let chat_id = chat["id"].as_str().unwrap().to_string();

    // Post a message; the automated backend should reply
    let posted = context
        .client
        .post(format!("{}/chats/{}/messages", context.base_url, chat_id))
        .bearer_auth(&token)
        .json(&json!({
            "system_prompt": "You are a support assistant.",
            "question": "hello"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(posted.status().as_u16(), 200, "message post failed");

    let history = context
        .client
        .get(format!("{}/chats/{}/messages", context.base_url, chat_id))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(history.status().as_u16(), 200);
    let messages: Value = history.json().await.unwrap();
    let messages = messages.as_array().unwrap();
    assert!(messages.len() >= 2, "expected user message and reply");
    assert_eq!(messages[0]["kind"], "user");
    assert_eq!(messages[0]["content"], "hello");

    // Chat list carries the latest message
    let list = context
        .client
        .get(format!("{}/chats", context.base_url))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(list.status().as_u16(), 200);
    let chats: Value = list.json().await.unwrap();
    assert!(chats.as_array().unwrap().iter().any(|entry| {
        entry["chat"]["id"] == chat_id.as_str() && !entry["latest_message"].is_null()
    }));

    // Device sign-out deletes the session, a second attempt finds nothing
    let signout = context
        .client
        .delete(format!(
            "{}/api/auth/session/device?deviceId={}",
            context.base_url, device_id
        ))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(signout.status().as_u16(), 200, "device sign-out failed");

    let unauthorized = context
        .client
        .get(format!("{}/chats", context.base_url))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(unauthorized.status().as_u16(), 401, "token survived sign-out");
}

#[tokio::test]
#[ignore = "requires a running server and database"]
async fn missing_device_id_is_rejected() {
    let context = TestContext::new();
    let timestamp = TestContext::get_timestamp();
    let email = format!("e2e_dev_{}@example.com", timestamp);

    let signup = context
        .client
        .post(format!("{}/api/auth/signup", context.base_url))
        .json(&json!({
            "name": "E2E User",
            "email": email,
            "password": "SecurePass123!@#"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(signup.status().as_u16(), 201);

    let login = context
        .client
        .post(format!("{}/api/auth/login", context.base_url))
        .json(&json!({ "email": email, "password": "SecurePass123!@#" }))
        .send()
        .await
        .unwrap();
    let login_body: Value = login.json().await.unwrap();
    let token = login_body["token"].as_str().unwrap();

    let missing = context
        .client
        .delete(format!("{}/api/auth/session/device", context.base_url))
        .bearer_auth(token)
        .send()
        .await
        .unwrap();
    assert_eq!(missing.status().as_u16(), 400);

    let unknown = context
        .client
        .delete(format!(
            "{}/api/auth/session/device?deviceId=never-seen",
            context.base_url
        ))
        .bearer_auth(token)
        .send()
        .await
        .unwrap();
    assert_eq!(unknown.status().as_u16(), 404);
}
