mod common;

use axum::http::StatusCode;
use serde_json::json;

use common::{Scripted, TestApp, token};

#[tokio::test]
async fn message_without_conversation_starts_one() {
    let app = TestApp::new();
    let t = token("user_1");

    let (status, reply) = app
        .post("/api/chat", Some(&t), json!({ "message": "  What should I cook tonight?  " }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(reply["role"], "assistant");
    assert_eq!(reply["content"], "Hello from the companion!");

    let (_, list) = app.get("/api/conversations", Some(&t)).await;
    let list = list.as_array().unwrap();
    assert_eq!(list.len(), 1);
    assert_eq!(list[0]["id"], reply["conversationId"]);
    assert_eq!(list[0]["name"], "What should I cook tonight?");

    let uri = format!("/api/conversations/{}/messages", reply["conversationId"].as_str().unwrap());
    let (_, messages) = app.get(&uri, Some(&t)).await;
    assert_eq!(messages[0]["role"], "user");
    assert_eq!(messages[0]["content"], "What should I cook tonight?");
    assert_eq!(messages[1]["role"], "assistant");
}

#[tokio::test]
async fn null_conversation_id_also_starts_one() {
    let app = TestApp::new();
    let (status, reply) = app
        .post(
            "/api/chat",
            Some(&token("user_1")),
            json!({ "message": "hi", "conversationId": null }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(reply["conversationId"].is_string());
}

#[tokio::test]
async fn long_first_message_is_truncated_for_the_name() {
    let app = TestApp::new();
    let t = token("user_1");
    let message = "é".repeat(150);

    let (status, _) = app.post("/api/chat", Some(&t), json!({ "message": message })).await;
    assert_eq!(status, StatusCode::OK);

    let (_, list) = app.get("/api/conversations", Some(&t)).await;
    assert_eq!(list[0]["name"].as_str().unwrap().chars().count(), 100);
}

#[tokio::test]
async fn continues_an_existing_conversation_with_history() {
    let app = TestApp::new();
    let t = token("user_1");

    let (_, first) = app.post("/api/chat", Some(&t), json!({ "message": "My name is Ada." })).await;
    let conv_id = first["conversationId"].clone();

    let (status, second) = app
        .post(
            "/api/chat",
            Some(&t),
            json!({ "message": "What is my name?", "conversationId": conv_id }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(second["conversationId"], conv_id);

    let (prompt, system) = app.llm.last_prompt();
    assert_eq!(
        prompt,
        "User: My name is Ada.\n\
         AI Assistant: Hello from the companion!\n\
         User: What is my name?\n\
         AI Assistant:"
    );
    assert!(system.contains("Your name is AI Assistant."));

    let (_, list) = app.get("/api/conversations", Some(&t)).await;
    assert_eq!(list.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn empty_message_is_rejected() {
    let app = TestApp::new();
    let t = token("user_1");

    let (status, _) = app.post("/api/chat", Some(&t), json!({ "message": "   " })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(app.llm.calls(), 0);

    let (_, list) = app.get("/api/conversations", Some(&t)).await;
    assert_eq!(list, json!([]));
}

#[tokio::test]
async fn unknown_or_foreign_conversation_is_not_found() {
    let app = TestApp::new();

    let (status, _) = app
        .post(
            "/api/chat",
            Some(&token("user_1")),
            json!({ "message": "hi", "conversationId": uuid::Uuid::new_v4() }),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, reply) = app.post("/api/chat", Some(&token("owner")), json!({ "message": "hi" })).await;
    let (status, _) = app
        .post(
            "/api/chat",
            Some(&token("intruder")),
            json!({ "message": "hello?", "conversationId": reply["conversationId"] }),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn transient_failures_are_retried() {
    let app = TestApp::with_llm(Scripted::failing_then(2, "Third time lucky"));

    let (status, reply) = app.post("/api/chat", Some(&token("user_1")), json!({ "message": "hi" })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(reply["content"], "Third time lucky");
    assert_eq!(app.llm.calls(), 3);
}

#[tokio::test]
async fn exhausted_retries_keep_the_user_message() {
    let app = TestApp::with_llm(Scripted::failing_then(10, "never"));
    let t = token("user_1");

    let (status, body) = app.post("/api/chat", Some(&t), json!({ "message": "anyone there?" })).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body, "Upstream Error");
    assert_eq!(app.llm.calls(), 3);

    let (_, list) = app.get("/api/conversations", Some(&t)).await;
    let uri = format!("/api/conversations/{}/messages", list[0]["id"].as_str().unwrap());
    let (_, messages) = app.get(&uri, Some(&t)).await;
    let messages = messages.as_array().unwrap();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0]["role"], "user");
    assert_eq!(messages[0]["content"], "anyone there?");
}

#[tokio::test]
async fn failed_reply_still_marks_the_conversation_active() {
    let app = TestApp::with_llm(Scripted::failing_then(10, "never"));
    let t = token("user_1");

    let (_, older) = app.post("/api/conversations", Some(&t), json!({ "name": "Older" })).await;
    app.post("/api/conversations", Some(&t), json!({ "name": "Newer" })).await;
    tokio::time::sleep(std::time::Duration::from_millis(5)).await;

    let (status, _) = app
        .post(
            "/api/chat",
            Some(&t),
            json!({ "message": "still there?", "conversationId": older["id"] }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);

    let (_, list) = app.get("/api/conversations", Some(&t)).await;
    assert_eq!(list[0]["name"], "Older");
    assert_ne!(list[0]["lastMessageAt"], older["lastMessageAt"]);
}

#[tokio::test]
async fn uses_the_requested_companion() {
    let app = TestApp::new();
    let t = token("user_1");

    let (status, companion) = app
        .post(
            "/api/companions",
            Some(&t),
            json!({ "name": "Chef Remy", "instructions": "You are a French chef." }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, reply) = app
        .post(
            "/api/chat",
            Some(&t),
            json!({ "message": "Dinner ideas?", "companionId": companion["id"] }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (prompt, system) = app.llm.last_prompt();
    assert!(system.starts_with("You are a French chef."));
    assert!(prompt.ends_with("Chef Remy:"));

    let uri = format!("/api/conversations/{}", reply["conversationId"].as_str().unwrap());
    let (_, conv) = app.get(&uri, Some(&t)).await;
    assert_eq!(conv["companionId"], companion["id"]);
}
