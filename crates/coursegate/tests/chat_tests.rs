use std::time::Duration;

use coursegate::controllers::chat::NEW_MESSAGE_EVENT;
use coursegate::integrations::realtime::{user_room, ADMIN_ROOM};
use coursegate::TestApp;
use serde_json::json;

#[tokio::test]
async fn test_learner_message_reaches_admin_room() {
    let app = TestApp::new().await;
    let (token, user_id) = app.signup("learner@example.com", "learner").await;
    let mut admins = app.state.realtime.join(ADMIN_ROOM).await;

    let res = app
        .post_json("/api/chat/messages", Some(&token), json!({ "body": "  How do I get a refund?  " }))
        .await;
    assert_eq!(res.status, 201, "{}", res.text());
    let data = res.data();
    assert_eq!(data["body"], "How do I get a refund?");
    assert_eq!(data["user_id"], user_id);
    assert_eq!(data["sender_role"], "user");

    let event = tokio::time::timeout(Duration::from_secs(1), admins.recv())
        .await
        .expect("no realtime event")
        .expect("room closed");
    assert_eq!(event.event, NEW_MESSAGE_EVENT);
    assert_eq!(event.payload["id"], data["id"]);
}

#[tokio::test]
async fn test_conversation_round_trip_marks_messages_read() {
    let app = TestApp::new().await;
    let (admin, _) = app.admin("admin@example.com", "admin").await;
    let (token, user_id) = app.signup("learner@example.com", "learner").await;
    let mut learner_room = app.state.realtime.join(&user_room(user_id)).await;

    app.post_json("/api/chat/messages", Some(&token), json!({ "body": "Hello?" }))
        .await;

    let res = app
        .get(&format!("/api/admin/chat/messages?user_id={}", user_id), Some(&admin))
        .await;
    assert_eq!(res.status, 200);
    let thread = res.data();
    assert_eq!(thread.as_array().unwrap().len(), 1);
    assert_eq!(thread[0]["body"], "Hello?");

    let res = app
        .post_json(
            &format!("/api/admin/chat/messages/{}", user_id),
            Some(&admin),
            json!({ "body": "Hi, how can we help?" }),
        )
        .await;
    assert_eq!(res.status, 201, "{}", res.text());
    assert_eq!(res.data()["sender_role"], "admin");

    let event = tokio::time::timeout(Duration::from_secs(1), learner_room.recv())
        .await
        .expect("no realtime event")
        .expect("room closed");
    assert_eq!(event.payload["body"], "Hi, how can we help?");

    let res = app.get("/api/chat/messages", Some(&token)).await;
    assert_eq!(res.status, 200);
    let thread = res.data();
    let bodies: Vec<&str> = thread
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["body"].as_str().unwrap())
        .collect();
    assert_eq!(bodies, vec!["Hello?", "Hi, how can we help?"]);

    let res = app
        .get(&format!("/api/admin/chat/messages?user_id={}", user_id), Some(&admin))
        .await;
    assert_eq!(res.data()[0]["is_read"], true);

    let res = app.get("/api/chat/messages", Some(&token)).await;
    assert_eq!(res.data()[1]["is_read"], true);
}

#[tokio::test]
async fn test_admin_inbox_lists_latest_first() {
    let app = TestApp::new().await;
    let (admin, _) = app.admin("admin@example.com", "admin").await;
    let (first, _) = app.signup("first@example.com", "first").await;
    let (second, _) = app.signup("second@example.com", "second").await;

    app.post_json("/api/chat/messages", Some(&first), json!({ "body": "one" }))
        .await;
    app.post_json("/api/chat/messages", Some(&second), json!({ "body": "two" }))
        .await;

    let res = app.get("/api/admin/chat/messages", Some(&admin)).await;
    assert_eq!(res.status, 200);
    let inbox = res.data();
    assert_eq!(inbox.as_array().unwrap().len(), 2);
    assert_eq!(inbox[0]["body"], "two");
}

#[tokio::test]
async fn test_chat_validation_and_permissions() {
    let app = TestApp::new().await;
    let (admin, _) = app.admin("admin@example.com", "admin").await;
    let (token, user_id) = app.signup("learner@example.com", "learner").await;

    let res = app
        .post_json("/api/chat/messages", Some(&token), json!({ "body": "" }))
        .await;
    assert_eq!(res.status, 400);

    let res = app
        .post_json("/api/chat/messages", None, json!({ "body": "hi" }))
        .await;
    assert_eq!(res.status, 401);

    let res = app.get("/api/admin/chat/messages", Some(&token)).await;
    assert_eq!(res.status, 403);

    let res = app
        .post_json(
            &format!("/api/admin/chat/messages/{}", user_id),
            Some(&token),
            json!({ "body": "pretending" }),
        )
        .await;
    assert_eq!(res.status, 403);

    let res = app
        .post_json("/api/admin/chat/messages/9999", Some(&admin), json!({ "body": "anyone?" }))
        .await;
    assert_eq!(res.status, 404);
}
