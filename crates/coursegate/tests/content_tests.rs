use coursegate::models::content_item;
use coursegate::TestApp;
use reqwest::multipart::{Form, Part};
use sea_orm::EntityTrait;
use serde_json::json;

fn video_form(title: &str, file_name: &str, bytes: &[u8]) -> Form {
    Form::new()
        .text("title", title.to_string())
        .text("content_type", "video")
        .text("order", "1")
        .part("video", Part::bytes(bytes.to_vec()).file_name(file_name.to_string()))
}

#[tokio::test]
async fn test_admin_course_crud_and_catalog() {
    let app = TestApp::new().await;
    let (admin, _) = app.admin("admin@example.com", "admin").await;

    let res = app
        .post_json(
            "/api/admin/courses",
            Some(&admin),
            json!({ "title": "Options 101", "description": "Calls and puts", "price": 99_900 }),
        )
        .await;
    assert_eq!(res.status, 201, "{}", res.text());
    let course = res.data();
    assert_eq!(course["slug"], "options-101");
    let id = course["id"].as_i64().unwrap();

    let res = app
        .post_json("/api/admin/courses", Some(&admin), json!({ "title": "Options 101", "price": 0 }))
        .await;
    assert_eq!(res.status, 409);

    let res = app.get("/api/courses", None).await;
    assert_eq!(res.status, 200);
    assert_eq!(res.data().as_array().unwrap().len(), 1);

    let res = app
        .patch_json(
            &format!("/api/admin/courses/{}", id),
            Some(&admin),
            json!({ "is_active": false }),
        )
        .await;
    assert_eq!(res.status, 200);
    assert_eq!(res.data()["is_active"], false);

    let res = app.get("/api/courses", None).await;
    assert!(res.data().as_array().unwrap().is_empty());
    let res = app.get(&format!("/api/courses/{}", id), None).await;
    assert_eq!(res.status, 404);
}

#[tokio::test]
async fn test_course_admin_requires_admin_role() {
    let app = TestApp::new().await;
    let (token, _) = app.signup("learner@example.com", "learner").await;

    let res = app
        .post_json("/api/admin/courses", Some(&token), json!({ "title": "Nope", "price": 0 }))
        .await;
    assert_eq!(res.status, 403);
    assert_eq!(res.error_code().as_deref(), Some("FORBIDDEN"));
}

#[tokio::test]
async fn test_create_content_with_uploaded_video() {
    let app = TestApp::new().await;
    let (admin, _) = app.admin("admin@example.com", "admin").await;
    let course = app.create_course("Charting", 0).await;

    let res = app
        .post_multipart(
            &format!("/api/admin/courses/{}/contents", course.id),
            Some(&admin),
            video_form("Candles", "candles.mp4", b"fake video bytes"),
        )
        .await;
    assert_eq!(res.status, 201, "{}", res.text());
    let data = res.data();
    assert_eq!(data["title"], "Candles");
    assert_eq!(data["content_type"], "video");
    assert_eq!(data["video_file"]["original_name"], "candles.mp4");
    assert_eq!(data["video_file"]["size"], 16);

    let stored = data["video_file"]["stored_name"].as_str().unwrap();
    assert_ne!(stored, "candles.mp4");
    assert!(app.state.storage.exists(stored).await);
}

#[tokio::test]
async fn test_create_content_validation() {
    let app = TestApp::new().await;
    let (admin, _) = app.admin("admin@example.com", "admin").await;
    let course = app.create_course("Charting", 0).await;
    let path = format!("/api/admin/courses/{}/contents", course.id);

    // Wrong extension for the slot.
    let res = app
        .post_multipart(&path, Some(&admin), video_form("Bad", "notes.pdf", b"%PDF"))
        .await;
    assert_eq!(res.status, 400);

    // No media at all.
    let form = Form::new().text("title", "Empty").text("content_type", "video");
    let res = app.post_multipart(&path, Some(&admin), form).await;
    assert_eq!(res.status, 400);

    // URL and file in the same slot.
    let form = video_form("Both", "a.mp4", b"x").text("video_url", "https://youtu.be/abc");
    let res = app.post_multipart(&path, Some(&admin), form).await;
    assert_eq!(res.status, 400);

    let form = Form::new()
        .text("title", "Script")
        .text("content_type", "video")
        .text("video_url", "javascript:alert(1)");
    let res = app.post_multipart(&path, Some(&admin), form).await;
    assert_eq!(res.status, 400);

    let res = app
        .post_multipart(
            "/api/admin/courses/9999/contents",
            Some(&admin),
            video_form("Lost", "a.mp4", b"x"),
        )
        .await;
    assert_eq!(res.status, 404);
}

#[tokio::test]
async fn test_update_replaces_file_with_url() {
    let app = TestApp::new().await;
    let (admin, _) = app.admin("admin@example.com", "admin").await;
    let course = app.create_course("Charting", 0).await;
    let item = app.uploaded_video(course.id, "old.mp4", b"old").await;
    let old_name = item.video_file_path.clone().unwrap();
    assert!(app.state.storage.exists(&old_name).await);

    let form = Form::new()
        .text("title", "Renamed")
        .text("video_url", "https://www.youtube.com/watch?v=dQw4w9WgXcQ")
        .text("is_free_preview", "true");
    let res = app
        .send(
            app.client
                .patch(app.url(&format!("/api/admin/contents/{}", item.id)))
                .bearer_auth(&admin)
                .multipart(form),
        )
        .await;
    assert_eq!(res.status, 200, "{}", res.text());
    let data = res.data();
    assert_eq!(data["title"], "Renamed");
    assert_eq!(data["is_free_preview"], true);
    assert!(data["video_file"].is_null());
    assert_eq!(data["video_url"], "https://www.youtube.com/watch?v=dQw4w9WgXcQ");
    assert!(!app.state.storage.exists(&old_name).await);
}

#[tokio::test]
async fn test_update_cannot_leave_the_type_without_media() {
    let app = TestApp::new().await;
    let (admin, _) = app.admin("admin@example.com", "admin").await;
    let course = app.create_course("Charting", 0).await;
    let item = app
        .uploaded_document(course.id, "notes.pdf", "application/pdf", b"%PDF-1.4")
        .await;
    let path = format!("/api/admin/contents/{}", item.id);
    let patch = |form: Form| app.client.patch(app.url(&path)).bearer_auth(&admin).multipart(form);

    let res = app.send(patch(Form::new().text("content_type", "video"))).await;
    assert_eq!(res.status, 400, "{}", res.text());
    assert_eq!(res.error_code().as_deref(), Some("VALIDATION_ERROR"));

    let unchanged = content_item::Entity::find_by_id(item.id)
        .one(&app.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(unchanged.content_type, "document");

    // Supplying the missing slot in the same request is fine.
    let form = Form::new()
        .text("content_type", "video")
        .text("video_url", "https://youtu.be/dQw4w9WgXcQ");
    let res = app.send(patch(form)).await;
    assert_eq!(res.status, 200, "{}", res.text());
    assert_eq!(res.data()["content_type"], "video");
    assert_eq!(res.data()["document_file"]["original_name"], "notes.pdf");
}

#[tokio::test]
async fn test_delete_content_removes_file_and_progress() {
    let app = TestApp::new().await;
    let (admin, _) = app.admin("admin@example.com", "admin").await;
    let (token, user_id) = app.signup("learner@example.com", "learner").await;
    let course = app.create_course("Charting", 0).await;
    let item = app.uploaded_video(course.id, "lesson.mp4", b"bytes").await;
    let stored = item.video_file_path.clone().unwrap();
    app.enroll(user_id, course.id).await;

    let res = app
        .post_json(&format!("/api/contents/{}/complete", item.id), Some(&token), json!({}))
        .await;
    assert_eq!(res.status, 200, "{}", res.text());

    let res = app
        .delete(&format!("/api/admin/contents/{}", item.id), Some(&admin))
        .await;
    assert_eq!(res.status, 200);
    assert_eq!(res.data()["progress_records_removed"], 1);
    assert!(!app.state.storage.exists(&stored).await);

    let res = app
        .delete(&format!("/api/admin/contents/{}", item.id), Some(&admin))
        .await;
    assert_eq!(res.status, 404);
}

#[tokio::test]
async fn test_outline_locks_items_for_visitors() {
    let app = TestApp::new().await;
    let (token, _) = app.signup("visitor@example.com", "visitor").await;
    let course = app.create_course("Charting", 49_900).await;
    let locked = app.uploaded_video(course.id, "paid.mp4", b"paid").await;
    let preview = app
        .external_video(course.id, "https://youtu.be/dQw4w9WgXcQ", true)
        .await;

    let res = app
        .get(&format!("/api/courses/{}/contents", course.id), Some(&token))
        .await;
    assert_eq!(res.status, 200, "{}", res.text());
    let data = res.data();
    assert_eq!(data["enrolled"], false);

    let items = data["items"].as_array().unwrap();
    let find = |id: i32| items.iter().find(|i| i["id"] == id).unwrap().clone();

    let paid = find(locked.id);
    assert_eq!(paid["locked"], true);
    assert!(paid["video"].is_null());

    let free = find(preview.id);
    assert_eq!(free["locked"], false);
    assert!(free["video"].is_null());
}

#[tokio::test]
async fn test_outline_for_enrolled_learner() {
    let app = TestApp::new().await;
    let (token, user_id) = app.signup("learner@example.com", "learner").await;
    let course = app.create_course("Charting", 49_900).await;
    let item = app.uploaded_video(course.id, "lesson.mp4", b"bytes").await;
    app.enroll(user_id, course.id).await;

    let res = app
        .get(&format!("/api/courses/{}/contents", course.id), Some(&token))
        .await;
    let data = res.data();
    assert_eq!(data["enrolled"], true);
    let entry = &data["items"][0];
    assert_eq!(entry["id"], item.id);
    assert_eq!(entry["locked"], false);
    let url = entry["video"]["url"].as_str().unwrap();
    assert!(url.starts_with("/api/media/secure-media/video?token="));

    let res = app.get(url, None).await;
    assert_eq!(res.status, 200);
    assert_eq!(res.body, b"bytes");
}

#[tokio::test]
async fn test_outline_of_inactive_course_is_forbidden() {
    let app = TestApp::new().await;
    let (admin, _) = app.admin("admin@example.com", "admin").await;
    let course = app.create_course("Retired", 0).await;

    let res = app
        .patch_json(
            &format!("/api/admin/courses/{}", course.id),
            Some(&admin),
            json!({ "is_active": false }),
        )
        .await;
    assert_eq!(res.status, 200);

    let res = app
        .get(&format!("/api/courses/{}/contents", course.id), Some(&admin))
        .await;
    assert_eq!(res.status, 403);

    let res = app.get("/api/courses/9999/contents", Some(&admin)).await;
    assert_eq!(res.status, 404);
}
