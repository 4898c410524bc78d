use coursegate::integrations::OrderStatus;
use coursegate::models::course;
use coursegate::TestApp;
use sea_orm::EntityTrait;
use serde_json::json;

async fn enrollment_count(app: &TestApp, course_id: i32) -> i32 {
    course::Entity::find_by_id(course_id)
        .one(&app.db)
        .await
        .unwrap()
        .unwrap()
        .enrollment_count
}

#[tokio::test]
async fn test_free_course_enrolls_immediately() {
    let app = TestApp::new().await;
    let (token, _) = app.signup("free@example.com", "free").await;
    let course = app.create_course("Personal Finance", 0).await;

    let res = app
        .post_json(&format!("/api/courses/{}/enroll", course.id), Some(&token), json!({}))
        .await;
    assert_eq!(res.status, 200, "{}", res.text());
    assert_eq!(res.data()["status"], "enrolled");
    assert_eq!(res.data()["enrollment"]["payment_status"], "completed");
    assert_eq!(enrollment_count(&app, course.id).await, 1);

    let res = app
        .post_json(&format!("/api/courses/{}/enroll", course.id), Some(&token), json!({}))
        .await;
    assert_eq!(res.status, 409);
    assert_eq!(enrollment_count(&app, course.id).await, 1);
}

#[tokio::test]
async fn test_enroll_accepts_an_empty_body() {
    let app = TestApp::new().await;
    let (token, _) = app.signup("empty@example.com", "empty").await;
    let course = app.create_course("Free Basics", 0).await;

    let res = app
        .send(
            app.client
                .post(app.url(&format!("/api/courses/{}/enroll", course.id)))
                .bearer_auth(&token),
        )
        .await;
    assert_eq!(res.status, 200, "{}", res.text());
}

#[tokio::test]
async fn test_paid_course_goes_through_payment() {
    let app = TestApp::new().await;
    let (token, user_id) = app.signup("buyer@example.com", "buyer").await;
    let course = app.create_course("Advanced Trading", 49_900).await;

    let res = app
        .post_json(&format!("/api/courses/{}/enroll", course.id), Some(&token), json!({}))
        .await;
    assert_eq!(res.status, 200, "{}", res.text());
    let data = res.data();
    assert_eq!(data["status"], "payment_required");
    assert_eq!(data["enrollment"]["payment_status"], "pending");
    let order_id = data["order"]["id"].as_str().unwrap().to_string();
    assert_eq!(data["order"]["amount"], 49_900);
    assert_eq!(data["order"]["currency"], "INR");

    // Pending orders do not unlock anything.
    let res = app
        .post_json("/api/payments/verify", Some(&token), json!({ "order_id": order_id }))
        .await;
    assert_eq!(res.data()["result"], "pending");
    assert!(app
        .state
        .entitlement
        .completed_enrollment(user_id, course.id)
        .await
        .unwrap()
        .is_none());

    app.payments.set_status(&order_id, OrderStatus::Paid);
    let res = app
        .post_json("/api/payments/verify", Some(&token), json!({ "order_id": order_id }))
        .await;
    assert_eq!(res.status, 200);
    assert_eq!(res.data()["result"], "completed");
    assert_eq!(res.data()["enrollment"]["amount_paid"], 49_900);
    assert_eq!(enrollment_count(&app, course.id).await, 1);

    let confirmation = app
        .emails
        .wait_for("buyer@example.com", "Enrollment confirmed")
        .await
        .expect("confirmation email");
    assert!(confirmation.html.contains("499.00 INR"));

    // Verifying again is harmless.
    let res = app
        .post_json("/api/payments/verify", Some(&token), json!({ "order_id": order_id }))
        .await;
    assert_eq!(res.data()["result"], "already_completed");
    assert_eq!(enrollment_count(&app, course.id).await, 1);
}

#[tokio::test]
async fn test_failed_payment_can_be_retried() {
    let app = TestApp::new().await;
    let (token, _) = app.signup("retry@example.com", "retry").await;
    let course = app.create_course("Options Trading", 10_000).await;
    let enroll = format!("/api/courses/{}/enroll", course.id);

    let res = app.post_json(&enroll, Some(&token), json!({})).await;
    let order_id = res.data()["order"]["id"].as_str().unwrap().to_string();
    app.payments.set_status(&order_id, OrderStatus::Failed);

    let res = app
        .post_json("/api/payments/verify", Some(&token), json!({ "order_id": order_id }))
        .await;
    assert_eq!(res.data()["result"], "failed");
    assert_eq!(res.data()["enrollment"]["payment_status"], "failed");

    let res = app.post_json(&enroll, Some(&token), json!({})).await;
    assert_eq!(res.status, 200);
    assert_eq!(res.data()["status"], "payment_required");
    assert_ne!(res.data()["order"]["id"], order_id.as_str());
}

#[tokio::test]
async fn test_verify_rejects_foreign_orders() {
    let app = TestApp::new().await;
    let (buyer, _) = app.signup("owner@example.com", "owner").await;
    let (other, _) = app.signup("other@example.com", "other").await;
    let course = app.create_course("Technical Analysis", 5_000).await;

    let res = app
        .post_json(&format!("/api/courses/{}/enroll", course.id), Some(&buyer), json!({}))
        .await;
    let order_id = res.data()["order"]["id"].as_str().unwrap().to_string();

    let res = app
        .post_json("/api/payments/verify", Some(&other), json!({ "order_id": order_id }))
        .await;
    assert_eq!(res.status, 404);
}

#[tokio::test]
async fn test_coupons_discount_and_can_make_a_course_free() {
    let app = TestApp::new().await;
    let (admin, _) = app.admin("admin@example.com", "admin").await;
    let (token, _) = app.signup("saver@example.com", "saver").await;
    let course = app.create_course("Basics of Trading", 20_000).await;
    let other = app.create_course("Advanced Trading", 20_000).await;

    let res = app
        .post_json(
            "/api/admin/coupons",
            Some(&admin),
            json!({ "code": "half50", "discount_percent": 50 }),
        )
        .await;
    assert_eq!(res.status, 201, "{}", res.text());
    assert_eq!(res.data()["code"], "HALF50");

    let res = app
        .post_json(
            "/api/admin/coupons",
            Some(&admin),
            json!({ "code": "FREEBIE", "discount_percent": 100, "course_id": other.id, "max_uses": 1 }),
        )
        .await;
    assert_eq!(res.status, 201);

    let res = app
        .post_json(
            &format!("/api/courses/{}/enroll", course.id),
            Some(&token),
            json!({ "coupon_code": "half50" }),
        )
        .await;
    assert_eq!(res.data()["order"]["amount"], 10_000);

    // Course-bound coupon on the wrong course.
    let res = app
        .post_json(
            &format!("/api/courses/{}/enroll", course.id),
            Some(&token),
            json!({ "coupon_code": "FREEBIE" }),
        )
        .await;
    assert_eq!(res.status, 400);

    let res = app
        .post_json(
            &format!("/api/courses/{}/enroll", other.id),
            Some(&token),
            json!({ "coupon_code": "FREEBIE" }),
        )
        .await;
    assert_eq!(res.status, 200, "{}", res.text());
    assert_eq!(res.data()["status"], "enrolled");

    let res = app
        .post_json(
            &format!("/api/courses/{}/enroll", course.id),
            Some(&token),
            json!({ "coupon_code": "NOSUCH" }),
        )
        .await;
    assert_eq!(res.status, 400);
}

#[tokio::test]
async fn test_duplicate_coupon_code_conflicts() {
    let app = TestApp::new().await;
    let (admin, _) = app.admin("admin@example.com", "admin").await;
    let body = json!({ "code": "SPRING", "discount_percent": 10 });

    assert_eq!(app.post_json("/api/admin/coupons", Some(&admin), body.clone()).await.status, 201);
    assert_eq!(app.post_json("/api/admin/coupons", Some(&admin), body).await.status, 409);
}

#[tokio::test]
async fn test_my_enrollments_lists_courses() {
    let app = TestApp::new().await;
    let (token, user_id) = app.signup("mine@example.com", "mine").await;
    let first = app.create_course("First Course", 0).await;
    let second = app.create_course("Second Course", 0).await;
    app.enroll(user_id, first.id).await;
    app.enroll(user_id, second.id).await;

    let res = app.get("/api/enrollments", Some(&token)).await;
    assert_eq!(res.status, 200);
    let items = res.data();
    let items = items.as_array().unwrap();
    assert_eq!(items.len(), 2);
    let titles: Vec<&str> = items
        .iter()
        .map(|i| i["course"]["title"].as_str().unwrap())
        .collect();
    assert!(titles.contains(&"First Course"));
    assert!(titles.contains(&"Second Course"));
}

#[tokio::test]
async fn test_progress_counts_each_item_once() {
    let app = TestApp::new().await;
    let (token, user_id) = app.signup("progress@example.com", "progress").await;
    let course = app.create_course("Three Lessons", 0).await;
    let a = app.uploaded_video(course.id, "a.mp4", b"a").await;
    let b = app.uploaded_video(course.id, "b.mp4", b"b").await;
    let c = app.uploaded_video(course.id, "c.mp4", b"c").await;

    // Not enrolled yet.
    let res = app
        .post_json(&format!("/api/contents/{}/complete", a.id), Some(&token), json!({}))
        .await;
    assert_eq!(res.status, 403);

    app.enroll(user_id, course.id).await;

    let complete = |id: i32| format!("/api/contents/{}/complete", id);
    let res = app.post_json(&complete(a.id), Some(&token), json!({})).await;
    assert_eq!(res.status, 200, "{}", res.text());
    assert_eq!(res.data()["progress"], 33);

    let res = app.post_json(&complete(a.id), Some(&token), json!({})).await;
    assert_eq!(res.data()["progress"], 33);
    assert_eq!(res.data()["completed_items"], 1);

    app.post_json(&complete(b.id), Some(&token), json!({})).await;
    let res = app.post_json(&complete(c.id), Some(&token), json!({})).await;
    assert_eq!(res.data()["progress"], 100);
    assert_eq!(res.data()["is_completed"], true);

    let res = app.get("/api/enrollments", Some(&token)).await;
    assert_eq!(res.data()[0]["enrollment"]["progress"], 100);
    assert_eq!(res.data()[0]["enrollment"]["is_completed"], true);
}
