use chrono::NaiveDate;
use coursegate::auth::Capability;
use coursegate::models::{course, user};
use coursegate::TestApp;
use reqwest::multipart::{Form, Part};
use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter};

fn csv_form(file_name: &str, csv: &str) -> Form {
    Form::new().part(
        "file",
        Part::bytes(csv.as_bytes().to_vec())
            .file_name(file_name.to_string())
            .mime_str("text/csv")
            .unwrap(),
    )
}

async fn find_user(app: &TestApp, email: &str) -> Option<user::Model> {
    user::Entity::find()
        .filter(user::Column::Email.eq(email))
        .one(&app.db)
        .await
        .unwrap()
}

#[tokio::test]
async fn test_import_creates_user_and_enrolls_by_label() {
    let app = TestApp::new().await;
    let (admin, _) = app.admin("admin@example.com", "admin").await;
    let course = app.create_course("Basics of Trading", 49_900).await;
    let item = app.uploaded_video(course.id, "intro.mp4", b"video").await;

    let csv = "Email,First Name,Last Name,Phone,Labels\n\
               Alice@Example.com,Alice,Smith,+1 555 0100,Basics of Trading\n";
    let res = app
        .post_multipart("/api/admin/import/users", Some(&admin), csv_form("users.csv", csv))
        .await;
    assert_eq!(res.status, 200, "{}", res.text());

    let summary = res.data();
    assert_eq!(summary["total"], 1);
    assert_eq!(summary["successful"], 1);
    assert_eq!(summary["failed"], 0);
    assert_eq!(summary["enrollments"], 1);
    assert_eq!(summary["errors"].as_array().map(Vec::len), Some(0));

    let imported = find_user(&app, "alice@example.com").await.expect("imported user");
    assert_eq!(imported.name.as_deref(), Some("Alice Smith"));
    assert_eq!(imported.phone.as_deref(), Some("+1 555 0100"));
    assert_eq!(imported.auth_provider, "import");
    assert_eq!(imported.username, "alice");

    // The imported learner can now receive the course media.
    let token = app.media_token(imported.id, item.id, Capability::MediaVideo);
    let res = app
        .get(&format!("/api/media/secure-media/video?token={}", token), None)
        .await;
    assert_eq!(res.status, 200);
    assert_eq!(res.body, b"video");
}

#[tokio::test]
async fn test_existing_email_is_a_row_error() {
    let app = TestApp::new().await;
    let (admin, _) = app.admin("admin@example.com", "admin").await;
    app.signup("bob@example.com", "bob").await;

    let csv = "email,name\nBOB@example.com,Bob Again\nnew@example.com,New Person\n";
    let res = app
        .post_multipart("/api/admin/import/users", Some(&admin), csv_form("users.csv", csv))
        .await;
    assert_eq!(res.status, 200, "{}", res.text());

    let summary = res.data();
    assert_eq!(summary["total"], 2);
    assert_eq!(summary["successful"], 1);
    assert_eq!(summary["failed"], 1);
    assert_eq!(
        summary["errors"][0],
        "Row 2: Conflict: User with email bob@example.com already exists"
    );
    assert!(find_user(&app, "new@example.com").await.is_some());
}

#[tokio::test]
async fn test_reimporting_the_same_file_creates_no_duplicates() {
    let app = TestApp::new().await;
    let (admin, _) = app.admin("admin@example.com", "admin").await;
    let course = app.create_course("Basics of Trading", 49_900).await;
    let csv = "email,name,labels
frank@example.com,Frank,Basics of Trading
";

    let res = app
        .post_multipart("/api/admin/import/users", Some(&admin), csv_form("users.csv", csv))
        .await;
    assert_eq!(res.data()["successful"], 1);
    assert_eq!(res.data()["enrollments"], 1);

    let res = app
        .post_multipart("/api/admin/import/users", Some(&admin), csv_form("users.csv", csv))
        .await;
    assert_eq!(res.status, 200, "{}", res.text());
    let summary = res.data();
    assert_eq!(summary["successful"], 0);
    assert_eq!(summary["failed"], 1);
    assert_eq!(summary["enrollments"], 0);
    assert!(summary["errors"][0]
        .as_str()
        .unwrap()
        .starts_with("Row 2: Conflict:"));

    let accounts = user::Entity::find()
        .filter(user::Column::Email.eq("frank@example.com"))
        .count(&app.db)
        .await
        .unwrap();
    assert_eq!(accounts, 1);
    let enrolled = course::Entity::find_by_id(course.id)
        .one(&app.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(enrolled.enrollment_count, 1);
}

#[tokio::test]
async fn test_bad_rows_do_not_abort_the_batch() {
    let app = TestApp::new().await;
    let (admin, _) = app.admin("admin@example.com", "admin").await;

    let csv = "E-mail Address,Full Name,Date of Birth\n\
               good@example.com,Good One,03/15/1990\n\
               not-an-email,Bad Row,\n\
               \n\
               ,No Email,\n\
               third@example.com,Third,1985-07-04\n";
    let res = app
        .post_multipart("/api/admin/import/users", Some(&admin), csv_form("export.csv", csv))
        .await;
    assert_eq!(res.status, 200, "{}", res.text());

    let summary = res.data();
    assert_eq!(summary["total"], 4);
    assert_eq!(summary["successful"], 2);
    assert_eq!(summary["failed"], 2);
    let errors: Vec<String> = summary["errors"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e.as_str().unwrap().to_string())
        .collect();
    assert!(errors[0].starts_with("Row 3: "), "{:?}", errors);
    assert!(errors[1].starts_with("Row 5: "), "{:?}", errors);

    let good = find_user(&app, "good@example.com").await.unwrap();
    assert_eq!(good.birthday, NaiveDate::from_ymd_opt(1990, 3, 15));
    let third = find_user(&app, "third@example.com").await.unwrap();
    assert_eq!(third.birthday, NaiveDate::from_ymd_opt(1985, 7, 4));
}

#[tokio::test]
async fn test_labels_without_courses_become_warnings() {
    let app = TestApp::new().await;
    let (admin, _) = app.admin("admin@example.com", "admin").await;

    let csv = "email,labels\ncarol@example.com,Advanced Trading; Not A Course\n";
    let res = app
        .post_multipart("/api/admin/import/users", Some(&admin), csv_form("users.csv", csv))
        .await;
    assert_eq!(res.status, 200, "{}", res.text());

    let summary = res.data();
    assert_eq!(summary["successful"], 1);
    assert_eq!(summary["enrollments"], 0);
    let warnings = summary["warnings"].as_array().unwrap();
    assert_eq!(warnings.len(), 1);
    assert!(warnings[0].as_str().unwrap().contains("advanced-trading"));
}

#[tokio::test]
async fn test_usernames_stay_unique() {
    let app = TestApp::new().await;
    let (admin, _) = app.admin("admin@example.com", "admin").await;
    app.signup("dave@other.org", "dave").await;

    let csv = "email\ndave@example.com\n";
    let res = app
        .post_multipart("/api/admin/import/users", Some(&admin), csv_form("users.csv", csv))
        .await;
    assert_eq!(res.status, 200);

    let imported = find_user(&app, "dave@example.com").await.unwrap();
    assert_eq!(imported.username, "dave1");
}

#[tokio::test]
async fn test_file_without_email_column_is_rejected() {
    let app = TestApp::new().await;
    let (admin, _) = app.admin("admin@example.com", "admin").await;

    let csv = "name,phone\nEve,123\n";
    let res = app
        .post_multipart("/api/admin/import/users", Some(&admin), csv_form("users.csv", csv))
        .await;
    assert_eq!(res.status, 400);
    assert_eq!(res.error_code().as_deref(), Some("VALIDATION_ERROR"));
}

#[tokio::test]
async fn test_only_csv_files_are_accepted() {
    let app = TestApp::new().await;
    let (admin, _) = app.admin("admin@example.com", "admin").await;

    let res = app
        .post_multipart(
            "/api/admin/import/users",
            Some(&admin),
            csv_form("users.txt", "email\nx@example.com\n"),
        )
        .await;
    assert_eq!(res.status, 400);

    let res = app
        .post_multipart("/api/admin/import/users", Some(&admin), Form::new().text("note", "no file"))
        .await;
    assert_eq!(res.status, 400);
}

#[tokio::test]
async fn test_import_requires_admin() {
    let app = TestApp::new().await;
    let (token, _) = app.signup("user@example.com", "user").await;

    let res = app
        .post_multipart(
            "/api/admin/import/users",
            Some(&token),
            csv_form("users.csv", "email\nx@example.com\n"),
        )
        .await;
    assert_eq!(res.status, 403);

    let res = app
        .post_multipart(
            "/api/admin/import/users",
            None,
            csv_form("users.csv", "email\nx@example.com\n"),
        )
        .await;
    assert_eq!(res.status, 401);
}
