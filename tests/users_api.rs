mod common;

use axum::http::StatusCode;
use common::{project_body, TestApp};
use county_tracker::domain::Role;
use serde_json::json;

#[tokio::test]
async fn only_admins_list_users() {
    let app = TestApp::new();
    let (_, admin) = app.admin().await;
    let (_, staff) = app.staff("Officer").await;
    let (_, citizen) = app.seed_user("Citizen", Role::Public, true).await;

    let (status, body) = app.get("/api/users", Some(&admin)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 3);
    assert!(body["users"][0].get("passwordHash").is_none());

    for token in [&staff, &citizen] {
        let (status, body) = app.get("/api/users", Some(token)).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"], "Access denied");
    }

    let (status, _) = app.get("/api/users", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn admin_creates_approved_accounts() {
    let app = TestApp::new();
    let (_, admin) = app.admin().await;

    let (status, body) = app
        .post(
            "/api/users",
            Some(&admin),
            json!({
                "name": "Site Engineer",
                "email": "Engineer@County.go.ke",
                "password": "longenough",
                "role": "STAFF",
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["message"], "User created successfully");
    assert_eq!(body["user"]["role"], "STAFF");
    assert_eq!(body["user"]["isApproved"], true);
    assert_eq!(body["user"]["email"], "engineer@county.go.ke");

    let (status, body) = app
        .post(
            "/api/auth/login",
            None,
            json!({ "email": "engineer@county.go.ke", "password": "longenough" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["role"], "STAFF");
}

#[tokio::test]
async fn create_user_validates_fields_and_role() {
    let app = TestApp::new();
    let (_, admin) = app.admin().await;

    let (status, body) = app
        .post(
            "/api/users",
            Some(&admin),
            json!({ "name": "X", "email": "x@example.com", "password": "123456" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Name, email, password, and role are required");

    let (status, body) = app
        .post(
            "/api/users",
            Some(&admin),
            json!({ "name": "X", "email": "x@example.com", "password": "123456", "role": "MAYOR" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Role must be PUBLIC, STAFF, or ADMIN");
}

#[tokio::test]
async fn pending_staff_listing_and_approval() {
    let app = TestApp::new();
    let (_, admin) = app.admin().await;
    let (pending, pending_token) = app.seed_user("Awaiting", Role::Staff, false).await;
    app.staff("Approved").await;

    let (status, body) = app.get("/api/users/pending", Some(&admin)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 1);
    assert_eq!(body["users"][0]["id"], pending.id.to_string());

    let (_, body) = app.get("/api/users/staff", Some(&admin)).await;
    assert_eq!(body["count"], 2);

    // not approved yet
    let (status, _) = app
        .post("/api/projects", Some(&pending_token), project_body("Borehole"))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let uri = format!("/api/users/{}/approve", pending.id);
    let (status, body) = app.put(&uri, Some(&admin), json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Staff user approved successfully");
    assert_eq!(body["user"]["isApproved"], true);

    let (status, body) = app.put(&uri, Some(&admin), json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Staff user is already approved");

    // approval takes effect on the same token
    let (status, _) = app
        .post("/api/projects", Some(&pending_token), project_body("Borehole"))
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (_, body) = app.get("/api/users/pending", Some(&admin)).await;
    assert_eq!(body["count"], 0);
}

#[tokio::test]
async fn approving_non_staff_is_rejected() {
    let app = TestApp::new();
    let (_, admin) = app.admin().await;
    let (citizen, _) = app.seed_user("Citizen", Role::Public, true).await;

    let (status, body) = app
        .put(&format!("/api/users/{}/approve", citizen.id), Some(&admin), json!({}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Only staff users can be approved");

    let (status, _) = app
        .put(
            &format!("/api/users/{}/approve", uuid::Uuid::new_v4()),
            Some(&admin),
            json!({}),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn get_user_includes_activity_counts() {
    let app = TestApp::new();
    let (_, admin) = app.admin().await;
    let (staff, token) = app.staff("Busy").await;
    let project_id = app.create_project(&token, project_body("Classroom")).await;
    app.comment(Some(&token), json!({ "projectId": project_id, "content": "Roofing done" }))
        .await;

    let (status, body) = app
        .get(&format!("/api/users/{}", staff.id), Some(&admin))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["name"], "Busy");
    assert_eq!(body["user"]["projectCount"], 1);
    assert_eq!(body["user"]["commentCount"], 1);

    let (status, _) = app
        .get(&format!("/api/users/{}", uuid::Uuid::new_v4()), Some(&admin))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn update_user_changes_fields_and_guards_email() {
    let app = TestApp::new();
    let (_, admin) = app.admin().await;
    let (target, _) = app.seed_user("Target", Role::Public, true).await;
    let (other, _) = app.seed_user("Other", Role::Public, true).await;
    let uri = format!("/api/users/{}", target.id);

    let (status, body) = app
        .put(&uri, Some(&admin), json!({ "email": other.email }))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "Conflict");

    let (status, _) = app
        .put(&uri, Some(&admin), json!({ "role": "OVERLORD" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app
        .put(
            &uri,
            Some(&admin),
            json!({ "name": "Renamed", "role": "STAFF", "email": "new@example.com" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "User updated successfully");
    assert_eq!(body["user"]["name"], "Renamed");
    assert_eq!(body["user"]["role"], "STAFF");
    assert_eq!(body["user"]["email"], "new@example.com");
    assert_eq!(body["user"]["isApproved"], true);
}

#[tokio::test]
async fn delete_user_rules() {
    let app = TestApp::new();
    let (admin, admin_token) = app.admin().await;
    let (staff, staff_token) = app.staff("Leaving").await;
    let project_id = app.create_project(&staff_token, project_body("Library")).await;
    app.comment(
        Some(&staff_token),
        json!({ "projectId": project_id, "content": "Almost there" }),
    )
    .await;

    let (status, body) = app
        .delete(&format!("/api/users/{}", admin.id), Some(&admin_token))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "You cannot delete your own account");

    let (status, _) = app
        .delete(&format!("/api/users/{}", uuid::Uuid::new_v4()), Some(&admin_token))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = app
        .delete(&format!("/api/users/{}", staff.id), Some(&admin_token))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "User deleted successfully");

    // projects and comments outlive their author
    let (status, body) = app.get(&format!("/api/projects/{project_id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["project"]["staffId"].is_null());
    assert_eq!(body["project"]["commentCount"], 1);
    assert!(body["project"]["comments"][0]["userId"].is_null());
    assert_eq!(body["project"]["comments"][0]["userName"], "Leaving");
}
