mod common;

use axum::http::StatusCode;
use common::{project_body, TestApp};
use county_tracker::domain::Role;
use serde_json::json;

#[tokio::test]
async fn unapproved_staff_cannot_create_projects() {
    let app = TestApp::new();
    let (_, token) = app.seed_user("Pending Staff", Role::Staff, false).await;

    let (status, body) = app
        .post("/api/projects", Some(&token), project_body("Borehole"))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "Access denied");
    assert!(app.state.projects.list(&Default::default()).await.unwrap().is_empty());
}

#[tokio::test]
async fn public_users_cannot_create_projects() {
    let app = TestApp::new();
    let (_, token) = app.seed_user("Citizen", Role::Public, true).await;
    let (status, _) = app
        .post("/api/projects", Some(&token), project_body("Road"))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app.post("/api/projects", None, project_body("Road")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn approved_staff_creates_and_owns_project() {
    let app = TestApp::new();
    let (staff, token) = app.staff("Field Officer").await;

    let (status, body) = app
        .post("/api/projects", Some(&token), project_body("Market Shed"))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["message"], "Project created successfully");
    let project = &body["project"];
    assert_eq!(project["title"], "Market Shed");
    assert_eq!(project["status"], "ongoing");
    assert_eq!(project["staffId"], staff.id.to_string());
    assert_eq!(project["createdById"], staff.id.to_string());
    assert_eq!(project["lastEditedById"], staff.id.to_string());
    assert_eq!(project["staff"]["name"], "Field Officer");
}

#[tokio::test]
async fn title_is_required() {
    let app = TestApp::new();
    let (_, token) = app.admin().await;
    let (status, body) = app
        .post("/api/projects", Some(&token), json!({ "description": "no title" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Title is required");
}

#[tokio::test]
async fn unknown_status_value_is_rejected() {
    let app = TestApp::new();
    let (_, token) = app.admin().await;
    let (status, _) = app
        .post(
            "/api/projects",
            Some(&token),
            json!({ "title": "Bridge", "status": "abandoned" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app.get("/api/projects?status=abandoned", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn missing_project_is_not_found() {
    let app = TestApp::new();
    let (status, body) = app
        .get(&format!("/api/projects/{}", uuid::Uuid::new_v4()), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Project does not exist");
    assert!(body.get("project").is_none());
}

#[tokio::test]
async fn admin_assigns_project_to_approved_staff_only() {
    let app = TestApp::new();
    let (_, admin) = app.admin().await;
    let (staff, _) = app.staff("Engineer").await;
    let (pending, _) = app.seed_user("Newcomer", Role::Staff, false).await;
    let (citizen, _) = app.seed_user("Citizen", Role::Public, true).await;

    let mut body = project_body("Clinic");
    body["staffId"] = json!(pending.id);
    let (status, _) = app.post("/api/projects", Some(&admin), body.clone()).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    body["staffId"] = json!(citizen.id);
    let (status, _) = app.post("/api/projects", Some(&admin), body.clone()).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    body["staffId"] = json!(staff.id);
    let (status, json) = app.post("/api/projects", Some(&admin), body).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["project"]["staffId"], staff.id.to_string());
}

#[tokio::test]
async fn staff_cannot_touch_projects_they_do_not_own() {
    let app = TestApp::new();
    let (_, owner) = app.staff("Owner").await;
    let (_, other) = app.staff("Other").await;
    let id = app.create_project(&owner, project_body("Water Pan")).await;

    let (status, body) = app
        .put(
            &format!("/api/projects/{id}"),
            Some(&other),
            json!({ "progress": 90 }),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "Access denied");

    let (status, _) = app.delete(&format!("/api/projects/{id}"), Some(&other)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn owner_updates_only_given_fields() {
    let app = TestApp::new();
    let (_, owner) = app.staff("Owner").await;
    let (admin, admin_token) = app.admin().await;
    let id = app.create_project(&owner, project_body("Footbridge")).await;

    let (status, body) = app
        .put(
            &format!("/api/projects/{id}"),
            Some(&owner),
            json!({ "progress": 40, "status": "stalled" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["project"]["progress"], 40);
    assert_eq!(body["project"]["status"], "stalled");
    assert_eq!(body["project"]["title"], "Footbridge");
    assert_eq!(body["project"]["ward"], "Township");

    let (status, body) = app
        .put(
            &format!("/api/projects/{id}"),
            Some(&admin_token),
            json!({ "contractor": "Acme Builders" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["project"]["lastEditedById"], admin.id.to_string());
    assert_eq!(body["project"]["contractor"], "Acme Builders");
}

#[tokio::test]
async fn update_validates_ranges() {
    let app = TestApp::new();
    let (_, owner) = app.staff("Owner").await;
    let id = app.create_project(&owner, project_body("Dispensary")).await;

    let (status, _) = app
        .put(
            &format!("/api/projects/{id}"),
            Some(&owner),
            json!({ "progress": 140 }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .put(
            &format!("/api/projects/{}", uuid::Uuid::new_v4()),
            Some(&owner),
            json!({ "progress": 10 }),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn delete_removes_project_and_comments() {
    let app = TestApp::new();
    let (_, owner) = app.staff("Owner").await;
    let id = app.create_project(&owner, project_body("Cattle Dip")).await;
    let (status, _) = app
        .comment(Some(&owner), json!({ "projectId": id, "content": "Started" }))
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = app.delete(&format!("/api/projects/{id}"), Some(&owner)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Project deleted successfully");

    let (status, _) = app.get(&format!("/api/projects/{id}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let project_id = id.parse().unwrap();
    assert!(app
        .state
        .comments
        .list_by_project(project_id)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn listing_filters_and_orders_newest_first() {
    let app = TestApp::new();
    let (_, token) = app.staff("Planner").await;
    app.create_project(&token, project_body("Kiharu Water Supply")).await;
    let mut stalled = project_body("Gatanga Road");
    stalled["status"] = json!("stalled");
    stalled["subCounty"] = json!("Gatanga");
    app.create_project(&token, stalled).await;
    app.create_project(&token, project_body("Maragua Market")).await;

    let (status, body) = app.get("/api/projects", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 3);
    assert_eq!(body["projects"][0]["title"], "Maragua Market");
    assert_eq!(body["projects"][2]["title"], "Kiharu Water Supply");
    assert_eq!(body["projects"][0]["commentCount"], 0);

    let (_, body) = app.get("/api/projects?status=stalled", None).await;
    assert_eq!(body["count"], 1);
    assert_eq!(body["projects"][0]["title"], "Gatanga Road");

    let (_, body) = app.get("/api/projects?search=WATER", None).await;
    assert_eq!(body["count"], 1);

    let (_, body) = app.get("/api/projects?search=county&status=ongoing", None).await;
    assert_eq!(body["count"], 2);

    let (_, body) = app.get("/api/projects?subCounty=gatanga", None).await;
    assert_eq!(body["count"], 1);
}

#[tokio::test]
async fn summary_aggregates_costs_and_statuses() {
    let app = TestApp::new();
    let (_, token) = app.staff("Planner").await;
    app.create_project(&token, project_body("One")).await;
    let mut done = project_body("Two");
    done["status"] = json!("completed");
    done["amountPaidToDate"] = json!(250_000.0);
    app.create_project(&token, done).await;

    let (status, body) = app.get("/api/projects/summary", None).await;
    assert_eq!(status, StatusCode::OK);
    let summary = &body["summary"];
    assert_eq!(summary["total"], 2);
    assert_eq!(summary["byStatus"]["ongoing"], 1);
    assert_eq!(summary["byStatus"]["completed"], 1);
    assert_eq!(summary["byStatus"]["stalled"], 0);
    assert_eq!(summary["totalBudgetedCost"], 3_000_000.0);
    assert_eq!(summary["totalPaidToDate"], 250_000.0);
}

#[tokio::test]
async fn staff_project_views() {
    let app = TestApp::new();
    let (me, my_token) = app.staff("Me").await;
    let (other, other_token) = app.staff("Other").await;
    let (_, admin) = app.admin().await;
    let (_, citizen) = app.seed_user("Citizen", Role::Public, true).await;
    app.create_project(&my_token, project_body("Mine")).await;
    app.create_project(&other_token, project_body("Theirs")).await;

    let (status, body) = app.get("/api/projects/staff/projects", Some(&my_token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 1);
    assert_eq!(body["projects"][0]["title"], "Mine");

    let (status, _) = app
        .get("/api/projects/staff/projects", Some(&citizen))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let uri = format!("/api/projects/staff/{}/projects", other.id);
    let (status, _) = app.get(&uri, Some(&my_token)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app.get(&uri, Some(&admin)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["projects"][0]["title"], "Theirs");

    let uri = format!("/api/projects/staff/{}/projects", me.id);
    let (status, _) = app.get(&uri, Some(&my_token)).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn end_date_is_checked_against_stored_start_date() {
    let app = TestApp::new();
    let (_, owner) = app.staff("Owner").await;
    let mut body = project_body("Sewer Line");
    body["contractStartDate"] = json!("2024-07-01T00:00:00Z");
    let id = app.create_project(&owner, body).await;

    let (status, body) = app
        .put(
            &format!("/api/projects/{id}"),
            Some(&owner),
            json!({ "contractEndDate": "2024-01-01T00:00:00Z" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Contract end date must not precede the start date");

    let (_, body) = app.get(&format!("/api/projects/{id}"), None).await;
    assert!(body["project"]["contractEndDate"].is_null());

    let (status, _) = app
        .put(
            &format!("/api/projects/{id}"),
            Some(&owner),
            json!({ "contractEndDate": "2025-06-30T00:00:00Z" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
}
