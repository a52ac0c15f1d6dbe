#![allow(dead_code)]

use std::net::{IpAddr, SocketAddr};

use axum::{
    body::Body,
    extract::ConnectInfo,
    http::{header, Request, StatusCode},
    Router,
};
use county_tracker::{
    app::build_app,
    config::AppConfig,
    domain::{NewUser, Role, User},
    state::AppState,
};
use serde_json::{json, Value};
use tower::ServiceExt; // for `oneshot`

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_config(AppConfig::for_tests())
    }

    pub fn with_config(config: AppConfig) -> Self {
        let state = AppState::in_memory(config);
        let router = build_app(state.clone());
        Self { router, state }
    }

    /// `peer` stands in for the connection's remote address.
    pub async fn send(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        peer: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        self.send_forwarded(method, uri, token, peer, None, body)
            .await
    }

    pub async fn send_forwarded(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        peer: Option<&str>,
        forwarded_for: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        if let Some(ip) = peer {
            let ip: IpAddr = ip.parse().unwrap();
            builder = builder.extension(ConnectInfo(SocketAddr::new(ip, 40_000)));
        }
        if let Some(value) = forwarded_for {
            builder = builder.header("x-forwarded-for", value);
        }
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        (status, parse_body(response).await)
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        self.send("GET", uri, token, None, None).await
    }

    pub async fn post(&self, uri: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        self.send("POST", uri, token, None, Some(body)).await
    }

    pub async fn put(&self, uri: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        self.send("PUT", uri, token, None, Some(body)).await
    }

    pub async fn delete(&self, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        self.send("DELETE", uri, token, None, None).await
    }

    /// Inserts an account directly and signs an access token for it. The
    /// stored hash is a placeholder, so these accounts cannot log in.
    pub async fn seed_user(&self, name: &str, role: Role, is_approved: bool) -> (User, String) {
        let email = format!(
            "{}.{}@county.test",
            name.to_lowercase().replace(' ', "."),
            uuid::Uuid::new_v4().simple()
        );
        let user = self
            .state
            .users
            .create(NewUser {
                name: name.to_string(),
                email,
                password_hash: "placeholder".into(),
                role,
                is_approved,
            })
            .await
            .unwrap();
        let token = self.state.jwt.sign_access(&user).unwrap();
        (user, token)
    }

    pub async fn admin(&self) -> (User, String) {
        self.seed_user("Admin", Role::Admin, true).await
    }

    pub async fn staff(&self, name: &str) -> (User, String) {
        self.seed_user(name, Role::Staff, true).await
    }

    /// Creates a project through the API and returns its id.
    pub async fn create_project(&self, token: &str, body: Value) -> String {
        let (status, json) = self.post("/api/projects", Some(token), body).await;
        assert_eq!(status, StatusCode::CREATED, "create project failed: {json}");
        json["project"]["id"].as_str().unwrap().to_string()
    }

    pub async fn comment(&self, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        self.send("POST", "/api/comments", token, None, Some(body))
            .await
    }

    pub async fn anonymous_comment(&self, peer: &str, body: Value) -> (StatusCode, Value) {
        self.send("POST", "/api/comments", None, Some(peer), Some(body))
            .await
    }

    pub async fn anonymous_comment_forwarded(
        &self,
        peer: &str,
        forwarded_for: &str,
        body: Value,
    ) -> (StatusCode, Value) {
        self.send_forwarded(
            "POST",
            "/api/comments",
            None,
            Some(peer),
            Some(forwarded_for),
            Some(body),
        )
        .await
    }
}

pub fn project_body(title: &str) -> Value {
    json!({
        "title": title,
        "description": format!("{title} for the county"),
        "status": "ongoing",
        "budgetedCost": 1_500_000.0,
        "subCounty": "Kiharu",
        "ward": "Township",
    })
}

pub async fn parse_body(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    if bytes.is_empty() {
        return Value::Null;
    }
    serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into()))
}
