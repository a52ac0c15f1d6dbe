use serde::{Deserialize, Serialize};

use crate::auth::dto::PublicUser;

#[derive(Debug, Default, Deserialize)]
pub struct CreateUserRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub role: Option<String>,
}

/// Partial update; absent fields are left as they are.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateUserRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub role: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct UserList {
    pub users: Vec<PublicUser>,
    pub count: usize,
}

impl UserList {
    pub fn new(users: Vec<PublicUser>) -> Self {
        Self {
            count: users.len(),
            users,
        }
    }
}

/// Single account with activity counts.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDetail {
    #[serde(flatten)]
    pub user: PublicUser,
    pub project_count: i64,
    pub comment_count: i64,
}

#[derive(Debug, Serialize)]
pub struct UserEnvelope<T> {
    pub message: &'static str,
    pub user: T,
}
