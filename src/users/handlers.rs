use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, put},
    Json, Router,
};
use serde_json::{json, Value};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::{
    dto::{CreateUserRequest, UpdateUserRequest, UserDetail, UserEnvelope, UserList},
    services::create_account,
};
use crate::{
    auth::{dto::PublicUser, password::is_valid_email, AuthUser},
    domain::{normalize_email, Access, Role, User},
    error::AppError,
    extract::{AppJson, AppPath},
    state::AppState,
};

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/users", get(list_users).post(create_user))
        .route("/users/staff", get(list_staff))
        .route("/users/pending", get(list_pending))
        .route(
            "/users/:id",
            get(get_user).put(update_user).delete(delete_user),
        )
        .route("/users/:id/approve", put(approve_staff))
}

fn parse_role(raw: &str) -> Result<Role, AppError> {
    raw.parse()
        .map_err(|_| AppError::validation("Role must be PUBLIC, STAFF, or ADMIN"))
}

async fn load_user(state: &AppState, id: Uuid) -> Result<User, AppError> {
    state
        .users
        .find_by_id(id)
        .await?
        .ok_or_else(|| AppError::not_found("User does not exist"))
}

fn public_list(users: Vec<User>) -> UserList {
    UserList::new(users.iter().map(PublicUser::from).collect())
}

#[instrument(skip_all, fields(caller = %caller.id))]
pub async fn list_users(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
) -> Result<Json<UserList>, AppError> {
    caller.require(Access::AdminOnly)?;
    Ok(Json(public_list(state.users.list().await?)))
}

#[instrument(skip_all, fields(caller = %caller.id))]
pub async fn list_staff(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
) -> Result<Json<UserList>, AppError> {
    caller.require(Access::AdminOnly)?;
    Ok(Json(public_list(state.users.list_staff(false).await?)))
}

#[instrument(skip_all, fields(caller = %caller.id))]
pub async fn list_pending(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
) -> Result<Json<UserList>, AppError> {
    caller.require(Access::AdminOnly)?;
    Ok(Json(public_list(state.users.list_staff(true).await?)))
}

#[instrument(skip_all, fields(caller = %caller.id, user_id = %id))]
pub async fn get_user(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    AppPath(id): AppPath<Uuid>,
) -> Result<Json<Value>, AppError> {
    caller.require(Access::AdminOnly)?;
    let user = load_user(&state, id).await?;
    let stats = state.users.stats(id).await?;
    let detail = UserDetail {
        user: PublicUser::from(&user),
        project_count: stats.project_count,
        comment_count: stats.comment_count,
    };
    Ok(Json(json!({ "user": detail })))
}

#[instrument(skip_all, fields(caller = %caller.id))]
pub async fn create_user(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    AppJson(payload): AppJson<CreateUserRequest>,
) -> Result<(StatusCode, Json<UserEnvelope<PublicUser>>), AppError> {
    caller.require(Access::AdminOnly)?;
    let (Some(name), Some(email), Some(password), Some(role)) =
        (payload.name, payload.email, payload.password, payload.role)
    else {
        return Err(AppError::validation(
            "Name, email, password, and role are required",
        ));
    };
    let role = parse_role(&role)?;

    let user = create_account(&state, &name, &email, &password, role).await?;
    info!(user_id = %user.id, role = %user.role, "user created by admin");
    Ok((
        StatusCode::CREATED,
        Json(UserEnvelope {
            message: "User created successfully",
            user: PublicUser::from(&user),
        }),
    ))
}

#[instrument(skip_all, fields(caller = %caller.id, user_id = %id))]
pub async fn update_user(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    AppPath(id): AppPath<Uuid>,
    AppJson(payload): AppJson<UpdateUserRequest>,
) -> Result<Json<UserEnvelope<PublicUser>>, AppError> {
    caller.require(Access::AdminOnly)?;
    let mut user = load_user(&state, id).await?;

    let role = payload.role.as_deref().map(parse_role).transpose()?;

    if let Some(email) = payload.email.as_deref().map(normalize_email) {
        if email != user.email {
            if !is_valid_email(&email) {
                return Err(AppError::validation("Invalid email"));
            }
            if state.users.find_by_email(&email).await?.is_some() {
                return Err(AppError::conflict("A user with this email already exists"));
            }
            user.email = email;
        }
    }
    if let Some(name) = payload.name {
        if name.trim().is_empty() {
            return Err(AppError::validation("Name must not be empty"));
        }
        user.name = name.trim().to_string();
    }
    if let Some(role) = role {
        user.role = role;
    }

    let user = state.users.update(&user).await?;
    info!(role = %user.role, "user updated");
    Ok(Json(UserEnvelope {
        message: "User updated successfully",
        user: PublicUser::from(&user),
    }))
}

#[instrument(skip_all, fields(caller = %caller.id, user_id = %id))]
pub async fn delete_user(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    AppPath(id): AppPath<Uuid>,
) -> Result<Json<Value>, AppError> {
    caller.require(Access::AdminOnly)?;
    load_user(&state, id).await?;
    if caller.id == id {
        warn!("admin tried to delete own account");
        return Err(AppError::validation("You cannot delete your own account"));
    }

    if !state.users.delete(id).await? {
        return Err(AppError::not_found("User does not exist"));
    }
    info!("user deleted");
    Ok(Json(json!({ "message": "User deleted successfully" })))
}

#[instrument(skip_all, fields(caller = %caller.id, user_id = %id))]
pub async fn approve_staff(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    AppPath(id): AppPath<Uuid>,
) -> Result<Json<UserEnvelope<PublicUser>>, AppError> {
    caller.require(Access::AdminOnly)?;
    let mut user = load_user(&state, id).await?;
    if user.role != Role::Staff {
        return Err(AppError::validation("Only staff users can be approved"));
    }
    if user.is_approved {
        return Ok(Json(UserEnvelope {
            message: "Staff user is already approved",
            user: PublicUser::from(&user),
        }));
    }

    user.is_approved = true;
    let user = state.users.update(&user).await?;
    info!("staff approved");
    Ok(Json(UserEnvelope {
        message: "Staff user approved successfully",
        user: PublicUser::from(&user),
    }))
}
