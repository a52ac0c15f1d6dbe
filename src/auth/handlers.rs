use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use tracing::{info, instrument, warn};

use crate::{
    auth::{
        dto::{AuthResponse, LoginRequest, PublicUser, RefreshRequest, RegisterRequest},
        extractors::AuthUser,
        password::{hash_password, is_strong_enough, is_valid_email, verify_password},
    },
    domain::{normalize_email, NewUser, Role, User},
    error::AppError,
    extract::AppJson,
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/refresh", post(refresh))
        .route("/auth/logout", post(logout))
        .route("/auth/me", get(get_me))
}

fn required(field: Option<String>) -> Option<String> {
    field.filter(|v| !v.trim().is_empty())
}

fn issue_tokens(
    state: &AppState,
    user: &User,
    message: &'static str,
) -> Result<AuthResponse, AppError> {
    Ok(AuthResponse {
        message,
        user: PublicUser::from(user),
        token: state.jwt.sign_access(user)?,
        refresh_token: state.jwt.sign_refresh(user)?,
    })
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    AppJson(payload): AppJson<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), AppError> {
    let (Some(name), Some(email), Some(password)) = (
        required(payload.name),
        required(payload.email),
        payload.password.filter(|p| !p.is_empty()),
    ) else {
        return Err(AppError::validation(
            "Name, email, and password are required",
        ));
    };
    let email = normalize_email(&email);

    if !is_valid_email(&email) {
        warn!(email = %email, "invalid email");
        return Err(AppError::validation("Invalid email"));
    }
    if !is_strong_enough(&password) {
        warn!("password too short");
        return Err(AppError::validation(
            "Password must be at least 6 characters long",
        ));
    }
    if state.users.find_by_email(&email).await?.is_some() {
        warn!(email = %email, "email already registered");
        return Err(AppError::conflict("A user with this email already exists"));
    }

    // ADMIN is never self-assignable; anything but STAFF becomes PUBLIC.
    let wants_staff = payload
        .role
        .as_deref()
        .map(|r| r.trim().eq_ignore_ascii_case("STAFF"))
        .unwrap_or(false);
    let (role, is_approved) = if wants_staff {
        (Role::Staff, false)
    } else {
        (Role::Public, true)
    };

    let user = state
        .users
        .create(NewUser {
            name: name.trim().to_string(),
            email,
            password_hash: hash_password(&password)?,
            role,
            is_approved,
        })
        .await?;

    info!(user_id = %user.id, email = %user.email, role = %user.role, "user registered");
    let message = if user.is_pending_staff() {
        "Staff registered successfully. Awaiting admin approval."
    } else {
        "User registered successfully"
    };
    Ok((StatusCode::CREATED, Json(issue_tokens(&state, &user, message)?)))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    AppJson(payload): AppJson<LoginRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    let (Some(email), Some(password)) = (
        required(payload.email),
        payload.password.filter(|p| !p.is_empty()),
    ) else {
        return Err(AppError::validation("Email and password are required"));
    };
    let email = normalize_email(&email);

    let Some(user) = state.users.find_by_email(&email).await? else {
        warn!(email = %email, "login unknown email");
        return Err(AppError::unauthorized("Email or password is incorrect"));
    };
    if !verify_password(&password, &user.password_hash)? {
        warn!(email = %email, user_id = %user.id, "login invalid password");
        return Err(AppError::unauthorized("Email or password is incorrect"));
    }

    info!(user_id = %user.id, email = %user.email, "user logged in");
    Ok(Json(issue_tokens(&state, &user, "Login successful")?))
}

#[instrument(skip(state, payload))]
pub async fn refresh(
    State(state): State<AppState>,
    AppJson(payload): AppJson<RefreshRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    let claims = state
        .jwt
        .verify_refresh(&payload.refresh_token)
        .map_err(|e| {
            warn!(error = %e, "refresh rejected");
            AppError::unauthorized("Invalid or expired refresh token")
        })?;

    let user = state
        .users
        .find_by_id(claims.sub)
        .await?
        .ok_or_else(|| AppError::unauthorized("User no longer exists"))?;

    Ok(Json(issue_tokens(&state, &user, "Token refreshed")?))
}

#[instrument(skip_all, fields(user_id = %caller.id))]
pub async fn get_me(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
) -> Result<Json<Value>, AppError> {
    let user = state
        .users
        .find_by_id(caller.id)
        .await?
        .ok_or_else(|| AppError::unauthorized("User no longer exists"))?;
    Ok(Json(json!({ "user": PublicUser::from(&user) })))
}

/// Tokens are stateless; the client simply discards them.
#[instrument(skip_all, fields(user_id = %caller.id))]
pub async fn logout(AuthUser(caller): AuthUser) -> Json<Value> {
    info!("user logged out");
    Json(json!({ "message": "Logout successful" }))
}
