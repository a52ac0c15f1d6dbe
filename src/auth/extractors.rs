use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use tracing::warn;

use crate::{domain::CurrentUser, error::AppError, state::AppState};

/// Requires a valid access token whose account still exists.
pub struct AuthUser(pub CurrentUser);

/// Like [`AuthUser`] but lets requests without an `Authorization` header
/// through as guests. A header carrying a bad token is still rejected.
pub struct MaybeAuthUser(pub Option<CurrentUser>);

fn bearer_token(parts: &Parts) -> Result<Option<&str>, AppError> {
    let Some(value) = parts.headers.get(AUTHORIZATION) else {
        return Ok(None);
    };
    let auth = value
        .to_str()
        .map_err(|_| AppError::unauthorized("Invalid Authorization header"))?;
    // Expect "Bearer <token>"
    let token = auth
        .strip_prefix("Bearer ")
        .or_else(|| auth.strip_prefix("bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AppError::unauthorized("Invalid auth scheme"))?;
    Ok(Some(token))
}

async fn authenticate(token: &str, state: &AppState) -> Result<CurrentUser, AppError> {
    let claims = state.jwt.verify_access(token).map_err(|e| {
        warn!(error = %e, "invalid or expired token");
        AppError::unauthorized("Invalid or expired token")
    })?;

    let user = state.users.find_by_id(claims.sub).await?.ok_or_else(|| {
        warn!(user_id = %claims.sub, "token for a deleted account");
        AppError::unauthorized("User no longer exists")
    })?;
    Ok(CurrentUser::from(&user))
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)?
            .ok_or_else(|| AppError::unauthorized("Missing Authorization header"))?;
        Ok(AuthUser(authenticate(token, state).await?))
    }
}

#[async_trait]
impl FromRequestParts<AppState> for MaybeAuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        match bearer_token(parts)? {
            Some(token) => Ok(MaybeAuthUser(Some(authenticate(token, state).await?))),
            None => Ok(MaybeAuthUser(None)),
        }
    }
}
