use tracing::info;

use crate::{
    auth::password::{hash_password, is_strong_enough, is_valid_email},
    config::AdminSeed,
    domain::{normalize_email, NewUser, Role, User},
    error::AppError,
    state::AppState,
};

/// Validates and stores an account created by an administrator. Such accounts
/// are approved immediately whatever their role.
pub async fn create_account(
    state: &AppState,
    name: &str,
    email: &str,
    password: &str,
    role: Role,
) -> Result<User, AppError> {
    let email = normalize_email(email);
    if name.trim().is_empty() {
        return Err(AppError::validation("Name is required"));
    }
    if !is_valid_email(&email) {
        return Err(AppError::validation("Invalid email"));
    }
    if !is_strong_enough(password) {
        return Err(AppError::validation(
            "Password must be at least 6 characters long",
        ));
    }
    if state.users.find_by_email(&email).await?.is_some() {
        return Err(AppError::conflict("A user with this email already exists"));
    }

    state
        .users
        .create(NewUser {
            name: name.trim().to_string(),
            email,
            password_hash: hash_password(password)?,
            role,
            is_approved: true,
        })
        .await
}

/// Creates the bootstrap administrator unless an account with that email is
/// already present. Returns the account only when it was created.
pub async fn ensure_admin(state: &AppState, seed: &AdminSeed) -> Result<Option<User>, AppError> {
    if state
        .users
        .find_by_email(&normalize_email(&seed.email))
        .await?
        .is_some()
    {
        return Ok(None);
    }
    let admin = create_account(state, &seed.name, &seed.email, &seed.password, Role::Admin).await?;
    info!(user_id = %admin.id, email = %admin.email, "seeded administrator");
    Ok(Some(admin))
}
