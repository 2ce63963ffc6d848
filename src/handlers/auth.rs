use axum::{Json, extract::State, http::StatusCode};
use tracing::{info, warn};

use crate::db::DbUser;
use crate::error::ApiError;
use crate::middleware::{ApiJson, CurrentUser};
use crate::router::AppState;
use crate::security::{TokenKind, hash_password, verify_password};
use crate::types::{
    LoginRequest, MessageResponse, PasswordChange, RefreshRequest, RegisterRequest, TokenPair,
    User, UserUpdate,
};

fn validate_email(email: &str) -> Result<String, ApiError> {
    let email = email.trim().to_lowercase();
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.starts_with('.')
                && domain.contains('.')
                && !domain.ends_with('.')
                && !email.contains(char::is_whitespace)
                && !domain.contains('@')
        }
        None => false,
    };
    if !valid {
        return Err(ApiError::validation("value is not a valid email address"));
    }
    Ok(email)
}

fn validate_username(username: &str) -> Result<String, ApiError> {
    let n = username.chars().count();
    if !(3..=50).contains(&n) {
        return Err(ApiError::validation(
            "username must be between 3 and 50 characters",
        ));
    }
    if !username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(ApiError::validation(
            "Username must contain only alphanumeric characters, underscores, and hyphens",
        ));
    }
    Ok(username.to_lowercase())
}

fn validate_password(password: &str) -> Result<(), ApiError> {
    if !(8..=100).contains(&password.chars().count()) {
        return Err(ApiError::validation(
            "password must be between 8 and 100 characters",
        ));
    }
    Ok(())
}

fn validate_full_name(full_name: Option<&str>) -> Result<(), ApiError> {
    if full_name.is_some_and(|n| n.chars().count() > 100) {
        return Err(ApiError::validation(
            "full_name must be at most 100 characters",
        ));
    }
    Ok(())
}

pub async fn register(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<RegisterRequest>,
) -> Result<(StatusCode, Json<User>), ApiError> {
    let email = validate_email(&req.email)?;
    let username = validate_username(&req.username)?;
    validate_password(&req.password)?;
    validate_full_name(req.full_name.as_deref())?;

    if state.storage.find_user_by_email(&email).await?.is_some() {
        return Err(ApiError::bad_request("Email already registered"));
    }
    if state.storage.find_user_by_username(&username).await?.is_some() {
        return Err(ApiError::bad_request("Username already taken"));
    }

    let user = DbUser::new(email, username, hash_password(&req.password).await?, req.full_name);
    state.storage.insert_user(&user).await?;
    info!(user_id = %user.id, username = %user.username, "user registered");
    Ok((StatusCode::CREATED, Json(user.into())))
}

pub async fn login(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<LoginRequest>,
) -> Result<Json<TokenPair>, ApiError> {
    let email = req.email.trim().to_lowercase();
    let Some(user) = state.storage.find_user_by_email(&email).await? else {
        return Err(ApiError::unauthorized("Incorrect email or password"));
    };
    if !verify_password(&req.password, &user.password_hash).await? {
        warn!(user_id = %user.id, "failed login attempt");
        return Err(ApiError::unauthorized("Incorrect email or password"));
    }
    if !user.is_active {
        return Err(ApiError::Forbidden("Account is inactive".to_string()));
    }
    info!(user_id = %user.id, "user logged in");
    Ok(Json(state.tokens.issue_pair(&user)?))
}

pub async fn refresh(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<RefreshRequest>,
) -> Result<Json<TokenPair>, ApiError> {
    let claims = state
        .tokens
        .verify(&req.refresh_token, TokenKind::Refresh)
        .map_err(|_| ApiError::unauthorized("Invalid token"))?;
    let user = state
        .storage
        .get_user(&claims.sub)
        .await?
        .filter(|u| u.is_active)
        .ok_or_else(|| ApiError::unauthorized("User not found or inactive"))?;
    Ok(Json(state.tokens.issue_pair(&user)?))
}

/// Tokens are stateless; the client discards its pair.
pub async fn logout(CurrentUser(user): CurrentUser) -> Json<MessageResponse> {
    info!(user_id = %user.id, "user logged out");
    Json(MessageResponse {
        message: "Successfully logged out".to_string(),
    })
}

pub async fn me(CurrentUser(user): CurrentUser) -> Json<User> {
    Json(user.into())
}

pub async fn update_me(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiJson(req): ApiJson<UserUpdate>,
) -> Result<Json<User>, ApiError> {
    validate_full_name(req.full_name.as_deref())?;
    let updated = state
        .storage
        .update_profile(&user.id, req.full_name, req.preferences)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;
    Ok(Json(updated.into()))
}

pub async fn change_password(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiJson(req): ApiJson<PasswordChange>,
) -> Result<Json<MessageResponse>, ApiError> {
    validate_password(&req.new_password)?;
    if !verify_password(&req.current_password, &user.password_hash).await? {
        return Err(ApiError::unauthorized("Incorrect current password"));
    }
    state
        .storage
        .set_password_hash(&user.id, &hash_password(&req.new_password).await?)
        .await?;
    info!(user_id = %user.id, "password changed");
    Ok(Json(MessageResponse {
        message: "Password updated successfully".to_string(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn username_rules() {
        assert_eq!(validate_username("Trader_01").unwrap(), "trader_01");
        assert!(validate_username("ab").is_err());
        assert!(validate_username("no spaces").is_err());
        assert!(validate_username(&"a".repeat(51)).is_err());
    }

    #[test]
    fn email_shape() {
        assert_eq!(validate_email(" Ana@Example.com ").unwrap(), "ana@example.com");
        assert!(validate_email("ana@localhost").is_err());
        assert!(validate_email("@example.com").is_err());
        assert!(validate_email("ana example@x.com").is_err());
    }
}
