use axum::RequestPartsExt;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum_extra::TypedHeader;
use headers::{Authorization, authorization::Bearer};
use tracing::debug;

use crate::db::DbUser;
use crate::error::ApiError;
use crate::router::AppState;
use crate::security::TokenKind;

/// The account behind a valid access token.
///
/// Rejects with 401 when the `Authorization: Bearer` header is missing or
/// malformed ("Not authenticated"), or when the token does not verify as an
/// access token of an existing, active user ("Could not validate credentials").
#[derive(Debug, Clone)]
pub struct CurrentUser(pub DbUser);

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(bearer)) = parts
            .extract::<TypedHeader<Authorization<Bearer>>>()
            .await
            .map_err(|_| ApiError::unauthorized("Not authenticated"))?;

        let claims = state.tokens.verify(bearer.token(), TokenKind::Access)?;
        let user = state
            .storage
            .get_user(&claims.sub)
            .await?
            .filter(|u| u.is_active)
            .ok_or_else(|| {
                debug!(user_id = %claims.sub, "token subject missing or inactive");
                ApiError::unauthorized("Could not validate credentials")
            })?;
        Ok(Self(user))
    }
}
