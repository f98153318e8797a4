//! Authentication extractors
//!
//! Handlers take [`CurrentUser`] (access token) or [`RefreshUser`]
//! (refresh token) to require authentication.

use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{HeaderMap, request::Parts},
};

use super::session::{Claims, TokenKind, verify_token};
use crate::AppState;
use crate::error::AppError;

fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(ToOwned::to_owned)
}

/// Verify a bearer token of the expected kind.
///
/// Checks the signature, expiry, kind, and the revocation store, in
/// that order.
async fn authenticate_token(
    token: &str,
    kind: TokenKind,
    state: &AppState,
) -> Result<Claims, AppError> {
    let claims = verify_token(token, &state.config.auth.token_secret)?;

    if claims.kind != kind {
        return Err(AppError::Unauthorized);
    }

    if state.revoked_tokens.is_revoked(&claims.token_id).await {
        return Err(AppError::Unauthorized);
    }

    Ok(claims)
}

async fn claims_from_parts(
    parts: &mut Parts,
    state: &AppState,
    kind: TokenKind,
) -> Result<Claims, AppError> {
    let token = extract_bearer_token(&parts.headers).ok_or(AppError::Unauthorized)?;
    authenticate_token(&token, kind, state).await
}

/// Extractor for the current authenticated user (access token)
///
/// # Usage
/// ```ignore
/// async fn handler(
///     CurrentUser(claims): CurrentUser,
/// ) -> impl IntoResponse {
///     format!("Hello, {}", claims.user_id)
/// }
/// ```
#[derive(Debug, Clone)]
pub struct CurrentUser(pub Claims);

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let state = AppState::from_ref(state);
        let claims = claims_from_parts(parts, &state, TokenKind::Access).await?;
        Ok(CurrentUser(claims))
    }
}

/// Extractor for the refresh endpoint (refresh token)
#[derive(Debug, Clone)]
pub struct RefreshUser(pub Claims);

#[async_trait]
impl<S> FromRequestParts<S> for RefreshUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let state = AppState::from_ref(state);
        let claims = claims_from_parts(parts, &state, TokenKind::Refresh).await?;
        Ok(RefreshUser(claims))
    }
}
