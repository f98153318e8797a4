//! Account and user endpoints

use axum::{
    Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    routing::{delete, get, post},
};
use serde::Deserialize;

use super::posts::{PaginationParams, paginate};
use super::{post_detail_to_response, user_to_response};
use crate::AppState;
use crate::auth::{CurrentUser, RefreshUser};
use crate::data::PostDetail;
use crate::error::AppError;
use crate::service::Registration;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
    pub confirm_password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

impl From<RegisterRequest> for Registration {
    fn from(request: RegisterRequest) -> Self {
        Registration {
            username: request.username,
            password: request.password,
            confirm_password: request.confirm_password,
        }
    }
}

async fn details_to_responses(
    state: &AppState,
    details: Vec<PostDetail>,
) -> Result<Vec<super::PostResponse>, AppError> {
    let mut responses = Vec::with_capacity(details.len());
    for detail in &details {
        let collectors = state.db.get_collectors(&detail.post.id).await?;
        responses.push(post_detail_to_response(detail, &collectors));
    }
    Ok(responses)
}

/// POST /register - Register a new user
pub async fn register(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<super::UserResponse>), AppError> {
    let user = state.accounts().register(request.into()).await?;
    Ok((StatusCode::CREATED, Json(user_to_response(&user))))
}

/// DELETE /register - Delete an account with its credentials
pub async fn delete_account(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> Result<Json<super::MessageResponse>, AppError> {
    let user = state.accounts().delete_account(request.into()).await?;
    Ok(Json(super::MessageResponse {
        message: format!("Successfully deleted user {}.", user.username),
    }))
}

/// POST /login - Verify credentials, issue a token pair
pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<super::TokenPairResponse>, AppError> {
    let pair = state
        .accounts()
        .login(&request.username, &request.password)
        .await?;
    Ok(Json(super::TokenPairResponse {
        access_token: pair.access_token,
        refresh_token: pair.refresh_token,
    }))
}

/// DELETE /logout - Revoke the presented access token
pub async fn logout(
    State(state): State<AppState>,
    CurrentUser(claims): CurrentUser,
) -> Result<Json<super::MessageResponse>, AppError> {
    state.accounts().logout(&claims).await;
    Ok(Json(super::MessageResponse {
        message: "Successfully logged out.".to_string(),
    }))
}

/// POST /refresh - Issue a new access token from a refresh token
pub async fn refresh(
    State(state): State<AppState>,
    RefreshUser(claims): RefreshUser,
) -> Result<Json<super::AccessTokenResponse>, AppError> {
    let access_token = state.accounts().refresh(&claims)?;
    Ok(Json(super::AccessTokenResponse { access_token }))
}

/// GET /users/{id}/posts - Posts owned by a user
pub async fn user_posts(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(params): Query<PaginationParams>,
) -> Result<Json<Vec<super::PostResponse>>, AppError> {
    let details = state.db.get_post_details_by_user(&id).await?;
    let page = paginate(details, &params);
    Ok(Json(details_to_responses(&state, page).await?))
}

/// GET /users/{id}/collections - Posts a user has collected
pub async fn user_collections(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(params): Query<PaginationParams>,
) -> Result<Json<Vec<super::PostResponse>>, AppError> {
    let details = state.db.get_collected_post_details(&id).await?;
    let page = paginate(details, &params);
    Ok(Json(details_to_responses(&state, page).await?))
}

/// POST /users/recommendations - Collaborative-filtering suggestions
///
/// Posts collected by users with overlapping taste, excluding
/// everything the requester owns or already collected.
pub async fn recommendations(
    State(state): State<AppState>,
    CurrentUser(claims): CurrentUser,
    Query(params): Query<PaginationParams>,
) -> Result<Json<Vec<super::PostResponse>>, AppError> {
    let details = state.recommendations().recommend(&claims.user_id).await?;
    let page = paginate(details, &params);
    Ok(Json(details_to_responses(&state, page).await?))
}

/// Create users router
pub fn users_router() -> Router<AppState> {
    Router::new()
        .route("/register", post(register).delete(delete_account))
        .route("/login", post(login))
        .route("/logout", delete(logout))
        .route("/refresh", post(refresh))
        .route("/users/:id/posts", get(user_posts))
        .route("/users/:id/collections", get(user_collections))
        .route("/users/recommendations", post(recommendations))
}
