//! Collection endpoints

use axum::{
    Router,
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::post,
};

use super::collection_to_response;
use crate::AppState;
use crate::auth::CurrentUser;
use crate::error::AppError;

/// POST /collections/{post_id} - Add a post to the caller's collection
pub async fn add_to_collection(
    State(state): State<AppState>,
    CurrentUser(claims): CurrentUser,
    Path(post_id): Path<String>,
) -> Result<(StatusCode, Json<super::CollectionResponse>), AppError> {
    let (user, collection) = state.collections().add(&claims.user_id, &post_id).await?;
    Ok((
        StatusCode::CREATED,
        Json(collection_to_response(&user, &collection)),
    ))
}

/// DELETE /collections/{post_id} - Remove a post from the caller's collection
pub async fn remove_from_collection(
    State(state): State<AppState>,
    CurrentUser(claims): CurrentUser,
    Path(post_id): Path<String>,
) -> Result<(StatusCode, Json<super::CollectionResponse>), AppError> {
    let (user, collection) = state
        .collections()
        .remove(&claims.user_id, &post_id)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(collection_to_response(&user, &collection)),
    ))
}

/// Create collections router
pub fn collections_router() -> Router<AppState> {
    Router::new().route(
        "/collections/:post_id",
        post(add_to_collection).delete(remove_from_collection),
    )
}
