//! Title endpoints

use axum::{
    Router,
    extract::{Path, Query, State},
    response::Json,
    routing::get,
};

use super::posts::{PaginationParams, paginate};
use crate::AppState;
use crate::data::Title;
use crate::error::AppError;

async fn title_to_response(
    state: &AppState,
    title: &Title,
) -> Result<super::TitleResponse, AppError> {
    let author = state
        .db
        .get_author(&title.author_id)
        .await?
        .ok_or(AppError::NotFound)?;
    let posts = state.db.get_post_ids_by_title(&title.id).await?;

    Ok(super::TitleResponse {
        id: title.id.clone(),
        title: title.title.clone(),
        author: super::AuthorBriefResponse {
            id: author.id,
            name: author.name,
        },
        posts,
    })
}

/// GET /titles - List all titles
pub async fn list_titles(
    State(state): State<AppState>,
    Query(params): Query<PaginationParams>,
) -> Result<Json<Vec<super::TitleResponse>>, AppError> {
    let titles = paginate(state.db.get_titles().await?, &params);

    let mut responses = Vec::with_capacity(titles.len());
    for title in &titles {
        responses.push(title_to_response(&state, title).await?);
    }
    Ok(Json(responses))
}

/// GET /titles/{id} - Get a single title
pub async fn get_title(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<super::TitleResponse>, AppError> {
    let title = state.db.get_title(&id).await?.ok_or(AppError::NotFound)?;
    Ok(Json(title_to_response(&state, &title).await?))
}

/// Create titles router
pub fn titles_router() -> Router<AppState> {
    Router::new()
        .route("/titles", get(list_titles))
        .route("/titles/:id", get(get_title))
}
