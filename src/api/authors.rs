//! Author endpoints

use axum::{
    Router,
    extract::{Path, Query, State},
    response::Json,
    routing::get,
};

use super::posts::{PaginationParams, paginate};
use crate::AppState;
use crate::data::Author;
use crate::error::AppError;

async fn author_to_response(
    state: &AppState,
    author: &Author,
) -> Result<super::AuthorResponse, AppError> {
    let titles = state.db.get_titles_by_author(&author.id).await?;

    let mut title_responses = Vec::with_capacity(titles.len());
    for title in &titles {
        let posts = state.db.get_post_ids_by_title(&title.id).await?;
        title_responses.push(super::AuthorTitleResponse {
            id: title.id.clone(),
            title: title.title.clone(),
            posts,
        });
    }

    Ok(super::AuthorResponse {
        id: author.id.clone(),
        name: author.name.clone(),
        titles: title_responses,
    })
}

/// GET /authors - List all authors with their titles
pub async fn list_authors(
    State(state): State<AppState>,
    Query(params): Query<PaginationParams>,
) -> Result<Json<Vec<super::AuthorResponse>>, AppError> {
    let authors = paginate(state.db.get_authors().await?, &params);

    let mut responses = Vec::with_capacity(authors.len());
    for author in &authors {
        responses.push(author_to_response(&state, author).await?);
    }
    Ok(Json(responses))
}

/// GET /authors/{id} - Get a single author
pub async fn get_author(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<super::AuthorResponse>, AppError> {
    let author = state.db.get_author(&id).await?.ok_or(AppError::NotFound)?;
    Ok(Json(author_to_response(&state, &author).await?))
}

/// Create authors router
pub fn authors_router() -> Router<AppState> {
    Router::new()
        .route("/authors", get(list_authors))
        .route("/authors/:id", get(get_author))
}
