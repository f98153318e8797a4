//! Post endpoints

use axum::{
    Router,
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    response::Json,
    routing::get,
};
use serde::Deserialize;

use super::{post_detail_to_response, search_hit_to_response};
use crate::AppState;
use crate::auth::CurrentUser;
use crate::error::AppError;
use crate::metrics::HTTP_REQUEST_DURATION_SECONDS;
use crate::service::{NewPost, PhotoUpload, PostChanges};

/// Query pagination, shared by the list endpoints
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct PaginationParams {
    /// Page size (default 20, max 40)
    pub limit: Option<usize>,
    /// Items to skip
    pub offset: Option<usize>,
}

pub(super) fn paginate<T>(items: Vec<T>, params: &PaginationParams) -> Vec<T> {
    let limit = params.limit.unwrap_or(20).min(40);
    let offset = params.offset.unwrap_or(0);
    items.into_iter().skip(offset).take(limit).collect()
}

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    /// Free-text search query
    pub q: Option<String>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

/// Parsed multipart post form
#[derive(Debug, Default)]
struct PostForm {
    author: Option<String>,
    title: Option<String>,
    quote: Option<String>,
    latitude: Option<f64>,
    longitude: Option<f64>,
    address: Option<String>,
    photo: Option<PhotoUpload>,
}

impl PostForm {
    fn require(field: Option<String>, name: &str) -> Result<String, AppError> {
        field.ok_or_else(|| AppError::Unprocessable(format!("{name} is required.")))
    }
}

async fn read_post_form(mut multipart: Multipart) -> Result<PostForm, AppError> {
    let mut form = PostForm::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Failed to parse multipart: {}", e)))?
    {
        let name = field.name().unwrap_or("").to_string();

        match name.as_str() {
            "photo" => {
                let original_filename = field.file_name().unwrap_or("").to_string();
                let content = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::Validation(format!("Failed to read photo: {}", e)))?
                    .to_vec();
                form.photo = Some(PhotoUpload {
                    original_filename,
                    content,
                });
            }
            "author" => form.author = Some(read_text(field).await?),
            "title" => form.title = Some(read_text(field).await?),
            "quote" => form.quote = Some(read_text(field).await?),
            "address" => form.address = Some(read_text(field).await?),
            "latitude" => {
                let latitude = read_float(field, "latitude").await?;
                if !(-90.0..=90.0).contains(&latitude) {
                    return Err(AppError::Unprocessable(
                        "latitude must be between -90 and 90".to_string(),
                    ));
                }
                form.latitude = Some(latitude);
            }
            "longitude" => {
                let longitude = read_float(field, "longitude").await?;
                if !(-180.0..=180.0).contains(&longitude) {
                    return Err(AppError::Unprocessable(
                        "longitude must be between -180 and 180".to_string(),
                    ));
                }
                form.longitude = Some(longitude);
            }
            _ => {}
        }
    }

    Ok(form)
}

async fn read_text(field: axum::extract::multipart::Field<'_>) -> Result<String, AppError> {
    field
        .text()
        .await
        .map_err(|e| AppError::Validation(format!("Failed to read field: {}", e)))
}

async fn read_float(
    field: axum::extract::multipart::Field<'_>,
    name: &str,
) -> Result<f64, AppError> {
    read_text(field)
        .await?
        .trim()
        .parse::<f64>()
        .map_err(|_| AppError::Unprocessable(format!("{name} must be a number")))
}

/// GET /posts - Search or list posts
///
/// Without `q`, lists every post. With `q`, returns hits tagged
/// with the field they matched (title, author, quote, address),
/// largest matching category first.
pub async fn list_posts(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<Vec<super::SearchHitResponse>>, AppError> {
    let hits = state.posts().search(params.q.as_deref()).await?;

    let page = paginate(
        hits,
        &PaginationParams {
            limit: params.limit,
            offset: params.offset,
        },
    );

    Ok(Json(page.iter().map(search_hit_to_response).collect()))
}

/// POST /posts - Create a post
pub async fn create_post(
    State(state): State<AppState>,
    CurrentUser(claims): CurrentUser,
    multipart: Multipart,
) -> Result<(StatusCode, Json<super::PostResponse>), AppError> {
    let _timer = HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&["POST", "/posts"])
        .start_timer();

    let form = read_post_form(multipart).await?;

    let new_post = NewPost {
        author: PostForm::require(form.author, "author")?,
        title: PostForm::require(form.title, "title")?,
        quote: PostForm::require(form.quote, "quote")?,
        latitude: form.latitude,
        longitude: form.longitude,
        address: form.address,
        photo: form
            .photo
            .ok_or_else(|| AppError::Unprocessable("photo is required.".to_string()))?,
        added: chrono::Utc::now(),
    };

    let detail = state.posts().create(&claims.user_id, new_post).await?;

    Ok((
        StatusCode::CREATED,
        Json(post_detail_to_response(&detail, &[])),
    ))
}

/// GET /posts/{id} - Get a single post with its collectors
pub async fn get_post(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<super::PostResponse>, AppError> {
    let detail = state
        .db
        .get_post_detail(&id)
        .await?
        .ok_or(AppError::NotFound)?;
    let collectors = state.db.get_collectors(&detail.post.id).await?;

    Ok(Json(post_detail_to_response(&detail, &collectors)))
}

/// PUT /posts/{id} - Update a post (owner only)
pub async fn update_post(
    State(state): State<AppState>,
    CurrentUser(claims): CurrentUser,
    Path(id): Path<String>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<super::PostResponse>), AppError> {
    let form = read_post_form(multipart).await?;

    let changes = PostChanges {
        author: form.author,
        title: form.title,
        quote: form.quote,
        latitude: form.latitude,
        longitude: form.longitude,
        address: form.address,
        photo: form.photo,
    };

    let detail = state.posts().update(&id, &claims.user_id, changes).await?;
    let collectors = state.db.get_collectors(&detail.post.id).await?;

    Ok((
        StatusCode::CREATED,
        Json(post_detail_to_response(&detail, &collectors)),
    ))
}

/// DELETE /posts/{id} - Delete a post (owner only)
pub async fn delete_post(
    State(state): State<AppState>,
    CurrentUser(claims): CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<super::MessageResponse>, AppError> {
    state.posts().delete(&id, &claims.user_id).await?;

    Ok(Json(super::MessageResponse {
        message: "Post successfully deleted.".to_string(),
    }))
}

/// Create posts router
pub fn posts_router() -> Router<AppState> {
    Router::new()
        .route("/posts", get(list_posts).post(create_post))
        .route(
            "/posts/:id",
            get(get_post).put(update_post).delete(delete_post),
        )
}
