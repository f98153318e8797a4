//! API response types

use serde::Serialize;

/// Plain user response
#[derive(Debug, Clone, Serialize)]
pub struct UserResponse {
    pub id: String,
    pub username: String,
}

/// Full post response
#[derive(Debug, Clone, Serialize)]
pub struct PostResponse {
    pub id: String,
    pub user_id: String,
    /// Author name
    pub author: String,
    /// Title text
    pub title: String,
    pub quote: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub address: Option<String>,
    pub filename: String,
    pub thumbnail_url: String,
    pub photo_url: String,
    pub added: chrono::DateTime<chrono::Utc>,
    /// Users who collected this post
    pub in_collection: Vec<UserResponse>,
}

/// Compact post shape embedded in search results
/// (no photo URL, no collectors)
#[derive(Debug, Clone, Serialize)]
pub struct SearchPostResponse {
    pub id: String,
    pub user_id: String,
    pub author: String,
    pub title: String,
    pub quote: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub address: Option<String>,
    pub filename: String,
    pub thumbnail_url: String,
}

/// One search result entry, tagged with the matching field
///
/// `found_in` is omitted when listing without a query.
#[derive(Debug, Clone, Serialize)]
pub struct SearchHitResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub found_in: Option<&'static str>,
    pub post: SearchPostResponse,
}

/// Collected post summary inside a collection response
#[derive(Debug, Clone, Serialize)]
pub struct CollectedPostResponse {
    pub id: String,
    pub author: String,
    pub title: String,
}

/// A user with their collection
#[derive(Debug, Clone, Serialize)]
pub struct CollectionResponse {
    pub id: String,
    pub username: String,
    pub collection: Vec<CollectedPostResponse>,
}

/// Access/refresh token pair (login)
#[derive(Debug, Clone, Serialize)]
pub struct TokenPairResponse {
    pub access_token: String,
    pub refresh_token: String,
}

/// Single access token (refresh)
#[derive(Debug, Clone, Serialize)]
pub struct AccessTokenResponse {
    pub access_token: String,
}

/// Simple message response
#[derive(Debug, Clone, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

/// Brief author shape nested in title responses
#[derive(Debug, Clone, Serialize)]
pub struct AuthorBriefResponse {
    pub id: String,
    pub name: String,
}

/// Title with its author and post ids
#[derive(Debug, Clone, Serialize)]
pub struct TitleResponse {
    pub id: String,
    pub title: String,
    pub author: AuthorBriefResponse,
    pub posts: Vec<String>,
}

/// Title shape nested in author responses (no author back-reference)
#[derive(Debug, Clone, Serialize)]
pub struct AuthorTitleResponse {
    pub id: String,
    pub title: String,
    pub posts: Vec<String>,
}

/// Author with their titles
#[derive(Debug, Clone, Serialize)]
pub struct AuthorResponse {
    pub id: String,
    pub name: String,
    pub titles: Vec<AuthorTitleResponse>,
}
