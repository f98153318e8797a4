//! Data models
//!
//! Rust structs representing database entities.
//! All models use ULID for IDs and chrono for timestamps.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// ID Types
// =============================================================================

/// Entity ID wrapper (ULID format, 26 characters)
///
/// Example: "01ARZ3NDEKTSV4RRFFQ69G5FAV"
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(pub String);

impl EntityId {
    /// Generate a new ULID
    pub fn new() -> Self {
        Self(ulid::Ulid::new().to_string())
    }

    /// Create from existing string
    pub fn from_string(s: String) -> Self {
        Self(s)
    }
}

impl Default for EntityId {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// User
// =============================================================================

/// A registered user
///
/// Owns posts (deleting the user cascades to them) and holds a
/// many-to-many collection of other users' posts.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: String,
    pub username: String,
    /// Argon2 PHC-format hash
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Author / Title
// =============================================================================

/// Author of quoted works
///
/// Lazily created during post ingestion, deleted when its last
/// title is removed.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Author {
    pub id: String,
    pub name: String,
}

/// A work title belonging to one author
///
/// Lazily created during post ingestion, deleted when its last
/// post is removed.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Title {
    pub id: String,
    pub title: String,
    pub author_id: String,
}

// =============================================================================
// Post
// =============================================================================

/// A photo post
///
/// Owned by one user; references one author and one title.
/// `filename` is globally unique across all posts (maintained by
/// the ingestion workflow, not a schema constraint).
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Post {
    pub id: String,
    pub user_id: String,
    pub author_id: String,
    pub title_id: String,
    pub quote: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub address: Option<String>,
    /// Media blob id in the media store
    pub filename: String,
    pub thumbnail_url: String,
    pub photo_url: String,
    pub added: DateTime<Utc>,
}

/// A post joined with its author name and title text
///
/// Convenience row shape for read paths; most API responses render
/// author/title as plain strings.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PostDetail {
    #[sqlx(flatten)]
    pub post: Post,
    pub author: String,
    pub title: String,
}

// =============================================================================
// Collection membership
// =============================================================================

/// Join row recording that a user bookmarked a post
///
/// A (user, post) pair is unique; a user never collects their own
/// post (rejected at add time).
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CollectionEntry {
    pub id: String,
    pub user_id: String,
    pub post_id: String,
    pub added: DateTime<Utc>,
}
