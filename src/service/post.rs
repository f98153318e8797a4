//! Post ingestion workflow
//!
//! Handles post create, update, delete, and search. Creation
//! orchestrates author/title resolution, geocoding, unique filename
//! generation, and the media upload around one staged database
//! transaction; a failure at any step leaves no partial rows, and a
//! commit failure after the upload compensates by deleting the
//! blob.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::data::{Database, EntityId, Post, PostDetail};
use crate::error::AppError;
use crate::geo::GeocodingGateway;
use crate::storage::MediaGateway;

/// Accepted photo file extensions (case-insensitive)
const ALLOWED_PHOTO_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

/// An uploaded photo file
#[derive(Debug, Clone)]
pub struct PhotoUpload {
    /// Filename as sent by the client; only the extension is used
    pub original_filename: String,
    pub content: Vec<u8>,
}

/// Input for post creation
#[derive(Debug, Clone)]
pub struct NewPost {
    pub author: String,
    pub title: String,
    pub quote: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub address: Option<String>,
    pub photo: PhotoUpload,
    /// Upload timestamp; also seeds the generated filename
    pub added: DateTime<Utc>,
}

/// Partial input for post update
///
/// `None` fields are left untouched.
#[derive(Debug, Clone, Default)]
pub struct PostChanges {
    pub author: Option<String>,
    pub title: Option<String>,
    pub quote: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub address: Option<String>,
    pub photo: Option<PhotoUpload>,
}

/// Which field a search hit matched on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchField {
    Title,
    Author,
    Quote,
    Address,
}

impl SearchField {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Title => "title",
            Self::Author => "author",
            Self::Quote => "quote",
            Self::Address => "address",
        }
    }
}

/// One search result entry
///
/// A post matching several fields appears once per matching field.
/// `found_in` is absent when listing without a query.
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub found_in: Option<SearchField>,
    pub detail: PostDetail,
}

fn photo_extension(original_filename: &str) -> Result<String, AppError> {
    let extension = original_filename
        .rsplit('.')
        .next()
        .unwrap_or_default()
        .to_ascii_lowercase();
    if !ALLOWED_PHOTO_EXTENSIONS.contains(&extension.as_str()) {
        return Err(AppError::Unprocessable("Invalid format.".to_string()));
    }
    Ok(extension)
}

fn content_type_for_extension(extension: &str) -> &'static str {
    match extension {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        _ => "application/octet-stream",
    }
}

/// Derive the next filename candidate after a collision.
///
/// Split on `_`; with more than two segments the trailing numeric
/// segment is incremented, otherwise a `1` segment is appended.
/// Deterministic given the same collision history.
fn next_filename(current: &str) -> String {
    let mut segments: Vec<String> = current.split('_').map(str::to_string).collect();
    if segments.len() > 2 {
        match segments.last().and_then(|s| s.parse::<u64>().ok()) {
            Some(counter) => {
                let last = segments.len() - 1;
                segments[last] = (counter + 1).to_string();
            }
            None => segments.push("1".to_string()),
        }
    } else {
        segments.push("1".to_string());
    }
    segments.join("_")
}

/// Post service
pub struct PostService {
    db: Arc<Database>,
    storage: Arc<dyn MediaGateway>,
    geocoder: Arc<dyn GeocodingGateway>,
}

impl PostService {
    /// Create new post service
    pub fn new(
        db: Arc<Database>,
        storage: Arc<dyn MediaGateway>,
        geocoder: Arc<dyn GeocodingGateway>,
    ) -> Self {
        Self {
            db,
            storage,
            geocoder,
        }
    }

    // =========================================================================
    // Create
    // =========================================================================

    /// Create a new post
    ///
    /// # Steps
    /// 1. Validate the photo extension
    /// 2. Resolve author and title (staged find-or-create)
    /// 3. Geocode: forward on the address, then reverse on whatever
    ///    coordinates are present
    /// 4. Generate a globally unique filename
    /// 5. Upload the photo
    /// 6. Commit; a failed commit deletes the uploaded blob
    ///
    /// Geocoder unavailability, upload failure, and database errors
    /// all abort with no partial rows.
    pub async fn create(&self, user_id: &str, new_post: NewPost) -> Result<PostDetail, AppError> {
        let extension = photo_extension(&new_post.photo.original_filename)?;

        let mut ingest = self.db.begin_ingest().await?;
        let author_id = ingest.resolve_author(&new_post.author).await?;
        let title_id = ingest.resolve_title(&new_post.title, &author_id).await?;

        let mut latitude = new_post.latitude;
        let mut longitude = new_post.longitude;
        let mut address = new_post.address;

        if let Some(query) = address.as_deref() {
            if let Some((lat, lon)) = self.geocoder.forward(query).await? {
                latitude = Some(lat);
                longitude = Some(lon);
            }
        }
        if let (Some(lat), Some(lon)) = (latitude, longitude) {
            if let Some(resolved) = self.geocoder.reverse(lat, lon).await? {
                address = Some(resolved);
            }
        }

        let mut filename = format!(
            "{}_{}",
            user_id,
            new_post.added.format("%y%m%d%H%M%S")
        );
        while ingest.filename_exists(&filename).await? {
            filename = next_filename(&filename);
        }

        let blob = self
            .storage
            .upload(
                new_post.photo.content,
                content_type_for_extension(&extension),
                &filename,
            )
            .await?;
        let thumbnail_url = self.storage.thumbnail_url(&blob.stored_id);

        let post = Post {
            id: EntityId::new().0,
            user_id: user_id.to_string(),
            author_id,
            title_id,
            quote: new_post.quote,
            latitude,
            longitude,
            address,
            filename,
            thumbnail_url,
            photo_url: blob.secure_url,
            added: new_post.added,
        };

        let persisted = async {
            ingest.insert_post(&post).await?;
            ingest.commit().await
        }
        .await;

        if let Err(error) = persisted {
            // No orphan blob may remain once the row write has failed
            if let Err(cleanup) = self.storage.delete(&blob.stored_id).await {
                tracing::warn!(
                    %cleanup,
                    filename = %post.filename,
                    "Failed to delete uploaded photo after aborted commit"
                );
            }
            return Err(error);
        }

        tracing::info!(post_id = %post.id, filename = %post.filename, "Post created");

        Ok(PostDetail {
            post,
            author: new_post.author,
            title: new_post.title,
        })
    }

    // =========================================================================
    // Update
    // =========================================================================

    /// Update an existing post (owner only)
    ///
    /// Author/title resolution mirrors creation but only runs for
    /// supplied fields; a new title without a new author is linked
    /// to the post's existing author. A replacement photo is
    /// uploaded under the post's existing filename, overwriting the
    /// stored blob in place.
    pub async fn update(
        &self,
        post_id: &str,
        user_id: &str,
        changes: PostChanges,
    ) -> Result<PostDetail, AppError> {
        let mut post = self
            .db
            .get_post(post_id)
            .await?
            .ok_or(AppError::NotFound)?;
        if post.user_id != user_id {
            return Err(AppError::Forbidden);
        }

        let mut ingest = self.db.begin_ingest().await?;

        if let Some(name) = changes.author.as_deref() {
            post.author_id = ingest.resolve_author(name).await?;
        }
        if let Some(text) = changes.title.as_deref() {
            post.title_id = ingest.resolve_title(text, &post.author_id).await?;
        }
        if let Some(quote) = changes.quote {
            post.quote = quote;
        }

        let mut latitude = changes.latitude;
        let mut longitude = changes.longitude;

        if let Some(query) = changes.address.as_deref() {
            if let Some((lat, lon)) = self.geocoder.forward(query).await? {
                latitude = Some(lat);
                longitude = Some(lon);
            }
        }
        if let (Some(lat), Some(lon)) = (latitude, longitude) {
            if let Some(resolved) = self.geocoder.reverse(lat, lon).await? {
                post.address = Some(resolved);
            }
            post.latitude = Some(lat);
            post.longitude = Some(lon);
        }

        if let Some(photo) = changes.photo {
            let extension = photo
                .original_filename
                .rsplit('.')
                .next()
                .unwrap_or_default()
                .to_ascii_lowercase();
            // No filename regeneration on update: the replacement
            // overwrites the existing blob in place
            let blob = self
                .storage
                .upload(
                    photo.content,
                    content_type_for_extension(&extension),
                    &post.filename,
                )
                .await?;
            post.thumbnail_url = self.storage.thumbnail_url(&blob.stored_id);
            post.photo_url = blob.secure_url;
        }

        ingest.update_post(&post).await?;
        ingest.commit().await?;

        self.db
            .get_post_detail(&post.id)
            .await?
            .ok_or(AppError::NotFound)
    }

    // =========================================================================
    // Delete
    // =========================================================================

    /// Delete a post (owner only)
    ///
    /// The row delete commits first; the blob delete is best-effort
    /// once the row is gone. Afterwards the former title and author
    /// are reference-count-checked and removed if orphaned.
    pub async fn delete(&self, post_id: &str, user_id: &str) -> Result<(), AppError> {
        let post = self
            .db
            .get_post(post_id)
            .await?
            .ok_or(AppError::NotFound)?;
        if post.user_id != user_id {
            return Err(AppError::Forbidden);
        }

        self.db.delete_post(&post.id).await?;

        if let Err(error) = self.storage.delete(&post.filename).await {
            tracing::warn!(
                %error,
                filename = %post.filename,
                "Failed to delete photo blob for removed post"
            );
        }

        // Best-effort: the post deletion stands even if the
        // reference-count cleanup cannot complete
        if let Err(error) = self
            .db
            .remove_orphaned_title_and_author(&post.title_id, &post.author_id)
            .await
        {
            tracing::warn!(
                %error,
                title_id = %post.title_id,
                author_id = %post.author_id,
                "Orphan cleanup after post deletion failed"
            );
        }

        tracing::info!(post_id = %post.id, "Post deleted");
        Ok(())
    }

    // =========================================================================
    // Search
    // =========================================================================

    /// Search posts, or list all of them
    ///
    /// With a query, matches it independently against title text,
    /// author name, quote, and address (case-insensitive
    /// substring). Each hit is tagged with its matching field; the
    /// four groups are ordered by descending size, ties keeping the
    /// title/author/quote/address order, then concatenated. A post
    /// matching several fields appears once per field.
    pub async fn search(&self, query: Option<&str>) -> Result<Vec<SearchHit>, AppError> {
        let Some(query) = query else {
            let hits = self
                .db
                .get_all_post_details()
                .await?
                .into_iter()
                .map(|detail| SearchHit {
                    found_in: None,
                    detail,
                })
                .collect();
            return Ok(hits);
        };

        fn tagged(field: SearchField, details: Vec<PostDetail>) -> Vec<SearchHit> {
            details
                .into_iter()
                .map(|detail| SearchHit {
                    found_in: Some(field),
                    detail,
                })
                .collect()
        }

        let mut categories = vec![
            tagged(SearchField::Title, self.db.search_posts_by_title(query).await?),
            tagged(
                SearchField::Author,
                self.db.search_posts_by_author(query).await?,
            ),
            tagged(SearchField::Quote, self.db.search_posts_by_quote(query).await?),
            tagged(
                SearchField::Address,
                self.db.search_posts_by_address(query).await?,
            ),
        ];
        // Stable sort keeps the field order on equal sizes
        categories.sort_by_key(|category| std::cmp::Reverse(category.len()));

        Ok(categories.into_iter().flatten().collect())
    }
}
