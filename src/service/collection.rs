//! Collection service
//!
//! A user's collection is their bookmark list of other users'
//! posts. Membership is unique per (user, post) and self-collection
//! is rejected before any write.

use std::sync::Arc;

use chrono::Utc;

use crate::data::{CollectionEntry, Database, EntityId, PostDetail, User};
use crate::error::AppError;

/// Collection service
pub struct CollectionService {
    db: Arc<Database>,
}

impl CollectionService {
    /// Create new collection service
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Add a post to the user's collection
    ///
    /// Rejected when the post is already collected or owned by the
    /// user. Returns the user and their updated collection.
    pub async fn add(
        &self,
        user_id: &str,
        post_id: &str,
    ) -> Result<(User, Vec<PostDetail>), AppError> {
        let post = self.db.get_post(post_id).await?.ok_or(AppError::NotFound)?;
        let user = self.db.get_user(user_id).await?.ok_or(AppError::NotFound)?;

        if self.db.is_collected(&user.id, &post.id).await? {
            return Err(AppError::Conflict(
                "Post already in the collection.".to_string(),
            ));
        }
        if post.user_id == user.id {
            return Err(AppError::Conflict(
                "User cannot add own post to own collection.".to_string(),
            ));
        }

        self.db
            .insert_collection_entry(&CollectionEntry {
                id: EntityId::new().0,
                user_id: user.id.clone(),
                post_id: post.id.clone(),
                added: Utc::now(),
            })
            .await?;

        let collection = self.db.get_collected_post_details(&user.id).await?;
        Ok((user, collection))
    }

    /// Remove a post from the user's collection
    ///
    /// Returns the user and their updated collection.
    pub async fn remove(
        &self,
        user_id: &str,
        post_id: &str,
    ) -> Result<(User, Vec<PostDetail>), AppError> {
        let post = self.db.get_post(post_id).await?.ok_or(AppError::NotFound)?;
        let user = self.db.get_user(user_id).await?.ok_or(AppError::NotFound)?;

        if !self.db.delete_collection_entry(&user.id, &post.id).await? {
            return Err(AppError::Validation(
                "Post not in the collection".to_string(),
            ));
        }

        let collection = self.db.get_collected_post_details(&user.id).await?;
        Ok((user, collection))
    }
}
