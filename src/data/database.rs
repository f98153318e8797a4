//! SQLite database operations
//!
//! All database access goes through this module. Multi-write
//! operations with staged intermediate ids (post ingestion) use the
//! [`PostIngest`] transaction handle; everything else is a single
//! statement against the pool.

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, QueryBuilder, Sqlite};
use std::path::Path;

use super::models::*;
use crate::error::AppError;

const POST_DETAIL_SELECT: &str = "SELECT posts.*, authors.name AS author, titles.title AS title \
     FROM posts \
     JOIN authors ON authors.id = posts.author_id \
     JOIN titles ON titles.id = posts.title_id";

fn is_unique_violation(error: &sqlx::Error) -> bool {
    matches!(
        error,
        sqlx::Error::Database(db) if matches!(db.kind(), sqlx::error::ErrorKind::UniqueViolation)
    )
}

/// Database connection pool wrapper.
pub struct Database {
    pool: Pool<Sqlite>,
}

impl Database {
    /// Connect to the SQLite database file and run migrations.
    ///
    /// Creates the file (and parent directory) if missing. Foreign
    /// keys are enforced; user deletion cascades to posts and
    /// collection rows.
    pub async fn connect(path: &Path) -> Result<Self, AppError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| AppError::Database(sqlx::Error::Io(e)))?;
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| AppError::Database(sqlx::Error::Migrate(Box::new(e))))?;

        tracing::info!("Database connected and migrated successfully");

        Ok(Self { pool })
    }

    // =========================================================================
    // Users
    // =========================================================================

    /// Insert a new user.
    ///
    /// A duplicate username maps to a conflict error.
    pub async fn insert_user(&self, user: &User) -> Result<(), AppError> {
        sqlx::query(
            "INSERT INTO users (id, username, password_hash, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(&user.id)
        .bind(&user.username)
        .bind(&user.password_hash)
        .bind(user.created_at)
        .execute(&self.pool)
        .await
        .map_err(|error| {
            if is_unique_violation(&error) {
                AppError::Conflict("A user with that name already exists.".to_string())
            } else {
                AppError::Database(error)
            }
        })?;

        Ok(())
    }

    /// Get user by id.
    pub async fn get_user(&self, id: &str) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    /// Get user by username.
    pub async fn get_user_by_username(&self, username: &str) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE username = ?")
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    /// Delete a user.
    ///
    /// Owned posts and collection rows go with it via cascade.
    pub async fn delete_user(&self, id: &str) -> Result<(), AppError> {
        sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    // =========================================================================
    // Posts
    // =========================================================================

    /// Get post row by id.
    pub async fn get_post(&self, id: &str) -> Result<Option<Post>, AppError> {
        let post = sqlx::query_as::<_, Post>("SELECT * FROM posts WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(post)
    }

    /// Get post with author/title names by id.
    pub async fn get_post_detail(&self, id: &str) -> Result<Option<PostDetail>, AppError> {
        let detail =
            sqlx::query_as::<_, PostDetail>(&format!("{POST_DETAIL_SELECT} WHERE posts.id = ?"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(detail)
    }

    /// Get all posts with author/title names.
    pub async fn get_all_post_details(&self) -> Result<Vec<PostDetail>, AppError> {
        let details = sqlx::query_as::<_, PostDetail>(&format!(
            "{POST_DETAIL_SELECT} ORDER BY posts.added DESC"
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(details)
    }

    /// Get posts owned by a user.
    pub async fn get_post_details_by_user(
        &self,
        user_id: &str,
    ) -> Result<Vec<PostDetail>, AppError> {
        let details = sqlx::query_as::<_, PostDetail>(&format!(
            "{POST_DETAIL_SELECT} WHERE posts.user_id = ? ORDER BY posts.added DESC"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(details)
    }

    /// Get posts by id set, in no particular order.
    pub async fn get_post_details_by_ids(
        &self,
        ids: &[String],
    ) -> Result<Vec<PostDetail>, AppError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut builder =
            QueryBuilder::<Sqlite>::new(format!("{POST_DETAIL_SELECT} WHERE posts.id IN ("));
        let mut separated = builder.separated(", ");
        for id in ids {
            separated.push_bind(id);
        }
        separated.push_unseparated(")");

        let details = builder
            .build_query_as::<PostDetail>()
            .fetch_all(&self.pool)
            .await?;
        Ok(details)
    }

    /// Delete a post row.
    pub async fn delete_post(&self, id: &str) -> Result<(), AppError> {
        sqlx::query("DELETE FROM posts WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Users who have collected a post.
    pub async fn get_collectors(&self, post_id: &str) -> Result<Vec<User>, AppError> {
        let users = sqlx::query_as::<_, User>(
            "SELECT users.* FROM users \
             JOIN collections ON collections.user_id = users.id \
             WHERE collections.post_id = ?",
        )
        .bind(post_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(users)
    }

    // =========================================================================
    // Search
    // =========================================================================

    /// Posts whose title text contains the query (case-insensitive).
    pub async fn search_posts_by_title(&self, query: &str) -> Result<Vec<PostDetail>, AppError> {
        let details = sqlx::query_as::<_, PostDetail>(&format!(
            "{POST_DETAIL_SELECT} WHERE titles.title LIKE '%' || ? || '%'"
        ))
        .bind(query)
        .fetch_all(&self.pool)
        .await?;
        Ok(details)
    }

    /// Posts whose author name contains the query.
    pub async fn search_posts_by_author(&self, query: &str) -> Result<Vec<PostDetail>, AppError> {
        let details = sqlx::query_as::<_, PostDetail>(&format!(
            "{POST_DETAIL_SELECT} WHERE authors.name LIKE '%' || ? || '%'"
        ))
        .bind(query)
        .fetch_all(&self.pool)
        .await?;
        Ok(details)
    }

    /// Posts whose quote contains the query.
    pub async fn search_posts_by_quote(&self, query: &str) -> Result<Vec<PostDetail>, AppError> {
        let details = sqlx::query_as::<_, PostDetail>(&format!(
            "{POST_DETAIL_SELECT} WHERE posts.quote LIKE '%' || ? || '%'"
        ))
        .bind(query)
        .fetch_all(&self.pool)
        .await?;
        Ok(details)
    }

    /// Posts whose address contains the query.
    ///
    /// Posts without an address never match.
    pub async fn search_posts_by_address(&self, query: &str) -> Result<Vec<PostDetail>, AppError> {
        let details = sqlx::query_as::<_, PostDetail>(&format!(
            "{POST_DETAIL_SELECT} WHERE posts.address LIKE '%' || ? || '%'"
        ))
        .bind(query)
        .fetch_all(&self.pool)
        .await?;
        Ok(details)
    }

    // =========================================================================
    // Collections
    // =========================================================================

    /// Whether a user has collected a post.
    pub async fn is_collected(&self, user_id: &str, post_id: &str) -> Result<bool, AppError> {
        let found = sqlx::query_scalar::<_, i64>(
            "SELECT EXISTS(SELECT 1 FROM collections WHERE user_id = ? AND post_id = ?)",
        )
        .bind(user_id)
        .bind(post_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(found != 0)
    }

    /// Insert a collection membership row.
    ///
    /// The UNIQUE(user_id, post_id) constraint backstops the
    /// application-level membership check.
    pub async fn insert_collection_entry(&self, entry: &CollectionEntry) -> Result<(), AppError> {
        sqlx::query("INSERT INTO collections (id, user_id, post_id, added) VALUES (?, ?, ?, ?)")
            .bind(&entry.id)
            .bind(&entry.user_id)
            .bind(&entry.post_id)
            .bind(entry.added)
            .execute(&self.pool)
            .await
            .map_err(|error| {
                if is_unique_violation(&error) {
                    AppError::Conflict("Post already in the collection.".to_string())
                } else {
                    AppError::Database(error)
                }
            })?;
        Ok(())
    }

    /// Remove a collection membership row.
    ///
    /// Returns whether a row was removed.
    pub async fn delete_collection_entry(
        &self,
        user_id: &str,
        post_id: &str,
    ) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM collections WHERE user_id = ? AND post_id = ?")
            .bind(user_id)
            .bind(post_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Posts a user has collected, oldest bookmark first.
    pub async fn get_collected_post_details(
        &self,
        user_id: &str,
    ) -> Result<Vec<PostDetail>, AppError> {
        let details = sqlx::query_as::<_, PostDetail>(&format!(
            "{POST_DETAIL_SELECT} \
             JOIN collections ON collections.post_id = posts.id \
             WHERE collections.user_id = ? \
             ORDER BY collections.added ASC"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(details)
    }

    /// Ids of posts a user has collected.
    pub async fn get_collected_post_ids(&self, user_id: &str) -> Result<Vec<String>, AppError> {
        let ids =
            sqlx::query_scalar::<_, String>("SELECT post_id FROM collections WHERE user_id = ?")
                .bind(user_id)
                .fetch_all(&self.pool)
                .await?;
        Ok(ids)
    }

    /// Ids of users who have collected a post.
    pub async fn get_collector_ids(&self, post_id: &str) -> Result<Vec<String>, AppError> {
        let ids =
            sqlx::query_scalar::<_, String>("SELECT user_id FROM collections WHERE post_id = ?")
                .bind(post_id)
                .fetch_all(&self.pool)
                .await?;
        Ok(ids)
    }

    /// Ids of posts a user owns.
    pub async fn get_owned_post_ids(&self, user_id: &str) -> Result<Vec<String>, AppError> {
        let ids = sqlx::query_scalar::<_, String>("SELECT id FROM posts WHERE user_id = ?")
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(ids)
    }

    // =========================================================================
    // Authors and titles
    // =========================================================================

    /// All authors, by name.
    pub async fn get_authors(&self) -> Result<Vec<Author>, AppError> {
        let authors = sqlx::query_as::<_, Author>("SELECT * FROM authors ORDER BY name ASC")
            .fetch_all(&self.pool)
            .await?;
        Ok(authors)
    }

    /// Author by id.
    pub async fn get_author(&self, id: &str) -> Result<Option<Author>, AppError> {
        let author = sqlx::query_as::<_, Author>("SELECT * FROM authors WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(author)
    }

    /// All titles, by text.
    pub async fn get_titles(&self) -> Result<Vec<Title>, AppError> {
        let titles = sqlx::query_as::<_, Title>("SELECT * FROM titles ORDER BY title ASC")
            .fetch_all(&self.pool)
            .await?;
        Ok(titles)
    }

    /// Title by id.
    pub async fn get_title(&self, id: &str) -> Result<Option<Title>, AppError> {
        let title = sqlx::query_as::<_, Title>("SELECT * FROM titles WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(title)
    }

    /// Titles belonging to an author.
    pub async fn get_titles_by_author(&self, author_id: &str) -> Result<Vec<Title>, AppError> {
        let titles =
            sqlx::query_as::<_, Title>("SELECT * FROM titles WHERE author_id = ? ORDER BY title")
                .bind(author_id)
                .fetch_all(&self.pool)
                .await?;
        Ok(titles)
    }

    /// Ids of posts referencing a title.
    pub async fn get_post_ids_by_title(&self, title_id: &str) -> Result<Vec<String>, AppError> {
        let ids = sqlx::query_scalar::<_, String>("SELECT id FROM posts WHERE title_id = ?")
            .bind(title_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(ids)
    }

    /// Reference-counted cleanup after a post deletion.
    ///
    /// Deletes the title if no post references it anymore, then the
    /// author if no title references them anymore, in one
    /// transaction. Runs after the post delete has committed.
    pub async fn remove_orphaned_title_and_author(
        &self,
        title_id: &str,
        author_id: &str,
    ) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;

        let post_count =
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM posts WHERE title_id = ?")
                .bind(title_id)
                .fetch_one(&mut *tx)
                .await?;
        if post_count == 0 {
            sqlx::query("DELETE FROM titles WHERE id = ?")
                .bind(title_id)
                .execute(&mut *tx)
                .await?;
        }

        let title_count =
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM titles WHERE author_id = ?")
                .bind(author_id)
                .fetch_one(&mut *tx)
                .await?;
        if title_count == 0 {
            sqlx::query("DELETE FROM authors WHERE id = ?")
                .bind(author_id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    // =========================================================================
    // Ingestion transactions
    // =========================================================================

    /// Begin a staged ingestion transaction.
    ///
    /// Author/title resolution, the filename uniqueness scan, and the
    /// post write all happen against this handle; nothing becomes
    /// durable until [`PostIngest::commit`]. Dropping the handle
    /// rolls everything back.
    pub async fn begin_ingest(&self) -> Result<PostIngest, AppError> {
        let tx = self.pool.begin().await?;
        Ok(PostIngest { tx })
    }
}

/// Open transaction for the post ingestion workflow.
///
/// Intermediate author/title creates are visible (id-assigned) to
/// later statements on this handle but not to other connections
/// until commit.
pub struct PostIngest {
    tx: sqlx::Transaction<'static, Sqlite>,
}

impl PostIngest {
    /// Find or create an author by exact name, returning its id.
    ///
    /// Uses upsert-with-return so concurrent ingests racing on the
    /// same new name converge on one row.
    pub async fn resolve_author(&mut self, name: &str) -> Result<String, AppError> {
        let id = sqlx::query_scalar::<_, String>(
            "INSERT INTO authors (id, name) VALUES (?, ?) \
             ON CONFLICT(name) DO UPDATE SET name = excluded.name \
             RETURNING id",
        )
        .bind(EntityId::new().0)
        .bind(name)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(id)
    }

    /// Find or create a title by (text, author), returning its id.
    pub async fn resolve_title(&mut self, title: &str, author_id: &str) -> Result<String, AppError> {
        let id = sqlx::query_scalar::<_, String>(
            "INSERT INTO titles (id, title, author_id) VALUES (?, ?, ?) \
             ON CONFLICT(title, author_id) DO UPDATE SET title = excluded.title \
             RETURNING id",
        )
        .bind(EntityId::new().0)
        .bind(title)
        .bind(author_id)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(id)
    }

    /// Whether any post already holds this filename.
    ///
    /// Sees rows staged earlier in this transaction; concurrent
    /// transactions generating the same candidate are not excluded
    /// (known gap, no database constraint on filename).
    pub async fn filename_exists(&mut self, filename: &str) -> Result<bool, AppError> {
        let found = sqlx::query_scalar::<_, i64>(
            "SELECT EXISTS(SELECT 1 FROM posts WHERE filename = ?)",
        )
        .bind(filename)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(found != 0)
    }

    /// Stage the new post row.
    pub async fn insert_post(&mut self, post: &Post) -> Result<(), AppError> {
        sqlx::query(
            "INSERT INTO posts (
                id, user_id, author_id, title_id, quote,
                latitude, longitude, address,
                filename, thumbnail_url, photo_url, added
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&post.id)
        .bind(&post.user_id)
        .bind(&post.author_id)
        .bind(&post.title_id)
        .bind(&post.quote)
        .bind(post.latitude)
        .bind(post.longitude)
        .bind(&post.address)
        .bind(&post.filename)
        .bind(&post.thumbnail_url)
        .bind(&post.photo_url)
        .bind(post.added)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    /// Stage an update of an existing post row.
    pub async fn update_post(&mut self, post: &Post) -> Result<(), AppError> {
        sqlx::query(
            "UPDATE posts SET
                author_id = ?, title_id = ?, quote = ?,
                latitude = ?, longitude = ?, address = ?,
                thumbnail_url = ?, photo_url = ?
             WHERE id = ?",
        )
        .bind(&post.author_id)
        .bind(&post.title_id)
        .bind(&post.quote)
        .bind(post.latitude)
        .bind(post.longitude)
        .bind(&post.address)
        .bind(&post.thumbnail_url)
        .bind(&post.photo_url)
        .bind(&post.id)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    /// Commit the staged writes.
    pub async fn commit(self) -> Result<(), AppError> {
        self.tx.commit().await?;
        Ok(())
    }
}

#[cfg(test)]
pub(crate) use test_support::*;

#[cfg(test)]
mod test_support {
    use super::*;
    use chrono::Utc;

    /// Insert a post with freshly resolved author/title in one
    /// transaction. Test fixture helper.
    pub async fn seed_post(
        db: &Database,
        user_id: &str,
        author: &str,
        title: &str,
        quote: &str,
        filename: &str,
    ) -> Post {
        let mut ingest = db.begin_ingest().await.unwrap();
        let author_id = ingest.resolve_author(author).await.unwrap();
        let title_id = ingest.resolve_title(title, &author_id).await.unwrap();
        let post = Post {
            id: EntityId::new().0,
            user_id: user_id.to_string(),
            author_id,
            title_id,
            quote: quote.to_string(),
            latitude: None,
            longitude: None,
            address: None,
            filename: filename.to_string(),
            thumbnail_url: format!("https://media.test/thumb/{filename}"),
            photo_url: format!("https://media.test/photos/{filename}"),
            added: Utc::now(),
        };
        ingest.insert_post(&post).await.unwrap();
        ingest.commit().await.unwrap();
        post
    }
}
