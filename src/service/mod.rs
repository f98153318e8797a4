//! Service layer
//!
//! Contains business logic separated from HTTP handlers.
//! Services orchestrate database, media, geocoder, and token
//! operations.

mod account;
mod collection;
mod post;
mod recommendation;

pub use account::{AccountService, DeleteAccount, Registration, TokenPair};
pub use collection::CollectionService;
pub use post::{NewPost, PhotoUpload, PostChanges, PostService, SearchField, SearchHit};
pub use recommendation::RecommendationService;
