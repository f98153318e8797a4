//! API layer
//!
//! HTTP handlers for:
//! - Accounts and tokens (register/login/logout/refresh)
//! - Posts (create/read/update/delete/search)
//! - Collections
//! - Author/title listings
//! - Metrics (Prometheus)

mod authors;
mod collections;
mod converters;
mod dto;
pub mod metrics;
mod posts;
mod titles;
mod users;

pub use converters::*;
pub use dto::*;

pub use authors::authors_router;
pub use collections::collections_router;
pub use metrics::metrics_router;
pub use posts::posts_router;
pub use titles::titles_router;
pub use users::users_router;
