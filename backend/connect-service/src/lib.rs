/// Connect Service Library
///
/// HTTP API of the photo-sharing app: profiles, posts, likes, comments,
/// follows, and the feed/explore streams assembled from them.
///
/// # Modules
///
/// - `handlers`: HTTP request handlers and route table
/// - `models`: Rows and augmented read types
/// - `services`: Business logic layer
/// - `db`: Store trait with Postgres and in-memory implementations
/// - `cache`: Read cache keys, tags and invalidation
/// - `middleware`: Bearer-token authentication
/// - `error`: Error types and handling
/// - `config`: Configuration management
/// - `metrics`: Prometheus collectors
pub mod cache;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod models;
pub mod services;

pub use config::Config;
pub use error::{AppError, Result};
