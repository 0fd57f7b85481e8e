/// HTTP handlers for connect-service
///
/// - Feed: the personalized feed and the explore stream
/// - Posts: create, read, delete, like and unlike
/// - Comments: list, add and delete
/// - Profiles: search, onboarding, own profile, profile by username
/// - Social: profile grid and follow graph per user
use actix_web::web;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::Deserialize;
use std::sync::Arc;

use crate::error::{AppError, Result};
use crate::middleware::{JwtAuthMiddleware, JwtValidator};
use crate::services::ImageUpload;

pub mod comments;
pub mod feed;
pub mod posts;
pub mod profiles;
pub mod social;

pub use comments::{add_comment, delete_comment, list_comments};
pub use feed::{get_explore, get_feed};
pub use posts::{create_post, delete_post, get_post, like_post, unlike_post};
pub use profiles::{
    create_profile, get_my_profile, get_profile_by_username, search_profiles, update_my_profile,
};
pub use social::{
    follow_counts, follow_status, follow_user, list_followers, list_following, unfollow_user,
    user_posts,
};

/// Zero-based page selector
#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    #[serde(default)]
    pub page: u32,
}

/// An image carried inline in a JSON body
#[derive(Debug, Deserialize)]
pub struct ImagePayload {
    pub file_name: String,
    pub content_type: String,
    /// Standard base64 of the file bytes
    pub data: String,
}

impl ImagePayload {
    pub fn decode(self) -> Result<ImageUpload> {
        let bytes = STANDARD
            .decode(self.data.as_bytes())
            .map_err(|_| AppError::Validation("Image data is not valid base64".to_string()))?;

        Ok(ImageUpload {
            file_name: self.file_name,
            content_type: self.content_type,
            bytes,
        })
    }
}

/// Largest accepted JSON body; images travel inline as base64
pub const JSON_BODY_LIMIT: usize = 16 * 1024 * 1024;

/// Body extraction failures answer with the API error body
pub fn json_config() -> web::JsonConfig {
    web::JsonConfig::default()
        .limit(JSON_BODY_LIMIT)
        .error_handler(|err, _req| {
            AppError::Validation(format!("Invalid request body: {}", err)).into()
        })
}

pub fn query_config() -> web::QueryConfig {
    web::QueryConfig::default().error_handler(|err, _req| {
        AppError::Validation(format!("Invalid query string: {}", err)).into()
    })
}

pub fn path_config() -> web::PathConfig {
    web::PathConfig::default().error_handler(|err, _req| {
        AppError::Validation(format!("Invalid path: {}", err)).into()
    })
}

/// Register the `/api/v1` routes behind the bearer-token middleware,
/// together with the extractor configs they rely on
pub fn configure_routes(validator: Arc<JwtValidator>) -> impl FnOnce(&mut web::ServiceConfig) {
    move |cfg| {
        cfg.app_data(json_config())
            .app_data(query_config())
            .app_data(path_config());

        cfg.service(
            web::scope("/api/v1")
                .wrap(JwtAuthMiddleware::new(validator))
                .route("/feed", web::get().to(get_feed))
                .route("/explore", web::get().to(get_explore))
                .service(
                    web::scope("/posts")
                        .service(web::resource("").route(web::post().to(create_post)))
                        .service(
                            web::resource("/{post_id}")
                                .route(web::get().to(get_post))
                                .route(web::delete().to(delete_post)),
                        )
                        .service(
                            web::resource("/{post_id}/like")
                                .route(web::post().to(like_post))
                                .route(web::delete().to(unlike_post)),
                        )
                        .service(
                            web::resource("/{post_id}/comments")
                                .route(web::get().to(list_comments))
                                .route(web::post().to(add_comment)),
                        ),
                )
                .route("/comments/{comment_id}", web::delete().to(delete_comment))
                .service(
                    web::scope("/profiles")
                        .service(
                            web::resource("")
                                .route(web::get().to(search_profiles))
                                .route(web::post().to(create_profile)),
                        )
                        .service(
                            web::resource("/me")
                                .route(web::get().to(get_my_profile))
                                .route(web::patch().to(update_my_profile)),
                        )
                        .route("/{username}", web::get().to(get_profile_by_username)),
                )
                .service(
                    web::scope("/users/{user_id}")
                        .route("/posts", web::get().to(user_posts))
                        .route("/follow-counts", web::get().to(follow_counts))
                        .route("/followers", web::get().to(list_followers))
                        .route("/following", web::get().to(list_following))
                        .service(
                            web::resource("/follow")
                                .route(web::get().to(follow_status))
                                .route(web::post().to(follow_user))
                                .route(web::delete().to(unfollow_user)),
                        ),
                ),
        );
    }
}
