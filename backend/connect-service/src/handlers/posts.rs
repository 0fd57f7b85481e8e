/// Post handlers - HTTP endpoints for post operations
use actix_web::{web, HttpResponse};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::error::Result;
use crate::handlers::ImagePayload;
use crate::middleware::Viewer;
use crate::services::{AppServices, PostDraft};

#[derive(Debug, Deserialize, Validate)]
pub struct CreatePostRequest {
    #[serde(default)]
    #[validate(length(max = 2200, message = "Caption must be at most 2200 characters"))]
    pub caption: String,
    pub image: Option<ImagePayload>,
}

/// Upload the image and create the post
pub async fn create_post(
    services: web::Data<AppServices>,
    viewer: Viewer,
    req: web::Json<CreatePostRequest>,
) -> Result<HttpResponse> {
    let req = req.into_inner();
    req.validate()?;

    let draft = PostDraft {
        caption: req.caption,
        image: req.image.map(ImagePayload::decode).transpose()?,
    };
    let post = services.posts.publish(viewer.0, draft).await?;

    Ok(HttpResponse::Created().json(post))
}

pub async fn get_post(
    services: web::Data<AppServices>,
    viewer: Viewer,
    post_id: web::Path<Uuid>,
) -> Result<HttpResponse> {
    let post = services.posts.get(*post_id, viewer.0).await?;
    Ok(HttpResponse::Ok().json(post))
}

pub async fn delete_post(
    services: web::Data<AppServices>,
    viewer: Viewer,
    post_id: web::Path<Uuid>,
) -> Result<HttpResponse> {
    services.posts.delete(viewer.0, *post_id).await?;
    Ok(HttpResponse::NoContent().finish())
}

pub async fn like_post(
    services: web::Data<AppServices>,
    viewer: Viewer,
    post_id: web::Path<Uuid>,
) -> Result<HttpResponse> {
    let like = services.likes.like(viewer.0, *post_id).await?;
    Ok(HttpResponse::Created().json(like))
}

pub async fn unlike_post(
    services: web::Data<AppServices>,
    viewer: Viewer,
    post_id: web::Path<Uuid>,
) -> Result<HttpResponse> {
    services.likes.unlike(viewer.0, *post_id).await?;
    Ok(HttpResponse::NoContent().finish())
}
