/// Comment handlers
use actix_web::{web, HttpResponse};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::error::Result;
use crate::middleware::Viewer;
use crate::services::AppServices;

#[derive(Debug, Deserialize, Validate)]
pub struct AddCommentRequest {
    #[validate(length(min = 1, message = "Comment cannot be empty"))]
    pub text: String,
}

pub async fn list_comments(
    services: web::Data<AppServices>,
    post_id: web::Path<Uuid>,
) -> Result<HttpResponse> {
    let comments = services.comments.list(*post_id).await?;
    Ok(HttpResponse::Ok().json(comments))
}

pub async fn add_comment(
    services: web::Data<AppServices>,
    viewer: Viewer,
    post_id: web::Path<Uuid>,
    req: web::Json<AddCommentRequest>,
) -> Result<HttpResponse> {
    req.validate()?;
    let comment = services.comments.add(viewer.0, *post_id, &req.text).await?;
    Ok(HttpResponse::Created().json(comment))
}

pub async fn delete_comment(
    services: web::Data<AppServices>,
    viewer: Viewer,
    comment_id: web::Path<Uuid>,
) -> Result<HttpResponse> {
    services.comments.delete(viewer.0, *comment_id).await?;
    Ok(HttpResponse::NoContent().finish())
}
