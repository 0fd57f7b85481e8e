/// Per-user handlers: profile grid and follow graph
use actix_web::{web, HttpResponse};
use serde::Serialize;
use uuid::Uuid;

use crate::error::Result;
use crate::middleware::Viewer;
use crate::services::AppServices;

#[derive(Debug, Serialize)]
pub struct FollowStatusResponse {
    pub following: bool,
}

/// Every post of a user, for the profile grid
pub async fn user_posts(
    services: web::Data<AppServices>,
    viewer: Viewer,
    user_id: web::Path<Uuid>,
) -> Result<HttpResponse> {
    let posts = services.feed.user_posts(*user_id, viewer.0).await?;
    Ok(HttpResponse::Ok().json(posts))
}

pub async fn follow_counts(
    services: web::Data<AppServices>,
    user_id: web::Path<Uuid>,
) -> Result<HttpResponse> {
    let counts = services.follows.counts(*user_id).await?;
    Ok(HttpResponse::Ok().json(counts))
}

pub async fn list_followers(
    services: web::Data<AppServices>,
    user_id: web::Path<Uuid>,
) -> Result<HttpResponse> {
    let profiles = services.follows.followers(*user_id).await?;
    Ok(HttpResponse::Ok().json(profiles))
}

pub async fn list_following(
    services: web::Data<AppServices>,
    user_id: web::Path<Uuid>,
) -> Result<HttpResponse> {
    let profiles = services.follows.following(*user_id).await?;
    Ok(HttpResponse::Ok().json(profiles))
}

pub async fn follow_status(
    services: web::Data<AppServices>,
    viewer: Viewer,
    user_id: web::Path<Uuid>,
) -> Result<HttpResponse> {
    let following = services.follows.status(viewer.0, *user_id).await?;
    Ok(HttpResponse::Ok().json(FollowStatusResponse { following }))
}

pub async fn follow_user(
    services: web::Data<AppServices>,
    viewer: Viewer,
    user_id: web::Path<Uuid>,
) -> Result<HttpResponse> {
    let follow = services.follows.follow(viewer.0, *user_id).await?;
    Ok(HttpResponse::Created().json(follow))
}

pub async fn unfollow_user(
    services: web::Data<AppServices>,
    viewer: Viewer,
    user_id: web::Path<Uuid>,
) -> Result<HttpResponse> {
    services.follows.unfollow(viewer.0, *user_id).await?;
    Ok(HttpResponse::NoContent().finish())
}
