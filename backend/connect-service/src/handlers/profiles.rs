/// Profile handlers - search, onboarding, own profile and profile pages
use actix_web::{web, HttpResponse};
use serde::Deserialize;
use validator::Validate;

use crate::error::Result;
use crate::handlers::ImagePayload;
use crate::middleware::{AuthenticatedUser, Viewer};
use crate::models::ProfileChanges;
use crate::services::AppServices;

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateProfileRequest {
    #[validate(length(min = 1, message = "Username is required"))]
    pub username: String,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateProfileRequest {
    #[validate(length(min = 1, message = "Username is required"))]
    pub username: Option<String>,
    pub name: Option<String>,
    #[validate(length(max = 150, message = "Bio must be at most 150 characters"))]
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
    /// New avatar image; uploaded before the profile row is updated
    pub avatar: Option<ImagePayload>,
}

pub async fn search_profiles(
    services: web::Data<AppServices>,
    query: web::Query<SearchQuery>,
) -> Result<HttpResponse> {
    let profiles = services.profiles.search(&query.q).await?;
    Ok(HttpResponse::Ok().json(profiles))
}

pub async fn create_profile(
    services: web::Data<AppServices>,
    viewer: Viewer,
    req: web::Json<CreateProfileRequest>,
) -> Result<HttpResponse> {
    req.validate()?;
    let profile = services
        .profiles
        .create(viewer.0, &req.username, &req.name)
        .await?;
    Ok(HttpResponse::Created().json(profile))
}

pub async fn get_my_profile(
    services: web::Data<AppServices>,
    user: AuthenticatedUser,
) -> Result<HttpResponse> {
    let profile = services.profiles.get_by_user_id(user.0).await?;
    Ok(HttpResponse::Ok().json(profile))
}

pub async fn update_my_profile(
    services: web::Data<AppServices>,
    viewer: Viewer,
    req: web::Json<UpdateProfileRequest>,
) -> Result<HttpResponse> {
    let req = req.into_inner();
    req.validate()?;

    let changes = ProfileChanges {
        username: req.username,
        name: req.name,
        bio: req.bio,
        avatar_url: req.avatar_url,
    };
    let avatar = req.avatar.map(ImagePayload::decode).transpose()?;

    let profile = services
        .media
        .update_profile_with_avatar(viewer.0, changes, avatar)
        .await?;
    Ok(HttpResponse::Ok().json(profile))
}

pub async fn get_profile_by_username(
    services: web::Data<AppServices>,
    username: web::Path<String>,
) -> Result<HttpResponse> {
    let profile = services.profiles.get_by_username(&username).await?;
    Ok(HttpResponse::Ok().json(profile))
}
