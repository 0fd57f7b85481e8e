/// Feed handlers - the personalized feed and the explore stream
use actix_web::{web, HttpResponse};

use crate::error::Result;
use crate::handlers::PageQuery;
use crate::middleware::Viewer;
use crate::services::AppServices;

/// Posts by the viewer and everyone they follow; empty for anonymous callers
pub async fn get_feed(
    services: web::Data<AppServices>,
    viewer: Viewer,
    query: web::Query<PageQuery>,
) -> Result<HttpResponse> {
    let page = services.feed.feed_page(viewer.0, query.page).await?;
    Ok(HttpResponse::Ok().json(page))
}

/// All posts, newest first
pub async fn get_explore(
    services: web::Data<AppServices>,
    viewer: Viewer,
    query: web::Query<PageQuery>,
) -> Result<HttpResponse> {
    let page = services.feed.explore_page(viewer.0, query.page).await?;
    Ok(HttpResponse::Ok().json(page))
}
