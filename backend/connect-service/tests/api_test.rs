//! HTTP-level tests against the in-memory store and object storage.

use actix_web::{test, web, App};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use connect_service::cache::new_shared_cache;
use connect_service::db::{MemorySocialStore, SocialStore};
use connect_service::handlers::configure_routes;
use connect_service::middleware::JwtValidator;
use connect_service::models::NewProfile;
use connect_service::services::{AppServices, PAGE_SIZE};
use media_storage::MemoryObjectStore;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

const SECRET: &str = "test-secret";

struct Harness {
    store: MemorySocialStore,
    storage: MemoryObjectStore,
    jwt: Arc<JwtValidator>,
    services: web::Data<AppServices>,
}

impl Harness {
    fn new() -> Self {
        let store = MemorySocialStore::new();
        let storage = MemoryObjectStore::default();
        let services = web::Data::new(AppServices::new(
            Arc::new(store.clone()),
            Arc::new(storage.clone()),
            new_shared_cache(Duration::from_secs(60)),
        ));

        Self {
            store,
            storage,
            jwt: Arc::new(JwtValidator::new(SECRET, 0)),
            services,
        }
    }

    fn bearer(&self, user: Uuid) -> (&'static str, String) {
        let token = self.jwt.issue(user, 3600).unwrap();
        ("Authorization", format!("Bearer {}", token))
    }

    async fn profile(&self, user_id: Uuid, username: &str) {
        self.store
            .insert_profile(&NewProfile {
                user_id,
                username: username.to_string(),
                name: username.to_string(),
                bio: String::new(),
                avatar_url: String::new(),
            })
            .await
            .unwrap();
    }
}

macro_rules! app {
    ($h:expr) => {
        test::init_service(
            App::new()
                .app_data($h.services.clone())
                .configure(configure_routes($h.jwt.clone())),
        )
        .await
    };
}

fn post_ids(body: &Value) -> Vec<String> {
    body["posts"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["id"].as_str().unwrap().to_string())
        .collect()
}

#[actix_web::test]
async fn test_anonymous_feed_is_empty() {
    let h = Harness::new();
    let app = app!(h);

    let req = test::TestRequest::get().uri("/api/v1/feed").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;

    assert_eq!(body, json!({"posts": [], "next_page": null}));
    assert_eq!(h.store.calls(), 0);
}

#[actix_web::test]
async fn test_feed_shows_followees_and_self_newest_first() {
    let h = Harness::new();
    let app = app!(h);
    let (a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
    for (id, name) in [(a, "alice"), (b, "bruno"), (c, "chen")] {
        h.profile(id, name).await;
    }

    for target in [b, c] {
        let req = test::TestRequest::post()
            .uri(&format!("/api/v1/users/{}/follow", target))
            .insert_header(h.bearer(a))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), 201);
    }

    let pb = h.store.insert_post(b, "b.jpg", "t1").await.unwrap();
    let pc = h.store.insert_post(c, "c.jpg", "t2").await.unwrap();
    let pa = h.store.insert_post(a, "a.jpg", "t3").await.unwrap();

    let req = test::TestRequest::get()
        .uri("/api/v1/feed?page=0")
        .insert_header(h.bearer(a))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;

    assert_eq!(
        post_ids(&body),
        vec![pa.id.to_string(), pc.id.to_string(), pb.id.to_string()]
    );
    assert_eq!(body["next_page"], Value::Null);
    assert_eq!(body["posts"][1]["profile"]["username"], "chen");
}

#[actix_web::test]
async fn test_explore_paginates_by_ten() {
    let h = Harness::new();
    let app = app!(h);
    let author = Uuid::new_v4();
    for i in 0..=PAGE_SIZE {
        h.store.insert_post(author, "p.jpg", &i.to_string()).await.unwrap();
    }

    let req = test::TestRequest::get().uri("/api/v1/explore").to_request();
    let first: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(first["posts"].as_array().unwrap().len(), PAGE_SIZE as usize);
    assert_eq!(first["next_page"], 1);
    assert_eq!(first["posts"][0]["caption"], PAGE_SIZE.to_string());

    let req = test::TestRequest::get().uri("/api/v1/explore?page=1").to_request();
    let second: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(second["posts"].as_array().unwrap().len(), 1);
    assert_eq!(second["posts"][0]["caption"], "0");
    assert_eq!(second["next_page"], Value::Null);
}

#[actix_web::test]
async fn test_create_post_without_image_makes_no_calls() {
    let h = Harness::new();
    let app = app!(h);

    let req = test::TestRequest::post()
        .uri("/api/v1/posts")
        .insert_header(h.bearer(Uuid::new_v4()))
        .set_json(json!({"caption": "no picture"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "Please select an image");
    assert_eq!(h.store.calls(), 0);
    assert_eq!(h.storage.upload_calls(), 0);
}

#[actix_web::test]
async fn test_create_post_uploads_then_inserts() {
    let h = Harness::new();
    let app = app!(h);
    let user = Uuid::new_v4();

    let req = test::TestRequest::post()
        .uri("/api/v1/posts")
        .insert_header(h.bearer(user))
        .set_json(json!({
            "caption": "harbor at dusk",
            "image": {
                "file_name": "harbor.webp",
                "content_type": "image/webp",
                "data": STANDARD.encode([9u8; 64]),
            }
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 201);

    let post: Value = test::read_body_json(resp).await;
    assert_eq!(post["user_id"], user.to_string());
    assert!(post["image_url"].as_str().unwrap().ends_with(".webp"));
    assert_eq!(h.storage.upload_calls(), 1);
    assert_eq!(h.store.calls(), 1);
}

#[actix_web::test]
async fn test_like_then_unlike_round_trips_counts() {
    let h = Harness::new();
    let app = app!(h);
    let viewer = Uuid::new_v4();
    let post = h.store.insert_post(Uuid::new_v4(), "p.jpg", "x").await.unwrap();
    let uri = format!("/api/v1/posts/{}", post.id);

    let read = |h: &Harness| {
        test::TestRequest::get()
            .uri(&uri)
            .insert_header(h.bearer(viewer))
            .to_request()
    };

    let before: Value = test::call_and_read_body_json(&app, read(&h)).await;
    assert_eq!(before["likes_count"], 0);
    assert_eq!(before["is_liked"], false);

    let req = test::TestRequest::post()
        .uri(&format!("{}/like", uri))
        .insert_header(h.bearer(viewer))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 201);

    let liked: Value = test::call_and_read_body_json(&app, read(&h)).await;
    assert_eq!(liked["likes_count"], 1);
    assert_eq!(liked["is_liked"], true);

    let req = test::TestRequest::delete()
        .uri(&format!("{}/like", uri))
        .insert_header(h.bearer(viewer))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 204);

    let after: Value = test::call_and_read_body_json(&app, read(&h)).await;
    assert_eq!(after, before);
}

#[actix_web::test]
async fn test_deleted_post_takes_comments_with_it() {
    let h = Harness::new();
    let app = app!(h);
    let owner = Uuid::new_v4();
    let post = h.store.insert_post(owner, "p.jpg", "x").await.unwrap();

    let req = test::TestRequest::post()
        .uri(&format!("/api/v1/posts/{}/comments", post.id))
        .insert_header(h.bearer(Uuid::new_v4()))
        .set_json(json!({"text": "lovely"}))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 201);

    let req = test::TestRequest::delete()
        .uri(&format!("/api/v1/posts/{}", post.id))
        .insert_header(h.bearer(owner))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 204);

    let req = test::TestRequest::get()
        .uri(&format!("/api/v1/posts/{}/comments", post.id))
        .to_request();
    let comments: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(comments, json!([]));

    let req = test::TestRequest::get()
        .uri(&format!("/api/v1/posts/{}", post.id))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 404);
}

#[actix_web::test]
async fn test_store_failure_fails_whole_page() {
    let h = Harness::new();
    let app = app!(h);
    h.store.insert_post(Uuid::new_v4(), "p.jpg", "x").await.unwrap();
    h.store.fail_on("count_likes");

    let req = test::TestRequest::get().uri("/api/v1/explore").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 500);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["status"], 500);
    assert!(body.get("posts").is_none());
}

#[actix_web::test]
async fn test_malformed_input_gets_error_body() {
    let h = Harness::new();
    let app = app!(h);
    let user = Uuid::new_v4();

    let req = test::TestRequest::post()
        .uri("/api/v1/profiles")
        .insert_header(h.bearer(user))
        .insert_header(("Content-Type", "application/json"))
        .set_payload("{not json")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["code"], "validation");
    assert_eq!(body["status"], 400);

    let req = test::TestRequest::get()
        .uri("/api/v1/explore?page=abc")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["code"], "validation");

    let req = test::TestRequest::get()
        .uri("/api/v1/posts/not-a-uuid")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["code"], "validation");
    assert_eq!(h.store.calls(), 0);
}

#[actix_web::test]
async fn test_mutation_without_token_is_not_authenticated() {
    let h = Harness::new();
    let app = app!(h);

    let req = test::TestRequest::post()
        .uri(&format!("/api/v1/users/{}/follow", Uuid::new_v4()))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 401);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "Not authenticated");
}

#[actix_web::test]
async fn test_invalid_token_rejected() {
    let h = Harness::new();
    let app = app!(h);
    let foreign = JwtValidator::new("another-secret", 0)
        .issue(Uuid::new_v4(), 3600)
        .unwrap();

    let req = test::TestRequest::get()
        .uri("/api/v1/explore")
        .insert_header(("Authorization", format!("Bearer {}", foreign)))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 401);
}

#[actix_web::test]
async fn test_taken_username_reports_username_taken() {
    let h = Harness::new();
    let app = app!(h);
    let (ana, bob) = (Uuid::new_v4(), Uuid::new_v4());
    h.profile(ana, "ana").await;
    h.profile(bob, "bob").await;

    let req = test::TestRequest::patch()
        .uri("/api/v1/profiles/me")
        .insert_header(h.bearer(bob))
        .set_json(json!({"username": "ana"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 409);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["code"], "username_taken");
    assert_eq!(body["error"], "Username is already taken");
}

#[actix_web::test]
async fn test_profile_route_and_follow_info() {
    let h = Harness::new();
    let app = app!(h);
    let (ana, bob) = (Uuid::new_v4(), Uuid::new_v4());
    h.profile(ana, "ana").await;
    h.profile(bob, "bob").await;

    let req = test::TestRequest::get().uri("/api/v1/profiles/ana").to_request();
    let profile: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(profile["user_id"], ana.to_string());

    let req = test::TestRequest::post()
        .uri(&format!("/api/v1/users/{}/follow", ana))
        .insert_header(h.bearer(bob))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 201);

    let req = test::TestRequest::get()
        .uri(&format!("/api/v1/users/{}/follow", ana))
        .insert_header(h.bearer(bob))
        .to_request();
    let status: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(status, json!({"following": true}));

    let req = test::TestRequest::get()
        .uri(&format!("/api/v1/users/{}/follow-counts", ana))
        .to_request();
    let counts: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(counts, json!({"followers": 1, "following": 0}));

    let req = test::TestRequest::get()
        .uri(&format!("/api/v1/users/{}/followers", ana))
        .to_request();
    let followers: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(followers[0]["username"], "bob");
}
