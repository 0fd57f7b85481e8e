//! Test Harness Module
//!
//! Runs connect-service in-process on an ephemeral port, backed by the
//! in-memory social store and object store, and hands out API clients
//! authenticated as arbitrary users.

use actix_web::{dev::ServerHandle, web, App, HttpServer};
use connect_client::{ApiClient, ImageFile};
use connect_service::cache::new_shared_cache;
use connect_service::db::MemorySocialStore;
use connect_service::handlers::configure_routes;
use connect_service::middleware::JwtValidator;
use connect_service::services::AppServices;
use media_storage::MemoryObjectStore;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

const SECRET: &str = "core-flow-secret";

/// Test Environment
pub struct TestEnvironment {
    pub api_url: String,
    pub store: MemorySocialStore,
    pub storage: MemoryObjectStore,
    jwt: Arc<JwtValidator>,
    handle: ServerHandle,
}

impl TestEnvironment {
    pub async fn new() -> Self {
        let store = MemorySocialStore::new();
        let storage = MemoryObjectStore::default();
        let jwt = Arc::new(JwtValidator::new(SECRET, 0));
        let services = web::Data::new(AppServices::new(
            Arc::new(store.clone()),
            Arc::new(storage.clone()),
            new_shared_cache(Duration::from_secs(60)),
        ));

        let routes_jwt = jwt.clone();
        let server = HttpServer::new(move || {
            App::new()
                .app_data(services.clone())
                .configure(configure_routes(routes_jwt.clone()))
        })
        .workers(1)
        .bind(("127.0.0.1", 0))
        .expect("bind test server");

        let addr = server.addrs()[0];
        let server = server.run();
        let handle = server.handle();
        actix_web::rt::spawn(server);

        Self {
            api_url: format!("http://{}", addr),
            store,
            storage,
            jwt,
            handle,
        }
    }

    pub fn anonymous(&self) -> ApiClient {
        ApiClient::new(&self.api_url)
    }

    pub fn client_for(&self, user_id: Uuid) -> ApiClient {
        let token = self.jwt.issue(user_id, 3600).expect("issue token");
        ApiClient::new(&self.api_url).with_token(token)
    }

    /// New user with a profile; returns the user id and its client
    pub async fn signup(&self, username: &str) -> (Uuid, ApiClient) {
        let user_id = Uuid::new_v4();
        let client = self.client_for(user_id);
        client
            .create_profile(username, username)
            .await
            .expect("create profile");
        (user_id, client)
    }

    pub async fn cleanup(&self) {
        self.handle.stop(true).await;
    }
}

pub fn png(name: &str) -> ImageFile {
    ImageFile {
        file_name: name.to_string(),
        content_type: "image/png".to_string(),
        bytes: vec![0x89, b'P', b'N', b'G', 1, 2, 3],
    }
}
