use actix_cors::Cors;
use actix_web::{web, App, HttpResponse, HttpServer};
use anyhow::Context;
use connect_service::cache::new_shared_cache;
use connect_service::config::{Config, StorageBackend, StoreBackend};
use connect_service::db::{MemorySocialStore, PgSocialStore, SocialStore};
use connect_service::handlers;
use connect_service::middleware::JwtValidator;
use connect_service::services::AppServices;
use media_storage::{MemoryObjectStore, ObjectStore, S3ObjectStore};
use serde::Serialize;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

struct HealthState {
    store: Arc<dyn SocialStore>,
    storage: Arc<dyn ObjectStore>,
}

#[derive(Serialize)]
struct ComponentCheck {
    healthy: bool,
    message: String,
    latency_ms: u64,
}

impl HealthState {
    async fn check_store(&self) -> ComponentCheck {
        let start = Instant::now();
        let result = self.store.health_check().await;
        component(result.map_err(|e| e.to_string()), "store reachable", start)
    }

    async fn check_storage(&self) -> ComponentCheck {
        let start = Instant::now();
        let result = self.storage.health_check().await;
        component(result.map_err(|e| e.to_string()), "object storage reachable", start)
    }
}

fn component(result: Result<(), String>, ok_message: &str, start: Instant) -> ComponentCheck {
    let latency_ms = start.elapsed().as_millis() as u64;
    match result {
        Ok(()) => ComponentCheck {
            healthy: true,
            message: ok_message.to_string(),
            latency_ms,
        },
        Err(e) => ComponentCheck {
            healthy: false,
            message: e,
            latency_ms,
        },
    }
}

async fn health_summary(state: web::Data<HealthState>) -> HttpResponse {
    let (store, storage) = tokio::join!(state.check_store(), state.check_storage());
    let healthy = store.healthy && storage.healthy;

    let body = serde_json::json!({
        "status": if healthy { "ok" } else { "unhealthy" },
        "service": "connect-service",
        "version": env!("CARGO_PKG_VERSION"),
        "checks": { "store": store, "storage": storage },
    });

    if healthy {
        HttpResponse::Ok().json(body)
    } else {
        HttpResponse::ServiceUnavailable().json(body)
    }
}

async fn liveness_check() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({"alive": true}))
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut terminate) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {},
                    _ = terminate.recv() => {},
                }
            }
            Err(e) => {
                tracing::warn!("SIGTERM handler unavailable: {}", e);
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,actix_web=info,sqlx=warn".into());

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

async fn build_store(config: &Config) -> anyhow::Result<Arc<dyn SocialStore>> {
    match config.database.backend {
        StoreBackend::Memory => {
            tracing::warn!("Using in-memory store; data is lost on restart");
            Ok(Arc::new(MemorySocialStore::new()))
        }
        StoreBackend::Postgres => {
            let pool = PgPoolOptions::new()
                .max_connections(config.database.max_connections)
                .acquire_timeout(Duration::from_secs(5))
                .connect(&config.database.url)
                .await
                .context("Failed to create database pool")?;

            if config.database.run_migrations {
                sqlx::migrate!("./migrations")
                    .run(&pool)
                    .await
                    .context("Failed to run database migrations")?;
                tracing::info!("Database migrations applied");
            }

            tracing::info!(
                max_connections = config.database.max_connections,
                "Connected to database"
            );
            Ok(Arc::new(PgSocialStore::new(pool)))
        }
    }
}

async fn build_storage(config: &Config) -> Arc<dyn ObjectStore> {
    let object_store = config.storage.object_store.clone();
    match config.storage.backend {
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory object storage; uploads are lost on restart");
            Arc::new(MemoryObjectStore::new(object_store))
        }
        StorageBackend::S3 => Arc::new(S3ObjectStore::from_config(object_store).await),
    }
}

/// Connect Service
///
/// Serves the photo-sharing API under `/api/v1`.
///
/// # Routes
///
/// - `/api/v1/feed`, `/api/v1/explore` - paginated post streams
/// - `/api/v1/posts/*` - create, read, delete, like, comment
/// - `/api/v1/profiles/*` - search, onboarding, edit, lookup by username
/// - `/api/v1/users/{id}/*` - profile grid and follow graph
#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    let config = Config::from_env().map_err(|e| anyhow::anyhow!(e))?;
    init_tracing(config.app.json_logs);

    tracing::info!("Starting connect-service v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!("Environment: {}", config.app.env);

    let store = build_store(&config).await?;
    let storage = build_storage(&config).await;
    let cache = new_shared_cache(Duration::from_secs(config.cache.ttl_secs));
    let validator = Arc::new(JwtValidator::new(
        &config.auth.jwt_secret,
        config.auth.leeway_secs,
    ));

    let services = web::Data::new(AppServices::new(
        store.clone(),
        storage.clone(),
        cache,
    ));
    let health_state = web::Data::new(HealthState { store, storage });

    let bind_address = config.bind_address();
    tracing::info!("Starting HTTP server at {}", bind_address);

    let allowed_origins = config.cors.allowed_origins.clone();
    let server = HttpServer::new(move || {
        let mut cors = Cors::default();
        for origin in allowed_origins.split(',') {
            let origin = origin.trim();
            if origin == "*" {
                cors = cors.allow_any_origin();
            } else if !origin.is_empty() {
                cors = cors.allowed_origin(origin);
            }
        }
        cors = cors.allow_any_method().allow_any_header().max_age(3600);

        App::new()
            .app_data(services.clone())
            .app_data(health_state.clone())
            .wrap(cors)
            .wrap(tracing_actix_web::TracingLogger::default())
            .route(
                "/metrics",
                web::get().to(connect_service::metrics::serve_metrics),
            )
            .route("/api/v1/health", web::get().to(health_summary))
            .route("/api/v1/health/live", web::get().to(liveness_check))
            .configure(handlers::configure_routes(validator.clone()))
    })
    .bind(&bind_address)
    .with_context(|| format!("Failed to bind {}", bind_address))?
    .run();

    let server_handle = server.handle();
    tokio::pin!(server);

    tokio::select! {
        result = &mut server => {
            result.context("HTTP server failed")?;
        }
        _ = shutdown_signal() => {
            tracing::info!("Shutdown signal received");
            server_handle.stop(true).await;
        }
    }

    tracing::info!("connect-service shut down");
    Ok(())
}
