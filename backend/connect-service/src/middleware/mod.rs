/// HTTP middleware for connect-service
///
/// `JwtAuthMiddleware` resolves the viewer from a Bearer token. Read routes
/// accept anonymous requests, so a missing header passes through with no
/// viewer; a present but invalid token is rejected.
pub mod jwt;

pub use jwt::{Claims, JwtValidator};

use actix_web::dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform};
use actix_web::{Error, FromRequest, HttpMessage, HttpRequest};
use futures::future::LocalBoxFuture;
use std::future::{ready, Ready};
use std::rc::Rc;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::AppError;

/// Authenticated user id stored in request extensions
#[derive(Debug, Clone, Copy)]
pub struct UserId(pub Uuid);

/// Actix middleware that validates an optional Bearer token
#[derive(Clone)]
pub struct JwtAuthMiddleware {
    validator: Arc<JwtValidator>,
}

impl JwtAuthMiddleware {
    pub fn new(validator: Arc<JwtValidator>) -> Self {
        Self { validator }
    }
}

impl<S, B> Transform<S, ServiceRequest> for JwtAuthMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = JwtAuthMiddlewareService<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(JwtAuthMiddlewareService {
            service: Rc::new(service),
            validator: self.validator.clone(),
        }))
    }
}

pub struct JwtAuthMiddlewareService<S> {
    service: Rc<S>,
    validator: Arc<JwtValidator>,
}

impl<S, B> Service<ServiceRequest> for JwtAuthMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = self.service.clone();
        let validator = self.validator.clone();

        Box::pin(async move {
            let header = req
                .headers()
                .get("Authorization")
                .map(|h| h.to_str().map(str::to_owned));

            if let Some(header) = header {
                let header = header
                    .map_err(|_| AppError::Unauthorized("Invalid Authorization header".into()))?;
                let token = header
                    .strip_prefix("Bearer ")
                    .ok_or_else(|| AppError::Unauthorized("Invalid Authorization scheme".into()))?;

                let user_id = validator.validate(token).map_err(|e| {
                    tracing::debug!(error = %e, "rejected bearer token");
                    AppError::Unauthorized("Invalid or expired token".into())
                })?;

                req.extensions_mut().insert(UserId(user_id));
            }

            service.call(req).await
        })
    }
}

/// The viewer, if the request carried a valid token
#[derive(Debug, Clone, Copy)]
pub struct Viewer(pub Option<Uuid>);

impl FromRequest for Viewer {
    type Error = Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut actix_web::dev::Payload) -> Self::Future {
        ready(Ok(Viewer(
            req.extensions().get::<UserId>().map(|user| user.0),
        )))
    }
}

/// The viewer, required; anonymous requests fail with "Not authenticated"
#[derive(Debug, Clone, Copy)]
pub struct AuthenticatedUser(pub Uuid);

impl FromRequest for AuthenticatedUser {
    type Error = Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut actix_web::dev::Payload) -> Self::Future {
        ready(
            req.extensions()
                .get::<UserId>()
                .map(|user| AuthenticatedUser(user.0))
                .ok_or_else(|| AppError::not_authenticated().into()),
        )
    }
}
