use actix_web::{
    Error, HttpMessage,
    dev::{Service, ServiceRequest, ServiceResponse, Transform},
    http::header::AUTHORIZATION,
};
use futures_util::future::{Ready, ok, ready};
use log::{debug, error, warn};
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::authenticated_user::AuthenticatedUser;
use crate::services::auth::jwt;

/// Bearer-token authentication middleware.
///
/// Verifies the JWT on every request and inserts an `AuthenticatedUser`
/// into the request extensions for handler extractors. Token issuance is an
/// external concern; only verification happens here.
#[derive(Clone, Default)]
pub struct BearerAuthentication;

impl BearerAuthentication {
    pub fn new() -> Self {
        Self
    }
}

impl<S, B> Transform<S, ServiceRequest> for BearerAuthentication
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Transform = BearerAuthenticationMiddleware<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ok(BearerAuthenticationMiddleware {
            service: Rc::new(service),
        })
    }
}

pub struct BearerAuthenticationMiddleware<S> {
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for BearerAuthenticationMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    fn poll_ready(&self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.service.poll_ready(cx)
    }

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = self.service.clone();
        let path = req.path().to_string();

        // Skip auth check for OPTIONS requests (CORS pre-flight)
        if req.method() == actix_web::http::Method::OPTIONS {
            debug!("Skipping authentication for OPTIONS request to: {}", path);
            return Box::pin(service.call(req));
        }

        let auth_header = match req.headers().get(AUTHORIZATION) {
            Some(header) => header,
            None => {
                warn!("No Authorization header found for path: {}", path);
                return Box::pin(ready(Err(Error::from(
                    actix_web::error::ErrorUnauthorized("Missing Authorization header"),
                ))));
            }
        };

        let auth_str = match auth_header.to_str() {
            Ok(s) => s,
            Err(_) => {
                warn!("Invalid Authorization header encoding for path: {}", path);
                return Box::pin(ready(Err(Error::from(
                    actix_web::error::ErrorUnauthorized("Invalid Authorization header"),
                ))));
            }
        };

        let Some(token) = auth_str.strip_prefix("Bearer ") else {
            warn!("Invalid Authorization header format (not Bearer) for path: {}", path);
            return Box::pin(ready(Err(Error::from(
                actix_web::error::ErrorUnauthorized(
                    "Invalid Authorization format, expected Bearer token",
                ),
            ))));
        };

        let token = token.trim();
        if token.is_empty() {
            warn!("Empty Bearer token for path: {}", path);
            return Box::pin(ready(Err(Error::from(
                actix_web::error::ErrorUnauthorized("Empty Bearer token"),
            ))));
        }

        match jwt::verify_token(token) {
            Ok(claims) => {
                let user_id = match Uuid::parse_str(&claims.sub) {
                    Ok(uuid) => uuid,
                    Err(_) => {
                        error!("Invalid user ID format in token: {}", claims.sub);
                        return Box::pin(ready(Err(Error::from(
                            actix_web::error::ErrorUnauthorized("Invalid user ID format in token"),
                        ))));
                    }
                };

                debug!(
                    "JWT valid for user {} (role: {}) for route {}",
                    user_id, claims.role, path
                );

                req.extensions_mut().insert(AuthenticatedUser {
                    user_id,
                    email: claims.email,
                    role: claims.role,
                });

                Box::pin(service.call(req))
            }
            Err(e) => {
                error!("JWT validation failed for route {}: {}", path, e);
                match e {
                    AppError::Auth(msg) => Box::pin(ready(Err(Error::from(
                        actix_web::error::ErrorUnauthorized(msg),
                    )))),
                    _ => Box::pin(ready(Err(Error::from(
                        actix_web::error::ErrorInternalServerError(
                            "Internal authentication error",
                        ),
                    )))),
                }
            }
        }
    }
}
