//! HTTP basic authentication for the ingestion routes.

use actix_web::{
    Error, HttpResponse,
    body::EitherBody,
    dev::{Service, ServiceRequest, ServiceResponse, Transform, forward_ready},
    http::header::{AUTHORIZATION, WWW_AUTHENTICATE},
};
use base64::{Engine, engine::general_purpose::STANDARD};
use std::{
    future::{Ready, ready},
    pin::Pin,
    sync::Arc,
};

/// Paths under this prefix (health, version, metrics, spec) stay public
const PUBLIC_PREFIX: &str = "/api/";

/// Basic auth middleware factory
///
/// With no credentials configured every request passes through.
#[derive(Clone)]
pub struct BasicAuth {
    credentials: Option<Arc<(String, String)>>,
}

impl BasicAuth {
    pub fn new(credentials: Option<(String, String)>) -> Self {
        Self {
            credentials: credentials.map(Arc::new),
        }
    }
}

/// Decode an `Authorization: Basic ...` value into user and password
pub fn parse_basic_credentials(header: &str) -> Option<(String, String)> {
    let encoded = header.strip_prefix("Basic ")?;
    let decoded = STANDARD.decode(encoded.trim()).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (user, password) = decoded.split_once(':')?;
    Some((user.to_string(), password.to_string()))
}

impl<S, B> Transform<S, ServiceRequest> for BasicAuth
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type InitError = ();
    type Transform = BasicAuthService<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(BasicAuthService {
            service,
            credentials: self.credentials.clone(),
        }))
    }
}

pub struct BasicAuthService<S> {
    service: S,
    credentials: Option<Arc<(String, String)>>,
}

impl<S> BasicAuthService<S> {
    fn is_authorized(&self, req: &ServiceRequest) -> bool {
        let Some(expected) = &self.credentials else {
            return true;
        };
        if req.path().starts_with(PUBLIC_PREFIX) {
            return true;
        }

        req.headers()
            .get(AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .and_then(parse_basic_credentials)
            .is_some_and(|(user, password)| user == expected.0 && password == expected.1)
    }
}

impl<S, B> Service<ServiceRequest> for BasicAuthService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = Pin<Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>>>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        if !self.is_authorized(&req) {
            tracing::warn!(
                target: "request",
                path = %req.path(),
                ip_address = %crate::utils::extract_client_ip(req.request()),
                "Rejected unauthenticated request"
            );
            let response = HttpResponse::Unauthorized()
                .insert_header((WWW_AUTHENTICATE, "Basic realm=\"cerberus\""))
                .finish()
                .map_into_right_body();
            let (request, _) = req.into_parts();
            return Box::pin(async move { Ok(ServiceResponse::new(request, response)) });
        }

        let fut = self.service.call(req);
        Box::pin(async move { Ok(fut.await?.map_into_left_body()) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_basic_credentials() {
        // base64("relay:s3cret")
        assert_eq!(
            parse_basic_credentials("Basic cmVsYXk6czNjcmV0"),
            Some(("relay".to_string(), "s3cret".to_string()))
        );
        assert_eq!(parse_basic_credentials("Bearer abc"), None);
        assert_eq!(parse_basic_credentials("Basic !!!"), None);
    }

    #[test]
    fn test_password_may_contain_colon() {
        // base64("relay:a:b")
        assert_eq!(
            parse_basic_credentials("Basic cmVsYXk6YTpi"),
            Some(("relay".to_string(), "a:b".to_string()))
        );
    }
}
