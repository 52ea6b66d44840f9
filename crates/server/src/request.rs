//! Per-request context: correlation ids and viewer identity.
//!
//! Authentication happens upstream; by the time a request reaches this service
//! the viewer's id, if any, travels in the `x-user-id` header.

use std::convert::Infallible;

use axum::{
    extract::{FromRequestParts, Request},
    http::{request::Parts, HeaderValue},
    middleware::Next,
    response::Response,
};
use storefront_core::domain::interaction::UserId;
use uuid::Uuid;

use crate::error::ApiError;

pub const CORRELATION_ID_HEADER: &str = "x-correlation-id";
pub const USER_ID_HEADER: &str = "x-user-id";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CorrelationId(pub String);

impl CorrelationId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Attach a correlation id to the request and echo it on the response.
///
/// An upstream `x-correlation-id` is kept; otherwise a UUID v4 is generated.
pub async fn correlation_middleware(mut request: Request, next: Next) -> Response {
    let correlation_id = request
        .headers()
        .get(CORRELATION_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map_or_else(|| Uuid::new_v4().to_string(), String::from);

    request.extensions_mut().insert(CorrelationId(correlation_id.clone()));
    let mut response = next.run(request).await;

    if let Ok(value) = HeaderValue::from_str(&correlation_id) {
        response.headers_mut().insert(CORRELATION_ID_HEADER, value);
    }

    response
}

fn correlation_of(parts: &Parts) -> CorrelationId {
    parts
        .extensions
        .get::<CorrelationId>()
        .cloned()
        .unwrap_or_else(|| CorrelationId(Uuid::new_v4().to_string()))
}

impl<S> FromRequestParts<S> for CorrelationId
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(correlation_of(parts))
    }
}

/// The viewer behind a request. `None` is an anonymous visitor.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Viewer(pub Option<UserId>);

impl Viewer {
    pub fn require(self, correlation_id: &CorrelationId) -> Result<UserId, ApiError> {
        self.0.ok_or_else(|| ApiError::unauthorized(correlation_id.as_str()))
    }
}

impl<S> FromRequestParts<S> for Viewer
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let Some(raw) = parts.headers.get(USER_ID_HEADER) else {
            return Ok(Self(None));
        };

        let invalid = || {
            ApiError::bad_request(
                format!("{USER_ID_HEADER} must be a numeric user id"),
                correlation_of(parts).as_str(),
            )
        };
        let raw = raw.to_str().map_err(|_| invalid())?.trim();
        if raw.is_empty() {
            return Ok(Self(None));
        }

        raw.parse::<i64>().map(|id| Self(Some(UserId(id)))).map_err(|_| invalid())
    }
}
