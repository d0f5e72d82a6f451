/// Request identity extractors
///
/// Authentication happens at the gateway, which forwards the caller as `X-User-Id` and
/// `X-User-Role`. These extractors only parse what the gateway set.
use crate::error::ServiceError;
use actix_web::{dev::Payload, FromRequest, HttpRequest};
use std::future::{ready, Ready};
use uuid::Uuid;

pub const USER_ID_HEADER: &str = "X-User-Id";
pub const USER_ROLE_HEADER: &str = "X-User-Role";
const ADMIN_ROLE: &str = "admin";

fn header_user_id(req: &HttpRequest) -> Result<Option<Uuid>, ServiceError> {
    match req.headers().get(USER_ID_HEADER) {
        None => Ok(None),
        Some(value) => value
            .to_str()
            .ok()
            .and_then(|raw| Uuid::parse_str(raw.trim()).ok())
            .map(Some)
            .ok_or_else(|| ServiceError::Unauthorized("invalid X-User-Id header".to_string())),
    }
}

fn is_admin(req: &HttpRequest) -> bool {
    req.headers()
        .get(USER_ROLE_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(|role| role.trim().eq_ignore_ascii_case(ADMIN_ROLE))
        .unwrap_or(false)
}

/// Authenticated caller
#[derive(Debug, Clone, Copy)]
pub struct UserId(pub Uuid);

impl FromRequest for UserId {
    type Error = ServiceError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        ready(header_user_id(req).and_then(|id| {
            id.map(UserId)
                .ok_or_else(|| ServiceError::Unauthorized("X-User-Id header missing".to_string()))
        }))
    }
}

/// Caller that may be anonymous
#[derive(Debug, Clone, Copy)]
pub struct Requester(pub Option<Uuid>);

impl FromRequest for Requester {
    type Error = ServiceError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        ready(header_user_id(req).map(Requester))
    }
}

/// Authenticated caller with the admin role
#[derive(Debug, Clone, Copy)]
pub struct AdminId(pub Uuid);

impl FromRequest for AdminId {
    type Error = ServiceError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        let result = match header_user_id(req) {
            Err(e) => Err(e),
            Ok(None) => Err(ServiceError::Unauthorized(
                "X-User-Id header missing".to_string(),
            )),
            Ok(Some(_)) if !is_admin(req) => {
                Err(ServiceError::Forbidden("admin role required".to_string()))
            }
            Ok(Some(id)) => Ok(AdminId(id)),
        };
        ready(result)
    }
}
