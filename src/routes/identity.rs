//! Caller identity forwarded by the authenticating gateway.

use axum::{
    body::Body,
    extract::FromRequestParts,
    http::{HeaderMap, Request, request::Parts},
    middleware::Next,
    response::Response,
};

use crate::error::AppError;

/// Header carrying the authenticated user id.
pub const USER_ID_HEADER: &str = "x-user-id";
/// Header set to `true` or `1` for administrators.
pub const USER_ADMIN_HEADER: &str = "x-user-admin";

/// Authenticated caller of a player or admin route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    /// Value of the `x-user-id` header.
    pub user_id: String,
    /// Whether `x-user-admin` was set.
    pub is_admin: bool,
}

impl Identity {
    /// Read the identity headers, failing when no user id is present.
    pub fn from_headers(headers: &HeaderMap) -> Result<Self, AppError> {
        let user_id = headers
            .get(USER_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .ok_or_else(|| AppError::Unauthorized(format!("missing `{USER_ID_HEADER}` header")))?;
        let is_admin = headers
            .get(USER_ADMIN_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(|value| matches!(value.trim().to_ascii_lowercase().as_str(), "true" | "1"))
            .unwrap_or(false);

        Ok(Self {
            user_id: user_id.to_owned(),
            is_admin,
        })
    }
}

impl<S> FromRequestParts<S> for Identity
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Identity::from_headers(&parts.headers)
    }
}

/// Middleware rejecting callers that are not administrators.
pub async fn require_admin(req: Request<Body>, next: Next) -> Result<Response, AppError> {
    let identity = Identity::from_headers(req.headers())?;
    if !identity.is_admin {
        return Err(AppError::Forbidden(format!(
            "user `{}` is not an administrator",
            identity.user_id
        )));
    }
    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, HeaderValue::from_static(value));
        }
        map
    }

    #[test]
    fn user_id_is_required() {
        assert!(matches!(
            Identity::from_headers(&headers(&[])),
            Err(AppError::Unauthorized(_))
        ));
        assert!(Identity::from_headers(&headers(&[(USER_ID_HEADER, "  ")])).is_err());
    }

    #[test]
    fn admin_flag_accepts_true_and_one() {
        for (flag, expected) in [("true", true), ("1", true), ("TRUE", true), ("yes", false)] {
            let identity =
                Identity::from_headers(&headers(&[(USER_ID_HEADER, "u1"), (USER_ADMIN_HEADER, flag)]))
                    .unwrap();
            assert_eq!(identity.is_admin, expected, "flag {flag}");
        }
        let plain = Identity::from_headers(&headers(&[(USER_ID_HEADER, "u1")])).unwrap();
        assert!(!plain.is_admin);
    }
}
