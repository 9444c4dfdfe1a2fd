// SPDX-FileCopyrightText: 2026 Kestrel Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bearer-token authentication for the gateway API routes.
//!
//! With no token configured the API is open; `/health` is always public.

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
};

#[derive(Clone, Default)]
pub struct AuthConfig {
    /// Expected bearer token. If `Some`, bearer auth is enforced.
    pub bearer_token: Option<String>,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field(
                "bearer_token",
                &self.bearer_token.as_ref().map(|_| "[redacted]"),
            )
            .finish()
    }
}

impl AuthConfig {
    /// Checks an `Authorization` header value against the configured token.
    pub fn accepts(&self, authorization: Option<&str>) -> bool {
        match &self.bearer_token {
            None => true,
            Some(expected) => authorization
                .and_then(|v| v.strip_prefix("Bearer "))
                .is_some_and(|token| token == expected),
        }
    }
}

pub async fn auth_middleware(
    State(auth): State<AuthConfig>,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let header = request
        .headers()
        .get("authorization")
        .and_then(|v| v.to_str().ok());
    if auth.accepts(header) {
        Ok(next.run(request).await)
    } else {
        tracing::debug!(path = %request.uri().path(), "rejected request with bad bearer token");
        Err(StatusCode::UNAUTHORIZED)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_without_token() {
        let auth = AuthConfig::default();
        assert!(auth.accepts(None));
        assert!(auth.accepts(Some("Bearer anything")));
    }

    #[test]
    fn token_must_match_exactly() {
        let auth = AuthConfig {
            bearer_token: Some("secret-token".to_string()),
        };
        assert!(auth.accepts(Some("Bearer secret-token")));
        assert!(!auth.accepts(Some("Bearer secret")));
        assert!(!auth.accepts(Some("secret-token")));
        assert!(!auth.accepts(None));
    }

    #[test]
    fn debug_redacts_token() {
        let auth = AuthConfig {
            bearer_token: Some("secret-token".to_string()),
        };
        let debug_output = format!("{auth:?}");
        assert!(!debug_output.contains("secret-token"));
        assert!(debug_output.contains("[redacted]"));
    }
}
