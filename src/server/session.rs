//! Extraction of the account provider credential from a request.
//!
//! The credential is opaque here: it is validated by the provider on first use,
//! and a rejection surfaces as `LibraryError::AuthRequired`.

use std::convert::Infallible;

use axum::{
    extract::{FromRequestParts, OptionalFromRequestParts},
    http::{header, request::Parts, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use axum_extra::extract::cookie::CookieJar;
use serde::Serialize;
use tracing::debug;

pub const COOKIE_ACCESS_TOKEN_KEY: &str = "spotify_access_token";
pub const COOKIE_REFRESH_TOKEN_KEY: &str = "spotify_refresh_token";
pub const COOKIE_EXPIRES_IN_KEY: &str = "spotify_expires_in";

pub const LOGIN_PATH: &str = "/v1/auth/login";
pub const NOT_AUTHENTICATED_MESSAGE: &str = "Not authenticated";

#[derive(Debug, Clone)]
pub struct SpotifySession {
    pub access_token: String,
}

#[derive(Serialize)]
struct AuthRequiredBody {
    error: &'static str,
    login_url: &'static str,
}

/// 401 telling the client where to log in again.
pub fn auth_required_response() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(AuthRequiredBody {
            error: NOT_AUTHENTICATED_MESSAGE,
            login_url: LOGIN_PATH,
        }),
    )
        .into_response()
}

pub struct SessionExtractionError;

impl IntoResponse for SessionExtractionError {
    fn into_response(self) -> Response {
        auth_required_response()
    }
}

fn extract_token_from_cookies(parts: &Parts) -> Option<String> {
    CookieJar::from_headers(&parts.headers)
        .get(COOKIE_ACCESS_TOKEN_KEY)
        .map(|cookie| cookie.value().to_string())
        .filter(|value| !value.is_empty())
}

fn extract_token_from_headers(parts: &Parts) -> Option<String> {
    parts
        .headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(|token| token.trim().to_string())
        .filter(|token| !token.is_empty())
}

fn extract_session(parts: &Parts) -> Option<SpotifySession> {
    let access_token = extract_token_from_cookies(parts).or_else(|| extract_token_from_headers(parts));
    if access_token.is_none() {
        debug!("No access token in cookies nor headers.");
    }
    access_token.map(|access_token| SpotifySession { access_token })
}

impl<S> FromRequestParts<S> for SpotifySession
where
    S: Send + Sync,
{
    type Rejection = SessionExtractionError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        extract_session(parts).ok_or(SessionExtractionError)
    }
}

impl<S> OptionalFromRequestParts<S> for SpotifySession
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> Result<Option<Self>, Self::Rejection> {
        Ok(extract_session(parts))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn parts_with(headers: &[(&str, &str)]) -> Parts {
        let mut builder = Request::builder().uri("/");
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[test]
    fn reads_token_from_cookie() {
        let parts = parts_with(&[("cookie", "other=1; spotify_access_token=abc")]);
        assert_eq!(extract_session(&parts).unwrap().access_token, "abc");
    }

    #[test]
    fn falls_back_to_bearer_header() {
        let parts = parts_with(&[("authorization", "Bearer xyz")]);
        assert_eq!(extract_session(&parts).unwrap().access_token, "xyz");
    }

    #[test]
    fn cookie_wins_over_header() {
        let parts = parts_with(&[
            ("cookie", "spotify_access_token=from-cookie"),
            ("authorization", "Bearer from-header"),
        ]);
        assert_eq!(extract_session(&parts).unwrap().access_token, "from-cookie");
    }

    #[test]
    fn ignores_empty_and_non_bearer_credentials() {
        assert!(extract_session(&parts_with(&[])).is_none());
        assert!(extract_session(&parts_with(&[("cookie", "spotify_access_token=")])).is_none());
        assert!(extract_session(&parts_with(&[("authorization", "Basic Zm9vOmJhcg==")])).is_none());
        assert!(extract_session(&parts_with(&[("authorization", "Bearer ")])).is_none());
    }

    #[tokio::test]
    async fn rejection_is_unauthorized_with_login_url() {
        let response = auth_required_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"], "Not authenticated");
        assert_eq!(json["login_url"], "/v1/auth/login");
    }
}
