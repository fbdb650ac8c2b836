//! OAuth login, callback, refresh and logout routes.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
    Json, Router,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use super::metrics::record_login_attempt;
use super::session::{
    auth_required_response, COOKIE_ACCESS_TOKEN_KEY, COOKIE_EXPIRES_IN_KEY,
    COOKIE_REFRESH_TOKEN_KEY,
};
use super::state::{GuardedAuthClient, GuardedAuthStateStore, ServerState};
use crate::oauth::{OAuthError, UserCredentials};

/// Lifetime of the refresh token cookie.
const REFRESH_COOKIE_MAX_AGE_DAYS: i64 = 30;

#[derive(Deserialize, Debug)]
struct CallbackParams {
    code: Option<String>,
    state: Option<String>,
    /// Set by the provider when the user denies access.
    error: Option<String>,
}

#[derive(Serialize)]
struct RefreshResponse {
    expires_in: u64,
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

fn credential_cookie(
    name: &'static str,
    value: String,
    max_age: time::Duration,
    secure: bool,
) -> Cookie<'static> {
    Cookie::build((name, value))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(secure)
        .max_age(max_age)
        .build()
}

fn set_credential_cookies(jar: CookieJar, credentials: &UserCredentials, secure: bool) -> CookieJar {
    let expires_in = time::Duration::seconds(i64::try_from(credentials.expires_in).unwrap_or(i64::MAX));
    let mut jar = jar
        .add(credential_cookie(
            COOKIE_ACCESS_TOKEN_KEY,
            credentials.access_token.clone(),
            expires_in,
            secure,
        ))
        .add(credential_cookie(
            COOKIE_EXPIRES_IN_KEY,
            credentials.expires_in.to_string(),
            expires_in,
            secure,
        ));
    if let Some(refresh_token) = &credentials.refresh_token {
        jar = jar.add(credential_cookie(
            COOKIE_REFRESH_TOKEN_KEY,
            refresh_token.clone(),
            time::Duration::days(REFRESH_COOKIE_MAX_AGE_DAYS),
            secure,
        ));
    }
    jar
}

fn oauth_error_response(err: OAuthError) -> Response {
    let status = match &err {
        OAuthError::Provider { status, .. } => StatusCode::from_u16(*status)
            .ok()
            .filter(|s| s.is_client_error() || s.is_server_error())
            .unwrap_or(StatusCode::BAD_GATEWAY),
        OAuthError::Network(_) | OAuthError::Decode(_) => StatusCode::BAD_GATEWAY,
    };
    let error = match err {
        OAuthError::Provider { message, .. } => message,
        other => other.to_string(),
    };
    (status, Json(ErrorBody { error })).into_response()
}

async fn login(
    State(auth_client): State<GuardedAuthClient>,
    State(auth_state_store): State<GuardedAuthStateStore>,
) -> Response {
    let (url, auth_state) = auth_client.authorize_url();
    auth_state_store.store(auth_state).await;
    record_login_attempt("redirected");
    Redirect::to(&url).into_response()
}

async fn callback(
    State(state): State<ServerState>,
    jar: CookieJar,
    Query(params): Query<CallbackParams>,
) -> Response {
    let known_state = match params.state.as_deref() {
        Some(value) => state.auth_state_store.take(value).await.is_some(),
        None => false,
    };
    if !known_state {
        warn!("OAuth callback with unknown or expired state");
        record_login_attempt("state_mismatch");
        return (StatusCode::FORBIDDEN, "State Mismatch").into_response();
    }

    if let Some(reason) = params.error {
        info!("User declined authorization: {}", reason);
        record_login_attempt("denied");
        return (StatusCode::FORBIDDEN, Json(ErrorBody { error: reason })).into_response();
    }

    let Some(code) = params.code else {
        record_login_attempt("failure");
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorBody {
                error: "Missing authorization code".to_string(),
            }),
        )
            .into_response();
    };

    match state.auth_client.exchange_code(&code).await {
        Ok(credentials) => {
            debug!("Authorization code exchanged");
            record_login_attempt("success");
            let jar = set_credential_cookies(jar, &credentials, state.config.secure_cookies);
            (jar, Redirect::to("/")).into_response()
        }
        Err(err) => {
            error!("Code exchange failed: {}", err);
            record_login_attempt("failure");
            oauth_error_response(err)
        }
    }
}

async fn refresh(State(state): State<ServerState>, jar: CookieJar) -> Response {
    let Some(refresh_token) = jar
        .get(COOKIE_REFRESH_TOKEN_KEY)
        .map(|c| c.value().to_string())
        .filter(|v| !v.is_empty())
    else {
        return auth_required_response();
    };

    match state.auth_client.refresh(&refresh_token).await {
        Ok(credentials) => {
            let expires_in = credentials.expires_in;
            let jar = set_credential_cookies(jar, &credentials, state.config.secure_cookies);
            (jar, Json(RefreshResponse { expires_in })).into_response()
        }
        // A revoked or expired refresh token means logging in again.
        Err(OAuthError::Provider { status: 400 | 401, message }) => {
            info!("Refresh token rejected: {}", message);
            auth_required_response()
        }
        Err(err) => {
            error!("Token refresh failed: {}", err);
            oauth_error_response(err)
        }
    }
}

async fn logout(jar: CookieJar) -> Response {
    let jar = [
        COOKIE_ACCESS_TOKEN_KEY,
        COOKIE_REFRESH_TOKEN_KEY,
        COOKIE_EXPIRES_IN_KEY,
    ]
    .into_iter()
    .fold(jar, |jar, name| jar.remove(Cookie::build(name).path("/")));
    (jar, Redirect::to("/")).into_response()
}

pub fn make_auth_routes(state: ServerState) -> Router {
    Router::new()
        .route("/login", get(login))
        .route("/callback", get(callback))
        .route("/refresh", post(refresh))
        .route("/logout", get(logout))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credential_cookies_carry_expiry_and_flags() {
        let credentials = UserCredentials {
            access_token: "access".to_string(),
            refresh_token: Some("refresh".to_string()),
            expires_in: 3600,
            scope: None,
        };
        let jar = set_credential_cookies(CookieJar::new(), &credentials, true);

        let access = jar.get(COOKIE_ACCESS_TOKEN_KEY).unwrap();
        assert_eq!(access.value(), "access");
        assert_eq!(access.max_age(), Some(time::Duration::seconds(3600)));
        assert_eq!(access.http_only(), Some(true));
        assert_eq!(access.secure(), Some(true));
        assert_eq!(access.same_site(), Some(SameSite::Lax));

        let refresh = jar.get(COOKIE_REFRESH_TOKEN_KEY).unwrap();
        assert_eq!(refresh.max_age(), Some(time::Duration::days(30)));
        assert_eq!(jar.get(COOKIE_EXPIRES_IN_KEY).unwrap().value(), "3600");
    }

    #[test]
    fn refresh_without_new_refresh_token_keeps_old_cookie_untouched() {
        let credentials = UserCredentials {
            access_token: "new".to_string(),
            refresh_token: None,
            expires_in: 60,
            scope: None,
        };
        let jar = set_credential_cookies(CookieJar::new(), &credentials, false);
        assert!(jar.get(COOKIE_REFRESH_TOKEN_KEY).is_none());
        assert_eq!(jar.get(COOKIE_ACCESS_TOKEN_KEY).unwrap().secure(), Some(false));
    }

    #[test]
    fn oauth_errors_map_to_statuses() {
        let provider = oauth_error_response(OAuthError::Provider {
            status: 400,
            message: "invalid_grant".to_string(),
        });
        assert_eq!(provider.status(), StatusCode::BAD_REQUEST);

        let unavailable = oauth_error_response(OAuthError::Network("refused".to_string()));
        assert_eq!(unavailable.status(), StatusCode::BAD_GATEWAY);

        let bogus = oauth_error_response(OAuthError::Provider {
            status: 200,
            message: "weird".to_string(),
        });
        assert_eq!(bogus.status(), StatusCode::BAD_GATEWAY);
    }
}
