//! Password hashing, the session cookie, and the extractors that resolve the
//! logged-in user from it.

use argon2::{
    password_hash::{PasswordHasher, SaltString},
    Argon2, PasswordHash, PasswordVerifier,
};
use axum::async_trait;
use axum::extract::{FromRequestParts, OriginalUri};
use axum::http::request::Parts;
use axum::response::{IntoResponse, Response};
use axum_extra::extract::cookie::{Cookie, Key, PrivateCookieJar, SameSite};
use serde::Serialize;

use crate::config::Settings;
use crate::error::AppError;
use crate::helpers::found;
use crate::models::user::User;
use crate::services::Store;
use crate::state::AppState;

pub const SESSION_COOKIE: &str = "sessionid";
pub const LOGIN_URL: &str = "/auth/login/";

/// Hash a password using Argon2id
pub fn hash_password(password: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(rand::thread_rng());
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("failed to hash password: {e}"))?
        .to_string();
    Ok(hash)
}

pub fn verify_password(password: &str, hash: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(hash) else {
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

// Tail of the stored hash. A new password means a new salt and hash, which
// retires every cookie minted for the old one.
fn fingerprint(password_hash: &str) -> &str {
    let start = password_hash.len().saturating_sub(16);
    password_hash.get(start..).unwrap_or(password_hash)
}

fn session_value(user: &User) -> String {
    format!("{}:{}", user.id, fingerprint(&user.password_hash))
}

pub fn session_cookie(user: &User) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, session_value(user)))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .build()
}

pub fn log_in(jar: PrivateCookieJar, user: &User) -> PrivateCookieJar {
    jar.add(session_cookie(user))
}

pub fn log_out(jar: PrivateCookieJar) -> PrivateCookieJar {
    jar.remove(Cookie::build(SESSION_COOKIE).path("/"))
}

/// Only same-site paths are honoured as a post-login destination.
pub fn safe_next(next: Option<&str>) -> &str {
    match next {
        Some(n) if n.starts_with('/') && !n.starts_with("//") && !n.contains('\\') => n,
        _ => "/",
    }
}

fn login_redirect(parts: &Parts) -> Response {
    let uri = parts
        .extensions
        .get::<OriginalUri>()
        .map(|o| &o.0)
        .unwrap_or(&parts.uri);
    let path = uri.path_and_query().map_or("/", |p| p.as_str());
    found(format!("{LOGIN_URL}?next={}", urlencoding::encode(path)))
}

#[derive(Serialize, Debug, Clone)]
pub struct CurrentUser {
    #[serde(flatten)]
    pub user: User,
    pub is_staff: bool,
}

impl CurrentUser {
    pub fn new(user: User, settings: &Settings) -> Self {
        let is_staff = settings.is_admin(&user.username);
        Self { user, is_staff }
    }

    pub fn id(&self) -> i32 {
        self.user.id
    }
}

/// The visitor, logged in or not.
pub struct MaybeUser(pub Option<CurrentUser>);

/// A logged-in visitor; anonymous requests are sent to the login page.
pub struct RequireUser(pub CurrentUser);

/// A logged-in visitor listed in `admin_users`.
pub struct RequireStaff(pub CurrentUser);

#[async_trait]
impl<S: Store> FromRequestParts<AppState<S>> for MaybeUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState<S>,
    ) -> Result<Self, Self::Rejection> {
        let jar = PrivateCookieJar::<Key>::from_request_parts(parts, state)
            .await
            .unwrap_or_else(|never| match never {});
        let Some(cookie) = jar.get(SESSION_COOKIE) else {
            return Ok(Self(None));
        };
        let Some((id, print)) = cookie.value().split_once(':') else {
            return Ok(Self(None));
        };
        let Ok(id) = id.parse::<i32>() else {
            return Ok(Self(None));
        };

        let user = state
            .store
            .get_user(id)
            .await?
            .filter(|u| fingerprint(&u.password_hash) == print)
            .map(|u| CurrentUser::new(u, &state.settings));
        Ok(Self(user))
    }
}

#[async_trait]
impl<S: Store> FromRequestParts<AppState<S>> for RequireUser {
    type Rejection = Response;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState<S>,
    ) -> Result<Self, Self::Rejection> {
        let MaybeUser(user) = MaybeUser::from_request_parts(parts, state)
            .await
            .map_err(IntoResponse::into_response)?;
        user.map(Self).ok_or_else(|| login_redirect(parts))
    }
}

#[async_trait]
impl<S: Store> FromRequestParts<AppState<S>> for RequireStaff {
    type Rejection = Response;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState<S>,
    ) -> Result<Self, Self::Rejection> {
        let RequireUser(user) = RequireUser::from_request_parts(parts, state).await?;
        if user.is_staff {
            Ok(Self(user))
        } else {
            tracing::warn!(username = %user.user.username, "non-staff user tried the admin");
            Err(login_redirect(parts))
        }
    }
}
