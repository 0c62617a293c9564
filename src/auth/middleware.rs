use axum::{
    extract::{FromRef, FromRequestParts},
    http::{HeaderMap, header::AUTHORIZATION, request::Parts},
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::{
    CookieJar,
    cookie::{Cookie, SameSite},
};
use uuid::Uuid;

use crate::auth::jwt::JwtService;

pub const SESSION_COOKIE: &str = "newsdesk_session";
pub const LOGIN_PATH: &str = "/login";

#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user_id: Uuid,
}

impl AuthenticatedUser {
    pub fn new(user_id: Uuid) -> Self {
        Self { user_id }
    }
}

/// Session token from the cookie, or from an `Authorization: Bearer` header.
pub fn session_token(headers: &HeaderMap) -> Option<String> {
    let jar = CookieJar::from_headers(headers);
    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        return Some(cookie.value().to_string());
    }
    headers
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// The signed-in user, if the request carries a valid session.
pub fn current_user(headers: &HeaderMap, jwt: &JwtService) -> Option<Uuid> {
    session_token(headers).and_then(|token| jwt.user_id(&token))
}

pub fn session_cookie(token: String) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .build()
}

/// A cookie that makes the browser drop the session.
pub fn expired_session_cookie() -> Cookie<'static> {
    let mut cookie = Cookie::build((SESSION_COOKIE, "")).path("/").build();
    cookie.make_removal();
    cookie
}

impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
    JwtService: FromRef<S>,
{
    type Rejection = AuthError;

    fn from_request_parts(
        parts: &mut Parts,
        state: &S,
    ) -> impl std::future::Future<Output = Result<Self, Self::Rejection>> + Send {
        let jwt = JwtService::from_ref(state);
        let token = session_token(&parts.headers);

        async move {
            let token = token.ok_or(AuthError::MissingToken)?;
            let user_id = jwt.user_id(&token).ok_or(AuthError::InvalidToken)?;
            Ok(AuthenticatedUser::new(user_id))
        }
    }
}

/// Anonymous visitors are sent to the login page; a stale cookie is dropped
/// on the way.
#[derive(Debug)]
pub enum AuthError {
    MissingToken,
    InvalidToken,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        match self {
            AuthError::MissingToken => Redirect::to(LOGIN_PATH).into_response(),
            AuthError::InvalidToken => (
                CookieJar::new().add(expired_session_cookie()),
                Redirect::to(LOGIN_PATH),
            )
                .into_response(),
        }
    }
}
