use axum::{
    Form,
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::{Html, IntoResponse, Redirect, Response},
};
use axum_extra::extract::CookieJar;
use tracing::{error, info, warn};

use crate::{
    app_state::AppState,
    auth::{
        dtos::{AuthForm, AuthMode},
        middleware::{current_user, expired_session_cookie, session_cookie},
    },
    entities::User,
    web::{notice::NoticeQuery, views},
};

const HOME_PATH: &str = "/sources";

fn login_error(status: StatusCode, message: &str) -> Response {
    (status, Html(views::login_page(Some(message), None))).into_response()
}

/// `GET /`: the app for signed-in users, the login page for everyone else.
pub async fn index(State(state): State<AppState>, headers: HeaderMap) -> Redirect {
    match current_user(&headers, &state.jwt) {
        Some(_) => Redirect::to(HOME_PATH),
        None => Redirect::to("/login"),
    }
}

pub async fn login_page(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<NoticeQuery>,
) -> Response {
    if current_user(&headers, &state.jwt).is_some() {
        return Redirect::to(HOME_PATH).into_response();
    }
    Html(views::login_page(None, query.as_deref())).into_response()
}

/// Sign in, or create the account first when the form asks for it.
pub async fn login_submit(
    State(state): State<AppState>,
    jar: CookieJar,
    Form(form): Form<AuthForm>,
) -> Response {
    if let Err(message) = form.validate() {
        return login_error(StatusCode::BAD_REQUEST, &message);
    }
    let email = form.normalized_email();

    let user = match form.mode {
        AuthMode::Signup => match signup(&state, &email, &form.password).await {
            Ok(user) => user,
            Err(response) => return response,
        },
        AuthMode::Login => match authenticate(&state, &email, &form.password).await {
            Ok(user) => user,
            Err(response) => return response,
        },
    };

    let token = match state.jwt.generate_token(user.id) {
        Ok(token) => token,
        Err(e) => {
            error!(error = %e, "failed to issue session token");
            return login_error(StatusCode::INTERNAL_SERVER_ERROR, "Failed to sign in");
        }
    };

    info!(user_id = %user.id, "user signed in");
    (jar.add(session_cookie(token)), Redirect::to(HOME_PATH)).into_response()
}

async fn signup(state: &AppState, email: &str, password: &str) -> Result<User, Response> {
    match state.users.find_by_email(email).await {
        Ok(Some(_)) => return Err(login_error(StatusCode::CONFLICT, "User already exists")),
        Ok(None) => {}
        Err(e) => {
            error!(error = %e, "user lookup failed");
            return Err(login_error(StatusCode::INTERNAL_SERVER_ERROR, "Database error"));
        }
    }

    let pw_hash = state.passwords.hash(password).map_err(|e| {
        warn!(error = %e, "password rejected");
        login_error(StatusCode::BAD_REQUEST, &e.to_string())
    })?;

    state.users.create(email, &pw_hash).await.map_err(|e| {
        error!(error = %e, "failed to create user");
        login_error(StatusCode::INTERNAL_SERVER_ERROR, "Failed to create user")
    })
}

async fn authenticate(state: &AppState, email: &str, password: &str) -> Result<User, Response> {
    let user = match state.users.find_by_email(email).await {
        Ok(Some(user)) => user,
        Ok(None) => return Err(login_error(StatusCode::UNAUTHORIZED, "Invalid credentials")),
        Err(e) => {
            error!(error = %e, "user lookup failed");
            return Err(login_error(StatusCode::INTERNAL_SERVER_ERROR, "Database error"));
        }
    };

    match state.passwords.verify(password, &user.pw_hash) {
        Ok(verification) if verification.ok => {
            if verification.needs_rehash {
                rehash(state, &user, password).await;
            }
            Ok(user)
        }
        Ok(_) => Err(login_error(StatusCode::UNAUTHORIZED, "Invalid credentials")),
        Err(e) => {
            error!(error = %e, "stored password hash is unreadable");
            Err(login_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Password verification failed",
            ))
        }
    }
}

/// Upgrade a hash made with older parameters. Failure only costs a log line.
async fn rehash(state: &AppState, user: &User, password: &str) {
    let result = match state.passwords.hash(password) {
        Ok(pw_hash) => state.users.update_password(user.id, &pw_hash).await,
        Err(e) => Err(e.into()),
    };
    match result {
        Ok(_) => info!(user_id = %user.id, "password hash upgraded"),
        Err(e) => warn!(user_id = %user.id, error = %e, "password rehash failed"),
    }
}

pub async fn logout(jar: CookieJar) -> (CookieJar, Redirect) {
    (jar.add(expired_session_cookie()), Redirect::to("/login"))
}
