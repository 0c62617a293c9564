use axum::{
    Form,
    extract::{Path, Query, State},
    http::header::{CONTENT_DISPOSITION, CONTENT_TYPE},
    response::{Html, IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use uuid::Uuid;

use crate::app_state::AppState;
use crate::articles::ExportFormat;
use crate::articles::export::{docx, markdown};
use crate::auth::AuthenticatedUser;
use crate::web::errors::{WebError, WebResult};
use crate::web::notice::{NoticeQuery, redirect_with_notice};
use crate::web::views;

const ARTICLE_NOT_FOUND: &str = "Article not found.";

#[derive(Debug, Deserialize)]
pub struct UsedForm {
    pub used: bool,
}

fn article_path(id: Uuid) -> String {
    format!("/articles/{id}")
}

pub async fn list(
    user: AuthenticatedUser,
    State(state): State<AppState>,
    Query(query): Query<NoticeQuery>,
) -> WebResult<Html<String>> {
    let articles = state.articles.list(user.user_id).await?;
    Ok(Html(views::articles_page(&articles, query.as_deref())))
}

pub async fn detail(
    user: AuthenticatedUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<NoticeQuery>,
) -> WebResult<Html<String>> {
    let article = state
        .articles
        .get(user.user_id, id)
        .await?
        .ok_or(WebError::NotFound(ARTICLE_NOT_FOUND))?;

    let source_label = match article.source_id {
        Some(source_id) => state
            .sources
            .find_for_user(user.user_id, source_id)
            .await?
            .map(|s| s.display_name().to_string()),
        None => None,
    };

    Ok(Html(views::article_page(
        &article,
        source_label.as_deref(),
        query.as_deref(),
    )))
}

pub async fn rerun(
    user: AuthenticatedUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> WebResult<Redirect> {
    if !state.articles.rerun(user.user_id, id).await? {
        return Err(WebError::NotFound(ARTICLE_NOT_FOUND));
    }
    Ok(redirect_with_notice(&article_path(id), "Re-run queued"))
}

pub async fn delete(
    user: AuthenticatedUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> WebResult<Redirect> {
    if !state.articles.delete(user.user_id, id).await? {
        return Err(WebError::NotFound(ARTICLE_NOT_FOUND));
    }
    Ok(redirect_with_notice("/articles", "Article deleted"))
}

pub async fn set_used(
    user: AuthenticatedUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Form(form): Form<UsedForm>,
) -> WebResult<Redirect> {
    if !state.articles.set_used(user.user_id, id, form.used).await? {
        return Err(WebError::NotFound(ARTICLE_NOT_FOUND));
    }
    Ok(Redirect::to(&article_path(id)))
}

/// `md` or `docx` attachment.
pub async fn download(
    user: AuthenticatedUser,
    State(state): State<AppState>,
    Path((id, format)): Path<(Uuid, String)>,
) -> WebResult<Response> {
    let format = ExportFormat::from_extension(&format).ok_or(WebError::NotFound("Unknown format."))?;
    let article = state
        .articles
        .get(user.user_id, id)
        .await?
        .ok_or(WebError::NotFound(ARTICLE_NOT_FOUND))?;

    let body = match format {
        ExportFormat::Markdown => markdown::render(&article).into_bytes(),
        ExportFormat::Docx => docx::render(&article)?,
    };

    Ok((
        [
            (CONTENT_TYPE, format.content_type().to_string()),
            (CONTENT_DISPOSITION, format.content_disposition(article.id)),
        ],
        body,
    )
        .into_response())
}
