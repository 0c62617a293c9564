use axum::{
    Form,
    extract::{Path, Query, State},
    response::{Html, Redirect},
};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use crate::app_state::AppState;
use crate::auth::AuthenticatedUser;
use crate::sources::{RunSourceOutcome, new_source};
use crate::web::errors::{WebError, WebResult};
use crate::web::notice::{NoticeQuery, redirect_with_notice};
use crate::web::views;

const SOURCES_PATH: &str = "/sources";

#[derive(Debug, Deserialize)]
pub struct SourceForm {
    pub url: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub kind: String,
}

fn run_notice(outcome: &RunSourceOutcome) -> String {
    match &outcome.error {
        Some(error) => format!("Run failed: {error}"),
        None => format!("Queued {}, skipped {}", outcome.queued, outcome.skipped),
    }
}

pub async fn list(
    user: AuthenticatedUser,
    State(state): State<AppState>,
    Query(query): Query<NoticeQuery>,
) -> WebResult<Html<String>> {
    let sources = state.sources.list_for_user(user.user_id).await?;
    Ok(Html(views::sources_page(&sources, query.as_deref())))
}

pub async fn create(
    user: AuthenticatedUser,
    State(state): State<AppState>,
    Form(form): Form<SourceForm>,
) -> WebResult<Redirect> {
    let source = match new_source(&form.url, &form.label, &form.kind) {
        Ok(source) => source,
        Err(e) => return Ok(redirect_with_notice(SOURCES_PATH, &e.to_string())),
    };
    let created = state.sources.create(user.user_id, source).await?;
    info!(source_id = %created.id, kind = created.kind.as_str(), "source added");
    Ok(redirect_with_notice(SOURCES_PATH, "Source added"))
}

pub async fn run(
    user: AuthenticatedUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> WebResult<Redirect> {
    let outcome = state.source_runner.run(user.user_id, id).await?;
    Ok(redirect_with_notice(SOURCES_PATH, &run_notice(&outcome)))
}

pub async fn run_all(user: AuthenticatedUser, State(state): State<AppState>) -> WebResult<Redirect> {
    let total = state.source_runner.run_all(user.user_id).await?;
    let mut notice = format!(
        "Ran {} sources: queued {}, skipped {}",
        total.sources, total.queued, total.skipped
    );
    if !total.errors.is_empty() {
        notice.push_str(&format!(". Errors: {}", total.errors.join("; ")));
    }
    Ok(redirect_with_notice(SOURCES_PATH, &notice))
}

pub async fn toggle(
    user: AuthenticatedUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> WebResult<Redirect> {
    let source = state
        .sources
        .toggle_active(user.user_id, id)
        .await?
        .ok_or(WebError::NotFound("Source not found."))?;
    let state_label = if source.is_active { "activated" } else { "paused" };
    Ok(redirect_with_notice(
        SOURCES_PATH,
        &format!("{} {state_label}", source.display_name()),
    ))
}
