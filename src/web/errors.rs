use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use thiserror::Error;
use tracing::error;

use crate::articles::ExportError;
use crate::web::views;

#[derive(Error, Debug)]
pub enum WebError {
    #[error("{0}")]
    NotFound(&'static str),
    #[error(transparent)]
    Export(#[from] ExportError),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for WebError {
    fn into_response(self) -> Response {
        match self {
            WebError::NotFound(message) => {
                (StatusCode::NOT_FOUND, Html(views::not_found_page(message))).into_response()
            }
            WebError::Export(e) => {
                error!(error = %e, "export failed");
                (StatusCode::INTERNAL_SERVER_ERROR, "Export failed").into_response()
            }
            WebError::Internal(e) => {
                error!(error = ?e, "request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, "Something went wrong").into_response()
            }
        }
    }
}

pub type WebResult<T> = Result<T, WebError>;
