use axum::response::Redirect;
use percent_encoding::{NON_ALPHANUMERIC, utf8_percent_encode};
use serde::Deserialize;

/// `?notice=` carried over a post/redirect/get round trip.
#[derive(Debug, Default, Deserialize)]
pub struct NoticeQuery {
    pub notice: Option<String>,
}

impl NoticeQuery {
    pub fn as_deref(&self) -> Option<&str> {
        self.notice.as_deref()
    }
}

/// 303 to `path` with a message for the next page.
pub fn redirect_with_notice(path: &str, notice: &str) -> Redirect {
    Redirect::to(&format!(
        "{path}?notice={}",
        utf8_percent_encode(notice, NON_ALPHANUMERIC)
    ))
}
