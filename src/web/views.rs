//! Server-rendered pages.
//!
//! Everything that comes from a user, a feed or the model passes through
//! [`text`] before it is written into markup.

use ammonia::clean_text;
use std::fmt::Write;

use crate::entities::{Article, Source};
use crate::repositories::ArticleListing;

const APP_NAME: &str = "Newsdesk";

const STYLE: &str = "body{font-family:system-ui,sans-serif;margin:0;background:#f8fafc;color:#0f172a}\
header{background:#fff;border-bottom:1px solid #e2e8f0;padding:12px 24px;display:flex;gap:16px;align-items:center}\
main{max-width:960px;margin:0 auto;padding:24px}\
.card{background:#fff;border:1px solid #e2e8f0;border-radius:6px;padding:16px;margin-bottom:12px}\
.notice{background:#ecfdf5;border:1px solid #a7f3d0;padding:8px 12px;border-radius:4px}\
.error{background:#fef2f2;border:1px solid #fecaca;color:#b91c1c;padding:8px 12px;border-radius:4px}\
.muted{color:#64748b;font-size:13px}.pre{white-space:pre-wrap}\
form.inline{display:inline}";

/// Escape text for element content or a quoted attribute.
pub fn text(value: &str) -> String {
    clean_text(value)
}

fn notice_banner(out: &mut String, notice: Option<&str>) {
    if let Some(notice) = notice.filter(|n| !n.is_empty()) {
        let _ = write!(out, r#"<div class="notice">{}</div>"#, text(notice));
    }
}

fn page(title: &str, signed_in: bool, body: &str) -> String {
    let nav = if signed_in {
        r#"<a href="/sources">Sources</a><a href="/articles">Articles</a>
<form class="inline" method="post" action="/logout"><button>Sign out</button></form>"#
    } else {
        ""
    };
    format!(
        r#"<!doctype html>
<html lang="en"><head><meta charset="utf-8"><title>{title} · {APP_NAME}</title><style>{STYLE}</style></head>
<body><header><strong>{APP_NAME}</strong>{nav}</header><main>{body}</main></body></html>"#,
        title = text(title),
    )
}

pub fn login_page(error: Option<&str>, notice: Option<&str>) -> String {
    let mut body = String::from("<div class=\"card\"><h1>Sign in</h1>");
    body.push_str("<p class=\"muted\">Sign in to manage sources and process articles.</p>");
    notice_banner(&mut body, notice);
    if let Some(error) = error {
        let _ = write!(body, r#"<div class="error">{}</div>"#, text(error));
    }
    body.push_str(
        r#"<form method="post" action="/login">
<label>Email <input type="email" name="email" required></label>
<label>Password <input type="password" name="password" required></label>
<button name="mode" value="login">Sign in</button>
<button name="mode" value="signup">Create account</button>
</form></div>"#,
    );
    page("Sign in", false, &body)
}

pub fn sources_page(sources: &[Source], notice: Option<&str>) -> String {
    let mut body = String::from(
        r#"<h1>Sources</h1><p class="muted">Add RSS feeds or single URLs, then run processing on demand.</p>"#,
    );
    notice_banner(&mut body, notice);
    body.push_str(
        r#"<form method="post" action="/sources/run-all"><button>Run all active</button></form>
<div class="card"><h2>Add source</h2><form method="post" action="/sources">
<input name="url" placeholder="https://example.com/feed.xml" required>
<input name="label" placeholder="Optional label">
<select name="kind"><option value="feed">RSS feed</option><option value="single">Single URL</option></select>
<button>Add source</button></form></div>"#,
    );

    if sources.is_empty() {
        body.push_str(r#"<div class="card muted">No sources yet. Add your first feed or URL above.</div>"#);
    }
    for source in sources {
        let _ = write!(
            body,
            r#"<div class="card"><div class="muted">{kind}</div><div><strong>{name}</strong></div>
<div class="muted">{url}</div>
<form class="inline" method="post" action="/sources/{id}/run"><button>Run</button></form>
<form class="inline" method="post" action="/sources/{id}/toggle"><button>{state}</button></form></div>"#,
            kind = source.kind.as_str().to_uppercase(),
            name = text(source.display_name()),
            url = text(&source.url),
            id = source.id,
            state = if source.is_active { "Active" } else { "Inactive" },
        );
    }
    page("Sources", true, &body)
}

pub fn articles_page(articles: &[ArticleListing], notice: Option<&str>) -> String {
    let mut body = String::from(r#"<h1>Articles</h1><p class="muted">Processed items and status.</p>"#);
    notice_banner(&mut body, notice);

    if articles.is_empty() {
        body.push_str(r#"<div class="card muted">No articles yet. Run a source to process items.</div>"#);
    }
    for article in articles {
        let _ = write!(
            body,
            r#"<div class="card"><a href="/articles/{id}">{title}</a>{used}
<div class="muted">{source}</div>
<div class="muted">{created}</div>
<div>Status: {status}</div>"#,
            id = article.id,
            title = text(article.display_title()),
            used = if article.is_used { " <span class=\"muted\">(used)</span>" } else { "" },
            source = text(article.source_label.as_deref().unwrap_or(&article.url)),
            created = article.created_at.format("%Y-%m-%d %H:%M UTC"),
            status = article.status.as_str(),
        );
        if let Some(error) = &article.error {
            let _ = write!(body, r#"<div class="error">{}</div>"#, text(error));
        }
        let _ = write!(
            body,
            r#"<form class="inline" method="post" action="/articles/{}/rerun"><button>Re-run</button></form></div>"#,
            article.id
        );
    }
    page("Articles", true, &body)
}

fn language_block(out: &mut String, heading: &str, brief: Option<&str>, article: Option<&str>) {
    let _ = write!(
        out,
        r#"<h2>{heading}</h2><p class="pre">{brief}</p><div class="pre">{article}</div>"#,
        brief = text(brief.unwrap_or(&format!("No {heading} brief yet."))),
        article = text(article.unwrap_or(&format!("No {heading} article yet."))),
    );
}

pub fn article_page(article: &Article, source_label: Option<&str>, notice: Option<&str>) -> String {
    let mut body = String::new();
    notice_banner(&mut body, notice);

    let _ = write!(
        body,
        r#"<div class="card"><h1>{title}</h1>{used}
<div class="muted">{source}</div><div>Status: {status}</div>"#,
        title = text(article.display_title()),
        used = if article.is_used { "<span class=\"muted\">Used</span>" } else { "" },
        source = text(source_label.unwrap_or(&article.url)),
        status = article.status.as_str(),
    );
    if let Some(error) = &article.error {
        let kind = article
            .error_kind
            .map(|k| format!("[{}] ", k.as_str()))
            .unwrap_or_default();
        let _ = write!(body, r#"<div class="error">{kind}{}</div>"#, text(error));
    }
    let _ = write!(
        body,
        r#"<form class="inline" method="post" action="/articles/{id}/used"><input type="hidden" name="used" value="{next}"><button>{used_label}</button></form>
<form class="inline" method="post" action="/articles/{id}/rerun"><button>Re-run</button></form>
<a href="/articles/{id}/download/docx">Download .docx</a>
<a href="/articles/{id}/download/md">Download .md</a>
<form class="inline" method="post" action="/articles/{id}/delete"><button>Delete</button></form></div>"#,
        id = article.id,
        next = !article.is_used,
        used_label = if article.is_used { "Unmark used" } else { "Mark as used" },
    );

    let _ = write!(
        body,
        r#"<div class="card"><div class="muted">Source link</div><a href="{url}" target="_blank" rel="noreferrer">{url}</a></div>"#,
        url = text(&article.url),
    );

    body.push_str(r#"<div class="card">"#);
    language_block(
        &mut body,
        "English",
        article.brief_en.as_deref(),
        article.article_en.as_deref(),
    );
    body.push_str("<hr>");
    language_block(
        &mut body,
        "Georgian",
        article.brief_ge.as_deref(),
        article.article_ge.as_deref(),
    );
    body.push_str("</div>");

    page(article.display_title(), true, &body)
}

pub fn not_found_page(message: &str) -> String {
    let body = format!(
        r#"<div class="card"><p>{}</p><a href="/articles">Back to Articles</a></div>"#,
        text(message)
    );
    page("Not found", true, &body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{ArticleStatus, ErrorKind, SourceKind};
    use chrono::Utc;
    use uuid::Uuid;

    fn source(label: Option<&str>) -> Source {
        Source {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            url: "https://example.com/feed.xml".into(),
            label: label.map(str::to_string),
            kind: SourceKind::Feed,
            is_active: true,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn user_text_is_escaped() {
        let html = sources_page(&[source(Some("<script>alert(1)</script>"))], Some("<b>"));
        assert!(!html.contains("<script>alert"));
        assert!(html.contains("&lt;script&gt;"));
        assert!(!html.contains("<b>"));
    }

    #[test]
    fn empty_lists_show_hints() {
        assert!(sources_page(&[], None).contains("No sources yet."));
        assert!(articles_page(&[], None).contains("No articles yet."));
    }

    #[test]
    fn article_error_panel_shows_kind() {
        let now = Utc::now();
        let article = Article {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            source_id: None,
            url: "https://news.example/a".into(),
            status: ArticleStatus::Failed,
            error: Some("Failed to fetch URL: 404".into()),
            error_kind: Some(ErrorKind::Fetch),
            raw_html: None,
            extracted_text: None,
            title_en: None,
            title_ge: None,
            brief_en: None,
            brief_ge: None,
            article_en: None,
            article_ge: None,
            structured_output: None,
            is_used: false,
            created_at: now,
            updated_at: now,
        };

        let html = article_page(&article, None, None);
        assert!(html.contains(r#"<div class="error">[fetch] "#));
        assert!(html.contains("Status: failed"));
        assert!(html.contains(&format!("/articles/{}/download/md", article.id)));
        assert!(html.contains(r#"name="used" value="true""#));
    }

    #[test]
    fn login_page_shows_error() {
        let html = login_page(Some("Invalid credentials"), None);
        assert!(html.contains(r#"<div class="error">"#));
        assert!(html.contains(r#"action="/login""#));
        assert!(!html.contains("Sign out"));
    }
}
