use crate::entities::Article;

/// Plain Markdown rendering of both language versions.
pub fn render(article: &Article) -> String {
    format!(
        "# {title}\n\n\
         Source: {url}\n\n\
         ## English Brief\n\n{brief_en}\n\n\
         ## English Article\n\n{article_en}\n\n\
         ---\n\n\
         ## Georgian Brief\n\n{brief_ge}\n\n\
         ## Georgian Article\n\n{article_ge}\n",
        title = article.display_title(),
        url = article.url,
        brief_en = article.brief_en.as_deref().unwrap_or_default(),
        article_en = article.article_en.as_deref().unwrap_or_default(),
        brief_ge = article.brief_ge.as_deref().unwrap_or_default(),
        article_ge = article.article_ge.as_deref().unwrap_or_default(),
    )
}
