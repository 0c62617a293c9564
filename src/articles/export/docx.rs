use docx_rs::{
    AbstractNumbering, Docx, IndentLevel, Level, LevelJc, LevelText, NumberFormat, Numbering,
    NumberingId, Paragraph, Run, SpecialIndentType, Start, Style, StyleType,
};
use regex::Regex;
use std::io::Cursor;
use std::sync::LazyLock;

use crate::articles::export::ExportError;
use crate::entities::Article;

const HEADING_STYLE: &str = "Heading2";
const BULLET_NUMBERING: usize = 1;

static BLANK_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n\s*\n").expect("Failed to compile blank line regex"));

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    Text(String),
    Bullet(String),
}

/// Split model text into paragraphs: blank lines separate blocks, every
/// non-empty line is its own paragraph, and `- ` lines become bullets.
pub fn blocks(text: &str) -> Vec<Block> {
    BLANK_LINE
        .split(text)
        .map(str::trim)
        .filter(|block| !block.is_empty())
        .flat_map(|block| block.lines().map(str::trim))
        .filter(|line| !line.is_empty())
        .map(|line| match line.strip_prefix("- ") {
            Some(item) => Block::Bullet(item.to_string()),
            None => Block::Text(line.to_string()),
        })
        .collect()
}

fn text_paragraph(text: &str) -> Paragraph {
    Paragraph::new().add_run(Run::new().add_text(text))
}

fn heading(text: &str) -> Paragraph {
    text_paragraph(text).style(HEADING_STYLE)
}

fn section(doc: Docx, title: &str, body: Option<&str>) -> Docx {
    let mut doc = doc.add_paragraph(heading(title));
    let blocks = blocks(body.unwrap_or_default());
    if blocks.is_empty() {
        return doc.add_paragraph(text_paragraph(""));
    }
    for block in blocks {
        doc = doc.add_paragraph(match block {
            Block::Text(text) => text_paragraph(&text),
            Block::Bullet(text) => text_paragraph(&text)
                .numbering(NumberingId::new(BULLET_NUMBERING), IndentLevel::new(0)),
        });
    }
    doc
}

fn document(article: &Article) -> Docx {
    let bullets = AbstractNumbering::new(BULLET_NUMBERING).add_level(
        Level::new(
            0,
            Start::new(1),
            NumberFormat::new("bullet"),
            LevelText::new("•"),
            LevelJc::new("left"),
        )
        .indent(Some(720), Some(SpecialIndentType::Hanging(360)), None, None),
    );

    let doc = Docx::new()
        .add_style(
            Style::new(HEADING_STYLE, StyleType::Paragraph)
                .name("Heading 2")
                .size(28)
                .bold(),
        )
        .add_abstract_numbering(bullets)
        .add_numbering(Numbering::new(BULLET_NUMBERING, BULLET_NUMBERING))
        .add_paragraph(
            Paragraph::new().add_run(Run::new().add_text(article.display_title()).bold()),
        )
        .add_paragraph(text_paragraph(&format!("Source: {}", article.url)))
        .add_paragraph(text_paragraph(""));

    let sections = [
        ("English Brief", article.brief_en.as_deref()),
        ("English Article", article.article_en.as_deref()),
        ("Georgian Brief", article.brief_ge.as_deref()),
        ("Georgian Article", article.article_ge.as_deref()),
    ];
    let last = sections.len() - 1;
    sections
        .into_iter()
        .enumerate()
        .fold(doc, |doc, (i, (title, body))| {
            let doc = section(doc, title, body);
            if i < last {
                doc.add_paragraph(text_paragraph(""))
            } else {
                doc
            }
        })
}

/// Word document bytes for one article.
pub fn render(article: &Article) -> Result<Vec<u8>, ExportError> {
    let mut buf = Cursor::new(Vec::new());
    document(article)
        .build()
        .pack(&mut buf)
        .map_err(|e| ExportError::Docx(e.to_string()))?;
    Ok(buf.into_inner())
}
