//! Article page extraction
//!
//! Turns an article page into an [`Article`] with its pushes. Missing title
//! and author lines are tolerated; a missing or unparseable timestamp is not.

use crate::extract::dates::{parse_article_datetime, resolve_push_time};
use crate::extract::decode::decode_page;
use crate::extract::selectors::{
    DOCUMENT_TITLE, MAIN_CONTENT, METALINE, METALINE_RIGHT, META_TAG, META_VALUE, PUSH,
    PUSH_CONTENT, PUSH_IPDATETIME, PUSH_TAG, PUSH_USER,
};
use crate::model::{Article, ArticleLink, Comment, Reaction};
use crate::ExtractionError;
use chrono::NaiveDateTime;
use encoding_rs::Encoding;
use scraper::{ElementRef, Html, Node};

/// Title used when neither the page nor the listing provides one
pub const UNTITLED: &str = "(untitled)";

const TAG_AUTHOR: &str = "作者";
const TAG_TITLE: &str = "標題";
const TAG_TIME: &str = "時間";
const TAG_BOARD: &str = "看板";

/// Header values found in the article metalines
#[derive(Debug, Default)]
struct ArticleMeta {
    author: Option<String>,
    title: Option<String>,
    time: Option<String>,
    board: Option<String>,
}

/// Extracts an article and its pushes from raw page bytes
///
/// # Arguments
///
/// * `bytes` - The raw article page
/// * `link` - The listing link that led here (identifier, URL, listing title)
/// * `board` - Board name used when the page does not state one
/// * `fallback` - Encoding used when the bytes are not valid UTF-8
///
/// # Returns
///
/// * `Ok(Article)` - The extracted article
/// * `Err(ExtractionError)` - The page has no article body or no usable timestamp
pub fn extract_article(
    bytes: &[u8],
    link: &ArticleLink,
    board: &str,
    fallback: &'static Encoding,
) -> Result<Article, ExtractionError> {
    let decoded = decode_page(bytes, fallback);
    let document = Html::parse_document(&decoded.text);

    let main = document
        .select(&MAIN_CONTENT)
        .next()
        .ok_or(ExtractionError::MissingContent)?;

    let meta = extract_meta(main);

    let raw_time = meta.time.as_deref().ok_or(ExtractionError::MissingDate)?;
    let created_at = parse_article_datetime(raw_time)
        .ok_or_else(|| ExtractionError::InvalidDate(raw_time.to_string()))?;

    let title = meta
        .title
        .clone()
        .or_else(|| link.title.clone().filter(|t| !t.is_empty()))
        .or_else(|| document_title(&document))
        .unwrap_or_else(|| UNTITLED.to_string());

    let author = meta.author.as_deref().and_then(author_handle);
    let board = meta.board.clone().unwrap_or_else(|| board.to_string());

    let mut article = Article::new(
        board,
        link.id.clone(),
        title,
        author,
        extract_body(main),
        created_at,
        link.url.as_str(),
    );

    for comment in extract_comments(main, &link.id, created_at) {
        article.push_comment(comment)?;
    }

    Ok(article)
}

/// Reads the tag/value pairs of the article header
fn extract_meta(main: ElementRef<'_>) -> ArticleMeta {
    let mut meta = ArticleMeta::default();

    for line in main.select(&METALINE).chain(main.select(&METALINE_RIGHT)) {
        let tag = line.select(&META_TAG).next().map(element_text);
        let value = line.select(&META_VALUE).next().map(element_text);

        let (Some(tag), Some(value)) = (tag, value) else {
            continue;
        };
        if value.is_empty() {
            continue;
        }

        match tag.as_str() {
            TAG_AUTHOR => meta.author = Some(value),
            TAG_TITLE => meta.title = Some(value),
            TAG_TIME => meta.time = Some(value),
            TAG_BOARD => meta.board = Some(value),
            other => tracing::trace!("Ignoring unknown meta tag {:?}", other),
        }
    }

    meta
}

/// The account handle in an author line such as `someone (Nickname)`
fn author_handle(raw: &str) -> Option<String> {
    raw.split(|c: char| c.is_whitespace() || c == '(')
        .find(|part| !part.is_empty())
        .map(str::to_string)
}

/// The document `<title>` without the board suffix
fn document_title(document: &Html) -> Option<String> {
    let raw = document.select(&DOCUMENT_TITLE).next().map(element_text)?;
    let title = match raw.split_once(" - 看板") {
        Some((title, _)) => title.trim().to_string(),
        None => raw,
    };
    Some(title).filter(|t| !t.is_empty())
}

/// Article text without the header lines and the pushes
fn extract_body(main: ElementRef<'_>) -> String {
    let mut raw = String::new();
    collect_body_text(main, &mut raw);
    normalize_body(&raw)
}

fn collect_body_text(element: ElementRef<'_>, out: &mut String) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => out.push_str(text),
            Node::Element(el) => {
                let skipped = el.classes().any(|class| {
                    matches!(
                        class,
                        "article-metaline" | "article-metaline-right" | "push"
                    )
                });
                if skipped {
                    continue;
                }
                if let Some(child_ref) = ElementRef::wrap(child) {
                    collect_body_text(child_ref, out);
                }
            }
            _ => {}
        }
    }
}

/// Right-trims lines, collapses blank runs to one empty line, trims the ends
fn normalize_body(raw: &str) -> String {
    let mut lines: Vec<&str> = Vec::new();
    let mut previous_blank = true;

    for line in raw.lines().map(str::trim_end) {
        let blank = line.trim().is_empty();
        if blank && previous_blank {
            continue;
        }
        lines.push(if blank { "" } else { line });
        previous_blank = blank;
    }

    lines.join("\n").trim().to_string()
}

/// Extracts the pushes in display order with zero-based positions
fn extract_comments(
    main: ElementRef<'_>,
    article_id: &str,
    article_time: NaiveDateTime,
) -> Vec<Comment> {
    main.select(&PUSH)
        .filter(|push| !push.value().classes().any(|c| c == "warning-box"))
        .enumerate()
        .map(|(index, push)| {
            let marker = push.select(&PUSH_TAG).next().map(element_text);
            let author = push
                .select(&PUSH_USER)
                .next()
                .map(element_text)
                .unwrap_or_default();
            let body = push
                .select(&PUSH_CONTENT)
                .next()
                .map(|content| {
                    element_text(content)
                        .trim_start_matches(|c: char| c == ':' || c.is_whitespace())
                        .to_string()
                })
                .unwrap_or_default();

            let (ip, time) = push
                .select(&PUSH_IPDATETIME)
                .next()
                .map(|span| parse_ipdatetime(&element_text(span), article_time))
                .unwrap_or((None, None));

            Comment {
                article_id: article_id.to_string(),
                position: index as u32,
                author,
                body,
                reaction: Reaction::from_marker(marker.as_deref().unwrap_or_default()),
                created_at: time.unwrap_or(article_time),
                ip,
            }
        })
        .collect()
}

/// Splits `[ip] MM/DD HH:MM` into the optional IP and the push time
fn parse_ipdatetime(
    raw: &str,
    article_time: NaiveDateTime,
) -> (Option<String>, Option<NaiveDateTime>) {
    let tokens: Vec<&str> = raw.split_whitespace().collect();
    let Some(date_index) = tokens.iter().position(|t| t.contains('/')) else {
        return (None, None);
    };

    let ip = date_index
        .checked_sub(1)
        .and_then(|i| tokens.get(i))
        .map(|t| t.to_string());
    let time = tokens
        .get(date_index + 1)
        .and_then(|time| resolve_push_time(tokens[date_index], time, article_time));

    (ip, time)
}

/// Text content of an element with whitespace runs collapsed
fn element_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}
