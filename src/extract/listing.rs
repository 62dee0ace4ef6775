//! Listing page extraction
//!
//! Listing rows become [`ArticleLink`]s; the paging bar tells whether an
//! older page exists.

use crate::extract::dates::parse_listing_date;
use crate::extract::decode::decode_page;
use crate::extract::selectors::{
    LIST_CONTAINER, LIST_ROW, PAGING_BUTTON, ROW_AUTHOR, ROW_DATE, ROW_LINK,
};
use crate::model::{ArticleLink, ListingPage};
use crate::PaginationError;
use chrono::NaiveDate;
use encoding_rs::Encoding;
use scraper::{ElementRef, Html};
use url::Url;

/// Label of the paging button that leads back in time
const OLDER_PAGE_LABEL: &str = "上頁";

/// Extracts article links and the older-page link from a listing page
///
/// Deleted entries (rows without a link) are skipped, as are the pinned
/// notices that follow the list separator.
///
/// # Arguments
///
/// * `bytes` - The raw listing page
/// * `page_url` - URL the page was fetched from, used to resolve relative links
/// * `today` - Board-local date used to infer the year of listing dates
/// * `fallback` - Encoding used when the bytes are not valid UTF-8
///
/// # Returns
///
/// * `Ok(ListingPage)` - The links on the page and the older page, if any
/// * `Err(PaginationError::Malformed)` - The page is not a board listing
pub fn extract_listing(
    bytes: &[u8],
    page_url: &Url,
    today: NaiveDate,
    fallback: &'static Encoding,
) -> Result<ListingPage, PaginationError> {
    let decoded = decode_page(bytes, fallback);
    let document = Html::parse_document(&decoded.text);

    let has_list = document.select(&LIST_CONTAINER).next().is_some();
    let has_paging = document.select(&PAGING_BUTTON).next().is_some();
    if !has_list && !has_paging {
        return Err(PaginationError::Malformed(page_url.to_string()));
    }

    let mut links = Vec::new();
    for row in document.select(&LIST_ROW) {
        if row.value().classes().any(|class| class == "r-list-sep") {
            break;
        }
        if let Some(link) = extract_row(row, page_url, today) {
            links.push(link);
        }
    }

    Ok(ListingPage {
        links,
        older_page: older_page_url(&document, page_url),
    })
}

fn extract_row(row: ElementRef<'_>, page_url: &Url, today: NaiveDate) -> Option<ArticleLink> {
    let anchor = row.select(&ROW_LINK).next()?;
    let href = anchor.value().attr("href")?;
    let url = page_url.join(href.trim()).ok()?;

    let mut link = ArticleLink::from_url(url)?;
    link.title = Some(collapse_whitespace(anchor.text())).filter(|t| !t.is_empty());
    link.author = row
        .select(&ROW_AUTHOR)
        .next()
        .map(|author| collapse_whitespace(author.text()))
        .filter(|a| !a.is_empty() && a != "-");
    link.listed_on = row
        .select(&ROW_DATE)
        .next()
        .and_then(|date| parse_listing_date(&date.text().collect::<String>(), today));

    Some(link)
}

/// The enabled "older page" button, resolved against the current page
fn older_page_url(document: &Html, page_url: &Url) -> Option<Url> {
    document
        .select(&PAGING_BUTTON)
        .filter(|button| button.text().collect::<String>().contains(OLDER_PAGE_LABEL))
        .filter(|button| !button.value().classes().any(|class| class == "disabled"))
        .find_map(|button| button.value().attr("href"))
        .and_then(|href| page_url.join(href.trim()).ok())
}

fn collapse_whitespace<'a>(text: impl Iterator<Item = &'a str>) -> String {
    text.collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}
