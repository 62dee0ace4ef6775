//! CSS selectors for the board markup
//!
//! These are constant strings; a parse failure is a programming error.

use scraper::Selector;
use std::sync::LazyLock;

fn selector(css: &str) -> Selector {
    Selector::parse(css).unwrap_or_else(|e| panic!("BUG: invalid CSS selector {css:?}: {e:?}"))
}

// Article pages
pub static MAIN_CONTENT: LazyLock<Selector> = LazyLock::new(|| selector("#main-content"));
pub static METALINE: LazyLock<Selector> = LazyLock::new(|| selector("div.article-metaline"));
pub static METALINE_RIGHT: LazyLock<Selector> =
    LazyLock::new(|| selector("div.article-metaline-right"));
pub static META_TAG: LazyLock<Selector> = LazyLock::new(|| selector("span.article-meta-tag"));
pub static META_VALUE: LazyLock<Selector> = LazyLock::new(|| selector("span.article-meta-value"));
pub static DOCUMENT_TITLE: LazyLock<Selector> = LazyLock::new(|| selector("title"));
pub static PUSH: LazyLock<Selector> = LazyLock::new(|| selector("div.push"));
pub static PUSH_TAG: LazyLock<Selector> = LazyLock::new(|| selector("span.push-tag"));
pub static PUSH_USER: LazyLock<Selector> = LazyLock::new(|| selector("span.push-userid"));
pub static PUSH_CONTENT: LazyLock<Selector> = LazyLock::new(|| selector("span.push-content"));
pub static PUSH_IPDATETIME: LazyLock<Selector> =
    LazyLock::new(|| selector("span.push-ipdatetime"));

// Listing pages
pub static LIST_CONTAINER: LazyLock<Selector> = LazyLock::new(|| selector("div.r-list-container"));
pub static LIST_ROW: LazyLock<Selector> = LazyLock::new(|| {
    selector("div.r-list-container > div.r-ent, div.r-list-container > div.r-list-sep")
});
pub static ROW_LINK: LazyLock<Selector> = LazyLock::new(|| selector("div.title a[href]"));
pub static ROW_DATE: LazyLock<Selector> = LazyLock::new(|| selector("div.meta div.date"));
pub static ROW_AUTHOR: LazyLock<Selector> = LazyLock::new(|| selector("div.meta div.author"));
pub static PAGING_BUTTON: LazyLock<Selector> =
    LazyLock::new(|| selector("div.btn-group-paging a.btn.wide"));
