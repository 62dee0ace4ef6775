//! Plain value types flowing through the crawl pipeline
//!
//! Articles and comments are produced by the extractor and consumed by the
//! storage layer; links and listing pages are produced by the listing
//! extractor and consumed by the pagination walker.

mod article;
mod link;
mod reaction;

pub use article::{Article, Comment};
pub use link::{article_id_from_url, ArticleLink, ListingPage};
pub use reaction::Reaction;
