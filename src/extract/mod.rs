//! Markup extraction: raw page bytes to typed records
//!
//! Everything in this module is pure. The same bytes always produce the same
//! records and nothing here touches the network or the database.
//! - Decoding with a declared fallback encoding
//! - Article and push extraction
//! - Listing extraction (article links, older-page link)
//! - Board date formats

mod article;
pub mod dates;
mod decode;
mod listing;
mod selectors;

pub use article::{extract_article, UNTITLED};
pub use decode::{decode_page, DecodedPage};
pub use listing::extract_listing;
