use crate::model::{Article, ArticleLink};

/// Search operators the board understands on its search endpoint
///
/// Results for these are already filtered by the server and cannot be
/// re-checked against the title.
const SERVER_OPERATORS: [&str; 3] = ["author:", "thread:", "recommend:"];

/// Whether a link should be fetched under the keyword filter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Accept,
    Reject,
    /// The listing gave no title; decide after extraction
    Defer,
}

/// Case-insensitive keyword match on article titles
#[derive(Debug, Clone, Default)]
pub struct KeywordFilter {
    needle: Option<String>,
}

impl KeywordFilter {
    pub fn new(keyword: &str) -> Self {
        let keyword = keyword.trim();
        let server_side = SERVER_OPERATORS
            .iter()
            .any(|op| keyword.to_lowercase().starts_with(op));

        let needle = if keyword.is_empty() || server_side {
            None
        } else {
            Some(keyword.to_lowercase())
        };
        Self { needle }
    }

    /// Returns true when every article passes
    pub fn is_open(&self) -> bool {
        self.needle.is_none()
    }

    pub fn matches_title(&self, title: &str) -> bool {
        match &self.needle {
            Some(needle) => title.to_lowercase().contains(needle),
            None => true,
        }
    }

    /// Decides on a link from what the listing shows
    pub fn verdict(&self, link: &ArticleLink) -> Verdict {
        if self.is_open() {
            return Verdict::Accept;
        }
        match link.title.as_deref() {
            Some(title) if self.matches_title(title) => Verdict::Accept,
            Some(_) => Verdict::Reject,
            None => Verdict::Defer,
        }
    }

    pub fn matches_article(&self, article: &Article) -> bool {
        self.matches_title(&article.title)
    }
}
