use chrono::NaiveDate;
use url::Url;

/// An article reference discovered on a listing page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArticleLink {
    /// Board-scoped article identifier derived from the URL
    pub id: String,

    /// Absolute URL of the article page
    pub url: Url,

    /// Title as shown in the listing, when the listing exposes it
    pub title: Option<String>,

    pub author: Option<String>,

    /// Listing date with the year inferred relative to "today"
    pub listed_on: Option<NaiveDate>,
}

impl ArticleLink {
    /// Builds a link for an article URL, deriving its identifier
    ///
    /// Returns `None` when the URL does not end in an article page.
    pub fn from_url(url: Url) -> Option<Self> {
        let id = article_id_from_url(&url)?;
        Some(Self {
            id,
            url,
            title: None,
            author: None,
            listed_on: None,
        })
    }
}

/// The article links of one listing page and the way to older content
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListingPage {
    pub links: Vec<ArticleLink>,

    /// The next page back in time, if any
    pub older_page: Option<Url>,
}

impl ListingPage {
    pub fn has_older_page(&self) -> bool {
        self.older_page.is_some()
    }

    /// Latest listing date on the page
    pub fn newest_date(&self) -> Option<NaiveDate> {
        self.links.iter().filter_map(|link| link.listed_on).max()
    }
}

/// Extracts the article identifier from a URL such as
/// `https://www.ptt.cc/bbs/Test/M.1712988320.A.1C2.html`
pub fn article_id_from_url(url: &Url) -> Option<String> {
    let last = url.path_segments()?.last()?;
    let id = last.strip_suffix(".html")?.trim();
    if id.is_empty() {
        None
    } else {
        Some(id.to_string())
    }
}
