use crate::model::Reaction;
use crate::ExtractionError;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// A board article together with its pushes
///
/// Timestamps are naive and always expressed in the board's local time.
/// The article exclusively owns its comments; positions are unique within
/// one article.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Article {
    /// Board the article was posted to
    pub board: String,

    /// Board-scoped identifier, e.g. `M.1712988320.A.1C2`
    pub id: String,

    pub title: String,

    /// `None` when the source redacted the author line
    pub author: Option<String>,

    pub body: String,

    pub created_at: NaiveDateTime,

    /// Canonical URL of the article page
    pub url: String,

    comments: Vec<Comment>,
}

impl Article {
    /// Creates an article without comments
    pub fn new(
        board: impl Into<String>,
        id: impl Into<String>,
        title: impl Into<String>,
        author: Option<String>,
        body: impl Into<String>,
        created_at: NaiveDateTime,
        url: impl Into<String>,
    ) -> Self {
        Self {
            board: board.into(),
            id: id.into(),
            title: title.into(),
            author,
            body: body.into(),
            created_at,
            url: url.into(),
            comments: Vec::new(),
        }
    }

    /// Adds a comment, rejecting a second comment at an existing position
    ///
    /// Comments stay sorted by position, so appending in extraction order
    /// never shifts existing entries.
    pub fn push_comment(&mut self, comment: Comment) -> Result<(), ExtractionError> {
        match self
            .comments
            .binary_search_by_key(&comment.position, |c| c.position)
        {
            Ok(_) => Err(ExtractionError::DuplicateComment(comment.position)),
            Err(index) => {
                self.comments.insert(index, comment);
                Ok(())
            }
        }
    }

    /// Comments in display order
    pub fn comments(&self) -> &[Comment] {
        &self.comments
    }

    /// True when the source withheld the author
    pub fn is_redacted(&self) -> bool {
        self.author.is_none()
    }

    /// Counts comments per reaction as (positive, neutral, negative)
    pub fn reaction_tally(&self) -> (usize, usize, usize) {
        self.comments
            .iter()
            .fold((0, 0, 0), |(pos, neu, neg), c| match c.reaction {
                Reaction::Positive => (pos + 1, neu, neg),
                Reaction::Neutral => (pos, neu + 1, neg),
                Reaction::Negative => (pos, neu, neg + 1),
            })
    }
}

/// A push (short reader reaction) attached to an article
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    /// Identifier of the owning article
    pub article_id: String,

    /// Zero-based index within the article's pushes
    pub position: u32,

    pub author: String,

    pub body: String,

    pub reaction: Reaction,

    /// Falls back to the article timestamp when the push carries none
    pub created_at: NaiveDateTime,

    /// Source IP shown next to the push time, when present
    pub ip: Option<String>,
}
