use std::fmt;

/// Position of the pagination walker in a board's history
///
/// ```text
/// AtNewest --(page with older link)--> InMiddle
/// AtNewest | InMiddle --(no older link, past cutoff, failure, empty pages)--> Exhausted
/// ```
///
/// Exhausted is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WalkerState {
    /// Nothing fetched yet; the next page is the newest one
    AtNewest,

    /// At least one page fetched and an older page is known
    InMiddle,

    /// No further pages will be produced
    Exhausted,
}

impl WalkerState {
    /// Returns true if no more pages will be produced
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Exhausted)
    }

    /// State after a page was produced
    pub fn after_page(has_older_page: bool) -> Self {
        if has_older_page {
            Self::InMiddle
        } else {
            Self::Exhausted
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AtNewest => "at_newest",
            Self::InMiddle => "in_middle",
            Self::Exhausted => "exhausted",
        }
    }
}

impl fmt::Display for WalkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
