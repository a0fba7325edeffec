//! IMAP message flags
//!
//! Flags travel in APPEND (a pushed message that was already read is
//! stored `\Seen`), in UID STORE (flagging for expunge) and back in
//! FETCH responses.

use serde::{Serialize, Serializer};
use std::fmt;

/// An IMAP message flag.
///
/// # Examples
///
/// ```
/// use cms_sync::Flag;
///
/// assert_eq!(Flag::Seen.as_imap_str(), "\\Seen");
/// assert_eq!(Flag::parse("\\deleted"), Flag::Deleted);
/// assert_eq!(Flag::parse("$Delivered"), Flag::Keyword("$Delivered".into()));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Flag {
    /// Message has been read (`\Seen`).
    Seen,
    /// Message has been answered (`\Answered`).
    Answered,
    /// Message is flagged for attention (`\Flagged`).
    Flagged,
    /// Message is marked for deletion (`\Deleted`).
    Deleted,
    /// Message is a draft (`\Draft`).
    Draft,
    /// Any other flag or keyword, kept verbatim.
    Keyword(String),
}

impl Flag {
    /// The IMAP wire representation of this flag.
    #[must_use]
    pub fn as_imap_str(&self) -> &str {
        match self {
            Self::Seen => "\\Seen",
            Self::Answered => "\\Answered",
            Self::Flagged => "\\Flagged",
            Self::Deleted => "\\Deleted",
            Self::Draft => "\\Draft",
            Self::Keyword(kw) => kw,
        }
    }

    /// Parse a flag as it appears on the wire. System flags are matched
    /// case-insensitively.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        match raw.to_ascii_lowercase().as_str() {
            "\\seen" => Self::Seen,
            "\\answered" => Self::Answered,
            "\\flagged" => Self::Flagged,
            "\\deleted" => Self::Deleted,
            "\\draft" => Self::Draft,
            _ => Self::Keyword(raw.to_string()),
        }
    }

    /// Render a parenthesized flag list, e.g. `(\Seen \Deleted)`.
    #[must_use]
    pub fn list(flags: &[Self]) -> String {
        let inner: Vec<&str> = flags.iter().map(Self::as_imap_str).collect();
        format!("({})", inner.join(" "))
    }
}

impl fmt::Display for Flag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_imap_str())
    }
}

impl Serialize for Flag {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_imap_str())
    }
}
