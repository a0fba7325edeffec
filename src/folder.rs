//! CMS folder snapshots
//!
//! A [`Folder`] is an immutable view of one remote folder: its name
//! and up to four consistency counters. A counter is `None` until a
//! response carrying it has been parsed; absence is never read as
//! zero.

use crate::imap::response::{scrape_counters, scrape_message_count};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// The bracketed counters scraped from SELECT responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Counter {
    UidValidity,
    UidNext,
    HighestModseq,
}

impl Counter {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::UidValidity => "UIDVALIDITY",
            Self::UidNext => "UIDNEXT",
            Self::HighestModseq => "HIGHESTMODSEQ",
        }
    }

    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "UIDVALIDITY" => Some(Self::UidValidity),
            "UIDNEXT" => Some(Self::UidNext),
            "HIGHESTMODSEQ" => Some(Self::HighestModseq),
            _ => None,
        }
    }
}

impl fmt::Display for Counter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub type CounterMap = BTreeMap<Counter, u64>;

/// How a folder can be brought up to date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SyncStrategy {
    /// Fetch only what changed after this modification sequence.
    Incremental { since_modseq: u64 },
    /// Compare the complete listing against local state.
    FullListing,
}

/// Snapshot of a remote folder.
///
/// # Examples
///
/// ```
/// use cms_sync::Folder;
///
/// let folder = Folder::from_select_response(
///     "Default/tel:+33642639381",
///     ["* OK [UIDVALIDITY 5]", "* OK [UIDNEXT 12]", "* OK [HIGHESTMODSEQ 100]", "* 3 EXISTS"],
///     true,
/// );
/// assert_eq!(folder.uid_next(), Some(12));
/// assert!(folder.is_consistent());
/// assert!(!folder.is_empty());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Folder {
    name: String,
    uid_validity: Option<u32>,
    uid_next: Option<u32>,
    highest_modseq: Option<u64>,
    messages: Option<u32>,
    condstore: bool,
}

impl Folder {
    /// A folder known only by name.
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            uid_validity: None,
            uid_next: None,
            highest_modseq: None,
            messages: None,
            condstore: false,
        }
    }

    /// Build a snapshot from the untagged lines of a SELECT.
    /// `condstore` records whether the select was `SELECT … (CONDSTORE)`.
    #[must_use]
    pub fn from_select_response<'a>(
        name: impl Into<String>,
        lines: impl IntoIterator<Item = &'a str> + Clone,
        condstore: bool,
    ) -> Self {
        let counters = scrape_counters(lines.clone());
        let messages = scrape_message_count(lines);
        Self::from_counters(name, &counters, messages, condstore)
    }

    #[must_use]
    pub fn from_counters(
        name: impl Into<String>,
        counters: &CounterMap,
        messages: Option<u32>,
        condstore: bool,
    ) -> Self {
        let narrow = |c| {
            counters
                .get(&c)
                .and_then(|v| u32::try_from(*v).ok())
        };
        Self {
            name: name.into(),
            uid_validity: narrow(Counter::UidValidity),
            uid_next: narrow(Counter::UidNext),
            highest_modseq: counters.get(&Counter::HighestModseq).copied(),
            messages,
            condstore,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub const fn uid_validity(&self) -> Option<u32> {
        self.uid_validity
    }

    #[must_use]
    pub const fn uid_next(&self) -> Option<u32> {
        self.uid_next
    }

    #[must_use]
    pub const fn highest_modseq(&self) -> Option<u64> {
        self.highest_modseq
    }

    #[must_use]
    pub const fn messages(&self) -> Option<u32> {
        self.messages
    }

    /// True only when the message count is known and zero.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        matches!(self.messages, Some(0))
    }

    /// All four counters were obtained together from one CONDSTORE
    /// select.
    #[must_use]
    pub const fn is_consistent(&self) -> bool {
        self.condstore
            && self.uid_validity.is_some()
            && self.uid_next.is_some()
            && self.highest_modseq.is_some()
            && self.messages.is_some()
    }

    #[must_use]
    pub const fn sync_strategy(&self) -> SyncStrategy {
        match (self.is_consistent(), self.highest_modseq) {
            (true, Some(since_modseq)) => SyncStrategy::Incremental { since_modseq },
            _ => SyncStrategy::FullListing,
        }
    }
}

impl fmt::Display for Folder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Remote folder holding the conversation with `contact`.
#[must_use]
pub fn conversation_folder(prefix: &str, contact: &str) -> String {
    format!("{prefix}{contact}")
}

/// The contact identifier a conversation folder belongs to.
#[must_use]
pub fn contact_of<'a>(prefix: &str, folder: &'a str) -> Option<&'a str> {
    folder.strip_prefix(prefix).filter(|c| !c.is_empty())
}
