//! Response line scraping
//!
//! The session reads the server's output as lines, each optionally
//! followed by counted literals. Everything here is a pure function
//! over those lines. Scraping is lenient: a line that does not match
//! what a command expects is ignored, never fatal, so dialect
//! extensions from CMS servers pass through untouched.

use crate::error::{Error, Result};
use crate::folder::{Counter, CounterMap};
use regex::Regex;
use std::sync::LazyLock;

static COUNTER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"OK \[(UIDVALIDITY|UIDNEXT|HIGHESTMODSEQ) ([0-9]+)\]").expect("counter regex")
});
static EXISTS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\* ([0-9]+) EXISTS").expect("exists regex"));
static MESSAGES_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"OK \[MESSAGES ([0-9]+)\]").expect("messages regex"));
static EXPUNGE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\* ([0-9]+) EXPUNGE").expect("expunge regex"));
static APPENDUID_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\[APPENDUID ([0-9]+) ([0-9]+)\]").expect("appenduid regex")
});
static LIST_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^\* LIST \(([^)]*)\) (NIL|"(?:[^"\\]|\\.)*") (.+)$"#).expect("list regex")
});
static STATUS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\* STATUS (.+) \(([^)]*)\)\s*$").expect("status regex"));
static FETCH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\* ([0-9]+) FETCH \(").expect("fetch regex"));
static FETCH_UID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[( ]UID ([0-9]+)").expect("fetch uid regex"));
static FETCH_FLAGS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"FLAGS \(([^)]*)\)").expect("fetch flags regex"));
static LITERAL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\{([0-9]+)\}$").expect("literal regex"));

/// One logical server response: the line text (CRLF stripped, literal
/// continuations appended) plus the bytes of each counted literal in
/// order of appearance.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResponseLine {
    pub text: String,
    pub literals: Vec<Vec<u8>>,
}

impl ResponseLine {
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            literals: Vec::new(),
        }
    }
}

/// Completion status of a tagged response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Ok,
    No,
    Bad,
}

impl Status {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::No => "NO",
            Self::Bad => "BAD",
        }
    }
}

/// Split a tagged completion line into its status and trailing text.
/// Returns `None` if the line does not carry `tag`.
#[must_use]
pub fn tagged_status<'a>(text: &'a str, tag: &str) -> Option<(Status, &'a str)> {
    let rest = text.strip_prefix(tag)?.strip_prefix(' ')?;
    let (word, detail) = rest.split_once(' ').unwrap_or((rest, ""));
    let status = match word.to_ascii_uppercase().as_str() {
        "OK" => Status::Ok,
        "NO" => Status::No,
        "BAD" => Status::Bad,
        _ => return None,
    };
    Some((status, detail))
}

/// If `line` ends with a literal marker `{n}`, the literal's length.
#[must_use]
pub fn trailing_literal(line: &str) -> Option<usize> {
    let start = line.rfind('{')?;
    LITERAL_RE
        .captures(&line[start..])
        .and_then(|c| c[1].parse().ok())
}

/// Capture the whitelisted folder counters from untagged lines.
/// Unknown bracketed tokens are ignored.
pub fn scrape_counters<'a>(lines: impl IntoIterator<Item = &'a str>) -> CounterMap {
    let mut counters = CounterMap::new();
    for line in lines {
        for caps in COUNTER_RE.captures_iter(line) {
            let (Some(counter), Ok(value)) = (Counter::parse(&caps[1]), caps[2].parse::<u64>())
            else {
                continue;
            };
            counters.insert(counter, value);
        }
    }
    counters
}

/// Message count from `* n EXISTS` or an `OK [MESSAGES n]` response
/// code. The last occurrence wins.
pub fn scrape_message_count<'a>(lines: impl IntoIterator<Item = &'a str>) -> Option<u32> {
    let mut count = None;
    for line in lines {
        if let Some(caps) = EXISTS_RE
            .captures(line)
            .or_else(|| MESSAGES_RE.captures(line))
        {
            count = caps[1].parse().ok().or(count);
        }
    }
    count
}

/// Capability atoms from `* CAPABILITY …` or a `[CAPABILITY …]` code,
/// upper-cased.
#[must_use]
pub fn parse_capabilities(text: &str) -> Option<Vec<String>> {
    let caps = if let Some(rest) = text.strip_prefix("* CAPABILITY ") {
        rest
    } else {
        let start = text.find("[CAPABILITY ")? + "[CAPABILITY ".len();
        let end = text[start..].find(']')? + start;
        &text[start..end]
    };
    Some(
        caps.split_whitespace()
            .map(str::to_ascii_uppercase)
            .collect(),
    )
}

/// The UID the server assigned to an appended message.
#[must_use]
pub fn parse_append_uid(text: &str) -> Option<u32> {
    APPENDUID_RE.captures(text).and_then(|c| c[2].parse().ok())
}

#[must_use]
pub fn parse_expunge(text: &str) -> Option<u32> {
    EXPUNGE_RE.captures(text).and_then(|c| c[1].parse().ok())
}

/// One entry of a LIST response.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct MailboxEntry {
    pub name: String,
    pub delimiter: Option<char>,
    pub attributes: Vec<String>,
}

impl MailboxEntry {
    /// `false` for `\Noselect` / `\NonExistent` placeholders.
    #[must_use]
    pub fn is_selectable(&self) -> bool {
        !self.attributes.iter().any(|a| {
            a.eq_ignore_ascii_case("\\Noselect") || a.eq_ignore_ascii_case("\\NonExistent")
        })
    }

    /// Hierarchy depth, counted in delimiters.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.delimiter
            .map_or(0, |d| self.name.matches(d).count())
    }
}

#[must_use]
pub fn parse_list(line: &ResponseLine) -> Option<MailboxEntry> {
    let caps = LIST_RE.captures(&line.text)?;
    let attributes = caps[1].split_whitespace().map(str::to_string).collect();
    let delimiter = match &caps[2] {
        "NIL" => None,
        quoted => unquote(quoted).and_then(|d| d.chars().next()),
    };
    let name = mailbox_name(caps[3].trim(), &line.literals)?;
    Some(MailboxEntry {
        name,
        delimiter,
        attributes,
    })
}

/// A STATUS response: mailbox name and its `(ITEM value …)` pairs.
#[must_use]
pub fn parse_status(line: &ResponseLine) -> Option<(String, Vec<(String, u64)>)> {
    let caps = STATUS_RE.captures(&line.text)?;
    let name = mailbox_name(caps[1].trim(), &line.literals)?;
    let tokens: Vec<&str> = caps[2].split_whitespace().collect();
    let items = tokens
        .chunks(2)
        .filter_map(|pair| match pair {
            [key, value] => Some((key.to_ascii_uppercase(), value.parse().ok()?)),
            _ => None,
        })
        .collect();
    Some((name, items))
}

/// Fields of one FETCH response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchItem {
    pub sequence: u32,
    pub uid: Option<u32>,
    pub flags: Vec<String>,
    pub body: Option<Vec<u8>>,
}

#[must_use]
pub fn parse_fetch(line: &ResponseLine) -> Option<FetchItem> {
    let sequence = FETCH_RE.captures(&line.text)?[1].parse().ok()?;
    let uid = FETCH_UID_RE
        .captures(&line.text)
        .and_then(|c| c[1].parse().ok());
    let flags = FETCH_FLAGS_RE
        .captures(&line.text)
        .map(|c| c[1].split_whitespace().map(str::to_string).collect())
        .unwrap_or_default();
    Some(FetchItem {
        sequence,
        uid,
        flags,
        body: line.literals.first().cloned(),
    })
}

/// Decode a mailbox name given as quoted string, atom or literal.
fn mailbox_name(raw: &str, literals: &[Vec<u8>]) -> Option<String> {
    if raw.starts_with('"') {
        unquote(raw)
    } else if trailing_literal(raw).is_some() {
        literals
            .first()
            .map(|l| String::from_utf8_lossy(l).into_owned())
    } else if raw.is_empty() {
        None
    } else {
        Some(raw.to_string())
    }
}

/// Remove surrounding quotes and backslash escapes.
#[must_use]
pub fn unquote(raw: &str) -> Option<String> {
    let inner = raw.strip_prefix('"')?.strip_suffix('"')?;
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            out.push(chars.next()?);
        } else {
            out.push(c);
        }
    }
    Some(out)
}

/// Fail on characters a quoted string cannot carry (CR, LF, NUL).
pub fn check_quotable(s: &str) -> Result<()> {
    if s.contains(['\r', '\n', '\0']) {
        return Err(Error::InvalidString(s.to_string()));
    }
    Ok(())
}

/// Render `s` as an IMAP quoted string.
pub fn quote(s: &str) -> Result<String> {
    check_quotable(s)?;
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        if c == '"' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
    Ok(out)
}
