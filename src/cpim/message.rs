use super::{CONTENT_TYPE, CRLF, DATE_TIME, FROM, Headers, TEXT_PLAIN, TO};
use crate::error::{Error, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use std::fmt;

const BLANK_LINE: &str = "\r\n\r\n";

/// A body carrying its own header block and content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextBody {
    headers: Headers,
    content: String,
}

impl TextBody {
    pub fn new(content_type: &str, content: impl Into<String>) -> Result<Self> {
        Ok(Self {
            headers: Headers::new().with(CONTENT_TYPE, content_type)?,
            content: content.into(),
        })
    }

    /// UTF-8 plain text.
    pub fn plain(content: impl Into<String>) -> Result<Self> {
        Self::new(TEXT_PLAIN, content)
    }

    #[must_use]
    pub const fn headers(&self) -> &Headers {
        &self.headers
    }

    pub const fn headers_mut(&mut self) -> &mut Headers {
        &mut self.headers
    }

    #[must_use]
    pub fn content(&self) -> &str {
        &self.content
    }
}

/// Envelope body, selected at parse time by the presence of a
/// `Content-Type` header in the body's own header block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Body {
    Text(TextBody),
    /// Anything without its own header block, kept verbatim.
    Raw(String),
}

impl Body {
    fn parse(block: &str) -> Self {
        if let Some((head, content)) = split_block(block)
            && let Ok(headers) = Headers::parse(head)
            && headers.contains(CONTENT_TYPE)
        {
            return Self::Text(TextBody {
                headers,
                content: content.to_string(),
            });
        }
        Self::Raw(block.to_string())
    }

    fn write_to(&self, out: &mut String) {
        match self {
            Self::Text(text) => {
                text.headers.write_to(out);
                out.push_str(CRLF);
                out.push_str(&text.content);
            }
            Self::Raw(raw) => out.push_str(raw),
        }
    }

    #[must_use]
    pub fn content_type(&self) -> Option<&str> {
        match self {
            Self::Text(text) => text.headers.get(CONTENT_TYPE),
            Self::Raw(_) => None,
        }
    }

    #[must_use]
    pub fn content(&self) -> &str {
        match self {
            Self::Text(text) => &text.content,
            Self::Raw(raw) => raw,
        }
    }
}

/// A CPIM envelope: ordered headers plus a typed body.
///
/// # Examples
///
/// ```
/// use cms_sync::CpimMessage;
///
/// let payload = "From: <tel:+33642639381>\r\n\
///                \r\n\
///                Content-Type: text/plain\r\n\
///                \r\n\
///                Salut\r\n\r\nà plus";
/// let msg = CpimMessage::parse(payload).unwrap();
/// assert_eq!(msg.header("from"), Some("<tel:+33642639381>"));
/// assert_eq!(msg.content_type(), Some("text/plain"));
/// assert_eq!(msg.body().content(), "Salut\r\n\r\nà plus");
/// assert_eq!(msg.serialize(), payload);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CpimMessage {
    headers: Headers,
    body: Body,
}

impl CpimMessage {
    #[must_use]
    pub const fn new(headers: Headers, body: Body) -> Self {
        Self { headers, body }
    }

    /// Plain-text chat message from `from` to `to`. Fails when an
    /// address would break the header line.
    pub fn text(
        from: &str,
        to: &str,
        date_time: DateTime<Utc>,
        content: impl Into<String>,
    ) -> Result<Self> {
        let headers = Headers::new()
            .with(FROM, angle(from))?
            .with(TO, angle(to))?
            .with(DATE_TIME, date_time.to_rfc3339_opts(SecondsFormat::Secs, true))?;
        Ok(Self::new(headers, Body::Text(TextBody::plain(content)?)))
    }

    /// Parse a payload. Line endings are normalised to CRLF first.
    pub fn parse(payload: &str) -> Result<Self> {
        let normalized = normalize_line_endings(payload);
        let (head, body) = split_block(&normalized)
            .ok_or_else(|| Error::Cpim("Missing blank line after headers".into()))?;
        Ok(Self {
            headers: Headers::parse(head)?,
            body: Body::parse(body),
        })
    }

    #[must_use]
    pub fn serialize(&self) -> String {
        let mut out = String::new();
        self.headers.write_to(&mut out);
        out.push_str(CRLF);
        self.body.write_to(&mut out);
        out
    }

    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }

    #[must_use]
    pub const fn headers(&self) -> &Headers {
        &self.headers
    }

    #[must_use]
    pub const fn body(&self) -> &Body {
        &self.body
    }

    /// The body's own content type.
    #[must_use]
    pub fn content_type(&self) -> Option<&str> {
        self.body.content_type()
    }
}

impl fmt::Display for CpimMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.serialize())
    }
}

/// Split at the first blank line into header block and remainder.
fn split_block(block: &str) -> Option<(&str, &str)> {
    if let Some(rest) = block.strip_prefix(CRLF) {
        return Some(("", rest));
    }
    block.split_once(BLANK_LINE)
}

/// Turn lone `\n` into `\r\n`; existing CRLF pairs are kept.
fn normalize_line_endings(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + s.len() / 32);
    let mut prev_cr = false;
    for c in s.chars() {
        if c == '\n' && !prev_cr {
            out.push('\r');
        }
        out.push(c);
        prev_cr = c == '\r';
    }
    out
}

fn angle(address: &str) -> String {
    if address.starts_with('<') {
        address.to_string()
    } else {
        format!("<{address}>")
    }
}
