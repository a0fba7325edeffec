//! CPM metadata documents
//!
//! Both document kinds are read in one pass over a quick-xml event
//! stream. [`StreamParser`] keeps the state record: the element being
//! read, the text accumulated since the last element start, and the
//! partially built document. Unknown elements are skipped; only
//! well-formedness errors abort a parse.

mod group_state;
mod participant;
mod session;

pub use group_state::{GroupParticipant, GroupState};
pub use participant::{phone_number, strip_tel};
pub use session::CpmSession;

use crate::error::{Error, Result};
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use tracing::warn;

/// Receives element boundaries from [`StreamParser`].
pub(crate) trait DocumentBuilder {
    /// An element opened. Self-closing elements get `start` then `end`.
    fn start(&mut self, _name: &[u8], _attributes: &[(String, String)]) {}

    /// An element closed; `text` is what accumulated since the last
    /// element start, trimmed.
    fn end(&mut self, name: &[u8], text: &str);
}

pub(crate) struct StreamParser<B> {
    current_element: Option<String>,
    text: String,
    depth: usize,
    builder: B,
}

impl<B: DocumentBuilder> StreamParser<B> {
    pub(crate) const fn new(builder: B) -> Self {
        Self {
            current_element: None,
            text: String::new(),
            depth: 0,
            builder,
        }
    }

    /// Consume the whole document and return the builder.
    pub(crate) fn run(mut self, xml: &str) -> Result<B> {
        let mut reader = Reader::from_str(xml);
        reader.trim_text(true);
        let mut saw_root = false;

        loop {
            match reader.read_event() {
                Ok(Event::Start(e)) => {
                    saw_root = true;
                    self.depth += 1;
                    self.open(&e);
                }
                Ok(Event::Empty(e)) => {
                    saw_root = true;
                    self.open(&e);
                    self.close(e.local_name().as_ref());
                }
                Ok(Event::End(e)) => {
                    self.depth = self.depth.saturating_sub(1);
                    self.close(e.local_name().as_ref());
                }
                Ok(Event::Text(t)) => match t.unescape() {
                    Ok(text) => self.text.push_str(&text),
                    Err(err) => {
                        warn!(
                            "Keeping raw text in <{}>: {}",
                            self.current_element.as_deref().unwrap_or("?"),
                            err
                        );
                        self.text.push_str(&String::from_utf8_lossy(&t));
                    }
                },
                Ok(Event::CData(c)) => self.text.push_str(&String::from_utf8_lossy(&c)),
                Ok(Event::Eof) => break,
                Ok(_) => {}
                Err(e) => {
                    return Err(Error::Xml(format!(
                        "{e} at byte {}",
                        reader.buffer_position()
                    )));
                }
            }
        }

        if !saw_root {
            return Err(Error::Xml("Document has no root element".into()));
        }
        if self.depth != 0 {
            return Err(Error::Xml(format!(
                "Document ended with {} unclosed element(s)",
                self.depth
            )));
        }
        Ok(self.builder)
    }

    fn open(&mut self, element: &BytesStart<'_>) {
        let name = element.local_name();
        self.current_element = Some(String::from_utf8_lossy(name.as_ref()).into_owned());
        self.text.clear();
        let attributes = attributes(element);
        self.builder.start(name.as_ref(), &attributes);
    }

    fn close(&mut self, name: &[u8]) {
        self.builder.end(name, self.text.trim());
        self.text.clear();
        self.current_element = None;
    }
}

/// Unescaped `(local-name, value)` pairs. Broken attributes are
/// logged and skipped.
fn attributes(element: &BytesStart<'_>) -> Vec<(String, String)> {
    let mut out = Vec::new();
    for attr in element.attributes() {
        let attr = match attr {
            Ok(attr) => attr,
            Err(e) => {
                warn!("Skipping malformed attribute: {}", e);
                continue;
            }
        };
        let key = String::from_utf8_lossy(attr.key.local_name().as_ref()).into_owned();
        match attr.unescape_value() {
            Ok(value) => out.push((key, value.into_owned())),
            Err(e) => warn!("Skipping attribute {}: {}", key, e),
        }
    }
    out
}

pub(crate) fn attribute<'a>(attributes: &'a [(String, String)], name: &str) -> Option<&'a str> {
    attributes
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}
