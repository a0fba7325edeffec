//! CPIM message envelopes
//!
//! A CPIM payload is a header block, one blank line, then a body. The
//! body is either a nested header block plus content (recognised by
//! its own `Content-Type`) or an opaque block kept verbatim. Parsing
//! splits on the first blank line only, so blank lines inside the
//! body survive untouched.

mod headers;
mod message;

pub use headers::Headers;
pub use message::{Body, CpimMessage, TextBody};

pub const FROM: &str = "From";
pub const TO: &str = "To";
pub const DATE_TIME: &str = "DateTime";
pub const NS: &str = "NS";
pub const SUBJECT: &str = "Subject";
pub const CONTENT_TYPE: &str = "Content-Type";

/// Content type of plain-text chat bodies.
pub const TEXT_PLAIN: &str = "text/plain; charset=utf-8";

pub(crate) const CRLF: &str = "\r\n";
