use super::participant::phone_number;
use super::{DocumentBuilder, StreamParser};
use crate::error::Result;
use serde::Serialize;
use tracing::{debug, warn};

/// A CPM session document.
///
/// ```xml
/// <session>
///   <session-type>Group</session-type>
///   <sdp>o=- 0 0 IN IP4 0.0.0.0</sdp>
///   <invited-participants>tel:+33642639381;tel:+33643209850</invited-participants>
/// </session>
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CpmSession {
    pub session_type: String,
    pub sdp: Option<String>,
    /// Validated numbers, in document order.
    pub participants: Vec<String>,
}

impl CpmSession {
    /// Parse a session document. Invalid participant entries are
    /// dropped with a warning; only malformed XML fails.
    ///
    /// ```
    /// use cms_sync::xml::CpmSession;
    ///
    /// let doc = "<session><session-type>Group</session-type>\
    ///            <invited-participants>tel:+33642639381;tel:+33643209850</invited-participants>\
    ///            </session>";
    /// let session = CpmSession::parse(doc).unwrap();
    /// assert_eq!(session.session_type, "Group");
    /// assert_eq!(session.participants, ["+33642639381", "+33643209850"]);
    /// ```
    pub fn parse(xml: &str) -> Result<Self> {
        let session = StreamParser::new(Self::default()).run(xml)?;
        debug!(
            "Parsed CPM session {:?} with {} participant(s)",
            session.session_type,
            session.participants.len()
        );
        Ok(session)
    }

    fn add_participants(&mut self, joined: &str) {
        for segment in joined.split(';').map(str::trim).filter(|s| !s.is_empty()) {
            match phone_number(segment) {
                Some(number) => self.participants.push(number),
                None => warn!("Dropping invalid participant {:?}", segment),
            }
        }
    }
}

impl DocumentBuilder for CpmSession {
    fn end(&mut self, name: &[u8], text: &str) {
        match name {
            b"session-type" => self.session_type = text.to_string(),
            b"sdp" => self.sdp = Some(text.to_string()),
            b"invited-participants" => self.add_participants(text),
            _ => {}
        }
    }
}
