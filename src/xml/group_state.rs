use super::participant::strip_tel;
use super::{DocumentBuilder, StreamParser, attribute};
use crate::error::Result;
use serde::Serialize;
use tracing::debug;

/// One `<participant>` of a group-state document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GroupParticipant {
    pub name: Option<String>,
    /// `comm-addr` with any `tel:` scheme removed.
    pub address: String,
}

/// A group-state document.
///
/// ```xml
/// <groupstate timestamp="…" lastfocussessionid="…" group-type="Closed">
///   <participant name="Alice" comm-addr="tel:+33642639381"/>
/// </groupstate>
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GroupState {
    pub timestamp: String,
    pub last_focus_session_id: String,
    pub group_type: Option<String>,
    pub participants: Vec<GroupParticipant>,
}

impl GroupState {
    /// Parse a group-state document. Every participant element yields
    /// exactly one entry, in document order.
    pub fn parse(xml: &str) -> Result<Self> {
        let state = StreamParser::new(Self::default()).run(xml)?;
        debug!(
            "Parsed group state {:?} with {} participant(s)",
            state.last_focus_session_id,
            state.participants.len()
        );
        Ok(state)
    }

    pub fn addresses(&self) -> impl Iterator<Item = &str> {
        self.participants.iter().map(|p| p.address.as_str())
    }
}

impl DocumentBuilder for GroupState {
    fn start(&mut self, name: &[u8], attributes: &[(String, String)]) {
        match name {
            b"groupstate" => {
                if let Some(ts) = attribute(attributes, "timestamp") {
                    self.timestamp = ts.to_string();
                }
                if let Some(id) = attribute(attributes, "lastfocussessionid") {
                    self.last_focus_session_id = id.to_string();
                }
                self.group_type = attribute(attributes, "group-type").map(str::to_string);
            }
            b"participant" => self.participants.push(GroupParticipant {
                name: attribute(attributes, "name").map(str::to_string),
                address: attribute(attributes, "comm-addr")
                    .map(strip_tel)
                    .unwrap_or_default()
                    .to_string(),
            }),
            _ => {}
        }
    }

    fn end(&mut self, name: &[u8], text: &str) {
        if text.is_empty() {
            return;
        }
        match name {
            b"timestamp" => self.timestamp = text.to_string(),
            b"lastfocussessionid" => self.last_focus_session_id = text.to_string(),
            _ => {}
        }
    }
}
