use crate::cpim::CpimMessage;
use crate::error::Result;
use crate::flag::Flag;
use serde::Serialize;

/// A message fetched from the store, tagged with the folder it was
/// read from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RemoteMessage {
    pub folder: String,
    pub uid: u32,
    pub flags: Vec<Flag>,
    pub body: String,
}

impl RemoteMessage {
    #[must_use]
    pub fn is_seen(&self) -> bool {
        self.flags.contains(&Flag::Seen)
    }

    /// Decode the stored body as a CPIM envelope.
    pub fn envelope(&self) -> Result<CpimMessage> {
        CpimMessage::parse(&self.body)
    }
}
