use super::{Task, TaskOutput};
use crate::config::ANONYMOUS_ADDRESS;
use crate::cpim::CpimMessage;
use crate::error::Result;
use crate::flag::Flag;
use crate::folder::conversation_folder;
use crate::imap::CmsSession;
use crate::imap::response::check_quotable;
use crate::message_log::{Direction, MessageLog, PendingMessage};
use futures::future::BoxFuture;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Upload pending outgoing messages, one folder per conversation.
///
/// Folders are created on demand. Whether a folder exists is decided
/// against a single LIST taken at the start of the run, updated in
/// memory as folders are created. The UIDs the store assigns are
/// handed back to the [`MessageLog`].
pub struct PushTask {
    log: Arc<dyn MessageLog>,
    folder_prefix: String,
    user_address: String,
}

impl PushTask {
    #[must_use]
    pub fn new(log: Arc<dyn MessageLog>, folder_prefix: impl Into<String>) -> Self {
        Self {
            log,
            folder_prefix: folder_prefix.into(),
            user_address: ANONYMOUS_ADDRESS.to_string(),
        }
    }

    /// Address used for the local side of every envelope.
    #[must_use]
    pub fn with_user_address(mut self, address: impl Into<String>) -> Self {
        self.user_address = address.into();
        self
    }

    async fn run(self, session: &mut CmsSession) -> Result<TaskOutput> {
        let pending = self.log.pending_messages()?;
        if pending.is_empty() {
            info!("No pending messages to push");
            return Ok(TaskOutput::Pushed(HashMap::new()));
        }

        let mut known: HashSet<String> =
            session.list().await?.into_iter().map(|e| e.name).collect();
        let mut uids = HashMap::with_capacity(pending.len());

        for message in &pending {
            if let Err(e) = self.push_one(session, &mut known, &mut uids, message).await {
                if e.is_transient() {
                    error!(
                        "Aborting push after {} of {} message(s): {}",
                        uids.len(),
                        pending.len(),
                        e
                    );
                    if !uids.is_empty()
                        && let Err(record) = self.log.record_uids(&uids)
                    {
                        error!("Could not record partial UIDs: {}", record);
                    }
                    return Err(e);
                }
                warn!("Skipping message {} for {}: {}", message.id, message.contact, e);
            }
        }

        self.log.record_uids(&uids)?;
        info!("Pushed {} of {} message(s)", uids.len(), pending.len());
        Ok(TaskOutput::Pushed(uids))
    }

    async fn push_one(
        &self,
        session: &mut CmsSession,
        known: &mut HashSet<String>,
        uids: &mut HashMap<String, u32>,
        message: &PendingMessage,
    ) -> Result<()> {
        check_quotable(&message.contact)?;
        let folder = conversation_folder(&self.folder_prefix, &message.contact);
        if !known.contains(&folder) {
            session.create(&folder).await?;
            debug!("Created {}", folder);
            known.insert(folder.clone());
        }

        let envelope = self.envelope(message)?.serialize();
        let flags: &[Flag] = if message.read { &[Flag::Seen] } else { &[] };

        match session.append(&folder, flags, envelope.as_bytes()).await? {
            Some(uid) => {
                debug!("Appended {} to {} as UID {}", message.id, folder, uid);
                uids.insert(message.id.clone(), uid);
                Ok(())
            }
            None => {
                warn!(
                    "Server assigned no UID to {} in {} (UIDPLUS missing?)",
                    message.id, folder
                );
                Ok(())
            }
        }
    }

    fn envelope(&self, message: &PendingMessage) -> Result<CpimMessage> {
        let contact = contact_address(&message.contact);
        let (from, to) = match message.direction {
            Direction::Outgoing => (self.user_address.as_str(), contact.as_str()),
            Direction::Incoming => (contact.as_str(), self.user_address.as_str()),
        };
        CpimMessage::text(from, to, message.timestamp, message.content.as_str())
    }
}

impl Task for PushTask {
    fn name(&self) -> &'static str {
        "push"
    }

    fn execute<'a>(
        self: Box<Self>,
        session: &'a mut CmsSession,
    ) -> BoxFuture<'a, Result<TaskOutput>> {
        Box::pin(self.run(session))
    }
}

/// Bare numbers become `tel:` URIs; anything with a scheme is kept.
fn contact_address(contact: &str) -> String {
    if contact.contains(':') {
        contact.to_string()
    } else {
        format!("tel:{contact}")
    }
}
