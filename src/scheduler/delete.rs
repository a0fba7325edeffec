use super::{Task, TaskOutput};
use crate::error::Result;
use crate::imap::{CmsSession, MailboxEntry};
use futures::future::BoxFuture;
use tracing::{debug, info};

/// The three mutually exclusive delete operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteOperation {
    /// Every visible folder except `INBOX`, children first.
    AllMailboxes,
    Mailbox(String),
    /// Select the folder and expunge messages already flagged
    /// `\Deleted`.
    ExpungeMailbox(String),
}

#[derive(Debug, Clone)]
pub struct DeleteTask {
    operation: DeleteOperation,
}

impl DeleteTask {
    #[must_use]
    pub const fn new(operation: DeleteOperation) -> Self {
        Self { operation }
    }

    #[must_use]
    pub const fn all_mailboxes() -> Self {
        Self::new(DeleteOperation::AllMailboxes)
    }

    #[must_use]
    pub fn mailbox(name: impl Into<String>) -> Self {
        Self::new(DeleteOperation::Mailbox(name.into()))
    }

    #[must_use]
    pub fn expunge(name: impl Into<String>) -> Self {
        Self::new(DeleteOperation::ExpungeMailbox(name.into()))
    }

    #[must_use]
    pub const fn operation(&self) -> &DeleteOperation {
        &self.operation
    }

    async fn run(self, session: &mut CmsSession) -> Result<TaskOutput> {
        match self.operation {
            DeleteOperation::AllMailboxes => {
                let order = deletion_order(session.list().await?);
                info!("Deleting {} folder(s)", order.len());
                let mut deleted = Vec::with_capacity(order.len());
                for name in order {
                    session.delete(&name).await?;
                    debug!("Deleted {}", name);
                    deleted.push(name);
                }
                Ok(TaskOutput::Deleted(deleted))
            }
            DeleteOperation::Mailbox(name) => {
                session.delete(&name).await?;
                info!("Deleted {}", name);
                Ok(TaskOutput::Deleted(vec![name]))
            }
            DeleteOperation::ExpungeMailbox(name) => {
                session.select(&name).await?;
                let expunged = session.expunge().await?;
                info!("Expunged {} message(s) from {}", expunged.len(), name);
                Ok(TaskOutput::Expunged(expunged))
            }
        }
    }
}

impl Task for DeleteTask {
    fn name(&self) -> &'static str {
        match self.operation {
            DeleteOperation::AllMailboxes => "delete-all",
            DeleteOperation::Mailbox(_) => "delete-mailbox",
            DeleteOperation::ExpungeMailbox(_) => "expunge-mailbox",
        }
    }

    fn execute<'a>(
        self: Box<Self>,
        session: &'a mut CmsSession,
    ) -> BoxFuture<'a, Result<TaskOutput>> {
        Box::pin(self.run(session))
    }
}

/// Deepest folders first, listing order among equals. `INBOX` cannot
/// be deleted and is left out.
fn deletion_order(mut entries: Vec<MailboxEntry>) -> Vec<String> {
    entries.retain(|e| !e.name.eq_ignore_ascii_case("INBOX"));
    entries.sort_by_key(|e| std::cmp::Reverse(e.depth()));
    entries.into_iter().map(|e| e.name).collect()
}
