use super::{Task, TaskOutput};
use crate::error::Result;
use crate::imap::{CmsSession, RemoteMessage};
use futures::future::BoxFuture;
use tracing::{debug, info, warn};

/// Fetch every message of every folder, then close the session.
#[derive(Debug, Clone, Copy, Default)]
pub struct ShowTask;

impl ShowTask {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// A folder the server refuses to select or fetch is skipped;
    /// only network failures end the listing.
    async fn collect(session: &mut CmsSession) -> Result<Vec<RemoteMessage>> {
        let mut messages = Vec::new();
        for entry in session.list().await? {
            if !entry.is_selectable() {
                debug!("Skipping non-selectable {}", entry.name);
                continue;
            }
            match Self::collect_folder(session, &entry.name).await {
                Ok(fetched) => messages.extend(fetched),
                Err(e) if e.is_transient() => return Err(e),
                Err(e) => warn!("Skipping folder {}: {}", entry.name, e),
            }
        }
        Ok(messages)
    }

    async fn collect_folder(session: &mut CmsSession, name: &str) -> Result<Vec<RemoteMessage>> {
        let folder = session.select_best(name).await?;
        if folder.is_empty() {
            debug!("Skipping empty {}", name);
            return Ok(Vec::new());
        }
        let fetched = session.fetch_all().await?;
        debug!("Fetched {} message(s) from {}", fetched.len(), name);
        Ok(fetched)
    }
}

impl Task for ShowTask {
    fn name(&self) -> &'static str {
        "show"
    }

    fn execute<'a>(
        self: Box<Self>,
        session: &'a mut CmsSession,
    ) -> BoxFuture<'a, Result<TaskOutput>> {
        Box::pin(async move {
            let result = Self::collect(session).await;
            session.close().await;
            let messages = result?;
            info!("Listed {} message(s)", messages.len());
            Ok(TaskOutput::Listed(messages))
        })
    }
}
