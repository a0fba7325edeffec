//! Local message-log collaborator
//!
//! The engine never stores message records itself. A [`MessageLog`]
//! hands the push task the outgoing messages still waiting for a
//! remote copy and receives the resulting local-id to UID map.

use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Incoming,
    Outgoing,
}

/// A message known locally but not yet stored remotely.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingMessage {
    pub id: String,
    /// Remote party, usually a phone number.
    pub contact: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    pub direction: Direction,
    #[serde(default)]
    pub read: bool,
}

pub trait MessageLog: Send + Sync {
    /// Messages to upload, in the order they should be appended.
    ///
    /// # Errors
    ///
    /// Returns an error if the log cannot be read.
    fn pending_messages(&self) -> Result<Vec<PendingMessage>>;

    /// Persist the remote UIDs assigned to local messages.
    ///
    /// # Errors
    ///
    /// Returns an error if the mapping cannot be stored.
    fn record_uids(&self, uids: &HashMap<String, u32>) -> Result<()>;
}

/// File-backed [`MessageLog`]: pending messages are read from a JSON
/// array, the UID map is written as a JSON object.
#[derive(Debug, Clone)]
pub struct JsonMessageLog {
    pending: PathBuf,
    uids: PathBuf,
}

impl JsonMessageLog {
    #[must_use]
    pub fn new(pending: impl Into<PathBuf>, uids: impl Into<PathBuf>) -> Self {
        Self {
            pending: pending.into(),
            uids: uids.into(),
        }
    }

    /// Write the UID map next to the pending file as `<stem>.uids.json`.
    #[must_use]
    pub fn beside(pending: impl Into<PathBuf>) -> Self {
        let pending = pending.into();
        let uids = pending.with_extension("uids.json");
        Self { pending, uids }
    }

    #[must_use]
    pub fn uids_path(&self) -> &Path {
        &self.uids
    }
}

impl MessageLog for JsonMessageLog {
    fn pending_messages(&self) -> Result<Vec<PendingMessage>> {
        let raw = std::fs::read_to_string(&self.pending).map_err(|e| {
            Error::MessageLog(format!("Cannot read {}: {e}", self.pending.display()))
        })?;
        let messages: Vec<PendingMessage> = serde_json::from_str(&raw).map_err(|e| {
            Error::MessageLog(format!("Invalid pending file {}: {e}", self.pending.display()))
        })?;
        debug!(
            "Loaded {} pending message(s) from {}",
            messages.len(),
            self.pending.display()
        );
        Ok(messages)
    }

    fn record_uids(&self, uids: &HashMap<String, u32>) -> Result<()> {
        // Sorted output keeps the file diffable between runs.
        let sorted: BTreeMap<_, _> = uids.iter().collect();
        let json = serde_json::to_string_pretty(&sorted)
            .map_err(|e| Error::MessageLog(e.to_string()))?;
        std::fs::write(&self.uids, json).map_err(|e| {
            Error::MessageLog(format!("Cannot write {}: {e}", self.uids.display()))
        })?;
        debug!("Recorded {} UID(s) to {}", uids.len(), self.uids.display());
        Ok(())
    }
}
