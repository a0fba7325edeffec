//! Error types for cms-sync
//!
//! Every failure belongs to one of two boundary kinds. Network
//! failures (I/O, timeouts, TLS, a dropped connection) are transient
//! and may be retried by whoever drives the scheduler. Payload
//! failures (rejected commands, malformed responses, envelopes or XML
//! documents) are not retried.

use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    #[error("Connection closed by server")]
    ConnectionClosed,

    #[error("TLS error: {0}")]
    Tls(String),

    #[error("{command} rejected: {status} {text}")]
    Command {
        command: String,
        status: String,
        text: String,
    },

    #[error("Unexpected server response: {0}")]
    Protocol(String),

    #[error("Cannot send {0:?} as an IMAP string")]
    InvalidString(String),

    #[error("No mailbox selected")]
    NoMailboxSelected,

    #[error("CPIM error: {0}")]
    Cpim(String),

    #[error("XML error: {0}")]
    Xml(String),

    #[error("Message log error: {0}")]
    MessageLog(String),

    #[error("Task aborted: {0}")]
    TaskPanicked(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Boundary classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorKind {
    /// Connection, I/O or timeout failure. Retryable at a higher level.
    Network,
    /// Malformed or rejected data. Not retried.
    Payload,
    /// Invalid local configuration.
    Config,
}

impl Error {
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Io(_) | Self::Timeout(_) | Self::ConnectionClosed | Self::Tls(_) => {
                ErrorKind::Network
            }
            Self::Config(_) => ErrorKind::Config,
            Self::Command { .. }
            | Self::Protocol(_)
            | Self::InvalidString(_)
            | Self::NoMailboxSelected
            | Self::Cpim(_)
            | Self::Xml(_)
            | Self::MessageLog(_)
            | Self::TaskPanicked(_) => ErrorKind::Payload,
        }
    }

    /// Whether retrying the whole operation later may succeed.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self.kind(), ErrorKind::Network)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
