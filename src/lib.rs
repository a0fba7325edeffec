//! Converged Message Store synchronization engine
//!
//! Keeps a device's message history in step with a remote CMS reached
//! over IMAP. The crate covers:
//!
//! - the transport and command layer ([`imap`]): connect, TLS or
//!   STARTTLS, CONDSTORE-aware SELECT, LIST/STATUS, APPEND, EXPUNGE,
//!   DELETE, FETCH
//! - the [`CpimMessage`] envelope codec
//! - CPM session and group-state XML metadata ([`xml`])
//! - a [`Scheduler`] running delete, push and show tasks on one
//!   connection with per-task failure isolation
//!
//! ```no_run
//! use cms_sync::{CmsConfig, DeleteTask, Scheduler};
//!
//! # async fn run() -> cms_sync::Result<()> {
//! let config = CmsConfig::from_env()?;
//! let mut scheduler = Scheduler::connect(&config).await?;
//! scheduler.submit(DeleteTask::expunge("Default/+33642639381"));
//! for report in scheduler.run_all().await {
//!     println!("{}: {}", report.task, report.succeeded());
//! }
//! # Ok(())
//! # }
//! ```

mod config;
pub mod cpim;
mod error;
mod flag;
mod folder;
pub mod imap;
mod message_log;
mod scheduler;
pub mod xml;

pub use config::{ANONYMOUS_ADDRESS, CmsConfig, Security};
pub use cpim::{Body, CpimMessage, Headers, TextBody};
pub use error::{Error, ErrorKind, Result};
pub use flag::Flag;
pub use folder::{Counter, CounterMap, Folder, SyncStrategy, contact_of, conversation_folder};
pub use imap::{CmsSession, MailboxEntry, RemoteMessage, connect};
pub use message_log::{Direction, JsonMessageLog, MessageLog, PendingMessage};
pub use scheduler::{
    DeleteOperation, DeleteTask, PushTask, Scheduler, ShowTask, Task, TaskFailure, TaskOutput,
    TaskReport,
};
pub use xml::{CpmSession, GroupParticipant, GroupState};
