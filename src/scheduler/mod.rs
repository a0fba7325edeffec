//! Task scheduler
//!
//! A [`Scheduler`] owns one open [`CmsSession`] and runs queued tasks
//! against it strictly one after another. Every task ends in exactly
//! one [`TaskReport`]: returned from [`Scheduler::run_all`] and, when a
//! completion channel is attached, also sent over it. Errors and
//! panics inside a task become failure reports; they never abort the
//! remaining queue.

mod delete;
mod push;
mod show;

pub use delete::{DeleteOperation, DeleteTask};
pub use push::PushTask;
pub use show::ShowTask;

use crate::config::CmsConfig;
use crate::error::{Error, ErrorKind, Result};
use crate::imap::{CmsSession, RemoteMessage, connect};
use futures::FutureExt;
use futures::future::BoxFuture;
use serde::Serialize;
use std::any::Any;
use std::collections::{HashMap, VecDeque};
use std::panic::AssertUnwindSafe;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{error, info, warn};

/// One unit of synchronization work, consumed by a single execution.
pub trait Task: Send {
    fn name(&self) -> &'static str;

    /// Run to completion on `session`.
    fn execute<'a>(self: Box<Self>, session: &'a mut CmsSession)
    -> BoxFuture<'a, Result<TaskOutput>>;
}

/// What a successful task produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase", tag = "type", content = "data")]
pub enum TaskOutput {
    /// Folders removed, in deletion order.
    Deleted(Vec<String>),
    /// Sequence numbers removed by an expunge.
    Expunged(Vec<u32>),
    /// Local message id to remote UID.
    Pushed(HashMap<String, u32>),
    Listed(Vec<RemoteMessage>),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskFailure {
    pub kind: ErrorKind,
    pub message: String,
}

impl From<&Error> for TaskFailure {
    fn from(err: &Error) -> Self {
        Self {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

/// Completion of one task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskReport {
    pub task: &'static str,
    pub result: std::result::Result<TaskOutput, TaskFailure>,
}

impl TaskReport {
    #[must_use]
    pub const fn succeeded(&self) -> bool {
        self.result.is_ok()
    }

    #[must_use]
    pub fn output(&self) -> Option<&TaskOutput> {
        self.result.as_ref().ok()
    }

    #[must_use]
    pub fn failure(&self) -> Option<&TaskFailure> {
        self.result.as_ref().err()
    }
}

pub struct Scheduler {
    session: CmsSession,
    queue: VecDeque<Box<dyn Task>>,
    completion: Option<UnboundedSender<TaskReport>>,
}

impl Scheduler {
    #[must_use]
    pub fn new(session: CmsSession) -> Self {
        Self {
            session,
            queue: VecDeque::new(),
            completion: None,
        }
    }

    /// Connect with `config` and wrap the new session.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection or login fails.
    pub async fn connect(config: &CmsConfig) -> Result<Self> {
        Ok(Self::new(connect(config).await?))
    }

    /// Also deliver every report over `sender`.
    #[must_use]
    pub fn with_completion(mut self, sender: UnboundedSender<TaskReport>) -> Self {
        self.completion = Some(sender);
        self
    }

    pub fn submit(&mut self, task: impl Task + 'static) {
        self.queue.push_back(Box::new(task));
    }

    #[must_use]
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Drain the queue in submission order.
    pub async fn run_all(&mut self) -> Vec<TaskReport> {
        let mut reports = Vec::with_capacity(self.queue.len());
        while let Some(task) = self.queue.pop_front() {
            reports.push(self.execute(task).await);
        }
        reports
    }

    /// Run `task` now, ahead of anything queued.
    pub async fn run_one(&mut self, task: impl Task + 'static) -> TaskReport {
        self.execute(Box::new(task)).await
    }

    #[must_use]
    pub const fn session(&self) -> &CmsSession {
        &self.session
    }

    pub fn into_session(self) -> CmsSession {
        self.session
    }

    async fn execute(&mut self, task: Box<dyn Task>) -> TaskReport {
        let name = task.name();
        info!("Running task {}", name);

        let outcome = AssertUnwindSafe(task.execute(&mut self.session))
            .catch_unwind()
            .await;
        let result = match outcome {
            Ok(Ok(output)) => {
                info!("Task {} succeeded", name);
                Ok(output)
            }
            Ok(Err(e)) => {
                error!("Task {} failed ({:?}): {}", name, e.kind(), e);
                Err(TaskFailure::from(&e))
            }
            Err(panic) => {
                let e = Error::TaskPanicked(panic_message(panic.as_ref()));
                error!("Task {} panicked: {}", name, e);
                Err(TaskFailure::from(&e))
            }
        };

        let report = TaskReport { task: name, result };
        if let Some(sender) = &self.completion
            && sender.send(report.clone()).is_err()
        {
            warn!("Completion receiver dropped, report for {} not delivered", name);
        }
        report
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(ToString::to_string)
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}
