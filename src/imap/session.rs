//! One authenticated CMS connection
//!
//! [`CmsSession`] tags commands, writes them, and reads responses
//! (including counted literals) until the matching tagged completion.
//! Each command method turns the untagged lines into typed results.
//! A session serves one task at a time; it is `Send` but not shared.

use super::connection::{bounded, tls_handshake};
use super::fetch::RemoteMessage;
use super::response::{self, MailboxEntry, ResponseLine, Status, check_quotable, quote};
use crate::error::{Error, Result};
use crate::flag::Flag;
use crate::folder::{Counter, CounterMap, Folder};
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::{debug, info, warn};

/// Largest literal accepted from the server.
const MAX_LITERAL: usize = 64 * 1024 * 1024;

/// Largest response line accepted from the server, literals excluded.
const MAX_LINE: usize = 64 * 1024;

/// Any bidirectional byte stream a session can run over.
pub trait ImapStream: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send> ImapStream for T {}

/// Untagged lines of a successful command plus the text after the
/// tagged `OK`.
#[derive(Debug, Clone, Default)]
pub struct Reply {
    pub untagged: Vec<ResponseLine>,
    pub completion: String,
}

impl Reply {
    fn texts(&self) -> impl Iterator<Item = &str> + Clone {
        self.untagged.iter().map(|l| l.text.as_str())
    }
}

pub struct CmsSession {
    stream: BufReader<Box<dyn ImapStream>>,
    timeout: Duration,
    tag_counter: u32,
    capabilities: HashSet<String>,
    selected: Option<String>,
    logged_out: bool,
}

impl CmsSession {
    /// Wrap an already-connected stream. The greeting has not been read.
    #[must_use]
    pub fn new(stream: Box<dyn ImapStream>, timeout: Duration) -> Self {
        Self {
            stream: BufReader::new(stream),
            timeout,
            tag_counter: 0,
            capabilities: HashSet::new(),
            selected: None,
            logged_out: false,
        }
    }

    // -- connection lifecycle --

    /// Read and check the server greeting.
    pub async fn read_greeting(&mut self) -> Result<()> {
        let line = self.read_response().await?;
        if let Some(caps) = response::parse_capabilities(&line.text) {
            self.capabilities = caps.into_iter().collect();
        }

        if line.text.starts_with("* OK") || line.text.starts_with("* PREAUTH") {
            debug!("S: {}", line.text);
            Ok(())
        } else if line.text.starts_with("* BYE") {
            Err(Error::Protocol(format!(
                "Server refused connection: {}",
                line.text
            )))
        } else {
            Err(Error::Protocol(format!("Unexpected greeting: {}", line.text)))
        }
    }

    /// Issue `STARTTLS` and continue the session over TLS.
    pub async fn starttls(mut self, host: &str, ca_file: Option<&Path>) -> Result<Self> {
        self.run("STARTTLS").await?;
        let timeout = self.timeout;
        let plain = self.stream.into_inner();
        let tls = tls_handshake(plain, host, ca_file, timeout).await?;
        debug!("STARTTLS negotiated");
        Ok(Self::new(Box::new(tls), timeout))
    }

    /// Authenticate with `LOGIN`, then refresh the capability set.
    pub async fn login(&mut self, username: &str, password: &str) -> Result<()> {
        debug!("Logging in as {}", username);
        let credentials = format!("{} {}", quote(username)?, quote(password)?);
        self.ensure_open()?;
        let tag = self.next_tag();
        self.send(format!("{tag} LOGIN {credentials}\r\n").as_bytes())
            .await?;
        self.collect(&tag, "LOGIN").await?;

        self.refresh_capabilities().await?;
        info!("Authenticated as {}", username);
        Ok(())
    }

    pub async fn refresh_capabilities(&mut self) -> Result<()> {
        self.run("CAPABILITY").await?;
        Ok(())
    }

    #[must_use]
    pub fn has_capability(&self, capability: &str) -> bool {
        self.capabilities
            .contains(&capability.to_ascii_uppercase())
    }

    pub fn capabilities(&self) -> impl Iterator<Item = &str> {
        self.capabilities.iter().map(String::as_str)
    }

    #[must_use]
    pub fn selected_folder(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    #[must_use]
    pub const fn is_logged_out(&self) -> bool {
        self.logged_out
    }

    /// Send `LOGOUT` and shut the stream down. Further commands fail
    /// with [`Error::ConnectionClosed`].
    pub async fn logout(&mut self) -> Result<()> {
        if self.logged_out {
            return Ok(());
        }
        let result = self.run("LOGOUT").await.map(|_| ());
        self.logged_out = true;
        self.selected = None;
        let timeout = self.timeout;
        if let Err(e) = bounded(timeout, self.stream.get_mut().shutdown()).await {
            debug!("Stream shutdown after LOGOUT failed: {}", e);
        }
        result
    }

    /// Best-effort [`logout`](Self::logout) that never fails.
    pub async fn close(&mut self) {
        if let Err(e) = self.logout().await {
            debug!("Ignoring error while closing session: {}", e);
        }
        self.logged_out = true;
    }

    // -- folder commands --

    /// Plain `SELECT`. Counters the server volunteers are kept, but
    /// the snapshot is never marked consistent.
    pub async fn select(&mut self, folder: &str) -> Result<Folder> {
        self.selected = None;
        let reply = self.run(&format!("SELECT {}", quote(folder)?)).await?;
        self.selected = Some(folder.to_string());
        Ok(Folder::from_select_response(folder, reply.texts(), false))
    }

    /// `SELECT … (CONDSTORE)`. Returns `None` without touching the
    /// connection when the server does not advertise CONDSTORE.
    pub async fn select_condstore(&mut self, folder: &str) -> Result<Option<Folder>> {
        if !self.has_capability("CONDSTORE") {
            debug!("CONDSTORE not advertised, skipping SELECT CONDSTORE on {}", folder);
            return Ok(None);
        }
        self.selected = None;
        let reply = self
            .run(&format!("SELECT {} (CONDSTORE)", quote(folder)?))
            .await?;
        self.selected = Some(folder.to_string());
        Ok(Some(Folder::from_select_response(folder, reply.texts(), true)))
    }

    /// CONDSTORE select when available, plain select otherwise.
    pub async fn select_best(&mut self, folder: &str) -> Result<Folder> {
        match self.select_condstore(folder).await? {
            Some(snapshot) => Ok(snapshot),
            None => self.select(folder).await,
        }
    }

    /// `LIST "" "*"`.
    pub async fn list(&mut self) -> Result<Vec<MailboxEntry>> {
        let reply = self.run("LIST \"\" \"*\"").await?;
        Ok(reply
            .untagged
            .iter()
            .filter_map(response::parse_list)
            .collect())
    }

    /// LIST followed by STATUS on every selectable folder.
    pub async fn list_status(&mut self) -> Result<Vec<Folder>> {
        let entries = self.list().await?;
        let items = if self.has_capability("CONDSTORE") {
            "(MESSAGES UIDNEXT UIDVALIDITY HIGHESTMODSEQ)"
        } else {
            "(MESSAGES UIDNEXT UIDVALIDITY)"
        };

        let mut folders = Vec::with_capacity(entries.len());
        for entry in entries.iter().filter(|e| e.is_selectable()) {
            let reply = self
                .run(&format!("STATUS {} {items}", quote(&entry.name)?))
                .await?;

            let mut counters = CounterMap::new();
            let mut messages = None;
            for (name, pairs) in reply.untagged.iter().filter_map(response::parse_status) {
                if name != entry.name {
                    continue;
                }
                for (key, value) in pairs {
                    if key == "MESSAGES" {
                        messages = u32::try_from(value).ok();
                    } else if let Some(counter) = Counter::parse(&key) {
                        counters.insert(counter, value);
                    }
                }
            }
            folders.push(Folder::from_counters(&entry.name, &counters, messages, false));
        }
        Ok(folders)
    }

    pub async fn create(&mut self, folder: &str) -> Result<()> {
        self.run(&format!("CREATE {}", quote(folder)?)).await?;
        Ok(())
    }

    pub async fn delete(&mut self, folder: &str) -> Result<()> {
        self.run(&format!("DELETE {}", quote(folder)?)).await?;
        if self.selected.as_deref() == Some(folder) {
            self.selected = None;
        }
        Ok(())
    }

    // -- message commands --

    /// `APPEND` `body` to `folder`. Returns the server-assigned UID
    /// when the server reports one (`APPENDUID`, UIDPLUS).
    pub async fn append(&mut self, folder: &str, flags: &[Flag], body: &[u8]) -> Result<Option<u32>> {
        let command = format!(
            "APPEND {} {} {{{}}}",
            quote(folder)?,
            Flag::list(flags),
            body.len()
        );
        self.ensure_open()?;
        let tag = self.next_tag();
        debug!("C: {} {}", tag, command);
        self.send(format!("{tag} {command}\r\n").as_bytes()).await?;

        loop {
            let line = self.read_response().await?;
            if line.text.starts_with('+') {
                break;
            }
            if let Some((status, detail)) = response::tagged_status(&line.text, &tag) {
                return Err(match status {
                    Status::Ok => Error::Protocol("APPEND completed without continuation".into()),
                    _ => Error::Command {
                        command: "APPEND".into(),
                        status: status.as_str().into(),
                        text: detail.to_string(),
                    },
                });
            }
        }

        let mut payload = Vec::with_capacity(body.len() + 2);
        payload.extend_from_slice(body);
        payload.extend_from_slice(b"\r\n");
        self.send(&payload).await?;

        let reply = self.collect(&tag, "APPEND").await?;
        Ok(response::parse_append_uid(&reply.completion))
    }

    /// Permanently remove `\Deleted` messages from the selected folder.
    /// Returns the expunged sequence numbers.
    pub async fn expunge(&mut self) -> Result<Vec<u32>> {
        if self.selected.is_none() {
            return Err(Error::NoMailboxSelected);
        }
        let reply = self.run("EXPUNGE").await?;
        Ok(reply
            .untagged
            .iter()
            .filter_map(|l| response::parse_expunge(&l.text))
            .collect())
    }

    /// `UID STORE uid +FLAGS.SILENT (…)` on the selected folder.
    pub async fn add_flags(&mut self, uid: u32, flags: &[Flag]) -> Result<()> {
        if self.selected.is_none() {
            return Err(Error::NoMailboxSelected);
        }
        self.run(&format!("UID STORE {uid} +FLAGS.SILENT {}", Flag::list(flags)))
            .await?;
        Ok(())
    }

    /// Fetch UID, flags and full body of every message in the selected
    /// folder, tagged with that folder's name.
    pub async fn fetch_all(&mut self) -> Result<Vec<RemoteMessage>> {
        let Some(folder) = self.selected.clone() else {
            return Err(Error::NoMailboxSelected);
        };
        let reply = self.run("UID FETCH 1:* (UID FLAGS BODY.PEEK[])").await?;

        let mut messages = Vec::new();
        for item in reply.untagged.iter().filter_map(response::parse_fetch) {
            let (Some(uid), Some(body)) = (item.uid, item.body) else {
                warn!(
                    "Skipping FETCH {} in {} without UID or body",
                    item.sequence, folder
                );
                continue;
            };
            messages.push(RemoteMessage {
                folder: folder.clone(),
                uid,
                flags: item.flags.iter().map(|f| Flag::parse(f)).collect(),
                body: String::from_utf8_lossy(&body).into_owned(),
            });
        }
        Ok(messages)
    }

    // -- wire helpers --

    fn next_tag(&mut self) -> String {
        self.tag_counter += 1;
        format!("A{:04}", self.tag_counter)
    }

    fn ensure_open(&self) -> Result<()> {
        if self.logged_out {
            Err(Error::ConnectionClosed)
        } else {
            Ok(())
        }
    }

    /// Run one command without literals and wait for its completion.
    pub async fn run(&mut self, command: &str) -> Result<Reply> {
        check_quotable(command)?;
        self.ensure_open()?;
        let tag = self.next_tag();
        debug!("C: {} {}", tag, command);
        self.send(format!("{tag} {command}\r\n").as_bytes()).await?;

        let name = command.split_whitespace().next().unwrap_or(command);
        self.collect(&tag, &name.to_ascii_uppercase()).await
    }

    /// Read until the tagged completion for `tag`.
    async fn collect(&mut self, tag: &str, command: &str) -> Result<Reply> {
        let mut untagged = Vec::new();
        loop {
            let line = self.read_response().await?;

            if let Some((status, detail)) = response::tagged_status(&line.text, tag) {
                let detail = detail.to_string();
                debug!("S: {} {} {}", tag, status.as_str(), detail);
                if let Some(caps) = response::parse_capabilities(&detail) {
                    self.capabilities = caps.into_iter().collect();
                }
                return match status {
                    Status::Ok => Ok(Reply {
                        untagged,
                        completion: detail,
                    }),
                    Status::No | Status::Bad => Err(Error::Command {
                        command: command.to_string(),
                        status: status.as_str().to_string(),
                        text: detail,
                    }),
                };
            }

            if line.text.starts_with("* BYE") && command != "LOGOUT" {
                warn!("Server closed the connection: {}", line.text);
                self.logged_out = true;
                self.selected = None;
                return Err(Error::ConnectionClosed);
            }
            if line.text.starts_with('+') {
                return Err(Error::Protocol(format!(
                    "Unexpected continuation during {command}"
                )));
            }
            if line.text.starts_with("* CAPABILITY ") {
                if let Some(caps) = response::parse_capabilities(&line.text) {
                    self.capabilities = caps.into_iter().collect();
                }
            }
            untagged.push(line);
        }
    }

    /// Once a read or write fails the stream position is unknown, so
    /// the session refuses every later command.
    fn poison_on_error<T>(&mut self, result: Result<T>) -> Result<T> {
        if let Err(e) = &result
            && !self.logged_out
        {
            warn!("Closing session after wire failure: {}", e);
            self.logged_out = true;
            self.selected = None;
        }
        result
    }

    async fn send(&mut self, data: &[u8]) -> Result<()> {
        let timeout = self.timeout;
        let stream = self.stream.get_mut();
        let result = bounded(timeout, async {
            stream.write_all(data).await?;
            stream.flush().await
        })
        .await;
        self.poison_on_error(result)
    }

    async fn read_line(&mut self) -> Result<String> {
        let mut buf = Vec::new();
        let limit = u64::try_from(MAX_LINE + 1).unwrap_or(u64::MAX);
        let n = bounded(
            self.timeout,
            (&mut self.stream).take(limit).read_until(b'\n', &mut buf),
        )
        .await?;
        if n > MAX_LINE {
            return Err(Error::Protocol(format!(
                "Response line exceeds {MAX_LINE} bytes"
            )));
        }
        if n == 0 || !buf.ends_with(b"\n") {
            return Err(Error::ConnectionClosed);
        }
        buf.pop();
        if buf.ends_with(b"\r") {
            buf.pop();
        }
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }

    /// Read one response line together with any literals it announces.
    async fn read_response(&mut self) -> Result<ResponseLine> {
        let result = self.read_framed().await;
        self.poison_on_error(result)
    }

    async fn read_framed(&mut self) -> Result<ResponseLine> {
        let first = self.read_line().await?;
        let mut pending = response::trailing_literal(&first);
        let mut line = ResponseLine::new(first);

        while let Some(len) = pending {
            if len > MAX_LITERAL {
                return Err(Error::Protocol(format!(
                    "Literal of {len} bytes exceeds limit"
                )));
            }
            let mut literal = vec![0u8; len];
            bounded(self.timeout, self.stream.read_exact(&mut literal)).await?;
            line.literals.push(literal);

            let rest = self.read_line().await?;
            pending = response::trailing_literal(&rest);
            line.text.push_str(&rest);
        }
        Ok(line)
    }
}
