//! In-process fake CMS server
//!
//! ## Connection lifecycle
//!
//! ```text
//!   Plain:     TCP -> "* OK" greeting -> commands
//!   Tls:       TCP -> TLS handshake -> "* OK" greeting -> commands
//!   StartTls:  TCP -> "* OK" greeting -> STARTTLS -> TLS handshake -> commands
//! ```
//!
//! ## Command format
//!
//! Every client command starts with a tag the server echoes in its
//! completion. Untagged `*` lines carry data before the completion:
//!
//! ```text
//!   Client:  A0003 SELECT "Default/+331" (CONDSTORE)
//!   Server:  * 2 EXISTS
//!   Server:  * OK [UIDVALIDITY 1001] UIDs valid
//!   Server:  * OK [HIGHESTMODSEQ 7] Highest
//!   Server:  A0003 OK [READ-WRITE] SELECT completed
//! ```
//!
//! ## APPEND and literals
//!
//! APPEND announces its message as a counted literal `{n}`. The server
//! answers with a `+` continuation, then reads exactly `n` bytes
//! followed by the line end before completing the command.

use super::handlers::{
    handle_append, handle_capability, handle_create, handle_delete, handle_expunge, handle_list,
    handle_login, handle_logout, handle_select, handle_status, handle_uid_fetch, handle_uid_store,
};
use super::io::write_line;
use super::store::Store;
use rcgen::generate_simple_self_signed;
use rustls::pki_types::PrivatePkcs8KeyDer;
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio_rustls::TlsAcceptor;

/// How the server secures connections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Plain,
    Tls,
    StartTls,
}

/// A fake CMS on `127.0.0.1` with an OS-assigned port.
///
/// A self-signed certificate for `127.0.0.1` is generated at startup
/// with `rcgen`. All connections share one [`Store`]; tests inspect
/// it afterwards with [`snapshot`](Self::snapshot).
pub struct FakeCmsServer {
    port: u16,
    store: Arc<Mutex<Store>>,
    handle: tokio::task::JoinHandle<()>,
}

impl FakeCmsServer {
    pub async fn start(store: Store, mode: Mode) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind to ephemeral port");
        let port = listener.local_addr().unwrap().port();

        let acceptor = tls_acceptor();
        let store = Arc::new(Mutex::new(store));

        let shared = store.clone();
        let handle = tokio::spawn(async move {
            loop {
                let Ok((stream, _addr)) = listener.accept().await else {
                    break;
                };
                let acceptor = acceptor.clone();
                let store = shared.clone();
                tokio::spawn(async move {
                    handle_connection(stream, mode, acceptor, &store).await;
                });
            }
        });

        Self {
            port,
            store,
            handle,
        }
    }

    pub async fn plain(store: Store) -> Self {
        Self::start(store, Mode::Plain).await
    }

    pub const fn port(&self) -> u16 {
        self.port
    }

    /// Current server-side state.
    pub fn snapshot(&self) -> Store {
        self.store.lock().unwrap().clone()
    }
}

impl Drop for FakeCmsServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn tls_acceptor() -> TlsAcceptor {
    let cert = generate_simple_self_signed(vec!["127.0.0.1".to_string()])
        .expect("generate self-signed cert");
    let cert_der = cert.cert.der().clone();
    let key_der = PrivatePkcs8KeyDer::from(cert.key_pair.serialize_der());

    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let config = rustls::ServerConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .expect("protocol versions")
        .with_no_client_auth()
        .with_single_cert(vec![cert_der], key_der.into())
        .expect("build server TLS config");
    TlsAcceptor::from(Arc::new(config))
}

const GREETING: &str = "* OK Fake CMS ready\r\n";

async fn handle_connection(
    stream: TcpStream,
    mode: Mode,
    acceptor: TlsAcceptor,
    store: &Mutex<Store>,
) {
    match mode {
        Mode::Plain => {
            let mut reader = BufReader::new(stream);
            if write_line(&mut reader, GREETING).await.is_ok() {
                handle_session(reader, store).await;
            }
        }
        Mode::Tls => {
            let Ok(tls) = acceptor.accept(stream).await else {
                return;
            };
            let mut reader = BufReader::new(tls);
            if write_line(&mut reader, GREETING).await.is_ok() {
                handle_session(reader, store).await;
            }
        }
        Mode::StartTls => {
            let mut reader = BufReader::new(stream);
            if write_line(&mut reader, GREETING).await.is_err() {
                return;
            }

            let mut line = String::new();
            if reader.read_line(&mut line).await.is_err() {
                return;
            }
            let Some((tag, command)) = line.trim().split_once(' ') else {
                return;
            };
            if !command.eq_ignore_ascii_case("STARTTLS") {
                let _ = write_line(&mut reader, &format!("{tag} BAD Expected STARTTLS\r\n")).await;
                return;
            }
            let resp = format!("{tag} OK Begin TLS negotiation now\r\n");
            if write_line(&mut reader, &resp).await.is_err() {
                return;
            }

            let Ok(tls) = acceptor.accept(reader.into_inner()).await else {
                return;
            };
            handle_session(BufReader::new(tls), store).await;
        }
    }
}

/// Run the command loop over an established stream.
///
/// Read-only handlers get a snapshot taken under the lock; handlers
/// that change state lock the shared store themselves.
#[allow(clippy::too_many_lines)]
async fn handle_session<S: AsyncRead + AsyncWrite + Unpin>(
    mut reader: BufReader<S>,
    store: &Mutex<Store>,
) {
    let mut selected: Option<String> = None;
    let mut authenticated = false;

    loop {
        let mut line = String::new();
        match reader.read_line(&mut line).await {
            Ok(0) | Err(_) => break,
            Ok(_) => {}
        }
        let trimmed = line.trim_end_matches(['\r', '\n']);
        if trimmed.is_empty() {
            continue;
        }

        let Some((tag, rest)) = trimmed.split_once(' ') else {
            let _ = write_line(&mut reader, &format!("{trimmed} BAD Missing command\r\n")).await;
            continue;
        };
        let mut args = tokenize(rest);
        if args.is_empty() {
            let _ = write_line(&mut reader, &format!("{tag} BAD Missing command\r\n")).await;
            continue;
        }
        let mut command = args.remove(0).to_ascii_uppercase();
        if command == "UID" && !args.is_empty() {
            command = format!("UID {}", args.remove(0).to_ascii_uppercase());
        }

        if !authenticated && !matches!(command.as_str(), "CAPABILITY" | "LOGIN" | "LOGOUT" | "NOOP")
        {
            let _ = write_line(&mut reader, &format!("{tag} NO Not authenticated\r\n")).await;
            continue;
        }

        let snap = store.lock().unwrap().clone();
        match (command.as_str(), args.as_slice()) {
            ("CAPABILITY", _) => handle_capability(tag, &snap, &mut reader).await,
            ("NOOP", _) => {
                let _ = write_line(&mut reader, &format!("{tag} OK NOOP completed\r\n")).await;
            }
            ("LOGIN", [user, pass, ..]) => {
                authenticated = handle_login(tag, user, pass, &snap, &mut reader).await;
            }
            ("LIST", _) => handle_list(tag, &snap, &mut reader).await,
            ("STATUS", [name, items, ..]) => {
                handle_status(tag, name, &list_items(items), &snap, &mut reader).await;
            }
            ("SELECT" | "EXAMINE", [name, params @ ..]) => {
                let condstore = params
                    .iter()
                    .any(|p| p.to_ascii_uppercase().contains("CONDSTORE"));
                selected = handle_select(tag, name, condstore, &snap, &mut reader).await;
            }
            ("CREATE", [name, ..]) => handle_create(tag, name, store, &mut reader).await,
            ("DELETE", [name, ..]) => {
                if !handle_delete(tag, name, store, &mut reader).await {
                    break;
                }
                if selected.as_deref() == Some(name.as_str()) {
                    selected = None;
                }
            }
            ("APPEND", [name, rest @ ..]) => {
                let Some(len) = rest.last().and_then(|t| literal_len(t)) else {
                    let _ = write_line(&mut reader, &format!("{tag} BAD Expected literal\r\n")).await;
                    continue;
                };
                let flags = rest
                    .iter()
                    .find(|t| t.starts_with('('))
                    .map(|t| list_items(t))
                    .unwrap_or_default();

                if write_line(&mut reader, "+ Ready for literal data\r\n").await.is_err() {
                    break;
                }
                let mut body = vec![0u8; len];
                if reader.read_exact(&mut body).await.is_err() {
                    break;
                }
                let mut end = String::new();
                if reader.read_line(&mut end).await.is_err() {
                    break;
                }
                if !handle_append(tag, name, flags, body, store, &mut reader).await {
                    break;
                }
            }
            ("UID STORE", [uid, action, flags, ..]) => {
                let Ok(uid) = uid.parse() else {
                    let _ = write_line(&mut reader, &format!("{tag} BAD Invalid UID\r\n")).await;
                    continue;
                };
                handle_uid_store(
                    tag,
                    uid,
                    action,
                    &list_items(flags),
                    store,
                    selected.as_deref(),
                    &mut reader,
                )
                .await;
            }
            ("UID FETCH", _) => {
                handle_uid_fetch(tag, &snap, selected.as_deref(), &mut reader).await;
            }
            ("EXPUNGE", _) => {
                handle_expunge(tag, store, selected.as_deref(), &mut reader).await;
            }
            ("LOGOUT", _) => {
                handle_logout(tag, &mut reader).await;
                break;
            }
            _ => {
                let resp = format!("{tag} BAD Unknown command\r\n");
                if write_line(&mut reader, &resp).await.is_err() {
                    break;
                }
            }
        }
    }
}

/// Split command arguments into atoms, unescaped quoted strings and
/// raw parenthesised lists.
fn tokenize(input: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut chars = input.chars().peekable();

    while let Some(&c) = chars.peek() {
        match c {
            ' ' => {
                chars.next();
            }
            '"' => {
                chars.next();
                let mut token = String::new();
                while let Some(c) = chars.next() {
                    match c {
                        '\\' => token.extend(chars.next()),
                        '"' => break,
                        _ => token.push(c),
                    }
                }
                tokens.push(token);
            }
            '(' => {
                let mut token = String::new();
                let mut depth = 0;
                for c in chars.by_ref() {
                    token.push(c);
                    match c {
                        '(' => depth += 1,
                        ')' => {
                            depth -= 1;
                            if depth == 0 {
                                break;
                            }
                        }
                        _ => {}
                    }
                }
                tokens.push(token);
            }
            _ => {
                let mut token = String::new();
                while let Some(&c) = chars.peek() {
                    if c == ' ' {
                        break;
                    }
                    token.push(c);
                    chars.next();
                }
                tokens.push(token);
            }
        }
    }
    tokens
}

/// `(A B C)` -> `["A", "B", "C"]`.
fn list_items(token: &str) -> Vec<String> {
    token
        .trim_start_matches('(')
        .trim_end_matches(')')
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

/// `{n}` -> `n`.
fn literal_len(token: &str) -> Option<usize> {
    token.strip_prefix('{')?.strip_suffix('}')?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenizer_handles_quotes_and_lists() {
        assert_eq!(
            tokenize(r#"APPEND "Default/+331" (\Seen) {12}"#),
            vec!["APPEND", "Default/+331", "(\\Seen)", "{12}"]
        );
        assert_eq!(
            tokenize(r#"LOGIN "a\"b" "p\\w""#),
            vec!["LOGIN", "a\"b", "p\\w"]
        );
        assert_eq!(
            tokenize("STATUS \"A\" (MESSAGES UIDNEXT)"),
            vec!["STATUS", "A", "(MESSAGES UIDNEXT)"]
        );
        assert_eq!(
            tokenize("FETCH 1:* (UID FLAGS BODY.PEEK[])"),
            vec!["FETCH", "1:*", "(UID FLAGS BODY.PEEK[])"]
        );
    }

    #[test]
    fn list_and_literal_helpers() {
        assert_eq!(list_items("(\\Seen \\Deleted)"), vec!["\\Seen", "\\Deleted"]);
        assert!(list_items("()").is_empty());
        assert_eq!(literal_len("{42}"), Some(42));
        assert_eq!(literal_len("42"), None);
    }
}
