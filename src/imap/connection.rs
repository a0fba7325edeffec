//! Connection establishment and TLS helpers
//!
//! Opens the TCP stream, applies the configured [`Security`] mode and
//! authenticates, handing back a ready [`CmsSession`].

use super::session::{CmsSession, ImapStream};
use crate::config::{CmsConfig, Security};
use crate::error::{Error, Result};
use rustls::RootCertStore;
use rustls::pki_types::ServerName;
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tokio_rustls::client::TlsStream;
use tracing::{debug, info};

/// Open an authenticated session to the store described by `config`.
///
/// Connects via TCP, performs the TLS handshake (immediately or after
/// `STARTTLS`), reads the greeting, logs in and refreshes the
/// capability set. Every step is bounded by `config.socket_timeout`.
pub async fn connect(config: &CmsConfig) -> Result<CmsSession> {
    let addr = format!("{}:{}", config.host, config.port);
    debug!("Connecting to CMS at {} ({})", addr, config.security);

    let tcp = bounded(config.socket_timeout, TcpStream::connect(&addr)).await?;
    let stream: Box<dyn ImapStream> = match config.security {
        Security::Tls => Box::new(
            tls_handshake(
                tcp,
                &config.host,
                config.ca_file.as_deref(),
                config.socket_timeout,
            )
            .await?,
        ),
        Security::StartTls | Security::Plain => Box::new(tcp),
    };

    let mut session = CmsSession::new(stream, config.socket_timeout);
    session.read_greeting().await?;

    if config.security == Security::StartTls {
        session = session
            .starttls(&config.host, config.ca_file.as_deref())
            .await?;
    }

    session.login(&config.username, &config.password).await?;

    info!("Connected to CMS at {}", addr);
    Ok(session)
}

/// Await an I/O future, failing with [`Error::Timeout`] once `limit`
/// elapses.
pub(crate) async fn bounded<T>(
    limit: Duration,
    fut: impl Future<Output = std::io::Result<T>>,
) -> Result<T> {
    match tokio::time::timeout(limit, fut).await {
        Ok(res) => res.map_err(Error::from),
        Err(_) => Err(Error::Timeout(limit)),
    }
}

/// Wrap `stream` in a client TLS session for `host`.
pub(crate) async fn tls_handshake<S>(
    stream: S,
    host: &str,
    ca_file: Option<&Path>,
    limit: Duration,
) -> Result<TlsStream<S>>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let connector = tls_connector(ca_file)?;
    let server_name = ServerName::try_from(host.to_string())
        .map_err(|e| Error::Tls(format!("Invalid server name: {e}")))?;

    match tokio::time::timeout(limit, connector.connect(server_name, stream)).await {
        Ok(res) => res.map_err(|e| Error::Tls(e.to_string())),
        Err(_) => Err(Error::Timeout(limit)),
    }
}

/// Build a TLS connector. With a CA bundle the server certificate is
/// verified against it; without one every certificate is accepted.
fn tls_connector(ca_file: Option<&Path>) -> Result<TlsConnector> {
    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let builder = rustls::ClientConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .map_err(|e| Error::Tls(e.to_string()))?;

    let config = match ca_file {
        Some(path) => builder
            .with_root_certificates(load_roots(path)?)
            .with_no_client_auth(),
        None => builder
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(AcceptAnyCertificate))
            .with_no_client_auth(),
    };
    Ok(TlsConnector::from(Arc::new(config)))
}

fn load_roots(path: &Path) -> Result<RootCertStore> {
    let file = std::fs::File::open(path)
        .map_err(|e| Error::Config(format!("Cannot open CA file {}: {e}", path.display())))?;
    let mut reader = std::io::BufReader::new(file);

    let mut roots = RootCertStore::empty();
    for cert in rustls_pemfile::certs(&mut reader) {
        let cert = cert
            .map_err(|e| Error::Config(format!("Invalid CA file {}: {e}", path.display())))?;
        roots
            .add(cert)
            .map_err(|e| Error::Tls(format!("Rejected CA certificate: {e}")))?;
    }

    if roots.is_empty() {
        return Err(Error::Config(format!(
            "No certificates found in {}",
            path.display()
        )));
    }
    Ok(roots)
}

/// Certificate verifier that accepts all certificates
/// (for self-signed lab stores).
#[derive(Debug)]
struct AcceptAnyCertificate;

impl rustls::client::danger::ServerCertVerifier for AcceptAnyCertificate {
    fn verify_server_cert(
        &self,
        _end_entity: &rustls::pki_types::CertificateDer<'_>,
        _intermediates: &[rustls::pki_types::CertificateDer<'_>],
        _server_name: &rustls::pki_types::ServerName<'_>,
        _ocsp_response: &[u8],
        _now: rustls::pki_types::UnixTime,
    ) -> std::result::Result<rustls::client::danger::ServerCertVerified, rustls::Error> {
        Ok(rustls::client::danger::ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &rustls::pki_types::CertificateDer<'_>,
        _dss: &rustls::DigitallySignedStruct,
    ) -> std::result::Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        Ok(rustls::client::danger::HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &rustls::pki_types::CertificateDer<'_>,
        _dss: &rustls::DigitallySignedStruct,
    ) -> std::result::Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        Ok(rustls::client::danger::HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<rustls::SignatureScheme> {
        rustls::crypto::ring::default_provider()
            .signature_verification_algorithms
            .supported_schemes()
    }
}
