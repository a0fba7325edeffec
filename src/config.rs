//! CMS connection configuration

use crate::error::{Error, Result};
use std::env;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Anonymous identity used when the account's own address is unknown.
pub const ANONYMOUS_ADDRESS: &str = "sip:anonymous@anonymous.invalid";

/// How the transport is secured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Security {
    /// TLS from the first byte (IMAPS, usually port 993).
    #[default]
    Tls,
    /// Plaintext greeting, then `STARTTLS` before authenticating.
    StartTls,
    /// No transport encryption. Lab and test setups only.
    Plain,
}

impl Security {
    #[must_use]
    pub const fn default_port(self) -> u16 {
        match self {
            Self::Tls => 993,
            Self::StartTls | Self::Plain => 143,
        }
    }
}

impl FromStr for Security {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "tls" | "imaps" => Ok(Self::Tls),
            "starttls" => Ok(Self::StartTls),
            "plain" | "none" => Ok(Self::Plain),
            other => Err(Error::Config(format!("Invalid CMS_SECURITY: {other}"))),
        }
    }
}

impl fmt::Display for Security {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Tls => "tls",
            Self::StartTls => "starttls",
            Self::Plain => "plain",
        })
    }
}

/// Connection and synchronization settings for one CMS account.
#[derive(Clone)]
pub struct CmsConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub security: Security,
    /// Bound on every connect, read and write.
    pub socket_timeout: Duration,
    /// Prepended to a contact identifier to name its conversation folder.
    pub folder_prefix: String,
    /// The account's own address, used in From/To of pushed messages.
    pub user_address: String,
    /// PEM bundle of trusted roots. Without it any certificate is accepted.
    pub ca_file: Option<PathBuf>,
}

impl fmt::Debug for CmsConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CmsConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("security", &self.security)
            .field("socket_timeout", &self.socket_timeout)
            .field("folder_prefix", &self.folder_prefix)
            .field("user_address", &self.user_address)
            .field("ca_file", &self.ca_file)
            .finish()
    }
}

impl CmsConfig {
    /// Minimal configuration with defaults for everything but the
    /// address and credentials.
    #[must_use]
    pub fn new(
        host: impl Into<String>,
        port: u16,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            port,
            username: username.into(),
            password: password.into(),
            security: Security::default(),
            socket_timeout: Duration::from_secs(30),
            folder_prefix: "Default/".to_string(),
            user_address: ANONYMOUS_ADDRESS.to_string(),
            ca_file: None,
        }
    }

    #[must_use]
    pub const fn with_security(mut self, security: Security) -> Self {
        self.security = security;
        self
    }

    #[must_use]
    pub const fn with_socket_timeout(mut self, timeout: Duration) -> Self {
        self.socket_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_folder_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.folder_prefix = prefix.into();
        self
    }

    /// Load CMS configuration from environment variables
    ///
    /// Reads from `.env` file if present. Required variables:
    /// - `CMS_USERNAME`
    /// - `CMS_PASSWORD`
    ///
    /// Optional (with defaults):
    /// - `CMS_HOST` (default: `127.0.0.1`)
    /// - `CMS_SECURITY` (default: `tls`; also `starttls`, `plain`)
    /// - `CMS_PORT` (default: 993 for `tls`, 143 otherwise)
    /// - `CMS_SOCKET_TIMEOUT_SECS` (default: `30`)
    /// - `CMS_FOLDER_PREFIX` (default: `Default/`)
    /// - `CMS_USER_ADDRESS` (default: the anonymous SIP URI)
    /// - `CMS_CA_FILE` (default: unset, accept any certificate)
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let security = lookup("CMS_SECURITY")
            .map(|s| s.parse::<Security>())
            .transpose()?
            .unwrap_or_default();

        let port = match lookup("CMS_PORT") {
            Some(p) => p
                .parse()
                .map_err(|e| Error::Config(format!("Invalid CMS_PORT: {e}")))?,
            None => security.default_port(),
        };

        let timeout_secs: u64 = match lookup("CMS_SOCKET_TIMEOUT_SECS") {
            Some(t) => t
                .parse()
                .map_err(|e| Error::Config(format!("Invalid CMS_SOCKET_TIMEOUT_SECS: {e}")))?,
            None => 30,
        };
        if timeout_secs == 0 {
            return Err(Error::Config(
                "CMS_SOCKET_TIMEOUT_SECS must be positive".into(),
            ));
        }

        Ok(Self {
            host: lookup("CMS_HOST").unwrap_or_else(|| "127.0.0.1".to_string()),
            port,
            username: lookup("CMS_USERNAME")
                .ok_or_else(|| Error::Config("CMS_USERNAME not set".into()))?,
            password: lookup("CMS_PASSWORD")
                .ok_or_else(|| Error::Config("CMS_PASSWORD not set".into()))?,
            security,
            socket_timeout: Duration::from_secs(timeout_secs),
            folder_prefix: lookup("CMS_FOLDER_PREFIX").unwrap_or_else(|| "Default/".to_string()),
            user_address: lookup("CMS_USER_ADDRESS")
                .unwrap_or_else(|| ANONYMOUS_ADDRESS.to_string()),
            ca_file: lookup("CMS_CA_FILE").map(PathBuf::from),
        })
    }
}
