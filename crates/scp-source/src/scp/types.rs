// ── Types ─────────────────────────────────────────────────────────────────────

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

// ── Serde default helpers ────────────────────────────────────────────────────

pub(crate) fn default_scp_port() -> u16 {
    22
}
pub(crate) fn default_true() -> bool {
    true
}
pub(crate) fn default_false() -> bool {
    false
}
pub(crate) fn default_chunk_size() -> usize {
    32 * 1024
}
/// Largest accepted `chunkSize`.
pub const MAX_CHUNK_SIZE: usize = 16 * 1024 * 1024;
pub(crate) fn default_timeout_secs() -> u64 {
    30
}
pub(crate) fn default_keepalive_secs() -> u64 {
    60
}
pub(crate) fn default_cipher_preference() -> Vec<String> {
    crate::scp::cipher::NONE_FIRST_CIPHERS
        .iter()
        .map(|c| c.to_string())
        .collect()
}

/// Mode bits announced in the control line, independent of the local file.
pub const SCP_FILE_MODE: u32 = 0o644;

// ── Connection & Authentication ──────────────────────────────────────────────

/// Everything needed to open and authenticate one SSH session.
///
/// Built by merging [`ScpClientSettings`](crate::scp::config::ScpClientSettings)
/// with a parsed destination; never serialised because it may carry a password.
#[derive(Debug, Clone)]
pub struct ScpConnectionConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: Option<SecretString>,
    pub private_key_path: Option<PathBuf>,
    pub use_agent: bool,
    pub known_hosts_policy: ScpKnownHostsPolicy,
    /// Defaults to `~/.ssh/known_hosts`.
    pub known_hosts_path: Option<PathBuf>,
    /// Applies to the TCP connect and to every blocking SSH operation. 0 = wait forever.
    pub timeout_secs: u64,
    pub keepalive_interval_secs: u64,
    pub compress: bool,
}

impl ScpConnectionConfig {
    pub fn new(host: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: default_scp_port(),
            username: username.into(),
            password: None,
            private_key_path: None,
            use_agent: default_false(),
            known_hosts_policy: ScpKnownHostsPolicy::default(),
            known_hosts_path: None,
            timeout_secs: default_timeout_secs(),
            keepalive_interval_secs: default_keepalive_secs(),
            compress: default_false(),
        }
    }

    pub fn address(&self) -> String {
        if self.host.contains(':') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}

/// What to do with a server host key that is not already trusted.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum ScpKnownHostsPolicy {
    /// Ask the credential provider before trusting an unknown key.
    #[default]
    Ask,
    /// Trust and record unknown keys, reject changed ones.
    AcceptNew,
    /// Only accept keys already in `known_hosts`.
    Strict,
    /// Skip verification entirely.
    Ignore,
}

impl std::str::FromStr for ScpKnownHostsPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ask" => Ok(Self::Ask),
            "accept-new" | "acceptnew" => Ok(Self::AcceptNew),
            "strict" | "yes" => Ok(Self::Strict),
            "ignore" | "no" => Ok(Self::Ignore),
            other => Err(format!(
                "unknown known-hosts policy '{}' (expected ask, accept-new, strict or ignore)",
                other
            )),
        }
    }
}

/// Direction a cipher preference applies to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum CipherDirection {
    ClientToServer,
    ServerToClient,
}

// ── Transfer request ─────────────────────────────────────────────────────────

/// One file to push, fixed once the local file has been stat'ed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScpTransferRequest {
    pub local_path: PathBuf,
    pub remote_path: String,
    pub file_mode: u32,
    /// Size observed when the request was built; this many bytes are sent.
    pub size: u64,
}

// ── Transfer result ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScpTransferReport {
    pub local_path: String,
    pub remote_path: String,
    pub bytes_transferred: u64,
    pub duration_ms: u64,
    /// Bytes per second.
    pub average_speed: f64,
    #[serde(default)]
    pub negotiated_cipher: Option<String>,
    #[serde(default = "default_false")]
    pub encryption_disabled: bool,
}
