// ── Client settings – JSON file merged into a connection config ─────────────

use crate::scp::destination::Destination;
use crate::scp::error::{ScpError, ScpResult};
use crate::scp::types::*;
use log::debug;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Per-user defaults, every field optional in the file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ScpClientSettings {
    #[serde(default = "default_scp_port")]
    pub port: u16,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_keepalive_secs")]
    pub keepalive_interval_secs: u64,
    #[serde(default = "default_false")]
    pub compress: bool,
    /// Renegotiate towards the `none` cipher after authentication.
    #[serde(default = "default_true")]
    pub disable_encryption: bool,
    #[serde(default = "default_cipher_preference")]
    pub cipher_preference: Vec<String>,
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default)]
    pub known_hosts_policy: ScpKnownHostsPolicy,
    #[serde(default)]
    pub known_hosts_path: Option<PathBuf>,
    #[serde(default)]
    pub private_key_path: Option<PathBuf>,
    #[serde(default = "default_false")]
    pub use_agent: bool,
}

impl Default for ScpClientSettings {
    fn default() -> Self {
        Self {
            port: default_scp_port(),
            timeout_secs: default_timeout_secs(),
            keepalive_interval_secs: default_keepalive_secs(),
            compress: default_false(),
            disable_encryption: default_true(),
            cipher_preference: default_cipher_preference(),
            chunk_size: default_chunk_size(),
            known_hosts_policy: ScpKnownHostsPolicy::default(),
            known_hosts_path: None,
            private_key_path: None,
            use_agent: default_false(),
        }
    }
}

impl ScpClientSettings {
    pub fn from_json(text: &str) -> ScpResult<Self> {
        let settings: Self = serde_json::from_str(text)
            .map_err(|e| ScpError::invalid_config(format!("invalid settings: {}", e)))?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn load(path: &Path) -> ScpResult<Self> {
        debug!("Loading SCP settings from {}", path.display());
        let text = std::fs::read_to_string(path).map_err(|e| {
            ScpError::invalid_config(format!("cannot read '{}': {}", path.display(), e))
        })?;
        Self::from_json(&text).map_err(|e| e.context(path.display()))
    }

    pub fn validate(&self) -> ScpResult<()> {
        if self.chunk_size == 0 {
            return Err(ScpError::invalid_config("chunkSize must be greater than zero"));
        }
        if self.chunk_size > MAX_CHUNK_SIZE {
            return Err(ScpError::invalid_config(format!(
                "chunkSize {} exceeds the {} byte limit",
                self.chunk_size, MAX_CHUNK_SIZE
            )));
        }
        if self.cipher_preference.iter().all(|c| c.trim().is_empty()) {
            return Err(ScpError::invalid_config("cipherPreference must name at least one cipher"));
        }
        if self.port == 0 {
            return Err(ScpError::invalid_config("port must be non-zero"));
        }
        Ok(())
    }

    /// Connection config for `destination` under these settings.
    pub fn connection_config(
        &self,
        destination: &Destination,
        password: Option<SecretString>,
    ) -> ScpConnectionConfig {
        let mut config = ScpConnectionConfig::new(&destination.host, &destination.user);
        config.port = self.port;
        config.password = password;
        config.private_key_path = self.private_key_path.clone();
        config.use_agent = self.use_agent;
        config.known_hosts_policy = self.known_hosts_policy;
        config.known_hosts_path = self.known_hosts_path.clone();
        config.timeout_secs = self.timeout_secs;
        config.keepalive_interval_secs = self.keepalive_interval_secs;
        config.compress = self.compress;
        config
    }
}
