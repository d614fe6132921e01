// ── Ssh2Transport – session lifecycle on libssh2 ─────────────────────────────

use crate::scp::credentials::CredentialProvider;
use crate::scp::error::{ScpError, ScpResult};
use crate::scp::transport::{CommandChannel, ScpTransport};
use crate::scp::types::*;
use base64::Engine;
use log::{debug, info, warn};
use secrecy::ExposeSecret;
use ssh2::{CheckResult, KnownHostFileKind, MethodType, Session};
use std::io::{Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default identities tried when no key is configured.
const DEFAULT_KEY_NAMES: &[&str] = &["id_ed25519", "id_rsa", "id_ecdsa"];

// ── Session ──────────────────────────────────────────────────────────────────

/// An authenticated libssh2 session.
pub struct Ssh2Transport {
    session: Session,
    host: String,
    connected: bool,
}

impl Ssh2Transport {
    // ── Connect ──────────────────────────────────────────────────────────────

    /// TCP connect, handshake, host key check and authentication.
    pub fn connect(
        config: &ScpConnectionConfig,
        credentials: &mut dyn CredentialProvider,
    ) -> ScpResult<Self> {
        let addr = config.address();
        info!("SCP connecting to {}", addr);

        let tcp = connect_tcp(&addr, config.timeout_secs)?;

        let mut session = Session::new()
            .map_err(|e| ScpError::connection_failed(format!("Failed to create SSH session: {}", e)))?;
        if config.compress {
            session.set_compress(true);
        }
        session.set_timeout((config.timeout_secs.saturating_mul(1000)).min(u32::MAX as u64) as u32);
        session.set_tcp_stream(tcp);
        session
            .handshake()
            .map_err(|e| ScpError::connection_failed(format!("SSH handshake with {} failed: {}", addr, e)))?;

        if let Some(banner) = session.banner() {
            debug!("SCP server banner: {}", banner);
        }

        verify_host_key(&session, config, credentials)?;

        let auth_method = authenticate(&session, config, credentials)?;
        info!("SCP authenticated to {} as {} via {}", addr, config.username, auth_method);

        let keepalive_interval = config.keepalive_interval_secs;
        session.set_keepalive(keepalive_interval > 0, keepalive_interval.min(u32::MAX as u64) as u32);

        Ok(Self {
            session,
            host: config.host.clone(),
            connected: true,
        })
    }
}

impl ScpTransport for Ssh2Transport {
    type Channel = Ssh2Channel;

    fn set_cipher_preference(
        &mut self,
        direction: CipherDirection,
        algorithms: &[String],
    ) -> ScpResult<()> {
        let method = match direction {
            CipherDirection::ClientToServer => MethodType::CryptCs,
            CipherDirection::ServerToClient => MethodType::CryptSc,
        };
        self.session
            .method_pref(method, &algorithms.join(","))
            .map_err(|e| {
                // libssh2 refuses lists naming ciphers it was built without, `none` included
                ScpError::unsupported(format!("cipher preference {:?} rejected: {}", direction, e))
            })
    }

    fn force_rekey(&mut self) -> ScpResult<()> {
        // Preferences set above are still honoured if the server starts a key exchange.
        Err(ScpError::unsupported(
            "libssh2 cannot start a key re-exchange from the client side",
        ))
    }

    fn open_command_channel(&mut self, command: &str) -> ScpResult<Ssh2Channel> {
        let mut channel = self
            .session
            .channel_session()
            .map_err(|e| ScpError::from(e).context("Failed to open channel"))?;
        channel
            .exec(command)
            .map_err(|e| ScpError::from(e).context(format!("Failed to execute '{}'", command)))?;
        debug!("SCP started remote '{}' on {}", command, self.host);
        Ok(Ssh2Channel { inner: channel })
    }

    fn negotiated_cipher(&self) -> Option<String> {
        self.session.methods(MethodType::CryptCs).map(|s| s.to_string())
    }

    fn disconnect(&mut self) -> ScpResult<()> {
        if !self.connected {
            return Ok(());
        }
        info!("SCP disconnecting from {}", self.host);
        self.connected = false;
        self.session
            .disconnect(None, "Client disconnecting", None)
            .map_err(|e| ScpError::from(e).context("disconnect"))
    }
}

impl Drop for Ssh2Transport {
    fn drop(&mut self) {
        if let Err(e) = self.disconnect() {
            debug!("SCP disconnect on drop: {}", e);
        }
    }
}

// ── Channel ──────────────────────────────────────────────────────────────────

pub struct Ssh2Channel {
    inner: ssh2::Channel,
}

impl Read for Ssh2Channel {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.inner.read(buf)
    }
}

impl Write for Ssh2Channel {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.inner.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }
}

impl CommandChannel for Ssh2Channel {
    fn close(&mut self) -> ScpResult<()> {
        self.inner
            .send_eof()
            .map_err(|e| ScpError::from(e).context("Failed to send EOF"))?;
        self.inner
            .wait_eof()
            .map_err(|e| ScpError::from(e).context("Failed waiting for EOF"))?;
        self.inner
            .close()
            .map_err(|e| ScpError::from(e).context("Failed to close channel"))?;
        self.inner
            .wait_close()
            .map_err(|e| ScpError::from(e).context("Failed waiting for close"))?;
        match self.inner.exit_status() {
            Ok(0) => {}
            Ok(code) => warn!("SCP remote scp exited with status {}", code),
            Err(e) => debug!("SCP remote exit status unavailable: {}", e),
        }
        Ok(())
    }

    fn abort(&mut self) -> ScpResult<()> {
        self.inner
            .close()
            .map_err(|e| ScpError::from(e).context("Failed to close channel"))
    }
}

// ── Helpers ──────────────────────────────────────────────────────────────────

fn connect_tcp(addr: &str, timeout_secs: u64) -> ScpResult<TcpStream> {
    let addrs: Vec<_> = addr
        .to_socket_addrs()
        .map_err(|e| ScpError::connection_failed(format!("Cannot resolve '{}': {}", addr, e)))?
        .collect();

    let mut last_error = None;
    for sock_addr in addrs {
        let attempt = if timeout_secs > 0 {
            TcpStream::connect_timeout(&sock_addr, Duration::from_secs(timeout_secs))
        } else {
            TcpStream::connect(sock_addr)
        };
        match attempt {
            Ok(tcp) => return Ok(tcp),
            Err(e) => {
                debug!("SCP connect to {} failed: {}", sock_addr, e);
                last_error = Some(e);
            }
        }
    }

    Err(match last_error {
        Some(e) => ScpError::connection_failed(format!("TCP connection to {} failed: {}", addr, e)),
        None => ScpError::connection_failed(format!("'{}' resolved to no addresses", addr)),
    })
}

fn host_fingerprint(session: &Session) -> Option<String> {
    session.host_key_hash(ssh2::HashType::Sha256).map(|bytes| {
        format!(
            "SHA256:{}",
            base64::engine::general_purpose::STANDARD_NO_PAD.encode(bytes)
        )
    })
}

fn known_hosts_path(config: &ScpConnectionConfig) -> Option<PathBuf> {
    config
        .known_hosts_path
        .clone()
        .or_else(|| dirs::home_dir().map(|h| h.join(".ssh").join("known_hosts")))
}

/// Entry name OpenSSH uses: bare host on port 22, `[host]:port` otherwise.
fn known_hosts_name(host: &str, port: u16) -> String {
    if port == 22 {
        host.to_string()
    } else {
        format!("[{}]:{}", host, port)
    }
}

fn verify_host_key(
    session: &Session,
    config: &ScpConnectionConfig,
    credentials: &mut dyn CredentialProvider,
) -> ScpResult<()> {
    let fingerprint = host_fingerprint(session).unwrap_or_else(|| "unknown".into());
    info!("SCP host key for {}: {}", config.host, fingerprint);

    if config.known_hosts_policy == ScpKnownHostsPolicy::Ignore {
        warn!("SCP host key verification disabled for {}", config.host);
        return Ok(());
    }

    let (key, key_type) = session
        .host_key()
        .ok_or_else(|| ScpError::host_key("server did not present a host key"))?;

    let mut known_hosts = session.known_hosts()?;
    let path = known_hosts_path(config);
    if let Some(ref p) = path {
        if p.exists() {
            known_hosts.read_file(p, KnownHostFileKind::OpenSSH).map_err(|e| {
                ScpError::host_key(format!("cannot read '{}': {}", p.display(), e))
            })?;
        }
    }

    match known_hosts.check_port(&config.host, config.port, key) {
        CheckResult::Match => return Ok(()),
        CheckResult::Mismatch => {
            return Err(ScpError::host_key(format!(
                "host key for {} has CHANGED (now {}); refusing to connect",
                config.host, fingerprint
            )))
        }
        CheckResult::Failure => {
            return Err(ScpError::host_key(format!(
                "host key check for {} failed",
                config.host
            )))
        }
        CheckResult::NotFound => {}
    }

    let trusted = match config.known_hosts_policy {
        ScpKnownHostsPolicy::Strict => false,
        ScpKnownHostsPolicy::AcceptNew => true,
        ScpKnownHostsPolicy::Ask => credentials.confirm(&format!(
            "The authenticity of host '{}' can't be established.\nKey fingerprint is {}.\nAre you sure you want to continue connecting?",
            config.host, fingerprint
        ))?,
        ScpKnownHostsPolicy::Ignore => true,
    };
    if !trusted {
        return Err(ScpError::host_key(format!(
            "host key for {} is not trusted ({})",
            config.host, fingerprint
        )));
    }

    let entry = known_hosts_name(&config.host, config.port);
    if let Some(p) = path {
        let recorded = known_hosts
            .add(&entry, key, "added by scp-push", key_type.into())
            .and_then(|_| known_hosts.write_file(&p, KnownHostFileKind::OpenSSH));
        match recorded {
            Ok(()) => info!("SCP permanently added '{}' to {}", entry, p.display()),
            Err(e) => warn!("SCP could not record host key in {}: {}", p.display(), e),
        }
    }
    Ok(())
}

// ── Authentication ───────────────────────────────────────────────────────────

fn authenticate(
    session: &Session,
    config: &ScpConnectionConfig,
    credentials: &mut dyn CredentialProvider,
) -> ScpResult<String> {
    let user = config.username.as_str();
    let offered = session
        .auth_methods(user)
        .map(|m| m.to_string())
        .unwrap_or_default();
    if session.authenticated() {
        return Ok("none".into());
    }
    debug!("SCP server offers auth methods: {}", offered);
    let allows = |method: &str| offered.is_empty() || offered.split(',').any(|m| m == method);

    // 1. Agent auth
    if config.use_agent && allows("publickey") {
        if session.userauth_agent(user).is_ok() && session.authenticated() {
            return Ok("agent".into());
        }
        warn!("SCP agent auth failed for {}, trying other methods", user);
    }

    // 2. Private key from file
    if let Some(ref key_path) = config.private_key_path {
        if !key_path.exists() {
            return Err(ScpError::auth_failed(format!(
                "identity file '{}' not found",
                key_path.display()
            )));
        }
        if try_key_file(session, user, key_path, credentials)? {
            return Ok("publickey-file".into());
        }
        warn!("SCP publickey-file auth failed for {}", user);
    }

    // 3. Default key files
    if allows("publickey") {
        if let Some(home) = dirs::home_dir() {
            for key_name in DEFAULT_KEY_NAMES {
                let key_path = home.join(".ssh").join(key_name);
                if key_path.exists() && try_key_file_unencrypted(session, user, &key_path) {
                    return Ok(format!("publickey-default({})", key_name));
                }
            }
        }
    }

    // 4. Password auth
    if allows("password") {
        let password = match config.password {
            Some(ref p) => p.expose_secret().clone(),
            None => credentials.password(user, &config.host)?.expose_secret().clone(),
        };
        if session.userauth_password(user, &password).is_ok() && session.authenticated() {
            return Ok("password".into());
        }
        warn!("SCP password auth failed for {}", user);
    }

    // 5. Keyboard-interactive
    if allows("keyboard-interactive") {
        let mut prompter = InteractivePrompter {
            credentials: &mut *credentials,
            failed: None,
        };
        let result = session.userauth_keyboard_interactive(user, &mut prompter);
        if let Some(e) = prompter.failed {
            return Err(e);
        }
        if result.is_ok() && session.authenticated() {
            return Ok("keyboard-interactive".into());
        }
    }

    Err(ScpError::auth_failed(format!(
        "All authentication methods exhausted for user '{}'",
        user
    )))
}

fn try_key_file_unencrypted(session: &Session, user: &str, key_path: &Path) -> bool {
    session
        .userauth_pubkey_file(user, None, key_path, None)
        .is_ok()
        && session.authenticated()
}

/// Try the key as is, then once more with a passphrase from the provider.
fn try_key_file(
    session: &Session,
    user: &str,
    key_path: &Path,
    credentials: &mut dyn CredentialProvider,
) -> ScpResult<bool> {
    if try_key_file_unencrypted(session, user, key_path) {
        return Ok(true);
    }
    let passphrase = match credentials.passphrase(key_path)? {
        Some(p) => p,
        None => return Ok(false),
    };
    Ok(session
        .userauth_pubkey_file(user, None, key_path, Some(passphrase.expose_secret()))
        .is_ok()
        && session.authenticated())
}

struct InteractivePrompter<'a> {
    credentials: &'a mut dyn CredentialProvider,
    failed: Option<ScpError>,
}

impl ssh2::KeyboardInteractivePrompt for InteractivePrompter<'_> {
    fn prompt<'p>(
        &mut self,
        _username: &str,
        instructions: &str,
        prompts: &[ssh2::Prompt<'p>],
    ) -> Vec<String> {
        if !instructions.is_empty() {
            self.credentials.instructions(instructions);
        }
        let mut answers = Vec::with_capacity(prompts.len());
        for prompt in prompts {
            if self.failed.is_some() {
                answers.push(String::new());
                continue;
            }
            match self.credentials.respond(&prompt.text, prompt.echo) {
                Ok(answer) => answers.push(answer),
                Err(e) => {
                    self.failed = Some(e);
                    answers.push(String::new());
                }
            }
        }
        answers
    }
}
