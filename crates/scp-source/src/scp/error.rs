//! SCP-specific error type.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Categorised SCP error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScpError {
    pub kind: ScpErrorKind,
    pub message: String,
    /// Text the remote `scp` sent along with an error acknowledgement.
    pub remote_message: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ScpErrorKind {
    /// Malformed command line or destination.
    Usage,
    /// TCP / DNS / SSH handshake failure.
    Connection,
    /// Host key rejected or unverifiable.
    HostKey,
    /// Every authentication method was refused.
    Auth,
    /// Remote answered with an error acknowledgement, closed the stream,
    /// or sent something that is not an acknowledgement.
    Protocol,
    /// Remote answered with a fatal error acknowledgement.
    FatalProtocol,
    /// Local file unreadable, or a stream read/write failed.
    Io,
    /// A blocking operation exceeded the session timeout.
    Timeout,
    /// The transport cannot perform the requested operation.
    Unsupported,
    /// Settings file or option validation error.
    Config,
}

pub type ScpResult<T> = Result<T, ScpError>;

impl ScpErrorKind {
    /// Process exit status the CLI reports for this kind.
    pub fn exit_code(self) -> i32 {
        match self {
            ScpErrorKind::Usage => 2,
            ScpErrorKind::Auth => 3,
            ScpErrorKind::Connection | ScpErrorKind::HostKey => 4,
            ScpErrorKind::Protocol => 5,
            ScpErrorKind::FatalProtocol => 6,
            ScpErrorKind::Io => 7,
            ScpErrorKind::Timeout => 8,
            ScpErrorKind::Config => 9,
            ScpErrorKind::Unsupported => 1,
        }
    }
}

// ── Construction helpers ─────────────────────────────────────────────

impl ScpError {
    pub fn new(kind: ScpErrorKind, msg: impl Into<String>) -> Self {
        Self {
            kind,
            message: msg.into(),
            remote_message: None,
        }
    }

    pub fn with_remote_message(mut self, text: impl Into<String>) -> Self {
        self.remote_message = Some(text.into());
        self
    }

    pub fn usage(msg: impl Into<String>) -> Self {
        Self::new(ScpErrorKind::Usage, msg)
    }

    pub fn connection_failed(msg: impl Into<String>) -> Self {
        Self::new(ScpErrorKind::Connection, msg)
    }

    pub fn host_key(msg: impl Into<String>) -> Self {
        Self::new(ScpErrorKind::HostKey, msg)
    }

    pub fn auth_failed(msg: impl Into<String>) -> Self {
        Self::new(ScpErrorKind::Auth, msg)
    }

    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::new(ScpErrorKind::Protocol, msg)
    }

    pub fn fatal(msg: impl Into<String>) -> Self {
        Self::new(ScpErrorKind::FatalProtocol, msg)
    }

    pub fn io_error(msg: impl Into<String>) -> Self {
        Self::new(ScpErrorKind::Io, msg)
    }

    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::new(ScpErrorKind::Timeout, msg)
    }

    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::new(ScpErrorKind::Unsupported, msg)
    }

    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::new(ScpErrorKind::Config, msg)
    }

    pub fn is_unsupported(&self) -> bool {
        self.kind == ScpErrorKind::Unsupported
    }

    /// Prefix the message with what was being attempted, keeping the kind.
    pub fn context(mut self, what: impl fmt::Display) -> Self {
        self.message = format!("{}: {}", what, self.message);
        self
    }
}

impl fmt::Display for ScpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.remote_message {
            Some(ref remote) => write!(f, "[SCP {:?}] {} (remote: {})", self.kind, self.message, remote),
            None => write!(f, "[SCP {:?}] {}", self.kind, self.message),
        }
    }
}

impl std::error::Error for ScpError {}

impl From<std::io::Error> for ScpError {
    fn from(e: std::io::Error) -> Self {
        if e.kind() == std::io::ErrorKind::TimedOut {
            Self::timeout(format!("I/O timeout: {}", e))
        } else {
            Self::io_error(e.to_string())
        }
    }
}

/// libssh2 `LIBSSH2_ERROR_TIMEOUT`.
const LIBSSH2_ERROR_TIMEOUT: std::os::raw::c_int = -9;

impl From<ssh2::Error> for ScpError {
    fn from(e: ssh2::Error) -> Self {
        match e.code() {
            ssh2::ErrorCode::Session(LIBSSH2_ERROR_TIMEOUT) => {
                Self::timeout(format!("SSH operation timed out: {}", e.message()))
            }
            _ => Self::io_error(format!("SSH error: {}", e)),
        }
    }
}
