// ── scp-source / scp module ───────────────────────────────────────────────────
//
// SCP source-role client:
//   • protocol     – acknowledgement codec, control line, basename
//   • transfer     – the four-step single-file push over a command channel
//   • transport    – collaborator traits (cipher preference, rekey, exec channel)
//   • service      – ssh2 implementation of the transport
//   • cipher       – post-auth renegotiation preferring the `none` cipher
//   • destination  – `user@host:path` parsing
//   • credentials  – password / passphrase / prompt providers
//   • config       – JSON client settings merged into a connection config

pub mod types;
pub mod error;
pub mod protocol;
pub mod transfer;
pub mod transport;
pub mod service;
pub mod cipher;
pub mod destination;
pub mod credentials;
pub mod config;

pub use types::*;
pub use error::{ScpError, ScpErrorKind, ScpResult};
pub use transfer::{transfer, ScpSourceSession};
pub use transport::{CommandChannel, ScpTransport};
pub use service::Ssh2Transport;
pub use cipher::{disable_encryption, CipherOutcome};
pub use destination::Destination;
pub use credentials::{CredentialProvider, StaticCredentials, TerminalPrompt};
