//! # scp-source
//!
//! Source side (upload) of the SCP protocol over an SSH exec channel:
//!   • Single-file push with the `scp -p -t` acknowledgement handshake
//!   • ssh2-backed transport with agent / key / password / keyboard-interactive auth
//!   • Pluggable credential prompting
//!   • Optional post-authentication cipher downgrade towards `none`
//!   • `user@host:path` destination parsing and JSON client settings

pub mod scp;
