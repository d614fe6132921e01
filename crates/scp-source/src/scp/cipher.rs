// ── Cipher downgrade – drop encryption once authentication is done ──────────
//
// Runs after authentication. Both directions get the `none`-first list and
// keys are re-exchanged; the MAC stays as negotiated. The server must also
// offer `none` or a fallback cipher wins.

use crate::scp::error::{ScpError, ScpResult};
use crate::scp::transport::ScpTransport;
use crate::scp::types::CipherDirection;
use log::{info, warn};

/// `none` first, then widely deployed ciphers.
pub const NONE_FIRST_CIPHERS: &[&str] = &["none", "aes128-cbc", "3des-cbc", "blowfish-cbc"];

/// What happened to the session cipher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CipherOutcome {
    /// New preferences were installed and keys re-exchanged.
    Downgraded { negotiated: Option<String> },
    /// The transport could not renegotiate; the session keeps its cipher.
    Kept { reason: String },
}

impl CipherOutcome {
    pub fn encryption_disabled(&self) -> bool {
        matches!(self, CipherOutcome::Downgraded { negotiated: Some(c) } if c == "none")
    }
}

/// Prefer `preference` in both directions, then rekey.
///
/// An unsupported capability is not an error: the transfer can go ahead
/// encrypted. Anything else the transport reports aborts.
pub fn disable_encryption<T: ScpTransport + ?Sized>(
    transport: &mut T,
    preference: &[String],
) -> ScpResult<CipherOutcome> {
    if preference.is_empty() {
        return Err(ScpError::invalid_config("cipher preference list is empty"));
    }

    for direction in [CipherDirection::ServerToClient, CipherDirection::ClientToServer] {
        match transport.set_cipher_preference(direction, preference) {
            Ok(()) => {}
            Err(e) if e.is_unsupported() => return Ok(kept(e)),
            Err(e) => return Err(e.context("setting cipher preference")),
        }
    }

    match transport.force_rekey() {
        Ok(()) => {}
        Err(e) if e.is_unsupported() => return Ok(kept(e)),
        Err(e) => return Err(e.context("key re-exchange")),
    }

    let negotiated = transport.negotiated_cipher();
    match negotiated.as_deref() {
        Some("none") => info!("SCP session cipher switched to none"),
        Some(other) => info!("SCP server kept cipher {} after rekey", other),
        None => info!("SCP session rekeyed"),
    }
    Ok(CipherOutcome::Downgraded { negotiated })
}

fn kept(e: ScpError) -> CipherOutcome {
    warn!("SCP continuing with the negotiated cipher: {}", e.message);
    CipherOutcome::Kept { reason: e.message }
}
