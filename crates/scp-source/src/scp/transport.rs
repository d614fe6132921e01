// ── Transport collaborator ───────────────────────────────────────────────────
//
// The capabilities the SCP source needs from an SSH session.

use crate::scp::error::ScpResult;
use crate::scp::types::CipherDirection;
use std::io::{Read, Write};

/// Standard input/output of one remote command invocation.
///
/// `Read` yields the command's stdout, `Write` feeds its stdin.
pub trait CommandChannel: Read + Write {
    /// Orderly shutdown after a successful exchange: signal end of input,
    /// wait for the remote to finish and release the channel.
    fn close(&mut self) -> ScpResult<()>;

    /// Release the channel without waiting on the remote. Used on failure
    /// paths where the remote may never answer.
    fn abort(&mut self) -> ScpResult<()>;
}

/// An authenticated SSH session able to run remote commands.
pub trait ScpTransport {
    type Channel: CommandChannel;

    /// Ordered algorithm list for the next key exchange, most preferred first.
    fn set_cipher_preference(
        &mut self,
        direction: CipherDirection,
        algorithms: &[String],
    ) -> ScpResult<()>;

    /// Start a key re-exchange so new cipher preferences take effect.
    fn force_rekey(&mut self) -> ScpResult<()>;

    /// Open a channel and start `command` on it.
    fn open_command_channel(&mut self, command: &str) -> ScpResult<Self::Channel>;

    /// Cipher currently in use client→server, if the transport knows it.
    fn negotiated_cipher(&self) -> Option<String> {
        None
    }

    fn disconnect(&mut self) -> ScpResult<()>;
}
