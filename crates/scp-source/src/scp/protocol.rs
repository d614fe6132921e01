//! Wire-level pieces of the SCP source role.
//!
//! Every step the sink (`scp -t`) completes is answered with a single byte:
//! `0` for OK, `1` followed by a message line for an error, `2` followed by
//! a message line for a fatal error. The source announces a file with a
//! `C<mode> <size> <name>\n` control line, sends exactly `size` bytes and
//! terminates the payload with a single NUL.

use crate::scp::error::{ScpError, ScpResult};
use log::{error, warn};
use std::io::{ErrorKind, Read};

/// SCP protocol status codes.
pub const SCP_OK: u8 = 0;
pub const SCP_WARNING: u8 = 1;
pub const SCP_ERROR: u8 = 2;

/// Terminates the file payload.
pub const END_OF_DATA: u8 = 0;

/// Maximum length of a remote error message line.
const MAX_MESSAGE_LENGTH: usize = 64 * 1024;

/// One decoded acknowledgement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ack {
    Ok,
    /// Recoverable error reported by the sink.
    Error(String),
    /// Fatal error reported by the sink.
    Fatal(String),
    /// The remote closed its output before answering.
    EndOfStream,
}

impl Ack {
    /// Turn anything but [`Ack::Ok`] into the error that aborts the transfer.
    pub fn into_result(self, step: &str) -> ScpResult<()> {
        match self {
            Ack::Ok => Ok(()),
            Ack::Error(msg) => Err(ScpError::protocol(format!("remote rejected {}", step))
                .with_remote_message(msg)),
            Ack::Fatal(msg) => Err(ScpError::fatal(format!("remote aborted {}", step))
                .with_remote_message(msg)),
            Ack::EndOfStream => Err(ScpError::protocol(format!(
                "remote closed the stream while waiting for {} acknowledgement",
                step
            ))),
        }
    }
}

/// Read exactly one acknowledgement.
///
/// Reads byte by byte so nothing past the acknowledgement is consumed.
/// A byte outside `0..=2` is a protocol violation.
pub fn read_ack<R: Read + ?Sized>(input: &mut R) -> ScpResult<Ack> {
    let code = match read_byte(input)? {
        Some(b) => b,
        None => return Ok(Ack::EndOfStream),
    };

    match code {
        SCP_OK => Ok(Ack::Ok),
        SCP_WARNING => {
            let msg = read_message(input)?;
            warn!("scp: {}", msg);
            Ok(Ack::Error(msg))
        }
        SCP_ERROR => {
            let msg = read_message(input)?;
            error!("scp: {}", msg);
            Ok(Ack::Fatal(msg))
        }
        other => Err(ScpError::protocol(format!(
            "unexpected acknowledgement byte 0x{:02x}",
            other
        ))),
    }
}

fn read_byte<R: Read + ?Sized>(input: &mut R) -> ScpResult<Option<u8>> {
    let mut buf = [0u8; 1];
    loop {
        match input.read(&mut buf) {
            Ok(0) => return Ok(None),
            Ok(_) => return Ok(Some(buf[0])),
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(ScpError::from(e).context("reading acknowledgement")),
        }
    }
}

/// Collect the message line following an error code, up to and including
/// the newline. Stops early at end of stream or at the length cap.
fn read_message<R: Read + ?Sized>(input: &mut R) -> ScpResult<String> {
    let mut line = Vec::new();
    while line.len() < MAX_MESSAGE_LENGTH {
        match read_byte(input)? {
            Some(b'\n') | None => break,
            Some(b) => line.push(b),
        }
    }
    Ok(String::from_utf8_lossy(&line).trim_end_matches('\r').to_string())
}

/// Everything after the last path separator of `local_path`; the whole
/// string when there is none.
pub fn basename(local_path: &str) -> &str {
    match local_path.rfind(|c| c == '/' || c == std::path::MAIN_SEPARATOR) {
        Some(idx) => &local_path[idx + 1..],
        None => local_path,
    }
}

/// `C0644 <size> <name>\n`.
pub fn control_line(mode: u32, size: u64, name: &str) -> String {
    format!("C{:04o} {} {}\n", mode & 0o7777, size, name)
}

/// Remote command that starts the sink for `remote_path`.
pub fn sink_command(remote_path: &str) -> String {
    format!("scp -p -t {}", remote_path)
}

/// Error notice a source sends in place of the end-of-data marker when the
/// payload it just sent is not the file's real content.
pub fn source_error_line(msg: &str) -> Vec<u8> {
    let mut line = Vec::with_capacity(msg.len() + 7);
    line.push(SCP_WARNING);
    line.extend_from_slice(b"scp: ");
    line.extend_from_slice(msg.replace('\n', " ").as_bytes());
    line.push(b'\n');
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scp::error::ScpErrorKind;
    use std::io::Cursor;

    #[test]
    fn test_read_ack_ok() {
        let mut input = Cursor::new(vec![0u8, 0u8]);
        assert_eq!(read_ack(&mut input).unwrap(), Ack::Ok);
        // second byte untouched
        assert_eq!(input.position(), 1);
    }

    #[test]
    fn test_read_ack_end_of_stream() {
        let mut input = Cursor::new(Vec::<u8>::new());
        assert_eq!(read_ack(&mut input).unwrap(), Ack::EndOfStream);
    }

    #[test]
    fn test_read_ack_error_collects_line() {
        let mut input = Cursor::new(b"\x01scp: /nope: No such directory\n\x00".to_vec());
        assert_eq!(
            read_ack(&mut input).unwrap(),
            Ack::Error("scp: /nope: No such directory".into())
        );
        // stops right after the newline
        assert_eq!(read_ack(&mut input).unwrap(), Ack::Ok);
    }

    #[test]
    fn test_read_ack_fatal() {
        let mut input = Cursor::new(b"\x02protocol error\n".to_vec());
        assert_eq!(read_ack(&mut input).unwrap(), Ack::Fatal("protocol error".into()));
    }

    #[test]
    fn test_read_ack_message_without_newline() {
        let mut input = Cursor::new(b"\x01truncated".to_vec());
        assert_eq!(read_ack(&mut input).unwrap(), Ack::Error("truncated".into()));
    }

    #[test]
    fn test_read_ack_unknown_byte_is_violation() {
        let mut input = Cursor::new(b"C0644 1 x\n".to_vec());
        let err = read_ack(&mut input).unwrap_err();
        assert_eq!(err.kind, ScpErrorKind::Protocol);
        assert!(err.message.contains("0x43"));
    }

    #[test]
    fn test_ack_into_result_kinds() {
        assert!(Ack::Ok.into_result("file header").is_ok());

        let err = Ack::Error("denied".into()).into_result("file header").unwrap_err();
        assert_eq!(err.kind, ScpErrorKind::Protocol);
        assert_eq!(err.remote_message.as_deref(), Some("denied"));

        let err = Ack::Fatal("boom".into()).into_result("file data").unwrap_err();
        assert_eq!(err.kind, ScpErrorKind::FatalProtocol);

        let err = Ack::EndOfStream.into_result("file data").unwrap_err();
        assert_eq!(err.kind, ScpErrorKind::Protocol);
        assert!(err.remote_message.is_none());
    }

    #[test]
    fn test_basename() {
        assert_eq!(basename("dir/sub/file1"), "file1");
        assert_eq!(basename("file1"), "file1");
        assert_eq!(basename("/file1"), "file1");
        assert_eq!(basename("./file1"), "file1");
    }

    #[test]
    fn test_control_line() {
        assert_eq!(control_line(0o644, 12345, "file1"), "C0644 12345 file1\n");
        assert_eq!(control_line(0o755, 0, "run.sh"), "C0755 0 run.sh\n");
    }

    #[test]
    fn test_sink_command() {
        assert_eq!(sink_command("file2"), "scp -p -t file2");
        assert_eq!(sink_command("~/in/"), "scp -p -t ~/in/");
    }

    #[test]
    fn test_source_error_line() {
        assert_eq!(
            source_error_line("a: file shrank\nduring transfer"),
            b"\x01scp: a: file shrank during transfer\n".to_vec()
        );
    }
}
