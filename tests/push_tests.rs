use std::cell::RefCell;
use std::io::{self, Cursor, Read, Write};
use std::rc::Rc;

use scp_push_lib::push_over;
use scp_source::scp::config::ScpClientSettings;
use scp_source::scp::{
    CipherDirection, CommandChannel, CredentialProvider, ScpError, ScpErrorKind, ScpResult,
    ScpTransport,
};
use tempfile::NamedTempFile;

#[derive(Default)]
struct Recorded {
    written: Vec<u8>,
    commands: Vec<String>,
    preferences: Vec<CipherDirection>,
    rekeys: usize,
    closed: bool,
    aborted: bool,
}

struct FakeChannel {
    remote: Cursor<Vec<u8>>,
    rec: Rc<RefCell<Recorded>>,
}

impl Read for FakeChannel {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.remote.read(buf)
    }
}

impl Write for FakeChannel {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.rec.borrow_mut().written.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl CommandChannel for FakeChannel {
    fn close(&mut self) -> ScpResult<()> {
        self.rec.borrow_mut().closed = true;
        Ok(())
    }

    fn abort(&mut self) -> ScpResult<()> {
        self.rec.borrow_mut().aborted = true;
        Ok(())
    }
}

/// Server that answers with a fixed byte script and may or may not rekey.
struct FakeServer {
    remote: Vec<u8>,
    can_rekey: bool,
    rekeyed: bool,
    rec: Rc<RefCell<Recorded>>,
}

impl FakeServer {
    fn new(remote: &[u8], can_rekey: bool) -> Self {
        Self {
            remote: remote.to_vec(),
            can_rekey,
            rekeyed: false,
            rec: Rc::default(),
        }
    }
}

impl ScpTransport for FakeServer {
    type Channel = FakeChannel;

    fn set_cipher_preference(&mut self, direction: CipherDirection, _: &[String]) -> ScpResult<()> {
        self.rec.borrow_mut().preferences.push(direction);
        Ok(())
    }

    fn force_rekey(&mut self) -> ScpResult<()> {
        if !self.can_rekey {
            return Err(ScpError::unsupported("no client rekey"));
        }
        self.rekeyed = true;
        self.rec.borrow_mut().rekeys += 1;
        Ok(())
    }

    fn open_command_channel(&mut self, command: &str) -> ScpResult<FakeChannel> {
        self.rec.borrow_mut().commands.push(command.to_string());
        Ok(FakeChannel {
            remote: Cursor::new(self.remote.clone()),
            rec: Rc::clone(&self.rec),
        })
    }

    fn negotiated_cipher(&self) -> Option<String> {
        Some(if self.rekeyed { "none" } else { "aes256-ctr" }.to_string())
    }

    fn disconnect(&mut self) -> ScpResult<()> {
        Ok(())
    }
}

fn local_file(contents: &[u8]) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(contents).unwrap();
    file.flush().unwrap();
    file
}

#[test]
fn test_push_with_cipher_downgrade() {
    let file = local_file(b"hello");
    let name = file.path().file_name().unwrap().to_string_lossy().to_string();
    let mut server = FakeServer::new(&[0, 0, 0], true);

    let report = push_over(&mut server, &ScpClientSettings::default(), file.path(), "file2").unwrap();

    assert_eq!(report.bytes_transferred, 5);
    assert!(report.encryption_disabled);
    assert_eq!(report.negotiated_cipher.as_deref(), Some("none"));

    let rec = server.rec.borrow();
    assert_eq!(rec.preferences, vec![CipherDirection::ServerToClient, CipherDirection::ClientToServer]);
    assert_eq!(rec.rekeys, 1);
    assert_eq!(rec.commands, vec!["scp -p -t file2".to_string()]);

    let mut expected = format!("C0644 5 {}\n", name).into_bytes();
    expected.extend_from_slice(b"hello\0");
    assert_eq!(rec.written, expected);
    assert!(rec.closed);
    assert!(!rec.aborted);
}

#[test]
fn test_push_when_rekey_unavailable() {
    let file = local_file(b"data");
    let mut server = FakeServer::new(&[0, 0, 0], false);

    let report = push_over(&mut server, &ScpClientSettings::default(), file.path(), "/tmp/x").unwrap();

    assert_eq!(report.bytes_transferred, 4);
    assert!(!report.encryption_disabled);
    assert_eq!(report.negotiated_cipher.as_deref(), Some("aes256-ctr"));
}

#[test]
fn test_keep_encryption_skips_downgrade() {
    let file = local_file(b"data");
    let settings = ScpClientSettings {
        disable_encryption: false,
        ..ScpClientSettings::default()
    };
    let mut server = FakeServer::new(&[0, 0, 0], true);

    let report = push_over(&mut server, &settings, file.path(), "out").unwrap();

    assert!(!report.encryption_disabled);
    let rec = server.rec.borrow();
    assert!(rec.preferences.is_empty());
    assert_eq!(rec.rekeys, 0);
}

#[test]
fn test_remote_refusal_is_reported() {
    let file = local_file(b"hello");
    let mut remote = vec![1u8];
    remote.extend_from_slice(b"scp: /nope: No such file or directory\n");
    let mut server = FakeServer::new(&remote, true);

    let err = push_over(&mut server, &ScpClientSettings::default(), file.path(), "/nope/x").unwrap_err();

    assert_eq!(err.kind, ScpErrorKind::Protocol);
    assert_eq!(err.kind.exit_code(), 5);
    assert!(err.remote_message.unwrap().contains("No such file or directory"));

    let rec = server.rec.borrow();
    assert!(rec.written.is_empty());
    assert!(rec.aborted);
    assert!(!rec.closed);
}

#[test]
fn test_missing_local_file_never_opens_channel() {
    let mut server = FakeServer::new(&[0, 0, 0], true);

    let err = push_over(
        &mut server,
        &ScpClientSettings::default(),
        std::path::Path::new("/definitely/not/here"),
        "x",
    )
    .unwrap_err();

    assert_eq!(err.kind, ScpErrorKind::Io);
    assert!(server.rec.borrow().commands.is_empty());
}

#[test]
fn test_small_chunks_deliver_whole_payload() {
    let payload: Vec<u8> = (0..=255u8).cycle().take(10_000).collect();
    let file = local_file(&payload);
    let settings = ScpClientSettings {
        chunk_size: 3,
        ..ScpClientSettings::default()
    };
    let mut server = FakeServer::new(&[0, 0, 0], true);

    let report = push_over(&mut server, &settings, file.path(), "out").unwrap();

    assert_eq!(report.bytes_transferred, 10_000);
    let rec = server.rec.borrow();
    let header_end = rec.written.iter().position(|&b| b == b'\n').unwrap() + 1;
    assert_eq!(&rec.written[header_end..header_end + payload.len()], &payload[..]);
    assert_eq!(rec.written.last(), Some(&0u8));
}

#[test]
fn test_environment_passphrase_reaches_key_unlock() {
    use scp_push_lib::credential_provider;
    use secrecy::{ExposeSecret, SecretString};

    let mut credentials = credential_provider(None, Some(SecretString::new("pp".into())), false);

    let passphrase = credentials
        .passphrase(std::path::Path::new("/keys/id_ed25519"))
        .unwrap()
        .unwrap();
    assert_eq!(passphrase.expose_secret(), "pp");
    assert!(!credentials.confirm("Trust host key?").unwrap());
}

#[test]
fn test_batch_without_secrets_never_prompts() {
    use scp_push_lib::credential_provider;

    let mut credentials = credential_provider(None, None, true);

    assert!(credentials.passphrase(std::path::Path::new("/k")).unwrap().is_none());
    let err = credentials.password("alice", "host").unwrap_err();
    assert_eq!(err.kind, ScpErrorKind::Auth);
}
