// ── Transfer engine – single-file SCP push with chunked I/O ──────────────────

use crate::scp::error::{ScpError, ScpResult};
use crate::scp::protocol::{
    basename, control_line, read_ack, sink_command, source_error_line, END_OF_DATA,
};
use crate::scp::transport::{CommandChannel, ScpTransport};
use crate::scp::types::*;
use log::{debug, info, warn};
use std::fs::File;
use std::io::{ErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

impl ScpTransferRequest {
    /// Stat `local_path` once and freeze what will be announced to the sink.
    pub fn from_local(local_path: impl Into<PathBuf>, remote_path: &str) -> ScpResult<Self> {
        let local_path = local_path.into();
        let metadata = std::fs::metadata(&local_path).map_err(|e| {
            ScpError::from(e).context(format!("cannot read local file '{}'", local_path.display()))
        })?;
        if !metadata.is_file() {
            return Err(ScpError::io_error(format!(
                "'{}' is not a regular file",
                local_path.display()
            )));
        }

        let request = Self {
            local_path,
            remote_path: remote_path.to_string(),
            file_mode: SCP_FILE_MODE,
            size: metadata.len(),
        };
        let name = request.file_name();
        if name.is_empty() || name.contains('\n') {
            return Err(ScpError::usage(format!(
                "cannot send '{}': file name must be non-empty and single-line",
                request.local_path.display()
            )));
        }
        Ok(request)
    }

    /// Name announced in the control line.
    pub fn file_name(&self) -> String {
        basename(&self.local_path.to_string_lossy()).to_string()
    }
}

/// Runs the source side of SCP for one file over a borrowed transport.
pub struct ScpSourceSession<'t, T: ScpTransport> {
    transport: &'t mut T,
    chunk_size: usize,
}

impl<'t, T: ScpTransport> ScpSourceSession<'t, T> {
    pub fn new(transport: &'t mut T) -> Self {
        Self {
            transport,
            chunk_size: default_chunk_size(),
        }
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Push `local_path` to `remote_path`.
    ///
    /// The command channel is closed on every exit path; the session itself
    /// stays open and belongs to the caller.
    pub fn transfer(
        &mut self,
        local_path: impl AsRef<Path>,
        remote_path: &str,
    ) -> ScpResult<ScpTransferReport> {
        let request = ScpTransferRequest::from_local(local_path.as_ref(), remote_path)?;
        let started = Instant::now();

        info!(
            "SCP sending '{}' ({} bytes) to '{}'",
            request.local_path.display(),
            request.size,
            request.remote_path
        );

        let mut channel = self
            .transport
            .open_command_channel(&sink_command(&request.remote_path))?;

        let transferred = match send_file(&mut channel, &request, self.chunk_size) {
            Ok(n) => n,
            Err(e) => {
                if let Err(close_err) = channel.abort() {
                    warn!("SCP channel cleanup after failure: {}", close_err);
                }
                return Err(e);
            }
        };

        channel.close()?;

        let duration = started.elapsed().as_millis().max(1) as u64;
        let avg_speed = transferred as f64 / (duration as f64 / 1000.0);

        info!(
            "SCP uploaded {} bytes to {} in {} ms",
            transferred, request.remote_path, duration
        );

        Ok(ScpTransferReport {
            local_path: request.local_path.to_string_lossy().to_string(),
            remote_path: request.remote_path.clone(),
            bytes_transferred: transferred,
            duration_ms: duration,
            average_speed: avg_speed,
            negotiated_cipher: self.transport.negotiated_cipher(),
            encryption_disabled: false,
        })
    }
}

/// Push one file with the default chunk size.
pub fn transfer<T: ScpTransport>(
    transport: &mut T,
    local_path: impl AsRef<Path>,
    remote_path: &str,
) -> ScpResult<ScpTransferReport> {
    ScpSourceSession::new(transport).transfer(local_path, remote_path)
}

/// The acknowledgement handshake on an already started `scp -t` channel.
///
/// Returns the number of payload bytes written, always `request.size`.
pub fn send_file<C: Read + Write + ?Sized>(
    channel: &mut C,
    request: &ScpTransferRequest,
    chunk_size: usize,
) -> ScpResult<u64> {
    read_ack(channel)?.into_result("the sink command")?;

    let mut file = File::open(&request.local_path).map_err(|e| {
        ScpError::from(e).context(format!("cannot open '{}'", request.local_path.display()))
    })?;

    let name = request.file_name();
    let header = control_line(request.file_mode, request.size, &name);
    debug!("SCP header: {}", header.trim_end());
    write_flushed(channel, header.as_bytes(), "file header")?;
    read_ack(channel)?.into_result("the file header")?;

    let read = stream_payload(&mut file, channel, request.size, chunk_size.max(1))?;
    drop(file);

    if read < request.size {
        let msg = format!("{}: file shrank during transfer", name);
        warn!(
            "SCP '{}' yielded {} of {} bytes; remainder sent as zeros",
            request.local_path.display(),
            read,
            request.size
        );
        write_flushed(channel, &source_error_line(&msg), "error notice")?;
        return Err(ScpError::io_error(msg));
    }

    write_flushed(channel, &[END_OF_DATA], "end-of-data marker")?;
    read_ack(channel)?.into_result("the file data")?;
    Ok(request.size)
}

/// Copy exactly `size` bytes to `sink`, zero-filling whatever the source no
/// longer has. Returns how many bytes actually came from `source`.
fn stream_payload<R: Read, W: Write + ?Sized>(
    source: &mut R,
    sink: &mut W,
    size: u64,
    chunk_size: usize,
) -> ScpResult<u64> {
    let chunk_size = chunk_size
        .min(usize::try_from(size).unwrap_or(usize::MAX))
        .max(1);
    let mut buffer = vec![0u8; chunk_size];
    let mut remaining = size;
    let mut from_source: u64 = 0;
    let mut exhausted = false;

    while remaining > 0 {
        let want = remaining.min(chunk_size as u64) as usize;
        let n = if exhausted {
            0
        } else {
            fill_from(source, &mut buffer[..want])?
        };
        if n < want {
            exhausted = true;
            buffer[n..want].fill(0);
        }

        write_flushed(sink, &buffer[..want], "file data")?;

        from_source += n as u64;
        remaining -= want as u64;
    }

    Ok(from_source)
}

/// Read until `buf` is full or the source ends.
fn fill_from<R: Read>(source: &mut R, buf: &mut [u8]) -> ScpResult<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match source.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(ScpError::from(e).context("local read error")),
        }
    }
    Ok(filled)
}

fn write_flushed<W: Write + ?Sized>(sink: &mut W, bytes: &[u8], what: &str) -> ScpResult<()> {
    sink.write_all(bytes)
        .and_then(|_| sink.flush())
        .map_err(|e| ScpError::from(e).context(format!("sending {}", what)))
}
