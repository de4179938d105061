//! Staging software packages on the device.
//!
//! The upload speaks the source side of the scp protocol over a stream the
//! caller has already connected to `scp -t <path>` on the device.

use std::path::Path;

use junos_core::{Error, ProgressLog, Result};
use sha2::{Digest, Sha256};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::debug;

const HASH_CHUNK: usize = 1024 * 1024;
const UPLOAD_CHUNK: usize = 64 * 1024;

/// SHA-256 of a local file, lowercase hex.
///
/// # Errors
///
/// Returns [`Error::Io`] if the file cannot be read.
pub async fn local_sha256(path: &Path) -> Result<String> {
    let mut file = tokio::fs::File::open(path).await?;
    let mut hasher = Sha256::new();
    let mut chunk = vec![0u8; HASH_CHUNK];

    loop {
        let read = file.read(&mut chunk).await?;
        if read == 0 {
            break;
        }
        hasher.update(chunk.get(..read).unwrap_or_default());
    }

    Ok(format!("{:x}", hasher.finalize()))
}

/// A file being sent to an scp sink.
#[derive(Debug, Clone, Copy)]
pub struct Upload<'a> {
    /// Device the copy goes to, for progress lines.
    pub host: &'a str,
    /// File name announced to the sink.
    pub name: &'a str,
    /// Exact number of bytes the source yields.
    pub size: u64,
}

/// Send `source` to an scp sink on `stream`.
///
/// Progress is recorded every ten percent as
/// `<host>: <name>: <pct>% (<sent> / <size>)`.
///
/// # Errors
///
/// Returns [`Error::Transport`] when the sink refuses the file, the stream
/// fails, or the source does not yield exactly `size` bytes.
pub async fn scp_send<S, R>(
    stream: &mut S,
    mut source: R,
    upload: Upload<'_>,
    progress: &dyn ProgressLog,
) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
    R: AsyncRead + Unpin,
{
    let Upload { host, name, size } = upload;

    read_ack(stream).await?;
    send(stream, format!("C0644 {size} {name}\n").as_bytes()).await?;
    read_ack(stream).await?;

    let mut chunk = vec![0u8; UPLOAD_CHUNK];
    let mut sent: u64 = 0;
    let mut reported: u64 = 0;
    loop {
        let read = source.read(&mut chunk).await?;
        if read == 0 {
            break;
        }
        send(stream, chunk.get(..read).unwrap_or_default()).await?;
        sent = sent.saturating_add(u64::try_from(read).unwrap_or(u64::MAX));

        let percent = sent.saturating_mul(100).checked_div(size).unwrap_or(100);
        if percent / 10 > reported / 10 {
            reported = percent;
            progress.record(&format!("{host}: {name}: {percent}% ({sent} / {size})"));
        }
    }

    if sent != size {
        return Err(Error::transport(format!(
            "{name} changed size during the copy ({sent} of {size} bytes)"
        )));
    }

    send(stream, &[0]).await?;
    read_ack(stream).await?;
    debug!(host, name, size, "scp sink acknowledged the file");
    Ok(())
}

async fn send<S: AsyncWrite + Unpin>(stream: &mut S, data: &[u8]) -> Result<()> {
    stream
        .write_all(data)
        .await
        .map_err(|e| Error::transport(format!("copy write failed: {e}")))?;
    stream
        .flush()
        .await
        .map_err(|e| Error::transport(format!("copy flush failed: {e}")))
}

/// A zero byte, or a warning/error code followed by a message line.
async fn read_ack<S: AsyncRead + Unpin>(stream: &mut S) -> Result<()> {
    let mut code = [0u8; 1];
    stream
        .read_exact(&mut code)
        .await
        .map_err(|e| Error::transport(format!("copy ended early: {e}")))?;
    if code == [0] {
        return Ok(());
    }

    let mut line = Vec::new();
    let mut byte = [0u8; 1];
    while stream.read_exact(&mut byte).await.is_ok() && byte != [b'\n'] {
        line.extend_from_slice(&byte);
    }
    Err(Error::transport(format!(
        "copy refused: {}",
        String::from_utf8_lossy(&line).trim()
    )))
}
