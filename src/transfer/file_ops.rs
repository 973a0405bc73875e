//! Module `file_ops`
//!
//! Streams file contents and directory listings across an open data
//! connection. Everything here is generic over the async I/O traits so the
//! same code runs on TCP streams and in-memory pipes.

use std::io::SeekFrom;
use std::path::Path;
use std::time::{Duration, Instant};

use log::debug;
use tokio::fs::{File, OpenOptions};
use tokio::io::{
    self, AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncSeekExt, AsyncWrite, AsyncWriteExt,
    BufReader,
};

use crate::error::TransferError;
use crate::protocol::encoding::TextEncoding;
use crate::transfer::modes::TransferMode;

#[cfg(windows)]
const LINE_ENDING: &[u8] = b"\r\n";
#[cfg(not(windows))]
const LINE_ENDING: &[u8] = b"\n";

/// Bytes moved and wall time spent by one transfer.
#[derive(Debug, Clone, Copy)]
pub struct TransferStats {
    pub bytes: u64,
    pub elapsed: Duration,
}

impl TransferStats {
    fn since(start: Instant, bytes: u64) -> Self {
        Self {
            bytes,
            elapsed: start.elapsed(),
        }
    }

    pub fn kib_per_sec(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64().max(0.001);
        self.bytes as f64 / 1024.0 / secs
    }

    /// Text of the `226` reply.
    pub fn completion_message(&self) -> String {
        format!("Transfer complete - {:.1} KB/s", self.kib_per_sec())
    }
}

/// How STOR/APPE open the destination file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    Truncate,
    Append,
}

/// Decide how an upload writes, given the pending restart offset and the
/// current length of the destination (`None` if it does not exist).
///
/// APPE always appends. STOR truncates at offset 0 and appends when the
/// offset equals the current length; any other offset is refused.
pub fn store_write_mode(
    append_requested: bool,
    offset: u64,
    current_len: Option<u64>,
) -> Result<WriteMode, TransferError> {
    if append_requested {
        return Ok(WriteMode::Append);
    }
    if offset == 0 {
        return Ok(WriteMode::Truncate);
    }
    match current_len {
        Some(length) if length == offset => Ok(WriteMode::Append),
        other => Err(TransferError::RestartMismatch {
            offset,
            length: other.unwrap_or(0),
        }),
    }
}

/// Open a file for download positioned at `offset`.
pub async fn open_for_retrieve(path: &Path, offset: u64) -> io::Result<File> {
    let mut file = File::open(path).await?;
    if offset > 0 {
        file.seek(SeekFrom::Start(offset)).await?;
    }
    Ok(file)
}

/// Open (creating if needed) a file for upload.
pub async fn open_for_store(path: &Path, mode: WriteMode) -> io::Result<File> {
    let mut options = OpenOptions::new();
    options.create(true);
    match mode {
        WriteMode::Truncate => options.write(true).truncate(true),
        WriteMode::Append => options.append(true),
    };
    options.open(path).await
}

/// Copy a file to the data connection in chunks of `buffer_size`.
pub async fn send_file<R, W>(
    file: &mut R,
    data: &mut W,
    buffer_size: usize,
) -> io::Result<TransferStats>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let start = Instant::now();
    let mut buffer = vec![0u8; buffer_size];
    let mut total = 0u64;

    loop {
        let n = file.read(&mut buffer).await?;
        if n == 0 {
            break;
        }
        data.write_all(&buffer[..n]).await?;
        total += n as u64;
    }
    data.flush().await?;

    debug!("Sent {total} bytes");
    Ok(TransferStats::since(start, total))
}

/// Copy the data connection into a file until the client closes it.
///
/// Binary mode copies bytes verbatim. Text mode splits on LF, strips a
/// trailing CR, and writes each line with the host line ending.
pub async fn receive_file<R, W>(
    data: &mut R,
    file: &mut W,
    mode: TransferMode,
    buffer_size: usize,
) -> io::Result<TransferStats>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let start = Instant::now();
    let mut total = 0u64;

    match mode {
        TransferMode::Binary => {
            let mut buffer = vec![0u8; buffer_size];
            loop {
                let n = data.read(&mut buffer).await?;
                if n == 0 {
                    break;
                }
                file.write_all(&buffer[..n]).await?;
                total += n as u64;
            }
        }
        TransferMode::Text => {
            let mut reader = BufReader::with_capacity(buffer_size, data);
            let mut line = Vec::new();
            loop {
                line.clear();
                let n = reader.read_until(b'\n', &mut line).await?;
                if n == 0 {
                    break;
                }
                total += n as u64;

                if line.last() == Some(&b'\n') {
                    line.pop();
                }
                if line.last() == Some(&b'\r') {
                    line.pop();
                }
                file.write_all(&line).await?;
                file.write_all(LINE_ENDING).await?;
            }
        }
    }
    file.flush().await?;

    debug!("Received {total} bytes");
    Ok(TransferStats::since(start, total))
}

/// Write listing lines, CRLF-terminated, in the session encoding.
pub async fn send_listing<W>(
    lines: &[String],
    data: &mut W,
    encoding: TextEncoding,
) -> io::Result<TransferStats>
where
    W: AsyncWrite + Unpin,
{
    let start = Instant::now();
    let mut total = 0u64;

    for line in lines {
        let mut bytes = encoding.encode(line);
        bytes.extend_from_slice(b"\r\n");
        data.write_all(&bytes).await?;
        total += bytes.len() as u64;
    }
    data.flush().await?;

    Ok(TransferStats::since(start, total))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_mode_policy() {
        assert_eq!(store_write_mode(true, 7, None).unwrap(), WriteMode::Append);
        assert_eq!(store_write_mode(false, 0, Some(10)).unwrap(), WriteMode::Truncate);
        assert_eq!(store_write_mode(false, 10, Some(10)).unwrap(), WriteMode::Append);
        assert!(matches!(
            store_write_mode(false, 5, Some(10)),
            Err(TransferError::RestartMismatch {
                offset: 5,
                length: 10
            })
        ));
        assert!(store_write_mode(false, 5, None).is_err());
    }

    #[test]
    fn completion_message_has_one_decimal() {
        let stats = TransferStats {
            bytes: 2048,
            elapsed: Duration::from_secs(2),
        };
        assert_eq!(stats.completion_message(), "Transfer complete - 1.0 KB/s");
    }

    #[tokio::test]
    async fn retrieve_honours_the_restart_offset() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blob");
        let content: Vec<u8> = (0..200u8).collect();
        std::fs::write(&path, &content).unwrap();

        let mut file = open_for_retrieve(&path, 50).await.unwrap();
        let mut out = Vec::new();
        let stats = send_file(&mut file, &mut out, 16).await.unwrap();

        assert_eq!(stats.bytes, 150);
        assert_eq!(out, &content[50..]);
    }

    #[tokio::test]
    async fn binary_upload_is_verbatim() {
        let input = b"a\r\nb\n\x00\xff".to_vec();
        let mut out = Vec::new();
        receive_file(&mut &input[..], &mut out, TransferMode::Binary, 4)
            .await
            .unwrap();
        assert_eq!(out, input);
    }

    #[cfg(not(windows))]
    #[tokio::test]
    async fn text_upload_reframes_lines() {
        let input = b"one\r\ntwo\nthree".to_vec();
        let mut out = Vec::new();
        let stats = receive_file(&mut &input[..], &mut out, TransferMode::Text, 4)
            .await
            .unwrap();
        assert_eq!(out, b"one\ntwo\nthree\n");
        assert_eq!(stats.bytes, input.len() as u64);
    }

    #[tokio::test]
    async fn append_mode_extends_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log");
        std::fs::write(&path, b"head").unwrap();

        let mut file = open_for_store(&path, WriteMode::Append).await.unwrap();
        receive_file(&mut &b"tail"[..], &mut file, TransferMode::Binary, 8)
            .await
            .unwrap();
        drop(file);
        assert_eq!(std::fs::read(&path).unwrap(), b"headtail");

        let mut file = open_for_store(&path, WriteMode::Truncate).await.unwrap();
        receive_file(&mut &b"new"[..], &mut file, TransferMode::Binary, 8)
            .await
            .unwrap();
        drop(file);
        assert_eq!(std::fs::read(&path).unwrap(), b"new");
    }

    #[tokio::test]
    async fn listing_lines_end_with_crlf() {
        let mut out = Vec::new();
        send_listing(&["a".into(), "b".into()], &mut out, TextEncoding::Utf8)
            .await
            .unwrap();
        assert_eq!(out, b"a\r\nb\r\n");
    }
}
