//! Control line reader
//!
//! Reads one control line at a time, stopping at CR or LF. Lines longer than
//! the configured cap are drained up to the next terminator and reported as
//! `Overflow` so nothing truncated is ever executed.

use std::io;

use tokio::io::{AsyncBufRead, AsyncReadExt};

use crate::protocol::encoding::TextEncoding;

#[derive(Debug, PartialEq, Eq)]
pub enum ControlLine {
    /// A decoded, trimmed line. May be empty (the LF after a CR).
    Command(String),
    /// The line hit the length cap before a terminator.
    Overflow,
}

fn is_terminator(byte: u8) -> bool {
    byte == b'\r' || byte == b'\n'
}

/// Read the next control line. Returns `Ok(None)` at end of stream.
pub async fn read_control_line<R>(
    reader: &mut R,
    encoding: TextEncoding,
    max_len: usize,
) -> io::Result<Option<ControlLine>>
where
    R: AsyncBufRead + Unpin,
{
    let mut buf = Vec::with_capacity(64);

    loop {
        let byte = match reader.read_u8().await {
            Ok(b) => b,
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                if buf.is_empty() {
                    return Ok(None);
                }
                break;
            }
            Err(e) => return Err(e),
        };

        if is_terminator(byte) {
            break;
        }

        if buf.len() >= max_len {
            discard_rest_of_line(reader).await?;
            return Ok(Some(ControlLine::Overflow));
        }
        buf.push(byte);
    }

    Ok(Some(ControlLine::Command(
        encoding.decode(&buf).trim().to_string(),
    )))
}

async fn discard_rest_of_line<R>(reader: &mut R) -> io::Result<()>
where
    R: AsyncBufRead + Unpin,
{
    loop {
        match reader.read_u8().await {
            Ok(b) if is_terminator(b) => return Ok(()),
            Ok(_) => {}
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(()),
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::BufReader;

    async fn read_all(input: &[u8], max_len: usize) -> Vec<ControlLine> {
        let mut reader = BufReader::new(input);
        let mut lines = Vec::new();
        while let Some(line) = read_control_line(&mut reader, TextEncoding::Utf8, max_len)
            .await
            .unwrap()
        {
            lines.push(line);
        }
        lines
    }

    #[tokio::test]
    async fn crlf_yields_a_command_then_an_empty_line() {
        let lines = read_all(b"USER bob\r\nNOOP\n", 1024).await;
        assert_eq!(
            lines,
            vec![
                ControlLine::Command("USER bob".into()),
                ControlLine::Command(String::new()),
                ControlLine::Command("NOOP".into()),
            ]
        );
    }

    #[tokio::test]
    async fn unterminated_last_line_is_still_returned() {
        let lines = read_all(b"QUIT", 1024).await;
        assert_eq!(lines, vec![ControlLine::Command("QUIT".into())]);
    }

    #[tokio::test]
    async fn overlong_line_is_discarded_up_to_the_terminator() {
        let lines = read_all(b"DELE aaaaaaaaaaaaaaaaaaaa\nNOOP\n", 8).await;
        assert_eq!(
            lines,
            vec![ControlLine::Overflow, ControlLine::Command("NOOP".into())]
        );
    }

    #[tokio::test]
    async fn line_exactly_at_the_cap_is_accepted() {
        let lines = read_all(b"NOOP\n", 4).await;
        assert_eq!(lines, vec![ControlLine::Command("NOOP".into())]);
    }

    #[tokio::test]
    async fn latin1_bytes_decode_per_session_encoding() {
        let mut reader = BufReader::new(&b"CWD r\xe4k\n"[..]);
        let line = read_control_line(&mut reader, TextEncoding::Latin1, 64)
            .await
            .unwrap();
        assert_eq!(line, Some(ControlLine::Command("CWD räk".into())));
    }
}
