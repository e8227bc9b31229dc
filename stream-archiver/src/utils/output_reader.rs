//! Record-oriented reader for child process output.
//!
//! Recorders such as ffmpeg and yt-dlp redraw progress with bare `\r` and may
//! print bytes that are not valid UTF-8. Records are split on either `\n` or
//! `\r` and decoded lossily so the pipe is always drained until EOF.

use std::io;

use tokio::io::{AsyncRead, AsyncReadExt, BufReader};

/// Longest record kept in memory before it is emitted as-is.
const MAX_RECORD_LEN: usize = 64 * 1024;

/// Yields non-empty text records from an output pipe.
pub struct RecordReader<R> {
    reader: BufReader<R>,
    pending: Vec<u8>,
}

impl<R> RecordReader<R>
where
    R: AsyncRead + Unpin,
{
    pub fn new(reader: R) -> Self {
        Self {
            reader: BufReader::new(reader),
            pending: Vec::new(),
        }
    }

    /// Next record, or `None` at EOF.
    ///
    /// Runs of delimiters are collapsed and whitespace-only records skipped.
    pub async fn next_record(&mut self) -> io::Result<Option<String>> {
        loop {
            if let Some(end) = self.pending.iter().position(|&b| is_delimiter(b)) {
                let record: Vec<u8> = self.pending.drain(..end).collect();
                let skip = self
                    .pending
                    .iter()
                    .take_while(|&&b| is_delimiter(b))
                    .count();
                self.pending.drain(..skip);

                match decode(&record) {
                    Some(record) => return Ok(Some(record)),
                    None => continue,
                }
            }

            if self.pending.len() >= MAX_RECORD_LEN {
                let record = std::mem::take(&mut self.pending);
                if let Some(record) = decode(&record) {
                    return Ok(Some(record));
                }
                continue;
            }

            let read = self.reader.read_buf(&mut self.pending).await?;
            if read == 0 {
                let rest = std::mem::take(&mut self.pending);
                return Ok(decode(&rest));
            }
        }
    }
}

fn is_delimiter(b: u8) -> bool {
    matches!(b, b'\n' | b'\r')
}

fn decode(bytes: &[u8]) -> Option<String> {
    let text = String::from_utf8_lossy(bytes);
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}
