//! Output relay for subprocess stdout/stderr.

use std::borrow::Cow;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::sync::mpsc;

/// Size of a single relay read. Output is forwarded in chunks of at most this
/// many bytes, so a script that never prints a newline is still relayed live.
const RELAY_CHUNK_SIZE: usize = 8 * 1024;

/// Which pipe a chunk came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputStream {
    Stdout,
    Stderr,
}

/// A chunk of subprocess output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputChunk {
    pub stream: OutputStream,
    pub data: Vec<u8>,
}

impl OutputChunk {
    /// Lossy UTF-8 view of the chunk.
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.data)
    }
}

/// Where subprocess output is relayed to.
#[derive(Debug, Clone, Default)]
pub enum OutputSink {
    /// Write to this process's own stdout/stderr.
    #[default]
    Inherit,
    /// Forward chunks over a bounded channel. A slow receiver applies
    /// back-pressure to the relay instead of growing a buffer.
    Channel(mpsc::Sender<OutputChunk>),
    /// Drain and drop.
    Discard,
}

impl OutputSink {
    /// Create a channel sink and its receiving end.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<OutputChunk>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (OutputSink::Channel(tx), rx)
    }

    /// Deliver one chunk. Returns false once the sink can no longer accept
    /// output; the caller keeps draining the pipe regardless.
    async fn write(&self, chunk: OutputChunk) -> bool {
        match self {
            OutputSink::Inherit => {
                let result = match chunk.stream {
                    OutputStream::Stdout => write_all(tokio::io::stdout(), &chunk.data).await,
                    OutputStream::Stderr => write_all(tokio::io::stderr(), &chunk.data).await,
                };
                result.is_ok()
            }
            OutputSink::Channel(tx) => tx.send(chunk).await.is_ok(),
            OutputSink::Discard => true,
        }
    }
}

async fn write_all<W: tokio::io::AsyncWrite + Unpin>(mut out: W, data: &[u8]) -> std::io::Result<()> {
    out.write_all(data).await?;
    out.flush().await
}

/// Drain `reader` to EOF, forwarding every chunk to `sink`.
///
/// Returns the number of bytes read from the pipe.
pub(crate) async fn relay<R>(mut reader: R, stream: OutputStream, sink: OutputSink) -> u64
where
    R: AsyncRead + Unpin,
{
    let mut buf = vec![0u8; RELAY_CHUNK_SIZE];
    let mut total = 0u64;
    let mut sink_open = true;

    loop {
        let n = match reader.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) => {
                tracing::warn!(?stream, error = %e, "Output relay read failed");
                break;
            }
        };
        total += n as u64;

        if sink_open {
            let chunk = OutputChunk {
                stream,
                data: buf[..n].to_vec(),
            };
            if !sink.write(chunk).await {
                tracing::debug!(?stream, "Output sink closed, discarding remaining output");
                sink_open = false;
            }
        }
    }

    total
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_relay_to_channel() {
        let (sink, mut rx) = OutputSink::channel(4);
        let input: &[u8] = b"hello\nworld\n";

        let total = relay(input, OutputStream::Stdout, sink).await;
        assert_eq!(total, 12);

        let mut collected = Vec::new();
        while let Some(chunk) = rx.recv().await {
            assert_eq!(chunk.stream, OutputStream::Stdout);
            collected.extend_from_slice(&chunk.data);
        }
        assert_eq!(collected, b"hello\nworld\n");
    }

    #[tokio::test]
    async fn test_relay_splits_large_output() {
        let (sink, mut rx) = OutputSink::channel(16);
        let input = vec![b'x'; RELAY_CHUNK_SIZE * 2 + 10];

        let handle = tokio::spawn(relay(std::io::Cursor::new(input), OutputStream::Stderr, sink));

        let mut chunks = 0;
        let mut bytes = 0;
        while let Some(chunk) = rx.recv().await {
            assert!(chunk.data.len() <= RELAY_CHUNK_SIZE);
            chunks += 1;
            bytes += chunk.data.len();
        }
        assert!(chunks >= 3);
        assert_eq!(bytes, RELAY_CHUNK_SIZE * 2 + 10);
        assert_eq!(handle.await.unwrap(), (RELAY_CHUNK_SIZE * 2 + 10) as u64);
    }

    #[tokio::test]
    async fn test_relay_keeps_draining_after_receiver_dropped() {
        let (sink, rx) = OutputSink::channel(1);
        drop(rx);

        let input: &[u8] = b"nobody is listening";
        let total = relay(input, OutputStream::Stdout, sink).await;
        assert_eq!(total, 19);
    }

    #[tokio::test]
    async fn test_relay_discard() {
        let input: &[u8] = b"dropped";
        assert_eq!(relay(input, OutputStream::Stdout, OutputSink::Discard).await, 7);
    }

    #[test]
    fn test_chunk_text_is_lossy() {
        let chunk = OutputChunk {
            stream: OutputStream::Stdout,
            data: vec![b'o', b'k', 0xff],
        };
        assert!(chunk.text().starts_with("ok"));
    }
}
