//! Lazily generated install source.

use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, ReadBuf};

use super::fixtures::pattern_byte;

/// An `AsyncRead` yielding `len` bytes of the test pattern without holding
/// them in memory.
#[derive(Debug, Clone)]
pub struct PatternReader {
    len: u64,
    offset: u64,
}

impl PatternReader {
    pub fn new(len: u64) -> Self {
        Self { len, offset: 0 }
    }
}

impl AsyncRead for PatternReader {
    fn poll_read(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        let remaining = (self.len - self.offset).min(buf.remaining() as u64) as usize;
        let start = self.offset;
        let out = buf.initialize_unfilled_to(remaining);
        for (i, byte) in out.iter_mut().enumerate() {
            *byte = pattern_byte(start + i as u64);
        }
        buf.advance(remaining);
        self.offset += remaining as u64;
        Poll::Ready(Ok(()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fixtures::pattern_bytes;
    use tokio::io::AsyncReadExt;

    #[tokio::test]
    async fn test_matches_pattern_bytes() {
        let mut reader = PatternReader::new(1000);
        let mut out = Vec::new();
        reader.read_to_end(&mut out).await.unwrap();
        assert_eq!(out, pattern_bytes(1000));
    }
}
