use std::io;
use std::path::Path;
use std::pin::Pin;
use std::task::{Context, Poll};

use pin_project::pin_project;
use tokio::io::{AsyncRead, AsyncSeek, AsyncSeekExt, ReadBuf};

use crate::{AsyncSeekStart, ContentSource};

/// Implements [`ContentSource`] for any [`AsyncRead`] and
/// [`AsyncSeekStart`] by pairing it with a fixed byte size.
#[pin_project]
#[derive(Debug)]
pub struct SizedReader<B> {
    byte_size: u64,
    #[pin]
    body: B,
}

impl SizedReader<tokio::fs::File> {
    /// Open a file and take its size from metadata.
    pub async fn open(path: impl AsRef<Path>) -> io::Result<SizedReader<tokio::fs::File>> {
        let file = tokio::fs::File::open(path).await?;
        let byte_size = file.metadata().await?.len();
        Ok(SizedReader { byte_size, body: file })
    }
}

impl<B: AsyncRead + AsyncSeekStart> SizedReader<B> {
    /// Wrap a reader whose size is already known.
    pub fn with_size(body: B, byte_size: u64) -> Self {
        SizedReader { byte_size, body }
    }
}

impl<B: AsyncRead + AsyncSeek + Unpin> SizedReader<B> {
    /// Determine size by seeking to the end of the reader.
    pub async fn seek(mut body: B) -> io::Result<SizedReader<B>> {
        let byte_size = Pin::new(&mut body).seek(io::SeekFrom::End(0)).await?;
        Ok(SizedReader { byte_size, body })
    }
}

impl<B: AsyncRead + AsyncSeekStart> AsyncRead for SizedReader<B> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        self.project().body.poll_read(cx, buf)
    }
}

impl<B: AsyncRead + AsyncSeekStart> AsyncSeekStart for SizedReader<B> {
    fn start_seek(self: Pin<&mut Self>, position: u64) -> io::Result<()> {
        self.project().body.start_seek(position)
    }

    fn poll_complete(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        self.project().body.poll_complete(cx)
    }
}

impl<B: AsyncRead + AsyncSeekStart> ContentSource for SizedReader<B> {
    fn byte_size(&self) -> u64 {
        self.byte_size
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use crate::ContentSource;

    use super::SizedReader;

    #[tokio::test]
    async fn test_open_reads_size_from_metadata() {
        let reader = SizedReader::open("test/fixture.txt").await.unwrap();
        let expected = std::fs::metadata("test/fixture.txt").unwrap().len();
        assert_eq!(expected, reader.byte_size());
    }

    #[tokio::test]
    async fn test_seek_determines_size() {
        let reader = SizedReader::seek(Cursor::new(vec![0u8; 321])).await.unwrap();
        assert_eq!(321, reader.byte_size());
    }

    #[tokio::test]
    async fn test_with_size() {
        let reader = SizedReader::with_size(Cursor::new(vec![0u8; 10]), 10);
        assert_eq!(10, reader.byte_size());
    }
}
