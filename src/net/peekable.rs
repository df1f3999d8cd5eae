//! Read-ahead wrapper over a connection stream.
//!
//! Bytes examined with [`PeekableStream::peek`] stay buffered and are the
//! first bytes returned by the next read, in order. Writes and shutdown go
//! straight to the wrapped stream.

use std::io;
use std::net::SocketAddr;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, ReadBuf};
use tokio::net::TcpStream;

/// A stream with a read-ahead buffer.
#[derive(Debug)]
pub struct PeekableStream<S> {
    inner: S,
    buf: Vec<u8>,
    pos: usize,
}

impl<S> PeekableStream<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            buf: Vec::new(),
            pos: 0,
        }
    }

    /// Bytes read ahead but not yet consumed.
    pub fn buffered(&self) -> &[u8] {
        &self.buf[self.pos..]
    }

    pub fn get_ref(&self) -> &S {
        &self.inner
    }

    /// Mutable access to the wrapped stream. Reading from it directly
    /// bypasses any buffered bytes.
    pub fn get_mut(&mut self) -> &mut S {
        &mut self.inner
    }

    /// Split into the wrapped stream and the unconsumed read-ahead bytes.
    pub fn into_parts(mut self) -> (S, Vec<u8>) {
        let rest = self.buf.split_off(self.pos);
        (self.inner, rest)
    }
}

impl<S: AsyncRead + Unpin> PeekableStream<S> {
    /// Return the next `n` bytes without consuming them.
    ///
    /// Fails with `UnexpectedEof` if the peer closes before `n` bytes
    /// arrive; whatever did arrive stays buffered.
    pub async fn peek(&mut self, n: usize) -> io::Result<&[u8]> {
        while self.buffered().len() < n {
            if self.pos > 0 {
                self.buf.drain(..self.pos);
                self.pos = 0;
            }
            self.buf.reserve(n - self.buf.len());
            if self.inner.read_buf(&mut self.buf).await? == 0 {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "connection closed before enough data arrived",
                ));
            }
        }
        Ok(&self.buffered()[..n])
    }
}

impl PeekableStream<TcpStream> {
    pub fn peer_addr(&self) -> io::Result<SocketAddr> {
        self.inner.peer_addr()
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.inner.local_addr()
    }
}

impl<S: AsyncRead + Unpin> AsyncRead for PeekableStream<S> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        out: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        if this.pos < this.buf.len() {
            let pending = &this.buf[this.pos..];
            let n = pending.len().min(out.remaining());
            out.put_slice(&pending[..n]);
            this.pos += n;
            if this.pos == this.buf.len() {
                this.buf.clear();
                this.pos = 0;
            }
            return Poll::Ready(Ok(()));
        }
        Pin::new(&mut this.inner).poll_read(cx, out)
    }
}

impl<S: AsyncWrite + Unpin> AsyncWrite for PeekableStream<S> {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        data: &[u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.get_mut().inner).poll_write(cx, data)
    }

    fn poll_write_vectored(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        bufs: &[io::IoSlice<'_>],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.get_mut().inner).poll_write_vectored(cx, bufs)
    }

    fn is_write_vectored(&self) -> bool {
        self.inner.is_write_vectored()
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_shutdown(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt;

    #[tokio::test]
    async fn peek_does_not_consume() {
        let (mut client, server) = tokio::io::duplex(64);
        client.write_all(b"hello world").await.unwrap();
        drop(client);

        let mut stream = PeekableStream::new(server);
        assert_eq!(stream.peek(1).await.unwrap(), b"h");
        assert_eq!(stream.peek(5).await.unwrap(), b"hello");

        let mut out = Vec::new();
        stream.read_to_end(&mut out).await.unwrap();
        assert_eq!(out, b"hello world");
    }

    #[tokio::test]
    async fn small_reads_drain_buffer_before_inner() {
        let (mut client, server) = tokio::io::duplex(64);
        client.write_all(b"abc").await.unwrap();

        let mut stream = PeekableStream::new(server);
        stream.peek(2).await.unwrap();

        let mut one = [0u8; 1];
        stream.read_exact(&mut one).await.unwrap();
        assert_eq!(&one, b"a");
        assert_eq!(stream.peek(1).await.unwrap(), b"b");

        client.write_all(b"def").await.unwrap();
        drop(client);
        let mut rest = Vec::new();
        stream.read_to_end(&mut rest).await.unwrap();
        assert_eq!(rest, b"bcdef");
    }

    #[tokio::test]
    async fn short_stream_keeps_partial_bytes() {
        let (mut client, server) = tokio::io::duplex(64);
        client.write_all(b"xy").await.unwrap();
        drop(client);

        let mut stream = PeekableStream::new(server);
        let err = stream.peek(4).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
        assert_eq!(stream.buffered(), b"xy");

        let (_, rest) = stream.into_parts();
        assert_eq!(rest, b"xy");
    }

    #[tokio::test]
    async fn writes_pass_through() {
        let (mut client, server) = tokio::io::duplex(64);
        let mut stream = PeekableStream::new(server);
        stream.write_all(b"pong").await.unwrap();
        stream.flush().await.unwrap();

        let mut buf = [0u8; 4];
        client.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"pong");
    }
}
