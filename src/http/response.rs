//! Streaming HTTP/1.0 response writer.
//!
//! Every response has the same shape:
//! ```text
//! HTTP/1.0 [CODE] [REASON] CRLF
//! Content-Type: [TYPE] CRLF
//! CRLF
//! [BODY]
//! ```
//! No other header is ever emitted, the end of the body is signalled by
//! closing the connection.

use crate::{errors::ErrorKind, http::types::StatusCode};
use std::time::Duration;
use tokio::io::AsyncWrite;

/// Tracks what has already been put on the wire for one connection.
///
/// Once the status line is sent it cannot be taken back: a failure after
/// [`head`](Response::head) can only be logged and the connection closed.
/// [`error`](Response::error) is therefore only valid while nothing was written.
///
/// # Panics
/// Methods called out of order panic in `debug` mode.
#[derive(Debug)]
pub(crate) struct Response {
    state: ResponseState,
    status: Option<StatusCode>,
    body_len: u64,
    write_timeout: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum ResponseState {
    Clean,
    Streaming,
    Complete,
}

impl Response {
    #[inline]
    pub(crate) fn new(write_timeout: Duration) -> Self {
        Self {
            state: ResponseState::Clean,
            status: None,
            body_len: 0,
            write_timeout,
        }
    }

    /// `true` once any byte of the status line may have reached the client.
    #[inline]
    pub(crate) fn is_started(&self) -> bool {
        self.state != ResponseState::Clean
    }

    /// Status line sent to the client, if any.
    #[inline]
    pub(crate) fn status(&self) -> Option<StatusCode> {
        self.status
    }

    #[inline]
    pub(crate) fn body_len(&self) -> u64 {
        self.body_len
    }

    /// Sends the status line and the `Content-Type` header.
    pub(crate) async fn head<W: AsyncWrite + Unpin>(
        &mut self,
        stream: &mut W,
        status: StatusCode,
        content_type: &str,
    ) -> Result<(), ErrorKind> {
        debug_assert!(
            self.state == ResponseState::Clean,
            "Must be first and called only once"
        );

        let first_line = status.first_line();
        let mut head = Vec::with_capacity(first_line.len() + content_type.len() + 20);
        head.extend_from_slice(first_line);
        head.extend_from_slice(b"Content-Type: ");
        head.extend_from_slice(content_type.as_bytes());
        head.extend_from_slice(b"\r\n\r\n");

        // Set before writing: a partial write is still a started response.
        self.state = ResponseState::Streaming;
        self.status = Some(status);

        writer::write_bytes(stream, &head, self.write_timeout).await
    }

    pub(crate) async fn body<W: AsyncWrite + Unpin>(
        &mut self,
        stream: &mut W,
        bytes: &[u8],
    ) -> Result<(), ErrorKind> {
        debug_assert!(
            self.state == ResponseState::Streaming,
            "Must be called after `head` and before `finish`"
        );

        writer::write_bytes(stream, bytes, self.write_timeout).await?;
        self.body_len += bytes.len() as u64;
        Ok(())
    }

    pub(crate) async fn finish<W: AsyncWrite + Unpin>(
        &mut self,
        stream: &mut W,
    ) -> Result<(), ErrorKind> {
        debug_assert!(
            self.state == ResponseState::Streaming,
            "Must be called after `head`"
        );

        self.state = ResponseState::Complete;
        writer::flush(stream, self.write_timeout).await
    }

    /// Sends the complete error page for `status`.
    pub(crate) async fn error<W: AsyncWrite + Unpin>(
        &mut self,
        stream: &mut W,
        status: StatusCode,
    ) -> Result<(), ErrorKind> {
        debug_assert!(
            self.state == ResponseState::Clean,
            "Error pages can only be sent before anything else"
        );

        self.state = ResponseState::Complete;
        self.status = Some(status);

        writer::write_bytes(stream, status.error_page(), self.write_timeout).await?;
        writer::flush(stream, self.write_timeout).await
    }
}

pub(crate) mod writer {
    use crate::errors::{ErrorKind, IoError};
    use std::time::Duration;
    use tokio::{
        io::{AsyncWrite, AsyncWriteExt},
        time::timeout,
    };

    #[inline]
    pub(crate) async fn write_bytes<W: AsyncWrite + Unpin>(
        stream: &mut W,
        bytes: &[u8],
        time: Duration,
    ) -> Result<(), ErrorKind> {
        match timeout(time, stream.write_all(bytes)).await {
            Ok(result) => result.map_err(|e| ErrorKind::Io(IoError(e))),
            Err(_) => Err(ErrorKind::WriteTimeout),
        }
    }

    #[inline]
    pub(crate) async fn flush<W: AsyncWrite + Unpin>(
        stream: &mut W,
        time: Duration,
    ) -> Result<(), ErrorKind> {
        match timeout(time, stream.flush()).await {
            Ok(result) => result.map_err(|e| ErrorKind::Io(IoError(e))),
            Err(_) => Err(ErrorKind::WriteTimeout),
        }
    }
}
