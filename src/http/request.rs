use crate::{errors::*, http::types::Header, limits::ReqLimits};
use memchr::memchr;
use std::{
    net::SocketAddr,
    path::{Path, PathBuf},
    time::Duration,
};
use tokio::{
    io::{AsyncBufRead, AsyncBufReadExt},
    time::timeout,
};

/// One parsed client request.
///
/// # Input data requirements
///
/// ```text
/// [METHOD] SP [TARGET] [SP [VERSION]] LF
/// ([NAME]:[VALUE] LF)*
/// LF
/// ```
/// - Lines end with `LF`, an optional preceding `CR` is dropped.
/// - Leading whitespace of the request line is ignored and any run of
///   whitespace separates its tokens. The version token, if present, is
///   neither validated nor kept.
/// - `[TARGET]` is split at the first `?` into [`uri`](Self::uri) and
///   [`query`](Self::query).
/// - Header names are kept as received, values are trimmed. Duplicates are
///   all retained in wire order.
/// - The end of the stream terminates the header section just like an
///   empty line.
/// - Request bodies are never read.
///
/// Every line must be valid `UTF-8`.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    method: String,
    uri: String,
    query: Option<String>,
    path: Option<PathBuf>,
    headers: Vec<Header>,
    client_addr: SocketAddr,
}

impl Request {
    #[inline]
    pub fn method(&self) -> &str {
        &self.method
    }

    /// Request target without the query string.
    #[inline]
    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// Everything after the first `?` of the target, if there was one.
    #[inline]
    pub fn query(&self) -> Option<&str> {
        self.query.as_deref()
    }

    /// Canonical filesystem path of the target, once resolved.
    ///
    /// Always a descendant of (or equal to) the configured root.
    #[inline]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    #[inline]
    pub fn headers(&self) -> &[Header] {
        &self.headers
    }

    /// Returns the first header value with case-insensitive name matching.
    /// Uses linear search.
    #[inline]
    pub fn header_str(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|h| h.name.eq_ignore_ascii_case(name))
            .map(|h| h.value.as_str())
    }

    #[inline]
    pub fn client_addr(&self) -> &SocketAddr {
        &self.client_addr
    }

    #[inline]
    pub(crate) fn set_path(&mut self, path: PathBuf) {
        self.path = Some(path);
    }
}

// For tests
#[cfg(test)]
impl Request {
    pub(crate) fn from_parts(
        method: &str,
        target: &str,
        headers: &[(&str, &str)],
        client_addr: SocketAddr,
    ) -> Self {
        let (uri, query) = match target.split_once('?') {
            Some((uri, query)) => (uri, Some(query.to_owned())),
            None => (target, None),
        };

        Request {
            method: method.to_owned(),
            uri: uri.to_owned(),
            query,
            path: None,
            headers: headers.iter().map(|(n, v)| Header::new(*n, *v)).collect(),
            client_addr,
        }
    }
}

/// Reads one request head off a buffered stream, line by line.
#[derive(Debug)]
pub(crate) struct Parser {
    line: Vec<u8>,
    limits: ReqLimits,
    read_timeout: Duration,
}

impl Parser {
    #[inline]
    pub(crate) fn new(limits: ReqLimits, read_timeout: Duration) -> Self {
        Parser {
            line: Vec::with_capacity(256),
            limits,
            read_timeout,
        }
    }

    pub(crate) async fn parse<R: AsyncBufRead + Unpin>(
        &mut self,
        reader: &mut R,
        client_addr: SocketAddr,
    ) -> Result<Request, ErrorKind> {
        if self.read_line(reader).await? == 0 {
            return Err(ErrorKind::EmptyRequest);
        }

        let (method, target) = {
            let mut tokens = Self::as_str(&self.line)?.split_ascii_whitespace();
            match (tokens.next(), tokens.next()) {
                (Some(method), Some(target)) => (method.to_owned(), target),
                _ => return Err(ErrorKind::InvalidRequestLine),
            }
        };

        let (uri, query) = match memchr(b'?', target.as_bytes()) {
            Some(i) => (target[..i].to_owned(), Some(target[i + 1..].to_owned())),
            None => (target.to_owned(), None),
        };

        let headers = self.parse_headers(reader).await?;

        Ok(Request {
            method,
            uri,
            query,
            path: None,
            headers,
            client_addr,
        })
    }

    async fn parse_headers<R: AsyncBufRead + Unpin>(
        &mut self,
        reader: &mut R,
    ) -> Result<Vec<Header>, ErrorKind> {
        let mut headers = Vec::new();

        loop {
            if self.read_line(reader).await? == 0 {
                break;
            }
            if matches!(self.line.as_slice(), b"\n" | b"\r\n") {
                break;
            }
            if headers.len() >= self.limits.header_count {
                return Err(ErrorKind::TooManyHeaders);
            }

            let line = Self::as_str(&self.line)?;
            let colon = memchr(b':', line.as_bytes()).ok_or(ErrorKind::InvalidHeader)?;

            headers.push(Header::new(&line[..colon], line[colon + 1..].trim()));
        }

        Ok(headers)
    }

    // Returns the number of bytes read, `0` at the end of the stream.
    async fn read_line<R: AsyncBufRead + Unpin>(
        &mut self,
        reader: &mut R,
    ) -> Result<usize, ErrorKind> {
        self.line.clear();

        match timeout(self.read_timeout, self.fill_line(reader)).await {
            Ok(result) => result,
            Err(_) => Err(ErrorKind::ReadTimeout),
        }
    }

    async fn fill_line<R: AsyncBufRead + Unpin>(
        &mut self,
        reader: &mut R,
    ) -> Result<usize, ErrorKind> {
        loop {
            let buf = reader
                .fill_buf()
                .await
                .map_err(|e| ErrorKind::Read(IoError(e)))?;
            if buf.is_empty() {
                break;
            }

            let (used, done) = match memchr(b'\n', buf) {
                Some(i) => (i + 1, true),
                None => (buf.len(), false),
            };
            self.line.extend_from_slice(&buf[..used]);
            reader.consume(used);

            if self.line.len() > self.limits.line_size {
                return Err(ErrorKind::LineTooLong);
            }
            if done {
                break;
            }
        }

        Ok(self.line.len())
    }

    #[inline]
    fn as_str(line: &[u8]) -> Result<&str, ErrorKind> {
        simdutf8::basic::from_utf8(line).map_err(|_| ErrorKind::InvalidEncoding)
    }
}
