//! spidey - minimal HTTP/1.0 origin server
//!
//! Serves a single document root over HTTP/1.0, one request per connection.
//! Every request resolves to one of three responses:
//!
//! - **Directory**: an HTML list linking every entry
//! - **Regular file**: its content, typed by a `mime.types` table
//! - **Executable file**: the output of running it as a CGI script
//!
//! # Safety Characteristics
//!
//! - **Contained paths** - targets are canonicalized and must stay under the
//!   canonical root, `..` and symlinks included
//! - **Bounded concurrency** - a fixed pool of workers behind a bounded
//!   queue, or fully sequential serving
//! - **Deadlines everywhere** - request reads, response writes and CGI
//!   scripts all time out
//! - **Honest errors** - an error page is only sent while nothing else was;
//!   failures in the middle of a body are logged and the connection closed
//!
//! # Examples
//!
//! ```no_run
//! use spidey::{socket_listen, Config, MimeTypes, Server};
//!
//! #[tokio::main]
//! async fn main() -> std::io::Result<()> {
//!     let mime_types = MimeTypes::load("/etc/mime.types", "text/plain")?;
//!     let config = Config::new("www", 9898, mime_types)?;
//!
//!     Server::builder()
//!         .listener(socket_listen(9898, 1024)?)
//!         .config(config)
//!         .build()
//!         .launch()
//!         .await;
//!
//!     Ok(())
//! }
//! ```

pub(crate) mod http {
    pub(crate) mod request;
    pub(crate) mod response;
    pub(crate) mod types;
}
pub(crate) mod server {
    pub(crate) mod connection;
    pub(crate) mod resolve;
    pub(crate) mod server_impl;
    pub(crate) mod socket;
}
pub(crate) mod config;
pub(crate) mod errors;
pub(crate) mod handler;
pub mod limits;
pub(crate) mod mime;

pub use crate::{
    config::{
        Config, DEFAULT_BACKLOG, DEFAULT_MIME_TYPE, DEFAULT_MIME_TYPES_PATH, DEFAULT_PORT,
        DEFAULT_ROOT,
    },
    http::{
        request::Request,
        types::{Header, StatusCode},
    },
    mime::MimeTypes,
    server::{
        server_impl::{Server, ServerBuilder},
        socket::socket_listen,
    },
};

#[cfg(test)]
pub(crate) mod tools {
    use crate::{
        limits::{ConnLimits, ReqLimits},
        server::connection::HttpConnection,
        Config, MimeTypes, Request, StatusCode,
    };
    use std::{
        fs,
        net::SocketAddr,
        os::unix::fs::PermissionsExt,
        path::{Path, PathBuf},
        str::from_utf8,
        sync::Arc,
    };
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    pub(crate) const CLIENT: &str = "127.0.0.1:50000";

    #[inline]
    pub fn str_op(value: &[u8]) -> &str {
        from_utf8(value).unwrap()
    }

    pub fn config(root: &Path) -> Arc<Config> {
        Arc::new(Config::new(root, 9898, MimeTypes::new("text/plain")).unwrap())
    }

    pub(crate) fn connection(config: Arc<Config>) -> HttpConnection {
        HttpConnection::new(config, ConnLimits::default(), ReqLimits::default())
    }

    pub fn request(method: &str, target: &str) -> Request {
        request_from(method, target, &[], CLIENT.parse().unwrap())
    }

    pub fn request_from(
        method: &str,
        target: &str,
        headers: &[(&str, &str)],
        client_addr: SocketAddr,
    ) -> Request {
        Request::from_parts(method, target, headers, client_addr)
    }

    /// Writes an executable (`0o755`) file.
    pub fn write_script(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, content).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    /// Splits a raw response at the blank line ending its head.
    pub fn split_response(raw: &[u8]) -> (&str, &[u8]) {
        let end = memchr::memmem::find(raw, b"\r\n\r\n").expect("no end of head");
        (str_op(&raw[..end]), &raw[end + 4..])
    }

    /// Plays `raw` as a client over an in-memory stream and collects the reply.
    pub(crate) async fn exchange(conn: &mut HttpConnection, raw: &[u8]) -> (StatusCode, Vec<u8>) {
        let (mut client, server) = tokio::io::duplex(16 * 1024);
        let addr = CLIENT.parse().unwrap();

        let client_side = async {
            // The server may answer and close before reading everything.
            let _ = client.write_all(raw).await;
            let _ = client.shutdown().await;

            let mut out = Vec::new();
            client.read_to_end(&mut out).await.unwrap();
            out
        };

        tokio::join!(conn.run(server, addr), client_side)
    }
}
