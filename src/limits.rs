//! Server concurrency, connection deadlines and request parsing limits
//!
//! # Defaults
//!
//! Every blocking point of a request has a deadline and every buffer has an
//! upper bound, so a single slow client or hanging script cannot hold the
//! server indefinitely:
//! - Socket reads and writes time out
//! - CGI scripts are killed after [`ConnLimits::cgi_timeout`]
//! - Request lines and header counts are bounded by [`ReqLimits`]
//! - The number of requests served at once is bounded by [`ServerLimits`]
//!
//! # Examples
//!
//! ```no_run
//! use spidey::{limits::{ConnLimits, ServerLimits}, socket_listen, Config, MimeTypes, Server};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> std::io::Result<()> {
//!     Server::builder()
//!         .listener(socket_listen(9898, 1024)?)
//!         .config(Config::new("www", 9898, MimeTypes::new("text/plain"))?)
//!         .server_limits(ServerLimits {
//!             max_workers: 64,
//!             ..ServerLimits::default()
//!         })
//!         .connection_limits(ConnLimits {
//!             cgi_timeout: Duration::from_secs(5),
//!             ..ConnLimits::default()
//!         })
//!         .build()
//!         .launch()
//!         .await;
//!
//!     Ok(())
//! }
//! ```

use std::time::Duration;

/// Controls how accepted connections are scheduled.
///
/// # Connection management (pooled)
/// ```text
///                            [------------]
///                            [ Tcp accept ]
///                            [------------]
///                                  ||
///                                  || TCP_STREAM
///                                  \/
/// [--------------]   Yes   /----------------\   No   [-----------------]
/// [ Add to queue ] <====== | Queue has room? | =====> [ Drop connection ]
/// [--------------]         \----------------/        [-----------------]
///        ||
///        \==================\\          //====================\
///                            V          V                    ||
/// [--------]   Yes   /-------------------------\   No   [------]
/// [ Worker ] <====== | Is there a free worker? | =====> [ Wait ]
/// [--------]         \-------------------------/        [------]
/// ```
///
/// Workers are long-lived tasks created when the server is built. Each one
/// serves a single connection at a time, so `max_workers` is the hard cap on
/// requests in flight. A worker that dies (a panic while serving) is reaped
/// by the accept loop and replaced.
#[derive(Debug, Clone)]
pub struct ServerLimits {
    /// Scheduling strategy (default: [`Concurrency::Pooled`]).
    pub concurrency: Concurrency,

    /// Number of worker tasks in [`Concurrency::Pooled`] mode (default: `16`).
    ///
    /// Ignored in [`Concurrency::Sequential`] mode. Values below `1` are
    /// treated as `1`.
    pub max_workers: usize,

    /// Maximum number of accepted connections waiting for a worker (default: `64`).
    ///
    /// When the queue is full, newly accepted connections are closed
    /// immediately without a response.
    pub max_pending_connections: usize,

    /// How idle workers wait for the next connection (default: `Sleep(1ms)`).
    pub wait_strategy: WaitStrategy,

    #[doc(hidden)]
    #[allow(dead_code)]
    pub _priv: (),
}

impl Default for ServerLimits {
    fn default() -> Self {
        Self {
            concurrency: Concurrency::Pooled,
            max_workers: 16,
            max_pending_connections: 64,
            wait_strategy: WaitStrategy::Sleep(Duration::from_millis(1)),

            _priv: (),
        }
    }
}

/// Strategy used to drive the request pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Concurrency {
    /// Accept one connection, serve it completely, then accept the next.
    ///
    /// Requests are fully serialized: a slow request delays every client
    /// queued behind it (bounded only by the deadlines in [`ConnLimits`]).
    Sequential,

    /// Hand each accepted connection to a bounded pool of worker tasks.
    Pooled,
}

/// Strategy for worker task waiting when no connections are available
#[derive(Debug, Clone)]
pub enum WaitStrategy {
    /// While waiting, uses [`tokio::task::yield_now()`]
    ///
    /// # Note
    /// Keeps a core busy while the server is idle.
    Yield,

    /// While waiting, uses [`tokio::time::sleep()`]
    Sleep(Duration),
}

/// Per-connection deadlines
///
/// None of the blocking points of a request is allowed to wait forever.
#[derive(Debug, Clone)]
pub struct ConnLimits {
    /// Maximum time to wait for each request line or header line (default: `10 seconds`)
    ///
    /// A timeout while reading the request is answered with `400 Bad Request`.
    pub socket_read_timeout: Duration,

    /// Maximum time for a single write to the client (default: `10 seconds`)
    ///
    /// Applies to each chunk, so large files are not cut off as long as the
    /// client keeps reading.
    pub socket_write_timeout: Duration,

    /// Maximum run time of a CGI script, output relay included (default: `30 seconds`)
    ///
    /// The script is killed once this expires. Since its status line was
    /// already sent, the client only sees a truncated body.
    pub cgi_timeout: Duration,

    #[doc(hidden)]
    #[allow(dead_code)]
    pub _priv: (),
}

impl Default for ConnLimits {
    #[inline(always)]
    fn default() -> Self {
        Self {
            socket_read_timeout: Duration::from_secs(10),
            socket_write_timeout: Duration::from_secs(10),
            cgi_timeout: Duration::from_secs(30),

            _priv: (),
        }
    }
}

/// HTTP request parsing limits
///
/// Requests exceeding any of these are answered with `400 Bad Request`.
#[derive(Debug, Clone)]
pub struct ReqLimits {
    /// Maximum length in bytes of one line, terminator included (default: `8 KiB`)
    ///
    /// Applies to the request line and to every header line.
    pub line_size: usize,

    /// Maximum number of headers per request (default: `100`)
    pub header_count: usize,

    #[doc(hidden)]
    #[allow(dead_code)]
    pub _priv: (),
}

impl Default for ReqLimits {
    fn default() -> Self {
        Self {
            line_size: 8 * 1024,
            header_count: 100,

            _priv: (),
        }
    }
}
