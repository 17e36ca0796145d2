use crate::{
    http::types::StatusCode,
    limits::{Concurrency, ConnLimits, ReqLimits, ServerLimits, WaitStrategy},
    server::connection::HttpConnection,
    Config,
};
use crossbeam::queue::ArrayQueue;
use std::{io, net::SocketAddr, sync::Arc, time::Duration};
use tokio::{
    net::{TcpListener, TcpStream},
    task::{yield_now, JoinError, JoinSet},
    time::sleep as tokio_sleep,
};

/// HTTP/1.0 server answering one request per connection from a document root.
///
/// Depending on [`ServerLimits::concurrency`], connections are served one
/// after another by the accept loop itself, or handed to a fixed pool of
/// worker tasks through a bounded queue.
///
/// # Examples
///
/// ```no_run
/// use spidey::{socket_listen, Config, MimeTypes, Server};
///
/// #[tokio::main]
/// async fn main() -> std::io::Result<()> {
///     Server::builder()
///         .listener(socket_listen(9898, 1024)?)
///         .config(Config::new("www", 9898, MimeTypes::new("text/plain"))?)
///         .build()
///         .launch()
///         .await;
///
///     Ok(())
/// }
/// ```
pub struct Server {
    listener: TcpListener,
    config: Arc<Config>,
    limits: AllLimits,
    stream_queue: TcpQueue,
    workers: JoinSet<()>,
}

enum Event {
    Accepted(io::Result<(TcpStream, SocketAddr)>),
    Reaped(Result<(), JoinError>),
}

impl Server {
    /// Creates a new builder for configuring the server instance.
    #[inline]
    pub fn builder() -> ServerBuilder {
        ServerBuilder {
            listener: None,
            config: None,

            server_limits: None,
            connection_limits: None,
            request_limits: None,
        }
    }

    /// Starts accepting connections. Never returns.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use spidey::{limits::{Concurrency, ServerLimits}, Config, MimeTypes, Server};
    /// use tokio::net::TcpListener;
    ///
    /// #[tokio::main]
    /// async fn main() {
    ///     Server::builder()
    ///         .listener(TcpListener::bind("127.0.0.1:9898").await.unwrap())
    ///         .config(Config::new("www", 9898, MimeTypes::new("text/plain")).unwrap())
    ///         .server_limits(ServerLimits {
    ///             concurrency: Concurrency::Sequential,
    ///             ..ServerLimits::default()
    ///         })
    ///         .build()
    ///         .launch()
    ///         .await
    /// }
    /// ```
    pub async fn launch(mut self) {
        match self.limits.0.concurrency {
            Concurrency::Sequential => self.launch_sequential().await,
            Concurrency::Pooled => self.launch_pooled().await,
        }
    }

    async fn launch_sequential(&mut self) {
        let (_, conn_limits, req_limits) = self.limits.clone();
        let mut conn = HttpConnection::new(self.config.clone(), conn_limits, req_limits);

        loop {
            let Ok((stream, addr)) = self.accept().await else {
                continue;
            };

            conn.run(stream, addr).await;
        }
    }

    async fn launch_pooled(&mut self) {
        loop {
            let event = tokio::select! {
                accepted = self.listener.accept() => Event::Accepted(accepted),
                Some(joined) = self.workers.join_next(), if !self.workers.is_empty() => {
                    Event::Reaped(joined)
                }
            };

            match event {
                Event::Accepted(Ok(value)) => self.admit(value),
                Event::Accepted(Err(e)) => accept_failed(&e).await,
                Event::Reaped(result) => self.reap(result),
            }
        }
    }

    async fn accept(&self) -> io::Result<(TcpStream, SocketAddr)> {
        let accepted = self.listener.accept().await;
        if let Err(e) = &accepted {
            accept_failed(e).await;
        }
        accepted
    }

    // A full queue sheds the connection instead of growing.
    fn admit(&self, value: (TcpStream, SocketAddr)) {
        if let Err((stream, addr)) = self.stream_queue.push(value) {
            tracing::warn!(
                "Dropping connection from {addr}: {} connections already pending",
                self.stream_queue.capacity()
            );
            drop(stream);
        }
    }

    // Workers never finish on their own: anything reaped died and is replaced.
    fn reap(&mut self, result: Result<(), JoinError>) {
        match result {
            Err(e) if e.is_panic() => tracing::error!("Worker panicked, respawning"),
            Err(_) => tracing::warn!("Worker cancelled, respawning"),
            Ok(()) => tracing::warn!("Worker exited, respawning"),
        }

        self.spawn_worker();
    }

    /// Reaps every worker that already terminated, replacing each one.
    ///
    /// Returns how many were reaped.
    pub fn reap_finished(&mut self) -> usize {
        let mut reaped = 0;
        while let Some(result) = self.workers.try_join_next() {
            self.reap(result);
            reaped += 1;
        }
        reaped
    }

    /// Number of live worker tasks; `0` in sequential mode.
    #[inline]
    pub fn active_workers(&self) -> usize {
        self.workers.len()
    }

    #[inline]
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    fn spawn_worker(&mut self) {
        let queue = self.stream_queue.clone();
        let (server_limits, conn_limits, req_limits) = self.limits.clone();
        let mut conn = HttpConnection::new(self.config.clone(), conn_limits, req_limits);

        self.workers.spawn(async move {
            loop {
                let (stream, addr) = Server::get_stream(&queue, &server_limits.wait_strategy).await;

                let status = conn.run(stream, addr).await;
                if status != StatusCode::Ok {
                    tracing::debug!("Connection from {addr} finished with {}", status.as_str());
                }
            }
        });
    }

    #[inline]
    async fn get_stream(queue: &TcpQueue, wait: &WaitStrategy) -> (TcpStream, SocketAddr) {
        loop {
            if let Some(value) = queue.pop() {
                return value;
            }

            match wait {
                WaitStrategy::Yield => yield_now().await,
                WaitStrategy::Sleep(time) => tokio_sleep(*time).await,
            }
        }
    }
}

//

/// Builder for configuring and creating [`Server`] instances.
pub struct ServerBuilder {
    listener: Option<TcpListener>,
    config: Option<Arc<Config>>,

    server_limits: Option<ServerLimits>,
    connection_limits: Option<ConnLimits>,
    request_limits: Option<ReqLimits>,
}

impl ServerBuilder {
    /// Sets the TCP listener that the server will use to accept connections.
    ///
    /// **This is a required component.**
    #[inline(always)]
    pub fn listener(mut self, listener: TcpListener) -> Self {
        self.listener = Some(listener);
        self
    }

    /// Sets the document root, port and content-type table.
    ///
    /// **This is a required component.**
    #[inline(always)]
    pub fn config(mut self, config: Config) -> Self {
        self.config = Some(Arc::new(config));
        self
    }

    /// Configures scheduling of accepted connections.
    #[inline(always)]
    pub fn server_limits(mut self, limits: ServerLimits) -> Self {
        self.server_limits = Some(limits);
        self
    }

    /// Configures read, write and CGI deadlines.
    #[inline(always)]
    pub fn connection_limits(mut self, limits: ConnLimits) -> Self {
        self.connection_limits = Some(limits);
        self
    }

    /// Configures request parsing limits.
    #[inline(always)]
    pub fn request_limits(mut self, limits: ReqLimits) -> Self {
        self.request_limits = Some(limits);
        self
    }

    /// Creates the server; in pooled mode its workers start right away.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Panics
    ///
    /// Panics if [`listener`](Self::listener) or [`config`](Self::config)
    /// was not called.
    #[inline]
    #[track_caller]
    pub fn build(self) -> Server {
        let (listener, config, limits) = self.get_all_parts();

        let stream_queue = Arc::new(ArrayQueue::new(limits.0.max_pending_connections.max(1)));
        let workers = match limits.0.concurrency {
            Concurrency::Sequential => 0,
            Concurrency::Pooled => limits.0.max_workers.max(1),
        };

        let mut server = Server {
            listener,
            config,
            limits,
            stream_queue,
            workers: JoinSet::new(),
        };
        for _ in 0..workers {
            server.spawn_worker();
        }

        server
    }

    #[inline]
    #[track_caller]
    fn get_all_parts(self) -> (TcpListener, Arc<Config>, AllLimits) {
        (
            self.listener
                .expect("The `listener` method must be called to create"),
            self.config
                .expect("The `config` method must be called to create"),
            (
                self.server_limits.unwrap_or_default(),
                self.connection_limits.unwrap_or_default(),
                self.request_limits.unwrap_or_default(),
            ),
        )
    }
}

/// Pause after a failed `accept`. Errors like `EMFILE` persist for a while.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(50);

async fn accept_failed(e: &io::Error) {
    tracing::warn!("Failed to accept connection: {e}");
    tokio_sleep(ACCEPT_BACKOFF).await;
}

type TcpQueue = Arc<ArrayQueue<(TcpStream, SocketAddr)>>;
pub(crate) type AllLimits = (ServerLimits, ConnLimits, ReqLimits);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::*;
    use std::{fs, time::Instant};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    async fn server(root: &std::path::Path, limits: ServerLimits) -> Server {
        Server::builder()
            .listener(TcpListener::bind("127.0.0.1:0").await.unwrap())
            .config(Config::new(root, 9898, crate::MimeTypes::new("text/plain")).unwrap())
            .server_limits(limits)
            .build()
    }

    async fn get(addr: SocketAddr, target: &str) -> String {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream
            .write_all(format!("GET {target} HTTP/1.0\r\n\r\n").as_bytes())
            .await
            .unwrap();

        let mut out = Vec::new();
        stream.read_to_end(&mut out).await.unwrap();
        String::from_utf8(out).unwrap()
    }

    #[tokio::test]
    async fn sequential_mode() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.txt"), "seq").unwrap();

        let server = server(
            dir.path(),
            ServerLimits {
                concurrency: Concurrency::Sequential,
                ..ServerLimits::default()
            },
        )
        .await;
        assert_eq!(server.active_workers(), 0);

        let addr = server.local_addr().unwrap();
        let handle = tokio::spawn(server.launch());

        for _ in 0..3 {
            assert!(get(addr, "/a.txt").await.ends_with("\r\n\r\nseq"));
        }
        assert!(get(addr, "/b.txt").await.starts_with("HTTP/1.0 404 Not Found\r\n"));

        handle.abort();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn pooled_mode() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.txt"), "pool").unwrap();

        let server = server(
            dir.path(),
            ServerLimits {
                max_workers: 3,
                ..ServerLimits::default()
            },
        )
        .await;
        assert_eq!(server.active_workers(), 3);

        let addr = server.local_addr().unwrap();
        let handle = tokio::spawn(server.launch());

        let mut clients = JoinSet::new();
        for _ in 0..12 {
            clients.spawn(get(addr, "/a.txt"));
        }
        while let Some(response) = clients.join_next().await {
            assert!(response.unwrap().ends_with("\r\n\r\npool"));
        }

        handle.abort();
    }

    #[tokio::test]
    async fn dead_workers_are_replaced() {
        let dir = tempfile::tempdir().unwrap();
        let mut server = server(
            dir.path(),
            ServerLimits {
                max_workers: 2,
                ..ServerLimits::default()
            },
        )
        .await;

        assert_eq!(server.reap_finished(), 0);

        server.workers.abort_all();
        tokio_sleep(Duration::from_millis(20)).await;

        assert_eq!(server.reap_finished(), 2);
        assert_eq!(server.active_workers(), 2);
        assert_eq!(server.reap_finished(), 0);
    }

    #[tokio::test]
    async fn full_queue_sheds_connections() {
        let dir = tempfile::tempdir().unwrap();
        let server = server(
            dir.path(),
            ServerLimits {
                concurrency: Concurrency::Sequential,
                max_pending_connections: 1,
                ..ServerLimits::default()
            },
        )
        .await;
        let addr = server.local_addr().unwrap();

        // Nothing pops in sequential mode, so the queue fills up.
        let mut kept = TcpStream::connect(addr).await.unwrap();
        let mut shed = TcpStream::connect(addr).await.unwrap();
        for _ in 0..2 {
            let value = server.listener.accept().await.unwrap();
            server.admit(value);
        }
        assert_eq!(server.stream_queue.len(), 1);

        let mut buf = [0; 1];
        assert_eq!(shed.read(&mut buf).await.unwrap(), 0);

        let (stream, addr) = server.stream_queue.pop().unwrap();
        let mut conn = connection(server.config.clone());
        let (status, _) = tokio::join!(conn.run(stream, addr), async {
            kept.write_all(b"GET / HTTP/1.0\r\n\r\n").await.unwrap();
        });
        assert_eq!(status, StatusCode::Ok);

        let mut page = String::new();
        kept.read_to_string(&mut page).await.unwrap();
        assert!(page.contains("<ul>"));
    }

    #[tokio::test]
    async fn failed_accept_backs_off() {
        let err = io::Error::from_raw_os_error(libc::EMFILE);

        let start = Instant::now();
        accept_failed(&err).await;

        assert!(start.elapsed() >= ACCEPT_BACKOFF);
    }
}
