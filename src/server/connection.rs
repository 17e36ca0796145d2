use crate::{
    errors::ErrorKind,
    handler,
    http::{
        request::{Parser, Request},
        response::Response,
        types::StatusCode,
    },
    limits::{ConnLimits, ReqLimits},
    Config,
};
use std::{net::SocketAddr, sync::Arc};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};

/// Serves exactly one request per accepted connection.
pub(crate) struct HttpConnection {
    config: Arc<Config>,
    parser: Parser,
    conn_limits: ConnLimits,
}

impl HttpConnection {
    #[inline]
    pub(crate) fn new(config: Arc<Config>, conn_limits: ConnLimits, req_limits: ReqLimits) -> Self {
        Self {
            config,
            parser: Parser::new(req_limits, conn_limits.socket_read_timeout),
            conn_limits,
        }
    }

    /// Parses the request, dispatches it, then shuts the stream down.
    ///
    /// Returns the outcome of the request. After a failure in the middle of
    /// a body the client saw `200 OK`, but the returned status is the one of
    /// the failure.
    pub(crate) async fn run<S: AsyncRead + AsyncWrite + Unpin>(
        &mut self,
        stream: S,
        client_addr: SocketAddr,
    ) -> StatusCode {
        let mut stream = BufReader::new(stream);
        let mut response = Response::new(self.conn_limits.socket_write_timeout);

        let status = match self.parser.parse(&mut stream, client_addr).await {
            Ok(mut request) => {
                let result = handler::handle(
                    &mut stream,
                    &mut request,
                    &mut response,
                    &self.config,
                    &self.conn_limits,
                )
                .await;

                let status = match result {
                    Ok(()) => StatusCode::Ok,
                    Err(err) => self.fail(&mut stream, &mut response, err).await,
                };
                Self::log(&request, status, &response);
                status
            }
            Err(err) => {
                tracing::debug!("{client_addr} sent an invalid request: {err}");
                let status = self.fail(&mut stream, &mut response, err).await;
                tracing::info!("{client_addr} <invalid request> -> {}", status.as_u16());
                status
            }
        };

        if let Err(e) = stream.shutdown().await {
            tracing::debug!("Failed to shut down connection to {client_addr}: {e}");
        }

        status
    }

    // Reports `err` to the client if nothing was sent yet, otherwise only logs it.
    async fn fail<S: AsyncWrite + Unpin>(
        &self,
        stream: &mut S,
        response: &mut Response,
        err: ErrorKind,
    ) -> StatusCode {
        let status = err.status();

        if response.is_started() {
            tracing::warn!(
                "Response aborted after `{}` and {} body bytes: {err}",
                response.status().map_or("nothing", |s| s.as_str()),
                response.body_len()
            );
            return status;
        }

        if status == StatusCode::InternalServerError {
            tracing::error!("{err}");
        }
        if let Err(e) = response.error(stream, status).await {
            tracing::debug!("Failed to send error page: {e}");
        }

        status
    }

    fn log(request: &Request, status: StatusCode, response: &Response) {
        tracing::info!(
            "{} {} {} -> {} ({} bytes)",
            request.client_addr(),
            request.method(),
            request.uri(),
            status.as_u16(),
            response.body_len(),
        );
    }
}
