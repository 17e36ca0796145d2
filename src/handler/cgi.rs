//! Execution of CGI scripts
//!
//! The script's standard output is relayed as the response body, after the
//! server's own status line and a `text/html` content type. Whatever the
//! script prints is passed through untouched: headers it emits end up in the
//! body.

use crate::{
    errors::{ErrorKind, IoError},
    handler::file::BUFFER_SIZE,
    http::{request::Request, response::Response},
    limits::ConnLimits,
    Config, StatusCode,
};
use memchr::memchr;
use std::{ffi::OsString, io, process::Stdio, time::Duration};
use tokio::{
    io::{AsyncBufReadExt, AsyncWrite, BufReader},
    process::{Child, ChildStdout, Command},
    time::{sleep, timeout},
};

/// Request headers exported to the script, by environment variable.
const FORWARDED_HEADERS: [(&str, &str); 6] = [
    ("Host", "HTTP_HOST"),
    ("User-Agent", "HTTP_USER_AGENT"),
    ("Accept", "HTTP_ACCEPT"),
    ("Accept-Language", "HTTP_ACCEPT_LANGUAGE"),
    ("Accept-Encoding", "HTTP_ACCEPT_ENCODING"),
    ("Connection", "HTTP_CONNECTION"),
];

pub(crate) async fn handle<S: AsyncWrite + Unpin>(
    stream: &mut S,
    request: &Request,
    response: &mut Response,
    config: &Config,
    limits: &ConnLimits,
) -> Result<(), ErrorKind> {
    let path = request.path().ok_or(ErrorKind::NotFound)?;

    let mut command = Command::new(path);
    command
        .envs(environment(request, config))
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::inherit())
        .kill_on_drop(true);

    let mut child = spawn(&mut command)
        .await
        .map_err(|e| ErrorKind::CgiSpawn(IoError(e)))?;

    let Some(stdout) = child.stdout.take() else {
        kill(&mut child).await;
        return Err(ErrorKind::Io(IoError(std::io::Error::other("no stdout pipe"))));
    };

    if let Err(e) = response.head(stream, StatusCode::Ok, "text/html").await {
        kill(&mut child).await;
        return Err(e);
    }

    match timeout(limits.cgi_timeout, relay(stdout, &mut child, stream, response)).await {
        Ok(Ok(())) => response.finish(stream).await,
        Ok(Err(e)) => {
            kill(&mut child).await;
            Err(e)
        }
        Err(_) => {
            kill(&mut child).await;
            Err(ErrorKind::CgiTimeout)
        }
    }
}

const SPAWN_ATTEMPTS: u32 = 20;
const SPAWN_RETRY_DELAY: Duration = Duration::from_millis(10);

// `ETXTBSY` means the script is still open for writing somewhere, e.g. in a
// process forked while it was being saved. That clears up on its own.
async fn spawn(command: &mut Command) -> io::Result<Child> {
    let mut attempt = 1;
    loop {
        match command.spawn() {
            Err(e) if e.raw_os_error() == Some(libc::ETXTBSY) && attempt < SPAWN_ATTEMPTS => {
                tracing::debug!("CGI script busy, retrying: {e}");
                attempt += 1;
                sleep(SPAWN_RETRY_DELAY).await;
            }
            result => return result,
        }
    }
}

// Copies the script output line by line, then waits for it to exit. Lines
// longer than `BUFFER_SIZE` are relayed in several chunks.
async fn relay<S: AsyncWrite + Unpin>(
    stdout: ChildStdout,
    child: &mut Child,
    stream: &mut S,
    response: &mut Response,
) -> Result<(), ErrorKind> {
    let mut stdout = BufReader::with_capacity(BUFFER_SIZE, stdout);

    loop {
        let available = stdout.fill_buf().await?;
        if available.is_empty() {
            break;
        }

        let len = memchr(b'\n', available).map_or(available.len(), |i| i + 1);
        response.body(stream, &available[..len]).await?;
        stdout.consume(len);
    }

    let status = child.wait().await?;
    if !status.success() {
        tracing::warn!("CGI script exited with {status}");
    }

    Ok(())
}

async fn kill(child: &mut Child) {
    if let Err(e) = child.kill().await {
        tracing::debug!("Failed to kill CGI script: {e}");
    }
}

/// CGI/1.1 variables for `request`. Absent values are exported as empty
/// strings.
pub(crate) fn environment(request: &Request, config: &Config) -> Vec<(&'static str, OsString)> {
    let client = request.client_addr();
    let script = request
        .path()
        .map(|p| p.as_os_str().to_owned())
        .unwrap_or_default();

    let mut env: Vec<(&'static str, OsString)> = vec![
        ("QUERY_STRING", request.query().unwrap_or_default().into()),
        ("DOCUMENT_ROOT", config.root().as_os_str().to_owned()),
        ("REQUEST_URI", request.uri().into()),
        ("REQUEST_METHOD", request.method().into()),
        ("REMOTE_ADDR", client.ip().to_canonical().to_string().into()),
        ("REMOTE_PORT", client.port().to_string().into()),
        ("SCRIPT_FILENAME", script),
        ("SERVER_PORT", config.port().to_string().into()),
    ];

    for (header, variable) in FORWARDED_HEADERS {
        if let Some(value) = request.header_str(header) {
            env.push((variable, value.into()));
        }
    }

    env
}
