//! Routing of a resolved request to the handler matching its file type

use crate::{
    errors::ErrorKind,
    http::{request::Request, response::Response},
    limits::ConnLimits,
    server::resolve::determine_request_path,
    Config,
};
use std::{ffi::CString, os::unix::ffi::OsStrExt, path::Path};
use tokio::io::AsyncWrite;

pub(crate) mod browse;
pub(crate) mod cgi;
pub(crate) mod file;

/// What a resolved path is served as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Target {
    Directory,
    /// Regular file the server may execute: run as CGI.
    Executable,
    /// Regular file the server may read but not execute: sent as is.
    Readable,
}

/// Resolves the request against the root, then runs the matching handler.
///
/// Errors returned before [`Response::is_started`] turns `true` can still be
/// reported to the client with their status.
pub(crate) async fn handle<S: AsyncWrite + Unpin>(
    stream: &mut S,
    request: &mut Request,
    response: &mut Response,
    config: &Config,
    limits: &ConnLimits,
) -> Result<(), ErrorKind> {
    let path = determine_request_path(config.root(), request.uri()).await?;
    let target = classify(&path).await?;
    request.set_path(path);

    match target {
        Target::Directory => browse::handle(stream, request, response).await,
        Target::Executable => cgi::handle(stream, request, response, config, limits).await,
        Target::Readable => file::handle(stream, request, response, config).await,
    }
}

/// Executable wins over readable when both apply.
pub(crate) async fn classify(path: &Path) -> Result<Target, ErrorKind> {
    let metadata = tokio::fs::metadata(path)
        .await
        .map_err(|_| ErrorKind::NotFound)?;

    if metadata.is_dir() {
        Ok(Target::Directory)
    } else if !metadata.is_file() {
        Err(ErrorKind::UnsupportedFileType)
    } else if access(path, libc::X_OK) {
        Ok(Target::Executable)
    } else if access(path, libc::R_OK) {
        Ok(Target::Readable)
    } else {
        Err(ErrorKind::NotAccessible)
    }
}

fn access(path: &Path, mode: libc::c_int) -> bool {
    let Ok(path) = CString::new(path.as_os_str().as_bytes()) else {
        return false;
    };

    // SAFETY: `path` is a valid NUL-terminated string that outlives the call.
    unsafe { libc::access(path.as_ptr(), mode) == 0 }
}
