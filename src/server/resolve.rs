use crate::errors::ErrorKind;
use percent_encoding::percent_decode_str;
use std::{
    ffi::OsString,
    os::unix::ffi::OsStringExt,
    path::{Path, PathBuf},
};

/// Maps a request URI to a canonical path under `root`.
///
/// `root` must already be canonical. The URI is percent-decoded and appended
/// to it verbatim, then every `.`, `..` and symlink is resolved by the
/// filesystem. The containment check runs on the resolved path, component by
/// component, so neither `..` nor a symlink can lead outside the root.
pub(crate) async fn determine_request_path(root: &Path, uri: &str) -> Result<PathBuf, ErrorKind> {
    let decoded = OsString::from_vec(percent_decode_str(uri).collect());

    let mut joined = root.as_os_str().to_owned();
    joined.push(decoded);

    let path = tokio::fs::canonicalize(&joined)
        .await
        .map_err(|_| ErrorKind::NotFound)?;

    if !path.starts_with(root) {
        tracing::debug!("{uri:?} resolves outside the root: {}", path.display());
        return Err(ErrorKind::OutsideRoot);
    }

    Ok(path)
}
