//! Immutable server configuration shared by every connection

use crate::MimeTypes;
use std::{
    fs, io,
    path::{Path, PathBuf},
};

pub const DEFAULT_PORT: u16 = 9898;
pub const DEFAULT_ROOT: &str = "www";
pub const DEFAULT_MIME_TYPES_PATH: &str = "/etc/mime.types";
pub const DEFAULT_MIME_TYPE: &str = "text/plain";
pub const DEFAULT_BACKLOG: i32 = 1024;

/// Values every request needs: the document root, the advertised port and
/// the content-type table.
///
/// Built once at startup and handed to the connections behind an [`Arc`](std::sync::Arc).
///
/// # Examples
/// ```no_run
/// use spidey::{Config, MimeTypes};
///
/// let config = Config::new("www", 9898, MimeTypes::new("text/plain")).unwrap();
/// assert!(config.root().is_absolute());
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    root: PathBuf,
    port: u16,
    mime_types: MimeTypes,
}

impl Config {
    /// Canonicalizes `root` once; fails when it does not exist or is not a
    /// directory.
    pub fn new<P: AsRef<Path>>(root: P, port: u16, mime_types: MimeTypes) -> io::Result<Self> {
        let root = fs::canonicalize(root)?;
        if !root.is_dir() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{} is not a directory", root.display()),
            ));
        }

        Ok(Self {
            root,
            port,
            mime_types,
        })
    }

    /// Canonical absolute document root.
    #[inline]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[inline]
    pub fn port(&self) -> u16 {
        self.port
    }

    #[inline]
    pub fn mimetype(&self, path: &Path) -> &str {
        self.mime_types.mimetype(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_is_canonical() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("www")).unwrap();

        let dotted = dir.path().join("www").join("..").join("www");
        let config = Config::new(&dotted, 8080, MimeTypes::new("text/plain")).unwrap();

        assert_eq!(config.root(), fs::canonicalize(dir.path().join("www")).unwrap());
        assert_eq!(config.port(), 8080);
        assert_eq!(config.mimetype(Path::new("a.bin")), "text/plain");
    }

    #[test]
    fn root_must_be_a_directory() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("file");
        fs::write(&file, b"").unwrap();

        let err = Config::new(&file, 1, MimeTypes::new("text/plain")).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);

        let err = Config::new(dir.path().join("missing"), 1, MimeTypes::new("x")).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }
}
