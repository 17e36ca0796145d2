//! Content-type lookup from a `mime.types` table

use std::{collections::HashMap, fs, io, path::Path};

/// Extension to content-type table with a fallback type.
///
/// The table format is the one of `/etc/mime.types`:
/// ```text
/// # comment
/// text/html       html htm
/// image/png       png
/// ```
#[derive(Debug, Clone)]
pub struct MimeTypes {
    by_extension: HashMap<String, String>,
    default: String,
}

impl MimeTypes {
    /// Creates an empty table: every lookup returns `default`.
    pub fn new<D: Into<String>>(default: D) -> Self {
        Self {
            by_extension: HashMap::new(),
            default: default.into(),
        }
    }

    /// Reads the table at `path`.
    pub fn load<P: AsRef<Path>, D: Into<String>>(path: P, default: D) -> io::Result<Self> {
        let table = fs::read_to_string(path)?;
        Ok(Self::from_table(&table, default))
    }

    /// Parses a table already in memory.
    pub fn from_table<D: Into<String>>(table: &str, default: D) -> Self {
        let mut mime_types = Self::new(default);
        for line in table.lines() {
            mime_types.add_line(line);
        }
        mime_types
    }

    fn add_line(&mut self, line: &str) {
        let mut fields = line.split_ascii_whitespace();
        let Some(mimetype) = fields.next() else {
            return;
        };
        if mimetype.starts_with('#') {
            return;
        }

        // First rule mentioning an extension wins.
        for extension in fields {
            self.by_extension
                .entry(extension.to_owned())
                .or_insert_with(|| mimetype.to_owned());
        }
    }

    /// Returns the content type for `path`, or the default one when the path
    /// has no extension or the extension is unknown.
    pub fn mimetype(&self, path: &Path) -> &str {
        let Some(extension) = path.extension().and_then(|e| e.to_str()) else {
            return &self.default;
        };

        self.by_extension
            .get(extension)
            .or_else(|| self.by_extension.get(&extension.to_ascii_lowercase()))
            .unwrap_or(&self.default)
    }

    pub fn default_mimetype(&self) -> &str {
        &self.default
    }

    pub fn len(&self) -> usize {
        self.by_extension.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_extension.is_empty()
    }
}
