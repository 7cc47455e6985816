//! HTML directory listings.
//!
//! A listing is rendered completely before anything is sent, into a buffer
//! with a hard size limit. Running past the limit fails the whole listing;
//! a partial page is never returned.

use std::fmt::{self, Write as _};
use std::fs;
use std::io;
use std::path::Path;
use std::time::SystemTime;

use html_escape::{encode_double_quoted_attribute, encode_text};
use percent_encoding::{AsciiSet, CONTROLS, percent_decode_str, utf8_percent_encode};

use crate::site::format::{format_mtime, format_size};

/// Bytes escaped when an entry name becomes a path segment in a link.
const SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'&')
    .add(b'\'')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

const PAGE_HEAD: &str = r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="utf-8">
    <title>Directory Listing</title>
    <style>
        body { font-family: Arial, sans-serif; margin: 40px; }
        h1 { color: #333; }
        table { border-collapse: collapse; width: 100%; }
        th, td { padding: 8px; text-align: left; border-bottom: 1px solid #ddd; }
        tr:hover { background-color: #f5f5f5; }
        a { text-decoration: none; color: #0066cc; }
        a:hover { text-decoration: underline; }
        .size { text-align: right; }
        .dir { font-weight: bold; }
    </style>
</head>
<body>
"#;

const PAGE_FOOT: &str = "    </table>\n</body>\n</html>\n";

#[derive(Debug)]
pub enum ListError {
    /// The directory itself could not be read.
    Io(io::Error),
    /// The rendered page would exceed the configured limit.
    BufferExceeded,
}

impl fmt::Display for ListError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ListError::Io(e) => write!(f, "cannot read directory: {e}"),
            ListError::BufferExceeded => f.write_str("directory listing exceeds buffer limit"),
        }
    }
}

impl std::error::Error for ListError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ListError::Io(e) => Some(e),
            ListError::BufferExceeded => None,
        }
    }
}

impl From<io::Error> for ListError {
    fn from(e: io::Error) -> Self {
        ListError::Io(e)
    }
}

impl From<fmt::Error> for ListError {
    fn from(_: fmt::Error) -> Self {
        ListError::BufferExceeded
    }
}

/// A `String` that refuses writes taking it past `limit` bytes.
#[derive(Debug)]
pub struct BoundedBuffer {
    buf: String,
    limit: usize,
}

impl BoundedBuffer {
    pub fn new(limit: usize) -> Self {
        Self {
            buf: String::with_capacity(limit.min(64 * 1024)),
            limit,
        }
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn into_string(self) -> String {
        self.buf
    }
}

impl fmt::Write for BoundedBuffer {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        if self.buf.len() + s.len() > self.limit {
            return Err(fmt::Error);
        }
        self.buf.push_str(s);
        Ok(())
    }
}

/// One row of a listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryInfo {
    pub name: String,
    pub is_dir: bool,
    pub len: u64,
    pub modified: Option<SystemTime>,
}

/// Entries of `dir` sorted by name, `.` and `..` excluded.
///
/// Metadata follows symlinks; a dangling link falls back to the link's own
/// metadata so it is still listed.
pub fn read_entries(dir: &Path) -> io::Result<Vec<EntryInfo>> {
    let mut entries = Vec::new();

    for entry in fs::read_dir(dir)? {
        let Ok(entry) = entry else { continue };
        let name = entry.file_name().to_string_lossy().into_owned();
        let path = entry.path();

        let info = match fs::metadata(&path).or_else(|_| fs::symlink_metadata(&path)) {
            Ok(meta) => EntryInfo {
                name,
                is_dir: meta.is_dir(),
                len: meta.len(),
                modified: meta.modified().ok(),
            },
            Err(_) => EntryInfo {
                name,
                is_dir: false,
                len: 0,
                modified: None,
            },
        };
        entries.push(info);
    }

    entries.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(entries)
}

/// Renders `dir` as an HTML page of at most `limit` bytes.
///
/// `request_path` is the target the client asked for, without its query. It
/// is the base of every link and the page heading; the filesystem path is
/// never shown.
pub fn list_directory(dir: &Path, request_path: &str, limit: usize) -> Result<String, ListError> {
    let entries = read_entries(dir)?;
    render_listing(&entries, request_path, limit)
}

/// Renders already collected entries. Split out so rendering can be driven
/// without touching the filesystem.
pub fn render_listing(
    entries: &[EntryInfo],
    request_path: &str,
    limit: usize,
) -> Result<String, ListError> {
    let base = link_base(request_path);
    let shown = percent_decode_str(&base).decode_utf8_lossy();

    let mut out = BoundedBuffer::new(limit);
    out.write_str(PAGE_HEAD)?;
    write!(
        out,
        "    <h1>Directory Listing: {}</h1>\n    <table>\n",
        encode_text(&shown)
    )?;
    out.write_str(
        "        <tr>\n            <th>Name</th>\n            <th>Size</th>\n            <th>Modified</th>\n        </tr>\n",
    )?;
    write!(
        out,
        "        <tr>\n            <td class=\"dir\"><a href=\"{}\">..</a></td>\n            <td class=\"size\">-</td>\n            <td>-</td>\n        </tr>\n",
        encode_double_quoted_attribute(&parent_of(&base))
    )?;

    for entry in entries {
        write_row(&mut out, &base, entry)?;
    }

    out.write_str(PAGE_FOOT)?;
    Ok(out.into_string())
}

fn write_row(out: &mut BoundedBuffer, base: &str, entry: &EntryInfo) -> fmt::Result {
    let slash = if entry.is_dir { "/" } else { "" };
    let href = format!("{base}{}{slash}", utf8_percent_encode(&entry.name, SEGMENT));
    let size = if entry.is_dir {
        "-".to_string()
    } else {
        format_size(entry.len)
    };
    let modified = entry
        .modified
        .map(format_mtime)
        .unwrap_or_else(|| "-".to_string());

    write!(
        out,
        "        <tr>\n            <td class=\"{}\"><a href=\"{}\">{}{slash}</a></td>\n            <td class=\"size\">{}</td>\n            <td>{}</td>\n        </tr>\n",
        if entry.is_dir { "dir" } else { "" },
        encode_double_quoted_attribute(&href),
        encode_text(&entry.name),
        size,
        modified,
    )
}

/// The request path with a leading and a trailing slash.
fn link_base(path: &str) -> String {
    let mut base = if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{path}")
    };
    if !base.ends_with('/') {
        base.push('/');
    }
    base
}

/// `/a/b/` -> `/a/`, `/` -> `/`.
fn parent_of(base: &str) -> String {
    let trimmed = base.trim_end_matches('/');
    match trimmed.rfind('/') {
        Some(idx) => trimmed[..=idx].to_string(),
        None => "/".to_string(),
    }
}
