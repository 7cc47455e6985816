//! Mapping request targets onto files under the served root.
//!
//! The containment check runs on canonical paths: `..`, `.` and symlinks
//! are all resolved by the filesystem before the result is compared with the
//! canonical root, so no spelling of a target can land outside it.

use std::ffi::OsString;
use std::fmt;
use std::fs::{self, File};
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};

use percent_encoding::percent_decode_str;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveError {
    /// The target exists but lies outside the root or cannot be read.
    Forbidden,
    /// The target does not exist, or could not be canonicalized.
    NotFound,
}

impl fmt::Display for ResolveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolveError::Forbidden => f.write_str("forbidden"),
            ResolveError::NotFound => f.write_str("not found"),
        }
    }
}

impl std::error::Error for ResolveError {}

/// A request target that has passed the containment check.
#[derive(Debug)]
pub enum ResolvedTarget {
    /// An opened regular file and its length at open time.
    File { path: PathBuf, file: File, len: u64 },
    Directory { path: PathBuf },
}

impl ResolvedTarget {
    pub fn path(&self) -> &Path {
        match self {
            ResolvedTarget::File { path, .. } | ResolvedTarget::Directory { path } => path,
        }
    }
}

/// Canonical form of the served root. Fails unless it is a directory.
pub fn canonical_root(root: &Path) -> io::Result<PathBuf> {
    let canonical = fs::canonicalize(root)?;
    if !fs::metadata(&canonical)?.is_dir() {
        return Err(io::Error::new(
            ErrorKind::InvalidInput,
            format!("{} is not a directory", root.display()),
        ));
    }
    Ok(canonical)
}

/// Resolves `request_path` against the canonical `root`.
///
/// `root` must already be canonical (see [`canonical_root`]).
/// `request_path` carries no query string (see
/// [`Request::target_path`](crate::http::request::Request::target_path)). It
/// is percent-decoded exactly once, so `%252e` stays the literal name `%2e`.
pub fn resolve(root: &Path, request_path: &str) -> Result<ResolvedTarget, ResolveError> {
    let decoded = decode_target(request_path).ok_or(ResolveError::NotFound)?;

    // Plain concatenation: Path::join would let an absolute target replace the root.
    let mut candidate = OsString::from(root.as_os_str());
    candidate.push("/");
    candidate.push(decoded.trim_start_matches('/'));

    let canonical = fs::canonicalize(&candidate).map_err(|_| ResolveError::NotFound)?;
    if !is_within(root, &canonical) {
        return Err(ResolveError::Forbidden);
    }

    let meta = fs::metadata(&canonical).map_err(|_| ResolveError::NotFound)?;
    if meta.is_dir() {
        return Ok(ResolvedTarget::Directory { path: canonical });
    }
    if !meta.is_file() {
        return Err(ResolveError::Forbidden);
    }

    let file = File::open(&canonical).map_err(|e| match e.kind() {
        ErrorKind::PermissionDenied => ResolveError::Forbidden,
        _ => ResolveError::NotFound,
    })?;
    let len = file
        .metadata()
        .map(|m| m.len())
        .map_err(|_| ResolveError::NotFound)?;

    Ok(ResolvedTarget::File {
        path: canonical,
        file,
        len,
    })
}

/// True when `candidate` is `root` itself or lies beneath it. Both paths
/// must be canonical; the comparison is per component, so `/srv/www2` is not
/// inside `/srv/www`.
pub fn is_within(root: &Path, candidate: &Path) -> bool {
    candidate.starts_with(root)
}

fn decode_target(raw: &str) -> Option<String> {
    let decoded = percent_decode_str(raw).decode_utf8().ok()?;
    if decoded.contains('\0') {
        return None;
    }
    Some(decoded.into_owned())
}
