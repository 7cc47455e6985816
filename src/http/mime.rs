//! Content-Type lookup by file extension.

use std::path::Path;

pub const DEFAULT_MIME: &str = "application/octet-stream";

/// MIME type for `path`, judged by its extension alone.
pub fn mime_for_path(path: &Path) -> &'static str {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(mime_for_extension)
        .unwrap_or(DEFAULT_MIME)
}

/// MIME type for an extension given without its leading dot.
pub fn mime_for_extension(ext: &str) -> &'static str {
    match ext.to_ascii_lowercase().as_str() {
        "html" | "htm" => "text/html",
        "css" => "text/css",
        "js" => "application/javascript",
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "txt" | "c" | "h" | "conf" => "text/plain",
        "json" => "application/json",
        "pdf" => "application/pdf",
        _ => DEFAULT_MIME,
    }
}
