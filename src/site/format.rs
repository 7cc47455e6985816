//! Human-readable metadata for directory listings.

use std::time::SystemTime;

use chrono::{DateTime, Local};

const KIB: u64 = 1024;
const MIB: u64 = 1024 * 1024;

/// `512 B`, `1.5 KB`, `3.0 MB`.
pub fn format_size(len: u64) -> String {
    if len < KIB {
        format!("{len} B")
    } else if len < MIB {
        format!("{:.1} KB", len as f64 / KIB as f64)
    } else {
        format!("{:.1} MB", len as f64 / MIB as f64)
    }
}

/// `YYYY-MM-DD HH:MM:SS` in local time.
pub fn format_mtime(time: SystemTime) -> String {
    DateTime::<Local>::from(time)
        .format("%Y-%m-%d %H:%M:%S")
        .to_string()
}
