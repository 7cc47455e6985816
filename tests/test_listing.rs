use std::fs;

use dirserve::site::listing::{ListError, list_directory, read_entries};
use dirserve::site::Site;

const LIMIT: usize = 64 * 1024;

fn row_for<'a>(page: &'a str, href: &str) -> &'a str {
    let needle = format!("href=\"{href}\"");
    let start = page.find(&needle).unwrap_or_else(|| panic!("no link to {href}"));
    let end = page[start..].find("</tr>").unwrap();
    &page[start..start + end]
}

#[test]
fn test_listing_shows_files_and_directories() {
    let tmp = tempfile::tempdir().unwrap();
    fs::write(tmp.path().join("a.txt"), b"0123456789").unwrap();
    fs::create_dir(tmp.path().join("sub")).unwrap();

    let page = list_directory(tmp.path(), "/", LIMIT).unwrap();

    assert!(page.starts_with("<!DOCTYPE html>"));
    assert!(page.contains("Directory Listing: /"));
    assert!(row_for(&page, "/a.txt").contains("<td class=\"size\">10 B</td>"));
    assert!(row_for(&page, "/sub/").contains("<td class=\"size\">-</td>"));
    assert!(page.contains(">sub/</a>"));
    assert!(page.trim_end().ends_with("</html>"));
}

#[test]
fn test_parent_link_comes_first() {
    let tmp = tempfile::tempdir().unwrap();
    fs::write(tmp.path().join("a.txt"), b"x").unwrap();

    let page = list_directory(tmp.path(), "/docs/guide/", LIMIT).unwrap();
    let parent = page.find(">..</a>").unwrap();
    let first = page.find(">a.txt</a>").unwrap();

    assert!(parent < first);
    assert!(page.contains("href=\"/docs/\">..</a>"));
    assert!(page.contains("href=\"/docs/guide/a.txt\""));
}

#[test]
fn test_each_entry_listed_once_in_name_order() {
    let tmp = tempfile::tempdir().unwrap();
    for name in ["zeta", "alpha", "mid.log"] {
        fs::write(tmp.path().join(name), name).unwrap();
    }

    let page = list_directory(tmp.path(), "/", LIMIT).unwrap();
    for name in ["zeta", "alpha", "mid.log"] {
        assert_eq!(page.matches(&format!(">{name}</a>")).count(), 1, "{name}");
    }

    let alpha = page.find(">alpha</a>").unwrap();
    let mid = page.find(">mid.log</a>").unwrap();
    let zeta = page.find(">zeta</a>").unwrap();
    assert!(alpha < mid && mid < zeta);

    assert!(!page.contains(">.</a>"));
}

#[test]
fn test_subdirectory_links_use_request_path() {
    let tmp = tempfile::tempdir().unwrap();
    fs::write(tmp.path().join("notes 1.md"), b"x").unwrap();

    let page = list_directory(tmp.path(), "/my%20docs", LIMIT).unwrap();

    assert!(page.contains("Directory Listing: /my docs/"));
    assert!(page.contains("href=\"/my%20docs/notes%201.md\""));
    assert!(page.contains("href=\"/\">..</a>"));
}

#[test]
fn test_empty_directory_has_only_parent() {
    let tmp = tempfile::tempdir().unwrap();
    let page = list_directory(tmp.path(), "/", LIMIT).unwrap();

    assert_eq!(page.matches("<a href=").count(), 1);
}

#[test]
fn test_listing_over_limit_fails_whole() {
    let tmp = tempfile::tempdir().unwrap();
    for i in 0..50 {
        fs::write(tmp.path().join(format!("file-{i:03}.txt")), b"data").unwrap();
    }

    let err = list_directory(tmp.path(), "/", 2048).unwrap_err();
    assert!(matches!(err, ListError::BufferExceeded));

    let ok = list_directory(tmp.path(), "/", LIMIT).unwrap();
    assert!(ok.len() > 2048);
}

#[test]
fn test_missing_directory_is_io_error() {
    let tmp = tempfile::tempdir().unwrap();
    let err = list_directory(&tmp.path().join("gone"), "/gone/", LIMIT).unwrap_err();
    assert!(matches!(err, ListError::Io(ref e) if e.kind() == std::io::ErrorKind::NotFound));
}

#[cfg(unix)]
#[test]
fn test_dangling_symlink_is_still_listed() {
    let tmp = tempfile::tempdir().unwrap();
    std::os::unix::fs::symlink(tmp.path().join("nowhere"), tmp.path().join("broken")).unwrap();

    let entries = read_entries(tmp.path()).unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].name, "broken");
    assert!(!entries[0].is_dir);

    let page = list_directory(tmp.path(), "/", LIMIT).unwrap();
    assert!(page.contains(">broken</a>"));
}

#[test]
fn test_site_uses_configured_limit() {
    let tmp = tempfile::tempdir().unwrap();
    fs::write(tmp.path().join("a.txt"), b"x").unwrap();

    let tight = Site::new(tmp.path(), 128).unwrap();
    assert!(matches!(
        tight.list(tight.root(), "/"),
        Err(ListError::BufferExceeded)
    ));

    let roomy = tight.with_listing_limit(LIMIT);
    assert!(roomy.list(roomy.root(), "/").is_ok());
}
