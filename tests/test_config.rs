use dirserve::config::{
    Config, Limits, MAX_IDLE_TIMEOUT_SECS, MIN_HEADER_BYTES, parse_listen_addr,
};
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;

// Tests in this file share the process environment.
static ENV_LOCK: Mutex<()> = Mutex::new(());

#[test]
fn test_config_default_address() {
    let _guard = ENV_LOCK.lock().unwrap();
    // When LISTEN env var is not set, should use default
    unsafe {
        std::env::remove_var("LISTEN");
    }
    let cfg = Config::load();
    assert_eq!(cfg.server.listen_addr, "0.0.0.0:8080");
}

#[test]
fn test_config_custom_address_from_env() {
    let _guard = ENV_LOCK.lock().unwrap();
    // When LISTEN env var is set, should use it
    unsafe {
        std::env::set_var("LISTEN", "127.0.0.1:3000");
    }
    let cfg = Config::load();
    assert_eq!(cfg.server.listen_addr, "127.0.0.1:3000");
    unsafe {
        std::env::remove_var("LISTEN");
    }
}

#[test]
fn test_config_root_from_env() {
    let _guard = ENV_LOCK.lock().unwrap();
    unsafe {
        std::env::set_var("ROOT", "/srv/www");
    }
    let cfg = Config::load();
    assert_eq!(cfg.static_files.root, PathBuf::from("/srv/www"));
    unsafe {
        std::env::remove_var("ROOT");
    }
}

#[test]
fn test_config_clone() {
    let cfg1 = Config::default();
    let cfg2 = cfg1.clone();
    assert_eq!(cfg1.server.listen_addr, cfg2.server.listen_addr);
    assert_eq!(cfg1.static_files.root, cfg2.static_files.root);
}

#[test]
fn test_config_yaml_with_defaults() {
    let yaml = r#"
server:
  listen_addr: "127.0.0.1:9090"
  idle_timeout_secs: 3
static_files:
  root: "/var/www"
"#;
    let cfg = Config::from_yaml_str(yaml).unwrap();

    assert_eq!(cfg.server.listen_addr, "127.0.0.1:9090");
    assert_eq!(cfg.server.idle_timeout_secs, 3);
    // Unset keys keep their defaults
    assert_eq!(cfg.server.max_connections, 1024);
    assert_eq!(cfg.server.max_header_bytes, 8192);
    assert_eq!(cfg.static_files.root, PathBuf::from("/var/www"));
    assert_eq!(cfg.static_files.listing_limit, 1024 * 1024);
}

#[test]
fn test_config_empty_yaml_is_default() {
    let cfg = Config::from_yaml_str("{}").unwrap();
    assert_eq!(cfg.server.listen_addr, "0.0.0.0:8080");
}

#[test]
fn test_config_rejects_bad_yaml() {
    assert!(Config::from_yaml_str("server: [1, 2").is_err());
    assert!(Config::from_yaml_str("server:\n  max_connections: lots\n").is_err());
}

#[test]
fn test_config_from_file() {
    let _guard = ENV_LOCK.lock().unwrap();
    unsafe {
        std::env::remove_var("LISTEN");
        std::env::remove_var("ROOT");
    }
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("dirserve.yaml");
    std::fs::write(&path, "server:\n  listen_addr: \"8081\"\n").unwrap();

    let cfg = Config::from_file(&path).unwrap();
    assert_eq!(cfg.server.listen_addr, "8081");
    assert!(Config::from_file(&dir.path().join("missing.yaml")).is_err());
}

#[test]
fn test_limits_from_settings() {
    let cfg = Config::from_yaml_str("server:\n  idle_timeout_secs: 7\n  max_connections: 2\n").unwrap();
    let limits = cfg.server.limits().unwrap();

    assert_eq!(limits.idle_timeout, Duration::from_secs(7));
    assert_eq!(limits.max_connections, 2);
    assert_eq!(Limits::default().max_header_bytes, 8192);
}

#[test]
fn test_limits_reject_zero_max_connections() {
    let cfg = Config::from_yaml_str("server:\n  max_connections: 0\n").unwrap();
    let err = cfg.server.limits().unwrap_err();
    assert!(err.to_string().contains("max_connections"));
}

#[test]
fn test_limits_reject_zero_idle_timeout() {
    let cfg = Config::from_yaml_str("server:\n  idle_timeout_secs: 0\n").unwrap();
    let err = cfg.server.limits().unwrap_err();
    assert!(err.to_string().contains("idle_timeout_secs"));
}

#[test]
fn test_limits_reject_huge_idle_timeout() {
    let cfg = Config::from_yaml_str("server:\n  idle_timeout_secs: 18446744073709551615\n").unwrap();
    assert!(cfg.server.limits().is_err());

    let over = format!("server:\n  idle_timeout_secs: {}\n", MAX_IDLE_TIMEOUT_SECS + 1);
    assert!(Config::from_yaml_str(&over).unwrap().server.limits().is_err());

    let edge = format!("server:\n  idle_timeout_secs: {MAX_IDLE_TIMEOUT_SECS}\n");
    assert!(Config::from_yaml_str(&edge).unwrap().server.limits().is_ok());
}

#[test]
fn test_limits_reject_tiny_header_buffer() {
    let cfg = Config::from_yaml_str("server:\n  max_header_bytes: 0\n").unwrap();
    assert!(cfg.server.limits().is_err());

    let cfg = Config::from_yaml_str(&format!("server:\n  max_header_bytes: {MIN_HEADER_BYTES}\n")).unwrap();
    assert!(cfg.server.limits().is_ok());
}

#[test]
fn test_default_limits_are_valid() {
    let limits = Config::default().server.limits().unwrap();
    assert_eq!(limits, Limits::default());
}

#[test]
fn test_listen_addr_forms() {
    assert_eq!(
        parse_listen_addr("127.0.0.1:8000").unwrap(),
        "127.0.0.1:8000".parse().unwrap()
    );
    assert_eq!(parse_listen_addr("5000").unwrap(), "0.0.0.0:5000".parse().unwrap());
    assert_eq!(parse_listen_addr(":5001").unwrap(), "0.0.0.0:5001".parse().unwrap());
    assert_eq!(parse_listen_addr("[::1]:5002").unwrap(), "[::1]:5002".parse().unwrap());
    assert!(parse_listen_addr("127.0.0.1:99999").is_err());
}
