use std::collections::HashMap;

use dirserve::http::parser::parse_request;
use dirserve::http::request::{Method, Request, strip_query};

#[test]
fn test_request_header_retrieval() {
    let mut headers = HashMap::new();
    headers.insert("Host".to_string(), "example.com".to_string());
    headers.insert("Content-Type".to_string(), "application/json".to_string());

    let req = Request {
        method: Method::GET,
        path: "/".to_string(),
        version: "HTTP/1.1".to_string(),
        headers,
    };

    assert_eq!(req.header("Host"), Some("example.com"));
    assert_eq!(req.header("content-type"), Some("application/json"));
    assert_eq!(req.header("Missing"), None);
}

#[test]
fn test_request_user_agent_default() {
    let req = parse_request(b"GET / HTTP/1.1\r\n\r\n").unwrap();

    assert_eq!(req.user_agent(), "-");
    assert_eq!(req.version, "HTTP/1.1");
}

#[test]
fn test_request_target_path() {
    let req = parse_request(
        b"GET /docs/a%20b.txt?download=1#top HTTP/1.1\r\nUser-Agent: curl/8.0\r\n\r\n",
    )
    .unwrap();

    assert_eq!(req.target_path(), "/docs/a%20b.txt");
    assert_eq!(req.user_agent(), "curl/8.0");
}

#[test]
fn test_strip_query() {
    assert_eq!(strip_query("/"), "/");
    assert_eq!(strip_query("/a?b"), "/a");
    assert_eq!(strip_query("/a#b?c"), "/a");
    assert_eq!(strip_query("?only"), "");
}

#[test]
fn test_method_round_trips_its_token() {
    assert_eq!(Method::from_token("DELETE").as_str(), "DELETE");
    assert_eq!(Method::from_token("PROPFIND").to_string(), "PROPFIND");
    assert_eq!(Method::from_token("get"), Method::Other("get".to_string()));
}
