use std::collections::HashMap;
use std::fmt;

/// HTTP request methods.
///
/// Only `GET` is served. Every other token still parses, so the connection
/// can answer it with 405 Method Not Allowed instead of 400.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Method {
    GET,
    /// Any other token, kept verbatim
    Other(String),
}

/// A parsed HTTP request head.
///
/// Only the request line drives the response. Headers are kept for logging.
#[derive(Debug, Clone)]
pub struct Request {
    pub method: Method,
    /// The request target exactly as received, e.g. `/docs/a%20b.txt?x=1`.
    pub path: String,
    pub version: String,
    pub headers: HashMap<String, String>,
}

impl Method {
    /// Parses an HTTP method token.
    ///
    /// Matching is case-sensitive, as in RFC 9110. Unknown tokens become
    /// [`Method::Other`].
    ///
    /// # Example
    ///
    /// ```
    /// # use dirserve::http::request::Method;
    /// assert_eq!(Method::from_token("GET"), Method::GET);
    /// assert_eq!(Method::from_token("get"), Method::Other("get".into()));
    /// ```
    pub fn from_token(s: &str) -> Self {
        match s {
            "GET" => Method::GET,
            other => Method::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Method::GET => "GET",
            Method::Other(token) => token,
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Request {
    /// Retrieves a header value by name, ignoring ASCII case.
    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    /// The request target without its query string or fragment.
    pub fn target_path(&self) -> &str {
        strip_query(&self.path)
    }

    pub fn user_agent(&self) -> &str {
        self.header("User-Agent").unwrap_or("-")
    }
}

/// Cuts `?query` and `#fragment` off a request target.
pub fn strip_query(target: &str) -> &str {
    match target.find(['?', '#']) {
        Some(idx) => &target[..idx],
        None => target,
    }
}
