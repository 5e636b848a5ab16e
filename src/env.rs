//! The CGI-style environment snapshot a request is rebuilt from.
//!
//! A web server hands request context to a CGI program as flat string
//! variables: `REQUEST_METHOD`, `QUERY_STRING`, one `HTTP_*` variable per
//! request header, and so on. [`Environment`] holds that snapshot. It is
//! passed explicitly to everything that reads it; nothing in this crate
//! touches the process environment behind your back.

use std::collections::BTreeMap;

/// Well-known environment keys.
pub mod keys {
    pub const REQUEST_METHOD: &str = "REQUEST_METHOD";
    pub const SERVER_PROTOCOL: &str = "SERVER_PROTOCOL";

    pub const HTTPS: &str = "HTTPS";
    pub const HTTP_HOST: &str = "HTTP_HOST";
    pub const SERVER_NAME: &str = "SERVER_NAME";
    pub const SERVER_ADDR: &str = "SERVER_ADDR";
    pub const SERVER_PORT: &str = "SERVER_PORT";
    pub const REQUEST_URI: &str = "REQUEST_URI";
    pub const QUERY_STRING: &str = "QUERY_STRING";

    /// Prefix of every variable that transports a request header.
    pub const HEADER_PREFIX: &str = "HTTP_";
    pub const CONTENT_TYPE: &str = "CONTENT_TYPE";
    pub const CONTENT_LENGTH: &str = "CONTENT_LENGTH";
    pub const CONTENT_MD5: &str = "CONTENT_MD5";
    pub const HTTP_COOKIE: &str = "HTTP_COOKIE";

    // Authorization fallbacks, set by Apache/FastCGI when the header itself
    // is withheld from the application.
    pub const REDIRECT_HTTP_AUTHORIZATION: &str = "REDIRECT_HTTP_AUTHORIZATION";
    pub const PHP_AUTH_USER: &str = "PHP_AUTH_USER";
    pub const PHP_AUTH_PW: &str = "PHP_AUTH_PW";
    pub const PHP_AUTH_DIGEST: &str = "PHP_AUTH_DIGEST";
}

/// A read-only map of environment variables, iterated in key order.
///
/// ```rust
/// use cgi_request::Environment;
///
/// let env: Environment = [("REQUEST_METHOD", "POST"), ("HTTP_HOST", "example.com")]
///     .into_iter()
///     .collect();
///
/// assert_eq!(env.get("REQUEST_METHOD"), Some("POST"));
/// assert!(!env.contains("SERVER_PORT"));
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Environment {
    vars: BTreeMap<String, String>,
}

impl Environment {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshots the current process environment. Variables whose name or
    /// value is not valid unicode are skipped.
    pub fn from_process() -> Self {
        std::env::vars_os()
            .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)))
            .collect()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.vars.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.vars.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize { self.vars.len() }
    pub fn is_empty(&self) -> bool { self.vars.is_empty() }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Environment {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            vars: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}

impl<'a> IntoIterator for &'a Environment {
    type Item = (&'a String, &'a String);
    type IntoIter = std::collections::btree_map::Iter<'a, String, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.vars.iter()
    }
}
