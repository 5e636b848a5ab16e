//! Request URI and its reconstruction from a CGI environment.
//!
//! CGI never hands over the URL the client asked for. It has to be pieced
//! back together from `HTTPS`, `HTTP_HOST`, `SERVER_NAME`, `SERVER_ADDR`,
//! `SERVER_PORT`, `REQUEST_URI` and `QUERY_STRING`. [`build`] does that on a
//! best-effort basis: a source that is missing or unreadable is skipped and
//! never aborts the request.

use std::fmt;

use http::uri::Authority;
use tracing::debug;

use crate::env::{Environment, keys};

// ── Scheme ────────────────────────────────────────────────────────────────────

/// The two schemes a server-side request can arrive on.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub enum Scheme {
    #[default]
    Http,
    Https,
}

impl Scheme {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Http  => "http",
            Self::Https => "https",
        }
    }

    pub fn default_port(self) -> u16 {
        match self {
            Self::Http  => 80,
            Self::Https => 443,
        }
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Uri ───────────────────────────────────────────────────────────────────────

/// A structured request URI.
///
/// Every `with_*` method consumes the URI and returns the changed copy;
/// clone first to keep the original.
///
/// ```rust
/// use cgi_request::{Scheme, Uri};
///
/// let uri = Uri::default()
///     .with_scheme(Scheme::Https)
///     .with_host("example.com")
///     .with_port(443)
///     .with_path("/a/b")
///     .with_query("x=1");
///
/// assert_eq!(uri.to_string(), "https://example.com/a/b?x=1");
/// assert_eq!(uri.port(), Some(443));
/// ```
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Uri {
    scheme: Scheme,
    host: Option<String>,
    port: Option<u16>,
    path: String,
    query: Option<String>,
    fragment: Option<String>,
}

impl Uri {
    pub fn scheme(&self) -> Scheme { self.scheme }
    pub fn host(&self) -> Option<&str> { self.host.as_deref() }

    /// The explicitly resolved port, even when it equals the scheme default.
    pub fn port(&self) -> Option<u16> { self.port }

    pub fn path(&self) -> &str { &self.path }

    /// The query string without the leading `?`. An empty query is `None`.
    pub fn query(&self) -> Option<&str> {
        self.query.as_deref().filter(|q| !q.is_empty())
    }

    pub fn fragment(&self) -> Option<&str> {
        self.fragment.as_deref().filter(|f| !f.is_empty())
    }

    /// `host[:port]`, with the port omitted when it is the scheme default.
    pub fn authority(&self) -> Option<String> {
        let host = self.host.as_deref()?;
        Some(match self.port.filter(|&p| p != self.scheme.default_port()) {
            Some(port) => format!("{host}:{port}"),
            None => host.to_owned(),
        })
    }

    pub fn with_scheme(mut self, scheme: Scheme) -> Self {
        self.scheme = scheme;
        self
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = Some(query.into());
        self
    }

    pub fn with_fragment(mut self, fragment: impl Into<String>) -> Self {
        self.fragment = Some(fragment.into());
        self
    }

    /// Converts to an [`http::Uri`]. Without a host, only the path and
    /// query survive; the fragment never does, `http::Uri` has no slot for it.
    pub fn to_http(&self) -> Result<http::Uri, http::Error> {
        let mut path_and_query = if self.path.is_empty() { "/".to_owned() } else { self.path.clone() };
        if let Some(query) = self.query() {
            path_and_query.push('?');
            path_and_query.push_str(query);
        }

        let builder = http::Uri::builder();
        let builder = match self.authority() {
            Some(authority) => builder.scheme(self.scheme.as_str()).authority(authority),
            None => builder,
        };
        builder.path_and_query(path_and_query).build()
    }
}

impl fmt::Display for Uri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(authority) = self.authority() {
            write!(f, "{}://{authority}", self.scheme)?;
            if !self.path.is_empty() && !self.path.starts_with('/') {
                f.write_str("/")?;
            }
        }
        f.write_str(&self.path)?;
        if let Some(query) = self.query() {
            write!(f, "?{query}")?;
        }
        if let Some(fragment) = self.fragment() {
            write!(f, "#{fragment}")?;
        }
        Ok(())
    }
}

// ── Reconstruction ────────────────────────────────────────────────────────────

/// Reconstructs the request URI from a CGI environment.
///
/// | Field | Source, first present wins |
/// |---|---|
/// | scheme | `https` iff `HTTPS` is set, non-empty, and not `off` |
/// | host | `HTTP_HOST`, `SERVER_NAME`, `SERVER_ADDR` |
/// | port | port part of `HTTP_HOST`, `SERVER_PORT` |
/// | path | `REQUEST_URI` up to the first `?` |
/// | query | `REQUEST_URI` after the first `?`, `QUERY_STRING` |
///
/// An `HTTP_HOST` that does not parse as an authority leaves host and port
/// unresolved; host does not then fall back to `SERVER_NAME`.
pub fn build(env: &Environment) -> Uri {
    let mut uri = Uri::default().with_scheme(scheme(env));

    let mut has_port = false;
    if let Some(host_header) = env.get(keys::HTTP_HOST) {
        let (host, port) = split_authority(host_header);
        if let Some(host) = host {
            uri = uri.with_host(host);
        }
        if let Some(port) = port {
            has_port = true;
            uri = uri.with_port(port);
        }
    } else if let Some(name) = env.get(keys::SERVER_NAME) {
        uri = uri.with_host(name);
    } else if let Some(addr) = env.get(keys::SERVER_ADDR) {
        uri = uri.with_host(addr);
    }

    if !has_port {
        if let Some(raw) = env.get(keys::SERVER_PORT) {
            match raw.trim().parse::<u16>() {
                Ok(port) => uri = uri.with_port(port),
                Err(_) => debug!(value = %raw, "ignoring unparseable SERVER_PORT"),
            }
        }
    }

    let mut has_query = false;
    if let Some(target) = env.get(keys::REQUEST_URI) {
        let (path, query) = match target.split_once('?') {
            Some((path, query)) => (path, Some(query)),
            None => (target, None),
        };
        uri = uri.with_path(path);
        if let Some(query) = query {
            has_query = true;
            uri = uri.with_query(query);
        }
    }

    if !has_query {
        if let Some(query) = env.get(keys::QUERY_STRING) {
            uri = uri.with_query(query);
        }
    }

    uri
}

fn scheme(env: &Environment) -> Scheme {
    match env.get(keys::HTTPS) {
        Some("" | "0" | "off") | None => Scheme::Http,
        Some(_) => Scheme::Https,
    }
}

/// Splits `host[:port]` the way a URL parser reads the authority of
/// `http://{authority}`. Unparseable input, including a port that is not a
/// `u16`, resolves neither part.
fn split_authority(raw: &str) -> (Option<String>, Option<u16>) {
    match raw.parse::<Authority>() {
        Ok(authority) if !authority.host().is_empty() && has_valid_port(raw) => {
            (Some(authority.host().to_owned()), authority.port_u16())
        }
        _ => {
            debug!(value = %raw, "ignoring unparseable HTTP_HOST");
            (None, None)
        }
    }
}

/// `true` unless the authority carries a non-empty port that is not a `u16`.
/// An IPv6 literal's colons sit inside `[...]` and are not a port.
fn has_valid_port(raw: &str) -> bool {
    let tail = raw.rsplit_once(']').map_or(raw, |(_, tail)| tail);
    match tail.rsplit_once(':') {
        Some((_, port)) if !port.is_empty() => port.parse::<u16>().is_ok(),
        _ => true,
    }
}
