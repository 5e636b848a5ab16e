//! Request headers and their extraction from a CGI environment.
//!
//! A CGI server does not pass headers verbatim. `X-Custom-Header: v` arrives
//! as `HTTP_X_CUSTOM_HEADER=v`; `Content-Type` and `Content-Length` arrive
//! unprefixed; and `Authorization` is often withheld entirely and replaced
//! by `PHP_AUTH_*` or `REDIRECT_HTTP_AUTHORIZATION` variables.
//! [`extract`] undoes all of that.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use tracing::trace;

use crate::env::{Environment, keys};

/// Headers that a server also sets unprefixed, with their canonical names.
const UNPREFIXED: [(&str, &str); 3] = [
    (keys::CONTENT_TYPE,   "Content-Type"),
    (keys::CONTENT_LENGTH, "Content-Length"),
    (keys::CONTENT_MD5,    "Content-Md5"),
];

const AUTHORIZATION: &str = "Authorization";

// ── HeaderMap ─────────────────────────────────────────────────────────────────

/// An ordered header map: canonical name → one or more values.
///
/// Names keep the case they were inserted with; lookups ignore case. Order
/// is first-seen insertion order, and replacing a header keeps its position.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HeaderMap {
    entries: Vec<(String, Vec<String>)>,
}

impl HeaderMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets `name` to the single value `value`, replacing existing values.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.position(&name) {
            Some(i) => self.entries[i].1 = vec![value],
            None => self.entries.push((name, vec![value])),
        }
    }

    /// Adds `value` to the values of `name`.
    pub fn append(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.position(&name) {
            Some(i) => self.entries[i].1.push(value),
            None => self.entries.push((name, vec![value])),
        }
    }

    /// First value of `name`, case-insensitively.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.get_all(name).first().map(String::as_str)
    }

    /// All values of `name`; empty when the header is absent.
    pub fn get_all(&self, name: &str) -> &[String] {
        match self.position(name) {
            Some(i) => self.entries[i].1.as_slice(),
            None => &[],
        }
    }

    /// All values of `name` joined with `", "`, or `None` when absent.
    pub fn line(&self, name: &str) -> Option<String> {
        self.position(name).map(|i| self.entries[i].1.join(", "))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    pub fn len(&self) -> usize { self.entries.len() }
    pub fn is_empty(&self) -> bool { self.entries.is_empty() }

    fn position(&self, name: &str) -> Option<usize> {
        self.entries.iter().position(|(k, _)| k.eq_ignore_ascii_case(name))
    }
}

// ── Extraction ────────────────────────────────────────────────────────────────

/// Derives the request headers from a CGI environment.
///
/// 1. `HTTP_*` variables become headers with canonical names
///    (`HTTP_X_CUSTOM_HEADER` → `X-Custom-Header`). `HTTP_CONTENT_TYPE` and
///    friends are skipped when the unprefixed variable is also present.
/// 2. `CONTENT_TYPE`, `CONTENT_LENGTH` and `CONTENT_MD5` map directly to
///    their header names.
/// 3. When no `Authorization` header came out of steps 1–2, it is
///    synthesized from, in order: `REDIRECT_HTTP_AUTHORIZATION`, Basic
///    credentials from `PHP_AUTH_USER`/`PHP_AUTH_PW`, or `PHP_AUTH_DIGEST`.
///
/// ```rust
/// use cgi_request::{Environment, headers};
///
/// let env: Environment = [
///     ("HTTP_X_CUSTOM_HEADER", "1"),
///     ("CONTENT_TYPE", "text/plain"),
/// ].into_iter().collect();
///
/// let headers = headers::extract(&env);
/// assert_eq!(headers.get("X-Custom-Header"), Some("1"));
/// assert_eq!(headers.get("content-type"), Some("text/plain"));
/// ```
pub fn extract(env: &Environment) -> HeaderMap {
    let mut headers = HeaderMap::new();

    for (key, value) in env.iter() {
        if let Some(stripped) = key.strip_prefix(keys::HEADER_PREFIX) {
            if stripped.is_empty() {
                continue;
            }
            if !is_unprefixed(stripped) || !env.contains(stripped) {
                headers.insert(canonicalize(stripped), value);
            }
        } else if let Some(name) = unprefixed_name(key) {
            headers.insert(name, value);
        }
    }

    if !headers.contains(AUTHORIZATION) {
        if let Some(value) = authorization_fallback(env) {
            headers.insert(AUTHORIZATION, value);
        }
    }

    headers
}

fn authorization_fallback(env: &Environment) -> Option<String> {
    if let Some(value) = env.get(keys::REDIRECT_HTTP_AUTHORIZATION) {
        trace!(source = keys::REDIRECT_HTTP_AUTHORIZATION, "authorization recovered");
        return Some(value.to_owned());
    }
    if let Some(user) = env.get(keys::PHP_AUTH_USER) {
        trace!(source = keys::PHP_AUTH_USER, "authorization recovered");
        let pass = env.get(keys::PHP_AUTH_PW).unwrap_or("");
        return Some(format!("Basic {}", STANDARD.encode(format!("{user}:{pass}"))));
    }
    if let Some(value) = env.get(keys::PHP_AUTH_DIGEST) {
        trace!(source = keys::PHP_AUTH_DIGEST, "authorization recovered");
        return Some(value.to_owned());
    }
    None
}

fn is_unprefixed(key: &str) -> bool {
    unprefixed_name(key).is_some()
}

fn unprefixed_name(key: &str) -> Option<&'static str> {
    UNPREFIXED.iter().find(|(k, _)| *k == key).map(|(_, name)| *name)
}

/// `X_CUSTOM_HEADER` → `X-Custom-Header`.
fn canonicalize(key: &str) -> String {
    key.split('_')
        .map(|word| {
            let lower = word.to_ascii_lowercase();
            let mut chars = lower.chars();
            match chars.next() {
                Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join("-")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(pairs: &[(&str, &str)]) -> Environment {
        pairs.iter().copied().collect()
    }

    #[test]
    fn canonicalizes_prefixed_names() {
        assert_eq!(canonicalize("X_CUSTOM_HEADER"), "X-Custom-Header");
        assert_eq!(canonicalize("ACCEPT"), "Accept");
        assert_eq!(canonicalize("CONTENT_MD5"), "Content-Md5");
        assert_eq!(canonicalize("X__Y"), "X--Y");
    }

    #[test]
    fn bare_prefix_is_not_a_header() {
        let headers = extract(&env(&[("HTTP_", "v"), ("HTTP_HOST", "a.test")]));
        assert_eq!(headers.len(), 1);
        assert_eq!(headers.get("Host"), Some("a.test"));
    }

    #[test]
    fn transports_prefixed_headers() {
        let headers = extract(&env(&[
            ("HTTP_X_CUSTOM_HEADER", "a"),
            ("HTTP_ACCEPT", "*/*"),
            ("SERVER_NAME", "ignored"),
        ]));
        assert_eq!(headers.get("X-Custom-Header"), Some("a"));
        assert_eq!(headers.get("Accept"), Some("*/*"));
        assert_eq!(headers.len(), 2);
    }

    #[test]
    fn unprefixed_content_type_wins_over_prefixed() {
        let headers = extract(&env(&[
            ("CONTENT_TYPE", "application/json"),
            ("HTTP_CONTENT_TYPE", "text/plain"),
        ]));
        assert_eq!(headers.get_all("Content-Type"), ["application/json"]);
        assert_eq!(headers.len(), 1);
    }

    #[test]
    fn prefixed_content_type_used_when_unprefixed_absent() {
        let headers = extract(&env(&[("HTTP_CONTENT_LENGTH", "12")]));
        assert_eq!(headers.get("Content-Length"), Some("12"));
    }

    #[test]
    fn content_md5_keeps_its_canonical_spelling() {
        let headers = extract(&env(&[("CONTENT_MD5", "abc")]));
        assert_eq!(headers.iter().next().map(|(k, _)| k), Some("Content-Md5"));
    }

    #[test]
    fn explicit_authorization_is_kept() {
        let headers = extract(&env(&[
            ("HTTP_AUTHORIZATION", "Bearer t"),
            ("REDIRECT_HTTP_AUTHORIZATION", "Bearer other"),
        ]));
        assert_eq!(headers.get("Authorization"), Some("Bearer t"));
    }

    #[test]
    fn redirect_authorization_beats_basic_credentials() {
        let headers = extract(&env(&[
            ("REDIRECT_HTTP_AUTHORIZATION", "Bearer r"),
            ("PHP_AUTH_USER", "alice"),
            ("PHP_AUTH_PW", "secret"),
        ]));
        assert_eq!(headers.get("Authorization"), Some("Bearer r"));
    }

    #[test]
    fn basic_credentials_are_encoded() {
        let headers = extract(&env(&[("PHP_AUTH_USER", "alice"), ("PHP_AUTH_PW", "secret")]));
        assert_eq!(headers.get("Authorization"), Some("Basic YWxpY2U6c2VjcmV0"));

        let headers = extract(&env(&[("PHP_AUTH_USER", "alice")]));
        assert_eq!(headers.get("Authorization"), Some("Basic YWxpY2U6"));
    }

    #[test]
    fn digest_is_the_last_resort() {
        let headers = extract(&env(&[("PHP_AUTH_DIGEST", "Digest username=\"a\"")]));
        assert_eq!(headers.get("Authorization"), Some("Digest username=\"a\""));

        assert!(!extract(&env(&[("PHP_AUTH_PW", "x")])).contains("Authorization"));
    }

    #[test]
    fn insert_replaces_in_place() {
        let mut headers = HeaderMap::new();
        headers.insert("A", "1");
        headers.insert("B", "2");
        headers.insert("a", "3");
        let names: Vec<_> = headers.iter().map(|(k, _)| k).collect();
        assert_eq!(names, ["A", "B"]);
        assert_eq!(headers.get("A"), Some("3"));
    }

    #[test]
    fn append_joins_into_a_line() {
        let mut headers = HeaderMap::new();
        headers.append("Accept", "text/html");
        headers.append("accept", "application/json");
        assert_eq!(headers.line("ACCEPT").as_deref(), Some("text/html, application/json"));
        assert_eq!(headers.line("missing"), None);
        assert!(headers.get_all("missing").is_empty());
    }
}
