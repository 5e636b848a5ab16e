//! Ambient request inputs: cookies, query, parsed body, uploads and body.
//!
//! A server usually decodes these before the application runs. When it has,
//! fill in [`Inputs`] directly. When it has not, [`Inputs::from_environment`]
//! decodes what the environment carries.

use url::form_urlencoded;

use crate::body::Body;
use crate::env::{Environment, keys};
use crate::request::{Params, ParsedBody};
use crate::upload::FileSpecMap;

const FORM_URLENCODED: &str = "application/x-www-form-urlencoded";

/// Everything [`ServerRequest::from_environment`](crate::ServerRequest::from_environment)
/// layers on top of the environment.
#[derive(Clone, Debug, Default)]
pub struct Inputs {
    pub cookies: Params,
    pub query: Params,
    pub parsed_body: ParsedBody,
    /// Raw upload specification; normalized during construction.
    pub files: FileSpecMap,
    pub body: Body,
}

impl Inputs {
    /// Decodes cookies from `HTTP_COOKIE`, query params from `QUERY_STRING`
    /// and, for a form `POST`, the body fields.
    ///
    /// ```rust
    /// use cgi_request::{Environment, Inputs};
    ///
    /// let env: Environment = [
    ///     ("REQUEST_METHOD", "POST"),
    ///     ("CONTENT_TYPE", "application/x-www-form-urlencoded"),
    ///     ("QUERY_STRING", "page=2"),
    ///     ("HTTP_COOKIE", "sid=abc; theme=dark"),
    /// ].into_iter().collect();
    ///
    /// let inputs = Inputs::from_environment(&env, "name=Ada+Lovelace");
    /// assert_eq!(inputs.query["page"], "2");
    /// assert_eq!(inputs.cookies["theme"], "dark");
    /// assert_eq!(inputs.parsed_body.fields().unwrap()["name"], "Ada Lovelace");
    /// ```
    pub fn from_environment(env: &Environment, body: impl Into<Body>) -> Self {
        let body = body.into();
        let cookies = env.get(keys::HTTP_COOKIE).map(parse_cookies).unwrap_or_default();
        let query = env.get(keys::QUERY_STRING).map(parse_query).unwrap_or_default();
        let parsed_body = if is_form_post(env) {
            ParsedBody::Fields(form_urlencoded::parse(body.as_bytes()).into_owned().collect())
        } else {
            ParsedBody::Empty
        };

        Self { cookies, query, parsed_body, files: FileSpecMap::new(), body }
    }

    pub fn with_cookies(mut self, cookies: Params) -> Self {
        self.cookies = cookies;
        self
    }

    pub fn with_query(mut self, query: Params) -> Self {
        self.query = query;
        self
    }

    pub fn with_parsed_body(mut self, parsed_body: ParsedBody) -> Self {
        self.parsed_body = parsed_body;
        self
    }

    pub fn with_files(mut self, files: FileSpecMap) -> Self {
        self.files = files;
        self
    }

    pub fn with_body(mut self, body: impl Into<Body>) -> Self {
        self.body = body.into();
        self
    }
}

/// `a=1&b=x+y` → `{a: 1, b: "x y"}`; a repeated key keeps its last value.
pub fn parse_query(query: &str) -> Params {
    form_urlencoded::parse(query.as_bytes()).into_owned().collect()
}

/// `sid=abc; theme=dark` → `{sid: abc, theme: dark}`. Pairs without `=` are
/// skipped; values are percent-decoded. A repeated name keeps its first
/// value, the most specific cookie a browser sends.
pub fn parse_cookies(header: &str) -> Params {
    let mut cookies = Params::new();
    for pair in header.split(';').map(str::trim).filter(|p| p.contains('=')) {
        if let Some((name, value)) = form_urlencoded::parse(pair.as_bytes()).into_owned().next() {
            if !name.is_empty() {
                cookies.entry(name).or_insert(value);
            }
        }
    }
    cookies
}

fn is_form_post(env: &Environment) -> bool {
    let is_post = env
        .get(keys::REQUEST_METHOD)
        .is_some_and(|m| m.eq_ignore_ascii_case("POST"));
    let is_form = env
        .get(keys::CONTENT_TYPE)
        .and_then(|ct| ct.split(';').next())
        .is_some_and(|ct| ct.trim().eq_ignore_ascii_case(FORM_URLENCODED));
    is_post && is_form
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_decoding() {
        let query = parse_query("a=1&b=x+y&c=%2F&a=2");
        assert_eq!(query["a"], "2");
        assert_eq!(query["b"], "x y");
        assert_eq!(query["c"], "/");
    }

    #[test]
    fn cookie_decoding() {
        let cookies = parse_cookies("sid=abc;  theme=dark%20mode; flag; sid=shadowed; =anon");
        assert_eq!(cookies["sid"], "abc");
        assert_eq!(cookies["theme"], "dark mode");
        assert!(!cookies.contains_key("flag"));
        assert_eq!(cookies.len(), 2);
    }

    #[test]
    fn body_fields_only_for_form_posts() {
        let json: Environment = [("REQUEST_METHOD", "POST"), ("CONTENT_TYPE", "application/json")]
            .into_iter()
            .collect();
        assert!(Inputs::from_environment(&json, "a=1").parsed_body.is_empty());

        let get: Environment = [("REQUEST_METHOD", "GET"), ("CONTENT_TYPE", FORM_URLENCODED)]
            .into_iter()
            .collect();
        assert!(Inputs::from_environment(&get, "a=1").parsed_body.is_empty());

        let form: Environment = [
            ("REQUEST_METHOD", "POST"),
            ("CONTENT_TYPE", "application/x-www-form-urlencoded; charset=UTF-8"),
        ]
        .into_iter()
        .collect();
        let inputs = Inputs::from_environment(&form, "a=1");
        assert_eq!(inputs.parsed_body.fields().unwrap()["a"], "1");
        assert_eq!(inputs.body.as_bytes(), b"a=1");
    }

    #[test]
    fn missing_sources_leave_groups_empty() {
        let inputs = Inputs::from_environment(&Environment::new(), Body::empty());
        assert!(inputs.cookies.is_empty());
        assert!(inputs.query.is_empty());
        assert!(inputs.files.is_empty());
    }
}
