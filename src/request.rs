//! The immutable server-side request.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use http::{HeaderName, HeaderValue, Method, Version};
use http_body_util::Full;
use tracing::{debug, warn};

use crate::body::Body;
use crate::env::{Environment, keys};
use crate::error::Error;
use crate::headers::{self, HeaderMap};
use crate::inputs::Inputs;
use crate::upload::{self, UploadedFiles};
use crate::uri::{self, Uri};

/// Cookie and query parameters.
pub type Params = HashMap<String, String>;

// ── ParsedBody ────────────────────────────────────────────────────────────────

/// The deserialized body, if anything deserialized it.
#[derive(Clone, Default)]
pub enum ParsedBody {
    #[default]
    Empty,
    /// Form fields.
    Fields(Params),
    /// Any other deserialized representation, e.g. a JSON document.
    Object(Arc<dyn Any + Send + Sync>),
}

impl ParsedBody {
    pub fn object<T: Any + Send + Sync>(value: T) -> Self {
        Self::Object(Arc::new(value))
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    pub fn fields(&self) -> Option<&Params> {
        match self {
            Self::Fields(fields) => Some(fields),
            _ => None,
        }
    }

    /// The object payload, if it is a `T`.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        match self {
            Self::Object(object) => object.downcast_ref(),
            _ => None,
        }
    }
}

impl fmt::Debug for ParsedBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => f.write_str("Empty"),
            Self::Fields(fields) => f.debug_tuple("Fields").field(fields).finish(),
            Self::Object(_) => f.write_str("Object(..)"),
        }
    }
}

// ── Attributes ────────────────────────────────────────────────────────────────

/// Application-defined values attached to a request, e.g. route parameters
/// or an authenticated user.
#[derive(Clone, Default)]
pub struct Attributes {
    values: HashMap<String, Arc<dyn Any + Send + Sync>>,
}

impl Attributes {
    /// The value under `name`, if it is a `T`.
    pub fn get<T: Any>(&self, name: &str) -> Option<&T> {
        self.values.get(name)?.downcast_ref()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize { self.values.len() }
    pub fn is_empty(&self) -> bool { self.values.is_empty() }
}

impl fmt::Debug for Attributes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.values.keys()).finish()
    }
}

// ── ServerRequest ─────────────────────────────────────────────────────────────

/// Fields fixed at construction.
struct Head {
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    version: String,
    server_params: Environment,
}

/// An immutable, server-side HTTP request.
///
/// Method, URI, headers, protocol version and the environment snapshot are
/// fixed at construction. Body, cookies, query, parsed body, uploads and
/// attributes can be replaced, but only through `with_*` methods that leave
/// the receiver untouched and return a new request. Groups a method does not
/// touch are shared between both requests, so `with_*` never copies headers
/// or payloads.
///
/// ```rust
/// use cgi_request::{Environment, Inputs, ServerRequest};
///
/// let env: Environment = [
///     ("REQUEST_METHOD", "GET"),
///     ("HTTP_HOST", "example.com"),
///     ("REQUEST_URI", "/users/42?expand=1"),
/// ].into_iter().collect();
///
/// let req = ServerRequest::from_environment(env, Inputs::default())?;
/// let routed = req.with_attribute("id", 42_u32);
///
/// assert_eq!(routed.attribute::<u32>("id"), Some(&42));
/// assert_eq!(req.attribute::<u32>("id"), None);
/// assert_eq!(req.uri().to_string(), "http://example.com/users/42?expand=1");
/// # Ok::<(), cgi_request::Error>(())
/// ```
#[derive(Clone)]
pub struct ServerRequest {
    head: Arc<Head>,
    body: Body,
    cookies: Arc<Params>,
    query: Arc<Params>,
    parsed_body: ParsedBody,
    uploaded_files: Arc<UploadedFiles>,
    attributes: Arc<Attributes>,
}

impl ServerRequest {
    /// A request with no cookies, query params, parsed body, uploads or
    /// attributes.
    pub fn new(
        method: Method,
        uri: Uri,
        headers: HeaderMap,
        body: Body,
        version: impl Into<String>,
        server_params: Environment,
    ) -> Self {
        Self {
            head: Arc::new(Head { method, uri, headers, version: version.into(), server_params }),
            body,
            cookies: Arc::default(),
            query: Arc::default(),
            parsed_body: ParsedBody::Empty,
            uploaded_files: Arc::default(),
            attributes: Arc::default(),
        }
    }

    /// Builds the request a CGI server describes with `env`, layering the
    /// ambient `inputs` on top.
    ///
    /// Missing or malformed environment values fall back to defaults
    /// (`GET`, protocol `1.1`, no host, ...). The only failure is an
    /// unrecognizable upload specification.
    pub fn from_environment(env: Environment, inputs: Inputs) -> Result<Self, Error> {
        let Inputs { cookies, query, parsed_body, files, body } = inputs;

        let uploaded_files = upload::normalize(&files)?;

        let method = method(&env);
        let uri = uri::build(&env);
        let headers = headers::extract(&env);
        let version = env
            .get(keys::SERVER_PROTOCOL)
            .map(|p| p.strip_prefix("HTTP/").unwrap_or(p).to_owned())
            .unwrap_or_else(|| "1.1".to_owned());

        debug!(
            method = %method,
            uri = %uri,
            headers = headers.len(),
            uploads = uploaded_files.file_count(),
            "request rebuilt from environment"
        );

        let req = Self::new(method, uri, headers, body, version, env);
        Ok(req
            .with_cookie_params(cookies)
            .with_query_params(query)
            .with_parsed_body(parsed_body)
            .with_uploaded_files(uploaded_files))
    }

    // ── Fixed fields ──────────────────────────────────────────────────────────

    pub fn method(&self) -> &Method { &self.head.method }
    pub fn uri(&self) -> &Uri { &self.head.uri }
    pub fn headers(&self) -> &HeaderMap { &self.head.headers }

    /// Protocol version without the `HTTP/` prefix, e.g. `"1.1"`.
    pub fn protocol_version(&self) -> &str { &self.head.version }

    /// The environment the request was built from.
    pub fn server_params(&self) -> &Environment { &self.head.server_params }

    /// First value of a header; case-insensitive.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.head.headers.get(name)
    }

    /// All values of a header joined with `", "`.
    pub fn header_line(&self, name: &str) -> Option<String> {
        self.head.headers.line(name)
    }

    pub fn has_header(&self, name: &str) -> bool {
        self.head.headers.contains(name)
    }

    /// Path plus query, as it would appear on the request line. An empty
    /// path reads as `/`.
    pub fn request_target(&self) -> String {
        let uri = &self.head.uri;
        let path = if uri.path().is_empty() { "/" } else { uri.path() };
        match uri.query() {
            Some(query) => format!("{path}?{query}"),
            None => path.to_owned(),
        }
    }

    // ── Replaceable groups ────────────────────────────────────────────────────

    pub fn body(&self) -> &Body { &self.body }
    pub fn cookie_params(&self) -> &Params { &self.cookies }
    pub fn query_params(&self) -> &Params { &self.query }
    pub fn parsed_body(&self) -> &ParsedBody { &self.parsed_body }
    pub fn uploaded_files(&self) -> &UploadedFiles { &self.uploaded_files }
    pub fn attributes(&self) -> &Attributes { &self.attributes }

    /// The attribute under `name`, if present and a `T`.
    pub fn attribute<T: Any>(&self, name: &str) -> Option<&T> {
        self.attributes.get(name)
    }

    /// The attribute under `name`, or `default` when absent or not a `T`.
    pub fn attribute_or<'a, T: Any>(&'a self, name: &str, default: &'a T) -> &'a T {
        self.attribute(name).unwrap_or(default)
    }

    pub fn with_body(&self, body: impl Into<Body>) -> Self {
        Self { body: body.into(), ..self.clone() }
    }

    pub fn with_cookie_params(&self, cookies: Params) -> Self {
        Self { cookies: Arc::new(cookies), ..self.clone() }
    }

    pub fn with_query_params(&self, query: Params) -> Self {
        Self { query: Arc::new(query), ..self.clone() }
    }

    pub fn with_parsed_body(&self, parsed_body: ParsedBody) -> Self {
        Self { parsed_body, ..self.clone() }
    }

    pub fn with_uploaded_files(&self, files: UploadedFiles) -> Self {
        Self { uploaded_files: Arc::new(files), ..self.clone() }
    }

    /// Returns a request with `name` set to `value`, replacing any previous
    /// value.
    pub fn with_attribute<T: Any + Send + Sync>(&self, name: impl Into<String>, value: T) -> Self {
        let mut attributes = Attributes::clone(&self.attributes);
        attributes.values.insert(name.into(), Arc::new(value));
        Self { attributes: Arc::new(attributes), ..self.clone() }
    }

    /// Returns a request without the attribute `name`. When there is no such
    /// attribute the result shares every group with `self`.
    pub fn without_attribute(&self, name: &str) -> Self {
        if !self.attributes.contains(name) {
            return self.clone();
        }
        let mut attributes = Attributes::clone(&self.attributes);
        attributes.values.remove(name);
        Self { attributes: Arc::new(attributes), ..self.clone() }
    }

    // ── Interop ───────────────────────────────────────────────────────────────

    /// Converts to an [`http::Request`] carrying method, URI, version,
    /// headers and body. Cookies, query params, uploads and attributes have
    /// no place there and are dropped.
    pub fn to_http(&self) -> Result<http::Request<Full<Bytes>>, Error> {
        let mut builder = http::Request::builder()
            .method(self.head.method.clone())
            .uri(self.head.uri.to_http()?)
            .version(version(&self.head.version));

        for (name, values) in self.head.headers.iter() {
            let name = HeaderName::from_bytes(name.as_bytes()).map_err(http::Error::from)?;
            for value in values {
                let value = HeaderValue::from_str(value).map_err(http::Error::from)?;
                builder = builder.header(name.clone(), value);
            }
        }

        Ok(builder.body(self.body.clone().into_http_body())?)
    }
}

impl fmt::Debug for ServerRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerRequest")
            .field("method", &self.head.method)
            .field("uri", &self.head.uri)
            .field("version", &self.head.version)
            .field("headers", &self.head.headers)
            .field("body", &self.body)
            .field("cookies", &self.cookies)
            .field("query", &self.query)
            .field("parsed_body", &self.parsed_body)
            .field("uploaded_files", &self.uploaded_files)
            .field("attributes", &self.attributes)
            .finish_non_exhaustive()
    }
}

fn method(env: &Environment) -> Method {
    match env.get(keys::REQUEST_METHOD) {
        None => Method::GET,
        Some(raw) => Method::from_bytes(raw.as_bytes()).unwrap_or_else(|_| {
            warn!(value = %raw, "ignoring invalid REQUEST_METHOD, assuming GET");
            Method::GET
        }),
    }
}

fn version(raw: &str) -> Version {
    match raw {
        "0.9"       => Version::HTTP_09,
        "1.0"       => Version::HTTP_10,
        "2" | "2.0" => Version::HTTP_2,
        "3" | "3.0" => Version::HTTP_3,
        _           => Version::HTTP_11,
    }
}
