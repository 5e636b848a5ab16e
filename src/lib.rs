//! # cgi-request
//!
//! Immutable server-side HTTP requests, rebuilt from a CGI-style
//! environment. Nothing more. Nothing less.
//!
//! ## The contract
//!
//! The web server owns the network: sockets, TLS, request parsing, storing
//! uploads on disk. It hands the application a flat environment snapshot
//! (`REQUEST_METHOD`, `HTTP_HOST`, `HTTP_*` headers, upload records) and a
//! body. This crate turns that snapshot back into a request value:
//!
//! - **Headers**: `HTTP_*` names decoded, `CONTENT_*` recovered, a withheld
//!   `Authorization` reconstructed ([`headers::extract`])
//! - **URI**: scheme, host, port, path and query from their documented
//!   sources, in precedence order ([`uri::build`])
//! - **Uploads**: nested parallel-array records normalized into a tree of
//!   [`UploadedFile`]s ([`upload::normalize`])
//!
//! Reconstruction is best-effort. A malformed `Host` or `SERVER_PORT` is
//! skipped, never an error; the only thing that fails construction is an
//! upload specification of unrecognizable shape.
//!
//! The resulting [`ServerRequest`] is immutable. `with_*` methods return a
//! new request and leave the original untouched, so a request can be shared
//! freely across threads.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use std::io::Read;
//!
//! use cgi_request::{Environment, Inputs, ServerRequest};
//!
//! fn main() -> Result<(), cgi_request::Error> {
//!     let env = Environment::from_process();
//!     let mut body = Vec::new();
//!     std::io::stdin().read_to_end(&mut body).unwrap_or_default();
//!
//!     let inputs = Inputs::from_environment(&env, body);
//!     let req = ServerRequest::from_environment(env, inputs)?
//!         .with_attribute("handler", "index");
//!
//!     println!("Content-Type: text/plain\r\n");
//!     println!("{} {}", req.method(), req.uri());
//!     Ok(())
//! }
//! ```

mod body;
mod error;
mod inputs;
mod request;

pub mod env;
pub mod headers;
pub mod upload;
pub mod uri;

pub use body::Body;
pub use env::Environment;
pub use error::Error;
pub use headers::HeaderMap;
pub use inputs::{Inputs, parse_cookies, parse_query};
pub use request::{Attributes, Params, ParsedBody, ServerRequest};
pub use upload::{FileSpec, FileSpecMap, UploadError, UploadNode, UploadedFile, UploadedFiles};
pub use uri::{Scheme, Uri};

pub use http::Method;
