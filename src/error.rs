//! Unified error type.

/// The error type returned by the crate's fallible operations.
///
/// Missing or malformed environment data is never an error: the URI and
/// header reconstruction skip what they cannot read. This type surfaces the
/// two things that genuinely cannot be recovered from: a file-upload
/// specification with an unrecognizable shape, and a request that cannot be
/// expressed as an [`http::Request`].
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A value in the files specification is neither an uploaded file nor a
    /// recognizable raw upload shape. `path` is the bracketed field path,
    /// e.g. `docs[1]`.
    #[error("invalid value in files specification at `{path}`: {reason}")]
    InvalidSpec { path: String, reason: &'static str },

    /// Building an `http::Request` from the request parts failed.
    #[error("http: {0}")]
    Http(#[from] http::Error),
}

impl Error {
    pub(crate) fn invalid_spec(path: &str, reason: &'static str) -> Self {
        Self::InvalidSpec { path: path.to_owned(), reason }
    }
}
