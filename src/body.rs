//! Request body.

use std::fmt;

use bytes::{Buf, Bytes};
use http_body_util::Full;

/// A replayable request body.
///
/// The bytes are reference-counted: cloning a `Body` or a request that holds
/// one never copies the payload, and every [`reader`](Body::reader) starts
/// from the first byte.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Body(Bytes);

impl Body {
    pub fn empty() -> Self {
        Self(Bytes::new())
    }

    pub fn as_bytes(&self) -> &[u8] { &self.0 }
    pub fn len(&self) -> usize { self.0.len() }
    pub fn is_empty(&self) -> bool { self.0.is_empty() }

    /// A fresh `std::io::Read` over the whole body.
    pub fn reader(&self) -> bytes::buf::Reader<Bytes> {
        self.0.clone().reader()
    }

    pub fn to_bytes(&self) -> Bytes {
        self.0.clone()
    }

    /// Hands the body to the `http-body` ecosystem.
    pub fn into_http_body(self) -> Full<Bytes> {
        Full::new(self.0)
    }
}

impl fmt::Debug for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Body({} bytes)", self.0.len())
    }
}

impl From<Bytes> for Body {
    fn from(b: Bytes) -> Self { Self(b) }
}

impl From<Vec<u8>> for Body {
    fn from(v: Vec<u8>) -> Self { Self(Bytes::from(v)) }
}

impl From<String> for Body {
    fn from(s: String) -> Self { Self(Bytes::from(s)) }
}

impl From<&'static str> for Body {
    fn from(s: &'static str) -> Self { Self(Bytes::from_static(s.as_bytes())) }
}

impl From<&'static [u8]> for Body {
    fn from(s: &'static [u8]) -> Self { Self(Bytes::from_static(s)) }
}
