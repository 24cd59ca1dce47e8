//! Network transport seam.
//!
//! The dispatcher hands an [`OutboundRequest`] to a [`Transport`] and gets a
//! [`RawResponse`] back. Everything HTTP-client specific lives behind the
//! trait so tests can script exchanges without sockets.

mod config;
mod reqwest_client;

use std::fmt;
use std::io::{self, Read};
use std::str::FromStr;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use thiserror::Error;

pub use config::{Interceptor, RedirectPolicy, TransportConfig, DEFAULT_USER_AGENT};
pub use reqwest_client::ReqwestTransport;

/// HTTP method of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
    Head,
    Patch,
}

impl Method {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
            Self::Head => "HEAD",
            Self::Patch => "PATCH",
        }
    }

    /// GET and HEAD never carry a body.
    pub fn permits_body(self) -> bool {
        !matches!(self, Self::Get | Self::Head)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Method {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(Self::Get),
            "POST" => Ok(Self::Post),
            "PUT" => Ok(Self::Put),
            "DELETE" => Ok(Self::Delete),
            "HEAD" => Ok(Self::Head),
            "PATCH" => Ok(Self::Patch),
            other => Err(format!("unsupported method: {}", other)),
        }
    }
}

/// Snapshot of a request as handed to the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundRequest {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<Vec<u8>>,
    pub content_type: Option<String>,
}

impl OutboundRequest {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Vec::new(),
            body: None,
            content_type: None,
        }
    }

    /// Body to put on the wire, if the method permits one.
    pub fn wire_body(&self) -> Option<&[u8]> {
        if self.method.permits_body() {
            self.body.as_deref()
        } else {
            None
        }
    }
}

/// Failures raised before any HTTP status was received.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("invalid url '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("invalid header '{name}': {reason}")]
    InvalidHeader { name: String, reason: String },

    #[error("connection failed: {0}")]
    Connect(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("exchange timed out: {0}")]
    Timeout(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("exchange failed: {0}")]
    Io(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("http client setup failed: {0}")]
    Client(String),
}

impl TransportError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }
}

/// A network exchange performed on behalf of one dispatcher cycle.
///
/// Implementations block the calling dispatcher thread until headers arrive;
/// the body is streamed through [`RawResponse::body`].
pub trait Transport: Send + Sync {
    fn perform(&self, request: &OutboundRequest) -> Result<RawResponse, TransportError>;
}

/// Response body stream. Dropping it closes the underlying source.
pub struct ResponseBody {
    reader: Option<Box<dyn Read + Send>>,
}

impl ResponseBody {
    pub fn new(reader: impl Read + Send + 'static) -> Self {
        Self { reader: Some(Box::new(reader)) }
    }

    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self::new(io::Cursor::new(bytes.into()))
    }

    pub fn empty() -> Self {
        Self { reader: None }
    }
}

impl Read for ResponseBody {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.reader.as_mut() {
            Some(reader) => reader.read(buf),
            None => Ok(0),
        }
    }
}

impl Drop for ResponseBody {
    fn drop(&mut self) {
        if self.reader.take().is_some() {
            tracing::trace!("response body closed");
        }
    }
}

impl fmt::Debug for ResponseBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResponseBody")
            .field("open", &self.reader.is_some())
            .finish()
    }
}

/// Untyped transport result, owned by the dispatcher for one cycle.
#[derive(Debug)]
pub struct RawResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: ResponseBody,
    pub content_length: Option<u64>,
    pub url: String,
}

impl RawResponse {
    pub fn new(status: u16, body: ResponseBody) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body,
            content_length: None,
            url: String::new(),
        }
    }

    /// In-memory response, mostly for scripted transports.
    pub fn from_bytes(status: u16, bytes: impl Into<Vec<u8>>) -> Self {
        let bytes = bytes.into();
        let mut response = Self::new(status, ResponseBody::empty());
        response.content_length = Some(bytes.len() as u64);
        response.body = ResponseBody::from_bytes(bytes);
        response
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.append(name, value);
        self
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    pub fn is_not_modified(&self) -> bool {
        self.status == 304
    }

    pub fn is_error_status(&self) -> bool {
        self.status >= 400
    }

    /// Drain the body stream.
    pub fn read_bytes(&mut self) -> io::Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(self.content_length.unwrap_or(0).min(1 << 20) as usize);
        self.body.read_to_end(&mut buf)?;
        Ok(buf)
    }

    /// Drain the body stream as UTF-8, replacing malformed sequences.
    pub fn read_text(&mut self) -> io::Result<String> {
        let bytes = self.read_bytes()?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Stream-less copy of status line metadata.
    pub fn meta(&self) -> ResponseMeta {
        ResponseMeta {
            status: self.status,
            headers: self.headers.clone(),
            content_length: self.content_length,
            url: self.url.clone(),
        }
    }
}

/// Response metadata carried by errors after the stream is gone.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseMeta {
    pub status: u16,
    pub headers: HeaderMap,
    pub content_length: Option<u64>,
    pub url: String,
}

impl ResponseMeta {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}
