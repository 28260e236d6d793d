//! Typed access to the Leap image API

pub mod client;
pub mod config;
pub mod endpoints;
pub mod error;
pub mod http;
pub mod wire;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;

pub use client::{LeapClient, RemixSource, SampleSource};
pub use config::ClientConfig;
pub use endpoints::Endpoints;
pub use error::ApiError;
pub use http::HttpTransport;

/// Streamed body of a downloaded artifact
pub type ByteStream = BoxStream<'static, Result<Bytes, ApiError>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Delete,
}

impl Method {
    pub fn as_str(self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Delete => "DELETE",
        }
    }
}

/// A file attached to a multipart request
#[derive(Debug, Clone, PartialEq)]
pub struct FilePart {
    pub field: &'static str,
    pub file_name: String,
    pub content_type: String,
    pub bytes: Bytes,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MultipartForm {
    pub fields: Vec<(&'static str, String)>,
    pub files: Vec<FilePart>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub enum RequestBody {
    #[default]
    Empty,
    Json(serde_json::Value),
    Multipart(MultipartForm),
}

/// A request relative to the configured base URL
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub query: Vec<(&'static str, String)>,
    pub body: RequestBody,
}

impl ApiRequest {
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::Get, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::Post, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::Delete, path)
    }

    fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: RequestBody::Empty,
        }
    }

    pub fn with_query(mut self, key: &'static str, value: impl Into<String>) -> Self {
        self.query.push((key, value.into()));
        self
    }

    pub fn with_json(mut self, body: serde_json::Value) -> Self {
        self.body = RequestBody::Json(body);
        self
    }

    pub fn with_multipart(mut self, form: MultipartForm) -> Self {
        self.body = RequestBody::Multipart(form);
        self
    }
}

/// Raw response; status interpretation is left to the client
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Bytes,
}

impl ApiResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Moves requests to the service - allows swapping the network for a script
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send a request and return the raw response, whatever its status
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, ApiError>;

    /// Open an absolute artifact URI as a byte stream
    async fn download(&self, uri: &str) -> Result<ByteStream, ApiError>;
}
