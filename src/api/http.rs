//! reqwest-backed transport

use crate::api::{
    ApiError, ApiRequest, ApiResponse, ByteStream, ClientConfig, Method, MultipartForm,
    RequestBody, Transport,
};
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::multipart::{Form, Part};
use std::time::Duration;
use tracing::{debug, warn};

/// Sends requests over HTTPS with the bearer token attached
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl HttpTransport {
    /// Create a transport from a validated client configuration
    pub fn new(config: &ClientConfig) -> Result<Self, ApiError> {
        config.validate()?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ApiError::Network(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self::with_client(client, config))
    }

    /// Reuse an existing [`reqwest::Client`] for connection pooling
    pub fn with_client(client: reqwest::Client, config: &ClientConfig) -> Self {
        Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn form(form: MultipartForm) -> Result<Form, ApiError> {
        let mut multipart = Form::new();
        for (name, value) in form.fields {
            multipart = multipart.text(name, value);
        }
        for file in form.files {
            let part = Part::bytes(file.bytes.to_vec())
                .file_name(file.file_name)
                .mime_str(&file.content_type)
                .map_err(|e| ApiError::validation("files", format!("bad content type: {}", e)))?;
            multipart = multipart.part(file.field, part);
        }
        Ok(multipart)
    }
}

fn network_error(err: reqwest::Error) -> ApiError {
    ApiError::Network(err.to_string())
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, ApiError> {
        let url = self.url(&request.path);
        debug!("{} {}", request.method.as_str(), url);

        let builder = match request.method {
            Method::Get => self.client.get(&url),
            Method::Post => self.client.post(&url),
            Method::Delete => self.client.delete(&url),
        };
        let builder = builder
            .bearer_auth(&self.api_key)
            .header(reqwest::header::ACCEPT, "application/json")
            .query(&request.query);
        let builder = match request.body {
            RequestBody::Empty => builder,
            RequestBody::Json(body) => builder.json(&body),
            RequestBody::Multipart(form) => builder.multipart(Self::form(form)?),
        };

        let response = builder.send().await.map_err(network_error)?;
        let status = response.status().as_u16();
        let body = response.bytes().await.map_err(network_error)?;

        if !(200..300).contains(&status) {
            warn!("{} {} returned status {}", request.method.as_str(), request.path, status);
        }
        Ok(ApiResponse { status, body })
    }

    async fn download(&self, uri: &str) -> Result<ByteStream, ApiError> {
        debug!("Downloading {}", uri);
        let response = self.client.get(uri).send().await.map_err(network_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::Transport {
                status: status.as_u16(),
                path: uri.to_string(),
                body,
            });
        }

        Ok(response.bytes_stream().map(|chunk| chunk.map_err(network_error)).boxed())
    }
}
