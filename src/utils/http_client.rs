use async_trait::async_trait;
use reqwest::{Client, Response};
use std::time::Duration;
use tracing::debug;

use crate::config::HttpConfig;
use crate::errors::{AppError, AppResult};
use crate::utils::url::UrlUtils;
use crate::utils::{CompressionFormat, DecompressionService};

/// HTTP client trait that provides automatic decompression for playlist downloads
#[async_trait]
pub trait DecompressingHttpClient: Send + Sync {
    /// Fetch URL and return decompressed text content
    async fn fetch_text(&self, url: &str) -> AppResult<String> {
        self.fetch_text_with_headers(url, &[]).await
    }

    /// Fetch URL with custom headers and return decompressed text
    async fn fetch_text_with_headers(
        &self,
        url: &str,
        headers: &[(&str, &str)],
    ) -> AppResult<String>;
}

/// Default implementation of DecompressingHttpClient using reqwest
#[derive(Clone)]
pub struct StandardHttpClient {
    client: Client,
}

impl StandardHttpClient {
    /// Client with both a connect and a total request timeout, for finite downloads
    pub fn from_config(config: &HttpConfig) -> AppResult<Self> {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            .user_agent(config.user_agent.clone())
            .build()?;

        Ok(Self { client })
    }

    /// Client with only a connection timeout (no total request timeout).
    /// Live streams must stay open indefinitely.
    pub fn streaming_client(connect_timeout: Duration, user_agent: &str) -> AppResult<Client> {
        Ok(Client::builder()
            .connect_timeout(connect_timeout)
            .user_agent(user_agent.to_string())
            .build()?)
    }

    /// Process response with automatic decompression
    async fn process_response_to_bytes(response: Response, url: &str) -> AppResult<Vec<u8>> {
        if !response.status().is_success() {
            return Err(AppError::external_service(
                "http_client",
                format!(
                    "HTTP error: {} {} - URL: {}",
                    response.status(),
                    response.status().canonical_reason().unwrap_or("Unknown"),
                    UrlUtils::obfuscate_credentials(url)
                ),
            ));
        }

        let bytes = response.bytes().await.map_err(|e| {
            AppError::external_service("http_client", format!("Failed to read response: {e}"))
        })?;

        debug!("Fetched {} bytes of raw content", bytes.len());

        let compression_format = DecompressionService::detect_compression_format(&bytes);
        let decompressed_bytes = match compression_format {
            CompressionFormat::Uncompressed => bytes.to_vec(),
            _ => DecompressionService::decompress(bytes).map_err(|e| {
                AppError::external_service(
                    "http_client",
                    format!("Failed to decompress content: {e}"),
                )
            })?,
        };

        debug!(
            "Processed {} bytes of content (compression: {:?})",
            decompressed_bytes.len(),
            compression_format
        );

        Ok(decompressed_bytes)
    }
}

#[async_trait]
impl DecompressingHttpClient for StandardHttpClient {
    async fn fetch_text_with_headers(
        &self,
        url: &str,
        headers: &[(&str, &str)],
    ) -> AppResult<String> {
        debug!(
            "Fetching text content from: {}",
            UrlUtils::obfuscate_credentials(url)
        );

        let mut request = self.client.get(url);
        for (name, value) in headers {
            request = request.header(*name, *value);
        }

        let response = request.send().await.map_err(|e| {
            // reqwest errors embed the url, credentials included
            let obfuscated_msg = UrlUtils::obfuscate_credentials(&e.to_string());
            AppError::external_service("http_client", obfuscated_msg)
        })?;

        let decompressed_bytes = Self::process_response_to_bytes(response, url).await?;

        let content = String::from_utf8(decompressed_bytes).map_err(|e| {
            AppError::external_service(
                "http_client",
                format!("Failed to decode content as UTF-8: {e}"),
            )
        })?;

        debug!("Fetched {} characters of text content", content.len());
        Ok(content)
    }
}
