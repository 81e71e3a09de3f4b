use std::time::Duration;

use imgscout_core::error::AppError;
use imgscout_core::models::PageRequest;
use imgscout_core::traits::Transport;
use reqwest::Client;
use url::Url;

/// HTTP transport using reqwest.
///
/// Keeps a cookie store for the lifetime of the instance, so cookies set
/// during [`establish_session`](Transport::establish_session) ride along on
/// every later page request. Only `http` and `https` URLs are accepted.
#[derive(Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new() -> Result<Self, AppError> {
        Self::with_connect_timeout(Duration::from_secs(10))
    }

    pub fn with_connect_timeout(connect_timeout: Duration) -> Result<Self, AppError> {
        let client = Client::builder()
            .cookie_store(true)
            .connect_timeout(connect_timeout)
            .build()
            .map_err(|e| AppError::HttpError(e.to_string()))?;

        Ok(Self { client })
    }

    async fn send(&self, request: &PageRequest) -> Result<reqwest::Response, AppError> {
        validate_url(&request.url)?;

        let mut builder = self
            .client
            .get(&request.url)
            .timeout(request.timeout)
            .header(reqwest::header::USER_AGENT, request.user_agent.as_str());
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let timeout_secs = request.timeout.as_secs();
        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                AppError::Timeout(timeout_secs)
            } else if e.is_connect() {
                AppError::NetworkError(format!("Connection failed: {e}"))
            } else {
                AppError::HttpError(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::from_status(status.as_u16(), &request.url));
        }
        Ok(response)
    }
}

impl Transport for ReqwestTransport {
    async fn fetch(&self, request: &PageRequest) -> Result<Vec<u8>, AppError> {
        let timeout_secs = request.timeout.as_secs();
        let response = self.send(request).await?;
        let body = response.bytes().await.map_err(|e| {
            if e.is_timeout() {
                AppError::Timeout(timeout_secs)
            } else {
                AppError::HttpError(format!("Failed to read response body: {e}"))
            }
        })?;
        Ok(body.to_vec())
    }

    async fn establish_session(&self, request: &PageRequest) -> Result<(), AppError> {
        let response = self.send(request).await?;
        // Drain the body so the connection is reusable.
        response
            .bytes()
            .await
            .map_err(|e| AppError::HttpError(format!("Failed to read response body: {e}")))?;
        Ok(())
    }
}

fn validate_url(url: &str) -> Result<(), AppError> {
    let parsed = Url::parse(url).map_err(|e| AppError::HttpError(format!("Invalid URL: {e}")))?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        scheme => Err(AppError::HttpError(format!(
            "URL scheme '{scheme}' is not allowed (only http/https)"
        ))),
    }
}
