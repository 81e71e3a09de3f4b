use std::future::Future;

use crate::error::AppError;
use crate::models::PageRequest;

/// Retrieves raw page content over the network.
///
/// Implementations own their session state (cookies, connection pool).
/// Errors must classify throttling responses as
/// [`AppError::RateLimitExceeded`] so the retry policy can tell them apart.
pub trait Transport: Send + Sync {
    fn fetch(
        &self,
        request: &PageRequest,
    ) -> impl Future<Output = Result<Vec<u8>, AppError>> + Send;

    /// Best-effort request used to pick up session cookies before a run.
    fn establish_session(
        &self,
        request: &PageRequest,
    ) -> impl Future<Output = Result<(), AppError>> + Send;
}

/// Finds the representative image reference in page content.
pub trait ImageExtractor: Send + Sync {
    /// Returns `Ok(None)` when the page simply has no usable image.
    fn extract(&self, content: &str) -> Result<Option<String>, AppError>;
}
