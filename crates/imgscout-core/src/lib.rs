pub mod catalog;
pub mod error;
pub mod fetch;
pub mod models;
pub mod orchestrator;
pub mod retry;
pub mod store;
pub mod throttle;
pub mod traits;

#[cfg(test)]
mod testutil;

pub use error::AppError;
pub use fetch::{HeaderProfile, ImageFetcher};
pub use models::{PageRequest, Reference, RunSummary, StoreStats, Target};
pub use orchestrator::{
    Orchestrator, RunConfig, RunEvent, RunReporter, RunState, TracingRunReporter,
};
pub use retry::RetryPolicy;
pub use store::ResultStore;
pub use throttle::{JitterRange, Throttle, ThrottleConfig};
pub use traits::{ImageExtractor, Transport};
