pub mod extractor;
pub mod transport;

pub use extractor::PatternExtractor;
pub use transport::ReqwestTransport;
