pub mod batch;
pub mod core;
pub mod edgar;
pub mod normalize;

// Re-exports
pub use edgar::classify::{FilingMetadata, FilingType};
pub use edgar::document::{process_document, ExtractionOutcome, FilingOutput};
