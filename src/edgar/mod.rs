pub mod classify;
pub mod document;
pub mod fetch;
pub mod parsing;
pub mod sniff;

pub use classify::{classify, FilingMetadata, FilingType};
pub use document::{process_document, ExtractionOutcome, FilingDocument, FilingOutput};
