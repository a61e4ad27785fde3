//! Document ingestion pipeline: extraction, chunking, and orchestration.

pub mod chunking;
pub mod extract;
pub mod processor;
pub mod types;

pub use chunking::chunk_text;
pub use processor::{DocumentProcessor, ProcessDocument};
pub use types::{IngestionJob, IngestionOutcome, OutcomeStatus, TextFragment};
