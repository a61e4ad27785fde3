//! Chroma vector store client and shared types.

pub mod client;
pub mod types;

pub use client::ChromaService;
pub use types::{ChromaError, CollectionStats, DocumentListing, QueryHit};
