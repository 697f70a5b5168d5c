// Adapters layer: concrete implementations for external systems (line sources, filters, storage).

pub mod filter;
pub mod source;
pub mod storage;
