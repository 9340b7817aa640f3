// hkv-common - Shared types for the HybridKV cache backends
//
// This crate defines the value codec and the error taxonomy used by the
// client and the backend crates.

pub mod codec;
pub mod error;

// Re-export for convenience
pub use codec::*;
pub use error::*;
