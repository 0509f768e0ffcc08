//! Canonicalización JSON y hashing para el fingerprint de resultados.

pub mod canonical_json;
pub mod hash;

pub use canonical_json::to_canonical_json;
pub use hash::{fingerprint_results, hash_str};
