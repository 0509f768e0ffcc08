//! Hash helpers sobre blake3.

use blake3::Hasher;
use serde_json::{json, Value};

use super::to_canonical_json;
use crate::constants::ENGINE_VERSION;

/// Hashea un string y devuelve hex.
pub fn hash_str(input: &str) -> String {
    let mut h = Hasher::new();
    h.update(input.as_bytes());
    h.finalize().to_hex().to_string()
}

/// Fingerprint determinista de la secuencia de resultados de un run.
///
/// Depende sólo de los valores y su orden (más la versión del motor), nunca
/// de los tiempos de ejecución.
pub fn fingerprint_results(results: &[Value]) -> String {
    let doc = json!({
        "engine_version": ENGINE_VERSION,
        "results": results,
    });
    hash_str(&to_canonical_json(&doc))
}
