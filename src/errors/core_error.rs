use stepify_core::EngineError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Error en IO: {0}")]
    Io(#[from] std::io::Error),
    #[error("Error del pipeline: {0}")]
    Engine(#[from] EngineError),
    #[error("Error de serialización: {0}")]
    Json(#[from] serde_json::Error),
}
