//! Errores del core.
//!
//! Dos familias:
//! - `StepError`: el valor de error que un step entrega a `done`/`end` o que
//!   surge de un `parallel()`. Se reenvía al error handler tal cual.
//! - `EngineError`: fallos del propio motor (configuración, errores sin
//!   handler, pipelines detenidos). Son los que ve quien llama a `run()`.

use std::error::Error as StdError;
use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;

/// Error reportado por un step (o por una operación dentro de `parallel`).
///
/// No se restringe a un tipo concreto: puede ser un mensaje, un valor JSON
/// arbitrario o cualquier error de Rust. El clon comparte el error original,
/// así el handler recibe exactamente lo que el step entregó.
#[derive(Debug, Clone, Error)]
pub enum StepError {
    #[error("{0}")]
    Message(String),
    #[error("{0}")]
    Value(Value),
    #[error(transparent)]
    Source(Arc<dyn StdError + Send + Sync>),
}

impl StepError {
    /// Envuelve cualquier error tipado conservándolo para `downcast_ref`.
    pub fn from_error<E>(error: E) -> Self
        where E: StdError + Send + Sync + 'static
    {
        Self::Source(Arc::new(error))
    }

    /// Error representado por un valor JSON arbitrario.
    pub fn value(value: impl Into<Value>) -> Self {
        Self::Value(value.into())
    }

    /// Recupera el error original si fue construido con `from_error`.
    pub fn downcast_ref<E: StdError + 'static>(&self) -> Option<&E> {
        match self {
            Self::Source(inner) => (**inner).downcast_ref::<E>(),
            _ => None,
        }
    }
}

impl From<&str> for StepError {
    fn from(message: &str) -> Self {
        Self::Message(message.to_string())
    }
}

impl From<String> for StepError {
    fn from(message: String) -> Self {
        Self::Message(message)
    }
}

impl From<std::io::Error> for StepError {
    fn from(error: std::io::Error) -> Self {
        Self::from_error(error)
    }
}

impl From<serde_json::Error> for StepError {
    fn from(error: serde_json::Error) -> Self {
        Self::from_error(error)
    }
}

/// Errores del motor.
#[derive(Debug, Clone, Error)]
pub enum EngineError {
    #[error("jump target `{target}` not found in task `{task}`")]
    JumpTargetNotFound { task: String, target: String },
    #[error("jump to index {index} is out of bounds for task `{task}` ({len} steps)")]
    JumpOutOfBounds { task: String, index: i64, len: usize },
    #[error("context of step `{step}` used after it already advanced the pipeline")]
    StaleContext { step: String },
    #[error("malformed declaration: {0}")]
    Declaration(String),
    #[error("unhandled error in step `{step}`: {error}")]
    Unhandled { step: String, error: StepError },
    #[error("pipeline halted after error in step `{step}` (error handler never resumed): {error}")]
    Halted { step: String, error: StepError },
    #[error("step `{step}` released its context without advancing")]
    Stalled { step: String },
    #[error("internal: {0}")]
    Internal(String),
}

impl EngineError {
    /// `true` para errores de configuración: destinos de `jump` irresolubles,
    /// contextos reutilizados y declaraciones mal formadas.
    pub fn is_configuration(&self) -> bool {
        matches!(self,
                 Self::JumpTargetNotFound { .. }
                 | Self::JumpOutOfBounds { .. }
                 | Self::StaleContext { .. }
                 | Self::Declaration(_))
    }

    /// Error de step original, si el fallo proviene de uno.
    pub fn step_error(&self) -> Option<&StepError> {
        match self {
            Self::Unhandled { error, .. } | Self::Halted { error, .. } => Some(error),
            _ => None,
        }
    }
}
