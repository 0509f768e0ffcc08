use std::fmt;

use serde_json::Value;

use crate::engine::StepContext;
use crate::errors::EngineError;

/// Función diferida: se ejecuta síncronamente con el mismo contexto y los
/// argumentos extra; el pipeline no avanza hasta que ella (o algo que dispare)
/// llame a `next()`.
pub type DeferFn = Box<dyn FnOnce(&StepContext, Vec<Value>) + Send>;

/// Qué hacer tras un `done` sin error.
pub enum Continuation {
    /// Avanzar sin reenviar valor.
    Next,
    /// Avanzar reenviando el valor como único argumento del siguiente step.
    /// `Value::Null` equivale a `Next`.
    Forward(Value),
    /// Ejecutar la función diferida; no hay avance automático.
    Defer(DeferFn, Vec<Value>),
}

impl Continuation {
    pub fn forward(value: impl Into<Value>) -> Self {
        Self::Forward(value.into())
    }

    pub fn defer<F>(f: F, extra: Vec<Value>) -> Self
        where F: FnOnce(&StepContext, Vec<Value>) + Send + 'static
    {
        Self::Defer(Box::new(f), extra)
    }
}

impl fmt::Debug for Continuation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Next => f.write_str("Next"),
            Self::Forward(v) => f.debug_tuple("Forward").field(v).finish(),
            Self::Defer(_, extra) => f.debug_tuple("Defer").field(&"<fn>").field(extra).finish(),
        }
    }
}

/// Destino de `jump()`; siempre dentro del task actual.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JumpTarget {
    ByName(String),
    ByAbsoluteIndex(usize),
    ByRelativeOffset(i64),
}

impl JumpTarget {
    /// Resuelve el destino contra los nombres de los steps del task.
    pub fn resolve(&self, task: &str, step_names: &[String], current: usize) -> Result<usize, EngineError> {
        let len = step_names.len();
        match self {
            Self::ByName(name) => step_names.iter()
                                            .position(|n| n == name)
                                            .ok_or_else(|| EngineError::JumpTargetNotFound { task: task.to_string(),
                                                                                             target: name.clone() }),
            Self::ByAbsoluteIndex(index) if *index < len => Ok(*index),
            Self::ByAbsoluteIndex(index) => Err(EngineError::JumpOutOfBounds { task: task.to_string(),
                                                                               index: *index as i64,
                                                                               len }),
            Self::ByRelativeOffset(offset) => {
                let target = current as i64 + offset;
                if target >= 0 && (target as usize) < len {
                    Ok(target as usize)
                } else {
                    Err(EngineError::JumpOutOfBounds { task: task.to_string(),
                                                       index: target,
                                                       len })
                }
            }
        }
    }
}

impl From<&str> for JumpTarget {
    fn from(name: &str) -> Self {
        Self::ByName(name.to_string())
    }
}

impl From<String> for JumpTarget {
    fn from(name: String) -> Self {
        Self::ByName(name)
    }
}

/// Enteros no negativos son índices absolutos; negativos, desplazamientos
/// relativos al step actual (`-2` = dos steps atrás).
impl From<i64> for JumpTarget {
    fn from(n: i64) -> Self {
        if n < 0 {
            Self::ByRelativeOffset(n)
        } else {
            Self::ByAbsoluteIndex(n as usize)
        }
    }
}

impl From<i32> for JumpTarget {
    fn from(n: i32) -> Self {
        Self::from(n as i64)
    }
}

impl From<usize> for JumpTarget {
    fn from(n: usize) -> Self {
        Self::ByAbsoluteIndex(n)
    }
}
