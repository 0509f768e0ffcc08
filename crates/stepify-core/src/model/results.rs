use std::sync::Mutex;

use serde_json::Value;

/// Secuencia ordenada de valores publicados con `fulfill` durante un run.
///
/// Append-only mientras el pipeline corre; el orden de las entradas es el
/// orden de publicación. Se lee entera una sola vez al terminar.
#[derive(Debug, Default)]
pub struct ResultCollector {
    entries: Mutex<Vec<Value>>,
}

impl ResultCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Añade cada valor como una entrada independiente, en orden.
    pub fn extend<I>(&self, values: I)
        where I: IntoIterator<Item = Value>
    {
        let mut entries = self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        entries.extend(values);
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Vacía el colector devolviendo todas las entradas.
    pub fn take(&self) -> Vec<Value> {
        let mut entries = self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        std::mem::take(&mut *entries)
    }
}
