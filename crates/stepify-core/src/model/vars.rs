use dashmap::DashMap;
use serde_json::Value;

/// Ámbito de variables de un task.
///
/// Se crea una sola vez al construir el pipeline y vive todo el run, por lo
/// que sobrevive a las re-ejecuciones provocadas por `jump()`. Ningún step de
/// otro task puede observarlo.
#[derive(Debug, Default)]
pub struct VariableStore {
    inner: DashMap<String, Value>,
}

impl VariableStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Valor guardado bajo `key`, o `None` si nunca se asignó.
    pub fn get(&self, key: &str) -> Option<Value> {
        self.inner.get(key).map(|v| v.value().clone())
    }

    /// Guarda (o reemplaza) `value` bajo `key`.
    pub fn set(&self, key: impl Into<String>, value: impl Into<Value>) {
        self.inner.insert(key.into(), value.into());
    }

    pub fn contains(&self, key: &str) -> bool {
        self.inner.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}
