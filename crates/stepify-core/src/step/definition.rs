use std::sync::Arc;

use serde_json::Value;

use crate::engine::{ErrorContext, StepContext};
use crate::errors::StepError;
use crate::model::VariableStore;

/// Handler de un step: recibe su contexto y los argumentos (ligados en la
/// declaración, seguidos del valor reenviado por el step anterior).
pub type StepHandler = Arc<dyn Fn(StepContext, Vec<Value>) + Send + Sync>;

/// Handler de errores del pipeline; puede invocarse una vez por task fallido.
pub type ErrorHandler = Box<dyn FnMut(ErrorContext, StepError) + Send + Sync>;

/// Handler terminal: recibe todos los valores publicados con `fulfill`.
pub type ResultHandler = Box<dyn FnOnce(&[Value]) + Send + Sync>;

pub struct Step {
    /// Nombre declarado o `_UNNAMED_STEP_<k>` asignado por el builder.
    pub name: String,
    pub handler: StepHandler,
    pub bound_args: Vec<Value>,
}

impl std::fmt::Debug for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Step")
         .field("name", &self.name)
         .field("bound_args", &self.bound_args)
         .finish_non_exhaustive()
    }
}

#[derive(Debug)]
pub struct Task {
    pub name: Option<String>,
    pub steps: Vec<Step>,
    /// Creado una vez en `build()`; compartido por todos los contextos del task.
    pub vars: Arc<VariableStore>,
    /// Nombres de los steps, para resolver `jump()` desde el contexto.
    pub step_names: Arc<[String]>,
}

impl Task {
    pub fn new(name: Option<String>, steps: Vec<Step>) -> Self {
        let step_names: Arc<[String]> = steps.iter().map(|s| s.name.clone()).collect();
        Self { name,
               steps,
               vars: Arc::new(VariableStore::new()),
               step_names }
    }

    /// Nombre para logs y errores.
    pub fn label(&self, index: usize) -> String {
        self.name.clone().unwrap_or_else(|| format!("#{index}"))
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}
