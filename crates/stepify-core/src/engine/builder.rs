//! Builder para `Pipeline`.
//!
//! Reproduce la superficie de declaración del pipeline:
//! - `task(name)` abre un task con nombre; los `step` siguientes se le añaden
//!   hasta `pend()` u otro `task()`.
//! - `step(..)` sin task abierto crea un task implícito anónimo.
//! - `pend()` cierra el task actual; el próximo `step` abre otro implícito.
//! - `error(..)` y `result(..)` registran los handlers del pipeline.
//!
//! Los steps sin nombre reciben `_UNNAMED_STEP_<k>` en orden de declaración,
//! con un contador único para todo el pipeline.
//!
//! Ejemplo de uso:
//!
//! ```ignore
//! let pipeline = Pipeline::builder()
//!     .task("timer")
//!         .step(|ctx, _| ctx.done_with(200))
//!         .step(|ctx, args| { ctx.fulfill(args); ctx.done_ok() })
//!     .pend()
//!     .result(|r| println!("{r:?}"))
//!     .build()?;
//! ```

use std::collections::HashSet;
use std::sync::Arc;

use serde_json::Value;
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::constants::UNNAMED_STEP_PREFIX;
use crate::engine::{ErrorContext, Pipeline, StepContext};
use crate::errors::{EngineError, StepError};
use crate::event::{EventStore, InMemoryEventStore};
use crate::model::ResultCollector;
use crate::step::{ErrorHandler, ResultHandler, Step, Task};

struct TaskDecl {
    name: Option<String>,
    steps: Vec<Step>,
}

/// Acumula la declaración del pipeline. `build()` valida y congela.
pub struct PipelineBuilder {
    tasks: Vec<TaskDecl>,
    /// Índice del task abierto (explícito o implícito), si lo hay.
    open: Option<usize>,
    unnamed: usize,
    problems: Vec<String>,
    on_error: Option<ErrorHandler>,
    on_result: Option<ResultHandler>,
    config: EngineConfig,
    event_store: Option<Arc<dyn EventStore>>,
}

impl Default for PipelineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineBuilder {
    pub fn new() -> Self {
        Self { tasks: Vec::new(),
               open: None,
               unnamed: 0,
               problems: Vec::new(),
               on_error: None,
               on_result: None,
               config: EngineConfig::default(),
               event_store: None }
    }

    /// Abre un task con nombre.
    pub fn task(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        if name.trim().is_empty() {
            self.problems.push("task name must not be empty".into());
        }
        self.tasks.push(TaskDecl { name: Some(name),
                                   steps: Vec::new() });
        self.open = Some(self.tasks.len() - 1);
        self
    }

    /// Cierra el task actual.
    pub fn pend(mut self) -> Self {
        self.open = None;
        self
    }

    /// Step sin nombre ni argumentos ligados.
    pub fn step<F>(self, handler: F) -> Self
        where F: Fn(StepContext, Vec<Value>) + Send + Sync + 'static
    {
        self.step_with_args(None, handler, Vec::new())
    }

    pub fn named_step<F>(self, name: &str, handler: F) -> Self
        where F: Fn(StepContext, Vec<Value>) + Send + Sync + 'static
    {
        self.step_with_args(Some(name), handler, Vec::new())
    }

    /// Forma completa: nombre opcional y argumentos que preceden al valor
    /// reenviado por el step anterior.
    pub fn step_with_args<F>(mut self, name: Option<&str>, handler: F, bound_args: Vec<Value>) -> Self
        where F: Fn(StepContext, Vec<Value>) + Send + Sync + 'static
    {
        let name = match name {
            Some(n) => {
                if n.trim().is_empty() {
                    self.problems.push("step name must not be empty".into());
                }
                n.to_string()
            }
            None => {
                let n = format!("{UNNAMED_STEP_PREFIX}{}", self.unnamed);
                self.unnamed += 1;
                n
            }
        };
        let task = match self.open {
            Some(index) => index,
            None => {
                self.tasks.push(TaskDecl { name: None,
                                           steps: Vec::new() });
                let index = self.tasks.len() - 1;
                self.open = Some(index);
                index
            }
        };
        self.tasks[task].steps.push(Step { name,
                                           handler: Arc::new(handler),
                                           bound_args });
        self
    }

    /// Registra el error handler del pipeline.
    pub fn error<F>(mut self, handler: F) -> Self
        where F: FnMut(ErrorContext, StepError) + Send + Sync + 'static
    {
        self.on_error = Some(Box::new(handler));
        self
    }

    /// Registra el handler terminal (recibe todos los valores publicados).
    pub fn result<F>(mut self, handler: F) -> Self
        where F: FnOnce(&[Value]) + Send + Sync + 'static
    {
        self.on_result = Some(Box::new(handler));
        self
    }

    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Store donde se registran los eventos del run.
    pub fn event_store(mut self, store: Arc<dyn EventStore>) -> Self {
        self.event_store = Some(store);
        self
    }

    /// Valida la declaración y construye el `Pipeline`.
    ///
    /// Nombres vacíos y nombres de step repetidos dentro de un mismo task
    /// (destinos de `jump` ambiguos) son errores de declaración. Un pipeline
    /// sin tasks es válido.
    pub fn build(self) -> Result<Pipeline, EngineError> {
        let mut problems = self.problems;
        for (index, decl) in self.tasks.iter().enumerate() {
            let mut seen = HashSet::new();
            for step in &decl.steps {
                if !seen.insert(step.name.as_str()) {
                    let task = decl.name.clone().unwrap_or_else(|| format!("#{index}"));
                    problems.push(format!("duplicate step name `{}` in task `{task}`", step.name));
                }
            }
        }
        if !problems.is_empty() {
            return Err(EngineError::Declaration(problems.join("; ")));
        }

        let tasks = self.tasks
                        .into_iter()
                        .map(|decl| Task::new(decl.name, decl.steps))
                        .collect();
        Ok(Pipeline { tasks,
                      results: Arc::new(ResultCollector::new()),
                      on_error: self.on_error,
                      on_result: self.on_result,
                      config: self.config,
                      event_store: self.event_store
                                       .unwrap_or_else(|| Arc::new(InMemoryEventStore::new())),
                      run_id: Uuid::new_v4() })
    }
}
