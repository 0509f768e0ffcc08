//! Contextos de ejecución entregados a steps y al error handler.
//!
//! Cada despacho crea un contexto nuevo identificado por un `epoch`. Los
//! contextos no llaman al scheduler directamente: le envían una `Signal` por
//! canal y el scheduler avanza al recibirla. Todas las copias (`clone`) de un
//! contexto comparten un flag de sellado: la primera capacidad que avanza el
//! pipeline lo sella y cualquier uso posterior es un contexto obsoleto.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::{debug, warn};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::mpsc::UnboundedSender;

use crate::config::StalePolicy;
use crate::engine::parallel::{self, Completion, JoinCallback, Operation};
use crate::errors::{EngineError, StepError};
use crate::model::{ResultCollector, VariableStore};
use crate::step::{Continuation, JumpTarget};

/// Mensajes de los contextos hacia el scheduler.
#[derive(Debug)]
pub(crate) enum Signal {
    Next { epoch: u64, value: Option<Value> },
    End { epoch: u64, error: Option<StepError> },
    Jump { epoch: u64, to: usize },
    /// Error de configuración detectado en un contexto (jump irresoluble,
    /// contexto obsoleto). Se atiende sin importar el epoch.
    Fault { epoch: u64, error: EngineError },
    /// Se soltó la última copia del contexto.
    Released { epoch: u64 },
}

impl Signal {
    pub(crate) fn epoch(&self) -> u64 {
        match self {
            Self::Next { epoch, .. }
            | Self::End { epoch, .. }
            | Self::Jump { epoch, .. }
            | Self::Fault { epoch, .. }
            | Self::Released { epoch } => *epoch,
        }
    }
}

/// Estado común de un contexto y de todas sus copias.
pub(crate) struct ContextState {
    pub(crate) epoch: u64,
    pub(crate) task_index: usize,
    pub(crate) task_name: String,
    pub(crate) step_index: usize,
    pub(crate) step_name: String,
    pub(crate) step_names: Arc<[String]>,
    pub(crate) vars: Arc<VariableStore>,
    pub(crate) results: Arc<ResultCollector>,
    pub(crate) signals: UnboundedSender<Signal>,
    pub(crate) stale_policy: StalePolicy,
    pub(crate) sealed: AtomicBool,
}

impl ContextState {
    fn send(&self, signal: Signal) {
        if self.signals.send(signal).is_err() {
            debug!("step `{}`: pipeline already finished, signal dropped", self.step_name);
        }
    }

    /// `true` si esta llamada sella el contexto; `false` si ya estaba sellado.
    fn seal(&self) -> bool {
        !self.sealed.swap(true, Ordering::SeqCst)
    }

    fn is_sealed(&self) -> bool {
        self.sealed.load(Ordering::SeqCst)
    }

    fn report_stale(&self, capability: &str) {
        warn!("step `{}`: `{capability}` called on a context that already advanced the pipeline",
              self.step_name);
        if self.stale_policy == StalePolicy::Fail {
            self.send(Signal::Fault { epoch: self.epoch,
                                      error: EngineError::StaleContext { step: self.step_name.clone() } });
        }
    }

    /// Sella y envía; si ya estaba sellado reporta el uso obsoleto.
    fn advance(&self, capability: &str, signal: Signal) {
        if self.seal() {
            self.send(signal);
        } else {
            self.report_stale(capability);
        }
    }
}

impl Drop for ContextState {
    fn drop(&mut self) {
        let _ = self.signals.send(Signal::Released { epoch: self.epoch });
    }
}

/// Capacidades de un step en ejecución.
///
/// Es barato de clonar: las copias comparten estado y sellado, así que un
/// step puede mover su contexto a la tarea asíncrona que lanza.
#[derive(Clone)]
pub struct StepContext {
    state: Arc<ContextState>,
}

impl std::fmt::Debug for StepContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StepContext")
         .field("task", &self.state.task_name)
         .field("step", &self.state.step_name)
         .field("epoch", &self.state.epoch)
         .field("sealed", &self.state.is_sealed())
         .finish()
    }
}

impl StepContext {
    pub(crate) fn new(state: ContextState) -> Self {
        Self { state: Arc::new(state) }
    }

    /// Nombre del step (declarado o `_UNNAMED_STEP_<k>`).
    pub fn name(&self) -> &str {
        &self.state.step_name
    }

    /// Nombre del task, o `#<índice>` si es anónimo.
    pub fn task_name(&self) -> &str {
        &self.state.task_name
    }

    pub fn task_index(&self) -> usize {
        self.state.task_index
    }

    pub fn step_index(&self) -> usize {
        self.state.step_index
    }

    /// `true` una vez que este contexto avanzó el pipeline.
    pub fn is_sealed(&self) -> bool {
        self.state.is_sealed()
    }

    /// Variables del task actual. Siguen accesibles después de avanzar,
    /// p.ej. para marcar un flag justo después de `jump()`: el salto se aplica
    /// recién cuando se suelta la última copia del contexto.
    pub fn vars(&self) -> &VariableStore {
        &self.state.vars
    }

    /// Publica cada valor como una entrada propia del resultado del run.
    pub fn fulfill<I, T>(&self, values: I)
        where I: IntoIterator<Item = T>,
              T: Into<Value>
    {
        if self.state.is_sealed() {
            self.state.report_stale("fulfill");
            return;
        }
        self.state.results.extend(values.into_iter().map(Into::into));
    }

    /// Señal canónica de fin de step.
    ///
    /// - `error` presente: igual que `end(error)`.
    /// - `Continuation::Next` / `Forward(Null)`: igual que `next()`.
    /// - `Continuation::Forward(v)`: igual que `next_with(v)`.
    /// - `Continuation::Defer(f, extra)`: ejecuta `f(self, extra)` ya mismo y
    ///   no avanza; `f` decide cuándo llamar a `next()`.
    pub fn done(&self, error: Option<StepError>, continuation: Continuation) {
        if let Some(error) = error {
            return self.end(Some(error));
        }
        match continuation {
            Continuation::Next | Continuation::Forward(Value::Null) => self.advance_with(None),
            Continuation::Forward(value) => self.advance_with(Some(value)),
            Continuation::Defer(f, extra) => {
                if self.state.is_sealed() {
                    self.state.report_stale("done");
                    return;
                }
                f(self, extra)
            }
        }
    }

    pub fn done_ok(&self) {
        self.done(None, Continuation::Next)
    }

    pub fn done_with(&self, value: impl Into<Value>) {
        self.done(None, Continuation::Forward(value.into()))
    }

    pub fn done_then<F>(&self, f: F, extra: Vec<Value>)
        where F: FnOnce(&StepContext, Vec<Value>) + Send + 'static
    {
        self.done(None, Continuation::defer(f, extra))
    }

    pub fn fail(&self, error: impl Into<StepError>) {
        self.done(Some(error.into()), Continuation::Next)
    }

    /// Avanza al siguiente step (o al siguiente task si era el último).
    pub fn next(&self) {
        self.advance_with(None)
    }

    /// Como `next()`, reenviando `value` como argumento del siguiente step.
    pub fn next_with(&self, value: impl Into<Value>) {
        self.advance_with(Some(value.into()))
    }

    fn advance_with(&self, value: Option<Value>) {
        self.state.advance("next", Signal::Next { epoch: self.state.epoch, value })
    }

    /// Aborta los steps restantes del task. Sin error pasa al siguiente task;
    /// con error lo entrega al error handler.
    pub fn end(&self, error: Option<StepError>) {
        self.state.advance("end", Signal::End { epoch: self.state.epoch, error })
    }

    /// Redirige la ejecución a otro step del mismo task.
    ///
    /// El destino se resuelve ahora; el step de destino se despacha cuando
    /// todas las copias de este contexto se sueltan.
    pub fn jump(&self, target: impl Into<JumpTarget>) {
        let target = target.into();
        let state = &self.state;
        let signal = match target.resolve(&state.task_name, &state.step_names, state.step_index) {
            Ok(to) => Signal::Jump { epoch: state.epoch, to },
            Err(error) => Signal::Fault { epoch: state.epoch, error },
        };
        state.advance("jump", signal)
    }

    /// Callback de completado para primitivas asíncronas externas:
    /// `Ok(v)` equivale a `done(None, Forward(v))`, `Err(e)` a `done(Some(e), ..)`.
    pub fn wrap<T, E>(&self) -> impl FnOnce(Result<T, E>) + Send + 'static
        where T: Serialize + 'static,
              E: Into<StepError> + 'static
    {
        let ctx = self.clone();
        move |result: Result<T, E>| {
            match result.map_err(Into::into)
                        .and_then(|v| serde_json::to_value(v).map_err(StepError::from))
            {
                Ok(value) => ctx.done(None, Continuation::Forward(value)),
                Err(error) => ctx.done(Some(error), Continuation::Next),
            }
        }
    }

    /// Ejecuta las operaciones en paralelo y avanza con `next_with(resultados)`.
    pub fn parallel(&self, operations: Vec<Operation>) {
        self.start_parallel(operations, None)
    }

    /// Como `parallel`, pero entrega los resultados a `callback`, que debe
    /// llamar a `next()` explícitamente.
    pub fn parallel_then<F>(&self, operations: Vec<Operation>, callback: F)
        where F: FnOnce(&StepContext, Vec<Value>) + Send + 'static
    {
        self.start_parallel(operations, Some(Box::new(callback)))
    }

    /// Aplica `iterator(item, options, completion)` a cada elemento en paralelo.
    pub fn parallel_each<I>(&self, items: Vec<Value>, iterator: I, options: Option<Value>)
        where I: Fn(Value, Option<Value>, Completion) + Send + Sync + 'static
    {
        self.start_parallel(parallel::each(items, iterator, options), None)
    }

    pub fn parallel_each_then<I, F>(&self, items: Vec<Value>, iterator: I, options: Option<Value>, callback: F)
        where I: Fn(Value, Option<Value>, Completion) + Send + Sync + 'static,
              F: FnOnce(&StepContext, Vec<Value>) + Send + 'static
    {
        self.start_parallel(parallel::each(items, iterator, options), Some(Box::new(callback)))
    }

    fn start_parallel(&self, operations: Vec<Operation>, callback: Option<JoinCallback>) {
        if self.state.is_sealed() {
            self.state.report_stale("parallel");
            return;
        }
        parallel::fan_out(self.clone(), operations, callback)
    }

    pub(crate) fn report_stale(&self, capability: &str) {
        self.state.report_stale(capability)
    }
}

/// Contexto del error handler: sólo permite reanudar (`next`) y consultar
/// el nombre del step que falló.
#[derive(Clone)]
pub struct ErrorContext {
    state: Arc<ContextState>,
}

impl std::fmt::Debug for ErrorContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ErrorContext")
         .field("task", &self.state.task_name)
         .field("step", &self.state.step_name)
         .finish()
    }
}

impl ErrorContext {
    pub(crate) fn new(state: ContextState) -> Self {
        Self { state: Arc::new(state) }
    }

    /// Nombre del step que falló.
    pub fn name(&self) -> &str {
        &self.state.step_name
    }

    pub fn task_name(&self) -> &str {
        &self.state.task_name
    }

    /// Reanuda en el primer step del task siguiente al que falló.
    pub fn next(&self) {
        self.state.advance("next", Signal::Next { epoch: self.state.epoch, value: None })
    }

    pub fn next_with(&self, value: impl Into<Value>) {
        self.state.advance("next", Signal::Next { epoch: self.state.epoch, value: Some(value.into()) })
    }
}
