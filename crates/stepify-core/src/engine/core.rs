//! Scheduler del pipeline.

use std::sync::Arc;

use log::{debug, info, warn};
use serde_json::Value;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::engine::flow_ctx::{ContextState, Signal};
use crate::engine::{ErrorContext, PipelineBuilder, StepContext};
use crate::errors::{EngineError, StepError};
use crate::event::{EventStore, PipelineEventKind};
use crate::hashing::fingerprint_results;
use crate::model::ResultCollector;
use crate::step::{DispatchState, ErrorHandler, ResultHandler, Task};

/// Pipeline construido y listo para ejecutar.
///
/// Ejecuta los tasks en orden declarado y, dentro de cada task, un step a la
/// vez. Sólo avanza cuando el contexto activo envía una señal (`next`, `end`,
/// `jump`, ...). Es dueño del `ResultCollector` y de los handlers.
pub struct Pipeline {
    pub(crate) tasks: Vec<Task>,
    pub(crate) results: Arc<ResultCollector>,
    pub(crate) on_error: Option<ErrorHandler>,
    pub(crate) on_result: Option<ResultHandler>,
    pub(crate) config: EngineConfig,
    pub(crate) event_store: Arc<dyn EventStore>,
    pub(crate) run_id: Uuid,
}

/// Próxima acción del scheduler.
#[derive(Debug)]
enum Transition {
    Dispatch { task: usize, step: usize, input: Option<Value> },
    Fail { task: usize, step: usize, error: StepError },
    Complete,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
         .field("run_id", &self.run_id)
         .field("tasks", &self.tasks)
         .field("has_error_handler", &self.on_error.is_some())
         .field("has_result_handler", &self.on_result.is_some())
         .field("config", &self.config)
         .finish()
    }
}

impl Pipeline {
    /// Crea un nuevo builder para declarar tasks y steps.
    #[inline]
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::new()
    }

    /// Identificador del run; clave de sus eventos en el `EventStore`.
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn step_count(&self) -> usize {
        self.tasks.iter().map(Task::len).sum()
    }

    /// Ejecuta el pipeline completo.
    ///
    /// Devuelve los valores publicados con `fulfill` (también entregados al
    /// result handler). Errores de configuración, errores de step sin handler
    /// y pipelines que ya no pueden avanzar se devuelven como `EngineError`.
    /// Consume el pipeline: un segundo `run()` no es posible.
    pub async fn run(mut self) -> Result<Vec<Value>, EngineError> {
        let (tx, mut rx) = mpsc::unbounded_channel();
        info!("run {}: starting ({} tasks, {} steps)",
              self.run_id,
              self.tasks.len(),
              self.step_count());
        self.record(PipelineEventKind::RunStarted { task_count: self.tasks.len(),
                                                    step_count: self.step_count() });

        let mut epoch = 0u64;
        let mut transition = self.enter_task(0, None);
        loop {
            epoch += 1;
            let outcome = match transition {
                Transition::Complete => return Ok(self.finish()),
                Transition::Dispatch { task, step, input } => {
                    self.dispatch_step(task, step, input, epoch, &tx);
                    self.await_signal(&mut rx, epoch, task, step, DispatchState::Running, None)
                        .await
                }
                Transition::Fail { task, step, error } => match self.dispatch_error(task, step, error.clone(), epoch, &tx) {
                    Ok(()) => {
                        self.await_signal(&mut rx, epoch, task, step, DispatchState::AwaitingResume, Some(error))
                            .await
                    }
                    Err(e) => Err(e),
                },
            };
            transition = match outcome {
                Ok(next) => next,
                Err(error) => return Err(self.abort(error)),
            };
        }
    }

    fn record(&self, kind: PipelineEventKind) {
        if self.config.record_events {
            self.event_store.append_kind(self.run_id, kind);
        }
    }

    fn step_name(&self, task: usize, step: usize) -> String {
        self.tasks[task].steps[step].name.clone()
    }

    /// Primer step del primer task no vacío a partir de `from`.
    fn enter_task(&self, from: usize, input: Option<Value>) -> Transition {
        match (from..self.tasks.len()).find(|&t| !self.tasks[t].is_empty()) {
            Some(task) => {
                if task > from {
                    debug!("skipping {} empty task(s)", task - from);
                }
                self.record(PipelineEventKind::TaskStarted { task_index: task,
                                                             task_name: self.tasks[task].name.clone() });
                Transition::Dispatch { task, step: 0, input }
            }
            None => Transition::Complete,
        }
    }

    /// Regla de avance: siguiente step, o siguiente task si era el último.
    fn advance(&self, task: usize, step: usize, input: Option<Value>) -> Transition {
        if step + 1 < self.tasks[task].len() {
            return Transition::Dispatch { task,
                                          step: step + 1,
                                          input };
        }
        self.record(PipelineEventKind::TaskEnded { task_index: task, early: false });
        self.enter_task(task + 1, input)
    }

    fn context_state(&self, task: usize, step: usize, epoch: u64, tx: &UnboundedSender<Signal>) -> ContextState {
        let t = &self.tasks[task];
        ContextState { epoch,
                       task_index: task,
                       task_name: t.label(task),
                       step_index: step,
                       step_name: t.steps[step].name.clone(),
                       step_names: Arc::clone(&t.step_names),
                       vars: Arc::clone(&t.vars),
                       results: Arc::clone(&self.results),
                       signals: tx.clone(),
                       stale_policy: self.config.stale_context,
                       sealed: Default::default() }
    }

    fn dispatch_step(&self, task: usize, step: usize, input: Option<Value>, epoch: u64, tx: &UnboundedSender<Signal>) {
        let def = &self.tasks[task].steps[step];
        let mut args = def.bound_args.clone();
        args.extend(input);
        debug!("dispatch task {task} step {step} (`{}`) with {} arg(s)", def.name, args.len());
        self.record(PipelineEventKind::StepStarted { task_index: task,
                                                     step_index: step,
                                                     step_name: def.name.clone() });
        let ctx = StepContext::new(self.context_state(task, step, epoch, tx));
        (def.handler)(ctx, args);
    }

    fn dispatch_error(&mut self,
                      task: usize,
                      step: usize,
                      error: StepError,
                      epoch: u64,
                      tx: &UnboundedSender<Signal>)
                      -> Result<(), EngineError> {
        let step_name = self.step_name(task, step);
        if self.on_error.is_none() {
            return Err(EngineError::Unhandled { step: step_name, error });
        }
        debug!("task {task}: dispatching error from `{step_name}`: {error}");
        self.record(PipelineEventKind::ErrorDispatched { task_index: task,
                                                         step_name,
                                                         error: error.to_string() });
        let ctx = ErrorContext::new(self.context_state(task, step, epoch, tx));
        if let Some(handler) = self.on_error.as_mut() {
            handler(ctx, error);
        }
        Ok(())
    }

    /// Espera la señal que decide la próxima transición del contexto `epoch`.
    ///
    /// Un `jump` no se aplica al recibirlo: queda en `Jumping` hasta que se
    /// suelta la última copia del contexto, así las escrituras en `vars()`
    /// hechas después del `jump` son visibles para el step de destino.
    async fn await_signal(&self,
                          rx: &mut UnboundedReceiver<Signal>,
                          epoch: u64,
                          task: usize,
                          step: usize,
                          mut state: DispatchState,
                          pending: Option<StepError>)
                          -> Result<Transition, EngineError> {
        loop {
            // El scheduler conserva un emisor propio: el canal nunca se cierra aquí.
            let signal = rx.recv()
                           .await
                           .ok_or_else(|| EngineError::Internal("signal channel closed".into()))?;
            if let Signal::Fault { error, .. } = signal {
                return Err(error);
            }
            if signal.epoch() != epoch {
                debug!("ignoring {signal:?} from an expired context");
                continue;
            }
            match (state, signal) {
                (DispatchState::Running, Signal::Next { value, .. }) => return Ok(self.advance(task, step, value)),
                (DispatchState::Running, Signal::End { error: None, .. }) => {
                    self.record(PipelineEventKind::TaskEnded { task_index: task, early: true });
                    return Ok(self.enter_task(task + 1, None));
                }
                (DispatchState::Running, Signal::End { error: Some(error), .. }) => {
                    return Ok(Transition::Fail { task, step, error })
                }
                (DispatchState::Running, Signal::Jump { to, .. }) => {
                    debug!("task {task}: jump {step} -> {to} pending until the context is released");
                    state = DispatchState::Jumping(to);
                }
                (DispatchState::Jumping(to), Signal::Released { .. }) => {
                    debug!("task {task}: jump {step} -> {to}");
                    self.record(PipelineEventKind::StepJumped { task_index: task,
                                                                from_step: step,
                                                                to_step: to });
                    return Ok(Transition::Dispatch { task,
                                                     step: to,
                                                     input: None });
                }
                (DispatchState::Running, Signal::Released { .. }) => {
                    return Err(EngineError::Stalled { step: self.step_name(task, step) })
                }
                (DispatchState::AwaitingResume, Signal::Next { value, .. }) => {
                    self.record(PipelineEventKind::Resumed { task_index: task });
                    return Ok(self.enter_task(task + 1, value));
                }
                (DispatchState::AwaitingResume, Signal::Released { .. }) => {
                    let error = pending.unwrap_or_else(|| StepError::Message("unknown error".into()));
                    return Err(EngineError::Halted { step: self.step_name(task, step),
                                                     error });
                }
                (state, other) => warn!("ignoring {other:?} while {state:?}"),
            }
        }
    }

    fn finish(&mut self) -> Vec<Value> {
        let results = self.results.take();
        let results_fingerprint = fingerprint_results(&results);
        info!("run {}: completed with {} result(s)", self.run_id, results.len());
        self.record(PipelineEventKind::RunCompleted { result_count: results.len(),
                                                      results_fingerprint });
        if let Some(handler) = self.on_result.take() {
            handler(&results);
        }
        results
    }

    fn abort(&self, error: EngineError) -> EngineError {
        warn!("run {}: aborted: {error}", self.run_id);
        self.record(PipelineEventKind::RunFailed { reason: error.to_string() });
        error
    }
}
