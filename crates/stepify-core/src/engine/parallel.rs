//! Fan-out / fan-in de operaciones asíncronas dentro de un step.
//!
//! Cada operación recibe un `Completion` de un solo uso con su índice. El
//! coordinador junta los resultados en el orden de declaración (no en el de
//! llegada) y corta en el primer error reportado. Las operaciones que siguen
//! en vuelo no se cancelan: sus resultados simplemente se descartan.

use std::future::Future;
use std::sync::Arc;

use log::debug;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use crate::engine::StepContext;
use crate::errors::StepError;

/// Callback de fan-in: recibe los resultados ordenados y debe llamar a
/// `next()` sobre el contexto para avanzar.
pub type JoinCallback = Box<dyn FnOnce(&StepContext, Vec<Value>) + Send>;

type Outcome = (usize, Result<Value, StepError>);

/// Handle de completado de una operación paralela.
///
/// Se consume al resolver. Si se descarta sin resolver, el join falla.
#[derive(Debug)]
pub struct Completion {
    index: usize,
    tx: UnboundedSender<Outcome>,
}

impl Completion {
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn resolve(self, result: Result<Value, StepError>) {
        if self.tx.send((self.index, result)).is_err() {
            debug!("parallel operation #{} finished after the join was decided", self.index);
        }
    }

    /// Variante genérica para resultados de primitivas asíncronas.
    pub fn complete<T, E>(self, result: Result<T, E>)
        where T: Serialize,
              E: Into<StepError>
    {
        let result = result.map_err(Into::into)
                           .and_then(|v| serde_json::to_value(v).map_err(StepError::from));
        self.resolve(result)
    }

    pub fn ok(self, value: impl Into<Value>) {
        self.resolve(Ok(value.into()))
    }

    pub fn fail(self, error: impl Into<StepError>) {
        self.resolve(Err(error.into()))
    }
}

/// Una operación a lanzar en paralelo.
pub struct Operation(Box<dyn FnOnce(Completion) + Send>);

impl std::fmt::Debug for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Operation(<fn>)")
    }
}

impl Operation {
    /// Operación estilo callback: debe resolver `Completion` cuando termine.
    pub fn new<F>(f: F) -> Self
        where F: FnOnce(Completion) + Send + 'static
    {
        Self(Box::new(f))
    }

    /// Adapta un future; se lanza con `tokio::spawn` al iniciar el fan-out.
    pub fn from_future<F, T, E>(fut: F) -> Self
        where F: Future<Output = Result<T, E>> + Send + 'static,
              T: Serialize + Send + 'static,
              E: Into<StepError> + Send + 'static
    {
        Self::new(move |done| {
            tokio::spawn(async move {
                done.complete(fut.await);
            });
        })
    }

    fn start(self, completion: Completion) {
        (self.0)(completion)
    }
}

/// Convierte `items` + `iterator` en una operación por elemento.
pub(crate) fn each<I>(items: Vec<Value>, iterator: I, options: Option<Value>) -> Vec<Operation>
    where I: Fn(Value, Option<Value>, Completion) + Send + Sync + 'static
{
    let iterator = Arc::new(iterator);
    items.into_iter()
         .map(|item| {
             let iterator = Arc::clone(&iterator);
             let options = options.clone();
             Operation::new(move |done| iterator(item, options, done))
         })
         .collect()
}

pub(crate) struct ParallelCoordinator {
    expected: usize,
    tx: UnboundedSender<Outcome>,
    rx: UnboundedReceiver<Outcome>,
}

impl ParallelCoordinator {
    pub(crate) fn new(expected: usize) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self { expected, tx, rx }
    }

    pub(crate) fn completion(&self, index: usize) -> Completion {
        Completion { index,
                     tx: self.tx.clone() }
    }

    /// Espera todos los resultados (en orden de declaración) o el primer error.
    pub(crate) async fn join(self) -> Result<Vec<Value>, StepError> {
        let Self { expected, tx, mut rx } = self;
        // Sólo los `Completion` mantienen vivo el canal.
        drop(tx);
        let mut slots: Vec<Option<Value>> = vec![None; expected];
        let mut filled = 0;
        while filled < expected {
            match rx.recv().await {
                Some((index, Ok(value))) => {
                    slots[index] = Some(value);
                    filled += 1;
                }
                Some((index, Err(error))) => {
                    debug!("parallel operation #{index} failed, aborting join");
                    return Err(error);
                }
                None => {
                    return Err(StepError::Message(format!("{} of {} parallel operations dropped their completion without resolving",
                                                          expected - filled,
                                                          expected)))
                }
            }
        }
        Ok(slots.into_iter().flatten().collect())
    }
}

/// Lanza las operaciones ya mismo y deja una tarea esperando el join; el
/// resultado vuelve al mismo contexto del step.
pub(crate) fn fan_out(ctx: StepContext, operations: Vec<Operation>, callback: Option<JoinCallback>) {
    let coordinator = ParallelCoordinator::new(operations.len());
    debug!("step `{}`: fan-out of {} operations", ctx.name(), operations.len());
    for (index, operation) in operations.into_iter().enumerate() {
        operation.start(coordinator.completion(index));
    }
    tokio::spawn(async move {
        match coordinator.join().await {
            Ok(results) => match callback {
                Some(_) if ctx.is_sealed() => ctx.report_stale("parallel"),
                Some(callback) => callback(&ctx, results),
                None => ctx.next_with(Value::Array(results)),
            },
            Err(error) => ctx.end(Some(error)),
        }
    });
}
