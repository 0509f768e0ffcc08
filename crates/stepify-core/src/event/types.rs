//! Tipos de evento del pipeline y estructura `PipelineEvent`.
//!
//! Rol en el flujo:
//! - El scheduler emite un evento por cada transición observable (task
//!   iniciado, step despachado, salto, error despachado, reanudación, cierre).
//! - El journal permite reconstruir el orden exacto de ejecución de un run
//!   sin instrumentar los steps.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PipelineEventKind {
    /// Primer evento de todo run.
    RunStarted { task_count: usize, step_count: usize },
    /// Se entra en el step 0 de un task (no se emite en saltos internos).
    TaskStarted { task_index: usize, task_name: Option<String> },
    /// Un handler de step fue invocado.
    StepStarted { task_index: usize, step_index: usize, step_name: String },
    /// `jump()` redirigió la ejecución dentro del task actual.
    StepJumped { task_index: usize, from_step: usize, to_step: usize },
    /// El task terminó sin error. `early` indica que fue vía `end()` y quedaron
    /// steps sin ejecutar.
    TaskEnded { task_index: usize, early: bool },
    /// Un error de step se entregó al error handler.
    ErrorDispatched { task_index: usize, step_name: String, error: String },
    /// El error handler llamó a `next()`.
    Resumed { task_index: usize },
    /// Cierre exitoso: fingerprint de la secuencia de resultados.
    RunCompleted { result_count: usize, results_fingerprint: String },
    /// Cierre con error de motor.
    RunFailed { reason: String },
}

impl PipelineEventKind {
    /// Nombre corto del evento, útil para aserciones compactas.
    pub fn label(&self) -> &'static str {
        match self {
            Self::RunStarted { .. } => "run_started",
            Self::TaskStarted { .. } => "task_started",
            Self::StepStarted { .. } => "step_started",
            Self::StepJumped { .. } => "step_jumped",
            Self::TaskEnded { .. } => "task_ended",
            Self::ErrorDispatched { .. } => "error_dispatched",
            Self::Resumed { .. } => "resumed",
            Self::RunCompleted { .. } => "run_completed",
            Self::RunFailed { .. } => "run_failed",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineEvent {
    pub seq: u64, // asignado por el store (orden append)
    pub run_id: Uuid,
    pub kind: PipelineEventKind,
    pub ts: DateTime<Utc>, // metadato (no entra en fingerprint)
}
