use chrono::Utc;
use dashmap::DashMap;
use uuid::Uuid;

use super::{PipelineEvent, PipelineEventKind};

/// Almacenamiento de eventos append-only.
pub trait EventStore: Send + Sync {
    /// Agrega un evento a partir de su kind y devuelve el evento completo (con seq y ts).
    fn append_kind(&self, run_id: Uuid, kind: PipelineEventKind) -> PipelineEvent;
    /// Lista eventos de un run (orden ascendente por seq).
    fn list(&self, run_id: Uuid) -> Vec<PipelineEvent>;
}

#[derive(Debug, Default)]
pub struct InMemoryEventStore {
    inner: DashMap<Uuid, Vec<PipelineEvent>>,
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Identificadores de todos los runs registrados.
    pub fn runs(&self) -> Vec<Uuid> {
        self.inner.iter().map(|e| *e.key()).collect()
    }
}

impl EventStore for InMemoryEventStore {
    fn append_kind(&self, run_id: Uuid, kind: PipelineEventKind) -> PipelineEvent {
        let mut events = self.inner.entry(run_id).or_default();
        let seq = events.len() as u64;
        let ev = PipelineEvent { seq, run_id, kind, ts: Utc::now() };
        events.push(ev.clone());
        ev
    }

    fn list(&self, run_id: Uuid) -> Vec<PipelineEvent> {
        self.inner.get(&run_id).map(|e| e.value().clone()).unwrap_or_default()
    }
}
