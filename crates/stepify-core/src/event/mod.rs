//! Journal de eventos del run y trait EventStore.

mod store;
mod types;

pub use store::{EventStore, InMemoryEventStore};
pub use types::{PipelineEvent, PipelineEventKind};
