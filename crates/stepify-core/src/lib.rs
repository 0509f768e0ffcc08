//! stepify-core: motor de orquestación de steps asíncronos.
//!
//! Un `Pipeline` es una secuencia ordenada de tasks; cada task, una secuencia
//! ordenada de steps que comparten un `VariableStore`. Los steps se ejecutan
//! de a uno y avanzan al invocar las capacidades de su `StepContext`
//! (`done`, `next`, `end`, `jump`, `parallel`, ...). Los valores publicados
//! con `fulfill` llegan, en orden de publicación, al result handler.
pub mod config;
pub mod constants;
pub mod engine;
pub mod errors;
pub mod event;
pub mod hashing;
pub mod model;
pub mod step;

pub use config::{EngineConfig, StalePolicy};
pub use engine::{Completion, ErrorContext, Operation, Pipeline, PipelineBuilder, StepContext};
pub use errors::{EngineError, StepError};
pub use event::{EventStore, InMemoryEventStore, PipelineEvent, PipelineEventKind};
pub use model::{ResultCollector, VariableStore};
pub use step::{Continuation, JumpTarget};

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::{json, Value};
	use std::sync::Arc;

	fn step_names(store: &InMemoryEventStore, pipeline_run: uuid::Uuid) -> Vec<String> {
		store.list(pipeline_run)
		     .into_iter()
		     .filter_map(|e| match e.kind {
			     PipelineEventKind::StepStarted { step_name, .. } => Some(step_name),
			     _ => None,
		     })
		     .collect()
	}

	#[tokio::test]
	async fn empty_pipeline_completes_with_empty_results() {
		let seen = Arc::new(std::sync::Mutex::new(None));
		let sink = Arc::clone(&seen);
		let results = Pipeline::builder().result(move |r| *sink.lock().unwrap() = Some(r.to_vec()))
		                                 .build()
		                                 .unwrap()
		                                 .run()
		                                 .await
		                                 .unwrap();
		assert!(results.is_empty());
		assert_eq!(*seen.lock().unwrap(), Some(Vec::<Value>::new()));
	}

	#[tokio::test]
	async fn journal_records_transitions_and_fingerprint() {
		let store = Arc::new(InMemoryEventStore::new());
		let pipeline = Pipeline::builder().task("one")
		                                  .named_step("a", |ctx, _| {
			                                  ctx.fulfill([1]);
			                                  ctx.done_ok();
		                                  })
		                                  .named_step("b", |ctx, _| ctx.end(None))
		                                  .named_step("never", |ctx, _| ctx.done_ok())
		                                  .task("two")
		                                  .named_step("c", |ctx, _| {
			                                  ctx.fulfill(["x"]);
			                                  ctx.done_ok();
		                                  })
		                                  .event_store(store.clone())
		                                  .build()
		                                  .unwrap();
		let run_id = pipeline.run_id();
		let results = pipeline.run().await.unwrap();
		assert_eq!(results, vec![json!(1), json!("x")]);

		assert_eq!(step_names(&store, run_id), vec!["a", "b", "c"]);
		let labels: Vec<&str> = store.list(run_id).iter().map(|e| e.kind.label()).collect();
		assert_eq!(labels,
		           vec!["run_started",
		                "task_started",
		                "step_started",
		                "step_started",
		                "task_ended",
		                "task_started",
		                "step_started",
		                "task_ended",
		                "run_completed"]);
		let fingerprint = store.list(run_id).into_iter().find_map(|e| match e.kind {
			                                                PipelineEventKind::RunCompleted { results_fingerprint, .. } => {
				                                                Some(results_fingerprint)
			                                                }
			                                                _ => None,
		                                                });
		assert_eq!(fingerprint, Some(hashing::fingerprint_results(&results)));
	}

	#[tokio::test]
	async fn journal_can_be_disabled() {
		let store = Arc::new(InMemoryEventStore::new());
		let pipeline = Pipeline::builder().step(|ctx, _| ctx.done_ok())
		                                  .config(EngineConfig { record_events: false,
		                                                         ..EngineConfig::default() })
		                                  .event_store(store.clone())
		                                  .build()
		                                  .unwrap();
		let run_id = pipeline.run_id();
		pipeline.run().await.unwrap();
		assert!(store.list(run_id).is_empty());
	}
}
