//! Pipeline de demostración: dos tasks, "timer" y "fs".
//!
//! - "timer": el primer step espera `delay_ms`, publica el valor y reenvía el
//!   doble; el segundo espera ese doble y publica el valor junto con `"for test"`.
//! - "fs": lee `Cargo.toml` del directorio configurado y publica
//!   `{ "Cargo.toml": contenido }`; luego lista el directorio (orden
//!   alfabético) y publica la lista.
//!
//! Un error de IO en "fs" se registra y el pipeline continúa (no hay tasks
//! posteriores, así que el run termina con lo publicado hasta entonces).
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use log::{error, info};
use serde_json::{json, Value};
use stepify_core::{EngineConfig, EventStore, InMemoryEventStore, Pipeline, PipelineEvent, PipelineEventKind};
use tokio::time::sleep;

use crate::config::{AppConfig, DemoConfig};
use crate::errors::CoreError;

/// Resultado de un run del demo: valores publicados y journal del run.
#[derive(Debug)]
pub struct DemoRun {
    pub results: Vec<Value>,
    pub events: Vec<PipelineEvent>,
}

impl DemoRun {
    /// Fingerprint de los resultados registrado al cerrar el run. Dos runs que
    /// publican los mismos valores tienen el mismo fingerprint.
    pub fn fingerprint(&self) -> Option<&str> {
        self.events.iter().rev().find_map(|ev| match &ev.kind {
                                    PipelineEventKind::RunCompleted { results_fingerprint, .. } => {
                                        Some(results_fingerprint.as_str())
                                    }
                                    _ => None,
                                })
    }
}

async fn list_dir(dir: PathBuf) -> std::io::Result<Vec<String>> {
    let mut names = Vec::new();
    let mut entries = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        names.push(entry.file_name().to_string_lossy().into_owned());
    }
    names.sort();
    Ok(names)
}

/// Declara el pipeline del demo sobre `store`.
pub fn build_pipeline(cfg: &DemoConfig, engine: EngineConfig, store: Arc<dyn EventStore>) -> Result<Pipeline, CoreError> {
    let manifest = cfg.dir.join("Cargo.toml");
    let dir = cfg.dir.clone();
    let pipeline = Pipeline::builder().task("timer")
                                      .step_with_args(Some("wait"),
                                                      |ctx, args| {
                                                          let n = args.first().and_then(Value::as_u64).unwrap_or(0);
                                                          tokio::spawn(async move {
                                                              sleep(Duration::from_millis(n)).await;
                                                              ctx.fulfill([n]);
                                                              ctx.done_with(n * 2);
                                                          });
                                                      },
                                                      vec![json!(cfg.delay_ms)])
                                      .named_step("wait_double", |ctx, args| {
                                          let n = args.first().and_then(Value::as_u64).unwrap_or(0);
                                          tokio::spawn(async move {
                                              sleep(Duration::from_millis(n)).await;
                                              ctx.fulfill([json!(n), json!("for test")]);
                                              ctx.done_ok();
                                          });
                                      })
                                      .task("fs")
                                      .named_step("read_manifest", move |ctx, _| {
                                          let manifest = manifest.clone();
                                          tokio::spawn(async move {
                                              match tokio::fs::read_to_string(&manifest).await {
                                                  Ok(text) => {
                                                      ctx.fulfill([json!({ "Cargo.toml": text })]);
                                                      ctx.done_ok();
                                                  }
                                                  Err(e) => ctx.fail(e),
                                              }
                                          });
                                      })
                                      .named_step("list_dir", move |ctx, _| {
                                          let done = ctx.wrap::<Vec<String>, std::io::Error>();
                                          let dir = dir.clone();
                                          tokio::spawn(async move { done(list_dir(dir).await) });
                                      })
                                      .named_step("publish_listing", |ctx, args| {
                                          ctx.fulfill(args);
                                          ctx.done_ok();
                                      })
                                      .error(|ctx, err| {
                                          error!("task `{}` step `{}` failed: {err}", ctx.task_name(), ctx.name());
                                          ctx.next();
                                      })
                                      .config(engine)
                                      .event_store(store)
                                      .build()?;
    Ok(pipeline)
}

/// Ejecuta el demo y devuelve lo publicado junto con el journal.
pub async fn run_demo(app: &AppConfig) -> Result<DemoRun, CoreError> {
    let cfg = &app.demo;
    let store = Arc::new(InMemoryEventStore::new());
    let pipeline = build_pipeline(cfg, app.engine.clone(), store.clone())?;
    let run_id = pipeline.run_id();
    info!("demo run {run_id} over {}", cfg.dir.display());
    let results = pipeline.run().await?;
    Ok(DemoRun { results,
                 events: store.list(run_id) })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pipeline_has_two_tasks_and_five_steps() {
        let pipeline = build_pipeline(&DemoConfig::default(), EngineConfig::default(), Arc::new(InMemoryEventStore::new())).unwrap();
        let names: Vec<Option<String>> = pipeline.tasks().iter().map(|t| t.name.clone()).collect();
        assert_eq!(names, vec![Some("timer".to_string()), Some("fs".to_string())]);
        assert_eq!(pipeline.step_count(), 5);
    }
}
