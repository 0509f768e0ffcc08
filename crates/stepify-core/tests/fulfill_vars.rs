use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::{json, Value};
use stepify_core::{EventStore, InMemoryEventStore, Pipeline, PipelineEventKind};
use tokio::time::sleep;

const MANIFEST: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/Cargo.toml");

#[tokio::test(start_paused = true)]
async fn fulfilled_values_follow_task_then_step_order() {
    let from_handler = Arc::new(Mutex::new(Vec::<Value>::new()));
    let sink = Arc::clone(&from_handler);
    let results = Pipeline::builder().task("timer")
                                     .step_with_args(None,
                                                     |ctx, args| {
                                                         let n = args[0].as_u64().unwrap();
                                                         tokio::spawn(async move {
                                                             sleep(Duration::from_millis(n)).await;
                                                             ctx.fulfill([n]);
                                                             ctx.done_with(n * 2);
                                                         });
                                                     },
                                                     vec![json!(200)])
                                     .step(|ctx, args| {
                                         let n = args[0].as_u64().unwrap();
                                         tokio::spawn(async move {
                                             sleep(Duration::from_millis(n)).await;
                                             ctx.fulfill([json!(n), json!("for test")]);
                                             ctx.done_ok();
                                         });
                                     })
                                     .task("fs")
                                     .step(|ctx, _| {
                                         tokio::spawn(async move {
                                             match tokio::fs::read_to_string(MANIFEST).await {
                                                 Ok(text) => {
                                                     ctx.fulfill([json!({ "manifest": text })]);
                                                     ctx.done_ok();
                                                 }
                                                 Err(e) => ctx.fail(e),
                                             }
                                         });
                                     })
                                     .step(|ctx, _| {
                                         ctx.fulfill([json!([1, 2])]);
                                         ctx.done_ok();
                                     })
                                     .result(move |r| sink.lock().unwrap().extend_from_slice(r))
                                     .build()
                                     .unwrap()
                                     .run()
                                     .await
                                     .unwrap();

    let manifest = std::fs::read_to_string(MANIFEST).unwrap();
    let expected = vec![json!(200), json!(400), json!("for test"), json!({ "manifest": manifest }), json!([1, 2])];
    assert_eq!(results, expected);
    assert_eq!(*from_handler.lock().unwrap(), expected);
}

#[tokio::test(start_paused = true)]
async fn fulfill_order_is_publication_order_not_timer_order() {
    // El primer step tarda más, pero publica antes porque los steps son secuenciales.
    let results = Pipeline::builder().step(|ctx, _| {
                                         tokio::spawn(async move {
                                             sleep(Duration::from_millis(500)).await;
                                             ctx.fulfill(["slow"]);
                                             ctx.done_ok();
                                         });
                                     })
                                     .step(|ctx, _| {
                                         tokio::spawn(async move {
                                             sleep(Duration::from_millis(1)).await;
                                             ctx.fulfill(["fast"]);
                                             ctx.done_ok();
                                         });
                                     })
                                     .build()
                                     .unwrap()
                                     .run()
                                     .await
                                     .unwrap();
    assert_eq!(results, vec![json!("slow"), json!("fast")]);
}

#[tokio::test(start_paused = true)]
async fn vars_are_scoped_to_their_task() {
    let observed = Arc::new(Mutex::new(Vec::new()));
    let (o1, o2) = (Arc::clone(&observed), Arc::clone(&observed));
    Pipeline::builder().task("foo")
                       .step(|ctx, _| {
                           tokio::spawn(async move {
                               sleep(Duration::from_millis(200)).await;
                               ctx.vars().set("key", "value");
                               ctx.done_ok();
                           });
                       })
                       .step(move |ctx, _| {
                           o1.lock().unwrap().push((ctx.vars().get("key"), ctx.vars().get("not_exists")));
                           ctx.done_ok();
                       })
                       .pend()
                       .step(move |ctx, _| {
                           o2.lock().unwrap().push((ctx.vars().get("key"), None));
                           ctx.done_ok();
                       })
                       .build()
                       .unwrap()
                       .run()
                       .await
                       .unwrap();
    assert_eq!(*observed.lock().unwrap(), vec![(Some(json!("value")), None), (None, None)]);
}

#[tokio::test]
async fn vars_do_not_leak_between_back_to_back_named_tasks() {
    let observed = Arc::new(Mutex::new(None));
    let sink = Arc::clone(&observed);
    Pipeline::builder().task("a")
                       .step(|ctx, _| {
                           ctx.vars().set("k", 1);
                           ctx.done_ok();
                       })
                       .task("b")
                       .step(move |ctx, _| {
                           *sink.lock().unwrap() = Some(ctx.vars().get("k"));
                           ctx.done_ok();
                       })
                       .build()
                       .unwrap()
                       .run()
                       .await
                       .unwrap();
    assert_eq!(*observed.lock().unwrap(), Some(None));
}

#[tokio::test]
async fn tasks_without_steps_are_skipped_at_run_time() {
    let store = Arc::new(InMemoryEventStore::new());
    let pipeline = Pipeline::builder().task("empty")
                                      .task("b")
                                      .step(|ctx, _| {
                                          ctx.fulfill([1]);
                                          ctx.done_with("carried");
                                      })
                                      .task("also_empty")
                                      .task("c")
                                      .step(|ctx, args| {
                                          ctx.fulfill(args);
                                          ctx.done_ok();
                                      })
                                      .task("trailing")
                                      .event_store(store.clone())
                                      .build()
                                      .unwrap();
    let run_id = pipeline.run_id();
    let results = pipeline.run().await.unwrap();
    assert_eq!(results, vec![json!(1), json!("carried")]);
    let entered: Vec<String> = store.list(run_id)
                                    .into_iter()
                                    .filter_map(|ev| match ev.kind {
                                        PipelineEventKind::TaskStarted { task_name, .. } => task_name,
                                        _ => None,
                                    })
                                    .collect();
    assert_eq!(entered, vec!["b", "c"]);
}

async fn published_fingerprint(first_delay: u64, second_delay: u64, second: Value) -> String {
    let store = Arc::new(InMemoryEventStore::new());
    let pipeline = Pipeline::builder().step(move |ctx, _| {
                                          tokio::spawn(async move {
                                              sleep(Duration::from_millis(first_delay)).await;
                                              ctx.fulfill([json!({"b": 2, "a": 1})]);
                                              ctx.done_ok();
                                          });
                                      })
                                      .step(move |ctx, _| {
                                          let second = second.clone();
                                          tokio::spawn(async move {
                                              sleep(Duration::from_millis(second_delay)).await;
                                              ctx.fulfill([second]);
                                              ctx.done_ok();
                                          });
                                      })
                                      .event_store(store.clone())
                                      .build()
                                      .unwrap();
    let run_id = pipeline.run_id();
    pipeline.run().await.unwrap();
    store.list(run_id)
         .into_iter()
         .find_map(|ev| match ev.kind {
             PipelineEventKind::RunCompleted { results_fingerprint, .. } => Some(results_fingerprint),
             _ => None,
         })
         .unwrap()
}

#[tokio::test(start_paused = true)]
async fn results_fingerprint_ignores_timing_but_not_values() {
    let fast = published_fingerprint(1, 300, json!("x")).await;
    let slow = published_fingerprint(500, 2, json!("x")).await;
    let other = published_fingerprint(1, 300, json!("y")).await;
    assert_eq!(fast, slow);
    assert_ne!(fast, other);
}
