use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::json;
use stepify_core::{EngineConfig, EngineError, Pipeline, StalePolicy, StepError};
use tokio::time::sleep;

#[tokio::test(start_paused = true)]
async fn end_without_error_skips_rest_of_task() {
    let results = Pipeline::builder().step(|ctx, _| {
                                         ctx.fulfill([ctx.name()]);
                                         ctx.done_ok();
                                     })
                                     .step(|ctx, _| {
                                         tokio::spawn(async move {
                                             sleep(Duration::from_millis(100)).await;
                                             ctx.fulfill([ctx.name()]);
                                             ctx.end(None);
                                         });
                                     })
                                     .step(|ctx, _| {
                                         ctx.fulfill(["never"]);
                                         ctx.done_ok();
                                     })
                                     .task("next")
                                     .named_step("foo", |ctx, _| {
                                         ctx.fulfill([ctx.name()]);
                                         ctx.done_ok();
                                     })
                                     .build()
                                     .unwrap()
                                     .run()
                                     .await
                                     .unwrap();
    assert_eq!(results, vec![json!("_UNNAMED_STEP_0"), json!("_UNNAMED_STEP_1"), json!("foo")]);
}

#[tokio::test(start_paused = true)]
async fn end_with_error_resumes_at_next_task_when_handler_calls_next() {
    let counter = Arc::new(Mutex::new(0));
    let flag = Arc::new(Mutex::new(0));
    let (c1, c2, c3, c4) = (counter.clone(), counter.clone(), counter.clone(), counter.clone());
    let f = flag.clone();
    let handled = Arc::new(Mutex::new(Vec::new()));
    let sink = handled.clone();
    Pipeline::builder().task("failing")
                       .step(move |ctx, _| {
                           *c1.lock().unwrap() += 1;
                           ctx.done_ok();
                       })
                       .named_step("breaks", move |ctx, _| {
                           *c2.lock().unwrap() += 1;
                           tokio::spawn(async move {
                               sleep(Duration::from_millis(10)).await;
                               ctx.end(Some(StepError::from("task aborted")));
                           });
                       })
                       .step(move |ctx, _| {
                           *c3.lock().unwrap() += 100;
                           ctx.done_ok();
                       })
                       .task("recovery")
                       .step(move |ctx, args| {
                           assert!(args.is_empty());
                           *c4.lock().unwrap() += 1;
                           ctx.done_ok();
                       })
                       .error(move |ctx, err| {
                           *f.lock().unwrap() += 1;
                           sink.lock().unwrap().push((ctx.task_name().to_string(), ctx.name().to_string(), err.to_string()));
                           ctx.next();
                       })
                       .build()
                       .unwrap()
                       .run()
                       .await
                       .unwrap();
    assert_eq!(*counter.lock().unwrap(), 3);
    assert_eq!(*flag.lock().unwrap(), 1);
    assert_eq!(*handled.lock().unwrap(),
               vec![("failing".to_string(), "breaks".to_string(), "task aborted".to_string())]);
}

#[tokio::test]
async fn handler_resume_value_is_forwarded_to_next_task() {
    let results = Pipeline::builder().step(|ctx, _| ctx.fail("boom"))
                                     .pend()
                                     .step(|ctx, args| {
                                         ctx.fulfill(args);
                                         ctx.done_ok();
                                     })
                                     .error(|ctx, err| ctx.next_with(format!("recovered from {err}")))
                                     .build()
                                     .unwrap()
                                     .run()
                                     .await
                                     .unwrap();
    assert_eq!(results, vec![json!("recovered from boom")]);
}

#[tokio::test]
async fn error_in_last_task_resumes_into_completion() {
    let done = Arc::new(Mutex::new(None));
    let sink = done.clone();
    let results = Pipeline::builder().step(|ctx, _| {
                                         ctx.fulfill([1]);
                                         ctx.fail("late");
                                     })
                                     .error(|ctx, _| ctx.next())
                                     .result(move |r| *sink.lock().unwrap() = Some(r.to_vec()))
                                     .build()
                                     .unwrap()
                                     .run()
                                     .await
                                     .unwrap();
    assert_eq!(results, vec![json!(1)]);
    assert_eq!(*done.lock().unwrap(), Some(vec![json!(1)]));
}

#[tokio::test]
async fn error_without_handler_is_unhandled_and_skips_result_handler() {
    let called = Arc::new(Mutex::new(false));
    let sink = called.clone();
    let err = Pipeline::builder().named_step("explodes", |ctx, _| ctx.end(Some("kaboom".into())))
                                 .result(move |_| *sink.lock().unwrap() = true)
                                 .build()
                                 .unwrap()
                                 .run()
                                 .await
                                 .unwrap_err();
    assert!(!err.is_configuration());
    assert_eq!(err.step_error().map(ToString::to_string), Some("kaboom".to_string()));
    assert!(matches!(err, EngineError::Unhandled { ref step, .. } if step == "explodes"));
    assert!(!*called.lock().unwrap());
}

#[tokio::test]
async fn double_advance_fails_run_by_default() {
    let err = Pipeline::builder().named_step("twice", |ctx, _| {
                                     ctx.next();
                                     ctx.next();
                                 })
                                 .step(|ctx, _| ctx.done_ok())
                                 .build()
                                 .unwrap()
                                 .run()
                                 .await
                                 .unwrap_err();
    assert!(err.is_configuration());
    assert!(matches!(err, EngineError::StaleContext { ref step } if step == "twice"), "got {err:?}");
}

#[tokio::test]
async fn double_advance_is_dropped_under_ignore_policy() {
    let config = EngineConfig { stale_context: StalePolicy::Ignore,
                                ..EngineConfig::default() };
    let results = Pipeline::builder().step(|ctx, _| {
                                         ctx.fulfill(["once"]);
                                         ctx.next();
                                         ctx.next();
                                         ctx.fulfill(["late"]);
                                     })
                                     .step(|ctx, _| {
                                         ctx.fulfill(["second"]);
                                         ctx.done_ok();
                                     })
                                     .config(config)
                                     .build()
                                     .unwrap()
                                     .run()
                                     .await
                                     .unwrap();
    assert_eq!(results, vec![json!("once"), json!("second")]);
}

#[tokio::test]
async fn step_that_never_advances_is_reported_as_stalled() {
    let err = Pipeline::builder().named_step("forgetful", |_ctx, _| {})
                                 .build()
                                 .unwrap()
                                 .run()
                                 .await
                                 .unwrap_err();
    assert!(matches!(err, EngineError::Stalled { ref step } if step == "forgetful"), "got {err:?}");
}
