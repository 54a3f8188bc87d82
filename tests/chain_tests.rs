//! Chain execution tests: ordering, short-circuit on failure, panic capture
//! and wiring-time group resolution.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use serde_json::{json, Value};

use opdispatch::chain::{Chain, ChainStep, StepRegistry};
use opdispatch::error::DispatchError;

mod common;

fn append(tag: &'static str) -> Arc<dyn ChainStep> {
    Arc::new(move |data: Value| -> Result<Value, DispatchError> {
        let mut trail = data.as_array().cloned().unwrap_or_default();
        trail.push(json!(tag));
        Ok(Value::Array(trail))
    })
}

#[test]
fn steps_run_in_order_and_thread_their_data() {
    common::setup();
    let mut chain = Chain::new();
    chain.use_step(append("a")).use_step(append("b")).use_step(append("c"));

    let result = chain.exec(json!([])).unwrap();
    assert_eq!(result, json!(["a", "b", "c"]));
}

#[test]
fn first_failure_stops_the_chain() {
    common::setup();
    let later_ran = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&later_ran);

    let mut chain = Chain::new();
    chain
        .use_step(append("a"))
        .use_step(Arc::new(|_data: Value| -> Result<Value, DispatchError> {
            Err(DispatchError::handler("step_failed", None))
        }))
        .use_step(Arc::new(move |data: Value| -> Result<Value, DispatchError> {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(data)
        }));

    let err = chain.exec(json!([])).unwrap_err();
    assert!(matches!(err, DispatchError::Handler { ref code, .. } if code == "step_failed"));
    assert_eq!(later_ran.load(Ordering::SeqCst), 0);
}

#[test]
fn a_panicking_step_reports_as_its_failure() {
    common::setup();
    let mut chain = Chain::new();
    chain.use_step(Arc::new(|_data: Value| -> Result<Value, DispatchError> {
        panic!("bad step");
    }));

    let err = chain.exec(json!({})).unwrap_err();
    assert!(matches!(err, DispatchError::Handler { ref code, .. } if code == "chain_step_panicked"));
}

#[test]
fn groups_resolve_through_the_registry_at_wiring_time() {
    common::setup();
    let mut registry = StepRegistry::new();
    registry.insert("first", append("first"));
    registry.insert("second", append("second"));

    let mut chain = Chain::new();
    chain.use_group(&registry, ["first", "second"]).unwrap();
    assert_eq!(chain.len(), 2);
    assert_eq!(format!("{chain:?}"), "Chain { steps: 2 }");
    assert_eq!(chain.exec(json!([])).unwrap(), json!(["first", "second"]));
}

#[test]
fn unknown_group_member_fails_wiring_not_execution() {
    common::setup();
    let mut registry = StepRegistry::new();
    registry.insert("known", append("known"));

    let mut chain = Chain::new();
    let err = chain.use_group(&registry, ["known", "missing"]).unwrap_err();
    assert!(matches!(
        err,
        DispatchError::Handler { ref code, ref data }
            if code == "unknown_chain_step" && data == &Some(json!("missing"))
    ));
    // The known step was appended before the failure; the chain still runs.
    assert_eq!(chain.len(), 1);
    assert_eq!(chain.exec(json!([])).unwrap(), json!(["known"]));
}

#[test]
fn a_chain_is_reusable_across_executions() {
    common::setup();
    let mut chain = Chain::new();
    chain.use_step(append("x"));

    assert_eq!(chain.exec(json!([])).unwrap(), json!(["x"]));
    assert_eq!(chain.exec(json!(["seed"])).unwrap(), json!(["seed", "x"]));
}
