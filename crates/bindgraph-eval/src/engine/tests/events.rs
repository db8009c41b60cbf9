use bindgraph_common::EntityKind;
use serde_json::{Value as JsonValue, json};

use crate::engine::EvaluationEngine;
use crate::entity::EntityConfig;
use crate::error::EngineError;
use crate::interpreter::ActionExecution;
use crate::test_utils::{code_widget, engine_with, path, widget};

fn api(id: &str) -> (EntityKind, EntityConfig) {
    (
        EntityKind::Query,
        EntityConfig::new(id, json!({"data": null}))
            .with_action("run")
            .with_action("reset"),
    )
}

fn engine_for(on_click: JsonValue) -> EvaluationEngine {
    engine_with(vec![
        api("Api1"),
        api("Api2"),
        widget("Input1", json!({"text": "hi"}), &[]),
        code_widget("Text1", json!({"value": "{{Input1.text.toUpperCase()}}"})),
        widget("Button1", json!({"onClick": on_click}), &[]),
    ])
}

fn run(entity: &str, action: &str, args: Vec<JsonValue>) -> ActionExecution {
    ActionExecution {
        entity_id: entity.into(),
        action_name: action.into(),
        args,
    }
}

#[test]
fn handler_records_actions_in_call_order() {
    let mut engine = engine_for(json!("{{Api1.run(Input1.text, 3); Api2.reset()}}"));
    let outcome = engine.execute_event("Button1", &path("onClick")).unwrap();
    assert!(outcome.errors.is_empty());
    assert_eq!(
        outcome.executions,
        vec![run("Api1", "run", vec![json!("hi"), json!(3)]), run("Api2", "reset", vec![])]
    );
}

#[test]
fn handler_reads_evaluated_values() {
    let mut engine = engine_for(json!("{{Api1.run(Text1.value)}}"));
    let outcome = engine.execute_event("Button1", &path("onClick")).unwrap();
    assert_eq!(outcome.executions, vec![run("Api1", "run", vec![json!("HI")])]);
}

#[test]
fn handler_statements_can_branch_and_declare() {
    let mut engine = engine_for(json!(
        "{{ const t = Input1.text; if (t.length > 1) { Api1.run(t + '!') } else { Api2.run() } }}"
    ));
    let outcome = engine.execute_event("Button1", &path("onClick")).unwrap();
    assert_eq!(outcome.executions, vec![run("Api1", "run", vec![json!("hi!")])]);
}

#[test]
fn handler_arrays_run_in_order() {
    let mut engine = engine_for(json!(["{{Api2.run()}}", "{{Api1.run()}}"]));
    let outcome = engine.execute_event("Button1", &path("onClick")).unwrap();
    assert_eq!(
        outcome.executions,
        vec![run("Api2", "run", vec![]), run("Api1", "run", vec![])]
    );
}

#[test]
fn failing_handler_keeps_earlier_executions() {
    let mut engine = engine_for(json!(["{{Api1.run(); nope(); Api1.reset()}}", "{{Api2.run()}}"]));
    let outcome = engine.execute_event("Button1", &path("onClick")).unwrap();
    assert_eq!(
        outcome.executions,
        vec![run("Api1", "run", vec![]), run("Api2", "run", vec![])]
    );
    assert_eq!(outcome.errors.len(), 1);
    let error = &outcome.errors[0];
    assert_eq!(error.to_string(), "ReferenceError: nope is not defined");
    let context = error.context.as_ref().unwrap();
    assert_eq!(context.entity.as_deref(), Some("Button1"));
    assert_eq!(context.path.as_deref(), Some("onClick"));
}

#[test]
fn unparsable_handler_is_a_syntax_error() {
    let mut engine = engine_for(json!("{{Api1.run(}}"));
    let outcome = engine.execute_event("Button1", &path("onClick")).unwrap();
    assert!(outcome.executions.is_empty());
    assert_eq!(outcome.errors.len(), 1);
    assert!(outcome.errors[0].to_string().starts_with("SyntaxError"));
}

#[test]
fn missing_handler_does_nothing() {
    let mut engine = engine_for(json!(null));
    let outcome = engine.execute_event("Button1", &path("onHover")).unwrap();
    assert!(outcome.executions.is_empty());
    assert!(outcome.errors.is_empty());
}

#[test]
fn events_do_not_invalidate_the_forest() {
    let mut engine = engine_for(json!("{{Api1.run()}}"));
    engine.evaluate();
    let generation = engine.generation();
    engine.execute_event("Button1", &path("onClick")).unwrap();
    assert_eq!(engine.generation(), generation);
}

#[test]
fn unknown_entity_is_an_error() {
    let mut engine = engine_for(json!("{{Api1.run()}}"));
    assert_eq!(
        engine.execute_event("Ghost", &path("onClick")).unwrap_err(),
        EngineError::UnknownEntity("Ghost".into())
    );
}
