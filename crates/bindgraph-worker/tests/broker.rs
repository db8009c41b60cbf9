use std::time::Duration;

use bindgraph_eval::PropertyPath;
use bindgraph_worker::{BrokerConfig, BrokerError, EngineHandle, ForestMirror, Request, Response};
use serde_json::{Value as JsonValue, json};

const WAIT: Duration = Duration::from_secs(5);

fn p(text: &str) -> PropertyPath {
    PropertyPath::parse(text).unwrap()
}

fn init() -> Request {
    serde_json::from_value(json!({
        "type": "init",
        "currentPageId": "main",
        "queries": {
            "Api1": {"values": {"data": null}, "actions": ["run"]}
        },
        "pages": {"main": {
            "Input1": {"values": {"text": "a"}},
            "Text1": {"values": {"value": "{{Input1.text.toUpperCase()}}"}, "evaluablePaths": ["value"]},
            "Button1": {"values": {"onClick": "{{Api1.run(Text1.value)}}"}}
        }}
    }))
    .unwrap()
}

fn update(id: &str, path: &str, value: JsonValue) -> Request {
    Request::UpdateEntity {
        id: id.into(),
        path: p(path),
        value,
    }
}

fn expect_update(handle: &EngineHandle) -> Response {
    let response = handle.recv_timeout(WAIT).unwrap();
    assert!(
        matches!(response, Response::EvaluationUpdate { .. }),
        "unexpected {response:?}"
    );
    response
}

fn assert_quiet(handle: &EngineHandle) {
    match handle.recv_timeout(Duration::from_millis(100)) {
        Err(BrokerError::Timeout) => {}
        other => panic!("expected no further response, got {other:?}"),
    }
}

#[test]
fn init_delivers_the_whole_forest_as_inserts() {
    let handle = EngineHandle::spawn(BrokerConfig::immediate()).unwrap();
    handle.send(init()).unwrap();
    let response = expect_update(&handle);
    let mut mirror = ForestMirror::new();
    mirror.apply(&response).unwrap();
    assert_eq!(mirror.value("Text1", &p("value")), Some(&json!("A")));
    assert_eq!(mirror.value("Api1", &p("data")), Some(&json!(null)));
    assert_quiet(&handle);
}

#[test]
fn explicit_batch_yields_one_update() {
    let handle = EngineHandle::spawn(BrokerConfig::immediate()).unwrap();
    handle
        .send(Request::Batch {
            requests: vec![
                init(),
                update("Input1", "text", json!("b")),
                update("Input1", "text", json!("c")),
            ],
        })
        .unwrap();
    let mut mirror = ForestMirror::new();
    mirror.apply(&expect_update(&handle)).unwrap();
    assert_eq!(mirror.value("Text1", &p("value")), Some(&json!("C")));
    assert_quiet(&handle);
}

#[test]
fn requests_within_the_flush_delay_are_coalesced() {
    let config = BrokerConfig::interactive().with_flush_delay(Duration::from_millis(250));
    let handle = EngineHandle::spawn(config).unwrap();
    handle.send(init()).unwrap();
    for text in ["x", "xy", "xyz"] {
        handle.send(update("Input1", "text", json!(text))).unwrap();
    }
    let mut mirror = ForestMirror::new();
    mirror.apply(&expect_update(&handle)).unwrap();
    assert_eq!(mirror.value("Text1", &p("value")), Some(&json!("XYZ")));
    assert_quiet(&handle);
}

#[test]
fn mirror_tracks_every_delivered_diff() {
    let handle = EngineHandle::spawn(BrokerConfig::immediate()).unwrap();
    let mut mirror = ForestMirror::new();
    handle.send(init()).unwrap();
    mirror.apply(&expect_update(&handle)).unwrap();

    let edits = [
        update("Text1", "value", json!("{{Input1.text.missing()}}")),
        update("Input1", "text", json!("q")),
        update("Text1", "value", json!("{{Input1.text + '!'}}")),
        Request::RemoveEntity { id: "Input1".into() },
    ];
    for edit in edits {
        handle.send(edit).unwrap();
        mirror.apply(&expect_update(&handle)).unwrap();
    }
    assert!(mirror.forest().get("Input1").is_none());
    assert_eq!(mirror.value("Text1", &p("value")), Some(&json!(null)));
    assert_eq!(
        mirror.errors_at("Text1", "value"),
        vec!["ReferenceError: Input1 is not defined".to_string()]
    );
}

#[test]
fn events_report_actions_without_an_evaluation_update() {
    let handle = EngineHandle::spawn(BrokerConfig::immediate()).unwrap();
    handle.send(init()).unwrap();
    expect_update(&handle);

    handle
        .send(Request::EventExecution {
            id: "Button1".into(),
            event_name: "onClick".into(),
        })
        .unwrap();
    match handle.recv_timeout(WAIT).unwrap() {
        Response::ActionExecution { executions, errors } => {
            assert!(errors.is_empty());
            assert_eq!(executions.len(), 1);
            assert_eq!(executions[0].entity_id, "Api1");
            assert_eq!(executions[0].action_name, "run");
            assert_eq!(executions[0].args, vec![json!("A")]);
        }
        other => panic!("unexpected {other:?}"),
    }
    assert_quiet(&handle);
}

#[test]
fn failed_requests_report_errors_and_the_thread_survives() {
    let handle = EngineHandle::spawn(BrokerConfig::immediate()).unwrap();
    handle
        .send(Request::Batch {
            requests: vec![init(), update("Ghost", "x", json!(1))],
        })
        .unwrap();
    match handle.recv_timeout(WAIT).unwrap() {
        Response::Error { message } => assert_eq!(message, "unknown entity 'Ghost'"),
        other => panic!("unexpected {other:?}"),
    }
    // The successful init still produces its update after the batch.
    expect_update(&handle);

    handle.send(update("Input1", "text", json!("z"))).unwrap();
    let mut mirror = ForestMirror::new();
    mirror.apply(&expect_update(&handle)).unwrap();
    assert_eq!(mirror.value("Text1", &p("value")), Some(&json!("Z")));
}

#[test]
fn shutdown_stops_the_thread() {
    let handle = EngineHandle::spawn(BrokerConfig::immediate()).unwrap();
    handle.send(init()).unwrap();
    expect_update(&handle);
    handle.shutdown().unwrap();

    let handle = EngineHandle::spawn(BrokerConfig::immediate()).unwrap();
    handle.send(Request::Shutdown).unwrap();
    assert!(matches!(
        handle.recv_timeout(WAIT),
        Err(BrokerError::Disconnected)
    ));
}

#[test]
fn dropping_the_handle_joins_the_thread() {
    let handle = EngineHandle::spawn(BrokerConfig::immediate()).unwrap();
    handle.send(init()).unwrap();
    drop(handle);
}
