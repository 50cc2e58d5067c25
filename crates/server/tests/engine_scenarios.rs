//! End-to-end engine runs against a mocked device service.

use std::sync::Arc;

use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use stepflow_handlers::actions::{ObjectPatch, TaskCreate, Webhook};
use stepflow_handlers::conditions::{
    ManualAdvance, ObjectValue, TaskDone, TimeAbsolute, TimeElapsed,
};
use stepflow_handlers::responses::Notification;
use stepflow_handlers::HandlerRegistry;
use stepflow_model::{now_ms, Process};
use stepflow_server::engine::tick_all;
use stepflow_server::error::AppError;
use stepflow_server::store::{MemoryBackend, RuntimeStore};

/// Built-in handlers with the device handlers pointed at the mock server.
fn registry_for(server: &MockServer) -> Arc<HandlerRegistry> {
    let client = reqwest::Client::new();
    let port = server.address().port();
    let mut registry = HandlerRegistry::new();

    registry.register_action(ObjectPatch::with_port(client.clone(), port));
    registry.register_action(TaskCreate);
    registry.register_action(Webhook::new(client.clone()));
    registry.register_condition(TimeAbsolute);
    registry.register_condition(TimeElapsed);
    registry.register_condition(ObjectValue::with_port(client, port));
    registry.register_condition(ManualAdvance);
    registry.register_condition(TaskDone);
    registry.register_response(Notification);

    Arc::new(registry)
}

async fn store_with(registry: Arc<HandlerRegistry>) -> RuntimeStore {
    let store = RuntimeStore::new(
        Arc::new(MemoryBackend::default()),
        "stepflow",
        true,
        registry,
    );
    store.startup_read().await.unwrap();
    store
}

fn mash_process() -> Process {
    serde_json::from_value(json!({
        "id": "mash",
        "title": "Mash",
        "steps": [
            {
                "id": "heat",
                "title": "Heat to mash temperature",
                "actions": [{
                    "id": "set-temp",
                    "type": "ObjectPatch",
                    "opts": {
                        "service": "127.0.0.1",
                        "object": "setpoint",
                        "data": {"setting": 66.0, "enabled": true},
                    },
                }],
                "conditions": [
                    {
                        "id": "after-start",
                        "type": "TimeAbsolute",
                        "opts": {"time": now_ms() - 10_000},
                    },
                    {
                        "id": "settle",
                        "type": "TimeElapsed",
                        "opts": {"duration": 2_000},
                    },
                    {
                        "id": "at-temp",
                        "type": "ObjectValue",
                        "opts": {
                            "service": "127.0.0.1",
                            "object": "sensor",
                            "key": "value",
                            "operator": "ge",
                            "value": 66.0,
                        },
                    },
                ],
            },
            {
                "id": "confirm",
                "title": "Confirm iodine test",
                "conditions": [{"id": "operator-ok", "type": "ManualAdvance", "opts": {}}],
            },
            {
                "id": "done",
                "title": "Mash complete",
            },
        ],
    }))
    .unwrap()
}

#[tokio::test]
async fn runtime_walks_the_process_end_to_end() {
    let server = MockServer::start().await;
    let registry = registry_for(&server);
    let store = store_with(registry.clone()).await;

    Mock::given(method("GET"))
        .and(path("/127.0.0.1/objects/setpoint"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "setpoint",
            "data": {"setting": 20.0, "enabled": false},
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/127.0.0.1/objects/setpoint"))
        .and(body_partial_json(json!({
            "data": {"setting": 66.0, "enabled": true},
        })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    // the read path evaluates every condition (no short-circuit), so the
    // sensor must answer from the start; it stays below target until the
    // settle time has passed.
    let sensor_cold = Mock::given(method("GET"))
        .and(path("/127.0.0.1/objects/sensor"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "sensor",
            "data": {"value": 20.0},
        })))
        .mount_as_scoped(&server)
        .await;

    let runtime = store.create(&mash_process(), None).await.unwrap();

    // first tick: the step is entered and the setpoint patched, but the
    // settle time has not elapsed. TimeElapsed short-circuits the chain,
    // so the tick never consults the sensor (the read below does).
    assert!(tick_all(&store, &registry).await.unwrap());
    {
        let view = store.read(&runtime.id).await.unwrap();
        assert_eq!(view.runtime.results.len(), 1);
        assert!(view.runtime.results[0].start.is_some());
        assert!(view.runtime.results[0].end.is_none());
        assert!(view.runtime.results[0].logs.is_empty());
    }

    // entered and holding: nothing changes
    assert!(!tick_all(&store, &registry).await.unwrap());

    // pretend the settle time passed, and bring the sensor to temperature
    // (mocks match in mount order, so the cold response has to go first)
    {
        let mut state = store.lock_ready().await.unwrap();
        let stored = state.docs.get_mut(&runtime.id).unwrap();
        let start = stored.results[0].start.unwrap();
        stored.results[0].start = Some(start - 3_000);
    }
    drop(sensor_cold);
    Mock::given(method("GET"))
        .and(path("/127.0.0.1/objects/sensor"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "sensor",
            "data": {"value": 66.4},
        })))
        .mount(&server)
        .await;

    // second effective tick: all three conditions hold, on to "confirm"
    assert!(tick_all(&store, &registry).await.unwrap());
    {
        let view = store.read(&runtime.id).await.unwrap();
        assert_eq!(view.runtime.results.len(), 2);
        assert_eq!(view.runtime.results[1].step, "confirm");
        assert!(view.runtime.results[0].end.is_some());
        // ManualAdvance never satisfies on its own
        assert_eq!(view.conditions, vec![false]);
    }

    // the entry tick for "confirm" changes the document, then it holds
    assert!(tick_all(&store, &registry).await.unwrap());
    assert!(!tick_all(&store, &registry).await.unwrap());

    // the operator advances past the manual gate
    let advanced = store.advance(&runtime.id, None).await.unwrap();
    assert_eq!(advanced.results.len(), 3);
    assert_eq!(advanced.results[2].step, "done");

    // "done" has no conditions: entering completes it and ends the runtime
    assert!(tick_all(&store, &registry).await.unwrap());
    let view = store.read(&runtime.id).await.unwrap();
    assert!(view.runtime.finished());
    assert!(view.conditions.is_empty());

    assert!(!tick_all(&store, &registry).await.unwrap());
}

#[tokio::test]
async fn failed_actions_are_logged_and_the_step_still_enters() {
    let server = MockServer::start().await;
    let registry = registry_for(&server);
    let store = store_with(registry.clone()).await;

    // no mocks mounted: the patch's GET answers 404
    Mock::given(method("GET"))
        .and(path("/127.0.0.1/objects/setpoint"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let process: Process = serde_json::from_value(json!({
        "id": "p1",
        "title": "Test",
        "steps": [{
            "id": "one",
            "title": "First",
            "actions": [
                {
                    "id": "patch",
                    "type": "ObjectPatch",
                    "opts": {"service": "127.0.0.1", "object": "setpoint", "data": {}},
                },
                {
                    "id": "task",
                    "type": "TaskCreate",
                    "opts": {"ref": "check", "title": "Check the kettle"},
                },
            ],
            "conditions": [{"id": "wait", "type": "ManualAdvance", "opts": {}}],
        }],
    }))
    .unwrap();

    let runtime = store.create(&process, None).await.unwrap();
    assert!(tick_all(&store, &registry).await.unwrap());

    let view = store.read(&runtime.id).await.unwrap();
    let result = &view.runtime.results[0];
    assert!(result.start.is_some());
    assert_eq!(result.logs.len(), 1);
    assert_eq!(result.logs[0].ref_id, "patch");
    assert_eq!(result.logs[0].source, "ObjectPatch");

    // the later action still ran
    assert_eq!(view.runtime.tasks.len(), 1);
    assert_eq!(view.runtime.tasks[0].ref_id, "check");
}

#[tokio::test]
async fn task_gates_open_once_every_matching_task_is_done() {
    let server = MockServer::start().await;
    let registry = registry_for(&server);
    let store = store_with(registry.clone()).await;

    let process: Process = serde_json::from_value(json!({
        "id": "p1",
        "title": "Test",
        "steps": [
            {
                "id": "prep",
                "title": "Preparation",
                "actions": [
                    {"id": "t1", "type": "TaskCreate", "opts": {"ref": "clean", "title": "Clean the mash tun"}},
                    {"id": "t2", "type": "TaskCreate", "opts": {"ref": "clean", "title": "Clean the kettle"}},
                ],
                "conditions": [{"id": "cleaned", "type": "TaskDone", "opts": {"ref": "clean"}}],
            },
            {"id": "brew", "title": "Brew"},
        ],
    }))
    .unwrap();

    let runtime = store.create(&process, None).await.unwrap();
    assert!(tick_all(&store, &registry).await.unwrap());
    assert!(!tick_all(&store, &registry).await.unwrap());

    // one of two done: the gate stays closed
    store.task_update(&runtime.id, "clean", true).await.unwrap();
    {
        let mut state = store.lock_ready().await.unwrap();
        let stored = state.docs.get_mut(&runtime.id).unwrap();
        stored.tasks[1].done = false;
    }
    assert!(!tick_all(&store, &registry).await.unwrap());

    store.task_update(&runtime.id, "clean", true).await.unwrap();
    assert!(tick_all(&store, &registry).await.unwrap());

    let view = store.read(&runtime.id).await.unwrap();
    assert_eq!(view.runtime.results.last().unwrap().step, "brew");
}

#[tokio::test]
async fn stop_and_remove_lifecycle() {
    let server = MockServer::start().await;
    let registry = registry_for(&server);
    let store = store_with(registry.clone()).await;

    let process: Process = serde_json::from_value(json!({
        "id": "p1",
        "title": "Test",
        "steps": [{
            "id": "one",
            "title": "First",
            "conditions": [{"id": "wait", "type": "ManualAdvance", "opts": {}}],
        }],
    }))
    .unwrap();

    let runtime = store.create(&process, None).await.unwrap();
    tick_all(&store, &registry).await.unwrap();

    let stopped = store.stop(&runtime.id).await.unwrap();
    assert_eq!(stopped.results[0].end, stopped.end);
    let again = store.stop(&runtime.id).await.unwrap();
    assert_eq!(stopped.end, again.end);

    // stopped runtimes are invisible to the engine
    assert!(!tick_all(&store, &registry).await.unwrap());

    store.remove(&runtime.id).await.unwrap();
    assert!(matches!(
        store.read(&runtime.id).await.unwrap_err(),
        AppError::NotFound(_)
    ));
    assert!(matches!(
        store.stop(&runtime.id).await.unwrap_err(),
        AppError::NotFound(_)
    ));
}
