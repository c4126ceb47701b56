//! HTTP tests for the session endpoints, run against an in-memory store.

use std::sync::Arc;
use std::time::Duration;

use api::{router, AppState};
use axum::body::Body;
use axum::http::{Method, Request, Response, StatusCode};
use axum::Router;
use engine::mock::MockStore;
use engine::{Agent, MemoryStore, WorkflowDocument, WorkflowStore};
use queue::QueueConfig;
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn setup() -> (Router, Arc<MemoryStore>, WorkflowDocument) {
    let mut doc = WorkflowDocument::new(Uuid::new_v4(), "http");
    doc.agents.push(Agent::named("Agent1"));
    doc.start_agent = "Agent1".into();

    let store = Arc::new(MemoryStore::new());
    store.insert(doc.clone()).await;

    let dyn_store: Arc<dyn WorkflowStore> = store.clone();
    let app = router(AppState::new(dyn_store, QueueConfig::with_debounce_ms(50)));
    (app, store, doc)
}

fn mock_app(store: &Arc<MockStore>) -> Router {
    let dyn_store: Arc<dyn WorkflowStore> = store.clone();
    // Long enough that only an explicit flush ever writes.
    router(AppState::new(dyn_store, QueueConfig::with_debounce_ms(60_000)))
}

async fn send(app: &Router, method: Method, uri: String, body: Option<Value>) -> Response<Body> {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    app.clone().oneshot(request).await.unwrap()
}

async fn body_json(response: Response<Body>) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn session_uri(id: Uuid) -> String {
    format!("/api/v1/workflows/{id}/session")
}

fn actions_uri(id: Uuid) -> String {
    format!("/api/v1/workflows/{id}/session/actions")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[tokio::test]
async fn open_edit_and_close_persists_the_document() {
    let (app, store, doc) = setup().await;

    let response = send(&app, Method::POST, session_uri(doc.id), None).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let json = body_json(response).await;
    assert_eq!(json["view"]["document"]["startAgent"], "Agent1");
    assert_eq!(json["view"]["isLive"], false);

    let response = send(
        &app,
        Method::POST,
        actions_uri(doc.id),
        Some(json!({ "type": "add_tool", "tool": { "name": "lookup" } })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["view"]["document"]["tools"][0]["name"], "lookup");
    assert_eq!(json["view"]["pendingChanges"], true);
    assert_eq!(json["view"]["canUndo"], true);
    assert_eq!(json["view"]["selection"], json!({ "kind": "tool", "name": "lookup" }));

    let response = send(&app, Method::DELETE, session_uri(doc.id), None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["view"]["pendingChanges"], false);
    assert_eq!(json["saveError"], Value::Null);

    let saved = store.get(doc.id).await.unwrap();
    assert_eq!(saved.tools.len(), 1);

    let response = send(&app, Method::GET, session_uri(doc.id), None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn reopening_returns_the_existing_session() {
    let (app, _store, doc) = setup().await;

    send(&app, Method::POST, session_uri(doc.id), None).await;
    send(&app, Method::POST, actions_uri(doc.id), Some(json!({ "type": "add_prompt" }))).await;

    let response = send(&app, Method::POST, session_uri(doc.id), None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["view"]["document"]["prompts"][0]["name"], "New prompt");
}

#[tokio::test]
async fn unknown_workflow_or_session_is_not_found() {
    let (app, _store, _doc) = setup().await;
    let missing = Uuid::new_v4();

    let response = send(&app, Method::POST, session_uri(missing), None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = send(&app, Method::POST, actions_uri(missing), Some(json!({ "type": "undo" }))).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn malformed_action_is_rejected() {
    let (app, _store, doc) = setup().await;
    send(&app, Method::POST, session_uri(doc.id), None).await;

    let response = send(
        &app,
        Method::POST,
        actions_uri(doc.id),
        Some(json!({ "type": "launch_rockets" })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn publish_makes_the_session_read_only() {
    let (app, store, doc) = setup().await;
    send(&app, Method::POST, session_uri(doc.id), None).await;

    let response = send(&app, Method::POST, format!("/api/v1/workflows/{}/publish", doc.id), None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["view"]["isLive"], true);
    assert_eq!(store.published(doc.project_id).await, Some(doc.id));

    let response = send(
        &app,
        Method::POST,
        actions_uri(doc.id),
        Some(json!({ "type": "delete_agent", "name": "Agent1" })),
    )
    .await;
    let json = body_json(response).await;
    assert_eq!(json["view"]["document"]["agents"][0]["name"], "Agent1");
    assert_eq!(json["view"]["canUndo"], false);
}

#[tokio::test]
async fn issues_lists_dangling_mentions() {
    let (app, _store, doc) = setup().await;
    send(&app, Method::POST, session_uri(doc.id), None).await;
    send(
        &app,
        Method::POST,
        actions_uri(doc.id),
        Some(json!({
            "type": "update_agent",
            "name": "Agent1",
            "agent": { "instructions": "Ask [@agent:Ghost](#mention)." }
        })),
    )
    .await;

    let response = send(&app, Method::GET, format!("/api/v1/workflows/{}/session/issues", doc.id), None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let issues = body_json(response).await;
    assert_eq!(issues.as_array().map(Vec::len), Some(1));
    assert!(issues[0].as_str().unwrap().contains("Ghost"));
}

#[tokio::test]
async fn catalog_tools_are_accepted_on_open() {
    let (app, _store, doc) = setup().await;

    let response = send(
        &app,
        Method::POST,
        session_uri(doc.id),
        Some(json!({ "catalog": [{ "name": "web_search" }] })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let json = body_json(response).await;
    // Catalog tools are listed for the host but never become part of the document.
    assert_eq!(json["view"]["document"]["tools"], json!([]));
    assert_eq!(json["view"]["availableTools"][0]["name"], "web_search");
    assert_eq!(json["view"]["availableTools"][0]["origin"], "catalog");

    let response = send(
        &app,
        Method::POST,
        actions_uri(doc.id),
        Some(json!({ "type": "add_tool", "tool": { "name": "lookup" } })),
    )
    .await;
    let tools = body_json(response).await["view"]["availableTools"].clone();
    assert_eq!(tools[0], json!({
        "name": "lookup",
        "description": "",
        "parameters": { "type": "object", "properties": {}, "required": [] },
        "mockTool": true,
        "autoSubmitMockedResponse": true,
        "isLibrary": false,
        "origin": "workflow"
    }));
    assert_eq!(tools[1]["origin"], "catalog");
}

#[tokio::test]
async fn session_bookkeeping_cannot_be_sent_by_a_host() {
    let (app, store, doc) = setup().await;
    send(&app, Method::POST, session_uri(doc.id), None).await;
    let response = send(&app, Method::POST, format!("/api/v1/workflows/{}/publish", doc.id), None).await;
    assert_eq!(response.status(), StatusCode::OK);

    let mut unlocked = doc.clone();
    unlocked.id = Uuid::new_v4();
    let forged = [
        json!({ "type": "restore", "document": doc, "published_workflow_id": null }),
        json!({ "type": "restore", "document": unlocked, "published_workflow_id": null }),
        json!({ "type": "save_succeeded", "generation": 0, "at": "2000-01-01T00:00:00Z" }),
        json!({ "type": "save_started", "generation": 0 }),
        json!({ "type": "set_published_workflow_id", "workflow_id": Uuid::new_v4() }),
    ];
    for body in forged {
        let response = send(&app, Method::POST, actions_uri(doc.id), Some(body)).await;
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    let response = send(
        &app,
        Method::POST,
        actions_uri(doc.id),
        Some(json!({ "type": "add_tool", "tool": { "name": "injected" } })),
    )
    .await;
    let json = body_json(response).await;
    assert_eq!(json["view"]["isLive"], true);
    assert_eq!(json["view"]["document"]["_id"], json!(doc.id));

    send(&app, Method::DELETE, session_uri(doc.id), None).await;
    assert!(store.get(doc.id).await.unwrap().tools.is_empty());
    assert_eq!(store.published(doc.project_id).await, Some(doc.id));
}

#[tokio::test]
async fn rename_workflow_is_persisted_on_close() {
    let (app, store, doc) = setup().await;
    send(&app, Method::POST, session_uri(doc.id), None).await;

    let response = send(
        &app,
        Method::POST,
        actions_uri(doc.id),
        Some(json!({ "type": "rename_workflow", "name": "Support flow" })),
    )
    .await;
    assert_eq!(body_json(response).await["view"]["document"]["name"], "Support flow");

    send(&app, Method::DELETE, session_uri(doc.id), None).await;
    assert_eq!(store.get(doc.id).await.unwrap().name, "Support flow");
}

#[tokio::test]
async fn reopen_during_close_waits_for_the_final_write() {
    let mut doc = WorkflowDocument::new(Uuid::new_v4(), "closing");
    doc.agents.push(Agent::named("Agent1"));
    doc.start_agent = "Agent1".into();
    let id = doc.id;
    let store = Arc::new(MockStore::serving(doc));
    let app = mock_app(&store);

    send(&app, Method::POST, session_uri(id), None).await;
    send(
        &app,
        Method::POST,
        actions_uri(id),
        Some(json!({ "type": "add_tool", "tool": { "name": "x" } })),
    )
    .await;
    store.hold_writes();

    let closing = tokio::spawn({
        let app = app.clone();
        async move { send(&app, Method::DELETE, session_uri(id), None).await }
    });
    tokio::time::timeout(Duration::from_secs(5), async {
        while store.save_count() == 0 {
            tokio::task::yield_now().await;
        }
    })
    .await
    .expect("close should start the final write");

    let reopening = tokio::spawn({
        let app = app.clone();
        async move { send(&app, Method::POST, session_uri(id), None).await }
    });
    for _ in 0..50 {
        tokio::task::yield_now().await;
    }
    assert!(!reopening.is_finished(), "reopen must wait for the closing write");

    store.release_writes();
    let closed = closing.await.unwrap();
    assert_eq!(closed.status(), StatusCode::OK);

    let reopened = reopening.await.unwrap();
    assert_eq!(reopened.status(), StatusCode::CREATED);
    let json = body_json(reopened).await;
    assert_eq!(json["view"]["document"]["tools"][0]["name"], "x");

    assert_eq!(store.save_count(), 1);
    assert_eq!(store.max_in_flight(), 1);
}

#[tokio::test]
async fn failed_open_leaves_no_session_behind() {
    let (app, _store, _doc) = setup().await;
    let missing = Uuid::new_v4();

    let response = send(&app, Method::POST, session_uri(missing), None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    for method in [Method::GET, Method::DELETE] {
        let response = send(&app, method, session_uri(missing), None).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
