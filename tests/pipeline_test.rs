//! End-to-end pipeline test over a recording mock host: capture a request,
//! resolve its encoding, execute an edit through the control router, and
//! tear the rule down on terminal events.

use async_trait::async_trait;
use request_editor_cli::Result;
use request_editor_cli::capture::{
    BodySource, CaptureListener, EncodingResolver, FormField, HeadersSent, LifecycleManager,
    RequestInitiated, TerminalKind,
};
use request_editor_cli::codec::registry;
use request_editor_cli::host::BrowserHost;
use request_editor_cli::rules::{HeaderOperation, RuleUpdate};
use request_editor_cli::server::protocol::ControlMessage;
use request_editor_cli::server::router::ControlRouter;
use request_editor_cli::snapshot::{HeaderEdit, RequestSnapshot};
use request_editor_cli::store::{SessionStore, TabId};
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, PartialEq)]
enum HostCall {
    Rules(RuleUpdate),
    Navigate(TabId, String),
    Submit(TabId),
    Inject(TabId),
    ForwardTest(TabId, serde_json::Value),
}

#[derive(Default)]
struct MockHost {
    calls: Mutex<Vec<HostCall>>,
    submit_error: Mutex<Option<String>>,
}

impl MockHost {
    fn calls(&self) -> Vec<HostCall> {
        self.calls.lock().unwrap().clone()
    }

    fn set_submit_error(&self, error: &str) {
        *self.submit_error.lock().unwrap() = Some(error.to_string());
    }
}

#[async_trait]
impl BrowserHost for MockHost {
    async fn update_session_rules(&self, update: RuleUpdate) -> Result<()> {
        self.calls.lock().unwrap().push(HostCall::Rules(update));
        Ok(())
    }

    async fn navigate(&self, tab: TabId, url: &str) -> Result<()> {
        self.calls
            .lock()
            .unwrap()
            .push(HostCall::Navigate(tab, url.to_string()));
        Ok(())
    }

    async fn submit_body(&self, tab: TabId, _snapshot: &RequestSnapshot) -> Result<Option<String>> {
        self.calls.lock().unwrap().push(HostCall::Submit(tab));
        Ok(self.submit_error.lock().unwrap().clone())
    }

    async fn inject_script(&self, tab: TabId, _script: &str) -> Result<()> {
        self.calls.lock().unwrap().push(HostCall::Inject(tab));
        Ok(())
    }

    async fn forward_test(&self, tab: TabId, payload: &serde_json::Value) -> Result<()> {
        self.calls
            .lock()
            .unwrap()
            .push(HostCall::ForwardTest(tab, payload.clone()));
        Ok(())
    }
}

struct Pipeline {
    store: Arc<SessionStore>,
    host: Arc<MockHost>,
    listener: CaptureListener,
    resolver: EncodingResolver,
    lifecycle: LifecycleManager,
    router: ControlRouter,
}

fn pipeline() -> Pipeline {
    let store = Arc::new(SessionStore::new());
    let host = Arc::new(MockHost::default());
    Pipeline {
        listener: CaptureListener::new(store.clone(), registry()),
        resolver: EncodingResolver::new(store.clone(), registry()),
        lifecycle: LifecycleManager::new(store.clone(), host.clone()),
        router: ControlRouter::new(store.clone(), host.clone(), registry()),
        store,
        host,
    }
}

async fn capture_form_post(p: &Pipeline, tab: TabId) {
    p.listener
        .on_request_initiated(RequestInitiated {
            tab,
            url: "https://example.com/submit".into(),
            method: "POST".into(),
            body: BodySource::FormData(vec![
                FormField::new("a", vec![b"1".to_vec()]),
                FormField::new("b", vec![b"x y".to_vec()]),
            ]),
        })
        .await;
}

#[tokio::test]
async fn capture_then_resolve_refines_only_enctype() {
    let p = pipeline();
    capture_form_post(&p, 1).await;

    p.resolver
        .on_headers_sent(HeadersSent {
            tab: 1,
            headers: vec![("Content-Type".into(), "application/json; charset=utf-8".into())],
        })
        .await;

    let snap = p.store.snapshot(1).await.unwrap();
    assert_eq!(snap.body.enctype, "json");
    assert_eq!(snap.body.content, "a=1&b=x+y");
    assert!(snap.headers.is_empty());
}

#[tokio::test]
async fn execute_post_activates_rule_then_submits() {
    let p = pipeline();
    capture_form_post(&p, 1).await;

    let mut snapshot = p.store.snapshot(1).await.unwrap();
    snapshot.body.enctype = "json".into();
    snapshot.body.content = r#"{"a":1}"#.into();
    snapshot.headers.push(HeaderEdit::new("x-edited", "yes"));

    p.router
        .dispatch(ControlMessage::Execute {
            tab_id: 1,
            data: snapshot,
        })
        .await
        .unwrap();

    let calls = p.host.calls();
    assert_eq!(calls.len(), 2);

    // Rule activation strictly precedes replay.
    let HostCall::Rules(update) = &calls[0] else {
        panic!("expected rule update first, got {:?}", calls[0]);
    };
    assert_eq!(update.remove_rule_ids, vec![1]);

    let rules = update.add_rules.as_ref().unwrap();
    let headers = &rules[0].action.request_headers;
    assert_eq!(headers.len(), 2);
    assert!(headers.iter().any(|d| d.header == "x-edited"
        && d.operation == HeaderOperation::Set
        && d.value.as_deref() == Some("yes")));
    let synthetic: Vec<_> = headers.iter().filter(|d| d.header == "content-type").collect();
    assert_eq!(synthetic.len(), 1);
    assert_eq!(synthetic[0].value.as_deref(), Some("application/json"));

    assert_eq!(calls[1], HostCall::Submit(1));
}

#[tokio::test]
async fn execute_get_navigates_without_submission() {
    let p = pipeline();
    let snapshot = RequestSnapshot::captured(
        "https://example.com/page?q=1",
        "GET",
        "application/x-www-form-urlencoded",
        String::new(),
    );

    p.router
        .dispatch(ControlMessage::Execute {
            tab_id: 2,
            data: snapshot,
        })
        .await
        .unwrap();

    let calls = p.host.calls();
    assert!(matches!(&calls[0], HostCall::Rules(u) if u.add_rules.is_none()));
    assert_eq!(
        calls[1],
        HostCall::Navigate(2, "https://example.com/page?q=1".into())
    );
}

#[tokio::test]
async fn execute_unknown_encoding_short_circuits() {
    let p = pipeline();
    capture_form_post(&p, 1).await;

    let mut snapshot = p.store.snapshot(1).await.unwrap();
    snapshot.body.enctype = "application/grpc".into();

    let err = p
        .router
        .dispatch(ControlMessage::Execute {
            tab_id: 1,
            data: snapshot,
        })
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        request_editor_cli::EditorError::UnsupportedEncoding(_)
    ));
    // No rule activation, no replay, snapshot untouched.
    assert!(p.host.calls().is_empty());
    assert_eq!(p.store.snapshot(1).await.unwrap().body.content, "a=1&b=x+y");
}

#[tokio::test]
async fn submission_failure_is_forwarded_to_peer() {
    let p = pipeline();
    p.host.set_submit_error("Failed to submit form");

    let (tx, mut rx) = tokio::sync::mpsc::channel(8);
    p.store.attach_peer(1, tx).await;

    let snapshot = RequestSnapshot::captured(
        "https://example.com/submit",
        "POST",
        "application/x-www-form-urlencoded",
        "a=1".into(),
    );
    p.router
        .dispatch(ControlMessage::Execute {
            tab_id: 1,
            data: snapshot,
        })
        .await
        .unwrap();

    let notification = rx.recv().await.unwrap();
    let value: serde_json::Value = serde_json::from_str(&notification).unwrap();
    assert_eq!(value["type"], "error");
    assert_eq!(value["data"], "Failed to submit form");
}

#[tokio::test]
async fn terminal_events_always_clear_the_rule() {
    let p = pipeline();

    for kind in [TerminalKind::Redirect, TerminalKind::Completed, TerminalKind::Errored] {
        p.lifecycle.on_terminal(7, kind).await;
    }

    let calls = p.host.calls();
    assert_eq!(calls.len(), 3);
    for call in calls {
        assert_eq!(call, HostCall::Rules(RuleUpdate::removal(7)));
    }
}

#[tokio::test]
async fn tab_removal_drops_session_and_rule() {
    let p = pipeline();
    capture_form_post(&p, 3).await;
    assert_eq!(p.store.len().await, 1);

    p.lifecycle.on_tab_removed(3).await;

    assert!(p.store.is_empty().await);
    assert_eq!(p.host.calls(), vec![HostCall::Rules(RuleUpdate::removal(3))]);

    // Stray events after cleanup are no-ops.
    p.resolver
        .on_headers_sent(HeadersSent {
            tab: 3,
            headers: vec![("content-type".into(), "application/json".into())],
        })
        .await;
    assert!(p.store.snapshot(3).await.is_none());

    p.router
        .dispatch(ControlMessage::Load { tab_id: 3 })
        .await
        .unwrap();
}

#[tokio::test]
async fn load_forwards_snapshot_to_peer() {
    let p = pipeline();
    capture_form_post(&p, 1).await;

    let (tx, mut rx) = tokio::sync::mpsc::channel(8);
    p.store.attach_peer(1, tx).await;

    p.router
        .dispatch(ControlMessage::Load { tab_id: 1 })
        .await
        .unwrap();

    let notification = rx.recv().await.unwrap();
    let value: serde_json::Value = serde_json::from_str(&notification).unwrap();
    assert_eq!(value["type"], "load");
    assert_eq!(value["data"]["url"], "https://example.com/submit");
    assert_eq!(value["data"]["body"]["content"], "a=1&b=x+y");
    assert!(value["data"]["capturedAt"].is_string());
}

#[tokio::test]
async fn load_without_peer_is_silent() {
    let p = pipeline();
    capture_form_post(&p, 1).await;

    // No peer attached: best-effort no-op, not an error.
    p.router
        .dispatch(ControlMessage::Load { tab_id: 1 })
        .await
        .unwrap();
    assert!(p.host.calls().is_empty());
}

#[tokio::test]
async fn test_command_start_injects_harness_first() {
    let p = pipeline();
    let payload = serde_json::json!({"action": "start", "script": "echo"});

    p.router
        .dispatch(ControlMessage::Test {
            tab_id: 5,
            data: payload.clone(),
        })
        .await
        .unwrap();

    let calls = p.host.calls();
    assert_eq!(calls[0], HostCall::Inject(5));
    assert_eq!(calls[1], HostCall::ForwardTest(5, payload));
}

#[tokio::test]
async fn test_command_without_start_only_forwards() {
    let p = pipeline();
    let payload = serde_json::json!({"action": "step", "index": 2});

    p.router
        .dispatch(ControlMessage::Test {
            tab_id: 5,
            data: payload.clone(),
        })
        .await
        .unwrap();

    assert_eq!(p.host.calls(), vec![HostCall::ForwardTest(5, payload)]);
}

#[tokio::test]
async fn test_delivery_is_acknowledged_to_peer() {
    let p = pipeline();
    let (tx, mut rx) = tokio::sync::mpsc::channel(8);
    p.store.attach_peer(5, tx).await;

    let payload = serde_json::json!({"action": "step", "index": 2});
    p.router
        .dispatch(ControlMessage::Test {
            tab_id: 5,
            data: payload.clone(),
        })
        .await
        .unwrap();

    let value: serde_json::Value = serde_json::from_str(&rx.recv().await.unwrap()).unwrap();
    assert_eq!(value["type"], "test");
    assert_eq!(value["data"], payload);
}

#[tokio::test]
async fn sessions_are_isolated() {
    let p = pipeline();
    capture_form_post(&p, 1).await;
    capture_form_post(&p, 2).await;

    let mut snapshot = p.store.snapshot(1).await.unwrap();
    snapshot.body.enctype = "application/grpc".into();
    let _ = p
        .router
        .dispatch(ControlMessage::Execute {
            tab_id: 1,
            data: snapshot,
        })
        .await;

    // Tab 2 is unaffected by tab 1's failed execute.
    assert!(p.store.snapshot(2).await.is_some());
    p.lifecycle.on_tab_removed(1).await;
    assert!(p.store.snapshot(2).await.is_some());
}
