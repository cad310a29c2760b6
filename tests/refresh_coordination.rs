//! Concurrency and failure-path behavior of the request pipeline and the
//! refresh coordinator, driven deterministically on a single-threaded
//! executor with a scripted transport.

mod common;

use common::{
    MockTransport, RecordingEvents, expired_response, json_response, ready, seeded_store,
    token_response,
};
use futures::FutureExt;
use futures::channel::oneshot;
use futures::executor::{LocalPool, block_on};
use futures::future::join_all;
use futures::task::{LocalSpawnExt, noop_waker_ref};
use ingresso::app_lib::AppError;
use ingresso::features::auth::http::{
    ACCESS_DENIED_NOTICE, ApiClient, ApiRequest, AuthEvents, RATE_LIMIT_NOTICE,
    SERVER_FAULT_NOTICE, SESSION_EXPIRED_NOTICE,
};
use ingresso::features::auth::refresh::RefreshCoordinator;
use serde_json::json;
use std::cell::RefCell;
use std::future::Future;
use std::pin::pin;
use std::rc::Rc;
use std::task::{Context, Poll};

const DATA_PATH: &str = "/projects";
const REFRESH_PATH: &str = "/auth/refresh";

/// Transport for the expiry scenarios: `/projects` succeeds only with the
/// refreshed token, and the refresh response is parked behind a oneshot gate
/// so tests control when it resolves.
fn gated_transport(
    gate: Rc<RefCell<Option<oneshot::Receiver<()>>>>,
) -> MockTransport {
    MockTransport::new(move |request| match request.path.as_str() {
        REFRESH_PATH => {
            let receiver = gate
                .borrow_mut()
                .take()
                .expect("a second refresh call was issued");
            async move {
                receiver.await.expect("refresh gate dropped");
                Ok(token_response("tok2"))
            }
            .boxed_local()
        }
        DATA_PATH => {
            let fresh = request.bearer.as_deref() == Some("tok2");
            async move {
                if fresh {
                    Ok(json_response(200, json!({"success": true, "data": {"items": []}})))
                } else {
                    Ok(expired_response())
                }
            }
            .boxed_local()
        }
        other => panic!("unexpected path {other}"),
    })
}

fn client_with(
    transport: &MockTransport,
    store: &ingresso::features::auth::session::SessionStore,
    events: &Rc<RecordingEvents>,
) -> ApiClient<MockTransport> {
    ApiClient::new(
        transport.clone(),
        store.clone(),
        Rc::clone(events) as Rc<dyn AuthEvents>,
    )
}

fn start<'a>(
    coordinator: &'a RefreshCoordinator,
    transport: &MockTransport,
    store: &ingresso::features::auth::session::SessionStore,
    events: &Rc<RecordingEvents>,
) -> impl Future<Output = Result<String, AppError>> + 'a {
    coordinator.run(
        transport.clone(),
        store.clone(),
        Rc::clone(events) as Rc<dyn AuthEvents>,
    )
}

#[test]
fn concurrent_expiries_share_a_single_refresh() {
    let store = seeded_store("tok1");
    let events = Rc::new(RecordingEvents::default());
    let (sender, receiver) = oneshot::channel();
    let gate = Rc::new(RefCell::new(Some(receiver)));
    let transport = gated_transport(gate);
    let client = client_with(&transport, &store, &events);

    let mut pool = LocalPool::new();
    let spawner = pool.spawner();
    let mut handles = Vec::new();
    for _ in 0..3 {
        let client = client.clone();
        let handle = spawner
            .spawn_local_with_handle(async move { client.send(ApiRequest::get(DATA_PATH)).await })
            .expect("spawn failed");
        handles.push(handle);
    }

    // All three requests have hit the expired token and are parked on the
    // same in-flight refresh.
    pool.run_until_stalled();
    assert_eq!(transport.calls_to(REFRESH_PATH), 1);

    sender.send(()).expect("no refresh waiting");
    let results = pool.run_until(join_all(handles));

    assert_eq!(results.len(), 3);
    for result in results {
        let response = result.expect("replayed request failed");
        assert_eq!(response.status, 200);
    }
    assert_eq!(transport.calls_to(REFRESH_PATH), 1);
    assert_eq!(store.access_token().as_deref(), Some("tok2"));

    // Each request went out twice: once with the stale token, once replayed
    // with the shared refreshed token.
    let bearers = transport.bearers_for(DATA_PATH);
    assert_eq!(bearers.len(), 6);
    assert_eq!(
        bearers
            .iter()
            .filter(|bearer| bearer.as_deref() == Some("tok2"))
            .count(),
        3
    );
}

#[test]
fn refresh_failure_clears_session_and_redirects_once() {
    let store = seeded_store("tok1");
    let events = Rc::new(RecordingEvents::default());
    let (sender, receiver) = oneshot::channel();
    let gate = Rc::new(RefCell::new(Some(receiver)));

    let transport = MockTransport::new({
        let gate = Rc::clone(&gate);
        move |request| match request.path.as_str() {
            REFRESH_PATH => {
                let receiver = gate
                    .borrow_mut()
                    .take()
                    .expect("a second refresh call was issued");
                async move {
                    receiver.await.expect("refresh gate dropped");
                    Ok(json_response(
                        500,
                        json!({"success": false, "message": "refresh unavailable"}),
                    ))
                }
                .boxed_local()
            }
            _ => ready(expired_response()),
        }
    });
    let client = client_with(&transport, &store, &events);

    let mut pool = LocalPool::new();
    let spawner = pool.spawner();
    let mut handles = Vec::new();
    for _ in 0..3 {
        let client = client.clone();
        let handle = spawner
            .spawn_local_with_handle(async move { client.send(ApiRequest::get(DATA_PATH)).await })
            .expect("spawn failed");
        handles.push(handle);
    }

    pool.run_until_stalled();
    sender.send(()).expect("no refresh waiting");
    let results = pool.run_until(join_all(handles));

    for result in results {
        assert!(result.is_err());
    }
    let session = store.get();
    assert_eq!(session.user, None);
    assert_eq!(session.access_token, None);
    assert!(!session.is_authenticated);

    // One refresh, one redirect, one expired notice - no matter how many
    // requests were waiting on the outcome.
    assert_eq!(transport.calls_to(REFRESH_PATH), 1);
    assert_eq!(events.redirects.get(), 1);
    assert_eq!(events.notice_count(SESSION_EXPIRED_NOTICE), 1);
}

#[test]
fn completed_refresh_result_is_never_reused() {
    let store = seeded_store("tok1");
    let events = Rc::new(RecordingEvents::default());
    let transport = MockTransport::new(|request| match request.path.as_str() {
        REFRESH_PATH => ready(token_response("tok2")),
        DATA_PATH => {
            let fresh = request.bearer.as_deref() == Some("tok2");
            async move {
                if fresh {
                    Ok(json_response(200, json!({"success": true})))
                } else {
                    Ok(expired_response())
                }
            }
            .boxed_local()
        }
        other => panic!("unexpected path {other}"),
    });
    let client = client_with(&transport, &store, &events);

    let first = block_on(client.send(ApiRequest::get(DATA_PATH))).expect("first request failed");
    assert_eq!(first.status, 200);
    assert_eq!(transport.calls_to(REFRESH_PATH), 1);
    assert_eq!(
        transport.bearers_for(DATA_PATH),
        vec![Some("tok1".to_string()), Some("tok2".to_string())]
    );

    // Make the stored token stale again; the next expiry must issue a fresh
    // refresh call instead of replaying the completed result.
    store.set_access_token(Some("tok1".to_string()));
    let second = block_on(client.send(ApiRequest::get(DATA_PATH))).expect("second request failed");
    assert_eq!(second.status, 200);
    assert_eq!(transport.calls_to(REFRESH_PATH), 2);
}

#[test]
fn starter_wakeup_does_not_discard_a_newer_refresh() {
    let store = seeded_store("tok1");
    let events = Rc::new(RecordingEvents::default());
    let coordinator = RefreshCoordinator::new();

    let (first_gate, first_receiver) = oneshot::channel();
    let (second_gate, second_receiver) = oneshot::channel();
    let gates = Rc::new(RefCell::new(vec![
        ("tok3", second_receiver),
        ("tok2", first_receiver),
    ]));
    let transport = MockTransport::new(move |request| {
        assert_eq!(request.path, REFRESH_PATH);
        let (token, receiver) = gates
            .borrow_mut()
            .pop()
            .expect("a third refresh call was issued");
        async move {
            receiver.await.expect("refresh gate dropped");
            Ok(token_response(token))
        }
        .boxed_local()
    });

    // Interleaving is driven by hand: the starter must be woken last, after
    // a joiner has completed the shared result and a late caller has already
    // installed a second refresh in the slot.
    let mut cx = Context::from_waker(noop_waker_ref());

    let mut starter = pin!(start(&coordinator, &transport, &store, &events));
    assert!(starter.as_mut().poll(&mut cx).is_pending());
    assert_eq!(transport.calls_to(REFRESH_PATH), 1);

    let mut joiner = pin!(start(&coordinator, &transport, &store, &events));
    assert!(joiner.as_mut().poll(&mut cx).is_pending());
    assert_eq!(transport.calls_to(REFRESH_PATH), 1);

    first_gate.send(()).expect("no refresh waiting");

    // The joiner drives the shared refresh to completion; the completed
    // result is still parked in the slot because the starter has not run.
    match joiner.as_mut().poll(&mut cx) {
        Poll::Ready(result) => assert_eq!(result.expect("refresh failed"), "tok2"),
        Poll::Pending => panic!("joiner still pending after the gate opened"),
    }
    assert_eq!(store.access_token().as_deref(), Some("tok2"));

    // A caller arriving now must not reuse the completed result: it starts a
    // second refresh, replacing the stale entry.
    let mut late = pin!(start(&coordinator, &transport, &store, &events));
    assert!(late.as_mut().poll(&mut cx).is_pending());
    assert_eq!(transport.calls_to(REFRESH_PATH), 2);

    // The starter finally wakes; its cleanup must leave the newer in-flight
    // refresh in place.
    match starter.as_mut().poll(&mut cx) {
        Poll::Ready(result) => assert_eq!(result.expect("refresh failed"), "tok2"),
        Poll::Pending => panic!("starter still pending after the gate opened"),
    }

    // Anyone arriving next joins the second refresh instead of starting a
    // third.
    let mut tail = pin!(start(&coordinator, &transport, &store, &events));
    assert!(tail.as_mut().poll(&mut cx).is_pending());
    assert_eq!(transport.calls_to(REFRESH_PATH), 2);

    second_gate.send(()).expect("no refresh waiting");
    match late.as_mut().poll(&mut cx) {
        Poll::Ready(result) => assert_eq!(result.expect("refresh failed"), "tok3"),
        Poll::Pending => panic!("late caller still pending after the gate opened"),
    }
    match tail.as_mut().poll(&mut cx) {
        Poll::Ready(result) => assert_eq!(result.expect("refresh failed"), "tok3"),
        Poll::Pending => panic!("tail caller still pending after the gate opened"),
    }
    assert_eq!(store.access_token().as_deref(), Some("tok3"));
}

#[test]
fn unauthorized_without_expired_code_clears_session_without_refresh() {
    let store = seeded_store("tok1");
    let events = Rc::new(RecordingEvents::default());
    let transport = MockTransport::new(|_| {
        ready(json_response(
            401,
            json!({"success": false, "message": "Invalid token"}),
        ))
    });
    let client = client_with(&transport, &store, &events);

    let result = block_on(client.send(ApiRequest::get(DATA_PATH)));
    assert!(result.is_err());

    assert_eq!(transport.calls_to(REFRESH_PATH), 0);
    assert!(!store.get().is_authenticated);
    assert_eq!(events.redirects.get(), 1);
    assert!(events.notices.borrow().is_empty());
}

#[test]
fn forbidden_surfaces_notice_and_leaves_session_alone() {
    let store = seeded_store("tok1");
    let events = Rc::new(RecordingEvents::default());
    let transport = MockTransport::new(|_| {
        ready(json_response(
            403,
            json!({"success": false, "message": "Forbidden"}),
        ))
    });
    let client = client_with(&transport, &store, &events);

    let result = block_on(client.send(ApiRequest::get(DATA_PATH)));
    assert!(result.is_err());

    assert_eq!(events.notice_count(ACCESS_DENIED_NOTICE), 1);
    assert_eq!(events.redirects.get(), 0);
    let session = store.get();
    assert!(session.is_authenticated);
    assert_eq!(session.access_token.as_deref(), Some("tok1"));
}

#[test]
fn transient_failures_surface_notices_without_session_changes() {
    for (status, expected) in [
        (429u16, RATE_LIMIT_NOTICE),
        (500u16, SERVER_FAULT_NOTICE),
        (503u16, SERVER_FAULT_NOTICE),
    ] {
        let store = seeded_store("tok1");
        let events = Rc::new(RecordingEvents::default());
        let transport =
            MockTransport::new(move |_| ready(json_response(status, json!({"success": false}))));
        let client = client_with(&transport, &store, &events);

        let result = block_on(client.send(ApiRequest::get(DATA_PATH)));
        assert!(result.is_err());
        assert_eq!(events.notice_count(expected), 1, "status {status}");
        assert!(store.get().is_authenticated, "status {status}");
    }
}

#[test]
fn replayed_request_is_not_retried_a_second_time() {
    let store = seeded_store("tok1");
    let events = Rc::new(RecordingEvents::default());
    // The resource keeps reporting an expired token even after refresh.
    let transport = MockTransport::new(|request| match request.path.as_str() {
        REFRESH_PATH => ready(token_response("tok2")),
        _ => ready(expired_response()),
    });
    let client = client_with(&transport, &store, &events);

    let result = block_on(client.send(ApiRequest::get(DATA_PATH)));
    assert!(result.is_err());

    assert_eq!(transport.calls_to(REFRESH_PATH), 1);
    assert_eq!(transport.calls_to(DATA_PATH), 2);
}

#[test]
fn bearer_header_reflects_store_at_dispatch_time() {
    let store = seeded_store("tok1");
    let events = Rc::new(RecordingEvents::default());
    let transport = MockTransport::new(|_| ready(json_response(200, json!({"success": true}))));
    let client = client_with(&transport, &store, &events);

    block_on(client.send(ApiRequest::get(DATA_PATH))).expect("request failed");
    store.clear();
    block_on(client.send(ApiRequest::get(DATA_PATH))).expect("request failed");

    assert_eq!(
        transport.bearers_for(DATA_PATH),
        vec![Some("tok1".to_string()), None]
    );
    assert!(events.notices.borrow().is_empty());
}
