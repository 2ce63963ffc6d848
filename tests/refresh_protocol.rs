//! The client's 401 handling against a scripted server.

use axum::{
    Json, Router,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde_json::{Value, json};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use stockwatch::client::{ClientError, Session, WatchlistApi};
use stockwatch::{AuthenticatedClient, TokenStore};
use tokio::net::TcpListener;

const GOOD_REFRESH: &str = "good-refresh";

#[derive(Default)]
struct Mock {
    list_calls: AtomicUsize,
    refresh_calls: AtomicUsize,
    login_calls: AtomicUsize,
    reject_everything: AtomicBool,
    valid_access: Mutex<String>,
    seen_auth: Mutex<Vec<Option<String>>>,
}

fn unauthorized(message: &str) -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({"error": {"code": "UNAUTHORIZED", "message": message}})),
    )
        .into_response()
}

async fn list(State(mock): State<Arc<Mock>>, headers: HeaderMap) -> Response {
    mock.list_calls.fetch_add(1, Ordering::SeqCst);
    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    mock.seen_auth.lock().unwrap().push(auth.clone());

    let valid = format!("Bearer {}", mock.valid_access.lock().unwrap());
    if mock.reject_everything.load(Ordering::SeqCst) || auth.as_deref() != Some(valid.as_str()) {
        return unauthorized("Could not validate credentials");
    }
    Json(json!([])).into_response()
}

async fn refresh(State(mock): State<Arc<Mock>>, Json(body): Json<Value>) -> Response {
    let n = mock.refresh_calls.fetch_add(1, Ordering::SeqCst) + 1;
    // widen the window for concurrent callers
    tokio::time::sleep(Duration::from_millis(50)).await;
    if body["refresh_token"] != GOOD_REFRESH {
        return unauthorized("Invalid token");
    }
    let access = format!("fresh-{n}");
    *mock.valid_access.lock().unwrap() = access.clone();
    Json(json!({
        "access_token": access,
        "refresh_token": GOOD_REFRESH,
        "token_type": "bearer"
    }))
    .into_response()
}

async fn login(State(mock): State<Arc<Mock>>) -> Response {
    mock.login_calls.fetch_add(1, Ordering::SeqCst);
    unauthorized("Incorrect email or password")
}

async fn spawn_mock(valid_access: &str) -> (Arc<Mock>, String) {
    let mock = Arc::new(Mock::default());
    *mock.valid_access.lock().unwrap() = valid_access.to_string();
    let app = Router::new()
        .route("/api/v1/watchlists", get(list))
        .route("/api/v1/auth/refresh", post(refresh))
        .route("/api/v1/auth/login", post(login))
        .with_state(mock.clone());
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.ok();
    });
    (mock, format!("http://{addr}/api/v1"))
}

fn client_with(base: &str, access: &str, refresh: &str) -> (AuthenticatedClient, Arc<AtomicUsize>) {
    let store = TokenStore::in_memory();
    store.replace(Session::bearer(access, refresh));
    let redirects = Arc::new(AtomicUsize::new(0));
    let counter = redirects.clone();
    store.subscribe(move || {
        counter.fetch_add(1, Ordering::SeqCst);
    });
    (AuthenticatedClient::new(base, store).unwrap(), redirects)
}

#[tokio::test]
async fn valid_token_is_sent_as_bearer() {
    let (mock, base) = spawn_mock("current").await;
    let (client, _) = client_with(&base, "current", GOOD_REFRESH);

    WatchlistApi::new(client).list().await.unwrap();

    assert_eq!(mock.list_calls.load(Ordering::SeqCst), 1);
    assert_eq!(mock.refresh_calls.load(Ordering::SeqCst), 0);
    assert_eq!(
        mock.seen_auth.lock().unwrap().as_slice(),
        [Some("Bearer current".to_string())]
    );
}

#[tokio::test]
async fn expired_token_refreshes_once_and_retries_once() {
    let (mock, base) = spawn_mock("not-issued-yet").await;
    let (client, redirects) = client_with(&base, "stale", GOOD_REFRESH);

    let lists = WatchlistApi::new(client.clone()).list().await.unwrap();

    assert!(lists.is_empty());
    assert_eq!(mock.refresh_calls.load(Ordering::SeqCst), 1);
    assert_eq!(mock.list_calls.load(Ordering::SeqCst), 2);
    assert_eq!(client.store().access_token().as_deref(), Some("fresh-1"));
    assert_eq!(redirects.load(Ordering::SeqCst), 0);
    assert_eq!(
        mock.seen_auth.lock().unwrap().last().cloned().flatten().as_deref(),
        Some("Bearer fresh-1")
    );
}

#[tokio::test]
async fn failed_refresh_clears_session_and_surfaces_original_error() {
    let (mock, base) = spawn_mock("whatever").await;
    let (client, redirects) = client_with(&base, "stale", "revoked-refresh");

    let err = WatchlistApi::new(client.clone()).list().await.unwrap_err();

    assert!(err.is_unauthorized());
    assert_eq!(err.display_message(), "Could not validate credentials");
    assert_eq!(mock.refresh_calls.load(Ordering::SeqCst), 1);
    assert_eq!(mock.list_calls.load(Ordering::SeqCst), 1);
    assert_eq!(client.store().session(), None);
    assert_eq!(redirects.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn missing_refresh_token_skips_refresh() {
    let (mock, base) = spawn_mock("whatever").await;
    let (client, redirects) = client_with(&base, "stale", "");

    let err = WatchlistApi::new(client.clone()).list().await.unwrap_err();

    assert!(matches!(err, ClientError::Unauthorized { .. }));
    assert_eq!(mock.refresh_calls.load(Ordering::SeqCst), 0);
    assert!(!client.store().is_authenticated());
    assert_eq!(redirects.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn retried_request_is_not_retried_again() {
    let (mock, base) = spawn_mock("whatever").await;
    mock.reject_everything.store(true, Ordering::SeqCst);
    let (client, redirects) = client_with(&base, "stale", GOOD_REFRESH);

    let err = WatchlistApi::new(client.clone()).list().await.unwrap_err();

    assert!(err.is_unauthorized());
    assert_eq!(mock.refresh_calls.load(Ordering::SeqCst), 1);
    assert_eq!(mock.list_calls.load(Ordering::SeqCst), 2);
    // the refresh itself worked, so the session stays
    assert_eq!(client.store().access_token().as_deref(), Some("fresh-1"));
    assert_eq!(redirects.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn concurrent_401s_share_one_refresh() {
    let (mock, base) = spawn_mock("not-issued-yet").await;
    let (client, _) = client_with(&base, "stale", GOOD_REFRESH);
    let api = WatchlistApi::new(client.clone());

    let calls = (0..5).map(|_| {
        let api = api.clone();
        tokio::spawn(async move { api.list().await })
    });
    for handle in futures::future::join_all(calls).await {
        handle.unwrap().unwrap();
    }

    assert_eq!(mock.refresh_calls.load(Ordering::SeqCst), 1);
    // at most one replay each
    assert!(mock.list_calls.load(Ordering::SeqCst) <= 10);
    assert_eq!(client.store().access_token().as_deref(), Some("fresh-1"));
}

#[tokio::test]
async fn public_requests_never_refresh() {
    let (mock, base) = spawn_mock("whatever").await;
    let (client, redirects) = client_with(&base, "stale", GOOD_REFRESH);

    let err = stockwatch::client::AuthApi::new(client.clone())
        .login(&stockwatch::types::LoginRequest {
            email: "a@b.co".into(),
            password: "wrong-password".into(),
        })
        .await
        .unwrap_err();

    assert_eq!(err.display_message(), "Incorrect email or password");
    assert_eq!(mock.login_calls.load(Ordering::SeqCst), 1);
    assert_eq!(mock.refresh_calls.load(Ordering::SeqCst), 0);
    assert!(client.store().is_authenticated());
    assert_eq!(redirects.load(Ordering::SeqCst), 0);
}
