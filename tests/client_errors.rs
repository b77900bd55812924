//! Client behaviour against servers that break the protocol.

mod common;

use axum::{Json, Router, http::StatusCode, routing::post};
use serde_json::json;
use talkilla_signal::{ProtocolError, SignalingClient};
use tokio::net::TcpListener;

async fn spawn_stub(router: Router) -> SignalingClient {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, router).await });
    SignalingClient::new(reqwest::Client::new(), &addr.to_string())
}

#[tokio::test(flavor = "multi_thread")]
async fn mismatched_nick_is_a_protocol_violation() {
    let client = spawn_stub(Router::new().route(
        "/signin",
        post(|| async { Json(json!({"nick": "someone-else"})) }),
    ))
    .await;

    let err = client.signin("user1").await.unwrap_err();
    match err {
        ProtocolError::NickMismatch { expected, actual } => {
            assert_eq!(expected, "user1");
            assert_eq!(actual, "someone-else");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn malformed_stream_body_is_reported() {
    let client = spawn_stub(Router::new().route("/stream", post(|| async { "not json" }))).await;

    let err = client.poll_stream("user1").await.unwrap_err();
    assert!(matches!(err, ProtocolError::Json { endpoint: "stream", .. }));
}

#[tokio::test(flavor = "multi_thread")]
async fn wrong_status_on_call_action_is_reported() {
    let client = spawn_stub(Router::new().route(
        "/calloffer",
        post(|| async { (StatusCode::OK, "ok") }),
    ))
    .await;

    let err = client.send_call_offer("a", "b").await.unwrap_err();
    assert!(matches!(
        err,
        ProtocolError::UnexpectedStatus {
            endpoint: "calloffer",
            expected: 204,
            actual: 200
        }
    ));
}

#[tokio::test(flavor = "multi_thread")]
async fn falsy_signout_body_is_rejected() {
    let client = spawn_stub(Router::new().route("/signout", post(|| async { Json(json!(false)) }))).await;

    let err = client.sign_out("user1").await.unwrap_err();
    assert!(matches!(err, ProtocolError::UnexpectedBody { endpoint: "signout", .. }));
}

#[tokio::test(flavor = "multi_thread")]
async fn connection_refused_is_a_transport_error() {
    let addr = common::closed_addr().await;
    let client = SignalingClient::new(reqwest::Client::new(), &addr.to_string());

    let err = client.signin("user1").await.unwrap_err();
    assert!(matches!(err, ProtocolError::Transport(_)));
}
