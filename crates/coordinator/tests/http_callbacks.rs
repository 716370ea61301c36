//! Integration tests for the HTTP participant callback client, backed by
//! wiremock participant endpoints.

use std::time::Duration;

use common::{LRA_CONTEXT_HEADER, LraId};
use coordinator::{CallbackError, CallbackOutcome, HttpParticipantClient, ParticipantClient};
use store::{LraStatus, ParticipantStatus};
use wiremock::matchers::{body_string, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client() -> HttpParticipantClient {
    HttpParticipantClient::new(Duration::from_secs(2)).unwrap()
}

#[tokio::test]
async fn test_complete_carries_context_header_and_body() {
    let server = MockServer::start().await;
    let lra = LraId::new();
    Mock::given(method("PUT"))
        .and(path("/orders/complete"))
        .and(header(LRA_CONTEXT_HEADER, lra.to_string()))
        .and(body_string("order-42"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let url = format!("{}/orders/complete", server.uri());
    let outcome = client().complete(&url, lra, Some("order-42")).await.unwrap();
    assert_eq!(outcome, CallbackOutcome::Done);
}

#[tokio::test]
async fn test_accepted_and_gone_responses_map_to_outcomes() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/slow/compensate"))
        .respond_with(ResponseTemplate::new(202))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/done/compensate"))
        .respond_with(ResponseTemplate::new(410))
        .mount(&server)
        .await;

    let lra = LraId::new();
    let c = client();
    let slow = c
        .compensate(&format!("{}/slow/compensate", server.uri()), lra, None)
        .await
        .unwrap();
    assert_eq!(slow, CallbackOutcome::Accepted);

    let done = c
        .compensate(&format!("{}/done/compensate", server.uri()), lra, None)
        .await
        .unwrap();
    assert_eq!(done, CallbackOutcome::Gone);
}

#[tokio::test]
async fn test_error_status_surfaces_the_code() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let url = format!("{}/broken/complete", server.uri());
    let err = client().complete(&url, LraId::new(), None).await.unwrap_err();
    assert!(matches!(err, CallbackError::Status(500)));
}

#[tokio::test]
async fn test_slow_participant_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
        .mount(&server)
        .await;

    let c = HttpParticipantClient::new(Duration::from_millis(100)).unwrap();
    let url = format!("{}/stuck/complete", server.uri());
    let err = c.complete(&url, LraId::new(), None).await.unwrap_err();
    assert!(matches!(err, CallbackError::Timeout(_)));
}

#[tokio::test]
async fn test_unreachable_participant_is_a_transport_error() {
    // nothing listens on this port
    let err = client()
        .complete("http://127.0.0.1:9/complete", LraId::new(), None)
        .await
        .unwrap_err();
    assert!(matches!(err, CallbackError::Transport(_)));
}

#[tokio::test]
async fn test_status_query_parses_reported_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/orders/status"))
        .respond_with(ResponseTemplate::new(200).set_body_string("Completed"))
        .mount(&server)
        .await;

    let url = format!("{}/orders/status", server.uri());
    let status = client().status(&url, LraId::new()).await.unwrap();
    assert_eq!(status, ParticipantStatus::Completed);
}

#[tokio::test]
async fn test_status_query_rejects_garbage_body() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not-a-status"))
        .mount(&server)
        .await;

    let url = format!("{}/orders/status", server.uri());
    let err = client().status(&url, LraId::new()).await.unwrap_err();
    assert!(matches!(err, CallbackError::Transport(_)));
}

#[tokio::test]
async fn test_forget_tolerates_gone() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/orders/forget"))
        .respond_with(ResponseTemplate::new(410))
        .expect(1)
        .mount(&server)
        .await;

    let url = format!("{}/orders/forget", server.uri());
    client().forget(&url, LraId::new()).await.unwrap();
}

#[tokio::test]
async fn test_after_lra_delivers_final_status() {
    let server = MockServer::start().await;
    let lra = LraId::new();
    Mock::given(method("PUT"))
        .and(path("/orders/after"))
        .and(header(LRA_CONTEXT_HEADER, lra.to_string()))
        .and(body_string("Closed"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let url = format!("{}/orders/after", server.uri());
    client().after_lra(&url, lra, LraStatus::Closed).await.unwrap();
}
