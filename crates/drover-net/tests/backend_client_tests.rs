//! Integration tests for the backend client against a mock server.

use drover::submit::{GatewayError, SubmitGateway, SubmitOutcome};
use drover_net::{BackendClient, NetworkError};
use wiremock::matchers::{body_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn client_for(server: &MockServer) -> BackendClient {
    BackendClient::builder(server.uri())
        .bearer_auth("test-token")
        .submit_path("/animals")
        .build()
        .expect("client builds")
}

// ============================================================================
// Reference data
// ============================================================================

#[tokio::test]
async fn options_round_trip() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/reference/medication"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
            { "id": "m-1", "label": "Penicillin", "stock": 14 },
            { "id": "m-2", "label": "Ivermectin", "stock": 0 }
        ])))
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    let options = client.options("medication", &[]).await.unwrap();

    assert_eq!(options.len(), 2);
    assert_eq!(options[0].id, "m-1");
    assert_eq!(options[0].label, "Penicillin");
    assert_eq!(options[0].extra["stock"], "14");
}

#[tokio::test]
async fn options_forwards_query_params() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/reference/pen"))
        .and(query_param("farm_id", "f-3"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
            { "id": "p-1", "label": "Pen 1" }
        ])))
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    let params = vec![("farm_id".to_string(), "f-3".to_string())];
    let options = client.options("pen", &params).await.unwrap();
    assert_eq!(options.len(), 1);
}

#[tokio::test]
async fn options_tolerates_empty_and_unknown_kinds() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/reference/assignee"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
        .mount(&server)
        .await;
    // No mock for /reference/nonexistent: wiremock answers 404

    let client = client_for(&server).await;
    assert!(client.options("assignee", &[]).await.unwrap().is_empty());
    assert!(client.options("nonexistent", &[]).await.unwrap().is_empty());
}

// ============================================================================
// Uniqueness
// ============================================================================

#[tokio::test]
async fn unique_reports_existing_and_free_values() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/unique/animal_code"))
        .and(query_param("value", "PIG-001"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "exists": true })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/unique/animal_code"))
        .and(query_param("value", "PIG-002"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "exists": false })))
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    assert!(client.unique("animal_code", "PIG-001").await.unwrap());
    assert!(!client.unique("animal_code", "PIG-002").await.unwrap());
}

#[tokio::test]
async fn unique_surfaces_server_errors() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/unique/animal_code"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    assert!(matches!(
        client.unique("animal_code", "PIG-001").await,
        Err(NetworkError::HttpStatus { status: 503, .. })
    ));
}

// ============================================================================
// Submission
// ============================================================================

#[tokio::test]
async fn submit_parses_accepted_envelope() {
    let server = MockServer::start().await;
    let payload = serde_json::json!({ "code": "PIG-001", "weight": 32 });
    Mock::given(method("POST"))
        .and(path("/animals"))
        .and(body_json(&payload))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "status": "ok",
            "entity": { "id": "animal-7", "label": "PIG-001" }
        })))
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    match client.submit_record(payload).await.unwrap() {
        SubmitOutcome::Accepted { entity } => {
            assert_eq!(entity.id, "animal-7");
            assert_eq!(entity.label.as_deref(), Some("PIG-001"));
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
}

#[tokio::test]
async fn submit_parses_business_rule_envelope() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/animals"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "status": "business_rule",
            "details": [
                { "code": "medication_stock", "message": "Penicillin is out of stock" },
                { "code": "pen_capacity", "message": "Pen 3 is full" }
            ]
        })))
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    match client.submit_record(serde_json::json!({})).await.unwrap() {
        SubmitOutcome::BusinessRule { details } => {
            assert_eq!(details.len(), 2);
            assert_eq!(details[0].code, "medication_stock");
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
}

#[tokio::test]
async fn submit_maps_error_status_through_gateway_trait() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/animals"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    let gateway = client.as_submit_gateway();
    match gateway.submit(serde_json::json!({})).await {
        Err(GatewayError::Status { status, message }) => {
            assert_eq!(status, 500);
            assert_eq!(message.as_deref(), Some("boom"));
        }
        other => panic!("unexpected result: {other:?}"),
    }
}

#[tokio::test]
async fn submit_rejects_unreadable_envelope() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/animals"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    let gateway = client.as_submit_gateway();
    assert!(matches!(
        gateway.submit(serde_json::json!({})).await,
        Err(GatewayError::InvalidResponse(_))
    ));
}
