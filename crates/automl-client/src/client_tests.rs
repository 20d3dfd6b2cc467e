//! Tests for the Vertex AI client against a mock REST server.

use std::time::Duration;

use automl_models::{FractionSplit, ObjectDetectionTaskInputs};
use serde_json::json;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::client::{VertexClient, VertexConfig};
use crate::error::VertexError;
use crate::retry::RetryConfig;
use crate::token_cache::TokenSource;
use crate::training::ObjectDetectionTrainingJob;
use crate::types::{AutomaticResources, ImageInstance, PredictionParameters, BOUNDING_BOX_IMPORT_SCHEMA};

// =============================================================================
// Test Helpers
// =============================================================================

const PARENT: &str = "/v1/projects/test-project/locations/us-central1";

fn test_config(server: &MockServer) -> VertexConfig {
    let mut config = VertexConfig::new("test-project", "us-central1");
    config.api_endpoint = format!("{}/v1", server.uri());
    config.timeout = Duration::from_secs(5);
    config.connect_timeout = Duration::from_secs(2);
    config.poll_interval = Duration::from_millis(5);
    config.operation_timeout = Duration::from_secs(5);
    config.retry = RetryConfig {
        max_retries: 2,
        base_delay_ms: 1,
        max_delay_ms: 5,
    };
    config
}

fn test_client(server: &MockServer) -> VertexClient {
    VertexClient::with_token_source(test_config(server), TokenSource::Static("test-token".into()))
        .unwrap()
}

fn full_name(suffix: &str) -> String {
    format!("projects/test-project/locations/us-central1/{}", suffix)
}

// =============================================================================
// Error Mapping Tests
// =============================================================================

#[test]
fn test_error_from_http_status() {
    assert!(matches!(
        VertexError::from_http_status(400, "bad"),
        VertexError::InvalidArgument(_)
    ));
    assert!(matches!(
        VertexError::from_http_status(403, "denied"),
        VertexError::PermissionDenied(_)
    ));
    assert!(matches!(
        VertexError::from_http_status(404, "missing"),
        VertexError::NotFound(_)
    ));
    assert!(matches!(
        VertexError::from_http_status(409, "exists"),
        VertexError::AlreadyExists(_)
    ));
    assert!(matches!(
        VertexError::from_http_status(503, "unavailable"),
        VertexError::ServerError(503, _)
    ));
    assert!(matches!(
        VertexError::from_http_status(418, "teapot"),
        VertexError::RequestFailed(_)
    ));
}

#[test]
fn test_error_retryability() {
    assert!(VertexError::from_http_status(429, "slow down").is_retryable());
    assert!(VertexError::from_http_status(500, "boom").is_retryable());
    assert!(!VertexError::from_http_status(400, "bad").is_retryable());
    assert!(!VertexError::from_http_status(404, "missing").is_retryable());
    assert_eq!(
        VertexError::from_http_status_with_retry_after(429, "slow", Some(3000)).retry_after_ms(),
        Some(3000)
    );
    assert_eq!(VertexError::from_http_status(429, "slow").retry_after_ms(), Some(1000));
}

// =============================================================================
// Dataset Tests
// =============================================================================

#[tokio::test]
async fn test_create_dataset_and_wait_polls_operation() {
    let server = MockServer::start().await;
    let op_name = full_name("datasets/42/operations/1");

    Mock::given(method("POST"))
        .and(path(format!("{}/datasets", PARENT)))
        .and(header("authorization", "Bearer test-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": op_name,
            "done": false
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path(format!("/v1/{}", op_name)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": op_name,
            "done": false
        })))
        .up_to_n_times(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path(format!("/v1/{}", op_name)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": op_name,
            "done": true,
            "response": {
                "name": full_name("datasets/42"),
                "displayName": "salads",
                "metadataSchemaUri": crate::types::IMAGE_METADATA_SCHEMA
            }
        })))
        .mount(&server)
        .await;

    let dataset = test_client(&server)
        .create_dataset_and_wait("salads")
        .await
        .unwrap();
    assert_eq!(dataset.name.as_deref(), Some(full_name("datasets/42").as_str()));
    assert_eq!(dataset.display_name, "salads");

    let requests = server.received_requests().await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(body["displayName"], "salads");
    assert_eq!(body["metadataSchemaUri"], crate::types::IMAGE_METADATA_SCHEMA);
    assert_eq!(requests.len(), 3);
}

#[tokio::test]
async fn test_import_data_sends_manifest_uris() {
    let server = MockServer::start().await;
    let op_name = full_name("datasets/42/operations/2");

    Mock::given(method("POST"))
        .and(path(format!("{}/datasets/42:import", PARENT)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": op_name,
            "done": true,
            "response": {}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let uris = vec!["gs://bucket/salads.csv".to_string()];
    test_client(&server)
        .import_data_and_wait("42", &uris, BOUNDING_BOX_IMPORT_SCHEMA)
        .await
        .unwrap();

    let requests = server.received_requests().await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(
        body["importConfigs"][0]["gcsSource"]["uris"][0],
        "gs://bucket/salads.csv"
    );
    assert_eq!(
        body["importConfigs"][0]["importSchemaUri"],
        BOUNDING_BOX_IMPORT_SCHEMA
    );
}

#[tokio::test]
async fn test_import_data_requires_uris() {
    let server = MockServer::start().await;
    let result = test_client(&server)
        .import_data("42", &[], BOUNDING_BOX_IMPORT_SCHEMA)
        .await;
    assert!(matches!(result, Err(VertexError::InvalidArgument(_))));
}

#[tokio::test]
async fn test_failed_operation_is_reported() {
    let server = MockServer::start().await;
    let op_name = full_name("datasets/42/operations/3");

    Mock::given(method("POST"))
        .and(path(format!("{}/datasets/42:import", PARENT)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": op_name,
            "done": true,
            "error": { "code": 3, "message": "manifest has no valid rows" }
        })))
        .mount(&server)
        .await;

    let uris = vec!["gs://bucket/bad.csv".to_string()];
    let err = test_client(&server)
        .import_data_and_wait("42", &uris, BOUNDING_BOX_IMPORT_SCHEMA)
        .await
        .unwrap_err();

    match err {
        VertexError::OperationFailed { code, message, .. } => {
            assert_eq!(code, 3);
            assert!(message.contains("no valid rows"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_delete_missing_dataset_is_ok() {
    let server = MockServer::start().await;

    Mock::given(method("DELETE"))
        .and(path(format!("{}/datasets/42", PARENT)))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "error": { "code": 404, "status": "NOT_FOUND" }
        })))
        .expect(1)
        .mount(&server)
        .await;

    test_client(&server).delete_dataset("42").await.unwrap();
}

// =============================================================================
// Transport Tests
// =============================================================================

#[tokio::test]
async fn test_server_errors_are_retried() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(format!("{}/datasets/42", PARENT)))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path(format!("{}/datasets/42", PARENT)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": full_name("datasets/42"),
            "displayName": "salads",
            "metadataSchemaUri": "schema"
        })))
        .mount(&server)
        .await;

    let dataset = test_client(&server).get_dataset("42").await.unwrap();
    assert_eq!(dataset.display_name, "salads");
    assert_eq!(server.received_requests().await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_client_errors_are_not_retried() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(format!("{}/datasets/42", PARENT)))
        .respond_with(ResponseTemplate::new(403).set_body_string("no access"))
        .expect(1)
        .mount(&server)
        .await;

    let err = test_client(&server).get_dataset("42").await.unwrap_err();
    assert!(matches!(err, VertexError::PermissionDenied(_)));
}

#[tokio::test]
async fn test_malformed_body_with_multibyte_text_is_invalid_response() {
    let server = MockServer::start().await;

    // The 200th byte falls inside a two-byte character.
    let body = format!("{}é{}", "x".repeat(199), "y".repeat(50));
    Mock::given(method("GET"))
        .and(path(format!("{}/datasets/42", PARENT)))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(&server)
        .await;

    match test_client(&server).get_dataset("42").await {
        Err(VertexError::InvalidResponse(msg)) => {
            assert!(msg.contains("datasets/42"));
            assert!(msg.contains(&format!("{}é", "x".repeat(199))));
            assert!(!msg.contains("yy"));
        }
        other => panic!("unexpected result: {:?}", other),
    }
}

#[tokio::test]
async fn test_expired_token_is_refreshed_once() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(format!("{}/models/7", PARENT)))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error": {
                "code": 401,
                "status": "UNAUTHENTICATED",
                "details": [{ "reason": "ACCESS_TOKEN_EXPIRED" }]
            }
        })))
        .up_to_n_times(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path(format!("{}/models/7", PARENT)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": full_name("models/7"),
            "displayName": "salads-model"
        })))
        .mount(&server)
        .await;

    let model = test_client(&server).get_model("7").await.unwrap();
    assert_eq!(model.display_name, "salads-model");
    assert_eq!(server.received_requests().await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_unauthorized_without_expiry_fails() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(format!("{}/models/7", PARENT)))
        .respond_with(ResponseTemplate::new(401).set_body_string("bad credentials"))
        .expect(1)
        .mount(&server)
        .await;

    let err = test_client(&server).get_model("7").await.unwrap_err();
    assert!(matches!(err, VertexError::AuthError(_)));
}

// =============================================================================
// Training Tests
// =============================================================================

fn training_job() -> ObjectDetectionTrainingJob {
    ObjectDetectionTrainingJob {
        display_name: "salads-train".into(),
        model_display_name: "salads-model".into(),
        dataset: "42".into(),
        fraction_split: FractionSplit::default(),
        task_inputs: ObjectDetectionTaskInputs::default(),
    }
}

#[tokio::test]
async fn test_train_waits_for_success() {
    let server = MockServer::start().await;
    let pipeline = full_name("trainingPipelines/9");

    Mock::given(method("POST"))
        .and(path(format!("{}/trainingPipelines", PARENT)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": pipeline,
            "displayName": "salads-train",
            "state": "PIPELINE_STATE_PENDING"
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path(format!("/v1/{}", pipeline)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": pipeline,
            "displayName": "salads-train",
            "state": "PIPELINE_STATE_RUNNING"
        })))
        .up_to_n_times(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path(format!("/v1/{}", pipeline)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": pipeline,
            "displayName": "salads-train",
            "state": "PIPELINE_STATE_SUCCEEDED",
            "modelToUpload": {
                "name": full_name("models/7"),
                "displayName": "salads-model"
            }
        })))
        .mount(&server)
        .await;

    let model = test_client(&server)
        .train_object_detection_model(&training_job())
        .await
        .unwrap();
    assert_eq!(model, full_name("models/7"));

    let requests = server.received_requests().await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(body["inputDataConfig"]["datasetId"], "42");
    assert_eq!(body["trainingTaskInputs"]["modelType"], "CLOUD");
}

#[tokio::test]
async fn test_failed_training_is_reported() {
    let server = MockServer::start().await;
    let pipeline = full_name("trainingPipelines/9");

    Mock::given(method("GET"))
        .and(path(format!("/v1/{}", pipeline)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": pipeline,
            "displayName": "salads-train",
            "state": "PIPELINE_STATE_FAILED",
            "error": { "code": 9, "message": "not enough labeled images" }
        })))
        .mount(&server)
        .await;

    let err = test_client(&server)
        .wait_for_training_pipeline("9")
        .await
        .unwrap_err();

    match err {
        VertexError::TrainingFailed { state, message, .. } => {
            assert_eq!(state, "PIPELINE_STATE_FAILED");
            assert!(message.contains("not enough"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

// =============================================================================
// Evaluation Tests
// =============================================================================

#[tokio::test]
async fn test_list_model_evaluations_follows_pages() {
    let server = MockServer::start().await;
    let eval_path = format!("{}/models/7/evaluations", PARENT);

    Mock::given(method("GET"))
        .and(path(eval_path.clone()))
        .and(wiremock::matchers::query_param("pageToken", "next page"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "modelEvaluations": [{ "name": full_name("models/7/evaluations/2"), "metrics": {} }]
        })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path(eval_path))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "modelEvaluations": [{
                "name": full_name("models/7/evaluations/1"),
                "metrics": {
                    "boundingBoxMeanAveragePrecision": 0.61,
                    "boundingBoxMetrics": [
                        { "iouThreshold": 0.5, "meanAveragePrecision": 0.8 }
                    ]
                }
            }],
            "nextPageToken": "next page"
        })))
        .mount(&server)
        .await;

    let evaluations = test_client(&server).list_model_evaluations("7").await.unwrap();
    assert_eq!(evaluations.len(), 2);

    let metrics = evaluations[0].object_detection_metrics().unwrap();
    assert_eq!(metrics.bounding_box_mean_average_precision, Some(0.61));
    assert!(evaluations[1].name.ends_with("evaluations/2"));
}

// =============================================================================
// Endpoint Tests
// =============================================================================

#[tokio::test]
async fn test_deploy_model_routes_all_traffic() {
    let server = MockServer::start().await;
    let op_name = full_name("endpoints/5/operations/4");

    Mock::given(method("POST"))
        .and(path(format!("{}/endpoints/5:deployModel", PARENT)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": op_name,
            "done": true,
            "response": { "deployedModel": { "id": "dm-1", "model": full_name("models/7") } }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let deployed_id = test_client(&server)
        .deploy_model_and_wait("5", "7", "salads-deployed", AutomaticResources::default())
        .await
        .unwrap();
    assert_eq!(deployed_id, "dm-1");

    let requests = server.received_requests().await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(body["trafficSplit"]["0"], 100);
    assert_eq!(body["deployedModel"]["model"], full_name("models/7"));
    assert_eq!(body["deployedModel"]["automaticResources"]["minReplicaCount"], 1);
}

#[tokio::test]
async fn test_deploy_rejects_bad_replica_counts() {
    let server = MockServer::start().await;
    let resources = AutomaticResources {
        min_replica_count: 2,
        max_replica_count: 1,
    };
    let result = test_client(&server)
        .deploy_model("5", "7", "x", resources)
        .await;
    assert!(matches!(result, Err(VertexError::InvalidArgument(_))));
}

#[tokio::test]
async fn test_predict_returns_records() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(format!("{}/endpoints/5:predict", PARENT)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "predictions": [{
                "ids": ["1"],
                "displayNames": ["Salad"],
                "confidences": [0.7],
                "bboxes": [[0.1, 0.3, 0.1, 0.3]]
            }],
            "deployedModelId": "dm-1"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let response = test_client(&server)
        .predict(
            "5",
            vec![ImageInstance {
                content: "aGVsbG8=".into(),
            }],
            PredictionParameters::default(),
        )
        .await
        .unwrap();

    assert_eq!(response.deployed_model_id.as_deref(), Some("dm-1"));
    let detections = response.predictions[0].decode(100, 100).unwrap();
    assert_eq!(detections[0].label, "Salad: 0.700");
    assert!((detections[0].rect.x - 10.0).abs() < 1e-9);
    assert!((detections[0].rect.width - 20.0).abs() < 1e-9);
}

#[tokio::test]
async fn test_predict_validates_parameters() {
    let server = MockServer::start().await;
    let client = test_client(&server);

    let empty = client
        .predict("5", vec![], PredictionParameters::default())
        .await;
    assert!(matches!(empty, Err(VertexError::InvalidArgument(_))));

    let bad_threshold = client
        .predict(
            "5",
            vec![ImageInstance {
                content: "aGVsbG8=".into(),
            }],
            PredictionParameters {
                confidence_threshold: 1.5,
                max_predictions: 5,
            },
        )
        .await;
    assert!(matches!(bad_threshold, Err(VertexError::InvalidArgument(_))));
}

#[tokio::test]
async fn test_delete_endpoint_undeploys_first() {
    let server = MockServer::start().await;
    let endpoint = full_name("endpoints/5");

    Mock::given(method("GET"))
        .and(path(format!("/v1/{}", endpoint)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": endpoint,
            "displayName": "salads-endpoint",
            "deployedModels": [{ "id": "dm-1", "model": full_name("models/7") }]
        })))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path(format!("/v1/{}:undeployModel", endpoint)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": full_name("endpoints/5/operations/6"),
            "done": true
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("DELETE"))
        .and(path(format!("/v1/{}", endpoint)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": full_name("operations/7"),
            "done": true
        })))
        .expect(1)
        .mount(&server)
        .await;

    test_client(&server).delete_endpoint("5").await.unwrap();
}

#[tokio::test]
async fn test_delete_missing_model_is_ok() {
    let server = MockServer::start().await;

    Mock::given(method("DELETE"))
        .and(path(format!("{}/models/7", PARENT)))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    test_client(&server).delete_model("7").await.unwrap();
}
