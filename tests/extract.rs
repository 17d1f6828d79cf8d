//! OllamaReceiptExtractor against a mock Ollama chat endpoint

mod common;

use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use bigdecimal::BigDecimal;
use common::MockServer;
use receipt_aggregator::{
    EmailMessage, ExtractError, OllamaReceiptExtractor, ReceiptExtractor, ValidationError,
};
use serde_json::{json, Value};
use std::str::FromStr;
use std::sync::{Arc, Mutex};

#[derive(Clone)]
struct ChatState {
    reply: String,
    requests: Arc<Mutex<Vec<Value>>>,
}

async fn handle_chat(State(state): State<ChatState>, Json(request): Json<Value>) -> Json<Value> {
    state.requests.lock().unwrap().push(request.clone());
    Json(json!({
        "model": request["model"],
        "created_at": "2024-01-12T15:00:00Z",
        "message": {"role": "assistant", "content": state.reply},
        "done": true
    }))
}

async fn start_ollama(reply: &str) -> (MockServer, Arc<Mutex<Vec<Value>>>) {
    let requests = Arc::new(Mutex::new(Vec::new()));
    let state = ChatState {
        reply: reply.to_string(),
        requests: requests.clone(),
    };
    let app = Router::new()
        .route("/api/chat", post(handle_chat))
        .with_state(state);
    (MockServer::start(app).await, requests)
}

fn receipt_email() -> EmailMessage {
    EmailMessage {
        subject: "Your order receipt from Bombas".to_string(),
        from: "Bombas <orders@bombas.com>".to_string(),
        date: "Fri, 12 Jan 2024 10:00:00 -0500".to_string(),
        body: "Crew Socks x2 $30.00\nSubtotal $45.00\nTotal billed $42.50".to_string(),
    }
}

#[tokio::test]
async fn test_extracts_structured_receipt() {
    let reply = json!({
        "merchant": "Bombas",
        "total_cost": 45.0,
        "total_billed": 42.5,
        "items": [
            {"item_name": "Crew Socks", "item_cost": 15.0, "item_description": "Merino", "item_quantity": 2}
        ]
    })
    .to_string();
    let (server, requests) = start_ollama(&reply).await;
    let extractor = OllamaReceiptExtractor::new(&server.url(), "gemma3:4b");

    let receipt = extractor.extract(&receipt_email()).await.unwrap();

    assert_eq!(receipt.merchant, "Bombas");
    assert_eq!(receipt.total_cost, BigDecimal::from_str("45").unwrap());
    assert_eq!(receipt.total_billed, BigDecimal::from_str("42.50").unwrap());
    assert_eq!(receipt.items.len(), 1);
    assert_eq!(receipt.items[0].quantity, 2);
    assert_eq!(receipt.items[0].description.as_deref(), Some("Merino"));

    let requests = requests.lock().unwrap();
    assert_eq!(requests.len(), 1);
    let request = &requests[0];
    assert_eq!(request["model"], "gemma3:4b");
    assert_eq!(request["stream"], false);
    assert!(request["format"]["properties"]["total_billed"].is_object());
    assert_eq!(request["messages"][0]["role"], "system");
    let user = request["messages"][1]["content"].as_str().unwrap();
    assert!(user.contains("Your order receipt from Bombas"));
    assert!(user.contains("Total billed $42.50"));
}

#[tokio::test]
async fn test_malformed_model_output_is_an_error() {
    let (server, _requests) = start_ollama("Sure! Here is the receipt: Bombas $42.50").await;
    let extractor = OllamaReceiptExtractor::new(&server.url(), "gemma3:4b");

    assert!(matches!(
        extractor.extract(&receipt_email()).await,
        Err(ExtractError::Json(_))
    ));
}

#[tokio::test]
async fn test_invalid_receipt_is_rejected() {
    let reply = json!({
        "merchant": "Bombas",
        "total_cost": 45.0,
        "total_billed": 42.5,
        "items": [{"item_name": "Crew Socks", "item_cost": 15.0, "item_quantity": 0}]
    })
    .to_string();
    let (server, _requests) = start_ollama(&reply).await;
    let extractor = OllamaReceiptExtractor::new(&server.url(), "gemma3:4b");

    assert!(matches!(
        extractor.extract(&receipt_email()).await,
        Err(ExtractError::Validation(ValidationError::InvalidQuantity(_)))
    ));
}

#[tokio::test]
async fn test_http_failure_is_an_error() {
    let app = Router::new().route(
        "/api/chat",
        post(|| async { StatusCode::SERVICE_UNAVAILABLE }),
    );
    let server = MockServer::start(app).await;
    let extractor = OllamaReceiptExtractor::new(&server.url(), "gemma3:4b");

    assert!(matches!(
        extractor.extract(&receipt_email()).await,
        Err(ExtractError::Http(_))
    ));
}
