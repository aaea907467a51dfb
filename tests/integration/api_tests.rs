use super::*;
use axum::http::{Method, StatusCode};
use serde_json::json;

#[tokio::test]
async fn test_health_check() -> anyhow::Result<()> {
    let app = TestApp::new().await?;

    let (status, body) = send(&app.router(), Method::GET, "/health", None).await?;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["service"], "price-watch");
    Ok(())
}

#[tokio::test]
async fn test_product_crud_by_id() -> anyhow::Result<()> {
    let app = TestApp::new().await?;
    let router = app.router();

    let (status, body) = send(&router, Method::GET, "/api/v1/products", None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"], json!([]));

    let (status, body) = send(
        &router,
        Method::POST,
        "/api/v1/products",
        Some(json!({
            "name": "Kettle",
            "url": "https://shop.example.com/p/kettle",
            "target_price": 35.0
        })),
    )
    .await?;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["success"], true);
    let id = body["data"]["id"].as_str().unwrap().to_string();
    assert_eq!(id.len(), 32);

    let (status, body) = send(&router, Method::GET, &format!("/api/v1/products/{}", id), None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["name"], "Kettle");
    assert_eq!(body["data"]["target_price"], json!(35.0));

    let (status, body) = send(
        &router,
        Method::PUT,
        &format!("/api/v1/products/{}", id),
        Some(json!({ "target_price": 30.0 })),
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["id"], id.as_str());
    assert_eq!(body["data"]["name"], "Kettle");
    assert_eq!(body["data"]["target_price"], json!(30.0));

    let (status, _) = send(&router, Method::DELETE, &format!("/api/v1/products/{}", id), None).await?;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(&router, Method::GET, &format!("/api/v1/products/{}", id), None).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], "NOT_FOUND");

    assert_eq!(app.config_store.product_count().await, 0);
    Ok(())
}

#[tokio::test]
async fn test_product_crud_by_index() -> anyhow::Result<()> {
    let app = TestApp::new().await?;
    app.add_product("Kettle", "35").await?;
    app.add_product("Toaster", "50").await?;
    let router = app.router();

    let (status, body) = send(&router, Method::GET, "/api/v1/products/at/1", None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["name"], "Toaster");

    let (status, body) = send(
        &router,
        Method::PUT,
        "/api/v1/products/at/0",
        Some(json!({ "name": "Electric Kettle" })),
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["name"], "Electric Kettle");

    let (status, body) = send(&router, Method::DELETE, "/api/v1/products/at/0", None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["name"], "Electric Kettle");

    // Positions shift after a delete
    let (_, body) = send(&router, Method::GET, "/api/v1/products/at/0", None).await?;
    assert_eq!(body["data"]["name"], "Toaster");

    let (status, _) = send(&router, Method::GET, "/api/v1/products/at/5", None).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn test_invalid_products_rejected() -> anyhow::Result<()> {
    let app = TestApp::new().await?;
    let router = app.router();

    let (status, body) = send(
        &router,
        Method::POST,
        "/api/v1/products",
        Some(json!({
            "name": "Kettle",
            "url": "https://shop.example.com/p/kettle",
            "target_price": -5.0
        })),
    )
    .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");

    let (status, _) = send(
        &router,
        Method::POST,
        "/api/v1/products",
        Some(json!({ "name": "Kettle", "url": "not a url", "target_price": 10.0 })),
    )
    .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let product = app.add_product("Toaster", "50").await?;
    let (status, _) = send(
        &router,
        Method::PUT,
        &format!("/api/v1/products/{}", product.id),
        Some(json!({ "target_price": -1.0 })),
    )
    .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Nothing half-applied
    assert_eq!(app.config_store.get_products().await, vec![product]);
    Ok(())
}

#[tokio::test]
async fn test_monitor_config_endpoints() -> anyhow::Result<()> {
    let app = TestApp::new().await?;
    let router = app.router();

    let (status, body) = send(&router, Method::GET, "/api/v1/config", None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["check_interval_minutes"], 300);

    let (status, body) = send(
        &router,
        Method::PUT,
        "/api/v1/config",
        Some(json!({ "check_interval_minutes": 0 })),
    )
    .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");

    let (status, _) = send(
        &router,
        Method::PUT,
        "/api/v1/config",
        Some(json!({
            "check_interval_minutes": 60,
            "notification_settings": { "enabled": true, "recipient_email": "me@example.com" }
        })),
    )
    .await?;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = send(&router, Method::GET, "/api/v1/config", None).await?;
    assert_eq!(body["data"]["check_interval_minutes"], 60);
    assert_eq!(body["data"]["notification_settings"]["enabled"], true);
    assert_eq!(body["data"]["notification_settings"]["recipient_email"], "me@example.com");

    let (_, body) = send(&router, Method::GET, "/api/v1/status", None).await?;
    assert_eq!(body["data"]["check_interval_minutes"], 60);
    Ok(())
}

#[tokio::test]
async fn test_check_now_reports_results_and_records_history() -> anyhow::Result<()> {
    let app = TestApp::new().await?;
    app.enable_notifications().await?;
    app.add_product("Kettle", "35").await?;
    app.add_product("Toaster", "20").await?;
    app.source.push_price(&product_url("Kettle"), "29.99");
    app.source.push(&product_url("Toaster"), Err(ExtractionError::HttpStatus { status: 404 }));
    let router = app.router();

    let (status, body) = send(&router, Method::POST, "/api/v1/monitoring/check", None).await?;
    assert_eq!(status, StatusCode::OK);

    let results = body["data"].as_array().unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0]["name"], "Kettle");
    assert_eq!(results[0]["current_price"], json!(29.99));
    assert_eq!(results[0]["price_met"], true);
    assert_eq!(results[0]["notified"], true);
    assert_eq!(results[0]["extraction_method"], "structured_data");
    assert_eq!(results[1]["name"], "Toaster");
    assert!(results[1]["current_price"].is_null());
    assert!(results[1]["error"].as_str().unwrap().contains("404"));

    let (_, body) = send(&router, Method::GET, "/api/v1/monitoring/results", None).await?;
    assert_eq!(body["data"].as_array().unwrap().len(), 2);

    let (_, body) = send(&router, Method::GET, "/api/v1/history/Kettle", None).await?;
    let kettle = body["data"].as_array().unwrap();
    assert_eq!(kettle.len(), 1);
    assert_eq!(kettle[0]["observed_price"], json!(29.99));

    let (_, body) = send(&router, Method::GET, "/api/v1/history", None).await?;
    assert_eq!(body["data"]["Toaster"][0]["observed_price"], Value::Null);
    assert!(body["data"]["Toaster"][0]["error"].is_string());

    let (_, body) = send(&router, Method::GET, "/api/v1/history/Unknown", None).await?;
    assert_eq!(body["data"], json!([]));

    assert_eq!(app.sink.alerts().len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_check_now_while_busy_is_rejected() -> anyhow::Result<()> {
    let gate = Arc::new(Notify::new());
    let app = TestApp::with_parts(ScriptedSource::gated(Arc::clone(&gate)), RecordingSink::new(), None).await?;
    app.add_product("Kettle", "35").await?;
    app.source.push_price(&product_url("Kettle"), "40");
    let router = app.router();

    let engine = Arc::clone(&app.engine);
    let in_flight = tokio::spawn(async move { engine.run_cycle_now().await });
    assert!(wait_for_condition(|| app.engine.cycle_in_flight(), 5).await);

    let (status, body) = send(&router, Method::POST, "/api/v1/monitoring/check", None).await?;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "ENGINE_BUSY");

    let (_, body) = send(&router, Method::GET, "/api/v1/status", None).await?;
    assert_eq!(body["data"]["cycle_in_flight"], true);

    gate.notify_one();
    let results = in_flight.await??;
    assert_eq!(results.len(), 1);
    assert!(!app.engine.cycle_in_flight());
    Ok(())
}

#[tokio::test]
async fn test_start_and_stop_monitoring() -> anyhow::Result<()> {
    let app = TestApp::new().await?;
    let router = app.router();

    let (status, body) = send(&router, Method::POST, "/api/v1/monitoring/start", None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["changed"], true);
    assert_eq!(body["data"]["status"]["is_running"], true);

    let (_, body) = send(&router, Method::POST, "/api/v1/monitoring/start", None).await?;
    assert_eq!(body["data"]["changed"], false);

    let (_, body) = send(&router, Method::POST, "/api/v1/monitoring/stop", None).await?;
    assert_eq!(body["data"]["changed"], true);
    assert_eq!(body["data"]["status"]["is_running"], false);

    let (_, body) = send(&router, Method::POST, "/api/v1/monitoring/stop", None).await?;
    assert_eq!(body["data"]["changed"], false);

    let (_, body) = send(&router, Method::GET, "/api/v1/status", None).await?;
    assert_eq!(body["data"]["is_running"], false);
    assert_eq!(body["data"]["total_products"], 0);
    Ok(())
}

#[tokio::test]
async fn test_check_now_survives_client_disconnect() -> anyhow::Result<()> {
    let gate = Arc::new(Notify::new());
    let app = TestApp::with_parts(ScriptedSource::gated(Arc::clone(&gate)), RecordingSink::new(), None).await?;
    app.add_product("Kettle", "35").await?;
    app.source.push_price(&product_url("Kettle"), "29.99");
    let router = app.router();

    // The client gives up while the product is still being checked
    let request = send(&router, Method::POST, "/api/v1/monitoring/check", None);
    assert!(tokio::time::timeout(Duration::from_millis(100), request).await.is_err());
    assert!(app.engine.cycle_in_flight());

    gate.notify_one();
    assert!(wait_for_condition(|| !app.engine.cycle_in_flight(), 5).await);

    let history = app.history.read("Kettle").await;
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].observed_price, Some("29.99".parse::<Decimal>()?));
    assert_eq!(app.engine.last_results().len(), 1);
    Ok(())
}
