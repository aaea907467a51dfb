use super::*;
use price_watch::models::{ProductKey, UpdateProduct};
use serde_json::json;

#[tokio::test]
async fn test_products_survive_reopen() -> anyhow::Result<()> {
    let app = TestApp::new().await?;
    let kettle = app.add_product("Kettle", "30").await?;
    let toaster = app.add_product("Toaster", "50").await?;
    app.config_store
        .update_product(
            &ProductKey::Id(kettle.id.clone()),
            UpdateProduct {
                target_price: Some("27.5".parse::<Decimal>()?),
                ..Default::default()
            },
        )
        .await?;

    let reopened = ConfigStore::open(app.config_store.path(), MonitorConfig::new(300)).await?;
    let products = reopened.get_products().await;

    assert_eq!(products.len(), 2);
    assert_eq!(products[0].id, kettle.id);
    assert_eq!(products[0].target_price, "27.5".parse::<Decimal>()?);
    assert_eq!(products[1], toaster);
    Ok(())
}

#[tokio::test]
async fn test_malformed_entries_are_dropped_on_load() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("config.json");
    let document = json!({
        "products": [
            { "name": "Kettle", "url": "https://shop.example.com/p/kettle", "target_price": 30.0 },
            { "name": "No Url", "target_price": 10.0 },
            { "name": "Negative", "url": "https://shop.example.com/p/neg", "target_price": -3.0 },
            "not even an object"
        ],
        "check_interval_minutes": 15,
        "email_notifications": { "enabled": true, "recipient_email": "me@example.com" }
    });
    std::fs::write(&path, serde_json::to_vec_pretty(&document)?)?;

    let store = ConfigStore::open(&path, MonitorConfig::new(300)).await?;

    let products = store.get_products().await;
    assert_eq!(products.len(), 1);
    assert_eq!(products[0].name, "Kettle");
    assert_eq!(products[0].id.len(), 32);

    let monitor = store.get_monitor_config().await;
    assert_eq!(monitor.check_interval_minutes, 15);
    assert!(monitor.notification_settings.enabled);
    Ok(())
}

#[tokio::test]
async fn test_out_of_range_interval_falls_back_to_default() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("config.json");
    std::fs::write(&path, r#"{"products": [], "check_interval_minutes": 0}"#)?;

    let store = ConfigStore::open(&path, MonitorConfig::new(120)).await?;

    assert_eq!(store.get_monitor_config().await.check_interval_minutes, 120);
    Ok(())
}

#[tokio::test]
async fn test_history_survives_reopen_in_time_order() -> anyhow::Result<()> {
    let app = TestApp::new().await?;
    app.add_product("Kettle", "30").await?;
    let url = product_url("Kettle");
    for price in ["40", "35", "29"] {
        app.source.push_price(&url, price);
    }
    for _ in 0..3 {
        app.engine.run_cycle_now().await?;
    }

    let reopened = HistoryStore::open(app.dir.path().join("price_history.json"), None).await?;
    let series = reopened.read("Kettle").await;

    assert_eq!(series.len(), 3);
    assert!(series.windows(2).all(|pair| pair[0].observed_at <= pair[1].observed_at));
    assert_eq!(series[2].observed_price, Some("29".parse::<Decimal>()?));

    let latest = reopened.latest_successful("Kettle").await.unwrap();
    assert_eq!(latest.observed_price, Some("29".parse::<Decimal>()?));
    Ok(())
}

#[tokio::test]
async fn test_deleted_product_keeps_history() -> anyhow::Result<()> {
    let app = TestApp::new().await?;
    let kettle = app.add_product("Kettle", "30").await?;
    app.source.push_price(&product_url("Kettle"), "35");
    app.engine.run_cycle_now().await?;

    app.config_store.delete_product(&ProductKey::Id(kettle.id)).await?;

    assert!(app.engine.run_cycle_now().await?.is_empty());
    assert_eq!(app.history.read("Kettle").await.len(), 1);
    Ok(())
}
