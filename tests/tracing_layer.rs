#![cfg(feature = "sqlx")]

use serde_json::{json, Value};
use sql_log_store::{SqlxDatabase, Store, StoreHandler, StoreLayer, StoreOptions};
use sqlx::any::AnyPoolOptions;
use sqlx::Row;
use std::collections::HashMap;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::Registry;

async fn setup(level: LevelFilter) -> (Arc<SqlxDatabase>, StoreHandler) {
    let db = Arc::new(
        SqlxDatabase::connect_with("sqlite::memory:", AnyPoolOptions::new().max_connections(1))
            .await
            .expect("open sqlite"),
    );
    let store = Store::new(
        StoreOptions::new()
            .with_table_name("app_log")
            .with_database(db.clone())
            .with_auto_migrate(true),
    )
    .await
    .expect("create store");

    (db, StoreHandler::new(Arc::new(store)).with_level(level))
}

/// message -> (level, decoded context)
async fn stored(db: &SqlxDatabase) -> HashMap<String, (String, Value)> {
    sqlx::query("SELECT level, message, context FROM app_log")
        .fetch_all(db.pool())
        .await
        .expect("select rows")
        .into_iter()
        .map(|row| {
            let level: String = row.try_get("level").unwrap();
            let message: String = row.try_get("message").unwrap();
            let context: String = row.try_get("context").unwrap();
            (message, (level, serde_json::from_str(&context).unwrap()))
        })
        .collect()
}

#[tokio::test]
async fn events_are_persisted_with_span_fields() {
    let (db, handler) = setup(LevelFilter::DEBUG).await;
    let (layer, writer) = StoreLayer::new(handler, 64);
    let enqueued = layer.enqueued_events.clone();

    let subscriber = Registry::default().with(layer);
    tracing::subscriber::with_default(subscriber, || {
        tracing::info!(user = "ada", "service started");

        let span = tracing::info_span!("request", id = "r-1");
        let _guard = span.enter();
        tracing::warn!(retries = 3u64, "slow upstream");
        tracing::error!(ok = false, "db timeout");
        tracing::trace!("below threshold");
    });

    writer.await.expect("writer task");
    assert_eq!(enqueued.load(Ordering::Relaxed), 3);

    let rows = stored(&db).await;
    assert_eq!(rows.len(), 3);

    let (level, context) = &rows["service started"];
    assert_eq!(level, "info");
    assert_eq!(context, &json!({"user": "ada"}));

    let (level, context) = &rows["slow upstream"];
    assert_eq!(level, "warning");
    assert_eq!(context, &json!({"request.id": "r-1", "retries": 3}));

    let (level, context) = &rows["db timeout"];
    assert_eq!(level, "error");
    assert_eq!(context, &json!({"request.id": "r-1", "ok": false}));
}

#[tokio::test]
async fn threshold_filters_before_enqueueing() {
    let (db, handler) = setup(LevelFilter::WARN).await;
    let (layer, writer) = StoreLayer::new(handler, 16);
    let dropped = layer.dropped_events.clone();

    let subscriber = Registry::default().with(layer);
    tracing::subscriber::with_default(subscriber, || {
        tracing::debug!("chatty");
        tracing::info!("still chatty");
        tracing::warn!("worth keeping");
    });

    writer.await.expect("writer task");
    assert_eq!(dropped.load(Ordering::Relaxed), 0);

    let rows = stored(&db).await;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows["worth keeping"].0, "warning");
}

#[tokio::test]
async fn store_diagnostics_do_not_feed_back() {
    let (db, handler) = setup(LevelFilter::TRACE).await;
    handler.store().enable_debug(true);
    let (layer, writer) = StoreLayer::new(handler, 16);

    // Keep the subscriber active while the writer runs, so the store's
    // own SQL echo goes through the layer as well.
    let dispatch = tracing::Dispatch::new(Registry::default().with(layer));
    let guard = tracing::dispatcher::set_default(&dispatch);
    tracing::info!("only row");
    tokio::time::sleep(Duration::from_millis(200)).await;
    drop(guard);
    drop(dispatch);

    writer.await.expect("writer task");
    let rows = stored(&db).await;
    assert_eq!(rows.len(), 1);
    assert!(rows.contains_key("only row"));
}
