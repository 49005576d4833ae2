//! Persistence behaviour of a full run
//!
//! Covers a run backed by a SQLite store, where status, report and QA feed
//! land in the database, and a run whose store is unreachable, which must
//! behave exactly the same from the caller's side.

use anyhow::Result;
use axum::{extract::Json, routing::post, Router};
use serde_json::{json, Value};
use std::time::Duration;
use tokio::{net::TcpListener, time::timeout};
use tripwire_config::{OverridePolicy, StorageConfig, TripwireConfig};
use tripwire_core::{Mode, OverrideSource, Phase, QaFeedItem, RunConfig};
use tripwire_engine::Controller;
use tripwire_storage::Storage;

async fn spawn_target() -> Result<String> {
    let app = Router::new().route(
        "/query",
        post(|Json(body): Json<Value>| async move {
            Json(json!({
                "answers": [format!("about {}", body["query"].as_str().unwrap_or(""))],
                "doc_ids": ["d1", "d2"],
            }))
        }),
    );
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    Ok(format!("http://{}/query", addr))
}

fn tiny_run() -> RunConfig {
    RunConfig::builder(Mode::Heavy)
        .warmup(1, 5.0)
        .baseline(1, 5.0)
        .trip(1, 5.0)
        .recovery(1, 5.0)
        .concurrency(2)
        .build()
        .expect("valid run config")
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_run_is_persisted_to_sqlite() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let mut config = TripwireConfig::default();
    config.target.url = spawn_target().await?;
    config.storage.url = format!("sqlite://{}?mode=rwc", dir.path().join("runs.db").display());
    config.overrides = OverridePolicy::new().with("candidate_k", 250u64);

    let controller = Controller::from_config(&config).await?;
    assert!(controller.context().storage.is_available());

    let run_id = controller.start(tiny_run()).await?;
    let report = timeout(Duration::from_secs(20), controller.wait())
        .await?
        .expect("run was started")?;
    assert_eq!(report.final_phase, Phase::Complete);

    let candidate = report
        .precedence_chain
        .iter()
        .find(|entry| entry.parameter == "candidate_k")
        .expect("candidate_k resolved");
    assert_eq!(candidate.source, OverrideSource::Policy);
    assert_eq!(candidate.value, json!(250));

    // A fresh connection sees what the run wrote
    let reopened = Storage::connect(&config.storage).await;
    let status = reopened.load_status().await.expect("status persisted");
    assert_eq!(status.run_id, run_id);
    assert_eq!(status.phase, Phase::Complete);
    let stored = reopened.load_report().await.expect("report persisted");
    assert_eq!(stored.run_id, run_id);
    assert_eq!(stored.totals, report.totals);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_unreachable_store_degrades_silently() -> Result<()> {
    let mut config = TripwireConfig::default();
    config.target.url = spawn_target().await?;
    config.storage = StorageConfig {
        url: "sqlite:///nonexistent-tripwire-dir/nested/runs.db?mode=rwc".to_string(),
        connect_timeout: Duration::from_millis(500),
        ..Default::default()
    };

    let controller = Controller::from_config(&config).await?;
    let storage = controller.context().storage.clone();
    assert!(!storage.is_available());

    controller.start(tiny_run()).await?;
    let report = timeout(Duration::from_secs(20), controller.wait())
        .await?
        .expect("run was started")?;
    assert_eq!(report.final_phase, Phase::Complete);
    assert_eq!(controller.report().await.expect("report kept").run_id, report.run_id);

    assert!(storage
        .append_qa_feed(QaFeedItem::new(Phase::Trip, 3.0, "retrieval", "probe", "answer"))
        .await);
    let feed = controller.qa_feed(10).await;
    assert_eq!(feed.first().map(|item| item.query.as_str()), Some("probe"));
    Ok(())
}
