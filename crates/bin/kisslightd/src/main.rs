//! # kisslightd — kisslight hub daemon
//!
//! Composition root that wires all adapters together and runs the hub.
//!
//! ## Responsibilities
//! - Load configuration (config file, env vars)
//! - Initialize the `SQLite` connection pool and run migrations
//! - Load the stored devices into the registry
//! - Connect to the MQTT broker and subscribe every known device
//! - Start the status handler, the write-back synchronizer and the control server
//! - Flush pending changes on ctrl-c
//!
//! ## Dependency rule
//! This is the **only** crate that depends on all other crates.
//! It is the wiring layer — no domain logic belongs here.

mod config;

use std::sync::Arc;

use anyhow::Context as _;
use tracing_subscriber::EnvFilter;

use kisslight_adapter_control_tcp::ControlServer;
use kisslight_adapter_mqtt::MqttConnection;
use kisslight_adapter_storage_sqlite_sqlx::SqliteDeviceStore;
use kisslight_app::ports::DeviceStore;
use kisslight_app::registry::{Registry, SharedRegistry};
use kisslight_app::services::dispatcher::Dispatcher;
use kisslight_app::services::status_handler::StatusHandler;
use kisslight_app::sync::{FlushPolicy, WriteBackSynchronizer};

use crate::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load().context("failed to load configuration")?;

    let filter = EnvFilter::try_new(&config.logging.filter)
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    // Database
    let db = kisslight_adapter_storage_sqlite_sqlx::Config {
        database_url: config.database.url.clone(),
    }
    .build()
    .await
    .context("failed to open database")?;
    let store = SqliteDeviceStore::new(db.pool().clone());

    // Registry
    let count = store.count().await.context("failed to count stored devices")?;
    tracing::info!(count, capacity = config.database.max_dev_count, "loading stored devices");
    let rows = store.dump().await.context("failed to read stored devices")?;
    let registry = Registry::load(rows, config.database.max_dev_count);
    let stems: Vec<String> = registry
        .occupied()
        .map(|(_, device)| device.topic.clone())
        .collect();
    let registry: SharedRegistry = Arc::new(tokio::sync::Mutex::new(registry));

    // Bus
    let MqttConnection {
        bus,
        mut inbound,
        task: mqtt_task,
    } = kisslight_adapter_mqtt::connect(&config.mqtt)
        .await
        .context("failed to connect to MQTT broker")?;
    let dispatcher = Arc::new(Dispatcher::new(Arc::clone(&registry), bus.clone()));
    let bound = dispatcher.binder().subscribe_all(&stems).await;
    tracing::info!(bound, total = stems.len(), "subscribed device status topics");

    let handler = StatusHandler::new(Arc::clone(&registry));
    let status_task = tokio::spawn(async move {
        while let Some(status) = inbound.recv().await {
            handler.handle(&status.topic, &status.payload).await;
        }
    });

    // Write-back
    let sync = WriteBackSynchronizer::new(
        Arc::clone(&registry),
        store,
        FlushPolicy {
            max_retries: config.sync.max_retries,
        },
    );
    let sync_task = sync
        .clone()
        .start(config.sync.initial_delay(), config.sync.interval());

    // Control
    let server = ControlServer::bind(&config.server, dispatcher)
        .await
        .context("failed to bind control server")?;
    let addr = server
        .local_addr()
        .context("failed to read control server address")?;
    tracing::info!(%addr, "kisslightd listening");

    tokio::select! {
        () = server.serve() => {}
        result = tokio::signal::ctrl_c() => {
            result.context("failed to listen for shutdown signal")?;
            tracing::info!("shutting down");
        }
    }

    sync_task.abort();
    status_task.abort();
    let report = sync.flush_once().await;
    tracing::info!(
        flushed = report.flushed,
        failed = report.failed,
        dropped = report.dropped,
        "final flush finished"
    );

    if let Err(err) = bus.disconnect() {
        tracing::warn!(%err, "failed to disconnect from MQTT broker");
    }
    mqtt_task.abort();

    Ok(())
}
