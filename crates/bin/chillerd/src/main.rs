//! # chillerd — central air-conditioning daemon
//!
//! Composition root that wires the core together and runs it.
//!
//! ## Responsibilities
//! - Parse configuration (config file, env vars)
//! - Seed the room registry
//! - Construct the scheduler, plant controller and event broadcaster
//! - Spawn the metering loop
//! - Handle graceful shutdown (SIGTERM/SIGINT)
//!
//! ## Dependency rule
//! This is the **only** crate that depends on all other crates.
//! It is the wiring layer — no domain logic belongs here.

mod config;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio_stream::StreamExt;

use chiller_app::broadcaster::{EventBroadcaster, event_stream};
use chiller_app::metering_engine::MeteringEngine;
use chiller_app::registry::Registry;
use chiller_app::services::plant::PlantController;
use chiller_domain::event::OperatorEvent;
use chiller_domain::plant::CentralUnit;
use chiller_domain::room::Room;

use crate::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load().context("loading configuration")?;

    tracing_subscriber::fmt()
        .with_env_filter(config.logging.filter.as_str())
        .init();

    // Registry seeded with idle rooms.
    let mut registry = Registry::new(CentralUnit::new(config.plant.max_serving));
    for number in config.room_numbers() {
        let room = Room::builder()
            .id(number.to_string())
            .build()
            .context("seeding rooms")?;
        registry.register(room);
    }
    let room_count = registry.room_count();
    let registry = registry.into_shared();

    let broadcaster = Arc::new(EventBroadcaster::new(256));
    let plant = PlantController::new(registry.clone(), broadcaster.clone());

    if config.plant.running_on_start {
        plant.start(config.plant.mode).await;
    }

    // Operator feed mirrored into the log.
    let operator_rx = broadcaster.subscribe_operator();
    let operator_log = tokio::spawn(async move {
        let mut events = std::pin::pin!(event_stream(operator_rx));
        while let Some(envelope) = events.next().await {
            match &envelope.payload {
                OperatorEvent::PlantStatusChanged { plant } => {
                    tracing::info!(
                        running = plant.is_running,
                        mode = %plant.mode,
                        serving = plant.current_serving_count,
                        "plant status changed"
                    );
                }
                OperatorEvent::QueueChanged {
                    service_queue,
                    wait_queue,
                } => {
                    tracing::info!(
                        serving = service_queue.len(),
                        waiting = wait_queue.len(),
                        "queues changed"
                    );
                }
                OperatorEvent::RoomPowerChanged {
                    room_id, power_on, ..
                } => {
                    tracing::info!(%room_id, power_on, "room power changed");
                }
            }
        }
    });

    let metering = MeteringEngine::new(registry, broadcaster)
        .with_tick_interval(Duration::from_secs_f64(config.metering.tick_seconds))
        .with_convergence_factor(config.metering.convergence_factor)
        .spawn();

    tracing::info!(
        rooms = room_count,
        max_serving = config.plant.max_serving,
        tick_seconds = config.metering.tick_seconds,
        "chillerd running"
    );

    tokio::signal::ctrl_c()
        .await
        .context("waiting for shutdown signal")?;
    tracing::info!("shutting down");

    plant.stop().await;
    metering.shutdown().await;
    operator_log.abort();

    Ok(())
}
