//! Metering engine — the periodic temperature/fee tick over served rooms.
//!
//! Every tick advances each actively-served room one convergence step
//! toward its setpoint and accrues one tick's worth of fee, publishing a
//! point update per changed value on that room's channel. There is no
//! global batch event: rooms are notified independently, which preserves
//! per-room ordering without imposing any cross-room ordering.
//!
//! The tick runs under the registry lock, so it never interleaves
//! partially with a control operation — it either fully applies to a room
//! or not at all.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use chiller_domain::event::RoomEvent;
use chiller_domain::id::RoomId;
use chiller_domain::room::ServiceStatus;

use crate::broadcaster::EventBroadcaster;
use crate::registry::SharedRegistry;

/// Reference cadence between metering ticks.
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(2);

/// Reference fraction of the remaining temperature gap closed per tick.
pub const DEFAULT_CONVERGENCE_FACTOR: f64 = 0.1;

/// Periodic metering over every room that is powered on and serving.
pub struct MeteringEngine {
    registry: SharedRegistry,
    broadcaster: Arc<EventBroadcaster>,
    tick_interval: Duration,
    convergence_factor: f64,
}

impl MeteringEngine {
    /// Create an engine with the reference cadence and convergence factor.
    pub fn new(registry: SharedRegistry, broadcaster: Arc<EventBroadcaster>) -> Self {
        Self {
            registry,
            broadcaster,
            tick_interval: DEFAULT_TICK_INTERVAL,
            convergence_factor: DEFAULT_CONVERGENCE_FACTOR,
        }
    }

    /// Override the tick cadence.
    #[must_use]
    pub fn with_tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval = interval;
        self
    }

    /// Override the convergence factor.
    #[must_use]
    pub fn with_convergence_factor(mut self, factor: f64) -> Self {
        self.convergence_factor = factor;
        self
    }

    /// Apply one metering tick to every actively-served room.
    ///
    /// Exposed separately from the loop so callers (and tests) can drive
    /// the cadence themselves.
    pub async fn tick(&self) {
        let mut registry = self.registry.lock().await;
        let tick_seconds = self.tick_interval.as_secs_f64();

        let mut updates: Vec<(RoomId, Option<f64>, Option<f64>)> = Vec::new();
        for room in registry.rooms_mut() {
            if !room.power_on || room.service_status != ServiceStatus::Serving {
                continue;
            }
            let temperature = room
                .step_temperature(self.convergence_factor)
                .then_some(room.current_temperature);
            let fee = room.accrue_fee(tick_seconds).then_some(room.accrued_fee);
            if temperature.is_some() || fee.is_some() {
                updates.push((room.id.clone(), temperature, fee));
            }
        }

        // Notifications are fire-and-forget per room: an absent or lagging
        // observer on one channel cannot affect the others.
        let metered = updates.len();
        for (room_id, temperature, fee) in updates {
            if let Some(current_temperature) = temperature {
                self.broadcaster.publish_room(
                    &room_id,
                    RoomEvent::TemperatureChanged {
                        room_id: room_id.clone(),
                        current_temperature,
                    },
                );
            }
            if let Some(accrued_fee) = fee {
                self.broadcaster.publish_room(
                    &room_id,
                    RoomEvent::FeeChanged {
                        room_id: room_id.clone(),
                        accrued_fee,
                    },
                );
            }
        }

        tracing::debug!(metered, "metering tick");
    }

    /// Spawn the fixed-cadence loop, returning its cancellation handle.
    ///
    /// The first tick fires one full interval after the spawn — fees are
    /// charged for elapsed time only, never at t=0. Overdue ticks are
    /// skipped rather than run back-to-back, so ticks never overlap even
    /// when one takes longer than the interval.
    #[must_use]
    pub fn spawn(self) -> MeteringHandle {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(async move {
            let start = tokio::time::Instant::now() + self.tick_interval;
            let mut interval = tokio::time::interval_at(start, self.tick_interval);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = interval.tick() => self.tick().await,
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            break;
                        }
                    }
                }
            }
            tracing::debug!("metering loop stopped");
        });
        MeteringHandle {
            shutdown: shutdown_tx,
            task,
        }
    }
}

/// Cancellation handle for a spawned metering loop.
pub struct MeteringHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl MeteringHandle {
    /// Stop the loop and wait for it to finish.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        let _ = self.task.await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Registry;
    use chiller_domain::plant::CentralUnit;
    use chiller_domain::room::{AcMode, Room};
    use chiller_domain::time::now;

    fn serving_room(id: &str, current: f64, target: f64) -> Room {
        let mut room = Room::builder()
            .id(id)
            .current_temperature(current)
            .target_temperature(target)
            .build()
            .unwrap();
        room.activate(AcMode::Cooling, target, now());
        room.service_status = ServiceStatus::Serving;
        room
    }

    fn make_engine(rooms: Vec<Room>) -> (MeteringEngine, SharedRegistry, Arc<EventBroadcaster>) {
        let mut registry = Registry::new(CentralUnit::new(30));
        for room in rooms {
            registry.register(room);
        }
        registry.recompute_serving_count();
        let shared = registry.into_shared();
        let broadcaster = Arc::new(EventBroadcaster::new(64));
        let engine = MeteringEngine::new(shared.clone(), broadcaster.clone());
        (engine, shared, broadcaster)
    }

    #[tokio::test]
    async fn should_step_temperature_toward_setpoint() {
        let (engine, registry, _) = make_engine(vec![serving_room("301", 28.0, 25.0)]);

        engine.tick().await;

        let guard = registry.lock().await;
        let room = guard.room(&RoomId::new("301")).unwrap();
        assert_eq!(room.current_temperature, 27.7);
    }

    #[tokio::test]
    async fn should_accrue_reference_fee_per_tick() {
        let (engine, registry, _) = make_engine(vec![serving_room("301", 25.0, 25.0)]);

        engine.tick().await;

        let guard = registry.lock().await;
        let room = guard.room(&RoomId::new("301")).unwrap();
        // Mid speed: 0.8 * 2 / 60 rounded to cents.
        assert_eq!(room.accrued_fee, 0.03);
    }

    #[tokio::test]
    async fn should_skip_idle_and_waiting_rooms() {
        let mut waiting = serving_room("302", 28.0, 25.0);
        waiting.service_status = ServiceStatus::Waiting;
        let idle = Room::builder().id("303").build().unwrap();
        let (engine, registry, _) = make_engine(vec![waiting, idle]);

        engine.tick().await;

        let guard = registry.lock().await;
        assert_eq!(
            guard.room(&RoomId::new("302")).unwrap().current_temperature,
            28.0
        );
        assert_eq!(guard.room(&RoomId::new("302")).unwrap().accrued_fee, 0.0);
        assert_eq!(guard.room(&RoomId::new("303")).unwrap().accrued_fee, 0.0);
    }

    #[tokio::test]
    async fn should_publish_point_updates_per_changed_value() {
        let (engine, _, broadcaster) = make_engine(vec![serving_room("301", 28.0, 25.0)]);
        let mut rx = broadcaster.subscribe_room(&RoomId::new("301"));

        engine.tick().await;

        let first = rx.recv().await.unwrap();
        assert!(matches!(
            first.payload,
            RoomEvent::TemperatureChanged {
                current_temperature,
                ..
            } if current_temperature == 27.7
        ));
        let second = rx.recv().await.unwrap();
        assert!(matches!(
            second.payload,
            RoomEvent::FeeChanged { accrued_fee, .. } if accrued_fee == 0.03
        ));
    }

    #[tokio::test]
    async fn should_stop_emitting_temperature_once_converged() {
        let (engine, _, broadcaster) = make_engine(vec![serving_room("301", 25.0, 25.0)]);
        let mut rx = broadcaster.subscribe_room(&RoomId::new("301"));

        engine.tick().await;

        // Converged room: fee still accrues, temperature stays silent.
        let envelope = rx.recv().await.unwrap();
        assert!(matches!(envelope.payload, RoomEvent::FeeChanged { .. }));
        assert!(matches!(
            rx.try_recv(),
            Err(tokio::sync::broadcast::error::TryRecvError::Empty)
        ));
    }

    #[tokio::test]
    async fn should_meter_multiple_rooms_independently() {
        let (engine, registry, _) = make_engine(vec![
            serving_room("301", 28.0, 25.0),
            serving_room("302", 30.0, 25.0),
        ]);

        engine.tick().await;

        let guard = registry.lock().await;
        assert_eq!(
            guard.room(&RoomId::new("301")).unwrap().current_temperature,
            27.7
        );
        assert_eq!(
            guard.room(&RoomId::new("302")).unwrap().current_temperature,
            29.5
        );
    }

    #[tokio::test(start_paused = true)]
    async fn should_not_charge_before_first_interval_elapses() {
        let (engine, registry, _) = make_engine(vec![serving_room("301", 25.0, 25.0)]);
        let handle = engine.spawn();

        // Half an interval in, nothing has been metered yet.
        tokio::time::sleep(Duration::from_secs(1)).await;
        let fee = {
            let guard = registry.lock().await;
            guard.room(&RoomId::new("301")).unwrap().accrued_fee
        };
        assert_eq!(fee, 0.0);

        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn should_tick_on_cadence_until_shutdown() {
        let (engine, registry, _) = make_engine(vec![serving_room("301", 25.0, 25.0)]);
        let handle = engine.spawn();

        // Paused clock: sleeping auto-advances time through several ticks.
        tokio::time::sleep(Duration::from_secs(7)).await;
        handle.shutdown().await;

        let fee = {
            let guard = registry.lock().await;
            guard.room(&RoomId::new("301")).unwrap().accrued_fee
        };
        // At least three 2s ticks worth of fee.
        assert!(fee >= 0.09);

        tokio::time::sleep(Duration::from_secs(10)).await;
        let after = {
            let guard = registry.lock().await;
            guard.room(&RoomId::new("301")).unwrap().accrued_fee
        };
        assert_eq!(after, fee, "no further metering after shutdown");
    }
}
