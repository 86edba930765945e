//! # chiller-app
//!
//! Application layer — the capacity scheduler, metering engine, and event
//! broadcaster operating on one shared room registry.
//!
//! ## Responsibilities
//! - Own the **registry**: rooms, both FIFO queues, and plant state behind a
//!   single lock, so the serving counter is never observed torn
//! - Provide the **capacity scheduler** use-cases: admission, release,
//!   rebalancing, fan-speed and setpoint changes
//! - Provide the **central unit controller** use-cases: plant start/stop with
//!   cascade, status and health snapshots
//! - Run the **metering engine**: the periodic temperature/fee tick with a
//!   cancellation handle and skip-on-overrun cadence
//! - Provide the **event broadcaster**: per-room and operator broadcast
//!   scopes with latest-value delivery
//!
//! ## Dependency rule
//! Depends on `chiller-domain` only (plus `tokio::sync`/`tokio::time` for
//! channels and the tick loop). Transport and persistence collaborators
//! depend on *this* crate, not the reverse.

pub mod broadcaster;
pub mod metering_engine;
pub mod registry;
pub mod services;
