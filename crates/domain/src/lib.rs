//! # chiller-domain
//!
//! Pure domain model for the chiller central air-conditioning core.
//!
//! ## Responsibilities
//! - Foundational types: identifiers, error conventions, timestamps
//! - Define **Rooms** (the metered consumers: power, temperatures, fan speed, fee)
//! - Define the **Central Unit** (plant-wide run state and capacity ceiling)
//! - Define **Queue entries** (FIFO service and wait queue records)
//! - Define **Events** (room-scoped and operator-scoped notification payloads)
//! - Contain all invariant enforcement and the metering arithmetic
//!   (temperature convergence, fee accrual, session statistics)
//!
//! ## Dependency rule
//! This crate has **no internal dependencies**.
//! It must never import anything from `app`, the daemon, or external IO crates.

pub mod error;
pub mod id;
pub mod time;

pub mod event;
pub mod plant;
pub mod queue;
pub mod room;
