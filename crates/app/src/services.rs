//! Application services — the operation surface exposed to collaborators.

pub mod plant;
pub mod scheduler;
