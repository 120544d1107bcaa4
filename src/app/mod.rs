//! Application core — pour planning and orchestration, zero I/O.
//!
//! All interaction with the board, the resolver and timers happens through
//! the **port traits** defined in [`ports`], keeping this layer fully
//! testable with in-memory adapters.

pub mod commands;
pub mod events;
pub mod planner;
pub mod ports;
pub mod service;
