//! Beverage dispenser pour core.
//!
//! Resolves a beverage order into rate-weighted pump activations that
//! finish together, runs them as cancellable pour futures and sends the
//! commands over a hot-swappable link to the pump board.

#![deny(unused_must_use)]

pub mod adapters;
pub mod app;
pub mod brandset;
pub mod config;
pub mod drivers;
pub mod error;
pub mod link;
pub mod task;
