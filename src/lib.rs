//! jsonperfmon - host telemetry sampler.
//!
//! Reads raw operating-system counters once per second, turns cumulative
//! counters into per-second rates and emits one JSON document per cycle.
//!
//! - [`schedule`] decides which metric groups are due each second.
//! - [`snapshot`], [`correlate`] and [`process`] keep the previous readings
//!   that deltas are computed against.
//! - [`collector`] reads the counters from `/proc` and `/sys`.
//! - [`render`] writes JSON sections into the reusable [`buffer`].
//! - [`monitor`] ties everything together and runs the loop.

pub mod buffer;
pub mod collector;
pub mod correlate;
pub mod delta;
pub mod model;
pub mod monitor;
pub mod process;
pub mod ranking;
pub mod render;
pub mod schedule;
pub mod snapshot;
