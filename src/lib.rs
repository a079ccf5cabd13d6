// src/lib.rs
//
// Hazard detection core for a depth-sensing cane: floor drop-offs and
// upright obstacles from plane hits and a depth map, debounced into spoken
// and haptic alerts.

pub mod config;
pub mod detection;
pub mod host;
pub mod pipeline;
pub mod sim;
pub mod types;

pub use types::Config;
