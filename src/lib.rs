// Wazewatch: geo-alert ingestion, deduplication and fan-out
//
// This is the library root. Each module corresponds to a subsystem of the
// polling pipeline; main.rs wires them together.

pub mod alerts;
pub mod app;
pub mod config;
pub mod db;
pub mod error;
pub mod feed;
pub mod hub;
pub mod notify;
pub mod pipeline;
pub mod scheduler;
pub mod state;
pub mod status;

#[cfg(feature = "web")]
pub mod web;
