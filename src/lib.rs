// ABOUTME: Main library entry point for peersync
// ABOUTME: Synchronized multi-peer playback and a live capture/encode pipeline

#![warn(missing_docs)]
//! Keeps independent playback peers on a shared reference clock and
//! streams a live feed captured on one peer to the others.

/// Audio playback control, capture and encoding
pub mod audio;
/// Tunables and their defaults
pub mod config;
/// Async controller driving the engine
pub mod controller;
/// Control endpoint selection
pub mod discovery;
/// Synchronous sync engine
pub mod engine;
/// Error types
pub mod error;
/// Control channel protocol
pub mod protocol;
/// Playback scheduling
pub mod scheduler;
/// Status events for the UI layer
pub mod status;
/// Clock synchronization and drift correction
pub mod sync;

pub use config::{CaptureConfig, SyncConfig};
pub use controller::{ControlEvent, ControlTransport, SyncController};
pub use discovery::{ServiceEndpoint, ServiceRegistry};
pub use engine::{SyncEngine, Telemetry};
pub use error::Error;
pub use protocol::{ProtocolClient, ProtocolClientBuilder, WsSender};
pub use status::{StatusEvent, StatusReporter};
