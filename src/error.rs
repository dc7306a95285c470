// ABOUTME: Error types for peersync
// ABOUTME: One enum covering protocol, transport, player, capture and encoder failures

use thiserror::Error;

/// Errors produced by peersync
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed or unexpected control message
    #[error("protocol error: {0}")]
    Protocol(String),

    /// WebSocket connection or transport failure
    #[error("connection error: {0}")]
    Connection(String),

    /// JSON (de)serialization failure
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// Player capability rejected an operation
    #[error("player error: {0}")]
    Player(String),

    /// Capture source could not be opened or failed
    #[error("capture error: {0}")]
    Capture(String),

    /// Encoder could not be started or failed
    #[error("encoder error: {0}")]
    Encoder(String),

    /// Frame could not be described by an ADTS header
    #[error("framing error: {0}")]
    Framing(String),

    /// Outbound queue is full and the frame was not taken
    #[error("sink full")]
    SinkFull,

    /// Outbound channel has been closed by the receiving side
    #[error("channel closed")]
    ChannelClosed,
}
