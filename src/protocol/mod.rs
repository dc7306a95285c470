// ABOUTME: Control channel protocol between peers and the coordinator
// ABOUTME: Message types, binary audio framing, and the WebSocket client

/// WebSocket client implementation
pub mod client;
/// Builder for easy construction of the client
pub mod client_builder;
/// Protocol message type definitions and serialization
pub mod messages;

pub use client::{ProtocolClient, WsSender};
pub use client_builder::ProtocolClientBuilder;
pub use messages::{AudioChunk, Message};
