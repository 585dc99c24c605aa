//! Realtime stream modules.
//!
//! - `client`: client configuration, subscribe entry point, and errors.
//! - `proto`: messages sent by the DRF service.
//! - `session`: websocket transport owned by a single subscription.
//! - `subscription`: lazy message stream with close classification.

/// Client entry point and error type.
pub mod client;
/// Stream protocol messages.
pub mod proto;
/// Websocket session and connection engine.
pub mod session;
/// Lazy, cancellable message stream.
pub mod subscription;
