//! Rust client for the DRF live drop feed.
//!
//! DRF streams drop and session information for a player over a websocket.
//! [`DrfClient::subscribe`] connects, authenticates with a DRF API key and
//! exposes the feed as a [`futures_util::Stream`] of [`DrfMessage`] values.
//!
//! ```no_run
//! use drf_client::DrfClient;
//! use futures_util::StreamExt;
//! use secrecy::SecretString;
//!
//! # async fn run() -> Result<(), drf_client::DrfError> {
//! let client = DrfClient::new();
//! let mut messages = client.subscribe(SecretString::new("<api-key>".to_string()));
//! while let Some(message) = messages.next().await {
//!     println!("{:?}", message?);
//! }
//! # Ok(())
//! # }
//! ```

/// Realtime stream client, protocol types, and transport session.
pub mod stream;

pub use stream::client::{DrfClient, DrfError, DRF_HOST, DRF_WS_PATH};
pub use stream::proto::{
    DataMessage, DecodeError, DrfMessage, DropInfo, SessionUpdateMessage,
};
pub use stream::session::{
    CloseInfo, Connector, ConnectorOptions, Session, TungsteniteConnector, NORMAL_CLOSURE,
};
pub use stream::subscription::Subscription;
