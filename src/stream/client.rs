//! DRF client entry point and error type.
//!
//! [`DrfClient`] holds the configuration shared by all subscriptions: the
//! target host and the connection engine. Every call to
//! [`DrfClient::subscribe`] gets its own websocket connection.

use std::fmt;
use std::sync::Arc;

use secrecy::SecretString;
use thiserror::Error;
use tokio_tungstenite::tungstenite::Error as WsError;
use tracing::debug;

use crate::stream::proto::DecodeError;
use crate::stream::session::{Connector, ConnectorOptions, TungsteniteConnector};
use crate::stream::subscription::Subscription;

/// Host of the production DRF service.
pub const DRF_HOST: &str = "drf.rs";
/// Path of the websocket endpoint on the DRF host.
pub const DRF_WS_PATH: &str = "/ws";

/// Entry point for subscribing to the DRF live drop feed.
pub struct DrfClient<C = TungsteniteConnector> {
    connector: Arc<C>,
    host: String,
}

impl DrfClient {
    /// Creates a client for the production host using the default engine.
    pub fn new() -> Self {
        Self::with_connector(TungsteniteConnector::new())
    }

    /// Creates a client using the default engine with explicit options.
    pub fn with_options(options: ConnectorOptions) -> Self {
        Self::with_connector(TungsteniteConnector::with_options(options))
    }
}

impl Default for DrfClient {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> DrfClient<C>
where
    C: Connector,
{
    /// Creates a client for the production host using `connector` to
    /// establish connections.
    pub fn with_connector(connector: C) -> Self {
        Self {
            connector: Arc::new(connector),
            host: DRF_HOST.to_string(),
        }
    }

    /// Sets the host the client connects to, e.g. `drf.rs` or
    /// `localhost:8080`.
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        let host = host.into();
        self.host = host.trim().trim_end_matches('/').to_string();
        self
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn connector(&self) -> &C {
        &self.connector
    }

    /// Websocket URL subscriptions connect to.
    pub fn endpoint(&self) -> String {
        endpoint_url(&self.host)
    }

    /// Subscribes to the live message feed.
    ///
    /// The returned stream is lazy: the connection is opened and the API key
    /// sent when it is first polled. It ends after the server closes the
    /// connection normally, or yields a single error when
    ///
    /// - the connection cannot be established ([`DrfError::Connection`]),
    /// - a frame is not a valid message ([`DrfError::Decode`]),
    /// - the server closes with any other code ([`DrfError::SocketClosed`]).
    ///
    /// Dropping the stream closes the connection. Nothing is retried.
    pub fn subscribe(&self, api_key: SecretString) -> Subscription {
        Subscription::new(Arc::clone(&self.connector), self.endpoint(), api_key)
    }

    /// Shuts down the connection engine.
    ///
    /// Subscriptions that are still running keep their own connection.
    pub fn close(self) {
        debug!(event = "drf_client_closed", host = %self.host);
        self.connector.shutdown();
    }
}

impl<C> Clone for DrfClient<C> {
    fn clone(&self) -> Self {
        Self {
            connector: Arc::clone(&self.connector),
            host: self.host.clone(),
        }
    }
}

impl<C> fmt::Debug for DrfClient<C>
where
    C: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DrfClient")
            .field("connector", &self.connector)
            .field("host", &self.host)
            .finish()
    }
}

pub(crate) fn endpoint_url(host: &str) -> String {
    format!("wss://{host}{DRF_WS_PATH}")
}

/// Errors that terminate a subscription.
#[derive(Debug, Error)]
pub enum DrfError {
    /// The websocket connection could not be established.
    #[error("failed to connect to {url}: {source}")]
    Connection {
        url: String,
        #[source]
        source: WsError,
    },

    /// A received frame is not a valid DRF message.
    #[error("failed to decode message: {0}")]
    Decode(#[from] DecodeError),

    /// The server closed the connection with a code other than normal
    /// closure.
    #[error("socket closed by remote with code {code}: {reason}")]
    SocketClosed { code: u16, reason: String },
}

impl DrfError {
    /// Close code reported by the server, if the connection was closed.
    pub fn close_code(&self) -> Option<u16> {
        match self {
            DrfError::SocketClosed { code, .. } => Some(*code),
            _ => None,
        }
    }
}
