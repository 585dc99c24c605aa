//! Transport session owning a single websocket connection.
//!
//! A [`Session`] is opened through a [`Connector`], sends the bearer
//! authentication frame and hands out inbound frames one at a time. When the
//! connection ends the session records a [`CloseInfo`] describing why.

use std::borrow::Cow;
use std::future::Future;
use std::io;
use std::sync::Once;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use secrecy::{ExposeSecret, SecretString};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::{CloseFrame, WebSocketConfig};
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{connect_async_with_config, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info};

use crate::stream::client::DrfError;

/// Websocket "normal closure" status code.
pub const NORMAL_CLOSURE: u16 = 1000;
/// Reported when the peer closed without a status code.
pub const NO_STATUS_RECEIVED: u16 = 1005;
/// Reported when the connection dropped without a close handshake.
pub const ABNORMAL_CLOSURE: u16 = 1006;

/// Close status observed when a connection ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CloseInfo {
    pub code: u16,
    pub reason: String,
}

impl CloseInfo {
    pub fn new(code: u16, reason: impl Into<String>) -> Self {
        Self {
            code,
            reason: reason.into(),
        }
    }

    /// Whether the connection ended with the normal closure code.
    pub fn is_normal(&self) -> bool {
        self.code == NORMAL_CLOSURE
    }

    fn from_frame(frame: Option<CloseFrame<'_>>) -> Self {
        match frame {
            Some(frame) => Self::new(u16::from(frame.code), frame.reason.into_owned()),
            None => Self::new(NO_STATUS_RECEIVED, ""),
        }
    }

    fn abnormal(reason: impl Into<String>) -> Self {
        Self::new(ABNORMAL_CLOSURE, reason)
    }
}

/// Connection engine used to establish websocket connections.
///
/// The default engine is [`TungsteniteConnector`]. Alternative engines can be
/// injected into [`DrfClient`](crate::stream::client::DrfClient), e.g. to route
/// traffic through a proxy or to connect to a local test server.
pub trait Connector: Send + Sync + 'static {
    /// Byte stream underneath the websocket.
    type Stream: AsyncRead + AsyncWrite + Unpin + Send + 'static;

    /// Establishes a websocket connection to `url`.
    fn connect(
        &self,
        url: &str,
    ) -> impl Future<Output = Result<WebSocketStream<Self::Stream>, WsError>> + Send;

    /// Releases engine-level resources that are not tied to a single
    /// connection.
    fn shutdown(&self) {}
}

/// Settings for the default connection engine.
///
/// Nothing is limited by default; timeouts only apply when configured here.
#[derive(Clone, Debug, Default)]
pub struct ConnectorOptions {
    /// Upper bound for DNS, TCP, TLS and the websocket handshake combined.
    pub connect_timeout: Option<Duration>,
    /// Websocket protocol limits such as the maximum message size.
    pub websocket_config: Option<WebSocketConfig>,
    pub disable_nagle: bool,
}

/// Default [`Connector`] backed by `tokio-tungstenite`.
#[derive(Clone, Debug, Default)]
pub struct TungsteniteConnector {
    options: ConnectorOptions,
}

impl TungsteniteConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: ConnectorOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &ConnectorOptions {
        &self.options
    }
}

/// Selects `ring` as the process-wide rustls provider unless the application
/// installed one already.
fn install_crypto_provider() {
    static INSTALL: Once = Once::new();
    INSTALL.call_once(|| {
        if rustls::crypto::ring::default_provider()
            .install_default()
            .is_err()
        {
            debug!(event = "drf_crypto_provider_preinstalled");
        }
    });
}

impl Connector for TungsteniteConnector {
    type Stream = MaybeTlsStream<TcpStream>;

    async fn connect(&self, url: &str) -> Result<WebSocketStream<Self::Stream>, WsError> {
        install_crypto_provider();
        let connect = connect_async_with_config(
            url,
            self.options.websocket_config.clone(),
            self.options.disable_nagle,
        );

        let (socket, _response) = match self.options.connect_timeout {
            Some(limit) => tokio::time::timeout(limit, connect).await.map_err(|_| {
                WsError::Io(io::Error::new(
                    io::ErrorKind::TimedOut,
                    format!("websocket connect timed out after {limit:?}"),
                ))
            })??,
            None => connect.await?,
        };
        Ok(socket)
    }
}

/// Inbound data frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Frame {
    Text(String),
    Binary(Vec<u8>),
    /// Text frame whose payload is not valid UTF-8.
    InvalidText,
}

/// A single websocket connection used by one subscription.
///
/// Dropping a session aborts the connection: the socket is released
/// immediately and the peer sees a reset instead of a close frame. Call
/// [`Session::close`] to perform the closing handshake first.
#[derive(Debug)]
pub struct Session<S> {
    socket: WebSocketStream<S>,
    url: String,
    close_info: Option<CloseInfo>,
    closed: bool,
}

impl<S> Session<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Opens a websocket connection to `url` through `connector`.
    pub async fn open<C>(connector: &C, url: &str) -> Result<Self, DrfError>
    where
        C: Connector<Stream = S>,
    {
        let socket = connector
            .connect(url)
            .await
            .map_err(|source| DrfError::Connection {
                url: url.to_string(),
                source,
            })?;
        debug!(event = "drf_session_opened", url);

        Ok(Self {
            socket,
            url: url.to_string(),
            close_info: None,
            closed: false,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Sends the `Bearer <api key>` frame.
    ///
    /// The protocol has no acknowledgement, so this returns as soon as the
    /// frame is written. A rejected key shows up later as a close code.
    pub async fn authenticate(&mut self, api_key: &SecretString) -> Result<(), DrfError> {
        let frame = Message::Text(format!("Bearer {}", api_key.expose_secret()));
        self.socket
            .send(frame)
            .await
            .map_err(|source| DrfError::Connection {
                url: self.url.clone(),
                source,
            })?;
        debug!(event = "drf_auth_sent", url = %self.url);
        Ok(())
    }

    /// Receives the next data frame.
    ///
    /// Returns `None` once the connection has ended; [`Session::close_info`]
    /// then reports how it ended.
    pub async fn next_frame(&mut self) -> Option<Frame> {
        if self.close_info.is_some() {
            return None;
        }

        loop {
            match self.socket.next().await {
                Some(Ok(Message::Text(text))) => return Some(Frame::Text(text)),
                Some(Ok(Message::Binary(data))) => return Some(Frame::Binary(data)),
                Some(Ok(Message::Close(frame))) => {
                    let info = CloseInfo::from_frame(frame);
                    info!(
                        event = "drf_close_received",
                        code = info.code,
                        reason = %info.reason
                    );
                    self.close_info = Some(info);
                    return None;
                }
                // tungstenite answers pings on the next read
                Some(Ok(_)) => {}
                Some(Err(WsError::Utf8 { .. })) => return Some(Frame::InvalidText),
                Some(Err(err)) => {
                    debug!(event = "drf_socket_error", error = %err);
                    self.close_info = Some(CloseInfo::abnormal(err.to_string()));
                    return None;
                }
                None => {
                    self.close_info = Some(CloseInfo::abnormal(""));
                    return None;
                }
            }
        }
    }

    /// Returns how the connection ended, discarding any frames still pending
    /// if it has not ended yet.
    pub async fn close_info(&mut self) -> CloseInfo {
        loop {
            if let Some(info) = &self.close_info {
                return info.clone();
            }
            let _ = self.next_frame().await;
        }
    }

    /// Closes the connection. Calling this more than once is a no-op.
    pub async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        let frame = CloseFrame {
            code: CloseCode::Normal,
            reason: Cow::Borrowed(""),
        };
        // The peer may already be gone, there is nothing left to release then.
        if let Err(err) = self.socket.close(Some(frame)).await {
            debug!(event = "drf_session_close_failed", error = %err);
        }
        debug!(event = "drf_session_closed", url = %self.url);
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

/// Aborts the connection without a closing handshake unless
/// [`Session::close`] already ran.
impl<S> Drop for Session<S> {
    fn drop(&mut self) {
        if !self.closed {
            debug!(event = "drf_session_aborted", url = %self.url);
        }
    }
}
