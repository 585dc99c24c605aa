//! Lazy message stream built on top of a [`Session`].
//!
//! Nothing touches the network until the returned [`Subscription`] is polled
//! for the first time. All I/O is driven by the consumer's polling; no task is
//! spawned. Dropping the subscription cancels it and releases the socket.

use std::fmt;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures_util::stream::{self, BoxStream};
use futures_util::{Stream, StreamExt};
use secrecy::SecretString;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{info, warn};

use crate::stream::client::DrfError;
use crate::stream::proto::{DecodeError, DrfMessage};
use crate::stream::session::{CloseInfo, Connector, Frame, Session};

/// Stream of messages from one DRF subscription.
///
/// Yields decoded messages in the order they were received. The stream ends
/// with `None` after a normal close, or with a single `Err` followed by `None`
/// on failure.
pub struct Subscription {
    inner: BoxStream<'static, Result<DrfMessage, DrfError>>,
}

impl Subscription {
    pub(crate) fn new<C>(connector: Arc<C>, url: String, api_key: SecretString) -> Self
    where
        C: Connector,
    {
        let pending = State::Pending {
            connector,
            url,
            api_key,
        };

        let inner = stream::try_unfold(pending, |state| async move {
            let mut session = match state {
                State::Pending {
                    connector,
                    url,
                    api_key,
                } => start(connector.as_ref(), &url, &api_key).await?,
                State::Streaming(session) => session,
            };

            match next_message(&mut session).await {
                Ok(Some(message)) => {
                    Ok::<_, DrfError>(Some((message, State::Streaming(session))))
                }
                outcome => {
                    session.close().await;
                    info!(
                        event = "drf_subscription_finished",
                        url = session.url(),
                        failed = outcome.is_err()
                    );
                    outcome.map(|_| None)
                }
            }
        });

        Self {
            inner: inner.boxed(),
        }
    }
}

impl Stream for Subscription {
    type Item = Result<DrfMessage, DrfError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.poll_next_unpin(cx)
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").finish_non_exhaustive()
    }
}

enum State<C: Connector> {
    Pending {
        connector: Arc<C>,
        url: String,
        api_key: SecretString,
    },
    Streaming(Session<C::Stream>),
}

async fn start<C>(
    connector: &C,
    url: &str,
    api_key: &SecretString,
) -> Result<Session<C::Stream>, DrfError>
where
    C: Connector,
{
    let mut session = Session::open(connector, url).await?;
    if let Err(err) = session.authenticate(api_key).await {
        session.close().await;
        return Err(err);
    }
    info!(event = "drf_subscription_started", url);
    Ok(session)
}

/// Pulls the next message, or the terminal outcome once the frames run out.
async fn next_message<S>(session: &mut Session<S>) -> Result<Option<DrfMessage>, DrfError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let decoded = match session.next_frame().await {
        Some(Frame::Text(text)) => DrfMessage::from_text(&text),
        Some(Frame::Binary(_)) => Err(DecodeError::UnexpectedFrame("binary")),
        Some(Frame::InvalidText) => Err(DecodeError::InvalidUtf8),
        None => {
            let close_info = session.close_info().await;
            return check_close(close_info).map(|()| None);
        }
    };

    match decoded {
        Ok(message) => Ok(Some(message)),
        Err(err) => {
            warn!(event = "drf_decode_failed", url = session.url(), error = %err);
            Err(DrfError::Decode(err))
        }
    }
}

fn check_close(close_info: CloseInfo) -> Result<(), DrfError> {
    if close_info.is_normal() {
        return Ok(());
    }
    Err(DrfError::SocketClosed {
        code: close_info.code,
        reason: close_info.reason,
    })
}
