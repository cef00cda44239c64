//! Polygon WebSocket Client
//!
//! Runs one live session at a time against the Polygon stocks stream:
//!
//! ```text
//! Connecting → Authenticated → Subscribed → Streaming → {Closed | Failed}
//! ```
//!
//! The client never retries on its own. Each call to
//! [`PolygonClient::run_session`] drives a fresh [`FeedSession`] to a
//! terminal state and returns a [`SessionReport`]; the supervisor decides
//! what happens next.

use std::sync::Arc;
use std::time::Duration;

use futures_util::{Sink, SinkExt, Stream, StreamExt};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_util::sync::CancellationToken;

use super::auth::{AUTH_TIMEOUT, ApiKey, AuthError};
use super::codec::{self, Frame};
use super::heartbeat::{HeartbeatConfig, HeartbeatEvent, HeartbeatManager, HeartbeatState};
use super::messages::{AuthRequest, StatusEvent, StatusKind, SubscribeRequest, is_status};
use super::normalize::normalize_batch;
use crate::application::services::publisher::TickPublisher;
use crate::application::services::status::FeedStatus;
use crate::domain::session::{FeedSession, SessionError, SessionState};
use crate::domain::watchlist::Watchlist;
use crate::infrastructure::metrics::{self, FeedKind};

/// Default Polygon stocks stream.
pub const DEFAULT_POLYGON_WS_URL: &str = "wss://socket.polygon.io/stocks";

/// Time allowed for the WebSocket handshake.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

// =============================================================================
// Error Type
// =============================================================================

/// Errors that end a live session.
#[derive(Debug, thiserror::Error)]
pub enum LiveFeedError {
    /// WebSocket transport error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] WsError),

    /// Handshake did not complete in time.
    #[error("connection timed out after {}s", CONNECT_TIMEOUT.as_secs())]
    ConnectTimeout,

    /// Credential rejected, malformed, or never acknowledged.
    #[error("authentication failed: {0}")]
    Auth(#[from] AuthError),

    /// Session state machine rejected a transition.
    #[error(transparent)]
    Session(#[from] SessionError),

    /// Provider violated the expected protocol.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// No inbound frame within the idle timeout.
    #[error("heartbeat timeout")]
    HeartbeatTimeout,
}

impl LiveFeedError {
    /// Whether another session could plausibly succeed.
    ///
    /// A rejected or malformed credential will be rejected again.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        !matches!(
            self,
            Self::Auth(AuthError::InvalidKey(_) | AuthError::Rejected(_))
        )
    }
}

// =============================================================================
// Session Report
// =============================================================================

/// How a session ended.
#[derive(Debug)]
pub enum SessionOutcome {
    /// Process shutdown was requested.
    Cancelled,
    /// Provider closed the connection or the stream ended.
    Closed,
    /// Session failed.
    Failed(LiveFeedError),
}

impl SessionOutcome {
    /// Get the outcome label.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Cancelled => "cancelled",
            Self::Closed => "closed",
            Self::Failed(_) => "failed",
        }
    }
}

/// Result of one live session, handed to the supervisor.
#[derive(Debug)]
pub struct SessionReport {
    /// Attempt number (0 for the first connection).
    pub attempt: u32,
    /// Terminal state of the session.
    pub final_state: SessionState,
    /// Whether the session reached `Streaming`.
    pub reached_streaming: bool,
    /// Ticks this session wrote to the store.
    pub ticks_published: u64,
    /// How the session ended.
    pub outcome: SessionOutcome,
}

// =============================================================================
// Configuration
// =============================================================================

/// Live feed configuration.
#[derive(Clone)]
pub struct LiveFeedConfig {
    /// WebSocket URL.
    pub url: String,
    /// Raw API key, validated when the client is built.
    pub api_key: String,
    /// Wait for `auth_success` before subscribing.
    pub await_auth_ack: bool,
    /// Limit for the acknowledgment wait.
    pub auth_timeout: Duration,
    /// Heartbeat configuration.
    pub heartbeat: HeartbeatConfig,
}

impl LiveFeedConfig {
    /// Configuration for the default endpoint.
    #[must_use]
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            url: DEFAULT_POLYGON_WS_URL.to_string(),
            api_key: api_key.into(),
            await_auth_ack: true,
            auth_timeout: AUTH_TIMEOUT,
            heartbeat: HeartbeatConfig::default(),
        }
    }
}

impl std::fmt::Debug for LiveFeedConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LiveFeedConfig")
            .field("url", &self.url)
            .field("api_key", &"[REDACTED]")
            .field("await_auth_ack", &self.await_auth_ack)
            .field("auth_timeout", &self.auth_timeout)
            .field("heartbeat", &self.heartbeat)
            .finish()
    }
}

// =============================================================================
// Polygon Client
// =============================================================================

/// Polygon WebSocket client.
pub struct PolygonClient {
    url: String,
    api_key: ApiKey,
    await_auth_ack: bool,
    auth_timeout: Duration,
    heartbeat: HeartbeatConfig,
    watchlist: Arc<Watchlist>,
    publisher: TickPublisher,
    status: Arc<FeedStatus>,
    cancel: CancellationToken,
}

impl PolygonClient {
    /// Create a client.
    ///
    /// # Errors
    ///
    /// Returns [`LiveFeedError::Auth`] if the API key is malformed.
    pub fn new(
        config: LiveFeedConfig,
        watchlist: Arc<Watchlist>,
        publisher: TickPublisher,
        status: Arc<FeedStatus>,
        cancel: CancellationToken,
    ) -> Result<Self, LiveFeedError> {
        Ok(Self {
            api_key: ApiKey::new(config.api_key)?,
            url: config.url,
            await_auth_ack: config.await_auth_ack,
            auth_timeout: config.auth_timeout,
            heartbeat: config.heartbeat,
            watchlist,
            publisher,
            status,
            cancel,
        })
    }

    /// Run one session to a terminal state.
    pub async fn run_session(&self, attempt: u32) -> SessionReport {
        let mut session = FeedSession::new(attempt);
        let mut published = 0;
        self.status.set_session_state(session.state());

        let outcome = match self.connect_and_stream(&mut session, &mut published).await {
            Ok(outcome) => outcome,
            Err(e) => SessionOutcome::Failed(e),
        };

        let last_state = session.state();
        match &outcome {
            SessionOutcome::Failed(e) => {
                session.fail();
                tracing::warn!(
                    attempt,
                    state = %last_state,
                    elapsed_ms = session.elapsed().as_millis(),
                    ticks_published = published,
                    error = %e,
                    "Live session failed"
                );
            }
            SessionOutcome::Closed => {
                session.close();
                tracing::info!(
                    attempt,
                    state = %last_state,
                    ticks_published = published,
                    "Live session closed by provider"
                );
            }
            SessionOutcome::Cancelled => {
                session.close();
                tracing::info!(attempt, "Live session cancelled");
            }
        }

        self.status.set_session_state(session.state());
        metrics::record_session_end(outcome.as_str());

        SessionReport {
            attempt,
            final_state: session.state(),
            reached_streaming: session.reached_streaming(),
            ticks_published: published,
            outcome,
        }
    }

    async fn connect_and_stream(
        &self,
        session: &mut FeedSession,
        published: &mut u64,
    ) -> Result<SessionOutcome, LiveFeedError> {
        tracing::info!(url = %self.url, attempt = session.attempt(), "Connecting to Polygon stream");

        let connect = tokio::time::timeout(
            CONNECT_TIMEOUT,
            tokio_tungstenite::connect_async(self.url.as_str()),
        );
        let (ws_stream, _response) = tokio::select! {
            () = self.cancel.cancelled() => return Ok(SessionOutcome::Cancelled),
            result = connect => result.map_err(|_| LiveFeedError::ConnectTimeout)??,
        };

        let (mut write, mut read) = ws_stream.split();

        send_json(&mut write, &AuthRequest::new(self.api_key.expose())).await?;
        self.advance(session, SessionState::Authenticated)?;

        if self.await_auth_ack {
            let ack = tokio::time::timeout(self.auth_timeout, await_auth_ack(&mut read, &mut write));
            tokio::select! {
                () = self.cancel.cancelled() => return Ok(SessionOutcome::Cancelled),
                result = ack => result.map_err(|_| AuthError::Timeout(self.auth_timeout))??,
            }
            tracing::info!("Polygon stream authenticated");
        }

        for symbol in self.watchlist.iter() {
            send_json(&mut write, &SubscribeRequest::trades(symbol)).await?;
        }
        self.advance(session, SessionState::Subscribed)?;
        tracing::info!(symbols = %self.watchlist, "Subscribed to trade channels");

        self.advance(session, SessionState::Streaming)?;
        self.stream(&mut read, &mut write, published).await
    }

    fn advance(&self, session: &mut FeedSession, next: SessionState) -> Result<(), LiveFeedError> {
        session.transition(next)?;
        self.status.set_session_state(next);
        Ok(())
    }

    /// Read until the session ends.
    async fn stream<R, W>(
        &self,
        read: &mut R,
        write: &mut W,
        published: &mut u64,
    ) -> Result<SessionOutcome, LiveFeedError>
    where
        R: Stream<Item = Result<Message, WsError>> + Unpin,
        W: Sink<Message, Error = WsError> + Unpin,
    {
        let heartbeat_state = Arc::new(HeartbeatState::new());
        let (heartbeat_tx, mut heartbeat_rx) = mpsc::channel::<HeartbeatEvent>(10);
        let heartbeat_cancel = self.cancel.child_token();
        let _heartbeat_guard = heartbeat_cancel.clone().drop_guard();

        tokio::spawn(
            HeartbeatManager::new(
                self.heartbeat.clone(),
                Arc::clone(&heartbeat_state),
                heartbeat_tx,
                heartbeat_cancel,
            )
            .run(),
        );

        loop {
            tokio::select! {
                () = self.cancel.cancelled() => {
                    let _ = write.send(Message::Close(None)).await;
                    return Ok(SessionOutcome::Cancelled);
                }
                Some(event) = heartbeat_rx.recv() => match event {
                    HeartbeatEvent::SendPing => {
                        write.send(Message::Ping(Vec::new().into())).await?;
                    }
                    HeartbeatEvent::Timeout => return Err(LiveFeedError::HeartbeatTimeout),
                },
                msg = read.next() => match msg {
                    Some(Ok(Message::Text(text))) => {
                        heartbeat_state.record_activity();
                        *published += self.handle_text(&text).await?;
                    }
                    Some(Ok(Message::Ping(data))) => {
                        heartbeat_state.record_activity();
                        write.send(Message::Pong(data)).await?;
                    }
                    Some(Ok(Message::Close(frame))) => {
                        tracing::info!(?frame, "Provider sent close frame");
                        return Ok(SessionOutcome::Closed);
                    }
                    Some(Ok(_)) => heartbeat_state.record_activity(),
                    Some(Err(e)) => return Err(e.into()),
                    None => {
                        tracing::info!("WebSocket stream ended");
                        return Ok(SessionOutcome::Closed);
                    }
                },
            }
        }
    }

    /// Route one text frame and return how many ticks reached the store.
    ///
    /// Only an `auth_failed` status ends the session.
    async fn handle_text(&self, text: &str) -> Result<u64, LiveFeedError> {
        let events = match codec::decode(text) {
            Ok(Frame::Batch(events)) => events,
            Ok(Frame::Control(value)) => {
                tracing::debug!(message = %value, "Discarding control message");
                return Ok(0);
            }
            Err(e) => {
                tracing::warn!(error = %e, "Dropping malformed message");
                self.record_drop("malformed");
                return Ok(0);
            }
        };

        let (statuses, events): (Vec<Value>, Vec<Value>) = events.into_iter().partition(is_status);

        for status in statuses.iter().filter_map(StatusEvent::from_value) {
            if status.status == StatusKind::AuthFailed {
                return Err(AuthError::Rejected(status.message).into());
            }
            tracing::debug!(status = ?status.status, message = %status.message, "Provider status");
        }

        let mut published = 0;
        for result in normalize_batch(&events) {
            match result {
                Ok(tick) => {
                    if self.publisher.publish(&tick, FeedKind::Live).await {
                        published += 1;
                    }
                }
                Err(reason) => {
                    tracing::debug!(reason = reason.as_str(), "Dropping event");
                    self.record_drop(reason.as_str());
                }
            }
        }

        Ok(published)
    }

    fn record_drop(&self, reason: &'static str) {
        metrics::record_message_dropped(reason);
        self.status.record_dropped();
    }
}

impl std::fmt::Debug for PolygonClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PolygonClient")
            .field("url", &self.url)
            .field("api_key", &self.api_key)
            .field("await_auth_ack", &self.await_auth_ack)
            .field("watchlist", &self.watchlist.symbols())
            .finish_non_exhaustive()
    }
}

/// Wait for `auth_success`, answering pings meanwhile.
async fn await_auth_ack<R, W>(read: &mut R, write: &mut W) -> Result<(), LiveFeedError>
where
    R: Stream<Item = Result<Message, WsError>> + Unpin,
    W: Sink<Message, Error = WsError> + Unpin,
{
    loop {
        match read.next().await {
            Some(Ok(Message::Text(text))) => {
                let Ok(Frame::Batch(events)) = codec::decode(&text) else {
                    continue;
                };
                for event in events.iter().filter_map(StatusEvent::from_value) {
                    match event.status {
                        StatusKind::AuthSuccess => return Ok(()),
                        StatusKind::AuthFailed => {
                            return Err(AuthError::Rejected(event.message).into());
                        }
                        StatusKind::Connected | StatusKind::Other => {
                            tracing::debug!(message = %event.message, "Provider status before auth");
                        }
                    }
                }
            }
            Some(Ok(Message::Ping(data))) => write.send(Message::Pong(data)).await?,
            Some(Ok(Message::Close(_))) | None => {
                return Err(LiveFeedError::Protocol(
                    "connection closed before authentication".to_string(),
                ));
            }
            Some(Ok(_)) => {}
            Some(Err(e)) => return Err(e.into()),
        }
    }
}

async fn send_json<W, T>(write: &mut W, payload: &T) -> Result<(), LiveFeedError>
where
    W: Sink<Message, Error = WsError> + Unpin,
    T: Serialize,
{
    let json = serde_json::to_string(payload)
        .map_err(|e| LiveFeedError::Protocol(format!("failed to serialize request: {e}")))?;
    write.send(Message::Text(json.into())).await?;
    Ok(())
}
