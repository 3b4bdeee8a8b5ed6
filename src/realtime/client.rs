use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{broadcast, watch};
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::messages::PhoenixMessage;
use crate::config::{BackendConfig, RealtimeSettings};
use crate::sync::RealtimeEvent;
use crate::traits::RealtimeConnection;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;
type WsSource = SplitStream<WsStream>;

/// Why a live connection ended.
enum SessionEnd {
    Shutdown,
    Closed(String),
}

/// Reconnect delay for the 1-based `attempt`: 1s, 2s, 4s, ... capped.
pub fn reconnect_backoff(attempt: u32, max_backoff_secs: u64) -> Duration {
    let exp = attempt.saturating_sub(1).min(63);
    Duration::from_secs(std::cmp::min(1u64 << exp, max_backoff_secs))
}

/// Realtime websocket client reporting connectivity as [`RealtimeEvent`]s.
///
/// Nothing connects until [`start`](Self::start) is called, so subscribers
/// attached beforehand see the first `Connected`.
#[derive(Clone)]
pub struct RealtimeClient {
    url: String,
    settings: RealtimeSettings,
    events_tx: broadcast::Sender<RealtimeEvent>,
    token_tx: Arc<watch::Sender<Option<String>>>,
    shutdown: CancellationToken,
    started: Arc<AtomicBool>,
}

impl RealtimeClient {
    pub fn new(config: &BackendConfig, access_token: Option<String>) -> Self {
        Self::with_url(config.realtime_url(), config.realtime.clone(), access_token)
    }

    pub fn with_url(url: String, settings: RealtimeSettings, access_token: Option<String>) -> Self {
        let (events_tx, _) = broadcast::channel(100);
        let (token_tx, _) = watch::channel(access_token);
        Self {
            url,
            settings,
            events_tx,
            token_tx: Arc::new(token_tx),
            shutdown: CancellationToken::new(),
            started: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Spawn the connection loop. Later calls do nothing.
    pub fn start(&self) {
        if self.started.swap(true, Ordering::SeqCst) {
            return;
        }
        let client = self.clone();
        tokio::spawn(async move {
            client.run().await;
        });
    }

    /// Use a new access token for joined channels and future joins.
    pub fn set_access_token(&self, token: Option<String>) {
        self.token_tx.send_if_modified(|current| {
            if *current == token {
                false
            } else {
                *current = token;
                true
            }
        });
    }

    fn emit(&self, event: RealtimeEvent) {
        // Ignore send errors (no subscribers)
        let _ = self.events_tx.send(event);
    }

    async fn run(&self) {
        let mut attempt: u32 = 0;

        loop {
            let connect = tokio::time::timeout(
                self.settings.connect_timeout,
                connect_async(self.url.as_str()),
            );
            let connected = tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => break,
                result = connect => result,
            };

            match connected {
                Ok(Ok((ws, _))) => {
                    info!(attempt, "Realtime connected");
                    attempt = 0;
                    self.emit(RealtimeEvent::Connected);

                    match self.run_session(ws).await {
                        SessionEnd::Shutdown => break,
                        SessionEnd::Closed(reason) => {
                            info!(reason = %reason, "Realtime disconnected");
                            self.emit(RealtimeEvent::Disconnected { reason });
                        }
                    }
                }
                Ok(Err(e)) => {
                    warn!(attempt, error = %e, "Realtime connection failed");
                }
                Err(_) => {
                    warn!(
                        attempt,
                        timeout_secs = self.settings.connect_timeout.as_secs(),
                        "Realtime connection timed out"
                    );
                }
            }

            attempt += 1;
            if attempt > self.settings.max_retries {
                error!(
                    "Failed to reconnect after {} attempts, giving up",
                    self.settings.max_retries
                );
                self.emit(RealtimeEvent::Error {
                    message: format!(
                        "gave up reconnecting after {} attempts",
                        self.settings.max_retries
                    ),
                });
                break;
            }

            let backoff = reconnect_backoff(attempt, self.settings.max_backoff_secs);
            info!(
                "Reconnection attempt {} of {}, waiting {}s",
                attempt,
                self.settings.max_retries,
                backoff.as_secs()
            );
            tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => break,
                _ = tokio::time::sleep(backoff) => {}
            }
        }

        debug!("Realtime loop ended");
    }

    async fn run_session(&self, ws: WsStream) -> SessionEnd {
        let (mut sink, mut source): (WsSink, WsSource) = ws.split();
        let mut next_ref: u64 = 0;
        let mut bump = move || {
            next_ref += 1;
            next_ref
        };
        let mut token_rx = self.token_tx.subscribe();

        let token = token_rx.borrow_and_update().clone();
        for topic in &self.settings.topics {
            let join = PhoenixMessage::join(topic, token.as_deref(), bump());
            if let Err(reason) = send(&mut sink, &join).await {
                return SessionEnd::Closed(reason);
            }
        }

        let mut heartbeat = tokio::time::interval(self.settings.heartbeat_interval);
        heartbeat.tick().await;

        loop {
            tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => {
                    debug!("Shutdown signal received, closing connection");
                    let _ = sink.close().await;
                    return SessionEnd::Shutdown;
                }
                _ = heartbeat.tick() => {
                    let frame = PhoenixMessage::heartbeat(bump());
                    if let Err(reason) = send(&mut sink, &frame).await {
                        return SessionEnd::Closed(reason);
                    }
                }
                changed = token_rx.changed() => {
                    if changed.is_err() {
                        continue;
                    }
                    let token = token_rx.borrow_and_update().clone();
                    if let Some(token) = token {
                        for topic in &self.settings.topics {
                            let frame = PhoenixMessage::access_token(topic, &token, bump());
                            if let Err(reason) = send(&mut sink, &frame).await {
                                return SessionEnd::Closed(reason);
                            }
                        }
                    }
                }
                msg = source.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            match serde_json::from_str::<PhoenixMessage>(&text) {
                                Ok(frame) => {
                                    debug!(topic = %frame.topic, event = %frame.event, "Realtime frame");
                                    if let Some(event) = frame.into_event() {
                                        self.emit(event);
                                    }
                                }
                                Err(e) => {
                                    warn!("Failed to parse realtime frame: {} - {}", e, text);
                                }
                            }
                        }
                        Some(Ok(Message::Ping(data))) => {
                            let _ = sink.send(Message::Pong(data)).await;
                        }
                        Some(Ok(Message::Close(frame))) => {
                            let reason = frame
                                .map(|f| f.reason.to_string())
                                .filter(|r| !r.is_empty())
                                .unwrap_or_else(|| "closed by server".to_string());
                            return SessionEnd::Closed(reason);
                        }
                        Some(Ok(_)) => {}
                        Some(Err(e)) => {
                            error!("Realtime websocket error: {}", e);
                            return SessionEnd::Closed(e.to_string());
                        }
                        None => return SessionEnd::Closed("stream ended".to_string()),
                    }
                }
            }
        }
    }
}

async fn send(sink: &mut WsSink, frame: &PhoenixMessage) -> Result<(), String> {
    let json = serde_json::to_string(frame).map_err(|e| e.to_string())?;
    sink.send(Message::Text(json)).await.map_err(|e| e.to_string())
}

impl RealtimeConnection for RealtimeClient {
    fn subscribe(&self) -> broadcast::Receiver<RealtimeEvent> {
        self.events_tx.subscribe()
    }

    fn shutdown(&self) {
        info!("Shutting down realtime client");
        self.shutdown.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[test]
    fn test_reconnect_backoff() {
        assert_eq!(reconnect_backoff(1, 30), Duration::from_secs(1));
        assert_eq!(reconnect_backoff(2, 30), Duration::from_secs(2));
        assert_eq!(reconnect_backoff(5, 30), Duration::from_secs(16));
        assert_eq!(reconnect_backoff(6, 30), Duration::from_secs(30));
        assert_eq!(reconnect_backoff(100, 30), Duration::from_secs(30));
    }

    fn settings(topics: Vec<String>) -> RealtimeSettings {
        RealtimeSettings {
            topics,
            heartbeat_interval: Duration::from_secs(25),
            max_retries: 0,
            max_backoff_secs: 1,
            connect_timeout: Duration::from_secs(5),
        }
    }

    #[tokio::test]
    async fn test_connects_joins_and_reports_disconnect() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
            let join = match ws.next().await.unwrap().unwrap() {
                Message::Text(text) => serde_json::from_str::<PhoenixMessage>(&text).unwrap(),
                other => panic!("unexpected frame {:?}", other),
            };
            let broadcast = PhoenixMessage {
                topic: "realtime:bookings".to_string(),
                event: "broadcast".to_string(),
                payload: serde_json::json!({"id": 1}),
                msg_ref: None,
            };
            ws.send(Message::Text(serde_json::to_string(&broadcast).unwrap()))
                .await
                .unwrap();
            ws.close(None).await.unwrap();
            join
        });

        let client = RealtimeClient::with_url(
            format!("ws://{}/realtime/v1/websocket", addr),
            settings(vec!["bookings".to_string()]),
            Some("at-1".to_string()),
        );
        let mut events = client.subscribe();
        client.start();

        assert_eq!(events.recv().await.unwrap(), RealtimeEvent::Connected);
        assert!(matches!(
            events.recv().await.unwrap(),
            RealtimeEvent::Message { ref event, .. } if event == "broadcast"
        ));
        assert!(matches!(
            events.recv().await.unwrap(),
            RealtimeEvent::Disconnected { .. }
        ));
        // max_retries = 0 gives up right after the first disconnect.
        assert!(matches!(events.recv().await.unwrap(), RealtimeEvent::Error { .. }));

        let join = server.await.unwrap();
        assert_eq!(join.event, "phx_join");
        assert_eq!(join.topic, "realtime:bookings");
        assert_eq!(join.payload["access_token"], "at-1");
    }

    #[tokio::test]
    async fn test_shutdown_before_connect_emits_nothing() {
        let client = RealtimeClient::with_url(
            "ws://127.0.0.1:9/realtime/v1/websocket".to_string(),
            settings(Vec::new()),
            None,
        );
        let mut events = client.subscribe();
        client.shutdown();
        client.start();
        tokio::task::yield_now().await;
        assert!(matches!(
            events.try_recv(),
            Err(broadcast::error::TryRecvError::Empty)
        ));
    }

    #[tokio::test]
    async fn test_hung_connect_times_out_and_gives_up() {
        // Accepts TCP but never answers the websocket handshake.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            std::future::pending::<()>().await;
            drop(stream);
        });

        let mut settings = settings(Vec::new());
        settings.connect_timeout = Duration::from_millis(50);
        let client = RealtimeClient::with_url(
            format!("ws://{}/realtime/v1/websocket", addr),
            settings,
            None,
        );
        let mut events = client.subscribe();
        client.start();

        let event = tokio::time::timeout(Duration::from_secs(5), events.recv())
            .await
            .expect("connect was never abandoned")
            .unwrap();
        assert!(matches!(event, RealtimeEvent::Error { .. }));
        server.abort();
    }

    #[test]
    fn test_set_access_token_updates_watch() {
        let client = RealtimeClient::with_url(
            "ws://localhost/realtime".to_string(),
            settings(Vec::new()),
            None,
        );
        client.set_access_token(Some("at-2".to_string()));
        assert_eq!(*client.token_tx.borrow(), Some("at-2".to_string()));
    }
}
