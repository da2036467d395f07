//! Change feed client: connection management and per-table subscriptions

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use log::{debug, error, warn};
use serde_json::json;
use tokio::sync::{broadcast, mpsc, RwLock};
use tokio::time::sleep;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use url::Url;

use crate::error::Error;
use crate::realtime::message::{ChangeEvent, FeedEvent, FeedMessage};

/// Connection state of the change feed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

type TopicMap = Arc<RwLock<HashMap<String, broadcast::Sender<ChangeEvent>>>>;

/// Client for the realtime change feed
///
/// There is no automatic reconnection: a terminated feed is terminal,
/// consistent with the no-retry policy of the rest of the client. Callers
/// may `connect` again and re-establish their subscriptions.
#[derive(Clone)]
pub struct ChangeFeed {
    url: String,
    key: String,
    heartbeat: Duration,
    next_ref: Arc<AtomicU32>,
    topics: TopicMap,
    socket: Arc<RwLock<Option<mpsc::Sender<Message>>>>,
    state: Arc<RwLock<ConnectionState>>,
    state_changes: broadcast::Sender<ConnectionState>,
    access_token: Arc<RwLock<Option<String>>>,
}

impl ChangeFeed {
    /// Create a new, disconnected change feed
    pub fn new(url: &str, key: &str, heartbeat: Duration) -> Self {
        let (state_changes, _) = broadcast::channel(16);
        Self {
            url: url.to_string(),
            key: key.to_string(),
            heartbeat,
            next_ref: Arc::new(AtomicU32::new(1)),
            topics: Arc::new(RwLock::new(HashMap::new())),
            socket: Arc::new(RwLock::new(None)),
            state: Arc::new(RwLock::new(ConnectionState::Disconnected)),
            state_changes,
            access_token: Arc::new(RwLock::new(None)),
        }
    }

    /// Set the access token appended to the next connection attempt
    pub async fn set_auth(&self, token: Option<String>) {
        *self.access_token.write().await = token;
    }

    /// Current connection state
    pub async fn connection_state(&self) -> ConnectionState {
        *self.state.read().await
    }

    /// Subscribe to connection state changes
    pub fn on_state_change(&self) -> broadcast::Receiver<ConnectionState> {
        self.state_changes.subscribe()
    }

    fn next_ref(&self) -> u32 {
        self.next_ref.fetch_add(1, Ordering::SeqCst)
    }

    fn websocket_url(&self, token: Option<&str>) -> Result<String, Error> {
        let ws_base = self
            .url
            .replace("http://", "ws://")
            .replace("https://", "wss://");
        let token_param = token
            .map(|t| format!("&token={}", t))
            .unwrap_or_default();
        let ws_url = format!(
            "{}/realtime/v1/websocket?vsn=2.0.0&apikey={}{}",
            ws_base.trim_end_matches('/'),
            self.key,
            token_param
        );

        let parsed = Url::parse(&ws_url)?;
        match parsed.scheme() {
            "ws" | "wss" => Ok(ws_url),
            scheme => Err(Error::realtime(format!(
                "unsupported URL scheme: {}",
                scheme
            ))),
        }
    }

    /// Open the websocket connection and start the reader/writer tasks
    ///
    /// Idempotent while connected.
    pub async fn connect(&self) -> Result<(), Error> {
        if self.connection_state().await == ConnectionState::Connected {
            return Ok(());
        }
        self.set_state(ConnectionState::Connecting).await;

        let token = self.access_token.read().await.clone();
        let ws_url = match self.websocket_url(token.as_deref()) {
            Ok(url) => url,
            Err(err) => {
                self.set_state(ConnectionState::Disconnected).await;
                return Err(err);
            }
        };

        debug!("connecting change feed to {}", self.url);
        let (stream, _response) = match connect_async(&ws_url).await {
            Ok(connected) => connected,
            Err(err) => {
                self.set_state(ConnectionState::Disconnected).await;
                return Err(Error::WebSocket(err));
            }
        };

        let (mut write, mut read) = stream.split();
        let (socket_tx, mut socket_rx) = mpsc::channel::<Message>(100);
        *self.socket.write().await = Some(socket_tx.clone());
        self.set_state(ConnectionState::Connected).await;

        // Writer task: drains the mpsc queue into the websocket sink
        let writer_socket = self.socket.clone();
        let writer_state = self.state.clone();
        let writer_changes = self.state_changes.clone();
        tokio::spawn(async move {
            while let Some(message) = socket_rx.recv().await {
                if let Err(err) = write.send(message).await {
                    error!("change feed send failed: {}", err);
                    *writer_socket.write().await = None;
                    Self::store_state(&writer_state, &writer_changes, ConnectionState::Disconnected)
                        .await;
                    socket_rx.close();
                    break;
                }
            }
            debug!("change feed writer task finished");
        });

        // Reader task: routes incoming messages and keeps the heartbeat
        let reader_socket = self.socket.clone();
        let reader_state = self.state.clone();
        let reader_changes = self.state_changes.clone();
        let topics = self.topics.clone();
        let heartbeat = self.heartbeat;
        let heartbeat_ref = self.next_ref.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;

                    incoming = read.next() => match incoming {
                        Some(Ok(Message::Text(text))) => {
                            Self::route_message(&topics, &text).await;
                        }
                        Some(Ok(message)) if message.is_close() => {
                            debug!("change feed closed by remote");
                            break;
                        }
                        Some(Ok(_)) => {}
                        Some(Err(err)) => {
                            error!("change feed read failed: {}", err);
                            break;
                        }
                        None => break,
                    },

                    _ = sleep(heartbeat) => {
                        let message = json!({
                            "topic": "phoenix",
                            "event": "heartbeat",
                            "payload": {},
                            "ref": heartbeat_ref.fetch_add(1, Ordering::SeqCst),
                        });
                        if socket_tx.send(Message::Text(message.to_string())).await.is_err() {
                            warn!("change feed heartbeat not sent, assuming connection lost");
                            break;
                        }
                    }
                }
            }
            *reader_socket.write().await = None;
            Self::store_state(&reader_state, &reader_changes, ConnectionState::Disconnected).await;
        });

        Ok(())
    }

    async fn route_message(topics: &TopicMap, text: &str) {
        let message = match serde_json::from_str::<FeedMessage>(text) {
            Ok(message) => message,
            Err(err) => {
                warn!("unparseable change feed message: {}", err);
                return;
            }
        };

        match message.event {
            FeedEvent::PostgresChanges => {
                let change = match serde_json::from_value::<ChangeEvent>(message.payload) {
                    Ok(change) => change,
                    Err(err) => {
                        warn!("unparseable change payload on {}: {}", message.topic, err);
                        return;
                    }
                };
                let topics = topics.read().await;
                if let Some(sender) = topics.get(&message.topic) {
                    // Send errors only mean every receiver is gone
                    let _ = sender.send(change);
                } else {
                    debug!("change event for unsubscribed topic {}", message.topic);
                }
            }
            FeedEvent::Reply => debug!("reply on {}: {}", message.topic, message.payload),
            FeedEvent::ChannelError => {
                warn!("channel error on {}: {}", message.topic, message.payload)
            }
            FeedEvent::Close => debug!("channel {} closed", message.topic),
            _ => {}
        }
    }

    /// Subscribe to all change events on a table
    ///
    /// Joins the table topic on first subscription; later subscribers share
    /// the channel. The feed must be connected.
    pub async fn subscribe(&self, table: &str) -> Result<TableEvents, Error> {
        if self.connection_state().await != ConnectionState::Connected {
            return Err(Error::realtime("change feed is not connected"));
        }

        let topic = format!("realtime:public:{}", table);
        let mut topics = self.topics.write().await;
        let (is_new_topic, rx) = match topics.get(&topic) {
            Some(sender) => (false, sender.subscribe()),
            None => {
                let (sender, rx) = broadcast::channel(64);
                topics.insert(topic.clone(), sender);
                (true, rx)
            }
        };
        drop(topics);

        if is_new_topic {
            let join = json!({
                "topic": topic,
                "event": "phx_join",
                "payload": {
                    "config": {
                        "postgres_changes": [
                            {"event": "*", "schema": "public", "table": table}
                        ]
                    }
                },
                "ref": self.next_ref(),
            });
            if let Err(err) = self.send(join).await {
                self.topics.write().await.remove(&topic);
                return Err(err);
            }
        }

        Ok(TableEvents {
            topic,
            feed: self.clone(),
            rx,
        })
    }

    /// Close the connection; reader and writer tasks wind down on their own
    pub async fn disconnect(&self) {
        if let Some(sender) = self.socket.write().await.take() {
            let _ = sender.send(Message::Close(None)).await;
            debug!("change feed disconnected");
        }
        self.set_state(ConnectionState::Disconnected).await;
    }

    pub(crate) async fn send(&self, message: serde_json::Value) -> Result<(), Error> {
        let socket = self.socket.read().await;
        match socket.as_ref() {
            Some(sender) => sender
                .send(Message::Text(message.to_string()))
                .await
                .map_err(|err| Error::realtime(format!("socket task unavailable: {}", err))),
            None => Err(Error::realtime("change feed is not connected")),
        }
    }

    /// Leave a topic once its last receiver is gone
    pub(crate) async fn leave_if_unused(&self, topic: &str) {
        let mut topics = self.topics.write().await;
        let unused = topics
            .get(topic)
            .map(|sender| sender.receiver_count() == 0)
            .unwrap_or(false);
        if !unused {
            return;
        }
        topics.remove(topic);
        drop(topics);

        let message = json!({
            "topic": topic,
            "event": "phx_leave",
            "payload": {},
            "ref": self.next_ref(),
        });
        if let Err(err) = self.send(message).await {
            debug!("leave for {} not sent: {}", topic, err);
        }
    }

    async fn set_state(&self, state: ConnectionState) {
        Self::store_state(&self.state, &self.state_changes, state).await;
    }

    async fn store_state(
        state_arc: &Arc<RwLock<ConnectionState>>,
        changes: &broadcast::Sender<ConnectionState>,
        state: ConnectionState,
    ) {
        let mut current = state_arc.write().await;
        if *current != state {
            debug!("change feed state {:?} -> {:?}", *current, state);
            *current = state;
            let _ = changes.send(state);
        }
    }
}

/// Stream of change events for one table subscription
///
/// Dropping the value leaves the underlying topic when no other subscriber
/// remains.
pub struct TableEvents {
    topic: String,
    feed: ChangeFeed,
    rx: broadcast::Receiver<ChangeEvent>,
}

impl TableEvents {
    /// Receive the next change event
    pub async fn recv(&mut self) -> Result<ChangeEvent, broadcast::error::RecvError> {
        self.rx.recv().await
    }

    /// The topic this subscription is joined to
    pub fn topic(&self) -> &str {
        &self.topic
    }
}

impl Drop for TableEvents {
    fn drop(&mut self) {
        let feed = self.feed.clone();
        let topic = self.topic.clone();
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            handle.spawn(async move {
                feed.leave_if_unused(&topic).await;
            });
        }
    }
}
