use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use futures_util::{Sink, SinkExt, Stream, StreamExt};
use serde_json::Value;
use tokio::sync::{Mutex, RwLock, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tracing::{debug, error, info, warn};

use crate::error::{BridgeError, Result};

use super::protocol::{EntityState, Event, Incoming, Outgoing, ResultMessage, ServiceTarget, StateChange};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Requests and subscriptions waiting on the reader task.
#[derive(Default)]
pub(super) struct ConnectionState {
    pub(super) pending: HashMap<u64, oneshot::Sender<ResultMessage>>,
    pub(super) subscriptions: HashMap<u64, mpsc::UnboundedSender<Event>>,
}

impl ConnectionState {
    /// Hand an incoming message to whoever is waiting for it.
    pub(super) fn route(&mut self, incoming: Incoming) {
        match incoming {
            Incoming::Result(result) => match self.pending.remove(&result.id) {
                Some(tx) => {
                    let _ = tx.send(result);
                }
                None => debug!(id = result.id, "result for unknown request"),
            },
            Incoming::Event { id, event } => {
                let closed = match self.subscriptions.get(&id) {
                    Some(tx) => tx.send(event).is_err(),
                    None => {
                        debug!(id, "event for unknown subscription");
                        false
                    }
                };
                if closed {
                    self.subscriptions.remove(&id);
                }
            }
            other => debug!(message = ?other, "ignoring message"),
        }
    }
}

/// Connection to the Home Assistant websocket API.
pub struct HassClient {
    state: Arc<Mutex<ConnectionState>>,
    ws_tx: mpsc::UnboundedSender<Message>,
    next_id: AtomicU64,
    reader: JoinHandle<()>,
    writer: JoinHandle<()>,
}

impl HassClient {
    /// Connect to `url` and authenticate with a long-lived access token.
    pub async fn connect(url: &str, token: &str) -> Result<Self> {
        info!(url, "connecting to Home Assistant");

        let (ws_stream, _) = connect_async(url).await?;
        let (mut write, mut read) = ws_stream.split();
        authenticate(&mut write, &mut read, token).await?;

        let (ws_tx, mut ws_rx) = mpsc::unbounded_channel::<Message>();
        let state = Arc::new(Mutex::new(ConnectionState::default()));

        let writer = tokio::spawn(async move {
            while let Some(msg) = ws_rx.recv().await {
                if let Err(e) = write.send(msg).await {
                    error!(error = %e, "failed to send message");
                    break;
                }
            }
        });

        let state_clone = state.clone();
        let reader = tokio::spawn(async move {
            while let Some(msg) = read.next().await {
                match msg {
                    Ok(Message::Text(text)) => match serde_json::from_str::<Incoming>(&text) {
                        Ok(incoming) => state_clone.lock().await.route(incoming),
                        Err(e) => warn!(error = %e, "unparseable message"),
                    },
                    Ok(Message::Close(_)) => {
                        info!("Home Assistant closed the connection");
                        break;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        error!(error = %e, "websocket error");
                        break;
                    }
                }
            }

            // Dropping the senders fails pending requests and ends subscriptions.
            let mut state = state_clone.lock().await;
            state.pending.clear();
            state.subscriptions.clear();
        });

        Ok(Self {
            state,
            ws_tx,
            next_id: AtomicU64::new(1),
            reader,
            writer,
        })
    }

    /// Current state of every entity, undecoded: only the tracked one has to
    /// fit the media player schema.
    pub async fn get_states(&self) -> Result<Vec<Value>> {
        let result = self.request(|id| Outgoing::GetStates { id }).await?;
        match result {
            Some(Value::Array(states)) => Ok(states),
            Some(Value::Null) | None => Ok(Vec::new()),
            Some(other) => Err(BridgeError::UnexpectedMessage(format!(
                "get_states returned {other}"
            ))),
        }
    }

    /// Subscribe to `state_changed` events of one entity.
    pub async fn subscribe_entity(&self, entity_id: &str) -> Result<EntitySubscription> {
        let id = self.next_id();
        let (tx, rx) = mpsc::unbounded_channel();
        // Registered before the request so no event slips past.
        self.state.lock().await.subscriptions.insert(id, tx);

        let request = Outgoing::SubscribeEvents {
            id,
            event_type: "state_changed".to_string(),
        };
        if let Err(e) = self.send_request(id, request).await {
            self.state.lock().await.subscriptions.remove(&id);
            return Err(e);
        }

        debug!(entity_id, id, "subscribed to state changes");
        Ok(EntitySubscription::new(entity_id, rx))
    }

    pub async fn call_service(
        &self,
        domain: &str,
        service: &str,
        entity_id: &str,
        service_data: Value,
    ) -> Result<()> {
        debug!(domain, service, entity_id, %service_data, "calling service");
        self.request(|id| Outgoing::CallService {
            id,
            domain: domain.to_string(),
            service: service.to_string(),
            service_data,
            target: ServiceTarget {
                entity_id: entity_id.to_string(),
            },
        })
        .await?;
        Ok(())
    }

    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    async fn request(&self, build: impl FnOnce(u64) -> Outgoing) -> Result<Option<Value>> {
        let id = self.next_id();
        self.send_request(id, build(id)).await
    }

    async fn send_request(&self, id: u64, request: Outgoing) -> Result<Option<Value>> {
        let (tx, rx) = oneshot::channel();
        self.state.lock().await.pending.insert(id, tx);

        let json = serde_json::to_string(&request)?;
        self.ws_tx
            .send(Message::Text(json))
            .map_err(|_| BridgeError::ConnectionClosed)?;

        let reply = match timeout(REQUEST_TIMEOUT, rx).await {
            Ok(Ok(reply)) => reply,
            Ok(Err(_)) => return Err(BridgeError::ConnectionClosed),
            Err(_) => {
                self.state.lock().await.pending.remove(&id);
                return Err(BridgeError::Timeout);
            }
        };

        into_result(reply)
    }
}

impl Drop for HassClient {
    fn drop(&mut self) {
        self.reader.abort();
        self.writer.abort();
    }
}

pub(super) fn into_result(reply: ResultMessage) -> Result<Option<Value>> {
    if reply.success {
        return Ok(reply.result);
    }
    let (code, message) = reply
        .error
        .map(|e| (e.code, e.message))
        .unwrap_or_else(|| ("unknown_error".to_string(), String::new()));
    Err(BridgeError::HomeAssistant { code, message })
}

/// Perform the `auth_required` / `auth` / `auth_ok` handshake.
pub(super) async fn authenticate<W, R>(write: &mut W, read: &mut R, token: &str) -> Result<()>
where
    W: Sink<Message, Error = WsError> + Unpin,
    R: Stream<Item = std::result::Result<Message, WsError>> + Unpin,
{
    match next_incoming(read).await? {
        Incoming::AuthRequired { .. } => {}
        other => return Err(BridgeError::UnexpectedMessage(format!("{other:?}"))),
    }

    let auth = Outgoing::Auth {
        access_token: token.to_string(),
    };
    write.send(Message::Text(serde_json::to_string(&auth)?)).await?;

    match next_incoming(read).await? {
        Incoming::AuthOk { ha_version } => {
            info!(version = ha_version.as_deref().unwrap_or("unknown"), "authenticated");
            Ok(())
        }
        Incoming::AuthInvalid { message } => Err(BridgeError::AuthFailed(message.unwrap_or_default())),
        other => Err(BridgeError::UnexpectedMessage(format!("{other:?}"))),
    }
}

async fn next_incoming<R>(read: &mut R) -> Result<Incoming>
where
    R: Stream<Item = std::result::Result<Message, WsError>> + Unpin,
{
    while let Some(msg) = read.next().await {
        match msg? {
            Message::Text(text) => return Ok(serde_json::from_str(&text)?),
            Message::Close(_) => return Err(BridgeError::ConnectionClosed),
            _ => continue,
        }
    }
    Err(BridgeError::ConnectionClosed)
}

/// State changes of a single entity, in arrival order.
pub struct EntitySubscription {
    entity_id: String,
    rx: mpsc::UnboundedReceiver<Event>,
}

impl EntitySubscription {
    pub(super) fn new(entity_id: &str, rx: mpsc::UnboundedReceiver<Event>) -> Self {
        Self {
            entity_id: entity_id.to_string(),
            rx,
        }
    }

    /// Next change of the tracked entity, or `None` once the connection is
    /// gone.
    pub async fn next(&mut self) -> Option<StateChange> {
        while let Some(event) = self.rx.recv().await {
            if event.event_type != "state_changed"
                || entity_id_of(&event.data) != Some(self.entity_id.as_str())
            {
                continue;
            }
            match serde_json::from_value::<StateChange>(event.data) {
                Ok(change) => return Some(change),
                Err(e) => warn!(entity = %self.entity_id, error = %e, "malformed state_changed event"),
            }
        }
        None
    }
}

fn entity_id_of(value: &Value) -> Option<&str> {
    value.get("entity_id").and_then(Value::as_str)
}

/// Pick the configured entity out of a state dump and decode it. Other
/// entities are never decoded.
pub fn find_entity(states: Vec<Value>, entity_id: &str) -> Result<EntityState> {
    let mut matches: Vec<Value> = states
        .into_iter()
        .filter(|s| entity_id_of(s) == Some(entity_id))
        .collect();
    match matches.len() {
        0 => Err(BridgeError::EntityNotFound(entity_id.to_string())),
        1 => Ok(serde_json::from_value(matches.remove(0))?),
        n => Err(BridgeError::AmbiguousEntity {
            name: entity_id.to_string(),
            matches: format!("{n} entities with id {entity_id}"),
        }),
    }
}

/// The client currently in use, swapped on every reconnect.
#[derive(Clone, Default)]
pub struct ClientSlot {
    inner: Arc<RwLock<Option<Arc<HassClient>>>>,
}

impl ClientSlot {
    pub async fn set(&self, client: Option<Arc<HassClient>>) {
        *self.inner.write().await = client;
    }

    pub async fn get(&self) -> Option<Arc<HassClient>> {
        self.inner.read().await.clone()
    }
}
