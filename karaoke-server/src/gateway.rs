use std::sync::{Arc, Weak};

use axum::{
    extract::{
        ws::{Message, WebSocket},
        Query, State, WebSocketUpgrade,
    },
    response::IntoResponse,
    routing::get,
    Router,
};
use dashmap::DashMap;
use futures_util::{SinkExt, StreamExt};
use karaoke_collab::{Actor, Collab, CollabEvent, ConnectionId, Rooms};
use log::{debug, error, info, warn};
use serde::Deserialize;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use utoipa::IntoParams;

use crate::{
    errors::{ServerError, ServerResult},
    schemas::ClientMessage,
    serialized::{ServerMessage, ToSerialized},
    ServerContext,
};

/// Manages the WebSocket connections and delivers collab events to them
pub struct Gateway {
    me: Weak<Self>,
    connections: DashMap<ConnectionId, Connection>,
}

struct Connection {
    /// The broadcast channel of the connection's room
    channel: String,
    sender: UnboundedSender<String>,
}

/// Receives the messages of a single connection, and disconnects it when dropped
pub struct ConnectionHandle {
    id: ConnectionId,
    receiver: UnboundedReceiver<String>,
    manager: Weak<Gateway>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct GatewayQuery {
    /// A session token
    token: String,
}

impl Gateway {
    pub fn new() -> Arc<Self> {
        Arc::new_cyclic(|me| Self {
            me: me.clone(),
            connections: Default::default(),
        })
    }

    /// Subscribes a connection to its room's channel
    pub fn connect(&self, actor: &Actor) -> ConnectionHandle {
        let (sender, receiver) = unbounded_channel();

        self.connections.insert(
            actor.connection_id,
            Connection {
                channel: Rooms::channel(actor.room_id),
                sender,
            },
        );

        ConnectionHandle {
            id: actor.connection_id,
            receiver,
            manager: self.me.clone(),
        }
    }

    fn disconnect(&self, id: ConnectionId) {
        self.connections.remove(&id);
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Sends a message to a single connection
    pub fn send(&self, id: ConnectionId, message: &ServerMessage) {
        let Some(text) = encode(message) else {
            return;
        };

        if let Some(connection) = self.connections.get(&id) {
            connection.send(text);
        }
    }

    /// Sends a message to every connection subscribed to the channel
    pub fn broadcast(&self, channel: &str, message: &ServerMessage) {
        let Some(text) = encode(message) else {
            return;
        };

        self.connections
            .iter()
            .filter(|c| c.channel == channel)
            .for_each(|c| c.send(text.clone()));
    }

    pub fn route(&self, event: CollabEvent) {
        match event {
            CollabEvent::QueuePush { channel, queue, .. } => {
                self.broadcast(&channel, &queue.to_serialized())
            }
            CollabEvent::Notice {
                connection_id,
                notice,
            } => self.send(connection_id, &notice.to_serialized()),
        }
    }

    /// Delivers collab events on a dedicated thread until the collab system is gone
    pub fn start_routing(&self, collab: Arc<Collab>) {
        let Some(gateway) = self.me.upgrade() else {
            return;
        };

        std::thread::spawn(move || {
            while let Some(event) = collab.wait_for_event() {
                gateway.route(event);
            }

            warn!("Collab events stopped, gateway routing has ended");
        });
    }
}

impl Connection {
    fn send(&self, text: String) {
        // A closed channel means the socket is going away
        let _ = self.sender.send(text);
    }
}

impl ConnectionHandle {
    pub async fn recv(&mut self) -> Option<String> {
        self.receiver.recv().await
    }
}

impl Drop for ConnectionHandle {
    fn drop(&mut self) {
        if let Some(manager) = self.manager.upgrade() {
            manager.disconnect(self.id)
        }
    }
}

fn encode(message: &ServerMessage) -> Option<String> {
    match serde_json::to_string(message) {
        Ok(text) => Some(text),
        Err(e) => {
            error!("Could not serialize gateway message: {}", e);
            None
        }
    }
}

#[utoipa::path(
    get,
    path = "/v1/gateway",
    tag = "gateway",
    params(GatewayQuery),
    responses(
        (status = 101, description = "Upgraded to a WebSocket sending gateway messages", body = ServerMessage),
        (status = 401, description = "Session does not exist")
    )
)]
pub(crate) async fn gateway(
    ws: WebSocketUpgrade,
    State(context): State<ServerContext>,
    Query(query): Query<GatewayQuery>,
) -> ServerResult<impl IntoResponse> {
    let session = context
        .collab
        .session(&query.token)
        .await
        .map_err(|_| ServerError::Unauthorized("Session does not exist"))?;

    let actor = Actor::from_session(&session);

    Ok(ws.on_upgrade(move |socket| handle_socket(socket, context, actor)))
}

async fn handle_socket(socket: WebSocket, context: ServerContext, actor: Actor) {
    let mut handle = context.gateway.connect(&actor);
    let (mut sink, mut stream) = socket.split();

    info!(
        "User {} connected to room {} as {}",
        actor.user_id, actor.room_id, actor.connection_id
    );

    match context.collab.queue().get(actor.room_id).await {
        Ok(queue) => context
            .gateway
            .send(actor.connection_id, &queue.to_serialized()),
        Err(e) => error!("Could not get queue of room {}: {}", actor.room_id, e),
    }

    let send_task = tokio::spawn(async move {
        while let Some(text) = handle.recv().await {
            if sink.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
    });

    while let Some(result) = stream.next().await {
        match result {
            Ok(Message::Text(text)) => handle_message(&context, &actor, &text).await,
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                debug!("Connection {} errored: {}", actor.connection_id, e);
                break;
            }
        }
    }

    send_task.abort();
    info!("Connection {} disconnected", actor.connection_id);
}

/// Handles messages one at a time, so each is acknowledged before the next is read
async fn handle_message(context: &ServerContext, actor: &Actor, text: &str) {
    let message = match ClientMessage::parse(text) {
        Ok(message) => message,
        Err(e) => {
            warn!("Connection {} sent a bad message: {}", actor.connection_id, e);
            return;
        }
    };

    let action = match message.to_action() {
        Ok(action) => action,
        Err(e) => {
            let reply = ServerMessage::error_ack(message.ack_id, &message.kind, &e.to_string());
            context.gateway.send(actor.connection_id, &reply);
            return;
        }
    };

    let gateway = context.gateway.clone();
    let connection_id = actor.connection_id;
    let ack_id = message.ack_id;

    context
        .collab
        .dispatcher
        .dispatch(actor, action, move |ack| {
            gateway.send(connection_id, &ServerMessage::ack(ack_id, &ack))
        })
        .await;
}

pub fn router() -> Router<ServerContext> {
    Router::new().route("/", get(gateway))
}
