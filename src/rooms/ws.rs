use axum::{
    debug_handler,
    extract::{ws::{Message as Frame, WebSocket}, State, WebSocketUpgrade},
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::broadcast::{self, error::RecvError};

use crate::{store::RoomStore, AppError, AppResult, AppState};

use super::{
    events::{ClientEvent, ServerEvent},
    hub::Hub,
    msg::NewMessage,
    non_blank, require_room_id,
};

const ANONYMOUS: &str = "anonymous";

#[debug_handler(state = AppState)]
pub async fn room_ws(
    State(store): State<RoomStore>,
    State(hub): State<Hub>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| serve(socket, Connection::new(store, hub)))
}

async fn serve(socket: WebSocket, mut conn: Connection) {
    let (mut sender, mut receiver) = socket.split();

    'conn: loop {
        let replies = tokio::select! {
            event = conn.next_broadcast() => vec![event],
            frame = receiver.next() => match frame {
                Some(Ok(Frame::Text(text))) => conn.handle_frame(text.as_str()).await,
                Some(Ok(Frame::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => continue,
            },
        };

        for reply in replies {
            let text = match serde_json::to_string(&reply) {
                Ok(text) => text,
                Err(err) => {
                    tracing::error!("unserializable event {reply:?}: {err}");
                    continue;
                }
            };
            if sender.send(Frame::Text(text.into())).await.is_err() {
                break 'conn;
            }
        }
    }

    conn.leave();
}

struct Joined {
    room_id: String,
    user_id: String,
    rx: broadcast::Receiver<ServerEvent>,
}

/// One client's view of the rooms: at most one joined room at a time.
pub struct Connection {
    store: RoomStore,
    hub: Hub,
    joined: Option<Joined>,
}

impl Connection {
    pub fn new(store: RoomStore, hub: Hub) -> Connection {
        Connection { store, hub, joined: None }
    }

    pub fn room_id(&self) -> Option<&str> {
        self.joined.as_ref().map(|joined| joined.room_id.as_str())
    }

    pub async fn handle_frame(&mut self, text: &str) -> Vec<ServerEvent> {
        match serde_json::from_str::<ClientEvent>(text) {
            Ok(event) => self.handle(event).await,
            Err(err) => {
                tracing::debug!("bad frame {text:?}: {err}");
                vec![ServerEvent::Error { message: "Invalid event".to_owned() }]
            }
        }
    }

    /// Handles one client event. Returns the replies meant for this client only;
    /// everything addressed to the room goes through the hub.
    pub async fn handle(&mut self, event: ClientEvent) -> Vec<ServerEvent> {
        match self.try_handle(event).await {
            Ok(replies) => replies,
            Err(err) => {
                if let AppError::Internal(err) = &err {
                    tracing::error!("{err:#}");
                }
                vec![ServerEvent::Error { message: err.public_message() }]
            }
        }
    }

    async fn try_handle(&mut self, event: ClientEvent) -> AppResult<Vec<ServerEvent>> {
        match event {
            ClientEvent::Join { room_id, user_id } => {
                let room_id = require_room_id(Some(room_id))?;
                let user_id = non_blank(user_id).unwrap_or(ANONYMOUS.to_owned());
                self.join(room_id, user_id).await
            }
            ClientEvent::Leave => {
                self.leave();
                Ok(vec![])
            }
            ClientEvent::SendMessage { room_id, user_id, content, timestamp } => {
                let room_id = require_room_id(room_id.or(self.room_id().map(str::to_owned)))?;
                let user_id = user_id.or(self.joined.as_ref().map(|joined| joined.user_id.clone()));
                super::post_message(&self.store, &self.hub, &room_id, NewMessage {
                    user_id,
                    content,
                    timestamp,
                })
                .await?;
                Ok(vec![])
            }
            ClientEvent::DeleteRoom { room_id } => {
                let room_id = require_room_id(room_id.or(self.room_id().map(str::to_owned)))?;
                super::delete_room(&self.store, &self.hub, &room_id).await?;
                Ok(vec![])
            }
            ClientEvent::GetMessages { room_id } => {
                let room_id = require_room_id(room_id.or(self.room_id().map(str::to_owned)))?;
                let messages = super::room_messages(&self.store, &room_id).await?;
                Ok(vec![ServerEvent::RoomHistory { room_id, messages }])
            }
            ClientEvent::GetRooms => {
                Ok(vec![ServerEvent::RoomList(super::list_rooms(&self.store).await?)])
            }
        }
    }

    async fn join(&mut self, room_id: String, user_id: String) -> AppResult<Vec<ServerEvent>> {
        self.leave();

        let room = super::join_room(&self.store, &room_id).await?;
        let rx = self.hub.subscribe(&room_id);

        self.hub.publish(&room_id, ServerEvent::UserJoined {
            room_id: room_id.clone(),
            user_id: user_id.clone(),
        });
        self.hub.publish(&room_id, ServerEvent::MemberCount {
            room_id: room_id.clone(),
            count: self.hub.members(&room_id),
        });
        tracing::info!("{user_id} joined room {room_id}");

        self.joined = Some(Joined { room_id: room_id.clone(), user_id, rx });
        Ok(vec![ServerEvent::RoomHistory { room_id, messages: room.messages }])
    }

    pub fn leave(&mut self) {
        let Some(Joined { room_id, user_id, rx }) = self.joined.take() else {
            return;
        };
        drop(rx);

        self.hub.publish(&room_id, ServerEvent::UserLeft {
            room_id: room_id.clone(),
            user_id: user_id.clone(),
        });
        self.hub.publish(&room_id, ServerEvent::MemberCount {
            room_id: room_id.clone(),
            count: self.hub.members(&room_id),
        });
        tracing::info!("{user_id} left room {room_id}");
    }

    /// Next event published to the joined room. Pending while no room is joined.
    pub async fn next_broadcast(&mut self) -> ServerEvent {
        loop {
            let Some(joined) = self.joined.as_mut() else {
                return std::future::pending().await;
            };

            match joined.rx.recv().await {
                Ok(event @ ServerEvent::RoomDeleted { .. }) => {
                    self.joined = None;
                    return event;
                }
                Ok(event) => return event,
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!("listener in {} lagged, skipped {skipped} events", joined.room_id);
                }
                Err(RecvError::Closed) => self.joined = None,
            }
        }
    }
}
