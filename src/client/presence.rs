//! 프레즌스 WebSocket 연결

use crate::error::LobbyError;
use crate::protocol::{ClientMessage, ServerMessage};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;

/// 송신은 unbounded 채널, 수신은 `ServerMessage` 리시버
pub struct PresenceConnection {
    outgoing: UnboundedSender<ClientMessage>,
    incoming: UnboundedReceiver<ServerMessage>,
    writer: JoinHandle<()>,
    reader: JoinHandle<()>,
}

impl PresenceConnection {
    pub async fn connect(url: &str) -> Result<Self, LobbyError> {
        let (ws, _) = tokio_tungstenite::connect_async(url).await?;
        let (mut write, mut read) = ws.split();

        let (outgoing, mut outgoing_rx) = mpsc::unbounded_channel::<ClientMessage>();
        let (incoming_tx, incoming) = mpsc::unbounded_channel::<ServerMessage>();

        let writer = tokio::spawn(async move {
            while let Some(msg) = outgoing_rx.recv().await {
                let Ok(json) = serde_json::to_string(&msg) else {
                    continue;
                };
                if write.send(Message::Text(json.into())).await.is_err() {
                    break;
                }
            }
            let _ = write.close().await;
        });

        let reader = tokio::spawn(async move {
            while let Some(Ok(msg)) = read.next().await {
                match msg {
                    Message::Text(text) => {
                        match serde_json::from_str::<ServerMessage>(text.as_str()) {
                            Ok(msg) => {
                                if incoming_tx.send(msg).is_err() {
                                    break;
                                }
                            }
                            Err(e) => tracing::warn!(error = %e, "Unparseable server message"),
                        }
                    }
                    Message::Close(_) => break,
                    _ => {}
                }
            }
        });

        tracing::debug!("Presence connection established");
        Ok(Self {
            outgoing,
            incoming,
            writer,
            reader,
        })
    }

    pub fn send(&self, msg: ClientMessage) -> Result<(), LobbyError> {
        self.outgoing
            .send(msg)
            .map_err(|_| LobbyError::Internal("Presence connection closed".to_string()))
    }

    pub fn join_room(&self, room_id: &str) -> Result<(), LobbyError> {
        self.send(ClientMessage::JoinRoom {
            room_id: room_id.to_string(),
        })
    }

    pub fn leave_room(&self) -> Result<(), LobbyError> {
        self.send(ClientMessage::LeaveRoom)
    }

    pub fn heartbeat(&self) -> Result<(), LobbyError> {
        self.send(ClientMessage::Heartbeat)
    }

    /// 연결이 끊기면 None
    pub async fn recv(&mut self) -> Option<ServerMessage> {
        self.incoming.recv().await
    }

    /// Close 프레임을 보내고 태스크를 정리한다
    pub async fn close(self) {
        let Self {
            outgoing,
            writer,
            reader,
            ..
        } = self;
        drop(outgoing);
        let _ = writer.await;
        reader.abort();
    }
}
