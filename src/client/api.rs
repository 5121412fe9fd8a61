//! 로비 HTTP API 클라이언트

use crate::coordinator::LobbyActions;
use crate::error::LobbyError;
use crate::model::{BattleRoomSlot, SlotType};
use crate::protocol::{
    ApiResponse, CreateRoomRequest, CreateRoomResponse, JoinRoomRequest, LeaveOutcome,
    LobbyView, RoomSummary, UpdateSlotRequest,
};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Url};
use serde::de::DeserializeOwned;

#[derive(Debug, Clone)]
pub struct LobbyApiClient {
    http: Client,
    base_url: String,
    ticket: String,
}

impl LobbyApiClient {
    pub fn new(base_url: impl Into<String>, ticket: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            ticket: ticket.into(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/v1/battle{}", self.base_url, path)
    }

    async fn call<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, LobbyError> {
        let body: ApiResponse<T> = request
            .bearer_auth(&self.ticket)
            .send()
            .await?
            .json()
            .await?;

        match body {
            ApiResponse {
                success: true,
                value: Some(value),
                ..
            } => Ok(value),
            ApiResponse { error, .. } => Err(LobbyError::Remote(
                error.unwrap_or_else(|| "Unknown error".to_string()),
            )),
        }
    }

    pub async fn list_rooms(&self) -> Result<Vec<RoomSummary>, LobbyError> {
        self.call(self.http.get(self.url("/rooms"))).await
    }

    pub async fn create_room(&self, request: &CreateRoomRequest) -> Result<String, LobbyError> {
        let response: CreateRoomResponse = self
            .call(self.http.post(self.url("/rooms")).json(request))
            .await?;
        Ok(response.public_id)
    }

    pub async fn lobby(&self, public_id: &str) -> Result<LobbyView, LobbyError> {
        self.call(self.http.get(self.url(&format!("/rooms/{}", public_id))))
            .await
    }

    pub async fn join_room(
        &self,
        public_id: &str,
        password: Option<String>,
    ) -> Result<BattleRoomSlot, LobbyError> {
        self.call(
            self.http
                .post(self.url(&format!("/rooms/{}/join", public_id)))
                .json(&JoinRoomRequest { password }),
        )
        .await
    }

    pub async fn leave_room(&self, public_id: &str) -> Result<LeaveOutcome, LobbyError> {
        self.call(self.http.post(self.url(&format!("/rooms/{}/leave", public_id))))
            .await
    }

    pub async fn update_slot(
        &self,
        public_id: &str,
        slot_index: usize,
        slot_type: SlotType,
    ) -> Result<BattleRoomSlot, LobbyError> {
        self.call(
            self.http
                .patch(self.url(&format!("/rooms/{}/slots/{}", public_id, slot_index)))
                .json(&UpdateSlotRequest { slot_type }),
        )
        .await
    }

    pub async fn kick(
        &self,
        public_id: &str,
        slot_index: usize,
    ) -> Result<BattleRoomSlot, LobbyError> {
        self.call(
            self.http
                .post(self.url(&format!("/rooms/{}/slots/{}/kick", public_id, slot_index))),
        )
        .await
    }

    pub async fn close(&self, public_id: &str) -> Result<bool, LobbyError> {
        self.call(self.http.delete(self.url(&format!("/rooms/{}", public_id))))
            .await
    }

    pub async fn start_game(&self, public_id: &str) -> Result<RoomSummary, LobbyError> {
        self.call(self.http.post(self.url(&format!("/rooms/{}/start", public_id))))
            .await
    }

    pub async fn advance_question(&self, public_id: &str) -> Result<RoomSummary, LobbyError> {
        self.call(self.http.post(self.url(&format!("/rooms/{}/next", public_id))))
            .await
    }

    /// 프레즌스 WebSocket 주소 (`ws(s)://.../ws?ticket=..`)
    pub fn presence_url(&self) -> Result<String, LobbyError> {
        let ws_base = if let Some(rest) = self.base_url.strip_prefix("https://") {
            format!("wss://{}", rest)
        } else if let Some(rest) = self.base_url.strip_prefix("http://") {
            format!("ws://{}", rest)
        } else {
            self.base_url.clone()
        };

        let mut url = Url::parse(&format!("{}/ws", ws_base))
            .map_err(|e| LobbyError::Invalid(format!("Invalid server url: {}", e)))?;
        url.query_pairs_mut().append_pair("ticket", &self.ticket);
        Ok(url.to_string())
    }
}

#[async_trait]
impl LobbyActions for LobbyApiClient {
    async fn kick_player(
        &self,
        public_id: &str,
        slot_index: usize,
    ) -> Result<Option<BattleRoomSlot>, LobbyError> {
        self.kick(public_id, slot_index).await.map(Some)
    }

    async fn close_room(&self, public_id: &str) -> Result<bool, LobbyError> {
        self.close(public_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presence_url_encodes_ticket() {
        let client = LobbyApiClient::new("http://localhost:5510/", "alice:123:ab+c/d=");
        assert_eq!(
            client.presence_url().unwrap(),
            "ws://localhost:5510/ws?ticket=alice%3A123%3Aab%2Bc%2Fd%3D"
        );

        let secure = LobbyApiClient::new("https://lobby.example.com", "t");
        assert_eq!(
            secure.presence_url().unwrap(),
            "wss://lobby.example.com/ws?ticket=t"
        );
    }
}
