use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Client, RequestBuilder, StatusCode, Url};
use serde::de::DeserializeOwned;
use tracing::debug;

use super::ChatApi;
use crate::config::ClientConfig;
use crate::errors::{Operation, TransportError};
use crate::models::{
    Acknowledgement, AnswerResult, AskRequest, Chat, HealthStatus, Message, TitleRequest,
};

/// Header the backend checks when it is configured to require a key.
const API_KEY_HEADER: &str = "x-api-key";

/// [`ChatApi`] over the backend's JSON REST interface.
#[derive(Clone)]
pub struct HttpChatApi {
    client: Client,
    base_url: Url,
}

impl HttpChatApi {
    pub fn new(config: &ClientConfig) -> Result<Self, reqwest::Error> {
        let mut headers = HeaderMap::new();
        if let Some(key) = &config.api_key {
            if let Ok(mut value) = HeaderValue::from_str(key) {
                value.set_sensitive(true);
                headers.insert(API_KEY_HEADER, value);
            }
        }

        let client = Client::builder()
            .default_headers(headers)
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self { client, base_url: config.api_base_url.clone() })
    }

    /// Base URL with `segments` appended, each percent-encoded.
    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    async fn send<T: DeserializeOwned>(
        &self,
        operation: Operation,
        request: RequestBuilder,
    ) -> Result<T, TransportError> {
        let resp = request
            .send()
            .await
            .map_err(|e| TransportError::network(operation, e))?;

        let status = resp.status();
        debug!("{operation}: {} {status}", resp.url());

        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(TransportError::status(
                operation,
                status.as_u16(),
                error_message(status, &body),
            ));
        }

        let bytes = resp
            .bytes()
            .await
            .map_err(|e| TransportError::network(operation, e))?;
        serde_json::from_slice(&bytes).map_err(|e| TransportError::decode(operation, e.to_string()))
    }
}

/// The backend reports failures as `{"error": "..."}`; fall back to the raw
/// body, then to the status reason.
fn error_message(status: StatusCode, body: &str) -> String {
    #[derive(serde::Deserialize)]
    struct ErrorBody {
        error: String,
    }

    if let Ok(parsed) = serde_json::from_str::<ErrorBody>(body) {
        return parsed.error;
    }
    let trimmed = body.trim();
    if !trimmed.is_empty() {
        return trimmed.to_string();
    }
    status.canonical_reason().unwrap_or("unknown status").to_string()
}

#[async_trait]
impl ChatApi for HttpChatApi {
    async fn list_chats(&self) -> Result<Vec<Chat>, TransportError> {
        let req = self.client.get(self.url(&["chats"]));
        self.send(Operation::ListChats, req).await
    }

    async fn create_chat(&self, title: &str) -> Result<Chat, TransportError> {
        let body = TitleRequest { title: title.to_string() };
        let req = self.client.post(self.url(&["chats", "new"])).json(&body);
        self.send(Operation::CreateChat, req).await
    }

    async fn get_messages(&self, chat_id: &str) -> Result<Vec<Message>, TransportError> {
        let req = self.client.get(self.url(&["chats", chat_id]));
        self.send(Operation::GetMessages, req).await
    }

    async fn delete_chat(&self, chat_id: &str) -> Result<Acknowledgement, TransportError> {
        let req = self.client.delete(self.url(&["chats", chat_id]));
        self.send(Operation::DeleteChat, req).await
    }

    async fn rename_chat(
        &self,
        chat_id: &str,
        title: &str,
    ) -> Result<Acknowledgement, TransportError> {
        let body = TitleRequest { title: title.to_string() };
        let req = self.client.put(self.url(&["chats", chat_id, "title"])).json(&body);
        self.send(Operation::RenameChat, req).await
    }

    async fn ask(&self, chat_id: &str, question: &str) -> Result<AnswerResult, TransportError> {
        let body = AskRequest {
            chat_id: chat_id.to_string(),
            question: question.to_string(),
        };
        let req = self.client.post(self.url(&["ask"])).json(&body);
        self.send(Operation::Ask, req).await
    }

    async fn health(&self) -> Result<HealthStatus, TransportError> {
        let req = self.client.get(self.url(&["health"]));
        self.send(Operation::Health, req).await
    }
}
