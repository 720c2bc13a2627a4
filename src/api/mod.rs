//! Typed access to the chat backend.
//!
//! Every operation issues exactly one request. Non-2xx responses become a
//! [`TransportError`] naming the operation; nothing here retries.

mod http_client;
#[cfg(test)]
pub(crate) mod testing;

pub use http_client::HttpChatApi;

use async_trait::async_trait;

use crate::errors::TransportError;
use crate::models::{Acknowledgement, AnswerResult, Chat, HealthStatus, Message};

#[async_trait]
pub trait ChatApi: Send + Sync {
    /// `GET /chats`, most recently updated first.
    async fn list_chats(&self) -> Result<Vec<Chat>, TransportError>;

    /// `POST /chats/new`. The backend assigns the id.
    async fn create_chat(&self, title: &str) -> Result<Chat, TransportError>;

    /// `GET /chats/{id}`, oldest message first.
    async fn get_messages(&self, chat_id: &str) -> Result<Vec<Message>, TransportError>;

    async fn delete_chat(&self, chat_id: &str) -> Result<Acknowledgement, TransportError>;

    async fn rename_chat(&self, chat_id: &str, title: &str)
        -> Result<Acknowledgement, TransportError>;

    /// `POST /ask`. The backend persists both turns on success.
    async fn ask(&self, chat_id: &str, question: &str) -> Result<AnswerResult, TransportError>;

    async fn health(&self) -> Result<HealthStatus, TransportError>;
}
