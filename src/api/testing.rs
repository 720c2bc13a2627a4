//! In-memory backend for store tests.
//!
//! Behaves like the real service: ids are assigned on create, `ask` stores
//! both turns and moves the chat to the front, and any operation can be made
//! to fail.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use super::ChatApi;
use crate::errors::{Operation, TransportError};
use crate::models::{
    Acknowledgement, AnswerResult, Chat, Confidence, HealthStatus, Message,
};

#[derive(Default)]
struct Backend {
    /// Most recently updated first.
    chats: Vec<Chat>,
    messages: HashMap<String, Vec<Message>>,
    next_id: u32,
}

#[derive(Default)]
pub struct FakeChatApi {
    backend: Mutex<Backend>,
    failing: Mutex<HashSet<Operation>>,
    ask_latency: Mutex<Option<Duration>>,
    history_latency: Mutex<HashMap<String, Duration>>,
    /// Every call made so far, with its main argument.
    calls: Mutex<Vec<(Operation, String)>>,
}

impl FakeChatApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds chats in the given order, each with an empty history.
    pub fn with_chats(titles: &[&str]) -> Self {
        let fake = Self::new();
        {
            let mut backend = fake.backend.lock().unwrap();
            for title in titles {
                let id = backend.allocate_id();
                backend.chats.push(Chat::new(id.clone(), *title));
                backend.messages.insert(id, Vec::new());
            }
        }
        fake
    }

    pub fn seed_history(&self, chat_id: &str, history: Vec<Message>) {
        self.backend
            .lock()
            .unwrap()
            .messages
            .insert(chat_id.to_string(), history);
    }

    pub fn fail(&self, operation: Operation) {
        self.failing.lock().unwrap().insert(operation);
    }

    pub fn recover(&self, operation: Operation) {
        self.failing.lock().unwrap().remove(&operation);
    }

    pub fn set_ask_latency(&self, latency: Duration) {
        *self.ask_latency.lock().unwrap() = Some(latency);
    }

    pub fn set_history_latency(&self, chat_id: &str, latency: Duration) {
        self.history_latency
            .lock()
            .unwrap()
            .insert(chat_id.to_string(), latency);
    }

    pub fn chat_ids(&self) -> Vec<String> {
        self.backend.lock().unwrap().chats.iter().map(|c| c.id.clone()).collect()
    }

    pub fn chat(&self, chat_id: &str) -> Option<Chat> {
        self.backend
            .lock()
            .unwrap()
            .chats
            .iter()
            .find(|c| c.id == chat_id)
            .cloned()
    }

    pub fn count(&self, operation: Operation) -> usize {
        self.calls.lock().unwrap().iter().filter(|(op, _)| *op == operation).count()
    }

    pub fn answer_for(question: &str) -> String {
        format!("Answer to: {question}")
    }

    fn enter(&self, operation: Operation, arg: &str) -> Result<(), TransportError> {
        self.calls.lock().unwrap().push((operation, arg.to_string()));
        if self.failing.lock().unwrap().contains(&operation) {
            return Err(TransportError::status(operation, 500, "injected failure"));
        }
        Ok(())
    }
}

impl Backend {
    fn allocate_id(&mut self) -> String {
        self.next_id += 1;
        format!("chat-{}", self.next_id)
    }

    fn position(&self, chat_id: &str) -> Option<usize> {
        self.chats.iter().position(|c| c.id == chat_id)
    }
}

/// The backend drops markup from titles before storing them.
fn strip_tags(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut in_tag = false;
    for c in raw.chars() {
        match c {
            '<' => in_tag = true,
            '>' if in_tag => in_tag = false,
            _ if !in_tag => out.push(c),
            _ => {}
        }
    }
    out.trim().to_string()
}

fn not_found(operation: Operation) -> TransportError {
    TransportError::status(operation, 404, "Chat not found")
}

#[async_trait]
impl ChatApi for FakeChatApi {
    async fn list_chats(&self) -> Result<Vec<Chat>, TransportError> {
        self.enter(Operation::ListChats, "")?;
        Ok(self.backend.lock().unwrap().chats.clone())
    }

    async fn create_chat(&self, title: &str) -> Result<Chat, TransportError> {
        self.enter(Operation::CreateChat, title)?;
        let mut backend = self.backend.lock().unwrap();
        let id = backend.allocate_id();
        let chat = Chat::new(id.clone(), title);
        backend.chats.insert(0, chat.clone());
        backend.messages.insert(id, Vec::new());
        Ok(chat)
    }

    async fn get_messages(&self, chat_id: &str) -> Result<Vec<Message>, TransportError> {
        let latency = self.history_latency.lock().unwrap().get(chat_id).copied();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        self.enter(Operation::GetMessages, chat_id)?;
        self.backend
            .lock()
            .unwrap()
            .messages
            .get(chat_id)
            .cloned()
            .ok_or_else(|| not_found(Operation::GetMessages))
    }

    async fn delete_chat(&self, chat_id: &str) -> Result<Acknowledgement, TransportError> {
        self.enter(Operation::DeleteChat, chat_id)?;
        let mut backend = self.backend.lock().unwrap();
        let pos = backend.position(chat_id).ok_or_else(|| not_found(Operation::DeleteChat))?;
        backend.chats.remove(pos);
        backend.messages.remove(chat_id);
        Ok(Acknowledgement {
            message: Some("Chat deleted successfully".into()),
            title: None,
        })
    }

    async fn rename_chat(
        &self,
        chat_id: &str,
        title: &str,
    ) -> Result<Acknowledgement, TransportError> {
        self.enter(Operation::RenameChat, &format!("{chat_id}:{title}"))?;
        let title = strip_tags(title);
        let mut backend = self.backend.lock().unwrap();
        let pos = backend.position(chat_id).ok_or_else(|| not_found(Operation::RenameChat))?;
        backend.chats[pos].title = title.clone();
        Ok(Acknowledgement {
            message: Some("Title updated successfully".into()),
            title: Some(title),
        })
    }

    async fn ask(&self, chat_id: &str, question: &str) -> Result<AnswerResult, TransportError> {
        let latency = *self.ask_latency.lock().unwrap();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        self.enter(Operation::Ask, question)?;

        let result = AnswerResult {
            answer: Self::answer_for(question),
            cached: false,
            confidence: Some(Confidence::High),
            sources: vec![format!("source for {question}")],
        };

        let mut backend = self.backend.lock().unwrap();
        if let Some(pos) = backend.position(chat_id) {
            let chat = backend.chats.remove(pos);
            backend.chats.insert(0, chat);
            let history = backend.messages.entry(chat_id.to_string()).or_default();
            history.push(Message::user(question));
            history.push(Message::answer(result.clone()));
        }
        Ok(result)
    }

    async fn health(&self) -> Result<HealthStatus, TransportError> {
        self.enter(Operation::Health, "")?;
        Ok(HealthStatus {
            status: "ok".into(),
            message: Some("NLP Assistant API is running".into()),
        })
    }
}
