//! Client for a multi-chat question-answering backend.
//!
//! [`api`] talks to the REST service, [`service::ConversationStore`] keeps the
//! chats, the open conversation and the loading phase consistent while
//! requests are in flight, and [`terminal`] is a small line-based front end.

pub mod api;
pub mod config;
pub mod errors;
pub mod models;
pub mod service;
pub mod terminal;
