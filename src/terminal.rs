//! Line-oriented front end: parses user input into store intents and turns
//! state snapshots into printable lines.

use chrono::Local;
use thiserror::Error;

use crate::models::{Confidence, Message, Role};
use crate::service::{RequestPhase, StoreState};

pub const HELP: &str = "\
Commands:
  /chats              list chats (* marks the open one)
  /new                start a new chat
  /select <n|id>      open chat n from /chats, or by id
  /delete [n|id]      delete a chat (the open one by default)
  /rename <title>     rename the open chat
  /help               show this help
  /quit               exit
Anything else is sent as a question.";

/// A chat named on the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatRef {
    /// 1-based position in the chat list.
    Position(usize),
    Id(String),
}

impl ChatRef {
    fn parse(arg: &str) -> Self {
        match arg.parse::<usize>() {
            Ok(n) if n > 0 => ChatRef::Position(n),
            _ => ChatRef::Id(arg.to_string()),
        }
    }

    /// The chat id this refers to, if it names a listed chat.
    pub fn resolve(&self, state: &StoreState) -> Option<String> {
        match self {
            ChatRef::Position(n) => n
                .checked_sub(1)
                .and_then(|i| state.chats.get(i))
                .map(|c| c.id.clone()),
            ChatRef::Id(id) => state.contains_chat(id).then(|| id.clone()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Send(String),
    ListChats,
    NewChat,
    Select(ChatRef),
    /// `None` deletes the open chat.
    Delete(Option<ChatRef>),
    Rename(String),
    Help,
    Quit,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("/{command} needs {what}")]
    MissingArgument { command: &'static str, what: &'static str },

    #[error("unknown command /{0} (try /help)")]
    Unknown(String),
}

impl Command {
    /// `Ok(None)` for a blank line.
    pub fn parse(line: &str) -> Result<Option<Self>, CommandError> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(None);
        }
        let Some(rest) = line.strip_prefix('/') else {
            return Ok(Some(Command::Send(line.to_string())));
        };

        let (name, arg) = match rest.split_once(char::is_whitespace) {
            Some((name, arg)) => (name, arg.trim()),
            None => (rest, ""),
        };

        let command = match name {
            "chats" | "list" => Command::ListChats,
            "new" => Command::NewChat,
            "select" | "open" => {
                if arg.is_empty() {
                    return Err(CommandError::MissingArgument {
                        command: "select",
                        what: "a chat number or id",
                    });
                }
                Command::Select(ChatRef::parse(arg))
            }
            "delete" => Command::Delete((!arg.is_empty()).then(|| ChatRef::parse(arg))),
            "rename" => {
                if arg.is_empty() {
                    return Err(CommandError::MissingArgument {
                        command: "rename",
                        what: "a title",
                    });
                }
                Command::Rename(arg.to_string())
            }
            "help" | "?" => Command::Help,
            "quit" | "exit" => Command::Quit,
            other => return Err(CommandError::Unknown(other.to_string())),
        };
        Ok(Some(command))
    }
}

pub fn render_chat_list(state: &StoreState) -> String {
    if state.chats.is_empty() {
        return "No chats yet. Type a question to start one.".to_string();
    }
    state
        .chats
        .iter()
        .enumerate()
        .map(|(i, chat)| {
            let marker = if state.active_chat_id.as_deref() == Some(chat.id.as_str()) {
                '*'
            } else {
                ' '
            };
            format!("{marker} {:>2}. {}", i + 1, chat.title)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn render_message(message: &Message) -> String {
    let time = message.timestamp.with_timezone(&Local).format("%H:%M:%S");
    let who = match message.role {
        Role::User => "you",
        Role::Assistant => "assistant",
    };
    let mut out = format!("[{time}] {who}: {}", message.content);

    if message.role == Role::User {
        return out;
    }
    let Some(meta) = &message.metadata else {
        return out;
    };

    let mut badges = Vec::new();
    if meta.cached {
        badges.push("cached");
    }
    match meta.confidence {
        Some(Confidence::Low) => badges.push("low confidence"),
        Some(Confidence::High) => badges.push("high confidence"),
        Some(Confidence::Medium) | None => {}
    }
    if !badges.is_empty() {
        out.push_str(&format!("\n    ({})", badges.join(", ")));
    }
    if !meta.sources.is_empty() {
        out.push_str(&format!("\n    Sources ({}):", meta.sources.len()));
        for (i, source) in meta.sources.iter().enumerate() {
            out.push_str(&format!("\n      [{}] {source}", i + 1));
        }
    }
    out
}

pub fn render_phase(phase: RequestPhase) -> Option<&'static str> {
    match phase {
        RequestPhase::Idle => None,
        RequestPhase::AwaitingResponse(stage) => Some(stage.label()),
    }
}

/// Tracks what has been printed so each snapshot only prints what changed.
#[derive(Debug, Default)]
pub struct View {
    shown_chat: Option<String>,
    shown_messages: usize,
    shown_phase: RequestPhase,
}

impl View {
    pub fn update(&mut self, state: &StoreState) -> Vec<String> {
        let mut lines = Vec::new();

        let reset = state.active_chat_id != self.shown_chat
            || state.messages.len() < self.shown_messages;
        if reset {
            self.shown_chat = state.active_chat_id.clone();
            self.shown_messages = 0;
            if let Some(chat) = state.active_chat() {
                lines.push(format!("── {} ──", chat.title));
            }
        }

        for message in &state.messages[self.shown_messages..] {
            lines.push(render_message(message));
        }
        self.shown_messages = state.messages.len();

        if state.request_phase != self.shown_phase {
            if let Some(label) = render_phase(state.request_phase) {
                lines.push(label.to_string());
            }
            self.shown_phase = state.request_phase;
        }

        lines
    }
}
