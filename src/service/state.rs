use crate::models::{Chat, Message};

/// Which half of the loading indicator is showing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseStage {
    /// Just sent; the pacing delay has not elapsed yet.
    Thinking,
    /// Pacing delay elapsed, answer still outstanding.
    Generating,
}

impl ResponseStage {
    pub fn label(&self) -> &'static str {
        match self {
            ResponseStage::Thinking => "Thinking...",
            ResponseStage::Generating => "Generating...",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RequestPhase {
    #[default]
    Idle,
    AwaitingResponse(ResponseStage),
}

impl RequestPhase {
    pub fn is_busy(&self) -> bool {
        matches!(self, RequestPhase::AwaitingResponse(_))
    }
}

/// Everything the presentation layer renders. Published after every
/// mutation; the store is the only writer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoreState {
    pub chats: Vec<Chat>,
    pub active_chat_id: Option<String>,
    /// History of the active chat only.
    pub messages: Vec<Message>,
    pub request_phase: RequestPhase,
    /// A history fetch for the active chat is outstanding; `messages` is not
    /// authoritative yet.
    pub history_loading: bool,
    /// Bumped whenever `messages` is about to be replaced. A history fetch
    /// only lands if the epoch it started under is still current.
    pub(crate) view_epoch: u64,
}

impl StoreState {
    pub fn active_chat(&self) -> Option<&Chat> {
        let id = self.active_chat_id.as_deref()?;
        self.chats.iter().find(|c| c.id == id)
    }

    pub fn contains_chat(&self, chat_id: &str) -> bool {
        self.chats.iter().any(|c| c.id == chat_id)
    }

    /// Makes `chat_id` the visible conversation with an empty history that is
    /// still loading, and returns the new view epoch.
    pub(crate) fn activate(&mut self, chat_id: &str) -> u64 {
        self.active_chat_id = Some(chat_id.to_string());
        self.messages.clear();
        self.history_loading = true;
        self.view_epoch += 1;
        self.view_epoch
    }

    pub(crate) fn deactivate(&mut self) {
        self.active_chat_id = None;
        self.messages.clear();
        self.history_loading = false;
        self.view_epoch += 1;
    }

    /// Keeps the visible conversation but supersedes any fetch in flight;
    /// the returned epoch belongs to the fetch that will replace it.
    pub(crate) fn begin_refresh(&mut self) -> u64 {
        self.history_loading = true;
        self.view_epoch += 1;
        self.view_epoch
    }
}
