use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use super::state::{RequestPhase, ResponseStage, StoreState};
use super::title_generator::title_from;
use crate::api::ChatApi;
use crate::config::{ClientConfig, StaleReplyPolicy};
use crate::errors::TransportError;
use crate::models::{AnswerResult, Message, DEFAULT_CHAT_TITLE};

/// Client-side conversation state, reconciled against the chat backend.
///
/// Every operation mirrors one user intent. Transport failures are logged
/// and never returned; the state falls back to what it was, or to an empty
/// conversation, instead.
///
/// State lives in a [`watch`] channel: each mutation is one atomic step that
/// subscribers observe as a whole. No lock is held across a network call, so
/// intents may interleave at their suspension points exactly as they would
/// behind a UI. Callers are expected not to start a second
/// [`send_message`](Self::send_message) while one is in flight.
pub struct ConversationStore {
    api: Arc<dyn ChatApi>,
    state: watch::Sender<StoreState>,
    pacing_delay: Duration,
    stale_reply_policy: StaleReplyPolicy,
}

impl ConversationStore {
    pub fn new(api: Arc<dyn ChatApi>, config: &ClientConfig) -> Self {
        let (state, _) = watch::channel(StoreState::default());
        Self {
            api,
            state,
            pacing_delay: config.pacing_delay,
            stale_reply_policy: config.stale_reply_policy,
        }
    }

    /// Receiver that sees every state change from now on.
    pub fn subscribe(&self) -> watch::Receiver<StoreState> {
        self.state.subscribe()
    }

    pub fn snapshot(&self) -> StoreState {
        self.state.borrow().clone()
    }

    /// Loads the chat list and opens the first chat if none is open.
    pub async fn initialize(&self) {
        self.reload_chats().await;
    }

    /// Opens `chat_id`, replacing `messages` with its history.
    pub async fn select_chat(&self, chat_id: &str) {
        let mut epoch = None;
        self.state.send_if_modified(|s| {
            if s.active_chat_id.as_deref() == Some(chat_id) {
                return false;
            }
            if !s.contains_chat(chat_id) {
                warn!("Ignoring selection of unknown chat {chat_id}");
                return false;
            }
            epoch = Some(s.activate(chat_id));
            true
        });

        if let Some(epoch) = epoch {
            self.load_history(chat_id, epoch).await;
        }
    }

    /// Creates an empty chat on the backend and opens it.
    pub async fn create_chat(&self) {
        if let Err(e) = self.open_new_chat().await {
            error!("Failed to create chat: {e}");
        }
    }

    /// Deletes `chat_id`. Local state changes only once the backend confirms.
    pub async fn delete_chat(&self, chat_id: &str) {
        if let Err(e) = self.api.delete_chat(chat_id).await {
            error!("Failed to delete chat {chat_id}: {e}");
            return;
        }
        info!("Deleted chat {chat_id}");

        let mut next = None;
        self.state.send_modify(|s| {
            s.chats.retain(|c| c.id != chat_id);
            if s.active_chat_id.as_deref() != Some(chat_id) {
                return;
            }
            match s.chats.first().map(|c| c.id.clone()) {
                Some(first) => {
                    let epoch = s.activate(&first);
                    next = Some((first, epoch));
                }
                None => s.deactivate(),
            }
        });

        if let Some((first, epoch)) = next {
            self.load_history(&first, epoch).await;
        }
    }

    /// Renames `chat_id` in place. Blank titles are ignored.
    pub async fn rename_chat(&self, chat_id: &str, new_title: &str) {
        let title = new_title.trim();
        if title.is_empty() {
            warn!("Ignoring blank title for chat {chat_id}");
            return;
        }

        let ack = match self.api.rename_chat(chat_id, title).await {
            Ok(ack) => ack,
            Err(e) => {
                error!("Failed to rename chat {chat_id}: {e}");
                return;
            }
        };
        // The backend sanitizes titles; show what it stored.
        let stored = ack
            .title
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| title.to_string());

        self.state.send_if_modified(|s| match s.chats.iter_mut().find(|c| c.id == chat_id) {
            Some(chat) => {
                chat.title = stored;
                true
            }
            None => false,
        });
    }

    /// Sends `question` to the open chat, creating one first if needed.
    ///
    /// The user turn is shown immediately. The phase moves to thinking, then
    /// to generating once the pacing delay passes without an answer, and is
    /// back to idle when this returns, whatever happened. A successful first
    /// exchange titles the chat after the question.
    ///
    /// If the open chat's history is still loading, the send waits for it so
    /// the user turn lands after the history instead of under it.
    pub async fn send_message(&self, question: &str) {
        if question.trim().is_empty() {
            debug!("Ignoring empty message");
            return;
        }

        let mut updates = self.state.subscribe();
        if updates.wait_for(|s| !s.history_loading).await.is_err() {
            return;
        }

        let active = self.state.borrow().active_chat_id.clone();
        let chat_id = match active {
            Some(id) => id,
            None => match self.open_new_chat().await {
                Ok(id) => id,
                Err(e) => {
                    error!("Failed to create chat for message: {e}");
                    return;
                }
            },
        };

        let mut is_first_message = false;
        let mut epoch = 0;
        self.state.send_modify(|s| {
            is_first_message = s.messages.is_empty();
            epoch = s.view_epoch;
            s.messages.push(Message::user(question));
            s.request_phase = RequestPhase::AwaitingResponse(ResponseStage::Thinking);
        });
        let _idle = IdleOnDrop { state: &self.state };

        let outcome = self.ask_paced(&chat_id, question).await;

        let reply = match &outcome {
            Ok(answer) => Message::answer(answer.clone()),
            Err(e) => {
                error!("Failed to get answer in chat {chat_id}: {e}");
                Message::apology()
            }
        };
        let failed = outcome.is_err();
        if let Some(refresh) = self.place_reply(&chat_id, epoch, reply) {
            // The chat was left and reopened mid-exchange, so its history was
            // fetched before the backend stored this exchange.
            self.load_history(&chat_id, refresh).await;
            if failed {
                self.state.send_if_modified(|s| {
                    if s.view_epoch != refresh {
                        return false;
                    }
                    s.messages.push(Message::user(question));
                    s.messages.push(Message::apology());
                    true
                });
            }
        }

        if !failed {
            if is_first_message {
                self.rename_chat(&chat_id, &title_from(question)).await;
            }
            self.reload_chats().await;
        }
    }

    /// True when the backend answers its health check.
    pub async fn check_backend(&self) -> bool {
        match self.api.health().await {
            Ok(status) if status.is_ok() => true,
            Ok(status) => {
                warn!("Backend reports status '{}'", status.status);
                false
            }
            Err(e) => {
                error!("Backend health check failed: {e}");
                false
            }
        }
    }

    async fn open_new_chat(&self) -> Result<String, TransportError> {
        let chat = self.api.create_chat(DEFAULT_CHAT_TITLE).await?;
        let id = chat.id.clone();
        self.state.send_modify(|s| {
            s.chats.insert(0, chat);
            s.activate(&id);
            // Nothing to fetch for a chat that was just created.
            s.history_loading = false;
        });
        info!("Created chat {id}");
        Ok(id)
    }

    /// Fetches the chat list, keeping the open chat valid: if it vanished, or
    /// nothing was open, the first chat is opened instead.
    async fn reload_chats(&self) {
        let chats = match self.api.list_chats().await {
            Ok(chats) => chats,
            Err(e) => {
                error!("Failed to load chats: {e}");
                return;
            }
        };

        let mut next = None;
        self.state.send_modify(|s| {
            s.chats = chats;
            let active_valid = s
                .active_chat_id
                .as_deref()
                .is_some_and(|id| s.contains_chat(id));
            if active_valid {
                return;
            }
            if let Some(gone) = &s.active_chat_id {
                warn!("Open chat {gone} is no longer listed");
            }
            match s.chats.first().map(|c| c.id.clone()) {
                Some(first) => {
                    let epoch = s.activate(&first);
                    next = Some((first, epoch));
                }
                None if s.active_chat_id.is_some() => s.deactivate(),
                None => {}
            }
        });

        if let Some((first, epoch)) = next {
            self.load_history(&first, epoch).await;
        }
    }

    /// Replaces `messages` with the history of `chat_id`, unless another
    /// conversation was opened since `epoch`. Failure shows an empty history.
    async fn load_history(&self, chat_id: &str, epoch: u64) {
        let _loading = LoadingOnDrop { state: &self.state, epoch };
        let messages = match self.api.get_messages(chat_id).await {
            Ok(messages) => messages,
            Err(e) => {
                error!("Failed to load messages for chat {chat_id}: {e}");
                Vec::new()
            }
        };

        self.state.send_if_modified(|s| {
            if s.view_epoch != epoch {
                debug!("Dropping stale history for chat {chat_id}");
                return false;
            }
            s.messages = messages;
            s.history_loading = false;
            true
        });
    }

    /// Races the ask against the pacing delay. If the answer wins, the timer
    /// is dropped and the phase never shows generating.
    async fn ask_paced(
        &self,
        chat_id: &str,
        question: &str,
    ) -> Result<AnswerResult, TransportError> {
        let mut ask = self.api.ask(chat_id, question);
        tokio::select! {
            biased;
            result = &mut ask => result,
            () = tokio::time::sleep(self.pacing_delay) => {
                self.state.send_if_modified(|s| {
                    if s.request_phase != RequestPhase::AwaitingResponse(ResponseStage::Thinking) {
                        return false;
                    }
                    s.request_phase = RequestPhase::AwaitingResponse(ResponseStage::Generating);
                    true
                });
                ask.await
            }
        }
    }

    /// Puts the assistant turn for an exchange in `chat_id` started at
    /// `epoch` where it belongs.
    ///
    /// If `messages` was untouched since, the reply is appended. If the chat
    /// is open again after a switch, its history is stale and the epoch to
    /// refetch it under is returned. A reply for a chat that is not open is
    /// handled per [`StaleReplyPolicy`].
    fn place_reply(&self, chat_id: &str, epoch: u64, reply: Message) -> Option<u64> {
        let policy = self.stale_reply_policy;
        let mut refresh = None;
        self.state.send_if_modified(|s| {
            if s.view_epoch == epoch {
                s.messages.push(reply);
                return true;
            }
            if s.active_chat_id.as_deref() == Some(chat_id) {
                debug!("Chat {chat_id} was reopened mid-exchange; refetching its history");
                refresh = Some(s.begin_refresh());
                return true;
            }
            match policy {
                StaleReplyPolicy::Discard => {
                    info!("Chat {chat_id} is no longer open; not showing its reply");
                    false
                }
                StaleReplyPolicy::AppendToActive => {
                    s.messages.push(reply);
                    true
                }
            }
        });
        refresh
    }
}

/// Returns the phase to idle however the exchange ends, including when the
/// caller drops the future mid-flight.
struct IdleOnDrop<'a> {
    state: &'a watch::Sender<StoreState>,
}

impl Drop for IdleOnDrop<'_> {
    fn drop(&mut self) {
        self.state.send_if_modified(|s| {
            let busy = s.request_phase.is_busy();
            s.request_phase = RequestPhase::Idle;
            busy
        });
    }
}

/// Clears the loading flag if a history fetch is abandoned before it lands,
/// so a waiting send is never stuck behind it.
struct LoadingOnDrop<'a> {
    state: &'a watch::Sender<StoreState>,
    epoch: u64,
}

impl Drop for LoadingOnDrop<'_> {
    fn drop(&mut self) {
        self.state.send_if_modified(|s| {
            if s.view_epoch != self.epoch || !s.history_loading {
                return false;
            }
            s.history_loading = false;
            true
        });
    }
}
