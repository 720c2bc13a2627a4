//! Conversation state and the rules that keep it consistent with the backend.

mod conversation_store;
mod state;
pub mod title_generator;

#[cfg(test)]
mod proptests;

pub use conversation_store::ConversationStore;
pub use state::{RequestPhase, ResponseStage, StoreState};
pub use title_generator::title_from;
