//! Property-based tests for the conversation store and title generator.

use std::sync::Arc;

use proptest::prelude::*;

use super::title_generator::{title_from, MAX_TITLE_LENGTH};
use super::{ConversationStore, RequestPhase, StoreState};
use crate::api::testing::FakeChatApi;
use crate::config::ClientConfig;
use crate::errors::Operation;

// ============================================================================
// Generators
// ============================================================================

#[derive(Debug, Clone)]
enum Step {
    Create { fail: bool },
    Delete { pick: usize, fail: bool },
    Select { pick: usize, fail: bool },
    Reload,
}

fn arb_step() -> impl Strategy<Value = Step> {
    prop_oneof![
        3 => any::<bool>().prop_map(|fail| Step::Create { fail }),
        3 => (any::<usize>(), any::<bool>()).prop_map(|(pick, fail)| Step::Delete { pick, fail }),
        2 => (any::<usize>(), any::<bool>()).prop_map(|(pick, fail)| Step::Select { pick, fail }),
        1 => Just(Step::Reload),
    ]
}

fn pick_id(state: &StoreState, pick: usize) -> Option<String> {
    if state.chats.is_empty() {
        return None;
    }
    Some(state.chats[pick % state.chats.len()].id.clone())
}

async fn with_failure<F: std::future::Future<Output = ()>>(
    api: &FakeChatApi,
    operation: Operation,
    fail: bool,
    run: F,
) {
    if fail {
        api.fail(operation);
    }
    run.await;
    api.recover(operation);
}

async fn apply(store: &ConversationStore, api: &FakeChatApi, step: &Step) {
    let state = store.snapshot();
    match step {
        Step::Create { fail } => {
            with_failure(api, Operation::CreateChat, *fail, store.create_chat()).await;
        }
        Step::Delete { pick, fail } => {
            if let Some(id) = pick_id(&state, *pick) {
                with_failure(api, Operation::DeleteChat, *fail, store.delete_chat(&id)).await;
            }
        }
        Step::Select { pick, fail } => {
            if let Some(id) = pick_id(&state, *pick) {
                with_failure(api, Operation::GetMessages, *fail, store.select_chat(&id)).await;
            }
        }
        Step::Reload => store.initialize().await,
    }
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

// ============================================================================
// Store invariants
// ============================================================================

proptest! {
    #[test]
    fn active_chat_is_always_listed(
        seed in 0usize..4,
        steps in prop::collection::vec(arb_step(), 1..30),
    ) {
        let titles: Vec<String> = (0..seed).map(|i| format!("Seed {i}")).collect();
        let title_refs: Vec<&str> = titles.iter().map(String::as_str).collect();
        let api = Arc::new(FakeChatApi::with_chats(&title_refs));
        let store = ConversationStore::new(api.clone(), &ClientConfig::default());

        runtime().block_on(async {
            store.initialize().await;
            for step in &steps {
                apply(&store, &api, step).await;

                let state = store.snapshot();
                match &state.active_chat_id {
                    Some(id) => assert!(state.contains_chat(id), "{step:?} left {id} active"),
                    None => assert!(state.messages.is_empty()),
                }
                assert_eq!(state.request_phase, RequestPhase::Idle);
                assert!(!state.history_loading, "{step:?} left a history fetch pending");

                // Without asks the backend order never moves, so the local list mirrors it.
                let local: Vec<String> = state.chats.iter().map(|c| c.id.clone()).collect();
                assert_eq!(local, api.chat_ids());
            }
        });
    }

    #[test]
    fn sending_always_ends_idle_with_one_user_turn(
        question in "[a-zA-Z?]{1,20}( [a-zA-Z?]{1,20}){0,8}",
        ask_fails in any::<bool>(),
        start_empty in any::<bool>(),
    ) {
        let api = Arc::new(if start_empty {
            FakeChatApi::new()
        } else {
            FakeChatApi::with_chats(&["Existing"])
        });
        if ask_fails {
            api.fail(Operation::Ask);
        }
        let store = ConversationStore::new(api.clone(), &ClientConfig::default());

        let state = runtime().block_on(async {
            store.initialize().await;
            store.send_message(&question).await;
            store.snapshot()
        });

        prop_assert_eq!(state.request_phase, RequestPhase::Idle);
        let user_turns = state.messages.iter().filter(|m| m.content == question).count();
        prop_assert_eq!(user_turns, 1);
        prop_assert_eq!(state.messages.len(), 2);
        let title = state.active_chat().map(|c| c.title.clone());
        if ask_fails {
            prop_assert_eq!(title.as_deref(), Some(if start_empty { "New Chat" } else { "Existing" }));
        } else {
            prop_assert_eq!(title, Some(title_from(&question)));
        }
    }
}

// ============================================================================
// Title generator
// ============================================================================

proptest! {
    #[test]
    fn short_titles_pass_through(q in "\\PC{0,50}") {
        prop_assert_eq!(title_from(&q), q);
    }

    #[test]
    fn long_titles_are_a_prefix_plus_ellipsis(q in "\\PC{51,200}") {
        let title = title_from(&q);
        let body = title.strip_suffix("...").expect("long titles end with an ellipsis");
        prop_assert!(q.starts_with(body));
        prop_assert!(body.chars().count() <= MAX_TITLE_LENGTH);
    }

    #[test]
    fn long_titles_break_at_the_last_space(
        head in "[a-z]{1,20}( [a-z]{1,10}){1,5}",
        tail in "[a-z]{60,80}",
    ) {
        let q = format!("{head} {tail}");
        let prefix: String = q.chars().take(MAX_TITLE_LENGTH).collect();
        let cut = prefix.rfind(' ').unwrap();
        prop_assert_eq!(title_from(&q), format!("{}...", &prefix[..cut]));
    }
}
