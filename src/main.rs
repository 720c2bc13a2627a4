use std::sync::Arc;

use anyhow::Context;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

use qa_chat_client::api::HttpChatApi;
use qa_chat_client::config::ClientConfig;
use qa_chat_client::service::ConversationStore;
use qa_chat_client::terminal::{self, Command, View};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present (development convenience)
    dotenvy::dotenv().ok();

    // Logs go to stderr; stdout is the conversation
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "qa_chat_client=info".into()),
        )
        .init();

    // ── Wiring ────────────────────────────────────────────────────────────────
    let config = ClientConfig::from_env().context("invalid client configuration")?;
    let api = HttpChatApi::new(&config).context("failed to build HTTP client")?;
    let store = Arc::new(ConversationStore::new(Arc::new(api), &config));

    info!("Using backend at {}", config.api_base_url);
    if !store.check_backend().await {
        warn!("Backend is not reachable yet; requests will fail until it is");
    }

    // ── Rendering ─────────────────────────────────────────────────────────────
    let mut updates = store.subscribe();
    let renderer = tokio::spawn(async move {
        let mut view = View::default();
        loop {
            let lines = view.update(&updates.borrow_and_update());
            for line in lines {
                println!("{line}");
            }
            if updates.changed().await.is_err() {
                break;
            }
        }
    });

    store.initialize().await;
    println!("{}", terminal::HELP);

    // ── Intents ───────────────────────────────────────────────────────────────
    // Each intent is awaited before the next line is read, so nothing new is
    // sent while an answer is outstanding.
    let mut input = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = input.next_line().await? {
        let command = match Command::parse(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(e) => {
                eprintln!("{e}");
                continue;
            }
        };

        match command {
            Command::Send(question) => store.send_message(&question).await,
            Command::ListChats => println!("{}", terminal::render_chat_list(&store.snapshot())),
            Command::NewChat => store.create_chat().await,
            Command::Select(target) => match target.resolve(&store.snapshot()) {
                Some(id) => store.select_chat(&id).await,
                None => eprintln!("No such chat; see /chats"),
            },
            Command::Delete(target) => {
                let snapshot = store.snapshot();
                let id = match target {
                    Some(target) => target.resolve(&snapshot),
                    None => snapshot.active_chat_id.clone(),
                };
                match id {
                    Some(id) => store.delete_chat(&id).await,
                    None => eprintln!("No such chat; see /chats"),
                }
            }
            Command::Rename(title) => {
                let active = store.snapshot().active_chat_id;
                match active {
                    Some(id) => store.rename_chat(&id, &title).await,
                    None => eprintln!("No chat is open"),
                }
            }
            Command::Help => println!("{}", terminal::HELP),
            Command::Quit => break,
        }
    }

    renderer.abort();
    Ok(())
}
