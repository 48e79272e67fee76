//! Agent Chat - terminal client
//!
//! Prints the transcript to stdout as it is revealed. Enter sends, a trailing
//! `\` continues the message on the next line, Ctrl-C cancels a streaming
//! turn. `/new` starts a fresh session and `/quit` exits.

use agent_chat::{
    ClientConfig, Conversation, HttpAgentClient, KeyValueStore, LoggingClient, MemoryStore, Role,
    SqliteStore, SubmitRejected, TranscriptEvent, TurnOutcome,
};
use std::io::Write;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_stream::{Stream, StreamExt};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

type Chat = Conversation<LoggingClient<HttpAgentClient>, Arc<dyn KeyValueStore>>;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Logs go to stderr so they never interleave with the transcript
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "agent_chat=info".into()))
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false)
                .with_writer(std::io::stderr),
        )
        .init();

    let config = ClientConfig::from_env();
    tracing::info!(
        base_url = %config.base_url,
        app_name = %config.app_name,
        user_id = %config.user_id,
        "Starting chat client"
    );

    let store = open_store(&config);
    let client = LoggingClient::new(HttpAgentClient::new(
        &config.base_url,
        config.connect_timeout,
    )?);
    let chat: Arc<Chat> = Arc::new(Conversation::new(client, store, &config));

    tokio::spawn(render(chat.transcript().events()));

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut draft = String::new();
    prompt();

    while let Some(line) = lines.next_line().await? {
        if let Some(continued) = line.strip_suffix('\\') {
            draft.push_str(continued);
            draft.push('\n');
            continue;
        }
        draft.push_str(&line);
        let input = std::mem::take(&mut draft);

        match input.trim() {
            "/quit" => break,
            "/new" => {
                chat.sessions().reset().await;
                println!("(new session)");
            }
            _ => run_turn(&chat, &input).await,
        }
        prompt();
    }

    Ok(())
}

fn open_store(config: &ClientConfig) -> Arc<dyn KeyValueStore> {
    if let Some(parent) = config.store_path.parent() {
        if let Err(e) = std::fs::create_dir_all(parent) {
            tracing::warn!(error = %e, path = %parent.display(), "Failed to create store directory");
        }
    }

    match SqliteStore::open(&config.store_path) {
        Ok(store) => {
            tracing::info!(path = %config.store_path.display(), "Opened session store");
            Arc::new(store)
        }
        Err(e) => {
            tracing::warn!(error = %e, "Session store unavailable, session id will not persist");
            Arc::new(MemoryStore::default())
        }
    }
}

async fn run_turn(chat: &Chat, input: &str) {
    let submit = chat.submit(input);
    tokio::pin!(submit);

    let result = loop {
        tokio::select! {
            result = &mut submit => break result,
            _ = tokio::signal::ctrl_c() => {
                chat.cancel();
            }
        }
    };

    match result {
        Ok(TurnOutcome::Cancelled) => println!("\n(cancelled)"),
        Ok(TurnOutcome::Completed | TurnOutcome::Failed) | Err(SubmitRejected::Empty) => {}
        Err(e @ SubmitRejected::Busy) => eprintln!("{e}"),
    }

    // The reply may still be typing after the stream ends
    tokio::select! {
        () = chat.typing().wait_idle() => {}
        _ = tokio::signal::ctrl_c() => chat.typing().clear(),
    }
    tokio::task::yield_now().await;
    println!();
}

async fn render(events: impl Stream<Item = TranscriptEvent>) {
    tokio::pin!(events);

    while let Some(event) = events.next().await {
        let mut out = std::io::stdout().lock();
        let written = match event {
            // The terminal already echoed what the user typed
            TranscriptEvent::Appended { message, .. } if message.role == Role::User => Ok(()),
            TranscriptEvent::Appended { message, .. } => {
                write!(out, "\n{}> {}", message.role.as_str(), message.text)
            }
            TranscriptEvent::Grew { text, .. } => write!(out, "{text}"),
        };
        if written.and_then(|()| out.flush()).is_err() {
            break;
        }
    }
}

fn prompt() {
    let mut out = std::io::stdout().lock();
    let _ = write!(out, "\nyou> ");
    let _ = out.flush();
}
