//! Terminal chat client for a running chat-relay server.
//!
//! Prints the reply as it streams. Ctrl-C cancels the reply in flight;
//! after a cancelled or failed reply, `/clear` resets the conversation.
//! Other commands: `/history` (session mode), `/quit`.

use std::io::Write;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::debug;

use chat_relay::client::{ChatClient, ChatView, ConsumeOutcome, Endpoint};

#[derive(Parser, Debug)]
#[command(name = "chat", about = "Terminal client for chat-relay")]
struct Args {
    /// Base URL of the relay server.
    #[arg(long, default_value = "http://127.0.0.1:3001")]
    server: String,

    /// Routed model id for `/api/chat`.
    #[arg(short, long, conflicts_with = "session")]
    model: Option<String>,

    /// Server-side session id for `/api/assistant/session/{id}`.
    #[arg(short, long)]
    session: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "chat=warn".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let endpoint = match (args.model, args.session) {
        (Some(model), _) => Endpoint::Chat { model },
        (None, Some(id)) => Endpoint::Session { id },
        (None, None) => Endpoint::AssistantStream,
    };
    debug!(?endpoint, server = %args.server, "Starting chat");

    let client = ChatClient::new(&args.server);
    let mut view = ChatView::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else { break };
        let prompt = line.trim();

        match prompt {
            "" => continue,
            "/quit" => break,
            "/clear" => {
                view.clear();
                if let Endpoint::Session { id } = &endpoint {
                    client.delete_session(id).await?;
                }
                println!("(history cleared)");
                continue;
            }
            "/history" => {
                if let Endpoint::Session { id } = &endpoint {
                    match client.session_history(id).await? {
                        Some(history) => {
                            for message in history {
                                println!("[{:?}] {}", message.role, message.parts);
                            }
                        }
                        None => println!("(no session {id})"),
                    }
                } else {
                    for message in view.messages() {
                        println!("[{:?}] {}", message.role, message.parts);
                    }
                }
                continue;
            }
            _ => {}
        }

        if !view.can_send() {
            println!("(input blocked, type /clear to start over)");
            continue;
        }

        let mut printed = 0;
        let cancel = async {
            let _ = tokio::signal::ctrl_c().await;
        };
        let outcome = client
            .send(&endpoint, &mut view, prompt, cancel, |view| {
                if let Some(text) = view.in_progress() {
                    if let Some(fresh) = text.get(printed..) {
                        print!("{fresh}");
                        let _ = std::io::stdout().flush();
                    }
                    printed = text.len();
                }
            })
            .await?;

        match outcome {
            ConsumeOutcome::Completed => println!(),
            ConsumeOutcome::Cancelled => println!("\n(cancelled, type /clear to continue)"),
            ConsumeOutcome::Failed(message) => {
                println!("\n(error: {message}; type /clear to continue)")
            }
        }
    }

    Ok(())
}
