//! Terminal chat client for a running relay
//!
//! Streams each reply as it arrives; reasoning is printed dimmed ahead of
//! the answer.

use anyhow::Result;
use std::io::{self, Write};
use tracing::debug;

use chat_relay::config::ClientConfig;
use chat_relay::history::Role;
use chat_relay::interpreter::{ChatSession, RelayClient, TerminalView};
use chat_relay::utils::logging::init_client_tracing;
use chat_relay::utils::preview;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    init_client_tracing();

    let config = ClientConfig::from_env();
    let client = RelayClient::new(config.relay_url.clone())?;
    let mut session = ChatSession::new();
    let mut view = TerminalView::new(io::stdout());

    println!("\n{}", "═".repeat(60));
    println!("💬 Chat Relay @ {}", config.relay_url);
    println!("{}", "═".repeat(60));
    println!("💡 Commands: 'quit' | 'history' | 'clear' | 'verify <token>'\n");

    if let Some(token) = &config.verify_token {
        match client.verify(token).await {
            Ok(()) => println!("🔓 Verified with the relay\n"),
            Err(e) => println!("⚠️  Verification failed: {}\n", e),
        }
    }

    loop {
        print!("You: ");
        io::stdout().flush()?;

        let mut input = String::new();
        if io::stdin().read_line(&mut input)? == 0 {
            break;
        }
        let query = input.trim();

        if query.is_empty() {
            continue;
        }

        match query.to_lowercase().as_str() {
            "quit" | "exit" | "q" => {
                println!("\n👋 Goodbye!\n");
                break;
            }
            "history" => {
                println!("\n📜 Conversation History:");
                for turn in session.history() {
                    let who = match turn.role {
                        Role::User => "You",
                        Role::Assistant => "Bot",
                    };
                    println!("   {}: {}", who, preview(&turn.content, 80));
                }
                println!();
                continue;
            }
            "clear" => {
                session = ChatSession::new();
                println!("\n🗑️  History cleared.\n");
                continue;
            }
            command if command.starts_with("verify ") => {
                let token = query["verify ".len()..].trim();
                match client.verify(token).await {
                    Ok(()) => println!("\n🔓 Verified with the relay\n"),
                    Err(e) => println!("\n⚠️  Verification failed: {}\n", e),
                }
                continue;
            }
            _ => {}
        }

        // failures are already printed by the view
        if let Err(e) = session.submit(&client, query, &mut view).await {
            debug!("Turn failed: {}", e);
        }
        println!();
    }

    Ok(())
}
