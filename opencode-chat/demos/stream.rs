//! Streaming example.
//!
//! Lists what the server offers, then streams a reply to stdout. Ctrl-C
//! cancels the call; the session is still deleted.
//!
//! Run with:
//! ```bash
//! OPENCODE_BASE_URL=http://localhost:4096 \
//! OPENCODE_PROVIDER_ID=anthropic \
//! OPENCODE_MODEL_ID=claude-3-5-sonnet-20241022 \
//! RUST_LOG=opencode_chat_models=debug \
//! cargo run --example stream -- "Explain this repository in two sentences"
//! ```

use futures::StreamExt;
use opencode_chat::prelude::*;
use std::io::{self, Write};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "opencode_chat_models=info".into()),
        )
        .with_target(true)
        .init();

    let prompt = std::env::args()
        .skip(1)
        .collect::<Vec<_>>()
        .join(" ");
    let prompt = if prompt.is_empty() {
        "Say hello in one short sentence.".to_string()
    } else {
        prompt
    };

    let model = OpenCodeChatModel::from_env()?;
    let cancel = CancellationToken::new();

    let agents = model.client().list_agents(&cancel).await?;
    println!(
        "Agents: {}",
        agents.iter().map(|a| a.name.as_str()).collect::<Vec<_>>().join(", ")
    );
    let catalog = model.client().list_providers(&cancel).await?;
    println!("Models: {}\n", catalog.model_refs().len());

    println!("Using {} with agent {:?}", model.identifier(), model.config().agent());
    println!("Prompt: {prompt}\n");

    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            interrupt.cancel();
        }
    });

    let options = CallOptions::new().with_cancellation(cancel);
    let mut stream = model
        .stream(&[ChatMessage::user(prompt)], &options)
        .await?;

    let mut chunks = 0;
    while let Some(chunk) = stream.next().await {
        match chunk {
            Ok(text) => {
                print!("{text}");
                io::stdout().flush()?;
                chunks += 1;
            }
            Err(e) => {
                eprintln!("\n\nStream ended with error: {e}");
                return Err(e.into());
            }
        }
    }

    println!("\n\n---\nReceived {chunks} chunks");
    Ok(())
}
