//! # huddle-tab
//!
//! A chat tab in the terminal. Commands are read from stdin; the selected
//! thread is reprinted whenever the sync loop reports a change. Run two of
//! them on the same `HUDDLE_DB_PATH` with different `HUDDLE_USERNAME`s to
//! watch messages cross between tabs.

use std::sync::Arc;

use anyhow::Context;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use huddle_client::tab::{execute, render_view, Outcome, TabCommand};
use huddle_client::{ChatClient, ClientConfig, StaticDirectory};
use huddle_store::ConversationRepository;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // -----------------------------------------------------------------------
    // 1. Tracing on stderr, stdout belongs to the tab
    // -----------------------------------------------------------------------
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new("huddle_client=debug,huddle_media=info,huddle_store=info,huddle_net=info,warn")
        }))
        .with_writer(std::io::stderr)
        .with_target(true)
        .init();

    info!("Starting huddle tab v{}", env!("CARGO_PKG_VERSION"));

    // -----------------------------------------------------------------------
    // 2. Configuration and store
    // -----------------------------------------------------------------------
    let config = ClientConfig::from_env();
    info!(?config, "Loaded configuration");

    let store = config.open_store().context("failed to open the store")?;
    let repo = ConversationRepository::new(store);
    let identity = ChatClient::resolve_identity(&repo, &config);

    // -----------------------------------------------------------------------
    // 3. Client and sync loop
    // -----------------------------------------------------------------------
    let mut client = ChatClient::new(repo, identity.clone(), Arc::new(StaticDirectory::new()), &config);
    let mut updates = client.start_sync(&config).subscribe();

    println!("huddle tab for {}. /help for commands.", identity.mention());

    // -----------------------------------------------------------------------
    // 4. Input loop
    // -----------------------------------------------------------------------
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("failed to read stdin")? else {
                    break;
                };
                let command = match TabCommand::parse(&line) {
                    Ok(Some(command)) => command,
                    Ok(None) => continue,
                    Err(e) => {
                        println!("{e}");
                        continue;
                    }
                };
                match execute(&client, command) {
                    Ok(Outcome::Quit) => break,
                    Ok(Outcome::Continue(Some(output))) => println!("{output}"),
                    Ok(Outcome::Continue(None)) => {}
                    Err(e) if e.is_not_found() => println!("{e}"),
                    Err(e) => {
                        warn!(error = %e, "Command failed");
                        println!("{e}");
                    }
                }
            }
            changed = updates.changed() => {
                if changed.is_err() {
                    warn!("Sync loop stopped");
                    break;
                }
                let update = updates.borrow_and_update().clone();
                if update.changed || update.scroll_to_bottom {
                    print!("{}", render_view(&update.view, &identity));
                }
            }
        }
    }

    client.shutdown().await;
    Ok(())
}
