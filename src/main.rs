use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use peerster::cli;
use peerster::node::{Node, NodeEvent, NodeHandle, Origin};
use peerster::settings;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "peerster=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Parse args and env vars
    let args = cli::Cli::parse();
    let settings = args.into_settings()?;

    let (node, handle, mut events) = Node::bind(settings).await?;
    info!(
        "Starting {} {} as {} on {}",
        settings::APP_NAME,
        settings::APP_VERSION,
        handle.origin(),
        handle.local_addr()
    );
    let node_task = tokio::spawn(node.run());

    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match event {
                NodeEvent::MessageAccepted {
                    origin,
                    sequence,
                    text,
                } => info!("<{}#{}> {}", origin, sequence, text),
                NodeEvent::PrivateReceived { origin, text } => {
                    info!("<{} (private)> {}", origin, text.unwrap_or_default())
                }
                NodeEvent::ValueCommitted { round, value } => {
                    info!("Round {} committed {}: {}", round, value.id, value.text)
                }
                NodeEvent::SearchRequest(request) => info!(
                    "Search request from {} for {:?} (budget {})",
                    request.origin, request.search, request.budget
                ),
            }
        }
    });

    // One command per line on stdin:
    //   /private <dest> <text>
    //   /propose <text>
    //   /peer <host:port>
    //   anything else is a chat message
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if let Err(e) = run_line(&handle, line).await {
            warn!("{}", e);
        }
    }

    // stdin closed: keep serving the network until killed. `handle` stays
    // alive here, so the node task never sees its command channel close.
    node_task.await?;
    drop(handle);
    Ok(())
}

async fn run_line(handle: &NodeHandle, line: &str) -> peerster::Result<()> {
    if let Some(rest) = line.strip_prefix("/private ") {
        let Some((dest, text)) = rest.trim().split_once(' ') else {
            warn!("usage: /private <dest> <text>");
            return Ok(());
        };
        if !handle.send_private(Origin::from(dest), text).await? {
            warn!("No route to {}", dest);
        }
    } else if let Some(text) = line.strip_prefix("/propose ") {
        let id = handle.propose(text).await?;
        info!("Proposed {}", id);
    } else if let Some(peer) = line.strip_prefix("/peer ") {
        let addr = cli::resolve_peer(peer.trim())?;
        handle.add_peer(addr).await?;
    } else {
        handle.submit_chat(line).await?;
    }
    Ok(())
}
