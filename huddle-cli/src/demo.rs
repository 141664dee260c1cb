use anyhow::{Context, Result};
use async_trait::async_trait;
use colored::*;
use futures::future::join_all;
use huddle_client::{
    GlarePolicy, MemoryRelay, NegotiationError, NegotiationPhase, RemoteMediaSource,
    SessionConfig, SessionCoordinator, SessionDeps, SessionHandle, SessionObserver,
    TransportConfig, spawn_sample_pump,
};
use huddle_core::ClientId;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Prints what one participant sees.
struct ConsoleObserver {
    name: String,
}

#[async_trait]
impl SessionObserver for ConsoleObserver {
    async fn on_remote_source(&self, peer_id: ClientId, source: RemoteMediaSource) {
        println!(
            "   {} {} receives {:?} from {}",
            "🎧".cyan(),
            self.name.bold(),
            source.kind,
            short(&peer_id)
        );
    }

    async fn on_connected(&self, peer_id: ClientId) {
        println!(
            "   {} {} connected to {}",
            "✔".green(),
            self.name.bold(),
            short(&peer_id)
        );
    }

    async fn on_negotiation_failed(&self, peer_id: ClientId, error: NegotiationError) {
        println!(
            "   {} {} failed with {}: {}",
            "✘".red(),
            self.name.bold(),
            short(&peer_id),
            error
        );
    }
}

fn short(id: &ClientId) -> String {
    id.as_str().chars().take(8).collect()
}

pub async fn run(
    room: String,
    participants: usize,
    glare_policy: GlarePolicy,
    transport: TransportConfig,
    timeout_secs: u64,
) -> Result<()> {
    println!(
        "{}",
        format!("🚀 Starting {} participants in room {}", participants, room)
            .green()
            .bold()
    );

    info!(
        "Demo room {} with {} participants ({:?})",
        room, participants, glare_policy
    );

    let relay = Arc::new(MemoryRelay::new());
    let config = SessionConfig::new(room)
        .with_transport(transport)
        .with_glare_policy(glare_policy);

    let mut handles = Vec::new();
    let mut tasks = Vec::new();
    for _ in 0..participants {
        let id = ClientId::generate();
        let name = short(&id);
        let deps = SessionDeps::new(relay.clone())
            .with_observer(Arc::new(ConsoleObserver { name: name.clone() }));

        let (handle, coordinator) = SessionCoordinator::start(config.clone(), id, deps)
            .await
            .with_context(|| format!("Failed to start participant {}", name))?;
        info!("Participant {} joined", handle.local_id());
        println!("{} {}", "📦 Joined:".cyan(), name.bold());

        let pump = spawn_sample_pump(coordinator.local_source());
        tasks.push(tokio::spawn(async move {
            coordinator.run().await;
            pump.abort();
        }));
        handles.push(handle);

        // Distinct join timestamps keep later arrivals from offering to earlier ones.
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    let expected = participants.saturating_sub(1);
    let deadline = Instant::now() + Duration::from_secs(timeout_secs);
    let meshed = loop {
        if all_connected(&handles, expected).await? {
            break true;
        }
        if Instant::now() > deadline {
            break false;
        }
        tokio::time::sleep(Duration::from_millis(200)).await;
    };

    print_summary(&handles).await?;
    if meshed {
        println!("{}", "✨ Every participant is connected to every other".green().bold());
    } else {
        warn!("Mesh incomplete after {}s", timeout_secs);
        println!("{}", "⏱  Timed out before the mesh was complete".yellow().bold());
    }

    for handle in &handles {
        handle.shutdown().await;
    }
    join_all(tasks).await;
    info!("All {} participants stopped", handles.len());
    Ok(())
}

async fn all_connected(handles: &[SessionHandle], expected: usize) -> Result<bool> {
    for handle in handles {
        let peers = handle.snapshot().await?;
        let connected = peers
            .iter()
            .filter(|p| p.phase == NegotiationPhase::Connected)
            .count();
        if connected < expected {
            return Ok(false);
        }
    }
    Ok(true)
}

async fn print_summary(handles: &[SessionHandle]) -> Result<()> {
    for handle in handles {
        println!("{}", short(handle.local_id()).bold());
        for peer in handle.snapshot().await? {
            let phase = format!("{:?}", peer.phase);
            let phase = match peer.phase {
                NegotiationPhase::Connected => phase.green(),
                NegotiationPhase::Failed => phase.red(),
                _ => phase.yellow(),
            };
            println!("   {} {:?} {}", short(&peer.peer_id), peer.role, phase);
        }
    }
    Ok(())
}
