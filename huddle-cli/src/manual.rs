use anyhow::{Context, Result};
use colored::*;
use dialoguer::Input;
use huddle_client::{
    IdentityStore, ManualSession, MediaSource, SyntheticMediaSource, TransportConfig,
    WebRtcEngineFactory, spawn_sample_pump,
};
use huddle_core::MediaConstraints;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

async fn open_session(data_dir: &Path, transport: TransportConfig) -> Result<ManualSession> {
    let id = IdentityStore::in_dir(data_dir)
        .load_or_create()
        .context("Failed to load client identity")?;
    let source = SyntheticMediaSource
        .acquire(MediaConstraints::default())
        .await
        .context("Failed to acquire local media")?;

    info!("Manual session for {} ({:?})", id, source.kinds());
    println!("{} {}", "🔑 Client id:".cyan(), id.as_str().bold());
    Ok(ManualSession::new(
        id,
        source,
        Arc::new(WebRtcEngineFactory::new(transport)),
    ))
}

async fn prompt(label: &'static str) -> Result<String> {
    tokio::task::spawn_blocking(move || Input::<String>::new().with_prompt(label).interact_text())
        .await?
        .context("Failed to read pasted text")
}

pub async fn offer(data_dir: &Path, transport: TransportConfig, timeout_secs: u64) -> Result<()> {
    let mut session = open_session(data_dir, transport).await?;
    let pump = spawn_sample_pump(session.local_source());

    println!("{}", "📦 Gathering candidates...".cyan());
    let offer = session.create_offer().await?;
    println!("{}", "Send this offer to the other side:".green().bold());
    println!("{}", offer);

    let answer = prompt("Paste the answer").await?;
    debug!("Read {} bytes of answer text", answer.len());
    session.receive_answer(&answer).await?;

    let result = wait(&mut session, timeout_secs).await;
    pump.abort();
    session.close().await;
    result
}

pub async fn answer(data_dir: &Path, transport: TransportConfig, timeout_secs: u64) -> Result<()> {
    let mut session = open_session(data_dir, transport).await?;
    let pump = spawn_sample_pump(session.local_source());

    let offer = prompt("Paste the offer").await?;
    debug!("Read {} bytes of offer text", offer.len());
    println!("{}", "📦 Gathering candidates...".cyan());
    let answer = session.receive_offer(&offer).await?;
    println!("{}", "Send this answer back:".green().bold());
    println!("{}", answer);

    let result = wait(&mut session, timeout_secs).await;
    pump.abort();
    session.close().await;
    result
}

async fn wait(session: &mut ManualSession, timeout_secs: u64) -> Result<()> {
    println!("{}", "⏳ Waiting for remote media...".cyan());
    session
        .wait_connected(Duration::from_secs(timeout_secs))
        .await?;

    let kind = session
        .remote_source()
        .map(|s| format!("{:?}", s.kind))
        .unwrap_or_default();
    info!("Manual session connected");
    println!("{} {}", "✨ Connected, receiving".green().bold(), kind);
    Ok(())
}
