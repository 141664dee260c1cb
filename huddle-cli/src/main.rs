mod demo;
mod manual;

use anyhow::Result;
use clap::{Args, Parser, Subcommand, ValueEnum};
use huddle_client::{GlarePolicy, TransportConfig};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "huddle")]
#[command(about = "Peer-to-peer audio/video rooms over a shared relay")]
struct Cli {
    /// Where the client identity is kept.
    #[arg(long, global = true, default_value = ".huddle")]
    data_dir: PathBuf,

    /// Skip the public STUN servers and gather host candidates only.
    #[arg(long, global = true)]
    local_only: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run several participants in one process over an in-memory relay.
    Demo(DemoArgs),

    /// Connect two machines by copying the offer and answer by hand.
    #[command(subcommand)]
    Manual(ManualCommand),
}

#[derive(Args)]
struct DemoArgs {
    #[arg(short, long, default_value_t = 3)]
    participants: usize,

    #[arg(short, long, default_value = "demo")]
    room: String,

    /// Give up waiting for the full mesh after this many seconds.
    #[arg(long, default_value_t = 30)]
    timeout_secs: u64,

    #[arg(long, value_enum, default_value_t = GlareArg::Yield)]
    glare: GlareArg,
}

#[derive(Subcommand)]
enum ManualCommand {
    /// Create an offer and wait for the pasted answer.
    Offer(ManualArgs),

    /// Paste an offer and print the answer.
    Answer(ManualArgs),
}

#[derive(Args)]
struct ManualArgs {
    #[arg(long, default_value_t = 120)]
    timeout_secs: u64,
}

#[derive(Clone, Copy, ValueEnum)]
enum GlareArg {
    Ignore,
    Yield,
}

impl From<GlareArg> for GlarePolicy {
    fn from(arg: GlareArg) -> Self {
        match arg {
            GlareArg::Ignore => GlarePolicy::Ignore,
            GlareArg::Yield => GlarePolicy::SmallerIdYields,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();
    let transport = if cli.local_only {
        TransportConfig::local_only()
    } else {
        TransportConfig::default()
    };

    match cli.command {
        Commands::Demo(args) => {
            demo::run(
                args.room,
                args.participants,
                args.glare.into(),
                transport,
                args.timeout_secs,
            )
            .await
        }
        Commands::Manual(ManualCommand::Offer(args)) => {
            manual::offer(&cli.data_dir, transport, args.timeout_secs).await
        }
        Commands::Manual(ManualCommand::Answer(args)) => {
            manual::answer(&cli.data_dir, transport, args.timeout_secs).await
        }
    }
}
