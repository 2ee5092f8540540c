//! CCV Consumer Node
//!
//! Runs a consumer keeper against an in-process simulated provider.
//! Each tick is one consumer block: provider acks and VSC packets are
//! delivered, random downtime evidence is queued, then end-of-block work
//! sends whatever the queue allows. State lives in sled and survives restarts.

use anyhow::Result;
use ccv_consumer::{
    BlockContext, ConsumerEvent, ConsumerKeeper, ConsumerStore, MemoryStore, SledStore,
};
use ccv_types::{Infraction, Validator, ValidatorKey};
use clap::Parser;
use rand::{rngs::StdRng, Rng, SeedableRng};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod config;
mod provider;

use config::NodeConfig;
use provider::{LoopbackTransport, SimulatedProvider};

/// CCV consumer chain node
#[derive(Parser, Debug)]
#[command(name = "ccv-consumer")]
#[command(about = "Consumer-side validator set sync and slash packet relay", long_about = None)]
struct Args {
    /// Path to a JSON config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Block time in milliseconds
    #[arg(long, default_value = "1000")]
    block_time_ms: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Data directory for persistent state
    #[arg(long, default_value = "./data")]
    data_dir: PathBuf,

    /// Keep state in memory only
    #[arg(long)]
    ephemeral: bool,

    /// Stop after this many blocks (0 = run until Ctrl+C)
    #[arg(long, default_value = "0")]
    max_blocks: u64,

    /// Log queue stats every N blocks
    #[arg(long, default_value = "10")]
    stats_interval: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = NodeConfig::load(args.config.as_deref())?;

    tracing::info!("Starting CCV consumer node");
    tracing::info!("  Provider channel: {}", config.channel_id);
    tracing::info!("  Block time: {}ms", args.block_time_ms);
    tracing::info!("  Retry delay: {}s", config.params.retry_delay_period_secs);
    tracing::info!("  Unbonding period: {}s", config.params.unbonding_period_secs);

    let (provider, transport) = SimulatedProvider::new(&config.channel_id, config.simulation.clone());

    if args.ephemeral {
        tracing::info!("  Storage: in-memory");
        run(args, config, MemoryStore::new(), provider, transport).await
    } else {
        tracing::info!("  Data directory: {:?}", args.data_dir);
        std::fs::create_dir_all(&args.data_dir)?;
        let store = SledStore::open(&args.data_dir)?;
        tracing::info!("Opened store with {} pending packets", store.pending_packet_count());
        run(args, config, store, provider, transport).await
    }
}

async fn run<S: ConsumerStore>(
    args: Args,
    config: NodeConfig,
    store: S,
    mut provider: SimulatedProvider,
    transport: LoopbackTransport,
) -> Result<()> {
    let mut keeper = ConsumerKeeper::new(store, transport).with_params(config.params.clone());

    // Log keeper events as they happen
    let mut events = keeper.subscribe();
    let event_logger = tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event {
                ConsumerEvent::ChannelEstablished { port, channel } => {
                    tracing::info!("Event: channel established {}/{}", port, channel)
                }
                ConsumerEvent::SlashRequest {
                    validator,
                    valset_update_id,
                    infraction,
                } => tracing::info!(
                    "Event: {} slash request for {} at vscID {}",
                    infraction,
                    validator,
                    valset_update_id
                ),
                ConsumerEvent::SendFailed {
                    kind,
                    client_expired,
                    reason,
                } => tracing::warn!(
                    "Event: {} packet send failed (client expired: {}): {}",
                    kind,
                    client_expired,
                    reason
                ),
                ConsumerEvent::ErrorAcknowledgement { channel, error } => {
                    tracing::error!("Event: error acknowledgement on {}: {}", channel, error)
                }
            }
        }
    });

    let mut powers: HashMap<ValidatorKey, i64> = HashMap::new();
    let validator_keys = provider.validator_keys();
    let mut rng = StdRng::seed_from_u64(config.simulation.seed.wrapping_add(1));

    let mut interval = tokio::time::interval(Duration::from_millis(args.block_time_ms.max(1)));
    let mut height = 0u64;

    tracing::info!("Consumer node running. Press Ctrl+C to stop.");

    loop {
        tokio::select! {
            _ = interval.tick() => {}
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Shutting down...");
                break;
            }
        }

        height += 1;
        let ctx = BlockContext::new(height, chrono::Utc::now());
        let output = provider.step(height);

        for (packet, ack) in output.acks {
            if let Err(e) = keeper.on_acknowledgement(&packet, ack) {
                tracing::error!("Failed to handle acknowledgement for seq {}: {}", packet.sequence, e);
            }
        }

        if let Some((packet, data)) = output.vsc {
            if let Err(e) = keeper.on_recv_vsc_packet(&ctx, &packet, data) {
                if e.is_fatal() {
                    tracing::error!("Fatal error receiving VSC packet: {}", e);
                    break;
                }
                tracing::warn!("Rejected VSC packet seq {}: {}", packet.sequence, e);
            }
        }

        let changes = keeper.take_pending_changes()?;
        if !changes.is_empty() {
            tracing::info!("Block {}: applying {} validator updates", height, changes.len());
            for change in changes {
                if change.power == 0 {
                    powers.remove(&change.pub_key);
                } else {
                    powers.insert(change.pub_key, change.power);
                }
            }
        }

        if !validator_keys.is_empty() && rng.gen_bool(config.simulation.downtime_probability.clamp(0.0, 1.0)) {
            let key = &validator_keys[rng.gen_range(0..validator_keys.len())];
            let infraction_height = height.saturating_sub(1).max(1);
            let vsc_id = keeper.vsc_id_for_infraction(infraction_height)?;
            let validator = Validator {
                address: key.cons_address(),
                power: powers.get(key).copied().unwrap_or_default(),
            };
            keeper.queue_slash_packet(validator, vsc_id, Infraction::Downtime)?;
        }

        let sent = keeper.end_block(&ctx)?;
        if sent > 0 {
            tracing::debug!("Block {}: sent {} packets", height, sent);
        }

        if args.stats_interval > 0 && height % args.stats_interval == 0 {
            tracing::info!(
                "Block {}: {} pending packets, slash record {:?}, {} outstanding downtime, {} validators",
                height,
                keeper.pending_packets()?.len(),
                keeper.slash_record()?,
                keeper.outstanding_downtimes()?.len(),
                powers.len()
            );
        }

        if args.max_blocks > 0 && height >= args.max_blocks {
            tracing::info!("Reached {} blocks", height);
            break;
        }
    }

    keeper.commit()?;
    event_logger.abort();

    tracing::info!("Consumer node stopped at block {}", height);

    Ok(())
}
