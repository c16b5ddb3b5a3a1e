use clap::Parser;
use client::network;
use log::{error, info};
use shared::{CombatConfig, SpeedDamageCurve};
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server address to connect to
    #[arg(short = 's', long, default_value = "127.0.0.1:8080")]
    server: String,

    /// Simulate network latency in milliseconds
    #[arg(short = 'l', long, default_value = "0")]
    fake_ping: u64,

    /// Controller frames per second
    #[arg(short = 'f', long, default_value = "72")]
    frame_rate: u32,

    /// Seconds to stay connected, 0 runs until Ctrl+C
    #[arg(short = 'd', long, default_value = "0")]
    duration: u64,

    /// Seconds between replicated hand updates
    #[arg(long, default_value = "0.1")]
    network_update_rate: f32,

    /// Hand speed (m/s) below which contacts do nothing
    #[arg(long, default_value = "1.0")]
    min_speed: f32,

    /// Hand speed (m/s) at which damage saturates
    #[arg(long, default_value = "5.0")]
    max_speed: f32,

    /// Damage at the minimum speed
    #[arg(long, default_value = "5.0")]
    min_damage: f32,

    /// Damage at and above the maximum speed
    #[arg(long, default_value = "25.0")]
    max_damage: f32,
}

impl Args {
    fn combat_config(&self) -> CombatConfig {
        CombatConfig {
            network_update_rate: self.network_update_rate,
            curve: SpeedDamageCurve {
                min_speed_threshold: self.min_speed,
                max_speed_threshold: self.max_speed,
                min_damage: self.min_damage,
                max_damage: self.max_damage,
            },
            ..CombatConfig::default()
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    let config = args.combat_config();
    if let Err(e) = config.validate() {
        error!("Invalid combat configuration: {}", e);
        return Err(e.into());
    }

    info!("Starting client...");
    info!("Connecting to: {}", args.server);
    if args.fake_ping > 0 {
        info!("Simulating {}ms latency", args.fake_ping);
    }
    let run_for = (args.duration > 0).then(|| Duration::from_secs(args.duration));

    let mut client = network::Client::new(
        &args.server,
        args.fake_ping,
        args.frame_rate,
        run_for,
        config,
    )
    .await?;

    client.run().await?;

    Ok(())
}
