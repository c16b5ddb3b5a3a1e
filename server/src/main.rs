use clap::Parser;
use log::{error, info};
use server::network::Server;
use shared::CombatConfig;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server IP address to bind to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Server port to listen on
    #[arg(short, long, default_value = "8080")]
    port: u16,

    /// Simulation ticks per second
    #[arg(short, long, default_value = "60")]
    tick_rate: u32,

    /// Maximum number of connected clients
    #[arg(short, long, default_value = "16")]
    max_clients: usize,

    /// Training dummies spawned at start-up
    #[arg(short, long, default_value = "2")]
    dummies: usize,

    /// Seconds between replicated hand updates
    #[arg(long, default_value = "0.1")]
    network_update_rate: f32,

    /// Health every entity spawns with
    #[arg(long, default_value = "100")]
    max_health: f32,

    /// Despawn entities when their health reaches zero
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    destroy_on_death: bool,
}

impl Args {
    fn combat_config(&self) -> CombatConfig {
        CombatConfig {
            network_update_rate: self.network_update_rate,
            max_health: self.max_health,
            destroy_on_death: self.destroy_on_death,
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

    if args.tick_rate == 0 {
        error!("Tick rate must be at least 1");
        return Err("invalid tick rate".into());
    }

    let config = args.combat_config();
    if let Err(e) = config.validate() {
        error!("Invalid combat configuration: {}", e);
        return Err(e.into());
    }

    let address = format!("{}:{}", args.host, args.port);
    let tick_duration = Duration::from_secs_f64(1.0 / args.tick_rate as f64);

    info!(
        "Starting server at {} Hz, up to {} clients, {} dummies",
        args.tick_rate, args.max_clients, args.dummies
    );

    let mut server = Server::new(
        &address,
        tick_duration,
        args.max_clients,
        config,
        args.dummies,
    )
    .await?;

    server.run().await?;

    Ok(())
}
