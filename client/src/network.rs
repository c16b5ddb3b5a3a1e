use crate::game::ClientGameState;
use crate::input::ControllerRig;
use bincode::{deserialize, serialize};
use log::{debug, error, info, warn};
use shared::{CombatConfig, Outgoing, Packet, Resolution, PROTOCOL_VERSION};
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use tokio::net::UdpSocket;
use tokio::time::{interval, sleep};

/// Headless combat client driven by a scripted controller rig
pub struct Client {
    socket: UdpSocket,
    server_addr: SocketAddr,
    connected: bool,

    game_state: ClientGameState,
    rig: ControllerRig,
    outgoing: Outgoing,

    fake_ping_ms: u64,
    frame_duration: Duration,
    run_for: Option<Duration>,

    hits_sent: u32,
}

impl Client {
    pub async fn new(
        server_addr: &str,
        fake_ping_ms: u64,
        frame_rate: u32,
        run_for: Option<Duration>,
        config: CombatConfig,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let socket = UdpSocket::bind("0.0.0.0:0").await?;
        let server_addr = server_addr.parse()?;
        let frame_rate = frame_rate.max(1);

        Ok(Client {
            socket,
            server_addr,
            connected: false,
            game_state: ClientGameState::new(config),
            rig: ControllerRig::default(),
            outgoing: Outgoing::new(),
            fake_ping_ms,
            frame_duration: Duration::from_secs_f64(1.0 / frame_rate as f64),
            run_for,
            hits_sent: 0,
        })
    }

    async fn connect(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        info!("Connecting to server...");

        let packet = Packet::Connect {
            client_version: PROTOCOL_VERSION,
        };
        self.send_packet(&packet).await?;

        Ok(())
    }

    async fn send_packet(&self, packet: &Packet) -> Result<(), Box<dyn std::error::Error>> {
        if self.fake_ping_ms > 0 {
            sleep(Duration::from_millis(self.fake_ping_ms / 2)).await;
        }

        let data = serialize(packet)?;
        self.socket.send_to(&data, self.server_addr).await?;
        Ok(())
    }

    fn handle_packet(&mut self, packet: Packet) {
        match &packet {
            Packet::Connected { .. } => self.connected = true,
            Packet::Disconnected { .. } => self.connected = false,
            _ => {}
        }
        self.game_state.handle_packet(packet);
    }

    /// Runs one frame of the rig and the combat core, then flushes requests
    async fn frame(&mut self, dt: f32) -> Result<(), Box<dyn std::error::Error>> {
        let Some(local) = self.game_state.local_entity() else {
            return Ok(());
        };

        if let Some(origin) = self.game_state.entity_position(local) {
            self.rig.set_origin(origin);
        }
        self.rig.aim_at(self.game_state.nearest_target());
        let controllers = self.rig.sample(dt);

        let resolutions = self
            .game_state
            .frame(dt, Some(controllers), &mut self.outgoing);
        for resolution in resolutions {
            match resolution {
                Resolution::Damage(request) => {
                    self.hits_sent += 1;
                    info!(
                        "Hit entity {} at {:.2} m/s, requesting {:.1} damage",
                        request.target, request.source_speed, request.amount
                    );
                }
                Resolution::Effect { kind, .. } => debug!("Requested {:?} effect", kind),
                Resolution::Ignored(reason) => debug!("Contact ignored: {:?}", reason),
            }
        }

        for packet in self.outgoing.take_to_server() {
            self.send_packet(&packet).await?;
        }
        // Broadcasting is the server's job
        self.outgoing.take_broadcasts();

        Ok(())
    }

    pub async fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        self.connect().await?;

        let mut frame_interval = interval(self.frame_duration);
        let mut last_frame = Instant::now();
        let started = Instant::now();
        let deadline = self.run_for.map(|d| started + d);

        let mut buffer = [0u8; 2048];

        loop {
            if deadline.is_some_and(|d| Instant::now() >= d) {
                info!("Run time elapsed after {} hits", self.hits_sent);
                break;
            }

            tokio::select! {
                result = self.socket.recv_from(&mut buffer) => {
                    match result {
                        Ok((len, _)) => {
                            if self.fake_ping_ms > 0 {
                                sleep(Duration::from_millis(self.fake_ping_ms / 2)).await;
                            }

                            match deserialize::<Packet>(&buffer[0..len]) {
                                Ok(packet) => self.handle_packet(packet),
                                Err(e) => warn!("Failed to deserialize packet: {}", e),
                            }
                        },
                        Err(e) => error!("Error receiving packet: {}", e),
                    }
                },

                _ = frame_interval.tick() => {
                    let now = Instant::now();
                    let dt = now.duration_since(last_frame).as_secs_f32();
                    last_frame = now;

                    if let Err(e) = self.frame(dt).await {
                        error!("Error sending requests: {}", e);
                    }
                },

                _ = tokio::signal::ctrl_c() => {
                    info!("Interrupted");
                    break;
                },
            }
        }

        if self.connected {
            let _ = self.send_packet(&Packet::Disconnect).await;
        }

        Ok(())
    }
}
