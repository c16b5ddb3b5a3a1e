//! Server network layer handling UDP communications and game loop coordination

use crate::client_manager::{ClientManager, CLIENT_TIMEOUT};
use crate::game::GameState;
use bincode::{deserialize, serialize};
use glam::Vec3;
use log::{debug, error, info, warn};
use rand::Rng;
use shared::{CombatConfig, EntityId, Outbox, Outgoing, Packet, PROTOCOL_VERSION};
use std::f32::consts::TAU;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, RwLock};
use tokio::time::interval;

/// Training dummies are scattered between these distances from the centre
const DUMMY_MIN_RADIUS: f32 = 1.0;
const DUMMY_MAX_RADIUS: f32 = 3.5;

/// Messages sent from network tasks to main server loop
#[derive(Debug)]
pub enum ServerMessage {
    PacketReceived {
        packet: Packet,
        addr: SocketAddr,
    },
    ClientTimeout {
        client_id: u32,
        entity_id: Option<EntityId>,
    },
    Shutdown,
}

/// Messages sent from game loop to network tasks
#[derive(Debug)]
pub enum GameMessage {
    SendPacket {
        packet: Packet,
        addr: SocketAddr,
    },
    BroadcastPacket {
        packet: Packet,
        exclude: Option<u32>,
    },
}

/// Main server coordinating networking and combat simulation
pub struct Server {
    socket: Arc<UdpSocket>,
    clients: Arc<RwLock<ClientManager>>,
    game_state: GameState,
    tick_duration: Duration,
    outgoing: Outgoing,

    // Communication channels
    server_tx: mpsc::UnboundedSender<ServerMessage>,
    server_rx: mpsc::UnboundedReceiver<ServerMessage>,
    game_tx: mpsc::UnboundedSender<GameMessage>,
    game_rx: mpsc::UnboundedReceiver<GameMessage>,
}

/// Random point on the dummy ring around the arena centre
pub fn random_dummy_position(rng: &mut impl Rng) -> Vec3 {
    let angle = rng.gen_range(0.0..TAU);
    let radius = rng.gen_range(DUMMY_MIN_RADIUS..DUMMY_MAX_RADIUS);
    Vec3::new(angle.cos() * radius, 0.0, angle.sin() * radius)
}

impl Server {
    pub async fn new(
        addr: &str,
        tick_duration: Duration,
        max_clients: usize,
        config: CombatConfig,
        dummies: usize,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let socket = Arc::new(UdpSocket::bind(addr).await?);
        info!("Server listening on {}", socket.local_addr()?);

        let (server_tx, server_rx) = mpsc::unbounded_channel();
        let (game_tx, game_rx) = mpsc::unbounded_channel();

        let mut game_state = GameState::new(config);
        let mut outgoing = Outgoing::new();
        let mut rng = rand::thread_rng();
        for _ in 0..dummies {
            game_state.add_dummy(random_dummy_position(&mut rng), &mut outgoing);
        }
        // Nobody is connected yet; late joiners get a snapshot instead
        outgoing.take_broadcasts();

        Ok(Server {
            socket,
            clients: Arc::new(RwLock::new(ClientManager::new(max_clients))),
            game_state,
            tick_duration,
            outgoing,
            server_tx,
            server_rx,
            game_tx,
            game_rx,
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Spawns task that continuously listens for incoming packets
    async fn spawn_network_receiver(&self) {
        let socket = Arc::clone(&self.socket);
        let server_tx = self.server_tx.clone();

        tokio::spawn(async move {
            let mut buffer = [0u8; 2048];

            loop {
                match socket.recv_from(&mut buffer).await {
                    Ok((len, addr)) => {
                        if let Ok(packet) = deserialize::<Packet>(&buffer[0..len]) {
                            if let Err(e) =
                                server_tx.send(ServerMessage::PacketReceived { packet, addr })
                            {
                                error!("Failed to send packet to main loop: {}", e);
                                break;
                            }
                        } else {
                            warn!("Failed to deserialize packet from {}", addr);
                        }
                    }
                    Err(e) => {
                        error!("Error receiving packet: {}", e);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                }
            }
        });
    }

    /// Spawns task that asks the main loop to stop on Ctrl+C
    async fn spawn_shutdown_listener(&self) {
        let server_tx = self.server_tx.clone();

        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for Ctrl+C: {}", e);
                return;
            }
            info!("Interrupted");
            let _ = server_tx.send(ServerMessage::Shutdown);
        });
    }

    /// Spawns task that processes outgoing packet queue
    async fn spawn_network_sender(&mut self) {
        let socket = Arc::clone(&self.socket);
        let clients = Arc::clone(&self.clients);
        let mut game_rx = std::mem::replace(&mut self.game_rx, mpsc::unbounded_channel().1);

        tokio::spawn(async move {
            while let Some(message) = game_rx.recv().await {
                match message {
                    GameMessage::SendPacket { packet, addr } => {
                        if let Err(e) = Self::send_packet_impl(&socket, &packet, addr).await {
                            error!("Failed to send packet to {}: {}", addr, e);
                        }
                    }
                    GameMessage::BroadcastPacket { packet, exclude } => {
                        let client_addrs = {
                            let clients_guard = clients.read().await;
                            clients_guard.get_client_addrs()
                        };

                        for (client_id, addr) in client_addrs {
                            if Some(client_id) == exclude {
                                continue;
                            }

                            if let Err(e) = Self::send_packet_impl(&socket, &packet, addr).await {
                                error!("Failed to send to client {}: {}", client_id, e);
                            }
                        }
                    }
                }
            }
        });
    }

    /// Spawns task that monitors client timeouts
    async fn spawn_timeout_checker(&self) {
        let clients = Arc::clone(&self.clients);
        let server_tx = self.server_tx.clone();

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(1));

            loop {
                interval.tick().await;

                let timed_out = {
                    let mut clients_guard = clients.write().await;
                    clients_guard.check_timeouts(CLIENT_TIMEOUT)
                };

                for (client_id, entity_id) in timed_out {
                    if let Err(e) = server_tx.send(ServerMessage::ClientTimeout {
                        client_id,
                        entity_id,
                    }) {
                        error!("Failed to send timeout message: {}", e);
                        break;
                    }
                }
            }
        });
    }

    async fn send_packet_impl(
        socket: &UdpSocket,
        packet: &Packet,
        addr: SocketAddr,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let data = serialize(packet)?;
        socket.send_to(&data, addr).await?;
        Ok(())
    }

    fn send_packet(&self, packet: Packet, addr: SocketAddr) {
        if let Err(e) = self.game_tx.send(GameMessage::SendPacket { packet, addr }) {
            error!("Failed to queue packet for sending: {}", e);
        }
    }

    fn broadcast_packet(&self, packet: Packet, exclude: Option<u32>) {
        if let Err(e) = self
            .game_tx
            .send(GameMessage::BroadcastPacket { packet, exclude })
        {
            error!("Failed to queue broadcast packet: {}", e);
        }
    }

    /// Hands everything the simulation queued this tick to the sender task
    fn flush_outgoing(&mut self) {
        for (packet, exclude) in self.outgoing.take_broadcasts() {
            self.broadcast_packet(packet, exclude);
        }
        // The server has no server to talk to
        let stray = self.outgoing.take_to_server();
        if !stray.is_empty() {
            warn!("Dropping {} server-bound packets queued on the server", stray.len());
        }
    }

    /// Handles connection lifecycle immediately and queues gameplay
    /// messages for the next tick
    async fn handle_packet(&mut self, packet: Packet, addr: SocketAddr) {
        match packet {
            Packet::Connect { client_version } => {
                info!(
                    "Client connecting from {} (version: {})",
                    addr, client_version
                );

                if client_version != PROTOCOL_VERSION {
                    warn!(
                        "Rejecting {}: protocol {} != {}",
                        addr, client_version, PROTOCOL_VERSION
                    );
                    self.send_packet(
                        Packet::Disconnected {
                            reason: "Protocol version mismatch".to_string(),
                        },
                        addr,
                    );
                    return;
                }

                // Remove existing connection if present
                let existing = {
                    let mut clients = self.clients.write().await;
                    clients
                        .find_client_by_addr(addr)
                        .and_then(|id| clients.remove_client(&id))
                };

                if let Some(existing) = existing {
                    info!("Replacing existing client {} from {}", existing.id, addr);
                    if let Some(entity_id) = existing.entity_id {
                        self.game_state.remove_entity(entity_id, &mut self.outgoing);
                    }
                }

                let client_id = {
                    let mut clients = self.clients.write().await;
                    clients.add_client(addr)
                };

                let Some(client_id) = client_id else {
                    self.send_packet(
                        Packet::Disconnected {
                            reason: "Server full".to_string(),
                        },
                        addr,
                    );
                    return;
                };

                let Some(entity_id) = self.game_state.add_player(&mut self.outgoing) else {
                    error!("No player entity for client {}", client_id);
                    return;
                };
                {
                    let mut clients = self.clients.write().await;
                    clients.assign_entity(client_id, entity_id);
                }

                self.send_packet(
                    Packet::Connected {
                        client_id,
                        entity_id,
                    },
                    addr,
                );
                self.send_packet(
                    Packet::WorldSnapshot {
                        tick: self.game_state.tick,
                        entities: self.game_state.snapshot(),
                    },
                    addr,
                );
                self.flush_outgoing();
            }

            Packet::Disconnect => {
                let removed = {
                    let mut clients = self.clients.write().await;
                    clients
                        .find_client_by_addr(addr)
                        .and_then(|id| clients.remove_client(&id))
                };

                if let Some(entity_id) = removed.and_then(|c| c.entity_id) {
                    self.game_state.remove_entity(entity_id, &mut self.outgoing);
                    self.flush_outgoing();
                }
            }

            Packet::HandPoseUpdate { .. }
            | Packet::DamageRequest { .. }
            | Packet::EffectRequest { .. } => {
                let mut clients = self.clients.write().await;
                match clients.find_client_by_addr(addr) {
                    Some(client_id) => {
                        clients.queue_message(client_id, packet);
                    }
                    None => debug!("Ignoring gameplay packet from unknown {}", addr),
                }
            }

            _ => {
                warn!("Unexpected packet type from client at {}", addr);
            }
        }
    }

    /// Applies queued client messages in arrival order
    async fn process_messages(&mut self) {
        let (messages, owners) = {
            let mut clients = self.clients.write().await;
            let messages = clients.drain_in_arrival_order();
            let owners: Vec<Option<EntityId>> = messages
                .iter()
                .map(|(client_id, _)| clients.entity_of(*client_id))
                .collect();
            (messages, owners)
        };

        for ((client_id, packet), entity) in messages.into_iter().zip(owners) {
            match packet {
                Packet::HandPoseUpdate { hand, pose } => {
                    self.game_state
                        .handle_hand_pose(client_id, entity, hand, pose, &mut self.outgoing);
                }
                Packet::DamageRequest {
                    target,
                    amount,
                    source_speed,
                } => {
                    debug!(
                        "Client {} requests {:.1} damage on {} ({:.2} m/s)",
                        client_id, amount, target, source_speed
                    );
                    let Some(source) = entity else {
                        debug!("Client {} has no entity to attack with", client_id);
                        continue;
                    };
                    self.game_state.handle_damage_request(
                        Some(source),
                        target,
                        amount,
                        &mut self.outgoing,
                    );
                }
                Packet::EffectRequest { kind, position } => {
                    self.game_state
                        .handle_effect_request(kind, position, &mut self.outgoing);
                }
                other => warn!("Unexpected queued packet {:?}", other),
            }
        }
    }

    /// Main server loop coordinating all operations
    pub async fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        // Initialize concurrent tasks
        self.spawn_network_receiver().await;
        self.spawn_network_sender().await;
        self.spawn_timeout_checker().await;
        self.spawn_shutdown_listener().await;

        let mut tick_interval = interval(self.tick_duration);
        let mut last_tick = Instant::now();

        info!("Server started successfully");

        loop {
            tokio::select! {
                // Handle network events
                message = self.server_rx.recv() => {
                    match message {
                        Some(ServerMessage::PacketReceived { packet, addr }) => {
                            self.handle_packet(packet, addr).await;
                        },
                        Some(ServerMessage::ClientTimeout { client_id, entity_id }) => {
                            info!("Client {} timed out", client_id);
                            if let Some(entity_id) = entity_id {
                                self.game_state.remove_entity(entity_id, &mut self.outgoing);
                                self.flush_outgoing();
                            }
                        },
                        Some(ServerMessage::Shutdown) | None => {
                            info!("Server shutting down");
                            self.outgoing.broadcast(
                                Packet::Disconnected {
                                    reason: "Server shutting down".to_string(),
                                },
                                None,
                            );
                            self.flush_outgoing();
                            break;
                        }
                    }
                },

                // Handle server tick events
                _ = tick_interval.tick() => {
                    let now = Instant::now();
                    let dt = now.duration_since(last_tick).as_secs_f32();
                    last_tick = now;

                    self.process_messages().await;
                    self.game_state.update(dt, &mut self.outgoing);
                    self.flush_outgoing();

                    // Periodic performance monitoring
                    if self.game_state.tick % 60 == 0 {
                        let client_count = {
                            let clients = self.clients.read().await;
                            clients.len()
                        };

                        if client_count > 0 {
                            debug!("Tick {}: {} clients, {} entities, {:.1}Hz",
                                   self.game_state.tick, client_count,
                                   self.game_state.entity_count(), 1.0 / dt);
                        }
                    }
                },
            }
        }

        Ok(())
    }
}
