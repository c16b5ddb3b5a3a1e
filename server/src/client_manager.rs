//! Client connection management and inbound message queuing for the server
//!
//! This module handles the server-side bookkeeping of connected clients:
//! - Client connection lifecycle (connect, disconnect, timeout)
//! - Mapping each client to the player entity it controls
//! - Buffering inbound messages until the next simulation tick
//! - Client capacity management and address tracking
//!
//! Messages are handed to the simulation in the order the transport delivered
//! them. Nothing is reordered or deduplicated here.

use log::info;
use shared::{EntityId, Packet};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

/// Seconds of silence before a client is dropped
pub const CLIENT_TIMEOUT: Duration = Duration::from_secs(5);

/// Represents a connected client and its pending messages
#[derive(Debug)]
pub struct Client {
    /// Unique client identifier assigned by the server
    pub id: u32,
    /// Network address for sending responses
    pub addr: SocketAddr,
    /// Player entity whose hands this client owns
    pub entity_id: Option<EntityId>,
    /// Last time we received any packet from this client
    pub last_seen: Instant,
    /// Messages waiting for the next tick, tagged with their arrival number
    pub pending: Vec<(u64, Packet)>,
}

impl Client {
    /// Creates a new client with the given ID and network address
    pub fn new(id: u32, addr: SocketAddr) -> Self {
        Self {
            id,
            addr,
            entity_id: None,
            last_seen: Instant::now(),
            pending: Vec::new(),
        }
    }

    /// Buffers a message and refreshes the activity timestamp
    pub fn queue(&mut self, arrival: u64, packet: Packet) {
        self.last_seen = Instant::now();
        self.pending.push((arrival, packet));
    }

    /// Checks if the client has exceeded the connection timeout
    pub fn is_timed_out(&self, timeout: Duration) -> bool {
        self.last_seen.elapsed() > timeout
    }
}

/// Manages all connected clients and their inbound queues
///
/// The ClientManager enforces server capacity and serialises messages from
/// every client into a single stream the tick loop consumes one at a time.
pub struct ClientManager {
    /// Connected clients indexed by their unique ID
    clients: HashMap<u32, Client>,
    /// Next available client ID for new connections
    next_client_id: u32,
    /// Maximum number of concurrent clients allowed
    max_clients: usize,
    /// Monotonic counter stamped on every queued message
    next_arrival: u64,
}

impl ClientManager {
    /// Creates a new client manager with the specified capacity limit
    ///
    /// Client IDs start from 1 and increment for each new connection.
    pub fn new(max_clients: usize) -> Self {
        Self {
            clients: HashMap::new(),
            next_client_id: 1,
            max_clients,
            next_arrival: 0,
        }
    }

    /// Attempts to add a new client connection
    ///
    /// Returns Some(client_id) if successful, None if server is at capacity.
    pub fn add_client(&mut self, addr: SocketAddr) -> Option<u32> {
        if self.clients.len() >= self.max_clients {
            return None;
        }

        let client_id = self.next_client_id;
        self.next_client_id += 1;

        let client = Client::new(client_id, addr);
        info!("Client {} connected from {}", client_id, addr);
        self.clients.insert(client_id, client);

        Some(client_id)
    }

    /// Removes a client from the server
    ///
    /// Returns the removed client so its entity can be cleaned up, or None
    /// if it was already gone.
    pub fn remove_client(&mut self, client_id: &u32) -> Option<Client> {
        let client = self.clients.remove(client_id)?;
        info!("Client {} disconnected", client.id);
        Some(client)
    }

    /// Finds a client ID by their network address
    pub fn find_client_by_addr(&self, addr: SocketAddr) -> Option<u32> {
        self.clients
            .iter()
            .find(|(_, client)| client.addr == addr)
            .map(|(id, _)| *id)
    }

    /// Records which player entity a client controls
    pub fn assign_entity(&mut self, client_id: u32, entity_id: EntityId) -> bool {
        match self.clients.get_mut(&client_id) {
            Some(client) => {
                client.entity_id = Some(entity_id);
                true
            }
            None => false,
        }
    }

    pub fn entity_of(&self, client_id: u32) -> Option<EntityId> {
        self.clients.get(&client_id).and_then(|c| c.entity_id)
    }

    /// Buffers a message from a specific client
    ///
    /// Returns false if the client ID is unknown.
    pub fn queue_message(&mut self, client_id: u32, packet: Packet) -> bool {
        let Some(client) = self.clients.get_mut(&client_id) else {
            return false;
        };
        let arrival = self.next_arrival;
        self.next_arrival += 1;
        client.queue(arrival, packet);
        true
    }

    /// Takes every buffered message, oldest first across all clients
    pub fn drain_in_arrival_order(&mut self) -> Vec<(u32, Packet)> {
        let mut all: Vec<(u64, u32, Packet)> = Vec::new();

        for (client_id, client) in &mut self.clients {
            for (arrival, packet) in client.pending.drain(..) {
                all.push((arrival, *client_id, packet));
            }
        }

        all.sort_by_key(|(arrival, _, _)| *arrival);
        all.into_iter()
            .map(|(_, client_id, packet)| (client_id, packet))
            .collect()
    }

    /// Checks for and removes timed-out clients
    ///
    /// Returns (client_id, entity_id) for each removed client so the game
    /// state can despawn their players.
    pub fn check_timeouts(&mut self, timeout: Duration) -> Vec<(u32, Option<EntityId>)> {
        let timed_out: Vec<u32> = self
            .clients
            .iter()
            .filter(|(_, client)| client.is_timed_out(timeout))
            .map(|(id, _)| *id)
            .collect();

        timed_out
            .into_iter()
            .filter_map(|id| self.remove_client(&id))
            .map(|client| (client.id, client.entity_id))
            .collect()
    }

    /// Gets all client IDs and their network addresses
    pub fn get_client_addrs(&self) -> Vec<(u32, SocketAddr)> {
        self.clients
            .iter()
            .map(|(id, client)| (*id, client.addr))
            .collect()
    }

    /// Returns the number of currently connected clients
    pub fn len(&self) -> usize {
        self.clients.len()
    }

    /// Returns true if no clients are currently connected
    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}
