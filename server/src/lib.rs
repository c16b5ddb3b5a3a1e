//! # Combat Server Library
//!
//! This library provides the authoritative server for the networked melee
//! arena. It owns every combat entity's health, relays hand poses between
//! players and turns clients' damage and effect requests into broadcasts.
//!
//! ## Core Responsibilities
//!
//! ### Authoritative Health
//! Only the server's [`shared::HealthLedger`] ever changes health. Clients
//! detect hits locally and *ask* for damage; the server applies the request,
//! clamps at zero, announces deaths and broadcasts the new value.
//!
//! ### Hand Relay
//! Each client owns the two hands of its player entity. The server stores the
//! poses it receives and forwards them to every other client, so remote
//! players see each other's hands within one network update interval.
//!
//! ### Client Management
//! Handles the complete lifecycle of client connections including:
//! - Protocol version check and player entity assignment
//! - Late-join world snapshots
//! - Disconnection and timeout cleanup
//!
//! ## Module Organization
//!
//! ### Client Manager Module (`client_manager`)
//! Connection tracking, client-to-entity mapping and the inbound message
//! queue drained once per tick in arrival order.
//!
//! ### Game Module (`game`)
//! The authoritative world: entities, their hands, their health, and the
//! handlers for each kind of client request.
//!
//! ### Network Module (`network`)
//! UDP socket management, packet (de)serialisation and the main loop.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::network::Server;
//! use shared::CombatConfig;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // 60Hz ticks, up to 16 clients, two training dummies
//!     let mut server = Server::new(
//!         "127.0.0.1:8080",
//!         Duration::from_millis(16),
//!         16,
//!         CombatConfig::default(),
//!         2,
//!     )
//!     .await?;
//!
//!     server.run().await?;
//!     Ok(())
//! }
//! ```
//!
//! The server uses an event-driven architecture with internal async tasks that handle:
//! - **Network Receiver**: Continuously listens for incoming packets
//! - **Network Sender**: Processes outgoing packet queue and broadcasts
//! - **Timeout Checker**: Monitors client health and removes inactive connections
//! - **Main Loop**: Applies queued requests, advances hands and flushes broadcasts
//!
//! ## Trust Model
//!
//! Damage requests are taken at face value apart from basic validation:
//! non-finite or non-positive amounts, unknown targets and dead targets are
//! dropped. Hand poses are only accepted from the client that owns the hand.

pub mod client_manager;
pub mod game;
pub mod network;
