//! # Combat Client Library
//!
//! This library provides the client side of the networked melee arena. It
//! reads the local player's controllers, replicates its hands to the server,
//! mirrors everyone else's hands and health, and turns fast hand contacts
//! into damage requests.
//!
//! ## Architecture Overview
//!
//! ### Input Authority
//! A client is the only peer that reads its player's controllers, so it is
//! also the only peer that evaluates contacts for those hands. Every other
//! peer sees the same overlap but ignores it. One physical hit therefore
//! produces at most one damage request.
//!
//! ### Requests, Not Results
//! Hits are sent to the server as requests. The client never changes health
//! itself; it waits for the server's `HealthChanged` broadcast and reacts to
//! that, so all peers agree on who is alive.
//!
//! ### Two Hand Representations
//! Visual hands follow the controllers every frame. Logical hands, the ones
//! contacts are computed against, only move on the network cadence so that
//! all peers share the same view of them.
//!
//! ## Module Organization
//!
//! ### Game Module (`game`)
//! Client-side mirror of the arena: entity list, health replica, hand
//! replication for every player, and per-frame contact resolution.
//!
//! ### Contacts Module (`contacts`)
//! Sphere-overlap detection that reports the start of each hand contact.
//!
//! ### Input Module (`input`)
//! A scripted controller rig standing in for tracked VR controllers, so a
//! headless client produces realistic punches.
//!
//! ### Network Module (`network`)
//! UDP socket handling, optional simulated latency and the frame loop.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use client::network::Client;
//! use shared::CombatConfig;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // 72 controller frames per second for thirty seconds, no added latency
//!     let mut client = Client::new(
//!         "127.0.0.1:8080",
//!         0,
//!         72,
//!         Some(Duration::from_secs(30)),
//!         CombatConfig::default(),
//!     )
//!     .await?;
//!
//!     client.run().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Network Conditions
//!
//! Nothing is retried. A lost hand update is superseded by the next one; a
//! lost damage request simply never lands. Remote hands keep their last known
//! pose while updates are missing.

pub mod contacts;
pub mod game;
pub mod input;
pub mod network;
