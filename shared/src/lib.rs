//! Combat and replication core shared by the server and the client.
//!
//! Nothing in this crate touches a socket or a clock. Both peers drive the
//! same types from their own tick loop and exchange [`Packet`]s through an
//! [`outbox::Outbox`].

use glam::Vec3;
use serde::{Deserialize, Serialize};

pub mod combat;
pub mod config;
pub mod error;
pub mod hand_sync;
pub mod health;
pub mod outbox;
pub mod replicated;
pub mod velocity;

pub use combat::{
    Collider, CombatResolver, ContactEvent, DamageRequest, EffectKind, IgnoreReason, Resolution,
    SpeedDamageCurve,
};
pub use config::CombatConfig;
pub use error::{AccessError, ConfigError};
pub use hand_sync::{HandId, HandPose, HandSide, HandStateSync, UpdateTimer};
pub use health::{CombatEntity, DamageOutcome, HealthEvent, HealthLedger, LifeState, Rejection};
pub use outbox::{Outbox, Outgoing};
pub use replicated::{PeerRole, Replicated, WriteAccess};
pub use velocity::VelocityTracker;

pub type EntityId = u32;

pub const PROTOCOL_VERSION: u32 = 1;

/// Radius of a logical hand collider.
pub const HAND_RADIUS: f32 = 0.08;
/// Radius of the body collider.
pub const BODY_RADIUS: f32 = 0.35;
/// Height of the body collider's centre above the entity's floor position.
pub const BODY_CENTER_HEIGHT: f32 = 1.2;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub enum Packet {
    Connect {
        client_version: u32,
    },
    HandPoseUpdate {
        hand: HandId,
        pose: HandPose,
    },
    DamageRequest {
        target: EntityId,
        amount: f32,
        source_speed: f32,
    },
    EffectRequest {
        kind: EffectKind,
        position: Vec3,
    },
    Disconnect,

    Connected {
        client_id: u32,
        entity_id: EntityId,
    },
    WorldSnapshot {
        tick: u32,
        entities: Vec<EntitySnapshot>,
    },
    EntitySpawned {
        entity: EntitySnapshot,
    },
    EntityDespawned {
        entity_id: EntityId,
    },
    HealthChanged {
        entity_id: EntityId,
        new_value: f32,
    },
    SpawnEffect {
        kind: EffectKind,
        position: Vec3,
    },
    Disconnected {
        reason: String,
    },
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Player,
    Dummy,
}

/// Everything a client needs to mirror one combat entity.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct EntitySnapshot {
    pub id: EntityId,
    pub kind: EntityKind,
    pub position: Vec3,
    pub max_health: f32,
    pub health: f32,
}

impl EntitySnapshot {
    pub fn new(id: EntityId, kind: EntityKind, position: Vec3, max_health: f32) -> Self {
        Self {
            id,
            kind,
            position,
            max_health,
            health: max_health,
        }
    }
}

pub fn body_center(position: Vec3) -> Vec3 {
    position + Vec3::Y * BODY_CENTER_HEIGHT
}

/// Sphere overlap used by the stand-in collision layer.
pub fn spheres_overlap(a: Vec3, radius_a: f32, b: Vec3, radius_b: f32) -> bool {
    let reach = radius_a + radius_b;
    a.distance_squared(b) < reach * reach
}
