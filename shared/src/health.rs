//! Server-authoritative health and death
//!
//! Any peer can ask for damage, only the server's ledger applies it. The
//! resulting value is broadcast and mirrored into every client's ledger,
//! where it drives local feedback through the same events.

use crate::error::AccessError;
use crate::outbox::Outbox;
use crate::replicated::{PeerRole, Replicated, WriteAccess};
use crate::{EntityId, Packet};
use log::{debug, info, warn};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifeState {
    Alive,
    /// Terminal. Bringing an entity back is a new spawn.
    Dead,
}

/// A damageable object.
#[derive(Debug)]
pub struct CombatEntity {
    id: EntityId,
    max_health: f32,
    health: Replicated<f32>,
    state: LifeState,
}

impl CombatEntity {
    fn new(id: EntityId, max_health: f32, health: f32, role: PeerRole) -> Self {
        let state = if health > 0.0 {
            LifeState::Alive
        } else {
            LifeState::Dead
        };
        Self {
            id,
            max_health,
            health: Replicated::new(health, WriteAccess::Server, role),
            state,
        }
    }

    pub fn id(&self) -> EntityId {
        self.id
    }

    pub fn max_health(&self) -> f32 {
        self.max_health
    }

    pub fn health(&self) -> f32 {
        *self.health.get()
    }

    pub fn state(&self) -> LifeState {
        self.state
    }

    pub fn is_alive(&self) -> bool {
        self.state == LifeState::Alive && self.health() > 0.0
    }

    pub fn role(&self) -> PeerRole {
        self.health.role()
    }

    /// Hook called with `(old, new)` whenever this entity's health changes
    /// on the local peer.
    pub fn on_health_changed<F>(&mut self, mut hook: F)
    where
        F: FnMut(f32, f32) + Send + 'static,
    {
        self.health.subscribe(move |old, new| hook(*old, *new));
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HealthEvent {
    Changed { entity: EntityId, old: f32, new: f32 },
    Died { entity: EntityId },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    NotServer,
    InvalidAmount,
    UnknownTarget,
    AlreadyDead,
    /// The requester aimed at its own entity.
    SelfDamage,
    /// The requester's entity is dead or gone.
    SourceDead,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DamageOutcome {
    Applied { old: f32, new: f32 },
    Killed { old: f32 },
    Rejected(Rejection),
}

type Listener = Box<dyn FnMut(&HealthEvent) + Send>;

/// Health of every combat entity known to this peer.
pub struct HealthLedger {
    role: PeerRole,
    destroy_on_death: bool,
    entities: HashMap<EntityId, CombatEntity>,
    listeners: Vec<Listener>,
}

impl HealthLedger {
    /// `role` is the peer's role for the ledger as a whole: `Server` for the
    /// authoritative copy, anything else for a mirror.
    pub fn new(role: PeerRole, destroy_on_death: bool) -> Self {
        Self {
            role,
            destroy_on_death,
            entities: HashMap::new(),
            listeners: Vec::new(),
        }
    }

    pub fn is_authoritative(&self) -> bool {
        self.role == PeerRole::Server
    }

    /// Adds a listener that receives every event from now on.
    pub fn subscribe<F>(&mut self, listener: F)
    where
        F: FnMut(&HealthEvent) + Send + 'static,
    {
        self.listeners.push(Box::new(listener));
    }

    /// Creates an entity at full health. Only the server initialises health.
    pub fn spawn(&mut self, id: EntityId, max_health: f32) -> Result<(), AccessError> {
        if !self.is_authoritative() {
            return Err(AccessError {
                role: self.role,
                access: WriteAccess::Server,
            });
        }
        if self.entities.contains_key(&id) {
            warn!("Entity {} spawned twice, resetting it", id);
        }
        self.entities.insert(
            id,
            CombatEntity::new(id, max_health, max_health, PeerRole::Server),
        );
        Ok(())
    }

    /// Mirrors an entity announced by the server. `role` is this client's
    /// role for it (owner of its own player, remote for everything else).
    pub fn insert_replica(&mut self, id: EntityId, max_health: f32, health: f32, role: PeerRole) {
        if self.is_authoritative() || role == PeerRole::Server {
            warn!("Refusing to mirror entity {} on an authoritative ledger", id);
            return;
        }
        let health = if health.is_finite() { health.max(0.0) } else { 0.0 };
        self.entities
            .insert(id, CombatEntity::new(id, max_health, health, role));
    }

    /// Applies a damage request from any peer.
    ///
    /// Input is untrusted: non-server ledgers, bad amounts, unknown targets
    /// and dead targets are all no-ops reported through [`Rejection`].
    pub fn request_damage(
        &mut self,
        target: EntityId,
        amount: f32,
        out: &mut impl Outbox,
    ) -> DamageOutcome {
        if !self.is_authoritative() {
            debug!("Damage request for {} ignored on a non-server peer", target);
            return DamageOutcome::Rejected(Rejection::NotServer);
        }
        if !amount.is_finite() || amount <= 0.0 {
            debug!("Dropping damage request with amount {}", amount);
            return DamageOutcome::Rejected(Rejection::InvalidAmount);
        }
        let Some(entity) = self.entities.get_mut(&target) else {
            debug!("Dropping damage request for unknown entity {}", target);
            return DamageOutcome::Rejected(Rejection::UnknownTarget);
        };
        if entity.health() <= 0.0 {
            return DamageOutcome::Rejected(Rejection::AlreadyDead);
        }

        let old = entity.health();
        let new = (old - amount).max(0.0);
        if let Err(e) = entity.health.set(new) {
            warn!("Damage to {} not applied: {}", target, e);
            return DamageOutcome::Rejected(Rejection::NotServer);
        }
        let died = new <= 0.0;
        if died {
            entity.state = LifeState::Dead;
        }

        out.broadcast(
            Packet::HealthChanged {
                entity_id: target,
                new_value: new,
            },
            None,
        );
        self.emit(HealthEvent::Changed {
            entity: target,
            old,
            new,
        });

        if !died {
            return DamageOutcome::Applied { old, new };
        }

        info!("Entity {} has died", target);
        self.emit(HealthEvent::Died { entity: target });
        if self.destroy_on_death {
            self.entities.remove(&target);
            out.broadcast(Packet::EntityDespawned { entity_id: target }, None);
        }
        DamageOutcome::Killed { old }
    }

    /// Applies a `HealthChanged` value received from the server.
    pub fn apply_replicated(&mut self, id: EntityId, new_value: f32) -> bool {
        if self.is_authoritative() || !new_value.is_finite() {
            return false;
        }
        let Some(entity) = self.entities.get_mut(&id) else {
            debug!("Health update for unknown entity {}", id);
            return false;
        };

        let new = new_value.max(0.0);
        let Some(old) = entity.health.apply_remote(new) else {
            return false;
        };
        let died = new <= 0.0 && entity.state == LifeState::Alive;
        if died {
            entity.state = LifeState::Dead;
        }

        self.emit(HealthEvent::Changed { entity: id, old, new });
        if died {
            self.emit(HealthEvent::Died { entity: id });
        }
        true
    }

    pub fn despawn(&mut self, id: EntityId) -> Option<CombatEntity> {
        self.entities.remove(&id)
    }

    pub fn get(&self, id: EntityId) -> Option<&CombatEntity> {
        self.entities.get(&id)
    }

    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut CombatEntity> {
        self.entities.get_mut(&id)
    }

    pub fn health(&self, id: EntityId) -> Option<f32> {
        self.entities.get(&id).map(CombatEntity::health)
    }

    pub fn is_alive(&self, id: EntityId) -> bool {
        self.entities.get(&id).is_some_and(CombatEntity::is_alive)
    }

    pub fn entities(&self) -> impl Iterator<Item = &CombatEntity> {
        self.entities.values()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    fn emit(&mut self, event: HealthEvent) {
        for listener in &mut self.listeners {
            listener(&event);
        }
    }
}

impl std::fmt::Debug for HealthLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HealthLedger")
            .field("role", &self.role)
            .field("destroy_on_death", &self.destroy_on_death)
            .field("entities", &self.entities)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}
