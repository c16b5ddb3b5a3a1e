//! Authoritative world state: combat entities, their hands and their health

use glam::Vec3;
use log::{debug, info, warn};
use shared::{
    CombatConfig, DamageOutcome, EffectKind, EntityId, EntityKind, EntitySnapshot, HandId,
    HandPose, HandStateSync, HealthEvent, HealthLedger, Outbox, Packet, PeerRole, Rejection,
};
use std::collections::HashMap;
use std::f32::consts::TAU;

/// Distance from the arena centre at which players spawn
pub const PLAYER_SPAWN_RADIUS: f32 = 2.0;
/// Players are spread around the ring in this many slots
const PLAYER_SPAWN_SLOTS: u32 = 8;

#[derive(Debug, Clone, Copy)]
struct EntityRecord {
    kind: EntityKind,
    position: Vec3,
}

#[derive(Debug)]
pub struct GameState {
    pub tick: u32,
    config: CombatConfig,
    ledger: HealthLedger,
    hands: HashMap<EntityId, HandStateSync>,
    entities: HashMap<EntityId, EntityRecord>,
    next_entity_id: EntityId,
}

impl GameState {
    pub fn new(config: CombatConfig) -> Self {
        let mut ledger = HealthLedger::new(PeerRole::Server, config.destroy_on_death);
        ledger.subscribe(|event| match event {
            HealthEvent::Changed { entity, old, new } => {
                debug!("Entity {} health {:.1} -> {:.1}", entity, old, new);
            }
            HealthEvent::Died { entity } => {
                info!("Entity {} is out of the fight", entity);
            }
        });

        Self {
            tick: 0,
            config,
            ledger,
            hands: HashMap::new(),
            entities: HashMap::new(),
            next_entity_id: 1,
        }
    }

    pub fn config(&self) -> &CombatConfig {
        &self.config
    }

    pub fn ledger(&self) -> &HealthLedger {
        &self.ledger
    }

    pub fn hands(&self, entity: EntityId) -> Option<&HandStateSync> {
        self.hands.get(&entity)
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    /// Ring position for the n-th player slot
    pub fn spawn_position(slot: u32) -> Vec3 {
        let angle = (slot % PLAYER_SPAWN_SLOTS) as f32 / PLAYER_SPAWN_SLOTS as f32 * TAU;
        Vec3::new(
            angle.cos() * PLAYER_SPAWN_RADIUS,
            0.0,
            angle.sin() * PLAYER_SPAWN_RADIUS,
        )
    }

    /// Spawns a player entity for a newly connected client.
    pub fn add_player(&mut self, out: &mut impl Outbox) -> Option<EntityId> {
        let position = Self::spawn_position(self.next_entity_id);
        self.spawn(EntityKind::Player, position, out)
    }

    /// Spawns a training dummy: a body with health and no hands.
    pub fn add_dummy(&mut self, position: Vec3, out: &mut impl Outbox) -> Option<EntityId> {
        self.spawn(EntityKind::Dummy, position, out)
    }

    fn spawn(
        &mut self,
        kind: EntityKind,
        position: Vec3,
        out: &mut impl Outbox,
    ) -> Option<EntityId> {
        let id = self.next_entity_id;

        if let Err(e) = self.ledger.spawn(id, self.config.max_health) {
            warn!("Could not spawn {:?}: {}", kind, e);
            return None;
        }
        self.next_entity_id += 1;

        if kind == EntityKind::Player {
            self.hands
                .insert(id, HandStateSync::new(id, PeerRole::Server, &self.config));
        }
        self.entities.insert(id, EntityRecord { kind, position });

        info!(
            "Spawned {:?} {} at ({:.2}, {:.2}, {:.2})",
            kind, id, position.x, position.y, position.z
        );
        out.broadcast(
            Packet::EntitySpawned {
                entity: EntitySnapshot::new(id, kind, position, self.config.max_health),
            },
            None,
        );
        Some(id)
    }

    /// Removes an entity and tells every client. Unknown ids are ignored.
    pub fn remove_entity(&mut self, id: EntityId, out: &mut impl Outbox) {
        self.hands.remove(&id);
        let known = self.entities.remove(&id).is_some();
        let alive = self.ledger.despawn(id).is_some();

        if known || alive {
            info!("Removed entity {}", id);
            out.broadcast(Packet::EntityDespawned { entity_id: id }, None);
        }
    }

    /// Every entity that still has health, ordered by id.
    pub fn snapshot(&self) -> Vec<EntitySnapshot> {
        let mut entities: Vec<EntitySnapshot> = self
            .ledger
            .entities()
            .filter_map(|combat| {
                let record = self.entities.get(&combat.id())?;
                Some(EntitySnapshot {
                    id: combat.id(),
                    kind: record.kind,
                    position: record.position,
                    max_health: combat.max_health(),
                    health: combat.health(),
                })
            })
            .collect();
        entities.sort_by_key(|e| e.id);
        entities
    }

    /// Stores a hand pose from its owning client and relays it to everyone
    /// else. Poses for hands the sender does not own are dropped.
    pub fn handle_hand_pose(
        &mut self,
        sender: u32,
        sender_entity: Option<EntityId>,
        hand: HandId,
        pose: HandPose,
        out: &mut impl Outbox,
    ) -> bool {
        if sender_entity != Some(hand.entity) {
            debug!(
                "Client {} sent a pose for entity {} it does not own",
                sender, hand.entity
            );
            return false;
        }
        let Some(sync) = self.hands.get_mut(&hand.entity) else {
            return false;
        };
        if !sync.receive(hand.side, pose) {
            return false;
        }

        out.broadcast(
            Packet::HandPoseUpdate {
                hand,
                pose: sync.replicated(hand.side),
            },
            Some(sender),
        );
        true
    }

    /// Applies a damage request on behalf of `source`, the requesting
    /// client's entity. `None` is damage the server itself originates.
    pub fn handle_damage_request(
        &mut self,
        source: Option<EntityId>,
        target: EntityId,
        amount: f32,
        out: &mut impl Outbox,
    ) -> DamageOutcome {
        if let Some(source) = source {
            if source == target {
                debug!("Entity {} tried to damage itself", source);
                return DamageOutcome::Rejected(Rejection::SelfDamage);
            }
            if !self.ledger.is_alive(source) {
                debug!("Dropping damage request from dead entity {}", source);
                return DamageOutcome::Rejected(Rejection::SourceDead);
            }
        }

        let outcome = self.ledger.request_damage(target, amount, out);

        if let DamageOutcome::Killed { .. } = outcome {
            // The ledger already announced the despawn
            if self.ledger.get(target).is_none() {
                self.hands.remove(&target);
                self.entities.remove(&target);
            }
        }
        outcome
    }

    /// Spawns a cosmetic effect on every client, the requester included.
    pub fn handle_effect_request(
        &mut self,
        kind: EffectKind,
        position: Vec3,
        out: &mut impl Outbox,
    ) -> bool {
        if !position.is_finite() {
            debug!("Dropping {:?} effect at a non-finite position", kind);
            return false;
        }
        out.broadcast(Packet::SpawnEffect { kind, position }, None);
        true
    }

    /// Advances every hand by one server tick.
    pub fn update(&mut self, dt: f32, out: &mut impl Outbox) {
        for sync in self.hands.values_mut() {
            sync.update(dt, None, out);
        }
        self.tick += 1;
    }
}
