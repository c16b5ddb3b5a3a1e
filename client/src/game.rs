use crate::contacts::ContactSensor;
use glam::Vec3;
use log::{debug, info, warn};
use shared::{
    body_center, CombatConfig, CombatResolver, EffectKind, EntityId, EntityKind, EntitySnapshot,
    HandId, HandPose, HandSide, HandStateSync, HealthEvent, HealthLedger, Outbox, Packet,
    PeerRole, Resolution,
};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy)]
struct RemoteEntity {
    kind: EntityKind,
    position: Vec3,
}

/// Everything one client knows about the arena
///
/// Health is a mirror of the server's ledger. The local player's hands are
/// driven by the controllers; every other player's hands follow the poses
/// relayed by the server.
pub struct ClientGameState {
    pub client_id: Option<u32>,
    pub last_server_tick: u32,
    config: CombatConfig,
    resolver: CombatResolver,
    ledger: HealthLedger,
    hands: HashMap<EntityId, HandStateSync>,
    entities: HashMap<EntityId, RemoteEntity>,
    local_entity: Option<EntityId>,
    sensor: ContactSensor,
    effects: Vec<(EffectKind, Vec3)>,
}

impl ClientGameState {
    pub fn new(config: CombatConfig) -> Self {
        let mut ledger = HealthLedger::new(PeerRole::Remote, config.destroy_on_death);
        ledger.subscribe(|event| {
            if let HealthEvent::Died { entity } = event {
                info!("Entity {} went down", entity);
            }
        });

        Self {
            client_id: None,
            last_server_tick: 0,
            resolver: CombatResolver::new(config.curve),
            config,
            ledger,
            hands: HashMap::new(),
            entities: HashMap::new(),
            local_entity: None,
            sensor: ContactSensor::new(),
            effects: Vec::new(),
        }
    }

    pub fn local_entity(&self) -> Option<EntityId> {
        self.local_entity
    }

    pub fn ledger(&self) -> &HealthLedger {
        &self.ledger
    }

    pub fn hands(&self, entity: EntityId) -> Option<&HandStateSync> {
        self.hands.get(&entity)
    }

    pub fn entity_position(&self, entity: EntityId) -> Option<Vec3> {
        self.entities.get(&entity).map(|e| e.position)
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    /// Effects spawned by the server since the last call
    pub fn take_effects(&mut self) -> Vec<(EffectKind, Vec3)> {
        std::mem::take(&mut self.effects)
    }

    /// Body centre of the closest living entity other than our own
    pub fn nearest_target(&self) -> Option<Vec3> {
        let origin = self.local_entity.and_then(|id| self.entity_position(id))?;

        self.entities
            .iter()
            .filter(|(id, _)| Some(**id) != self.local_entity && self.ledger.is_alive(**id))
            .map(|(_, e)| e.position)
            .min_by(|a, b| {
                a.distance_squared(origin)
                    .total_cmp(&b.distance_squared(origin))
            })
            .map(body_center)
    }

    pub fn handle_packet(&mut self, packet: Packet) {
        match packet {
            Packet::Connected {
                client_id,
                entity_id,
            } => {
                info!("Connected! Client ID: {}, entity {}", client_id, entity_id);
                self.client_id = Some(client_id);
                self.local_entity = Some(entity_id);
                // The spawn broadcast may have beaten the handshake here
                if let Some(entity) = self.snapshot_of(entity_id) {
                    self.spawn_entity(entity);
                }
            }

            Packet::WorldSnapshot { tick, entities } => {
                debug!("World snapshot at tick {} with {} entities", tick, entities.len());
                self.last_server_tick = tick;
                for entity in entities {
                    self.spawn_entity(entity);
                }
            }

            Packet::EntitySpawned { entity } => self.spawn_entity(entity),

            Packet::EntityDespawned { entity_id } => self.despawn_entity(entity_id),

            Packet::HealthChanged {
                entity_id,
                new_value,
            } => {
                self.ledger.apply_replicated(entity_id, new_value);
            }

            Packet::HandPoseUpdate { hand, pose } => {
                if let Some(sync) = self.hands.get_mut(&hand.entity) {
                    sync.receive(hand.side, pose);
                }
            }

            Packet::SpawnEffect { kind, position } => {
                debug!(
                    "{:?} effect at ({:.2}, {:.2}, {:.2})",
                    kind, position.x, position.y, position.z
                );
                self.effects.push((kind, position));
            }

            Packet::Disconnected { reason } => {
                warn!("Disconnected: {}", reason);
                self.clear();
            }

            _ => {
                warn!("Unexpected packet type");
            }
        }
    }

    fn snapshot_of(&self, id: EntityId) -> Option<EntitySnapshot> {
        let entity = self.entities.get(&id)?;
        let combat = self.ledger.get(id)?;
        Some(EntitySnapshot {
            id,
            kind: entity.kind,
            position: entity.position,
            max_health: combat.max_health(),
            health: combat.health(),
        })
    }

    /// Mirrors an entity announced by the server, replacing any older copy.
    pub fn spawn_entity(&mut self, entity: EntitySnapshot) {
        let owned = Some(entity.id) == self.local_entity;
        let role = if owned {
            PeerRole::Owner
        } else {
            PeerRole::Remote
        };

        self.ledger
            .insert_replica(entity.id, entity.max_health, entity.health, role);
        if owned {
            let max = entity.max_health;
            if let Some(combat) = self.ledger.get_mut(entity.id) {
                combat.on_health_changed(move |_, new| {
                    info!("Health changed: {}/{}", new, max);
                });
            }
            self.sensor.reset();
        }

        if entity.kind == EntityKind::Player {
            self.hands
                .insert(entity.id, HandStateSync::new(entity.id, role, &self.config));
        }
        self.entities.insert(
            entity.id,
            RemoteEntity {
                kind: entity.kind,
                position: entity.position,
            },
        );
    }

    pub fn despawn_entity(&mut self, id: EntityId) {
        self.ledger.despawn(id);
        self.hands.remove(&id);
        self.entities.remove(&id);
        if Some(id) == self.local_entity {
            info!("Our player was removed from the arena");
            self.sensor.reset();
        }
    }

    fn clear(&mut self) {
        let ids: Vec<EntityId> = self.entities.keys().copied().collect();
        for id in ids {
            self.despawn_entity(id);
        }
        self.client_id = None;
        self.local_entity = None;
    }

    /// Advances every hand by one frame and resolves new contacts of the
    /// local player's hands. Returns what each contact resolved to.
    pub fn frame(
        &mut self,
        dt: f32,
        controllers: Option<[HandPose; 2]>,
        out: &mut impl Outbox,
    ) -> Vec<Resolution> {
        for (id, sync) in self.hands.iter_mut() {
            let input = controllers.filter(|_| Some(*id) == self.local_entity);
            sync.update(dt, input, out);
        }

        let Some(local) = self.local_entity else {
            return Vec::new();
        };
        if !self.ledger.is_alive(local) {
            return Vec::new();
        }
        let Some(own) = self.hands.get(&local) else {
            return Vec::new();
        };

        let own_hands = [
            own.logical(HandSide::Left).position,
            own.logical(HandSide::Right).position,
        ];
        let bodies: Vec<(EntityId, Vec3)> = self
            .entities
            .iter()
            .filter(|(id, _)| self.ledger.is_alive(**id))
            .map(|(id, e)| (*id, body_center(e.position)))
            .collect();
        let hands: Vec<(HandId, Vec3)> = self
            .hands
            .values()
            .flat_map(|sync| {
                HandSide::BOTH
                    .map(|side| (HandId::new(sync.entity(), side), sync.logical(side).position))
            })
            .collect();

        let contacts = self.sensor.detect(local, own_hands, &bodies, &hands);
        contacts
            .iter()
            .map(|contact| self.resolver.handle_contact(contact, own, out))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Quat;
    use shared::{DamageRequest, IgnoreReason, Outgoing};

    const DT: f32 = 1.0 / 72.0;

    fn player(id: EntityId, position: Vec3) -> EntitySnapshot {
        EntitySnapshot::new(id, EntityKind::Player, position, 100.0)
    }

    fn connected(local: EntityId) -> ClientGameState {
        let mut state = ClientGameState::new(CombatConfig::default());
        state.handle_packet(Packet::Connected {
            client_id: 1,
            entity_id: local,
        });
        state
    }

    fn still(position: Vec3) -> [HandPose; 2] {
        [
            HandPose::new(position - Vec3::X * 0.25, Quat::IDENTITY),
            HandPose::new(position + Vec3::X * 0.25, Quat::IDENTITY),
        ]
    }

    #[test]
    fn test_snapshot_populates_mirror() {
        let mut state = connected(1);
        state.handle_packet(Packet::WorldSnapshot {
            tick: 30,
            entities: vec![
                player(1, Vec3::ZERO),
                EntitySnapshot {
                    health: 40.0,
                    ..EntitySnapshot::new(2, EntityKind::Dummy, Vec3::Z * 2.0, 100.0)
                },
            ],
        });

        assert_eq!(state.last_server_tick, 30);
        assert_eq!(state.entity_count(), 2);
        assert_eq!(state.ledger().health(2), Some(40.0));
        assert!(state.hands(1).unwrap().has_input_authority());
        assert!(state.hands(2).is_none());
        assert!(!state.ledger().is_authoritative());
    }

    #[test]
    fn test_spawn_before_connected_is_upgraded_to_owner() {
        let mut state = ClientGameState::new(CombatConfig::default());
        state.handle_packet(Packet::EntitySpawned {
            entity: player(5, Vec3::ZERO),
        });
        assert!(!state.hands(5).unwrap().has_input_authority());

        state.handle_packet(Packet::Connected {
            client_id: 3,
            entity_id: 5,
        });

        assert!(state.hands(5).unwrap().has_input_authority());
        assert_eq!(state.ledger().get(5).unwrap().role(), PeerRole::Owner);
    }

    #[test]
    fn test_health_follows_server() {
        let mut state = connected(1);
        state.handle_packet(Packet::EntitySpawned {
            entity: player(1, Vec3::ZERO),
        });

        state.handle_packet(Packet::HealthChanged {
            entity_id: 1,
            new_value: 60.0,
        });
        assert_eq!(state.ledger().health(1), Some(60.0));

        state.handle_packet(Packet::HealthChanged {
            entity_id: 1,
            new_value: 0.0,
        });
        assert!(!state.ledger().is_alive(1));
    }

    #[test]
    fn test_relayed_poses_move_remote_hands() {
        let mut state = connected(1);
        state.handle_packet(Packet::EntitySpawned {
            entity: player(2, Vec3::Z * 2.0),
        });
        let pose = HandPose::new(Vec3::new(0.1, 1.3, 1.7), Quat::IDENTITY).with_speed(1.5);
        state.handle_packet(Packet::HandPoseUpdate {
            hand: HandId::new(2, HandSide::Left),
            pose,
        });

        let mut out = Outgoing::new();
        for _ in 0..10 {
            state.frame(DT, None, &mut out);
        }

        assert_eq!(state.hands(2).unwrap().logical(HandSide::Left), pose);
        assert!(out.is_empty());
    }

    #[test]
    fn test_owner_sends_own_hands_only() {
        let mut state = connected(1);
        state.handle_packet(Packet::WorldSnapshot {
            tick: 0,
            entities: vec![player(1, Vec3::ZERO), player(2, Vec3::Z * 3.0)],
        });
        let mut out = Outgoing::new();

        for _ in 0..10 {
            state.frame(DT, Some(still(Vec3::new(0.0, 1.2, 0.3))), &mut out);
        }

        assert!(!out.to_server.is_empty());
        assert!(out.to_server.iter().all(|p| matches!(
            p,
            Packet::HandPoseUpdate { hand, .. } if hand.entity == 1
        )));
        assert!(out.broadcasts.is_empty());
    }

    #[test]
    fn test_fast_punch_into_body_requests_damage() {
        let mut state = connected(1);
        state.handle_packet(Packet::WorldSnapshot {
            tick: 0,
            entities: vec![
                player(1, Vec3::ZERO),
                EntitySnapshot::new(2, EntityKind::Dummy, Vec3::Z * 2.0, 100.0),
            ],
        });
        let mut out = Outgoing::new();

        // Half a second on guard, then both hands driven into the dummy at 4 m/s
        let mut resolutions = Vec::new();
        for frame in 0..100 {
            let z = if frame < 36 {
                0.0
            } else {
                f32::min((frame - 36) as f32 * 4.0 * DT, 2.0)
            };
            resolutions.extend(state.frame(DT, Some(still(Vec3::new(0.0, 1.2, z))), &mut out));
        }

        let hits: Vec<DamageRequest> = resolutions
            .iter()
            .filter_map(|r| match r {
                Resolution::Damage(request) => Some(*request),
                _ => None,
            })
            .collect();
        assert!(!hits.is_empty());
        assert!(hits.iter().all(|h| h.target == 2 && h.amount >= 5.0));
        assert!(out
            .to_server
            .iter()
            .any(|p| matches!(p, Packet::DamageRequest { target: 2, .. })));
        // Our own body is never a target
        assert!(!resolutions
            .iter()
            .any(|r| matches!(r, Resolution::Damage(DamageRequest { target: 1, .. }))));
    }

    #[test]
    fn test_slow_touch_requests_nothing() {
        let mut state = connected(1);
        state.handle_packet(Packet::WorldSnapshot {
            tick: 0,
            entities: vec![
                player(1, Vec3::ZERO),
                EntitySnapshot::new(2, EntityKind::Dummy, Vec3::Z * 0.9, 100.0),
            ],
        });
        let mut out = Outgoing::new();

        let mut resolutions = Vec::new();
        let mut z = 0.0;
        for _ in 0..400 {
            z = f32::min(z + 0.5 * DT, 0.9);
            resolutions.extend(state.frame(DT, Some(still(Vec3::new(0.0, 1.2, z))), &mut out));
        }

        assert!(resolutions
            .iter()
            .any(|r| *r == Resolution::Ignored(IgnoreReason::BelowThreshold)));
        assert!(!out
            .to_server
            .iter()
            .any(|p| matches!(p, Packet::DamageRequest { .. })));
    }

    #[test]
    fn test_dead_player_stops_detecting() {
        let mut state = connected(1);
        state.handle_packet(Packet::WorldSnapshot {
            tick: 0,
            entities: vec![
                player(1, Vec3::ZERO),
                EntitySnapshot::new(2, EntityKind::Dummy, Vec3::Z * 0.9, 100.0),
            ],
        });
        state.handle_packet(Packet::HealthChanged {
            entity_id: 1,
            new_value: 0.0,
        });
        let mut out = Outgoing::new();

        let mut z = 0.0;
        for _ in 0..40 {
            z = f32::min(z + 6.0 * DT, 0.9);
            let resolutions = state.frame(DT, Some(still(Vec3::new(0.0, 1.2, z))), &mut out);
            assert!(resolutions.is_empty());
        }
    }

    #[test]
    fn test_nearest_target_skips_self_and_dead() {
        let mut state = connected(1);
        state.handle_packet(Packet::WorldSnapshot {
            tick: 0,
            entities: vec![
                player(1, Vec3::ZERO),
                EntitySnapshot {
                    health: 0.0,
                    ..EntitySnapshot::new(2, EntityKind::Dummy, Vec3::Z, 100.0)
                },
                EntitySnapshot::new(3, EntityKind::Dummy, Vec3::Z * 3.0, 100.0),
            ],
        });

        let target = state.nearest_target().unwrap();
        assert_eq!(target, body_center(Vec3::Z * 3.0));
    }

    #[test]
    fn test_effects_and_despawn() {
        let mut state = connected(1);
        state.handle_packet(Packet::EntitySpawned {
            entity: player(2, Vec3::X),
        });

        state.handle_packet(Packet::SpawnEffect {
            kind: EffectKind::Clash,
            position: Vec3::Y,
        });
        state.handle_packet(Packet::EntityDespawned { entity_id: 2 });

        assert_eq!(state.take_effects(), vec![(EffectKind::Clash, Vec3::Y)]);
        assert!(state.take_effects().is_empty());
        assert!(state.hands(2).is_none());
        assert!(state.ledger().get(2).is_none());
    }

    #[test]
    fn test_disconnected_clears_world() {
        let mut state = connected(1);
        state.handle_packet(Packet::EntitySpawned {
            entity: player(1, Vec3::ZERO),
        });

        state.handle_packet(Packet::Disconnected {
            reason: "Server full".to_string(),
        });

        assert_eq!(state.entity_count(), 0);
        assert_eq!(state.local_entity(), None);
        assert_eq!(state.client_id, None);
    }
}
