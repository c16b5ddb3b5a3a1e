//! Speed-gated melee damage
//!
//! Contacts are evaluated on the peer that reads the hand's controllers and
//! nowhere else, so one physical hit yields at most one request even though
//! every peer may observe the overlap. The result is only a *request*: the
//! server decides whether it lands.

use crate::error::ConfigError;
use crate::hand_sync::{HandId, HandStateSync};
use crate::outbox::Outbox;
use crate::{EntityId, Packet};
use glam::Vec3;
use log::debug;
use serde::{Deserialize, Serialize};

/// Maps hand speed to damage.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpeedDamageCurve {
    pub min_speed_threshold: f32,
    pub max_speed_threshold: f32,
    pub min_damage: f32,
    pub max_damage: f32,
}

impl Default for SpeedDamageCurve {
    fn default() -> Self {
        Self {
            min_speed_threshold: 1.0,
            max_speed_threshold: 5.0,
            min_damage: 5.0,
            max_damage: 25.0,
        }
    }
}

impl SpeedDamageCurve {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let fields = [
            ("min_speed_threshold", self.min_speed_threshold),
            ("max_speed_threshold", self.max_speed_threshold),
            ("min_damage", self.min_damage),
            ("max_damage", self.max_damage),
        ];
        for (name, value) in fields {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::Negative { name, value });
            }
        }
        if self.min_speed_threshold >= self.max_speed_threshold {
            return Err(ConfigError::SpeedRange {
                min: self.min_speed_threshold,
                max: self.max_speed_threshold,
            });
        }
        if self.min_damage > self.max_damage {
            return Err(ConfigError::DamageRange {
                min: self.min_damage,
                max: self.max_damage,
            });
        }
        Ok(())
    }

    /// Position of `speed` between the two thresholds, clamped to [0, 1].
    pub fn normalized(&self, speed: f32) -> f32 {
        let span = self.max_speed_threshold - self.min_speed_threshold;
        if span <= 0.0 {
            return 0.0;
        }
        ((speed - self.min_speed_threshold) / span).clamp(0.0, 1.0)
    }

    /// Zero below the minimum threshold, otherwise linear from `min_damage`
    /// to `max_damage`, saturating above the maximum threshold.
    pub fn damage(&self, speed: f32) -> f32 {
        if speed.is_nan() || speed < self.min_speed_threshold {
            return 0.0;
        }
        let t = self.normalized(speed);
        self.min_damage + (self.max_damage - self.min_damage) * t
    }

    /// Damage for a collision between two moving bodies, taken from the
    /// faster of the two.
    pub fn damage_for_pair(&self, speed_a: f32, speed_b: f32) -> f32 {
        self.damage(speed_a.max(speed_b))
    }
}

/// What a hand touched, as identified by the collision layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Collider {
    /// Another combat hand.
    Hand(HandId),
    /// The body of an entity that carries health.
    Body(EntityId),
    /// Anything else: walls, props, the floor.
    Static,
}

/// Begin-overlap notification from the collision layer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContactEvent {
    pub hand: HandId,
    pub other: Collider,
    pub point: Vec3,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EffectKind {
    /// Two hands meeting. Purely cosmetic.
    Clash,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DamageRequest {
    pub target: EntityId,
    pub amount: f32,
    pub source_speed: f32,
}

impl DamageRequest {
    pub fn into_packet(self) -> Packet {
        Packet::DamageRequest {
            target: self.target,
            amount: self.amount,
            source_speed: self.source_speed,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    /// This peer does not read the hand's controller.
    NotInputAuthority,
    BelowThreshold,
    SelfContact,
    NoTarget,
}

/// Outcome of evaluating one contact.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Resolution {
    Damage(DamageRequest),
    Effect { kind: EffectKind, position: Vec3 },
    Ignored(IgnoreReason),
}

#[derive(Debug, Clone)]
pub struct CombatResolver {
    curve: SpeedDamageCurve,
}

impl CombatResolver {
    pub fn new(curve: SpeedDamageCurve) -> Self {
        Self { curve }
    }

    pub fn curve(&self) -> &SpeedDamageCurve {
        &self.curve
    }

    /// Decides what a contact means, using the hand speed held by `hands`.
    pub fn resolve(&self, contact: &ContactEvent, hands: &HandStateSync) -> Resolution {
        if contact.hand.entity != hands.entity() || !hands.has_input_authority() {
            return Resolution::Ignored(IgnoreReason::NotInputAuthority);
        }

        let speed = hands.speed(contact.hand.side);
        let damage = self.curve.damage(speed);
        if damage <= 0.0 {
            return Resolution::Ignored(IgnoreReason::BelowThreshold);
        }

        let own = contact.hand.entity;
        match contact.other {
            Collider::Hand(other) if other.entity == own => {
                Resolution::Ignored(IgnoreReason::SelfContact)
            }
            Collider::Hand(_) => Resolution::Effect {
                kind: EffectKind::Clash,
                position: contact.point,
            },
            Collider::Body(target) if target == own => {
                Resolution::Ignored(IgnoreReason::SelfContact)
            }
            Collider::Body(target) => Resolution::Damage(DamageRequest {
                target,
                amount: damage,
                source_speed: speed,
            }),
            Collider::Static => Resolution::Ignored(IgnoreReason::NoTarget),
        }
    }

    /// Resolves a contact and sends whatever request it produces. Nothing
    /// is retried; a lost request never lands.
    pub fn handle_contact(
        &self,
        contact: &ContactEvent,
        hands: &HandStateSync,
        out: &mut impl Outbox,
    ) -> Resolution {
        let resolution = self.resolve(contact, hands);
        match resolution {
            Resolution::Damage(request) => {
                debug!(
                    "Hand {:?} hit entity {} at {:.2} m/s for {:.1}",
                    contact.hand, request.target, request.source_speed, request.amount
                );
                out.send_to_server(request.into_packet());
            }
            Resolution::Effect { kind, position } => {
                out.send_to_server(Packet::EffectRequest { kind, position });
            }
            Resolution::Ignored(_) => {}
        }
        resolution
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CombatConfig;
    use crate::hand_sync::{HandPose, HandSide};
    use crate::outbox::Outgoing;
    use crate::replicated::PeerRole;
    use assert_approx_eq::assert_approx_eq;
    use glam::Quat;

    fn curve() -> SpeedDamageCurve {
        SpeedDamageCurve::default()
    }

    /// Owner hands of `entity` swung until the tracker reports `speed`.
    fn swinging_hands(entity: EntityId, speed: f32) -> HandStateSync {
        let mut hands = HandStateSync::new(entity, PeerRole::Owner, &CombatConfig::default());
        let mut out = Outgoing::new();
        let dt = 0.05;
        for frame in 0..8 {
            let x = frame as f32 * speed * dt;
            let pose = HandPose::new(Vec3::new(x, 1.0, 0.0), Quat::IDENTITY);
            hands.update(dt, Some([pose, pose]), &mut out);
        }
        hands
    }

    fn contact(entity: EntityId, other: Collider) -> ContactEvent {
        ContactEvent {
            hand: HandId::new(entity, HandSide::Right),
            other,
            point: Vec3::new(0.5, 1.0, 0.0),
        }
    }

    #[test]
    fn test_below_threshold_is_zero() {
        let c = curve();
        for speed in [0.0, 0.25, 0.5, 0.99] {
            assert_eq!(c.damage(speed), 0.0);
        }
        assert_eq!(c.damage(f32::NAN), 0.0);
    }

    #[test]
    fn test_at_or_above_max_threshold_is_max_damage() {
        let c = curve();
        for speed in [5.0, 5.01, 12.0, 1000.0] {
            assert_eq!(c.damage(speed), 25.0);
        }
    }

    #[test]
    fn test_curve_midpoint() {
        let c = curve();
        assert_approx_eq!(c.normalized(3.0), 0.5, 1e-6);
        assert_approx_eq!(c.damage(3.0), 15.0, 1e-5);
        assert_approx_eq!(c.damage(1.0), 5.0, 1e-6);
    }

    #[test]
    fn test_curve_is_monotonic() {
        let c = curve();
        let mut previous = c.damage(c.min_speed_threshold);
        let steps = 400;
        for i in 1..=steps {
            let speed = c.min_speed_threshold
                + (c.max_speed_threshold - c.min_speed_threshold) * i as f32 / steps as f32;
            let damage = c.damage(speed);
            assert!(damage >= previous, "damage fell at speed {}", speed);
            previous = damage;
        }
    }

    #[test]
    fn test_pair_damage_uses_faster_speed() {
        let c = curve();
        assert_approx_eq!(c.damage_for_pair(0.5, 3.0), 15.0, 1e-5);
        assert_approx_eq!(c.damage_for_pair(3.0, 0.5), 15.0, 1e-5);
        assert_eq!(c.damage_for_pair(0.2, 0.9), 0.0);
    }

    #[test]
    fn test_curve_validation() {
        assert!(curve().validate().is_ok());

        let inverted = SpeedDamageCurve {
            min_speed_threshold: 5.0,
            max_speed_threshold: 1.0,
            ..curve()
        };
        assert!(matches!(inverted.validate(), Err(ConfigError::SpeedRange { .. })));

        let damage = SpeedDamageCurve {
            min_damage: 30.0,
            ..curve()
        };
        assert!(matches!(damage.validate(), Err(ConfigError::DamageRange { .. })));

        let nan = SpeedDamageCurve {
            max_damage: f32::NAN,
            ..curve()
        };
        assert!(matches!(nan.validate(), Err(ConfigError::Negative { .. })));
    }

    #[test]
    fn test_fast_hit_on_body_requests_damage() {
        let hands = swinging_hands(1, 3.0);
        let resolver = CombatResolver::new(curve());
        let mut out = Outgoing::new();

        let resolution = resolver.handle_contact(&contact(1, Collider::Body(2)), &hands, &mut out);

        match resolution {
            Resolution::Damage(request) => {
                assert_eq!(request.target, 2);
                assert_approx_eq!(request.source_speed, 3.0, 0.05);
                assert_approx_eq!(request.amount, 15.0, 0.3);
            }
            other => panic!("Expected damage, got {:?}", other),
        }
        assert_eq!(out.to_server.len(), 1);
        assert!(matches!(out.to_server[0], Packet::DamageRequest { target: 2, .. }));
    }

    #[test]
    fn test_slow_hit_sends_nothing() {
        let hands = swinging_hands(1, 0.5);
        let resolver = CombatResolver::new(curve());
        let mut out = Outgoing::new();

        let resolution = resolver.handle_contact(&contact(1, Collider::Body(2)), &hands, &mut out);

        assert_eq!(resolution, Resolution::Ignored(IgnoreReason::BelowThreshold));
        assert!(out.is_empty());
    }

    #[test]
    fn test_hand_clash_spawns_effect_not_damage() {
        let hands = swinging_hands(1, 4.0);
        let resolver = CombatResolver::new(curve());
        let mut out = Outgoing::new();
        let other_hand = HandId::new(2, HandSide::Left);

        let resolution =
            resolver.handle_contact(&contact(1, Collider::Hand(other_hand)), &hands, &mut out);

        assert_eq!(
            resolution,
            Resolution::Effect {
                kind: EffectKind::Clash,
                position: Vec3::new(0.5, 1.0, 0.0),
            }
        );
        assert_eq!(out.to_server.len(), 1);
        assert!(matches!(
            out.to_server[0],
            Packet::EffectRequest {
                kind: EffectKind::Clash,
                ..
            }
        ));
    }

    #[test]
    fn test_self_contacts_are_ignored() {
        let hands = swinging_hands(1, 4.0);
        let resolver = CombatResolver::new(curve());
        let mut out = Outgoing::new();

        let own_body = resolver.handle_contact(&contact(1, Collider::Body(1)), &hands, &mut out);
        let own_hand = resolver.handle_contact(
            &contact(1, Collider::Hand(HandId::new(1, HandSide::Left))),
            &hands,
            &mut out,
        );

        assert_eq!(own_body, Resolution::Ignored(IgnoreReason::SelfContact));
        assert_eq!(own_hand, Resolution::Ignored(IgnoreReason::SelfContact));
        assert!(out.is_empty());
    }

    #[test]
    fn test_static_contact_is_ignored() {
        let hands = swinging_hands(1, 4.0);
        let resolver = CombatResolver::new(curve());
        assert_eq!(
            resolver.resolve(&contact(1, Collider::Static), &hands),
            Resolution::Ignored(IgnoreReason::NoTarget)
        );
    }

    #[test]
    fn test_observers_never_originate_requests() {
        let mut remote = HandStateSync::new(1, PeerRole::Remote, &CombatConfig::default());
        remote.receive(
            HandSide::Right,
            HandPose::new(Vec3::ZERO, Quat::IDENTITY).with_speed(5.0),
        );
        let resolver = CombatResolver::new(curve());
        let mut out = Outgoing::new();

        let resolution = resolver.handle_contact(&contact(1, Collider::Body(2)), &remote, &mut out);

        assert_eq!(resolution, Resolution::Ignored(IgnoreReason::NotInputAuthority));
        assert!(out.is_empty());
    }

    #[test]
    fn test_contact_for_foreign_hand_is_ignored() {
        let hands = swinging_hands(1, 4.0);
        let resolver = CombatResolver::new(curve());
        assert_eq!(
            resolver.resolve(&contact(9, Collider::Body(2)), &hands),
            Resolution::Ignored(IgnoreReason::NotInputAuthority)
        );
    }
}
