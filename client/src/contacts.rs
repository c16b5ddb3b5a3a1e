//! Begin-overlap detection for the local player's logical hands
//!
//! Stands in for an engine's trigger callbacks: every call compares the
//! current overlaps with the previous call and reports only the new ones.

use glam::Vec3;
use shared::{
    spheres_overlap, Collider, ContactEvent, EntityId, HandId, HandSide, BODY_RADIUS,
    HAND_RADIUS,
};
use std::collections::HashSet;

/// Tracks which colliders each local hand is currently touching
#[derive(Debug, Default)]
pub struct ContactSensor {
    touching: HashSet<(HandSide, Collider)>,
}

impl ContactSensor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns one event per overlap that started since the previous call.
    ///
    /// `bodies` are body centres, `hands` are logical hand positions of every
    /// entity. The caller may include the local entity in both; the resolver
    /// decides what a self-contact means.
    pub fn detect(
        &mut self,
        entity: EntityId,
        own_hands: [Vec3; 2],
        bodies: &[(EntityId, Vec3)],
        hands: &[(HandId, Vec3)],
    ) -> Vec<ContactEvent> {
        let mut now = HashSet::new();
        let mut events = Vec::new();

        for side in HandSide::BOTH {
            let hand = HandId::new(entity, side);
            let position = own_hands[side.index()];

            let mut touch = |other: Collider, point: Vec3| {
                now.insert((side, other));
                if !self.touching.contains(&(side, other)) {
                    events.push(ContactEvent { hand, other, point });
                }
            };

            for (body, center) in bodies {
                if spheres_overlap(position, HAND_RADIUS, *center, BODY_RADIUS) {
                    touch(Collider::Body(*body), contact_point(position, *center));
                }
            }

            for (other, other_position) in hands {
                if *other == hand {
                    continue;
                }
                if spheres_overlap(position, HAND_RADIUS, *other_position, HAND_RADIUS) {
                    touch(Collider::Hand(*other), contact_point(position, *other_position));
                }
            }

            if position.y < HAND_RADIUS {
                touch(Collider::Static, Vec3::new(position.x, 0.0, position.z));
            }
        }

        self.touching = now;
        events
    }

    pub fn reset(&mut self) {
        self.touching.clear();
    }

    pub fn touching_count(&self) -> usize {
        self.touching.len()
    }
}

/// Point on the hand sphere's surface facing the other collider
fn contact_point(hand: Vec3, other: Vec3) -> Vec3 {
    hand + (other - hand).normalize_or_zero() * HAND_RADIUS
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    const ME: EntityId = 1;
    const THEM: EntityId = 2;

    fn apart() -> [Vec3; 2] {
        [Vec3::new(-0.3, 1.2, 0.0), Vec3::new(0.3, 1.2, 0.0)]
    }

    #[test]
    fn test_no_contacts_in_open_space() {
        let mut sensor = ContactSensor::new();
        let bodies = [(THEM, Vec3::new(0.0, 1.2, 3.0))];

        assert!(sensor.detect(ME, apart(), &bodies, &[]).is_empty());
        assert_eq!(sensor.touching_count(), 0);
    }

    #[test]
    fn test_body_contact_reported_once() {
        let mut sensor = ContactSensor::new();
        let bodies = [(THEM, Vec3::new(0.3, 1.2, 0.3))];

        let first = sensor.detect(ME, apart(), &bodies, &[]);
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].hand, HandId::new(ME, HandSide::Right));
        assert_eq!(first[0].other, Collider::Body(THEM));
        assert_approx_eq!(first[0].point.z, HAND_RADIUS, 1e-5);

        // Still overlapping: nothing new
        assert!(sensor.detect(ME, apart(), &bodies, &[]).is_empty());
        assert_eq!(sensor.touching_count(), 1);
    }

    #[test]
    fn test_contact_fires_again_after_separation() {
        let mut sensor = ContactSensor::new();
        let touching = [(THEM, Vec3::new(0.3, 1.2, 0.3))];
        let far = [(THEM, Vec3::new(0.3, 1.2, 5.0))];

        assert_eq!(sensor.detect(ME, apart(), &touching, &[]).len(), 1);
        assert!(sensor.detect(ME, apart(), &far, &[]).is_empty());
        assert_eq!(sensor.detect(ME, apart(), &touching, &[]).len(), 1);
    }

    #[test]
    fn test_hand_contacts_skip_the_hand_itself() {
        let mut sensor = ContactSensor::new();
        let own = [Vec3::new(0.0, 1.2, 0.0), Vec3::new(0.05, 1.2, 0.0)];
        let hands = [
            (HandId::new(ME, HandSide::Left), own[0]),
            (HandId::new(ME, HandSide::Right), own[1]),
            (HandId::new(THEM, HandSide::Left), Vec3::new(0.0, 1.2, 0.1)),
        ];

        let events = sensor.detect(ME, own, &[], &hands);
        let others: Vec<(HandSide, Collider)> =
            events.iter().map(|e| (e.hand.side, e.other)).collect();

        assert!(others.contains(&(
            HandSide::Left,
            Collider::Hand(HandId::new(ME, HandSide::Right))
        )));
        assert!(others.contains(&(
            HandSide::Left,
            Collider::Hand(HandId::new(THEM, HandSide::Left))
        )));
        assert!(!others.contains(&(
            HandSide::Left,
            Collider::Hand(HandId::new(ME, HandSide::Left))
        )));
    }

    #[test]
    fn test_floor_is_static() {
        let mut sensor = ContactSensor::new();
        let low = [Vec3::new(0.0, 0.02, 0.0), Vec3::new(0.5, 1.0, 0.0)];

        let events = sensor.detect(ME, low, &[], &[]);

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].other, Collider::Static);
        assert_eq!(events[0].point.y, 0.0);
    }

    #[test]
    fn test_reset_forgets_overlaps() {
        let mut sensor = ContactSensor::new();
        let bodies = [(THEM, Vec3::new(0.3, 1.2, 0.3))];
        sensor.detect(ME, apart(), &bodies, &[]);

        sensor.reset();

        assert_eq!(sensor.detect(ME, apart(), &bodies, &[]).len(), 1);
    }
}
