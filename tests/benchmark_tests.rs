//! Performance benchmarks for the per-frame combat systems

use client::contacts::ContactSensor;
use glam::{Quat, Vec3};
use shared::{
    CombatConfig, CombatResolver, EntityId, HandId, HandPose, HandSide, HandStateSync,
    HealthLedger, Outgoing, Packet, PeerRole, SpeedDamageCurve, VelocityTracker,
};
use std::time::Instant;

/// Benchmarks the speed to damage mapping
#[test]
fn benchmark_damage_curve() {
    let curve = SpeedDamageCurve::default();

    let iterations = 1_000_000;
    let start = Instant::now();
    let mut total = 0.0;

    for i in 0..iterations {
        total += curve.damage((i % 800) as f32 * 0.01);
    }

    let duration = start.elapsed();
    println!(
        "Damage curve: {} iterations in {:?} ({:.2} ns/iter)",
        iterations,
        duration,
        duration.as_nanos() as f64 / iterations as f64
    );

    assert!(total > 0.0);
    assert!(duration.as_millis() < 1000);
}

/// Benchmarks velocity sampling at controller rate
#[test]
fn benchmark_velocity_sampling() {
    let mut tracker = VelocityTracker::default();
    let dt = 1.0 / 90.0;

    let iterations = 1_000_000;
    let start = Instant::now();

    for i in 0..iterations {
        let t = i as f32 * dt;
        tracker.sample(Vec3::new(t.sin(), 1.2, t.cos()), dt);
    }

    let duration = start.elapsed();
    println!(
        "Velocity sampling: {} samples in {:?} ({:.2} ns/sample)",
        iterations,
        duration,
        duration.as_nanos() as f64 / iterations as f64
    );

    assert!(tracker.speed().is_finite());
    assert!(duration.as_millis() < 1000);
}

/// Benchmarks the server ledger under a stream of hits
#[test]
fn benchmark_damage_requests() {
    let mut ledger = HealthLedger::new(PeerRole::Server, false);
    for id in 1..=100 {
        ledger.spawn(id, 1_000_000.0).unwrap();
    }
    let mut out = Outgoing::new();

    let iterations = 100_000;
    let start = Instant::now();

    for i in 0..iterations {
        let target = (i % 100) as EntityId + 1;
        ledger.request_damage(target, 1.0, &mut out);
        // Keep the outbox from growing without bound
        if i % 1000 == 0 {
            out.take_broadcasts();
        }
    }

    let duration = start.elapsed();
    println!(
        "Damage requests: {} requests in {:?} ({:.2} μs/request)",
        iterations,
        duration,
        duration.as_micros() as f64 / iterations as f64
    );

    assert_eq!(ledger.health(1), Some(1_000_000.0 - 1000.0));
    assert!(duration.as_millis() < 2000);
}

/// Benchmarks one server tick of hand replication for a full lobby
#[test]
fn benchmark_hand_sync_tick() {
    let config = CombatConfig::default();
    let mut hands: Vec<HandStateSync> = (1..=16)
        .map(|id| HandStateSync::new(id, PeerRole::Server, &config).with_local_input())
        .collect();
    let mut out = Outgoing::new();
    let dt = 1.0 / 60.0;

    let ticks = 3600;
    let start = Instant::now();

    for tick in 0..ticks {
        let t = tick as f32 * dt;
        for sync in &mut hands {
            let poses = [
                HandPose::new(Vec3::new(t.sin(), 1.2, 0.3), Quat::IDENTITY),
                HandPose::new(Vec3::new(t.cos(), 1.2, 0.3), Quat::IDENTITY),
            ];
            sync.update(dt, Some(poses), &mut out);
        }
        out.take_broadcasts();
    }

    let duration = start.elapsed();
    println!(
        "Hand sync: {} ticks of {} players in {:?} ({:.2} μs/tick)",
        ticks,
        hands.len(),
        duration,
        duration.as_micros() as f64 / ticks as f64
    );

    assert!(duration.as_millis() < 2000);
}

/// Benchmarks contact detection against a crowded arena
#[test]
fn benchmark_contact_detection() {
    let bodies: Vec<(EntityId, Vec3)> = (1..=16)
        .map(|id| (id, Vec3::new(id as f32, 1.2, 0.0)))
        .collect();
    let hands: Vec<(HandId, Vec3)> = bodies
        .iter()
        .flat_map(|(id, center)| {
            [
                (HandId::new(*id, HandSide::Left), *center + Vec3::new(-0.3, 0.0, 0.4)),
                (HandId::new(*id, HandSide::Right), *center + Vec3::new(0.3, 0.0, 0.4)),
            ]
        })
        .collect();
    let mut sensor = ContactSensor::new();

    let iterations = 10_000;
    let start = Instant::now();
    let mut events = 0;

    for i in 0..iterations {
        let x = (i % 160) as f32 * 0.1;
        let own = [Vec3::new(x, 1.2, 0.2), Vec3::new(x + 0.5, 1.2, 0.2)];
        events += sensor.detect(1, own, &bodies, &hands).len();
    }

    let duration = start.elapsed();
    println!(
        "Contact detection: {} frames in {:?} ({:.2} μs/frame), {} events",
        iterations,
        duration,
        duration.as_micros() as f64 / iterations as f64,
        events
    );

    assert!(events > 0);
    assert!(duration.as_millis() < 2000);
}

/// Benchmarks resolving contacts for a punching hand
#[test]
fn benchmark_contact_resolution() {
    let config = CombatConfig::default();
    let resolver = CombatResolver::new(config.curve);
    let mut sync = HandStateSync::new(1, PeerRole::Owner, &config).with_local_input();
    let mut out = Outgoing::new();
    let dt = 1.0 / 72.0;

    for frame in 0..72 {
        let z = frame as f32 * 3.0 * dt;
        let poses = [
            HandPose::new(Vec3::new(-0.2, 1.2, z), Quat::IDENTITY),
            HandPose::new(Vec3::new(0.2, 1.2, z), Quat::IDENTITY),
        ];
        sync.update(dt, Some(poses), &mut out);
    }
    out.take_to_server();

    let contact = shared::ContactEvent {
        hand: HandId::new(1, HandSide::Right),
        other: shared::Collider::Body(2),
        point: Vec3::new(0.2, 1.2, 3.0),
    };

    let iterations = 100_000;
    let start = Instant::now();

    for _ in 0..iterations {
        resolver.handle_contact(&contact, &sync, &mut out);
    }

    let duration = start.elapsed();
    println!(
        "Contact resolution: {} contacts in {:?} ({:.2} ns/contact)",
        iterations,
        duration,
        duration.as_nanos() as f64 / iterations as f64
    );

    let sent = out.take_to_server();
    assert_eq!(sent.len(), iterations);
    assert!(matches!(sent[0], Packet::DamageRequest { target: 2, .. }));
    assert!(duration.as_millis() < 2000);
}

/// Benchmarks encoding the packets that dominate traffic
#[test]
fn benchmark_packet_serialization() {
    use bincode::{deserialize, serialize};

    let pose = Packet::HandPoseUpdate {
        hand: HandId::new(7, HandSide::Left),
        pose: HandPose::new(Vec3::new(0.3, 1.4, -0.2), Quat::from_rotation_y(0.5)).with_speed(2.5),
    };
    let snapshot = Packet::WorldSnapshot {
        tick: 1234,
        entities: (1..=32)
            .map(|id| {
                shared::EntitySnapshot::new(id, shared::EntityKind::Player, Vec3::ZERO, 100.0)
            })
            .collect(),
    };

    let iterations = 10_000;
    let start = Instant::now();

    for _ in 0..iterations {
        let serialized = serialize(&pose).unwrap();
        let _deserialized: Packet = deserialize(&serialized).unwrap();
        let serialized = serialize(&snapshot).unwrap();
        let _deserialized: Packet = deserialize(&serialized).unwrap();
    }

    let duration = start.elapsed();
    println!(
        "Packet serialization: {} iterations in {:?} ({:.2} μs/iter)",
        iterations,
        duration,
        duration.as_micros() as f64 / iterations as f64
    );

    // A hand update must stay well under a typical MTU
    assert!(serialize(&pose).unwrap().len() < 100);
    assert!(duration.as_millis() < 5000);
}
