//! Per-hand pose replication between the owning client, the server and
//! every other peer
//!
//! Each hand exists in two forms. The *visual* hand follows the tracked
//! controller every frame on the owning peer and never touches the network.
//! The *logical* hand is what collision runs against; it only moves on the
//! network cadence so every peer agrees on it within one update interval.
//!
//! Flow per network tick:
//! - owner: sample controller, write the replicated pose, send it to the server
//! - server: store what the owner sent and relay it to all other clients
//!   (handled by the caller of [`HandStateSync::receive`]); apply the stored
//!   pose to its logical hands, or its own controllers when hosting locally
//! - remote: apply the last relayed pose to its logical hands

use crate::config::CombatConfig;
use crate::outbox::Outbox;
use crate::replicated::{PeerRole, Replicated, WriteAccess};
use crate::velocity::VelocityTracker;
use crate::{EntityId, Packet};
use glam::{Quat, Vec3};
use log::{debug, warn};
use serde::{Deserialize, Serialize};

const UNIT_ROTATION_TOLERANCE: f32 = 1e-2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HandSide {
    Left,
    Right,
}

impl HandSide {
    pub const BOTH: [HandSide; 2] = [HandSide::Left, HandSide::Right];

    pub fn index(self) -> usize {
        match self {
            HandSide::Left => 0,
            HandSide::Right => 1,
        }
    }
}

/// Network identity of a hand: the combat entity it belongs to plus a side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HandId {
    pub entity: EntityId,
    pub side: HandSide,
}

impl HandId {
    pub fn new(entity: EntityId, side: HandSide) -> Self {
        Self { entity, side }
    }
}

/// Replicated state of one hand.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HandPose {
    pub position: Vec3,
    pub rotation: Quat,
    /// Magnitude of the hand's tracked velocity.
    pub speed: f32,
}

impl HandPose {
    pub const IDENTITY: HandPose = HandPose {
        position: Vec3::ZERO,
        rotation: Quat::IDENTITY,
        speed: 0.0,
    };

    pub fn new(position: Vec3, rotation: Quat) -> Self {
        Self {
            position,
            rotation,
            speed: 0.0,
        }
    }

    pub fn with_speed(mut self, speed: f32) -> Self {
        self.speed = speed;
        self
    }

    /// Rejects poses that could only come from a broken or hostile peer.
    pub fn is_valid(&self) -> bool {
        self.position.is_finite()
            && self.rotation.is_finite()
            && (self.rotation.length() - 1.0).abs() <= UNIT_ROTATION_TOLERANCE
            && self.speed.is_finite()
            && self.speed >= 0.0
    }
}

impl Default for HandPose {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Elapsed-time accumulator checked once per simulation step.
#[derive(Debug, Clone)]
pub struct UpdateTimer {
    interval: f32,
    elapsed: f32,
}

impl UpdateTimer {
    pub fn new(interval: f32) -> Self {
        Self {
            interval,
            elapsed: 0.0,
        }
    }

    /// Adds `dt` and reports whether the interval has been reached.
    pub fn advance(&mut self, dt: f32) -> bool {
        if dt.is_finite() && dt > 0.0 {
            self.elapsed += dt;
        }
        if self.elapsed >= self.interval {
            self.elapsed = 0.0;
            true
        } else {
            false
        }
    }

    pub fn interval(&self) -> f32 {
        self.interval
    }
}

/// Both hands of one combat entity as seen from the local peer.
#[derive(Debug)]
pub struct HandStateSync {
    entity: EntityId,
    role: PeerRole,
    local_input: bool,
    timer: UpdateTimer,
    trackers: [VelocityTracker; 2],
    visual: [HandPose; 2],
    logical: [HandPose; 2],
    replicated: [Replicated<HandPose>; 2],
    age: [f32; 2],
}

impl HandStateSync {
    pub fn new(entity: EntityId, role: PeerRole, config: &CombatConfig) -> Self {
        let replica = || Replicated::new(HandPose::IDENTITY, WriteAccess::Owner, role);
        let tracker = || VelocityTracker::new(config.velocity_sample_interval);
        Self {
            entity,
            role,
            local_input: role == PeerRole::Owner,
            timer: UpdateTimer::new(config.network_update_rate),
            trackers: [tracker(), tracker()],
            visual: [HandPose::IDENTITY; 2],
            logical: [HandPose::IDENTITY; 2],
            replicated: [replica(), replica()],
            age: [0.0; 2],
        }
    }

    /// Marks a server-side entity as driven by controllers on the server
    /// itself (listen-server host).
    pub fn with_local_input(mut self) -> Self {
        if self.role == PeerRole::Server {
            self.local_input = true;
        }
        self
    }

    pub fn entity(&self) -> EntityId {
        self.entity
    }

    pub fn role(&self) -> PeerRole {
        self.role
    }

    /// Whether this peer reads the hands from live controllers and is
    /// therefore the one allowed to originate contacts for them.
    pub fn has_input_authority(&self) -> bool {
        self.local_input
    }

    pub fn visual(&self, side: HandSide) -> HandPose {
        self.visual[side.index()]
    }

    pub fn logical(&self, side: HandSide) -> HandPose {
        self.logical[side.index()]
    }

    /// Last known replicated pose. Stale values are simply the latest seen.
    pub fn replicated(&self, side: HandSide) -> HandPose {
        *self.replicated[side.index()].get()
    }

    /// Seconds since the replicated pose was last written or received.
    pub fn staleness(&self, side: HandSide) -> f32 {
        self.age[side.index()]
    }

    /// Current hand speed: live tracker value where the controller is read
    /// locally, replicated magnitude elsewhere.
    pub fn speed(&self, side: HandSide) -> f32 {
        if self.local_input {
            self.trackers[side.index()].speed()
        } else {
            self.replicated(side).speed
        }
    }

    /// Advances one simulation step.
    ///
    /// `controllers` is the live tracked pose of both hands; it is ignored on
    /// peers without input authority. Returns true when the network cadence
    /// fired during this step.
    pub fn update(
        &mut self,
        dt: f32,
        controllers: Option<[HandPose; 2]>,
        out: &mut impl Outbox,
    ) -> bool {
        let controllers = controllers.filter(|_| self.local_input);

        if let Some(poses) = controllers {
            for side in HandSide::BOTH {
                let i = side.index();
                self.visual[i] = HandPose::new(poses[i].position, poses[i].rotation);
                self.trackers[i].sample(poses[i].position, dt);
            }
        }

        for age in &mut self.age {
            *age += dt.max(0.0);
        }

        if !self.timer.advance(dt) {
            return false;
        }

        match (self.role, controllers) {
            (PeerRole::Server, Some(poses)) => {
                for side in HandSide::BOTH {
                    let pose = self.publish(side, poses[side.index()]);
                    out.broadcast(
                        Packet::HandPoseUpdate {
                            hand: HandId::new(self.entity, side),
                            pose,
                        },
                        None,
                    );
                }
            }
            (PeerRole::Owner, Some(poses)) => {
                for side in HandSide::BOTH {
                    let pose = self.publish(side, poses[side.index()]);
                    out.send_to_server(Packet::HandPoseUpdate {
                        hand: HandId::new(self.entity, side),
                        pose,
                    });
                }
            }
            // Tracking lost on the input peer: keep the last published pose
            (PeerRole::Owner, None) => {}
            (PeerRole::Server, None) | (PeerRole::Remote, _) => {
                for side in HandSide::BOTH {
                    let i = side.index();
                    self.logical[i] = *self.replicated[i].get();
                    self.visual[i] = self.logical[i];
                }
            }
        }

        true
    }

    /// Stores a pose received from the network.
    ///
    /// Returns false when the pose is malformed or this peer is the hand's
    /// input source, in which case nothing changes.
    pub fn receive(&mut self, side: HandSide, pose: HandPose) -> bool {
        if self.local_input {
            debug!(
                "Ignoring replicated pose for locally driven hand {:?} of entity {}",
                side, self.entity
            );
            return false;
        }
        if !pose.is_valid() {
            debug!("Dropping malformed pose for entity {}", self.entity);
            return false;
        }

        let pose = HandPose {
            rotation: pose.rotation.normalize(),
            ..pose
        };
        let i = side.index();
        self.replicated[i].apply_remote(pose);
        self.age[i] = 0.0;
        true
    }

    fn publish(&mut self, side: HandSide, controller: HandPose) -> HandPose {
        let i = side.index();
        let pose = HandPose {
            position: controller.position,
            rotation: controller.rotation.normalize(),
            speed: self.trackers[i].speed(),
        };

        if let Err(e) = self.replicated[i].set(pose) {
            warn!("Hand pose of entity {} not published: {}", self.entity, e);
            return self.logical[i];
        }
        self.logical[i] = pose;
        self.age[i] = 0.0;
        pose
    }
}
