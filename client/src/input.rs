//! Scripted stand-in for tracked VR controllers
//!
//! Produces a pair of hand poses every frame: a gentle idle sway around
//! the shoulders, interrupted by a straight punch toward the current target
//! at a fixed rhythm. Everything is a function of elapsed time, so a given
//! frame sequence always yields the same poses.

use glam::{Quat, Vec3};
use shared::{HandPose, HandSide, BODY_CENTER_HEIGHT};
use std::f32::consts::PI;

/// Sideways distance of each hand from the body centre at rest
const SHOULDER_OFFSET: f32 = 0.25;
/// How far in front of the body the hands rest
const GUARD_REACH: f32 = 0.3;
const SWAY_AMPLITUDE: f32 = 0.04;
const SWAY_FREQUENCY: f32 = 1.5;

#[derive(Debug, Clone, Copy)]
struct Punch {
    side: HandSide,
    started: f32,
}

/// Generates controller poses for a headless client
#[derive(Debug, Clone)]
pub struct ControllerRig {
    origin: Vec3,
    target: Option<Vec3>,
    elapsed: f32,
    punch_every: f32,
    punch_duration: f32,
    next_punch_at: f32,
    next_side: HandSide,
    punch: Option<Punch>,
}

impl ControllerRig {
    /// `punch_every` seconds between punches, each lasting `punch_duration`.
    pub fn new(punch_every: f32, punch_duration: f32) -> Self {
        Self {
            origin: Vec3::ZERO,
            target: None,
            elapsed: 0.0,
            punch_every,
            punch_duration,
            next_punch_at: punch_every,
            next_side: HandSide::Right,
            punch: None,
        }
    }

    /// Floor position of the body the hands belong to
    pub fn set_origin(&mut self, origin: Vec3) {
        self.origin = origin;
    }

    /// Point punches are thrown at, or None to stay on guard
    pub fn aim_at(&mut self, target: Option<Vec3>) {
        self.target = target;
    }

    pub fn is_punching(&self) -> bool {
        self.punch.is_some()
    }

    /// Advances the script by `dt` and returns both controller poses.
    pub fn sample(&mut self, dt: f32) -> [HandPose; 2] {
        self.elapsed += dt.max(0.0);

        if let Some(punch) = self.punch {
            if self.elapsed - punch.started >= self.punch_duration {
                self.punch = None;
                self.next_punch_at = self.elapsed + self.punch_every;
            }
        }
        if self.punch.is_none() && self.target.is_some() && self.elapsed >= self.next_punch_at {
            self.punch = Some(Punch {
                side: self.next_side,
                started: self.elapsed,
            });
            self.next_side = match self.next_side {
                HandSide::Left => HandSide::Right,
                HandSide::Right => HandSide::Left,
            };
        }

        let facing = self.facing();
        let rotation = Quat::from_rotation_y(facing.x.atan2(facing.z));
        let mut poses = [HandPose::IDENTITY; 2];

        for side in HandSide::BOTH {
            let mut position = self.rest_position(side, facing);
            if let (Some(punch), Some(target)) = (self.punch, self.target) {
                if punch.side == side {
                    let t = ((self.elapsed - punch.started) / self.punch_duration).clamp(0.0, 1.0);
                    // Out and back in one stroke
                    position = position.lerp(target, (t * PI).sin());
                }
            }
            poses[side.index()] = HandPose::new(position, rotation);
        }

        poses
    }

    fn facing(&self) -> Vec3 {
        self.target
            .map(|t| Vec3::new(t.x - self.origin.x, 0.0, t.z - self.origin.z))
            .and_then(|v| v.try_normalize())
            .unwrap_or(Vec3::Z)
    }

    fn rest_position(&self, side: HandSide, facing: Vec3) -> Vec3 {
        let right = Vec3::Y.cross(facing).normalize_or_zero();
        let lateral = match side {
            HandSide::Left => SHOULDER_OFFSET,
            HandSide::Right => -SHOULDER_OFFSET,
        };
        let phase = match side {
            HandSide::Left => 0.0,
            HandSide::Right => PI,
        };
        let sway = (self.elapsed * SWAY_FREQUENCY * 2.0 * PI + phase).sin() * SWAY_AMPLITUDE;

        self.origin
            + Vec3::Y * (BODY_CENTER_HEIGHT + sway)
            + right * lateral
            + facing * GUARD_REACH
    }
}

impl Default for ControllerRig {
    fn default() -> Self {
        Self::new(1.5, 0.3)
    }
}
