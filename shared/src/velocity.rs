//! Interval-sampled velocity of a tracked point

use glam::Vec3;

pub const DEFAULT_SAMPLE_INTERVAL: f32 = 0.1;

/// Estimates the velocity of a tracked point from position samples.
///
/// Frame deltas are accumulated and a new estimate is only produced once the
/// accumulated time reaches the sample interval. Between samples the cached
/// velocity is returned, which hides frame-to-frame tracking jitter.
#[derive(Debug, Clone)]
pub struct VelocityTracker {
    interval: f32,
    previous_position: Option<Vec3>,
    velocity: Vec3,
    elapsed: f32,
}

impl VelocityTracker {
    pub fn new(interval: f32) -> Self {
        Self {
            interval,
            previous_position: None,
            velocity: Vec3::ZERO,
            elapsed: 0.0,
        }
    }

    /// Starts tracking from a known position instead of the first sample.
    pub fn with_origin(interval: f32, origin: Vec3) -> Self {
        Self {
            previous_position: Some(origin),
            ..Self::new(interval)
        }
    }

    /// Feeds one frame worth of motion and returns the current estimate.
    pub fn sample(&mut self, position: Vec3, dt: f32) -> Vec3 {
        let Some(previous) = self.previous_position else {
            self.previous_position = Some(position);
            self.elapsed = 0.0;
            return self.velocity;
        };

        if dt.is_finite() && dt > 0.0 {
            self.elapsed += dt;
        }

        if self.elapsed < self.interval || self.elapsed <= 0.0 {
            return self.velocity;
        }

        self.velocity = (position - previous) / self.elapsed;
        self.previous_position = Some(position);
        self.elapsed = 0.0;
        self.velocity
    }

    pub fn velocity(&self) -> Vec3 {
        self.velocity
    }

    pub fn speed(&self) -> f32 {
        self.velocity.length()
    }

    pub fn reset(&mut self) {
        self.previous_position = None;
        self.velocity = Vec3::ZERO;
        self.elapsed = 0.0;
    }
}

impl Default for VelocityTracker {
    fn default() -> Self {
        Self::new(DEFAULT_SAMPLE_INTERVAL)
    }
}
