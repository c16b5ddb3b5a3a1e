//! Error types for configuration and replicated-field access

use crate::replicated::{PeerRole, WriteAccess};
use thiserror::Error;

/// Problems detected while validating a [`crate::config::CombatConfig`].
///
/// These are only produced at start-up; a running simulation never sees them.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    #[error("{name} must be a finite number greater than zero (got {value})")]
    NotPositive { name: &'static str, value: f32 },

    #[error("{name} must be a finite, non-negative number (got {value})")]
    Negative { name: &'static str, value: f32 },

    #[error("speed thresholds out of order: min {min} must be below max {max}")]
    SpeedRange { min: f32, max: f32 },

    #[error("damage range inverted: min {min} is above max {max}")]
    DamageRange { min: f32, max: f32 },
}

/// Raised when a peer attempts to write a replicated field it has no
/// authority over.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("{role:?} peer may not write a {access:?}-writable field")]
pub struct AccessError {
    pub role: PeerRole,
    pub access: WriteAccess,
}
