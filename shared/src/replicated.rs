//! Replicated values with an enforced write policy
//!
//! Every piece of networked state in the combat core has exactly one kind of
//! writer. A [`Replicated`] field carries its [`WriteAccess`] tag together with
//! the local peer's [`PeerRole`] for the entity it belongs to, and refuses
//! writes that the role is not entitled to. Values arriving from the network
//! go through [`Replicated::apply_remote`], which the field's source of record
//! ignores so a replica can never clobber the authoritative copy.

use crate::error::AccessError;
use serde::{Deserialize, Serialize};

/// What this peer is with respect to one entity.
///
/// Resolved once when the entity is spawned locally and never re-derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PeerRole {
    /// The authoritative simulation. Sole writer of health.
    Server,
    /// The client controlling the entity's hands.
    Owner,
    /// Any other client, holding read-only copies.
    Remote,
}

impl PeerRole {
    /// Collapses the usual pair of flags into a role. Server wins over owner.
    pub fn resolve(is_server: bool, is_owner: bool) -> Self {
        if is_server {
            PeerRole::Server
        } else if is_owner {
            PeerRole::Owner
        } else {
            PeerRole::Remote
        }
    }
}

/// Who may mutate a field. Everyone may read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WriteAccess {
    /// Written by the owning client. The server may also store the latest
    /// owner value so it can relay it.
    Owner,
    /// Written by the server only.
    Server,
}

impl WriteAccess {
    pub fn permits(self, role: PeerRole) -> bool {
        match self {
            WriteAccess::Owner => matches!(role, PeerRole::Owner | PeerRole::Server),
            WriteAccess::Server => role == PeerRole::Server,
        }
    }

    /// The role whose local copy is the source of record.
    pub fn source(self) -> PeerRole {
        match self {
            WriteAccess::Owner => PeerRole::Owner,
            WriteAccess::Server => PeerRole::Server,
        }
    }
}

type ChangeHook<T> = Box<dyn FnMut(&T, &T) + Send>;

/// A value plus its write policy and change hooks.
pub struct Replicated<T> {
    value: T,
    access: WriteAccess,
    role: PeerRole,
    hooks: Vec<ChangeHook<T>>,
}

impl<T: Clone + PartialEq> Replicated<T> {
    pub fn new(value: T, access: WriteAccess, role: PeerRole) -> Self {
        Self {
            value,
            access,
            role,
            hooks: Vec::new(),
        }
    }

    pub fn get(&self) -> &T {
        &self.value
    }

    pub fn role(&self) -> PeerRole {
        self.role
    }

    pub fn access(&self) -> WriteAccess {
        self.access
    }

    pub fn can_write(&self) -> bool {
        self.access.permits(self.role)
    }

    /// Registers a hook called with `(old, new)` after every change,
    /// whichever path the change came through.
    pub fn subscribe<F>(&mut self, hook: F)
    where
        F: FnMut(&T, &T) + Send + 'static,
    {
        self.hooks.push(Box::new(hook));
    }

    /// Authoritative write. Returns the previous value when the value
    /// actually changed, `None` when it was already equal.
    pub fn set(&mut self, value: T) -> Result<Option<T>, AccessError> {
        if !self.can_write() {
            return Err(AccessError {
                role: self.role,
                access: self.access,
            });
        }
        Ok(self.replace(value))
    }

    /// Applies a value received from another peer.
    ///
    /// Returns the previous value if the local copy changed. The source of
    /// record keeps its own value and the update is discarded.
    pub fn apply_remote(&mut self, value: T) -> Option<T> {
        if self.role == self.access.source() {
            return None;
        }
        self.replace(value)
    }

    fn replace(&mut self, value: T) -> Option<T> {
        if self.value == value {
            return None;
        }
        let old = std::mem::replace(&mut self.value, value);
        for hook in &mut self.hooks {
            hook(&old, &self.value);
        }
        Some(old)
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for Replicated<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Replicated")
            .field("value", &self.value)
            .field("access", &self.access)
            .field("role", &self.role)
            .field("hooks", &self.hooks.len())
            .finish()
    }
}
