//! System and world configuration.

use engine_component::{IdMode, QueryDescriptor};
use serde::{Deserialize, Serialize};

/// Configuration for a system registered with a [`Scene`](crate::Scene).
#[derive(Debug, Clone)]
pub struct SystemConfig {
    /// Human-readable system name (e.g. `"transform"`). Unique per scene.
    pub name: String,
    /// The components an entity must carry to become a member.
    pub query: QueryDescriptor,
}

impl SystemConfig {
    /// Create a new system config with the given name and query.
    #[must_use]
    pub fn new(name: impl Into<String>, query: QueryDescriptor) -> Self {
        Self {
            name: name.into(),
            query,
        }
    }

    /// Replace the membership query.
    #[must_use]
    pub fn with_query(mut self, query: QueryDescriptor) -> Self {
        self.query = query;
        self
    }
}

/// Storage settings for a [`World`](crate::World).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorldConfig {
    /// Handle validation mode for the entity pool and every component pool.
    pub id_mode: IdMode,
    /// Entity slots preallocated up front.
    pub initial_capacity: usize,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            id_mode: IdMode::Reuse,
            initial_capacity: 0,
        }
    }
}

impl WorldConfig {
    #[must_use]
    pub fn with_id_mode(mut self, id_mode: IdMode) -> Self {
        self.id_mode = id_mode;
        self
    }

    #[must_use]
    pub fn with_initial_capacity(mut self, initial_capacity: usize) -> Self {
        self.initial_capacity = initial_capacity;
        self
    }
}
