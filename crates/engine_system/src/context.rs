//! Per-tick execution context provided to systems.

use std::collections::BTreeSet;

use engine_component::EntityId;

/// Context handed to [`System::tick`](crate::System::tick).
#[derive(Debug, Clone, Copy)]
pub struct TickContext<'a> {
    /// The current tick ID.
    pub tick_id: u64,
    /// Delta time since the last tick, in seconds.
    pub dt: f64,
    /// Entities currently held by the ticking system, in id order.
    pub members: &'a BTreeSet<EntityId>,
}

impl<'a> TickContext<'a> {
    #[must_use]
    pub fn new(tick_id: u64, dt: f64, members: &'a BTreeSet<EntityId>) -> Self {
        Self {
            tick_id,
            dt,
            members,
        }
    }

    /// Member entities in ascending id order.
    pub fn entities(&self) -> impl Iterator<Item = EntityId> + 'a {
        self.members.iter().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_creation() {
        let members = BTreeSet::from([EntityId(3), EntityId(1)]);
        let ctx = TickContext::new(1, 0.016, &members);
        assert_eq!(ctx.tick_id, 1);
        assert!((ctx.dt - 0.016).abs() < f64::EPSILON);
        assert_eq!(
            ctx.entities().collect::<Vec<_>>(),
            vec![EntityId(1), EntityId(3)]
        );
    }
}
