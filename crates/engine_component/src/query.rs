//! Query descriptors for system membership.
//!
//! A [`QueryDescriptor`] declares which component types a system reads and
//! writes, plus extra [`QueryFilter`]s. An entity belongs to a system when it
//! carries every read and written type and passes every filter. Membership is
//! decided when the entity's activation is committed, or when the system is
//! added to a scene that already holds activated entities.

use serde::{Deserialize, Serialize};

use crate::component::ComponentTypeId;
use crate::entity::Entity;

/// Describes the data a system needs from its member entities.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryDescriptor {
    /// Component types the system reads.
    pub reads: Vec<ComponentTypeId>,
    /// Component types the system writes.
    pub writes: Vec<ComponentTypeId>,
    /// Filters applied on top of the required types.
    pub filters: Vec<QueryFilter>,
}

impl QueryDescriptor {
    /// Create a new empty query descriptor. It matches every entity.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a read-only component requirement.
    #[must_use]
    pub fn read(mut self, type_id: ComponentTypeId) -> Self {
        self.reads.push(type_id);
        self
    }

    /// Add a mutable component requirement.
    #[must_use]
    pub fn write(mut self, type_id: ComponentTypeId) -> Self {
        self.writes.push(type_id);
        self
    }

    /// Add a query filter.
    #[must_use]
    pub fn filter(mut self, f: QueryFilter) -> Self {
        self.filters.push(f);
        self
    }

    /// Returns the set of required component types (reads + writes).
    #[must_use]
    pub fn required_types(&self) -> Vec<ComponentTypeId> {
        let mut types = Vec::new();
        types.extend_from_slice(&self.reads);
        types.extend_from_slice(&self.writes);
        types
    }

    /// Returns `true` if `entity` satisfies every requirement and filter.
    #[must_use]
    pub fn matches(&self, entity: &Entity) -> bool {
        self.reads
            .iter()
            .chain(&self.writes)
            .all(|ty| entity.has_component_type(*ty))
            && self.filters.iter().all(|f| f.accepts(entity))
    }
}

/// A filter that narrows the set of entities matched by a query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum QueryFilter {
    /// Only match entities that have this component.
    With(ComponentTypeId),
    /// Only match entities that do NOT have this component.
    Without(ComponentTypeId),
}

impl QueryFilter {
    #[must_use]
    pub fn accepts(&self, entity: &Entity) -> bool {
        match self {
            Self::With(ty) => entity.has_component_type(*ty),
            Self::Without(ty) => !entity.has_component_type(*ty),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::EntityId;

    fn entity_with(types: &[ComponentTypeId]) -> Entity {
        let mut entity = Entity::new(EntityId(0));
        for ty in types {
            entity.attach(*ty);
        }
        entity
    }

    #[test]
    fn test_required_types() {
        let a = ComponentTypeId(1);
        let b = ComponentTypeId(2);
        let q = QueryDescriptor::new().read(a).write(b);
        assert_eq!(q.required_types(), vec![a, b]);
    }

    #[test]
    fn test_empty_query_matches_everything() {
        assert!(QueryDescriptor::new().matches(&entity_with(&[])));
    }

    #[test]
    fn test_matches_requires_all_types() {
        let transform = ComponentTypeId(1);
        let velocity = ComponentTypeId(2);
        let q = QueryDescriptor::new().read(velocity).write(transform);

        assert!(q.matches(&entity_with(&[transform, velocity])));
        assert!(!q.matches(&entity_with(&[transform])));
    }

    #[test]
    fn test_filters() {
        let transform = ComponentTypeId(1);
        let frozen = ComponentTypeId(3);
        let q = QueryDescriptor::new()
            .write(transform)
            .filter(QueryFilter::Without(frozen));

        assert!(q.matches(&entity_with(&[transform])));
        assert!(!q.matches(&entity_with(&[transform, frozen])));

        let tagged = QueryDescriptor::new().filter(QueryFilter::With(frozen));
        assert!(tagged.matches(&entity_with(&[frozen])));
        assert!(!tagged.matches(&entity_with(&[transform])));
    }
}
