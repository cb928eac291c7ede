//! Core [`Component`] trait and component identifiers.
//!
//! Every piece of data stored in a [`ComponentPool`](crate::ComponentPool)
//! implements [`Component`]. Components are plain values: cloneable so that
//! entities can be duplicated, and serialisable so that scenes can be written
//! out as `(type name, body)` pairs.
//!
//! ## Type identity
//!
//! [`ComponentTypeId`] is derived from the component's **string name** using
//! the FNV-1a 64-bit hash algorithm. The name is also the key used by scene
//! snapshots, so the id is stable across processes and builds.

use serde::{Deserialize, Serialize};

/// A unique identifier for a component type, derived from its string name
/// using the FNV-1a 64-bit hash algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
pub struct ComponentTypeId(pub u64);

impl ComponentTypeId {
    /// FNV-1a 64-bit offset basis.
    const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;

    /// FNV-1a 64-bit prime.
    const FNV_PRIME: u64 = 0x0100_0000_01b3;

    /// Compute the [`ComponentTypeId`] from a component's string name.
    ///
    /// # Algorithm (FNV-1a 64-bit)
    ///
    /// ```text
    /// hash = 0xcbf29ce484222325          (offset basis)
    /// for each byte in name.as_bytes():
    ///     hash = hash XOR byte
    ///     hash = hash * 0x00000100000001b3  (prime)
    /// return hash
    /// ```
    #[must_use]
    pub const fn from_name(name: &str) -> Self {
        let bytes = name.as_bytes();
        let mut hash = Self::FNV_OFFSET_BASIS;
        let mut i = 0;
        while i < bytes.len() {
            hash ^= bytes[i] as u64;
            hash = hash.wrapping_mul(Self::FNV_PRIME);
            i += 1;
        }
        Self(hash)
    }

    /// Compute the [`ComponentTypeId`] for a Rust component type `T`.
    #[must_use]
    pub fn of<T: Component>() -> Self {
        Self::from_name(T::type_name())
    }
}

/// Identifier of a component slot inside one [`ComponentPool`](crate::ComponentPool).
///
/// Component ids are independent of entity ids; the pool maps between them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ComponentId(pub u32);

impl ComponentId {
    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

impl std::fmt::Display for ComponentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Component({})", self.0)
    }
}

/// The core component trait.
///
/// # Examples
///
/// ```rust
/// use serde::{Serialize, Deserialize};
/// use engine_component::Component;
///
/// #[derive(Debug, Clone, Default, Serialize, Deserialize)]
/// struct Health {
///     current: f32,
///     max: f32,
/// }
///
/// impl Component for Health {
///     fn type_name() -> &'static str { "Health" }
/// }
/// ```
pub trait Component: Clone + Send + Sync + 'static + Serialize + for<'de> Deserialize<'de> {
    /// The name this type is registered and serialised under.
    fn type_name() -> &'static str;

    /// Returns the [`ComponentTypeId`] for this component.
    fn component_type_id() -> ComponentTypeId {
        ComponentTypeId::from_name(Self::type_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq)]
    struct Health {
        current: f32,
        max: f32,
    }

    impl Component for Health {
        fn type_name() -> &'static str {
            "Health"
        }
    }

    #[test]
    fn test_component_type_id_matches_from_name() {
        assert_eq!(
            Health::component_type_id(),
            ComponentTypeId::from_name("Health")
        );
        assert_eq!(ComponentTypeId::of::<Health>(), Health::component_type_id());
    }

    #[test]
    fn test_component_type_id_differs_between_names() {
        assert_ne!(
            ComponentTypeId::from_name("Health"),
            ComponentTypeId::from_name("Velocity")
        );
    }

    #[test]
    fn test_fnv1a_known_vector() {
        // FNV-1a 64-bit of empty string is the offset basis itself.
        assert_eq!(
            ComponentTypeId::from_name(""),
            ComponentTypeId(0xcbf2_9ce4_8422_2325)
        );
        // FNV-1a 64-bit of "a".
        assert_eq!(
            ComponentTypeId::from_name("a"),
            ComponentTypeId(0xaf63_dc4c_8601_ec8c)
        );
    }

    #[test]
    fn test_component_msgpack_roundtrip() {
        let health = Health {
            current: 80.0,
            max: 100.0,
        };
        let bytes = rmp_serde::to_vec_named(&health).unwrap();
        let restored: Health = rmp_serde::from_slice(&bytes).unwrap();
        assert_eq!(health, restored);
    }

    #[test]
    fn test_component_id_display() {
        assert_eq!(ComponentId(4).to_string(), "Component(4)");
    }
}
