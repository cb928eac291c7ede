//! Generic slot storage with free-list reuse.
//!
//! A [`SlotPool`] is a dense array of slots addressed by a `u32` index. Each
//! slot is either occupied by a value or sits on the free list waiting to be
//! recycled. Ids are plain indices, so they stay valid across growth of the
//! backing storage.
//!
//! ## Id reuse
//!
//! Destroying a slot pushes its index onto a LIFO free list; the next
//! `create` hands the same index out again. Every slot also carries a
//! generation counter that is bumped on destroy. Whether handles compare that
//! generation is decided by the pool's [`IdMode`]:
//!
//! - [`IdMode::Reuse`] ignores generations, so a handle kept across a
//!   destroy/create pair silently refers to the new occupant.
//! - [`IdMode::Generational`] rejects such handles with
//!   [`EcsError::StaleHandle`].

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use crate::error::{EcsError, EcsResult};

/// Capacity doubles on growth, but never to less than this.
const MIN_CAPACITY: usize = 8;

static NEXT_POOL_TOKEN: AtomicU64 = AtomicU64::new(1);

/// How handles into a pool are validated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdMode {
    /// An id is valid while its slot is occupied, by whatever value.
    #[default]
    Reuse,
    /// An id is valid only while the slot holds the value it was issued for.
    Generational,
}

impl std::str::FromStr for IdMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "reuse" => Ok(Self::Reuse),
            "generational" => Ok(Self::Generational),
            other => Err(format!("unknown id mode '{other}'")),
        }
    }
}

/// Identifies one pool instance. Handles carry it so they cannot be resolved
/// against a pool that did not issue them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PoolToken(u64);

impl PoolToken {
    fn next() -> Self {
        Self(NEXT_POOL_TOKEN.fetch_add(1, Ordering::Relaxed))
    }
}

#[derive(Debug, Clone)]
enum Slot<T> {
    Occupied { value: T, generation: u32 },
    Free { generation: u32 },
}

impl<T> Slot<T> {
    fn generation(&self) -> u32 {
        match self {
            Slot::Occupied { generation, .. } | Slot::Free { generation } => *generation,
        }
    }
}

/// A dense slot store with O(1) create and destroy.
#[derive(Debug)]
pub struct SlotPool<T> {
    token: PoolToken,
    mode: IdMode,
    slots: Vec<Slot<T>>,
    free: Vec<u32>,
    len: usize,
}

impl<T> SlotPool<T> {
    /// Create an empty pool in [`IdMode::Reuse`].
    #[must_use]
    pub fn new() -> Self {
        Self::with_mode(IdMode::Reuse)
    }

    /// Create an empty pool with the given id mode.
    #[must_use]
    pub fn with_mode(mode: IdMode) -> Self {
        Self::with_capacity(mode, 0)
    }

    /// Create an empty pool with room for `capacity` slots.
    #[must_use]
    pub fn with_capacity(mode: IdMode, capacity: usize) -> Self {
        Self {
            token: PoolToken::next(),
            mode,
            slots: Vec::with_capacity(capacity),
            free: Vec::new(),
            len: 0,
        }
    }

    /// Returns the token identifying this pool.
    #[must_use]
    pub fn token(&self) -> PoolToken {
        self.token
    }

    /// Returns the id validation mode.
    #[must_use]
    pub fn mode(&self) -> IdMode {
        self.mode
    }

    /// Insert a value, reusing the most recently freed slot if there is one.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::CapacityExhausted`] once every `u32` id is in use.
    pub fn create(&mut self, value: T) -> EcsResult<u32> {
        if let Some(id) = self.free.pop() {
            let slot = &mut self.slots[id as usize];
            let generation = slot.generation();
            *slot = Slot::Occupied { value, generation };
            self.len += 1;
            return Ok(id);
        }

        let id = u32::try_from(self.slots.len())
            .map_err(|_| EcsError::CapacityExhausted(self.slots.len()))?;
        if self.slots.len() == self.slots.capacity() {
            let target = (self.slots.capacity() * 2).max(MIN_CAPACITY);
            self.slots.reserve_exact(target - self.slots.len());
        }
        self.slots.push(Slot::Occupied {
            value,
            generation: 0,
        });
        self.len += 1;
        Ok(id)
    }

    /// Free a slot and return the value it held.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::DoubleDestroy`] if the slot is already free and
    /// [`EcsError::SlotNotFound`] if `id` was never issued.
    pub fn destroy(&mut self, id: u32) -> EcsResult<T> {
        let slot = self
            .slots
            .get_mut(id as usize)
            .ok_or(EcsError::SlotNotFound(id))?;
        let generation = match slot {
            Slot::Occupied { generation, .. } => generation.wrapping_add(1),
            Slot::Free { .. } => return Err(EcsError::DoubleDestroy(id)),
        };
        let old = std::mem::replace(slot, Slot::Free { generation });
        self.free.push(id);
        self.len -= 1;
        match old {
            Slot::Occupied { value, .. } => Ok(value),
            Slot::Free { .. } => unreachable!("slot checked as occupied above"),
        }
    }

    /// Returns a reference to the value in an occupied slot.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::SlotNotFound`] if the slot is out of range or free.
    pub fn get(&self, id: u32) -> EcsResult<&T> {
        match self.slots.get(id as usize) {
            Some(Slot::Occupied { value, .. }) => Ok(value),
            _ => Err(EcsError::SlotNotFound(id)),
        }
    }

    /// Returns a mutable reference to the value in an occupied slot.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::SlotNotFound`] if the slot is out of range or free.
    pub fn get_mut(&mut self, id: u32) -> EcsResult<&mut T> {
        match self.slots.get_mut(id as usize) {
            Some(Slot::Occupied { value, .. }) => Ok(value),
            _ => Err(EcsError::SlotNotFound(id)),
        }
    }

    /// Returns `true` if `id` names an occupied slot.
    #[must_use]
    pub fn is_valid(&self, id: u32) -> bool {
        matches!(self.slots.get(id as usize), Some(Slot::Occupied { .. }))
    }

    /// Returns the generation currently stored in a slot, occupied or not.
    #[must_use]
    pub fn generation(&self, id: u32) -> Option<u32> {
        self.slots.get(id as usize).map(Slot::generation)
    }

    /// Check a handle's `(token, id, generation)` triple against this pool.
    ///
    /// In [`IdMode::Reuse`] the generation is ignored.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::ForeignHandle`], [`EcsError::SlotNotFound`] or
    /// [`EcsError::StaleHandle`].
    pub fn validate(&self, token: PoolToken, id: u32, generation: u32) -> EcsResult<()> {
        if token != self.token {
            return Err(EcsError::ForeignHandle(id));
        }
        match self.slots.get(id as usize) {
            Some(Slot::Occupied { generation: current, .. }) => {
                if self.mode == IdMode::Generational && *current != generation {
                    Err(EcsError::StaleHandle {
                        id,
                        held: generation,
                        current: *current,
                    })
                } else {
                    Ok(())
                }
            }
            _ => Err(EcsError::SlotNotFound(id)),
        }
    }

    /// Exclusive upper bound of every id issued so far.
    #[must_use]
    pub fn max_id(&self) -> u32 {
        // `create` refuses to grow past `u32::MAX` slots.
        self.slots.len() as u32
    }

    /// Number of occupied slots.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if no slot is occupied.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of slots the backing storage can hold without reallocating.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.slots.capacity()
    }

    /// Iterate occupied slots in ascending id order.
    pub fn iter(&self) -> impl Iterator<Item = (u32, &T)> {
        self.slots.iter().enumerate().filter_map(|(id, slot)| match slot {
            Slot::Occupied { value, .. } => Some((id as u32, value)),
            Slot::Free { .. } => None,
        })
    }

    /// Iterate occupied slots mutably in ascending id order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (u32, &mut T)> {
        self.slots
            .iter_mut()
            .enumerate()
            .filter_map(|(id, slot)| match slot {
                Slot::Occupied { value, .. } => Some((id as u32, value)),
                Slot::Free { .. } => None,
            })
    }
}

impl<T> Default for SlotPool<T> {
    fn default() -> Self {
        Self::new()
    }
}
