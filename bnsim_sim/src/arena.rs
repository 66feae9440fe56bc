// Index-stable storage for agents and voxel membership.
//
// `AgentId` is a dense `u32` handle into the world's `Arena<Agent>`. Agents
// are never removed from the arena (they are deactivated in place), so a
// handle stays valid for the whole run and can be stored in voxel
// membership lists, birth records and snapshots without any remapping.
//
// `MemberList` is the per-voxel set of handles. Removal is O(1): the
// removed slot is filled with the last entry and a side table of slot
// positions is patched. Order is not preserved; callers that need a
// stable iteration order (the shove pass) sort a copy.
//
// See also: `voxel.rs` which guards a `MemberList` with its lock,
// `world.rs` which owns the agent arena.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable handle of an agent in the world's arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AgentId(pub u32);

impl AgentId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// MemberList
// ---------------------------------------------------------------------------

/// Unordered set of agent handles with O(1) insert and remove.
#[derive(Clone, Debug, Default)]
pub struct MemberList {
    items: Vec<AgentId>,
    slots: FxHashMap<AgentId, usize>,
}

impl MemberList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `id`. Returns `false` if it was already present.
    pub fn insert(&mut self, id: AgentId) -> bool {
        if self.slots.contains_key(&id) {
            return false;
        }
        self.slots.insert(id, self.items.len());
        self.items.push(id);
        true
    }

    /// Remove `id` by swapping the last entry into its slot.
    /// Returns `false` if it was not present.
    pub fn remove(&mut self, id: AgentId) -> bool {
        let Some(slot) = self.slots.remove(&id) else {
            return false;
        };
        self.items.swap_remove(slot);
        if let Some(&moved) = self.items.get(slot) {
            self.slots.insert(moved, slot);
        }
        true
    }

    pub fn contains(&self, id: AgentId) -> bool {
        self.slots.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn as_slice(&self) -> &[AgentId] {
        &self.items
    }
}

// ---------------------------------------------------------------------------
// Arena
// ---------------------------------------------------------------------------

/// Append-only arena addressed by `AgentId`.
///
/// Capacity is reserved up front. Pushing past it still works (the backing
/// `Vec` grows) but is logged, since it means the configured capacity was
/// too small for the population.
#[derive(Clone, Debug)]
pub struct Arena<T> {
    items: Vec<T>,
    reserved: usize,
}

impl<T> Arena<T> {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            items: Vec::with_capacity(capacity),
            reserved: capacity,
        }
    }

    pub fn push(&mut self, item: T) -> AgentId {
        if self.items.len() == self.reserved {
            tracing::warn!(
                capacity = self.reserved,
                "agent arena exceeded its reserved capacity; growing"
            );
            self.reserved = self.reserved.saturating_mul(2).max(1);
            self.items.reserve(self.reserved - self.items.len());
        }
        let id = AgentId(self.items.len() as u32);
        self.items.push(item);
        id
    }

    pub fn get(&self, id: AgentId) -> Option<&T> {
        self.items.get(id.index())
    }

    pub fn get_mut(&mut self, id: AgentId) -> Option<&mut T> {
        self.items.get_mut(id.index())
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.reserved
    }

    pub fn as_slice(&self) -> &[T] {
        &self.items
    }

    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.items
    }

    /// Iterate `(handle, item)` pairs in handle order.
    pub fn iter(&self) -> impl Iterator<Item = (AgentId, &T)> {
        self.items
            .iter()
            .enumerate()
            .map(|(i, item)| (AgentId(i as u32), item))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn member_list_insert_is_idempotent() {
        let mut list = MemberList::new();
        assert!(list.insert(AgentId(4)));
        assert!(!list.insert(AgentId(4)));
        assert_eq!(list.len(), 1);
    }

    #[test]
    fn member_list_swap_remove_keeps_slots_consistent() {
        let mut list = MemberList::new();
        for i in 0..5 {
            list.insert(AgentId(i));
        }
        assert!(list.remove(AgentId(1)));
        assert!(!list.remove(AgentId(1)));
        // The last entry moved into slot 1 and must still be removable.
        assert!(list.remove(AgentId(4)));
        assert!(list.remove(AgentId(0)));
        let mut rest: Vec<_> = list.as_slice().to_vec();
        rest.sort();
        assert_eq!(rest, vec![AgentId(2), AgentId(3)]);
        assert!(list.contains(AgentId(3)));
        assert!(!list.contains(AgentId(4)));
    }

    #[test]
    fn member_list_remove_last_element() {
        let mut list = MemberList::new();
        list.insert(AgentId(9));
        assert!(list.remove(AgentId(9)));
        assert!(list.is_empty());
        assert!(list.insert(AgentId(9)));
    }

    #[test]
    fn arena_handles_are_dense_and_stable() {
        let mut arena = Arena::with_capacity(4);
        let a = arena.push("a");
        let b = arena.push("b");
        assert_eq!((a, b), (AgentId(0), AgentId(1)));
        assert_eq!(arena.get(b), Some(&"b"));
        assert_eq!(arena.get(AgentId(7)), None);
        *arena.get_mut(a).unwrap() = "z";
        let all: Vec<_> = arena.iter().map(|(id, s)| (id.0, *s)).collect();
        assert_eq!(all, vec![(0, "z"), (1, "b")]);
    }

    #[test]
    fn arena_grows_past_reserved_capacity() {
        let mut arena = Arena::with_capacity(1);
        arena.push(1u8);
        arena.push(2u8);
        arena.push(3u8);
        assert_eq!(arena.len(), 3);
        assert!(arena.capacity() >= 3);
    }
}
