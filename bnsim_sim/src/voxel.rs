// One cell of the spatial partition.
//
// A voxel owns a concentration per molecule species, a layer tag and the
// membership list of agents located inside it. Concentrations are stored
// as `f64` bit patterns in `AtomicU64`s so `concentration()` never blocks;
// every mutation (concentration or membership) takes the voxel's own mutex
// for its duration, so read-modify-write updates from agents sharing the
// voxel serialize. No operation holds two voxel locks at once.
//
// Stored concentrations are clamped to `>= 0` after every mutation. A NaN
// input clamps to zero as well (`f64::max` discards NaN).
//
// The layer tag is an atomic so setup code can retag voxels through the
// shared `&Voxel` the world hands out.
//
// See also: `lattice.rs` which owns the voxel array, `diffusion.rs` which
// rewrites concentrations once per step, `arena.rs` for `MemberList`.

use crate::arena::{AgentId, MemberList};
use crate::types::{LayerType, SpeciesIndex, VoxelCoord};
use std::sync::atomic::{AtomicU8, AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

#[derive(Debug)]
pub struct Voxel {
    coord: VoxelCoord,
    volume: f64,
    concentrations: Box<[AtomicU64]>,
    layer: AtomicU8,
    members: Mutex<MemberList>,
}

impl Voxel {
    pub fn new(coord: VoxelCoord, volume: f64, species_count: usize) -> Self {
        Self {
            coord,
            volume,
            concentrations: (0..species_count)
                .map(|_| AtomicU64::new(0.0f64.to_bits()))
                .collect(),
            layer: AtomicU8::new(layer_to_u8(LayerType::Bulk)),
            members: Mutex::new(MemberList::new()),
        }
    }

    pub fn coord(&self) -> VoxelCoord {
        self.coord
    }

    pub fn volume(&self) -> f64 {
        self.volume
    }

    pub fn species_count(&self) -> usize {
        self.concentrations.len()
    }

    /// Last committed concentration. Unknown species read as `0.0`.
    pub fn concentration(&self, species: SpeciesIndex) -> f64 {
        self.concentrations
            .get(species)
            .map_or(0.0, |slot| f64::from_bits(slot.load(Ordering::Acquire)))
    }

    pub fn set_concentration(&self, species: SpeciesIndex, value: f64) {
        let Some(slot) = self.slot(species) else {
            return;
        };
        let _guard = self.lock();
        store(slot, value);
    }

    /// Add `mass_delta` (amount, not concentration) of a species, converting
    /// through the voxel volume. Returns the new concentration.
    pub fn apply_delta(&self, species: SpeciesIndex, mass_delta: f64) -> f64 {
        let Some(slot) = self.slot(species) else {
            return 0.0;
        };
        let _guard = self.lock();
        let mass = load(slot) * self.volume + mass_delta;
        store(slot, mass / self.volume)
    }

    /// Subtract `amount` from the concentration directly. Returns how much
    /// was actually removed, which is less than `amount` when the voxel
    /// runs dry.
    pub fn consume(&self, species: SpeciesIndex, amount: f64) -> f64 {
        let Some(slot) = self.slot(species) else {
            return 0.0;
        };
        let _guard = self.lock();
        let before = load(slot);
        let after = store(slot, before - amount);
        before - after
    }

    pub fn layer(&self) -> LayerType {
        layer_from_u8(self.layer.load(Ordering::Relaxed))
    }

    pub fn set_layer(&self, layer: LayerType) {
        self.layer.store(layer_to_u8(layer), Ordering::Relaxed);
    }

    pub fn add_agent(&self, id: AgentId) -> bool {
        self.lock().insert(id)
    }

    pub fn remove_agent(&self, id: AgentId) -> bool {
        self.lock().remove(id)
    }

    pub fn contains_agent(&self, id: AgentId) -> bool {
        self.lock().contains(id)
    }

    pub fn agent_count(&self) -> usize {
        self.lock().len()
    }

    /// Copy of the membership list, in unspecified order.
    pub fn members(&self) -> Vec<AgentId> {
        self.lock().as_slice().to_vec()
    }

    /// Append the membership list to `out` under a brief lock.
    pub fn extend_members(&self, out: &mut impl Extend<AgentId>) {
        out.extend(self.lock().as_slice().iter().copied());
    }

    fn slot(&self, species: SpeciesIndex) -> Option<&AtomicU64> {
        let slot = self.concentrations.get(species);
        if slot.is_none() {
            tracing::warn!(
                voxel = %self.coord,
                species,
                "write to unregistered species index ignored"
            );
        }
        slot
    }

    fn lock(&self) -> MutexGuard<'_, MemberList> {
        // No critical section leaves the list half-updated.
        self.members.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn load(slot: &AtomicU64) -> f64 {
    f64::from_bits(slot.load(Ordering::Acquire))
}

fn store(slot: &AtomicU64, value: f64) -> f64 {
    let clamped = value.max(0.0);
    slot.store(clamped.to_bits(), Ordering::Release);
    clamped
}

fn layer_to_u8(layer: LayerType) -> u8 {
    match layer {
        LayerType::Bulk => 0,
        LayerType::Boundary => 1,
        LayerType::Biofilm => 2,
    }
}

fn layer_from_u8(raw: u8) -> LayerType {
    match raw {
        1 => LayerType::Boundary,
        2 => LayerType::Biofilm,
        _ => LayerType::Bulk,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bnsim_prng::SimRng;
    use std::sync::Arc;

    fn voxel() -> Voxel {
        Voxel::new(VoxelCoord::new(1, 2, 3), 8.0, 2)
    }

    #[test]
    fn defaults_to_empty_bulk() {
        let v = voxel();
        assert_eq!(v.layer(), LayerType::Bulk);
        assert_eq!(v.concentration(0), 0.0);
        assert_eq!(v.agent_count(), 0);
        assert_eq!(v.coord(), VoxelCoord::new(1, 2, 3));
    }

    #[test]
    fn set_clamps_negative_and_nan() {
        let v = voxel();
        v.set_concentration(0, -3.0);
        assert_eq!(v.concentration(0), 0.0);
        v.set_concentration(0, f64::NAN);
        assert_eq!(v.concentration(0), 0.0);
        v.set_concentration(1, 2.5);
        assert_eq!(v.concentration(1), 2.5);
    }

    #[test]
    fn apply_delta_converts_through_volume() {
        let v = voxel();
        v.set_concentration(0, 1.0);
        // 1.0 * 8 + 4 = 12 mass units -> 1.5 concentration.
        assert_eq!(v.apply_delta(0, 4.0), 1.5);
        assert_eq!(v.apply_delta(0, -100.0), 0.0);
        assert_eq!(v.concentration(0), 0.0);
    }

    #[test]
    fn consume_reports_what_was_removed() {
        let v = voxel();
        v.set_concentration(0, 1.0);
        assert_eq!(v.consume(0, 0.25), 0.25);
        assert_eq!(v.concentration(0), 0.75);
        assert_eq!(v.consume(0, 5.0), 0.75);
        assert_eq!(v.concentration(0), 0.0);
    }

    #[test]
    fn unknown_species_is_a_miss() {
        let v = voxel();
        v.set_concentration(7, 1.0);
        assert_eq!(v.concentration(7), 0.0);
        assert_eq!(v.apply_delta(7, 1.0), 0.0);
        assert_eq!(v.consume(7, 1.0), 0.0);
    }

    #[test]
    fn never_negative_under_random_mutation() {
        let v = voxel();
        let mut rng = SimRng::new(3);
        for _ in 0..10_000 {
            let species = rng.range_usize(0, 2);
            match rng.range_usize(0, 3) {
                0 => v.set_concentration(species, rng.uniform(-1.0, 1.0)),
                1 => {
                    v.apply_delta(species, rng.uniform(-5.0, 5.0));
                }
                _ => {
                    v.consume(species, rng.uniform(-0.5, 1.0));
                }
            }
            assert!(v.concentration(0) >= 0.0);
            assert!(v.concentration(1) >= 0.0);
        }
    }

    #[test]
    fn layer_round_trips() {
        let v = voxel();
        for layer in [LayerType::Biofilm, LayerType::Boundary, LayerType::Bulk] {
            v.set_layer(layer);
            assert_eq!(v.layer(), layer);
        }
    }

    #[test]
    fn membership_add_remove() {
        let v = voxel();
        assert!(v.add_agent(AgentId(1)));
        assert!(v.add_agent(AgentId(2)));
        assert!(!v.add_agent(AgentId(1)));
        assert!(v.remove_agent(AgentId(1)));
        assert!(!v.remove_agent(AgentId(1)));
        assert_eq!(v.members(), vec![AgentId(2)]);
        let mut out = Vec::new();
        v.extend_members(&mut out);
        assert_eq!(out, vec![AgentId(2)]);
    }

    #[test]
    fn concurrent_deltas_serialize() {
        let v = Arc::new(Voxel::new(VoxelCoord::new(0, 0, 0), 1.0, 1));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let v = Arc::clone(&v);
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        v.apply_delta(0, 1.0);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(v.concentration(0), 4000.0);
    }
}
