// Core value types shared across the simulator.
//
// `VoxelCoord` addresses a lattice cell by integer axis indices,
// `LayerType` classifies a voxel for diffusion/decay purposes, and
// `CapsuleKind` tags released EPS particles. Agent handles live in
// `arena.rs` next to the containers that hand them out.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Dense index of a molecule species. Species are registered once, before
/// the run, with indices `0..species_count`.
pub type SpeciesIndex = usize;

/// Integer coordinates of a lattice cell.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct VoxelCoord {
    pub x: u32,
    pub y: u32,
    pub z: u32,
}

impl VoxelCoord {
    pub const fn new(x: u32, y: u32, z: u32) -> Self {
        Self { x, y, z }
    }
}

impl fmt::Display for VoxelCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

/// Environmental layer a voxel belongs to.
///
/// `Bulk` voxels are chemostatic: the diffusion phase never changes their
/// concentration, so they act as fixed-value reservoirs for their
/// neighbours. `Boundary` and `Biofilm` voxels diffuse and decay with the
/// per-species constants for their layer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayerType {
    #[default]
    Bulk,
    Boundary,
    Biofilm,
}

/// Polymer type of a released capsule particle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CapsuleKind {
    Dna,
    #[default]
    Protein,
}
