// The voxel lattice.
//
// Voxels are stored flat, indexed `x * ny * nz + y * nz + z`, so each
// X-slab (all voxels with one `x`) is a contiguous run of `ny * nz`
// entries. The scheduler relies on this to hand each worker a contiguous
// block of the diffusion output buffer.
//
// Positions map to cells by dividing by the voxel size and rounding half
// up, then clamping into the lattice. Cell `i` therefore covers
// `[(i - 0.5) * size, (i + 0.5) * size)` and voxel centres sit on integer
// multiples of the voxel size.
//
// See also: `voxel.rs` for the per-cell state, `diffusion.rs` for the
// stencil that walks `face_neighbors()`.

use crate::config::WorldConfig;
use crate::types::VoxelCoord;
use crate::vecmath::Vec3;
use crate::voxel::Voxel;
use std::ops::Range;

/// Offsets of the six face neighbours, grouped by axis.
pub const FACE_OFFSETS: [(usize, i64); 6] = [(0, -1), (0, 1), (1, -1), (1, 1), (2, -1), (2, 1)];

#[derive(Debug)]
pub struct Lattice {
    counts: [u32; 3],
    voxel_size: Vec3,
    voxels: Vec<Voxel>,
}

impl Lattice {
    /// Build an all-bulk, zero-concentration lattice from a validated config.
    pub fn new(config: &WorldConfig) -> Self {
        let [nx, ny, nz] = config.voxel_counts;
        let volume = config.voxel_volume();
        let mut voxels = Vec::with_capacity(config.voxel_count());
        for x in 0..nx {
            for y in 0..ny {
                for z in 0..nz {
                    voxels.push(Voxel::new(
                        VoxelCoord::new(x, y, z),
                        volume,
                        config.species_count,
                    ));
                }
            }
        }
        Self {
            counts: config.voxel_counts,
            voxel_size: config.voxel_size(),
            voxels,
        }
    }

    pub fn counts(&self) -> [u32; 3] {
        self.counts
    }

    pub fn voxel_size(&self) -> Vec3 {
        self.voxel_size
    }

    pub fn len(&self) -> usize {
        self.voxels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.voxels.is_empty()
    }

    /// Voxels per X-slab.
    pub fn slab_len(&self) -> usize {
        self.counts[1] as usize * self.counts[2] as usize
    }

    /// Linear index range covering X-slabs `slabs.start..slabs.end`.
    pub fn slab_range(&self, slabs: Range<usize>) -> Range<usize> {
        let len = self.slab_len();
        slabs.start * len..slabs.end * len
    }

    pub fn index_of(&self, coord: VoxelCoord) -> Option<usize> {
        let [nx, ny, nz] = self.counts;
        if coord.x >= nx || coord.y >= ny || coord.z >= nz {
            return None;
        }
        Some(
            coord.x as usize * ny as usize * nz as usize
                + coord.y as usize * nz as usize
                + coord.z as usize,
        )
    }

    pub fn coord_of(&self, index: usize) -> Option<VoxelCoord> {
        if index >= self.voxels.len() {
            return None;
        }
        let ny = self.counts[1] as usize;
        let nz = self.counts[2] as usize;
        Some(VoxelCoord::new(
            (index / (ny * nz)) as u32,
            ((index / nz) % ny) as u32,
            (index % nz) as u32,
        ))
    }

    pub fn get(&self, coord: VoxelCoord) -> Option<&Voxel> {
        self.voxels.get(self.index_of(coord)?)
    }

    pub fn get_index(&self, index: usize) -> Option<&Voxel> {
        self.voxels.get(index)
    }

    pub fn voxels(&self) -> &[Voxel] {
        &self.voxels
    }

    /// The cell containing `position`, clamped into the lattice.
    pub fn cell_of(&self, position: Vec3) -> VoxelCoord {
        let axis = |i: usize| -> u32 {
            let scaled = position.axis(i) / self.voxel_size.axis(i);
            // `as` saturates, and NaN becomes 0.
            let rounded = (scaled + 0.5).floor() as i64;
            rounded.clamp(0, i64::from(self.counts[i]) - 1) as u32
        };
        VoxelCoord::new(axis(0), axis(1), axis(2))
    }

    /// Linear indices of the existing face neighbours of `coord`, in
    /// `FACE_OFFSETS` order; `None` past the lattice edge.
    pub fn face_neighbors(&self, coord: VoxelCoord) -> [Option<usize>; 6] {
        FACE_OFFSETS.map(|(axis, step)| {
            let mut c = [
                i64::from(coord.x),
                i64::from(coord.y),
                i64::from(coord.z),
            ];
            c[axis] += step;
            if c[axis] < 0 || c[axis] >= i64::from(self.counts[axis]) {
                return None;
            }
            self.index_of(VoxelCoord::new(c[0] as u32, c[1] as u32, c[2] as u32))
        })
    }

    /// Total amount (concentration × volume) of `species` over all voxels.
    pub fn total_amount(&self, species: usize) -> f64 {
        self.voxels
            .iter()
            .map(|v| v.concentration(species) * v.volume())
            .sum()
    }
}
