// Explicit Fickian diffusion with first-order decay.
//
// The field is double-buffered: for each species the solver reads a
// frozen copy of every voxel's concentration, computes the next value of
// each voxel from that copy alone, and only then stores the results back.
// No voxel ever reads a half-updated neighbour, so the outcome does not
// depend on worker count, slab boundaries or visitation order.
//
// For a voxel `i` and face neighbour `j` along an axis with voxel size
// `dx`, the transfer coefficient is
//
//     k = dt / dx² · (D(layer_i) + D(layer_j)) / 2
//
// and the amount leaving `i` for `j` is `q = k · (c_i − c_j)`, clamped to
// `[−c_j / 6, c_i / 6]` so that six faces together can never drain more
// than the source holds. The clamp is antisymmetric (`q_ji = −q_ij`), so
// every exchange between two non-bulk voxels conserves mass exactly.
//
// Bulk voxels are chemostatic. They keep their value, and their non-bulk
// neighbours exchange with them as with a fixed reservoir. After the
// exchanges, a non-bulk voxel decays by `exp(−decay(layer) · dt)` and is
// clamped to `>= 0`.
//
// A coefficient above the configured threshold means the explicit scheme
// is unstable for this timestep and voxel size. The step still runs; the
// species is reported back to the caller.
//
// See also: `lattice.rs` for the slab layout, `molecule.rs` for the
// per-layer constants, `world.rs` which runs this as the environment phase.

use crate::config::WorldConfig;
use crate::lattice::{FACE_OFFSETS, Lattice};
use crate::molecule::{MoleculeInfo, MoleculeTable};
use crate::schedule;
use crate::types::{LayerType, SpeciesIndex};
use rayon::prelude::*;

/// Share of a voxel's stock one face exchange may move.
const FACE_SHARE: f64 = 1.0 / 6.0;

/// Transfer coefficient between two voxels with coefficients `d_a`, `d_b`.
pub fn transfer_coefficient(timestep: f64, spacing: f64, d_a: f64, d_b: f64) -> f64 {
    timestep / (spacing * spacing) * 0.5 * (d_a + d_b)
}

/// Amount moving from a voxel at `c_from` to one at `c_to`; negative when
/// the flow runs the other way.
pub fn pair_flux(k: f64, c_from: f64, c_to: f64) -> f64 {
    (k * (c_from - c_to)).clamp(-c_to * FACE_SHARE, c_from * FACE_SHARE)
}

/// Largest transfer coefficient `species` can reach on this lattice.
pub fn max_coefficient(info: &MoleculeInfo, config: &WorldConfig) -> f64 {
    let size = config.voxel_size();
    let min_spacing = size.x.min(size.y).min(size.z);
    transfer_coefficient(
        config.timestep,
        min_spacing,
        info.max_diffusion(),
        info.max_diffusion(),
    )
}

/// Run one environment phase for every registered species. Returns the
/// species whose coefficient exceeded the instability threshold.
pub fn step(
    pool: &rayon::ThreadPool,
    lattice: &Lattice,
    molecules: &MoleculeTable,
    config: &WorldConfig,
) -> Vec<SpeciesIndex> {
    let layers: Vec<LayerType> = lattice.voxels().iter().map(|v| v.layer()).collect();
    let slabs = schedule::partition(lattice.counts()[0] as usize, config.workers);
    let blocks: Vec<_> = slabs.iter().map(|s| lattice.slab_range(s.clone())).collect();

    let mut unstable = Vec::new();
    let mut current = vec![0.0; lattice.len()];
    let mut next = vec![0.0; lattice.len()];
    for info in molecules.iter() {
        if max_coefficient(info, config) > config.instability_threshold {
            unstable.push(info.index);
        }
        let species = info.index;
        pool.install(|| {
            current
                .par_iter_mut()
                .zip(lattice.voxels().par_iter())
                .for_each(|(c, voxel)| *c = voxel.concentration(species));

            let parts = schedule::split_ranges_mut(&mut next, &blocks);
            parts
                .into_par_iter()
                .zip(blocks.par_iter())
                .for_each(|(part, block)| {
                    for (offset, out) in part.iter_mut().enumerate() {
                        *out = next_value(block.start + offset, &current, &layers, lattice, info, config);
                    }
                });

            lattice
                .voxels()
                .par_iter()
                .zip(next.par_iter())
                .for_each(|(voxel, &c)| voxel.set_concentration(species, c));
        });
    }
    unstable
}

/// New concentration of voxel `index` after one exchange and decay.
fn next_value(
    index: usize,
    current: &[f64],
    layers: &[LayerType],
    lattice: &Lattice,
    info: &MoleculeInfo,
    config: &WorldConfig,
) -> f64 {
    let layer = layers[index];
    let c = current[index];
    if layer == LayerType::Bulk {
        return c;
    }
    let Some(coord) = lattice.coord_of(index) else {
        return c;
    };
    let size = lattice.voxel_size();
    let d_here = info.diffusion_coefficient(layer);

    let mut value = c;
    for (neighbor, (axis, _)) in lattice.face_neighbors(coord).into_iter().zip(FACE_OFFSETS) {
        let Some(j) = neighbor else {
            continue;
        };
        let spacing = size.axis(axis);
        let k = transfer_coefficient(
            config.timestep,
            spacing,
            d_here,
            info.diffusion_coefficient(layers[j]),
        );
        value -= pair_flux(k, c, current[j]);
    }
    (value * (-info.decay_rate(layer) * config.timestep).exp()).max(0.0)
}
