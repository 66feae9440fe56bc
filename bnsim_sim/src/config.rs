// Run configuration.
//
// `WorldConfig` is the explicit, immutable description of a run: box
// extents, lattice resolution, species count, worker count, timestep and run
// length. It is handed to `World::new()` and never mutated afterwards; the
// world keeps the simulation clock itself. Every component that needs a
// physical constant reads it from the config reference it was given, so
// there is no process-wide state.
//
// Configs load from JSON via serde. Optional fields fall back to the
// `Default` values below, which match the reference quorum-sensing setup
// (500 µm cube, 25³ voxels, 0.4 s timestep).
//
// `validate()` rejects every setup the scheduler cannot run safely (zero
// dimensions, non-positive voxel sizes, more workers than X-slabs, ...).
// `World::new()` calls it, so a bad config fails before the first step.
//
// See also: `molecule.rs` for per-species constants, `world.rs` which owns
// the config, `lifecycle.rs` for how `BacteriumParams` are used.

use crate::error::{ConfigError, SimError};
use crate::vecmath::Vec3;
use serde::{Deserialize, Serialize};
use std::path::Path;

const AXES: [char; 3] = ['x', 'y', 'z'];

/// Immutable description of one simulation run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    /// Physical size of the box on each axis.
    pub extent: [f64; 3],
    /// Number of voxels on each axis.
    pub voxel_counts: [u32; 3],
    /// Number of molecule species tracked in every voxel.
    pub species_count: usize,
    /// Worker threads used by every parallel phase.
    pub workers: usize,
    /// Fixed simulated-time increment per step.
    pub timestep: f64,
    /// The run stops once the clock reaches this value.
    pub run_length: f64,
    /// When false the environment phase is skipped entirely.
    pub diffusion: bool,
    /// Master seed for every random stream in the run.
    pub seed: u64,
    /// Registry slots reserved up front so births never reallocate mid-run.
    pub agent_capacity: usize,
    /// Distance from a wall that an agent pushed out of the box is clamped to.
    pub boundary_margin: f64,
    /// Dimensionless transfer coefficient (`D·dt/dx²`) above which a
    /// diffusion step is reported as numerically unstable.
    pub instability_threshold: f64,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            extent: [500.0, 500.0, 500.0],
            voxel_counts: [25, 25, 25],
            species_count: 2,
            workers: 8,
            timestep: 0.4,
            run_length: 100_000.0,
            diffusion: true,
            seed: 0,
            agent_capacity: 100_000,
            boundary_margin: 1.0,
            instability_threshold: 1.0,
        }
    }
}

impl WorldConfig {
    pub fn from_json(json: &str) -> Result<Self, SimError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: &Path) -> Result<Self, SimError> {
        let text = std::fs::read_to_string(path).map_err(|source| SimError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&text)
    }

    /// Edge lengths of one voxel.
    pub fn voxel_size(&self) -> Vec3 {
        Vec3::new(
            self.extent[0] / f64::from(self.voxel_counts[0]),
            self.extent[1] / f64::from(self.voxel_counts[1]),
            self.extent[2] / f64::from(self.voxel_counts[2]),
        )
    }

    pub fn voxel_volume(&self) -> f64 {
        let s = self.voxel_size();
        s.x * s.y * s.z
    }

    pub fn voxel_count(&self) -> usize {
        self.voxel_counts.iter().map(|&n| n as usize).product()
    }

    /// Reject configurations the scheduler cannot run.
    ///
    /// The worker count need not divide the X-slab count (or the agent
    /// count): `schedule::partition()` hands the remainder one apiece to
    /// the leading workers. It must not exceed the slab count, so every
    /// worker owns at least one slab.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for axis in 0..3 {
            let extent = self.extent[axis];
            if !positive_finite(extent) {
                return Err(ConfigError::InvalidExtent {
                    axis: AXES[axis],
                    value: extent,
                });
            }
            if self.voxel_counts[axis] == 0 {
                return Err(ConfigError::ZeroVoxelCount { axis: AXES[axis] });
            }
            let size = self.voxel_size().axis(axis);
            if !positive_finite(size) {
                return Err(ConfigError::InvalidVoxelSize {
                    axis: AXES[axis],
                    value: size,
                });
            }
            if self.boundary_margin < 0.0 || 2.0 * self.boundary_margin >= extent {
                return Err(ConfigError::InvalidMargin {
                    axis: AXES[axis],
                    margin: self.boundary_margin,
                    extent,
                });
            }
        }
        if !positive_finite(self.timestep) {
            return Err(ConfigError::InvalidTimestep(self.timestep));
        }
        if !self.run_length.is_finite() || self.run_length < 0.0 {
            return Err(ConfigError::InvalidRunLength(self.run_length));
        }
        if self.workers == 0 {
            return Err(ConfigError::ZeroWorkers);
        }
        if self.workers > self.voxel_counts[0] as usize {
            return Err(ConfigError::EmptySlab {
                workers: self.workers,
                slabs: self.voxel_counts[0],
            });
        }
        if self.agent_capacity == 0 {
            return Err(ConfigError::ZeroCapacity);
        }
        Ok(())
    }
}

fn positive_finite(value: f64) -> bool {
    value.is_finite() && value > 0.0
}

/// Life-cycle thresholds for a bacterium.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BacteriumParams {
    /// Cell radius above which the bacterium divides.
    pub division_radius: f64,
    /// Capsule thickness (total radius minus cell radius) above which the
    /// capsule is shed as a free EPS particle.
    pub capsule_release_thickness: f64,
    /// Cell radius below which the bacterium dies and stops updating.
    pub death_radius: f64,
    /// Side of the cube a daughter is scattered in around its parent.
    pub placement_jitter: f64,
    /// Fraction of the parent's biomass each of parent and daughter keep
    /// after division. `0.45` loses 10% of the biomass to the process.
    pub division_mass_fraction: f64,
}

impl Default for BacteriumParams {
    fn default() -> Self {
        Self {
            division_radius: 2.0,
            capsule_release_thickness: 2.0,
            death_radius: 0.2,
            placement_jitter: 0.01,
            division_mass_fraction: 0.45,
        }
    }
}
