// Error types.
//
// Configuration problems are fatal and surface before the first timestep
// (`ConfigError`). Faults inside a single agent's update are recoverable:
// behaviors return `BehaviorError`, the scheduler logs it and skips the rest
// of that agent's update for the step. Lookup misses (unknown species or
// behavior) are `Option`s, not errors.

use crate::types::SpeciesIndex;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("world extent on axis {axis} must be positive and finite, got {value}")]
    InvalidExtent { axis: char, value: f64 },

    #[error("voxel count on axis {axis} must be non-zero")]
    ZeroVoxelCount { axis: char },

    #[error("voxel size on axis {axis} must be positive, got {value}")]
    InvalidVoxelSize { axis: char, value: f64 },

    #[error("timestep must be positive and finite, got {0}")]
    InvalidTimestep(f64),

    #[error("run length must be non-negative and finite, got {0}")]
    InvalidRunLength(f64),

    #[error("worker count must be at least 1")]
    ZeroWorkers,

    #[error("{workers} workers cannot each own an X-slab of a lattice {slabs} voxels wide")]
    EmptySlab { workers: usize, slabs: u32 },

    #[error("agent registry capacity must be non-zero")]
    ZeroCapacity,

    #[error("boundary margin {margin} does not fit inside extent {extent} on axis {axis}")]
    InvalidMargin { axis: char, margin: f64, extent: f64 },

    #[error("species index {index} is outside 0..{count}")]
    SpeciesOutOfRange { index: SpeciesIndex, count: usize },

    #[error("species index {0} is already registered")]
    DuplicateSpeciesIndex(SpeciesIndex),

    #[error("species name {0:?} is already registered")]
    DuplicateSpeciesName(String),

    #[error("species {name:?} has a negative or non-finite {field}")]
    InvalidSpeciesConstant { name: String, field: &'static str },
}

/// A fault raised by one behavior while updating one agent.
#[derive(Debug, Error, PartialEq)]
pub enum BehaviorError {
    #[error("behavior requires species {0:?}, which is not registered")]
    MissingSpecies(String),

    #[error("behavior requires mass component {0:?}, which the host does not have")]
    MissingMass(String),

    #[error("behavior produced a non-finite {0}")]
    NonFinite(&'static str),
}

/// Top-level error for world construction and file-driven runs.
#[derive(Debug, Error)]
pub enum SimError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error("failed to parse run description: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}
