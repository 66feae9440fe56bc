// bnsim_sim: parallel agent/voxel simulation of bacterial populations.
//
// Agents (bacteria and released capsule particles) move, grow, divide and
// exchange diffusible signals inside a bounded box partitioned into a
// voxel lattice. The world advances in fixed timesteps, each made of an
// agent phase, a commit phase and an environment (diffusion) phase, all
// run fork-join on a dedicated rayon pool.
//
// Module overview:
// - `world.rs`:     World orchestrator, step/run loop, StepReport, RunSummary.
// - `agent.rs`:     Agent, mass bookkeeping, shove, commit_movement.
// - `behavior.rs`:  Behavior trait, BehaviorSet, built-in generic behaviors.
// - `lifecycle.rs`: Division, capsule release, death; Birth records.
// - `diffusion.rs`: Double-buffered explicit diffusion + decay.
// - `schedule.rs`:  Work partitioning across workers.
// - `lattice.rs`:   Voxel array, index mapping, face neighbours.
// - `voxel.rs`:     Per-voxel concentrations, layer tag, membership.
// - `molecule.rs`:  Species registry.
// - `arena.rs`:     AgentId, MemberList, Arena.
// - `config.rs`:    WorldConfig, BacteriumParams.
// - `runspec.rs`:   JSON run descriptions for the `bnsim-run` binary.
// - `error.rs`:     ConfigError, BehaviorError, SimError.
// - `types.rs`:     VoxelCoord, LayerType, CapsuleKind.
// - `vecmath.rs`:   Vec3, Mat3.
// - `prng`:         Re-exported from `bnsim_prng`.
//
// **Critical constraint: reproducibility.** All randomness comes from
// `SimRng` streams derived from `WorldConfig::seed`. No OS entropy, no
// thread-local generators, no wall-clock time in the model.

pub mod agent;
pub mod arena;
pub mod behavior;
pub mod config;
pub mod diffusion;
pub mod error;
pub mod lattice;
pub mod lifecycle;
pub mod molecule;
pub use bnsim_prng as prng;
pub mod runspec;
pub mod schedule;
pub mod types;
pub mod vecmath;
pub mod voxel;
pub mod world;
