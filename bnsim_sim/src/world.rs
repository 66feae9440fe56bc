// The simulation world and its fixed-timestep scheduler.
//
// `World` owns the immutable `WorldConfig`, the voxel `Lattice`, the
// molecule registry, the agent arena, the master random stream and a
// dedicated rayon pool sized to the configured worker count. External
// setup code registers species, retags voxel layers and adds agents, then
// drives the loop with `run_one_step()` or `run()`.
//
// One step is four stages with a full join between each:
//
// 1. Agent phase. The arena length is fixed for the step and split into
//    one contiguous range per worker. A `BodySnapshot` table of every
//    agent's position and radius is taken first; each worker then visits
//    its range in its own shuffled order and calls `Agent::update()`,
//    with exclusive `&mut` access to its slice of the arena.
// 2. Births. Daughters and released capsules collected by the workers are
//    sorted by (parent, order), given serials and random streams, placed
//    in their voxel and appended. They sit outside this step's ranges and
//    first update next step.
// 3. Commit phase. Same ranges; `Agent::commit_movement()` applies each
//    pending displacement and moves voxel membership.
// 4. Environment phase (if diffusion is enabled). `diffusion::step()`.
//
// The clock is `steps * timestep`, so it does not drift over long runs.
//
// **Reproducibility.** Per-agent streams are forked from the master
// stream in serial order and births are appended in a fixed order, so for
// a fixed seed an agent's random draws do not depend on thread timing.
// Agents sharing a voxel still apply their concentration updates in
// scheduling order.
//
// See also: `agent.rs` for the per-agent phases, `diffusion.rs` for the
// environment phase, `schedule.rs` for the partitioning.

use crate::agent::{Agent, BodySnapshot, Neighborhood, UpdateLog};
use crate::arena::{AgentId, Arena};
use crate::config::WorldConfig;
use crate::diffusion;
use crate::error::{ConfigError, SimError};
use crate::lattice::Lattice;
use crate::lifecycle::Birth;
use crate::molecule::{MoleculeInfo, MoleculeTable};
use crate::schedule;
use crate::types::{LayerType, SpeciesIndex, VoxelCoord};
use crate::voxel::Voxel;
use bnsim_prng::SimRng;
use rayon::prelude::*;
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use std::ops::Range;

/// What happened during one `run_one_step()`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct StepReport {
    /// Clock value after the step.
    pub time: f64,
    pub births: usize,
    pub deaths: usize,
    /// Agents whose update was cut short by a behavior error or whose
    /// displacement was discarded.
    pub faults: usize,
    /// Species whose diffusion coefficient exceeded the stability
    /// threshold this step.
    pub unstable_species: Vec<SpeciesIndex>,
}

/// Totals over a whole `run()`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub steps: u64,
    pub time: f64,
    pub agents: usize,
    pub active_agents: usize,
    pub births: usize,
    pub deaths: usize,
    pub faults: usize,
    pub unstable_species: Vec<SpeciesIndex>,
}

pub struct World {
    config: WorldConfig,
    lattice: Lattice,
    molecules: MoleculeTable,
    agents: Arena<Agent>,
    next_serial: u64,
    /// Forks per-agent streams, once per agent in serial order.
    rng: SimRng,
    /// Draws worker visitation seeds. Kept apart from `rng` so the worker
    /// count does not shift agent streams.
    order_rng: SimRng,
    pool: rayon::ThreadPool,
    steps: u64,
    warned_unstable: FxHashSet<SpeciesIndex>,
}

impl World {
    /// Validate `config` and build an empty, all-bulk world.
    pub fn new(config: WorldConfig) -> Result<Self, SimError> {
        config.validate()?;
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.workers)
            .thread_name(|i| format!("bnsim-worker-{i}"))
            .build()?;
        let lattice = Lattice::new(&config);
        let mut rng = SimRng::new(config.seed);
        let order_rng = rng.fork(0);
        tracing::info!(
            voxels = lattice.len(),
            workers = config.workers,
            species = config.species_count,
            "world created"
        );
        Ok(Self {
            molecules: MoleculeTable::new(config.species_count),
            agents: Arena::with_capacity(config.agent_capacity),
            next_serial: 1,
            rng,
            order_rng,
            pool,
            steps: 0,
            warned_unstable: FxHashSet::default(),
            lattice,
            config,
        })
    }

    pub fn config(&self) -> &WorldConfig {
        &self.config
    }

    pub fn lattice(&self) -> &Lattice {
        &self.lattice
    }

    // -----------------------------------------------------------------------
    // Species
    // -----------------------------------------------------------------------

    pub fn add_molecule_species(
        &mut self,
        name: &str,
        index: SpeciesIndex,
        diffusion_boundary: f64,
        diffusion_biofilm: f64,
        decay_boundary: f64,
        decay_biofilm: f64,
    ) -> Result<(), ConfigError> {
        self.register_species(MoleculeInfo {
            name: name.to_owned(),
            index,
            diffusion_boundary,
            diffusion_biofilm,
            decay_boundary,
            decay_biofilm,
        })
    }

    pub fn register_species(&mut self, info: MoleculeInfo) -> Result<(), ConfigError> {
        let k = diffusion::max_coefficient(&info, &self.config);
        if k > self.config.instability_threshold {
            tracing::warn!(
                species = %info.name,
                coefficient = k,
                "diffusion coefficient is above the stability limit for this timestep"
            );
        }
        self.molecules.register(info)
    }

    pub fn molecule_info(&self, name: &str) -> Option<&MoleculeInfo> {
        self.molecules.get(name)
    }

    pub fn molecule_info_by_index(&self, index: SpeciesIndex) -> Option<&MoleculeInfo> {
        self.molecules.by_index(index)
    }

    pub fn molecules(&self) -> &MoleculeTable {
        &self.molecules
    }

    // -----------------------------------------------------------------------
    // Voxels
    // -----------------------------------------------------------------------

    pub fn voxel(&self, x: u32, y: u32, z: u32) -> Option<&Voxel> {
        self.lattice.get(VoxelCoord::new(x, y, z))
    }

    pub fn voxel_at(&self, index: usize) -> Option<&Voxel> {
        self.lattice.get_index(index)
    }

    /// Tag voxels by height: `Biofilm` for `z < biofilm_thickness`,
    /// `Boundary` up to `biofilm_thickness + boundary_thickness`, `Bulk`
    /// above. Heights are measured at voxel centres.
    pub fn stratify_layers(&self, boundary_thickness: f64, biofilm_thickness: f64) {
        let dz = self.lattice.voxel_size().z;
        for voxel in self.lattice.voxels() {
            let height = f64::from(voxel.coord().z) * dz;
            let layer = if height < biofilm_thickness {
                LayerType::Biofilm
            } else if height < biofilm_thickness + boundary_thickness {
                LayerType::Boundary
            } else {
                LayerType::Bulk
            };
            voxel.set_layer(layer);
        }
    }

    // -----------------------------------------------------------------------
    // Agents
    // -----------------------------------------------------------------------

    /// Add an agent, assign its serial and place it in its voxel.
    pub fn add_agent(&mut self, mut agent: Agent) -> AgentId {
        let serial = self.next_serial;
        self.next_serial += 1;
        let rng = self.rng.fork(serial);
        let id = AgentId(self.agents.len() as u32);
        agent.enter_world(id, serial, rng, &self.lattice);
        self.agents.push(agent)
    }

    pub fn agent(&self, id: AgentId) -> Option<&Agent> {
        self.agents.get(id)
    }

    /// Mutable access for setup code between steps.
    pub fn agent_mut(&mut self, id: AgentId) -> Option<&mut Agent> {
        self.agents.get_mut(id)
    }

    /// Every agent ever added, active or not.
    pub fn total_agent_count(&self) -> usize {
        self.agents.len()
    }

    pub fn active_agent_count(&self) -> usize {
        self.agents.as_slice().iter().filter(|a| a.is_active()).count()
    }

    pub fn agents(&self) -> impl Iterator<Item = (AgentId, &Agent)> {
        self.agents.iter()
    }

    // -----------------------------------------------------------------------
    // Clock
    // -----------------------------------------------------------------------

    pub fn current_time(&self) -> f64 {
        self.steps as f64 * self.config.timestep
    }

    pub fn step_count(&self) -> u64 {
        self.steps
    }

    // -----------------------------------------------------------------------
    // Stepping
    // -----------------------------------------------------------------------

    pub fn run_one_step(&mut self) -> StepReport {
        let len = self.agents.len();
        let ranges = schedule::partition(len, self.config.workers);

        let log = self.agent_phase(&ranges);
        let births = log.births.len();
        self.append_births(log.births);

        let discarded = self.commit_phase(&ranges);

        let unstable = if self.config.diffusion {
            diffusion::step(&self.pool, &self.lattice, &self.molecules, &self.config)
        } else {
            Vec::new()
        };
        for &species in &unstable {
            if self.warned_unstable.insert(species) {
                tracing::warn!(
                    species,
                    "diffusion transfer coefficient exceeds the stability threshold"
                );
            }
        }

        self.steps += 1;
        let report = StepReport {
            time: self.current_time(),
            births,
            deaths: log.deaths,
            faults: log.faults + discarded,
            unstable_species: unstable,
        };
        tracing::debug!(
            step = self.steps,
            agents = self.agents.len(),
            births = report.births,
            deaths = report.deaths,
            "step complete"
        );
        report
    }

    /// Step until the clock reaches `run_length`.
    pub fn run(&mut self) -> RunSummary {
        tracing::info!(
            run_length = self.config.run_length,
            timestep = self.config.timestep,
            agents = self.agents.len(),
            "run started"
        );
        let mut summary = RunSummary::default();
        let mut unstable = FxHashSet::default();
        while self.current_time() < self.config.run_length {
            let report = self.run_one_step();
            summary.births += report.births;
            summary.deaths += report.deaths;
            summary.faults += report.faults;
            unstable.extend(report.unstable_species);
        }
        summary.steps = self.steps;
        summary.time = self.current_time();
        summary.agents = self.agents.len();
        summary.active_agents = self.active_agent_count();
        summary.unstable_species = unstable.into_iter().collect();
        summary.unstable_species.sort_unstable();
        tracing::info!(
            steps = summary.steps,
            time = summary.time,
            agents = summary.agents,
            active = summary.active_agents,
            "run finished"
        );
        summary
    }

    fn agent_phase(&mut self, ranges: &[Range<usize>]) -> UpdateLog {
        let bodies: Vec<BodySnapshot> = self.agents.as_slice().iter().map(Agent::body).collect();
        let seeds = schedule::worker_seeds(&mut self.order_rng, ranges.len());
        let env = Neighborhood {
            lattice: &self.lattice,
            molecules: &self.molecules,
            config: &self.config,
            bodies: &bodies,
        };
        let parts = schedule::split_ranges_mut(self.agents.as_mut_slice(), ranges);
        let logs: Vec<UpdateLog> = self.pool.install(|| {
            parts
                .into_par_iter()
                .zip(ranges.par_iter())
                .zip(seeds.par_iter())
                .map(|((part, range), &seed)| {
                    let mut log = UpdateLog::default();
                    for local in schedule::shuffled_order(part.len(), seed) {
                        let id = AgentId((range.start + local) as u32);
                        part[local].update(id, &env, &mut log);
                    }
                    log
                })
                .collect()
        });

        let mut merged = UpdateLog::default();
        for log in logs {
            merged.births.extend(log.births);
            merged.deaths += log.deaths;
            merged.faults += log.faults;
        }
        tracing::debug!(
            agents = bodies.len(),
            births = merged.births.len(),
            faults = merged.faults,
            "agent phase complete"
        );
        merged
    }

    fn append_births(&mut self, mut births: Vec<Birth>) {
        births.sort_by_key(|b| (b.parent, b.order));
        for birth in births {
            self.add_agent(birth.agent);
        }
    }

    /// Returns how many displacements were discarded.
    fn commit_phase(&mut self, ranges: &[Range<usize>]) -> usize {
        let lattice = &self.lattice;
        let config = &self.config;
        let parts = schedule::split_ranges_mut(self.agents.as_mut_slice(), ranges);
        self.pool.install(|| {
            parts
                .into_par_iter()
                .zip(ranges.par_iter())
                .map(|(part, range)| {
                    let mut discarded = 0usize;
                    for (local, agent) in part.iter_mut().enumerate() {
                        if !agent.is_active() {
                            continue;
                        }
                        let id = AgentId((range.start + local) as u32);
                        if !agent.commit_movement(id, lattice, config) {
                            discarded += 1;
                        }
                    }
                    discarded
                })
                .sum()
        })
    }
}
