// Agents: physical particles with mass composition and behaviors.
//
// An agent has an absolute position, a pending displacement that
// accumulates during the agent phase and is applied exactly once in the
// commit phase, named mass components `(name, mass, density)` from which
// volume and radii are derived, an ordered `BehaviorSet`, and a lattice
// cell whose voxel lists it as a member.
//
// Two radii are tracked. The cell radius covers every component except
// `"EPS"` (the extracellular capsule); the total radius covers all of
// them, so `total_radius >= cell_radius` always holds. Both are the radius
// of the sphere of equal volume.
//
// Collision resolution ("shove") reads neighbour positions and radii from
// a `BodySnapshot` table taken at the start of the agent phase. Positions
// only change in the commit phase, so the snapshot is exact and the
// result does not depend on the order agents are visited. Each
// overlapping pair pushes both members apart by half the overlap depth,
// along the line joining the centres.
//
// See also: `behavior.rs` for the behaviors an agent drives,
// `lifecycle.rs` for division, capsule release and death,
// `world.rs` for the phases that call `update()` and `commit_movement()`.

use crate::arena::AgentId;
use crate::behavior::{Behavior, BehaviorSet};
use crate::config::{BacteriumParams, WorldConfig};
use crate::lattice::Lattice;
use crate::lifecycle::{self, Birth};
use crate::molecule::MoleculeTable;
use crate::types::{CapsuleKind, VoxelCoord};
use crate::vecmath::Vec3;
use bnsim_prng::SimRng;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::f64::consts::PI;

/// Name of the biomass component.
pub const BIOMASS: &str = "X";
/// Name of the capsule component, excluded from the cell volume.
pub const EPS: &str = "EPS";
pub const BIOMASS_DENSITY: f64 = 150.0;
pub const EPS_DENSITY: f64 = 75.0;

/// Radius of the sphere with the given volume.
pub fn sphere_radius(volume: f64) -> f64 {
    (volume * 0.75 / PI).cbrt()
}

pub fn sphere_volume(radius: f64) -> f64 {
    4.0 / 3.0 * PI * radius * radius * radius
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MassComponent {
    pub name: String,
    pub mass: f64,
    pub density: f64,
}

/// What an agent is, beyond its physics.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum AgentKind {
    /// A passive particle with no life cycle.
    Particle,
    Bacterium(BacteriumParams),
    /// A released EPS particle.
    Capsule(CapsuleKind),
}

/// The part of an agent other agents may see during the agent phase.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BodySnapshot {
    pub position: Vec3,
    pub total_radius: f64,
    pub serial: u64,
    pub active: bool,
}

/// Shared read-only state for one agent phase.
pub struct Neighborhood<'a> {
    pub lattice: &'a Lattice,
    pub molecules: &'a MoleculeTable,
    pub config: &'a WorldConfig,
    pub bodies: &'a [BodySnapshot],
}

/// What one worker's agents produced during the agent phase.
#[derive(Debug, Default)]
pub struct UpdateLog {
    pub births: Vec<Birth>,
    pub deaths: usize,
    pub faults: usize,
}

#[derive(Clone, Debug)]
pub struct Agent {
    serial: u64,
    position: Vec3,
    pending: Vec3,
    cell_radius: f64,
    total_radius: f64,
    volume: f64,
    cell_volume: f64,
    masses: SmallVec<[MassComponent; 2]>,
    behaviors: BehaviorSet,
    kind: AgentKind,
    active: bool,
    cell: VoxelCoord,
    rng: SimRng,
}

impl Agent {
    /// A passive particle of biomass sized to `radius`.
    pub fn new(position: Vec3, radius: f64) -> Self {
        Self::with_component(
            position,
            AgentKind::Particle,
            BIOMASS,
            sphere_volume(radius) * BIOMASS_DENSITY,
            BIOMASS_DENSITY,
        )
    }

    /// A bacterium whose biomass fills a sphere of `radius`.
    pub fn bacterium(position: Vec3, radius: f64, params: BacteriumParams) -> Self {
        Self::with_component(
            position,
            AgentKind::Bacterium(params),
            BIOMASS,
            sphere_volume(radius) * BIOMASS_DENSITY,
            BIOMASS_DENSITY,
        )
    }

    /// A free capsule particle made entirely of EPS.
    pub fn capsule(position: Vec3, kind: CapsuleKind, radius: f64) -> Self {
        Self::with_component(
            position,
            AgentKind::Capsule(kind),
            EPS,
            sphere_volume(radius) * EPS_DENSITY,
            EPS_DENSITY,
        )
    }

    fn with_component(
        position: Vec3,
        kind: AgentKind,
        name: &str,
        mass: f64,
        density: f64,
    ) -> Self {
        let mut agent = Self {
            serial: 0,
            position,
            pending: Vec3::ZERO,
            cell_radius: 0.0,
            total_radius: 0.0,
            volume: 0.0,
            cell_volume: 0.0,
            masses: SmallVec::new(),
            behaviors: BehaviorSet::default(),
            kind,
            active: true,
            cell: VoxelCoord::default(),
            rng: SimRng::new(0),
        };
        agent.add_mass_component(name, mass, density);
        agent
    }

    /// Builder form of `attach_behavior()`.
    pub fn with_behavior(mut self, behavior: Box<dyn Behavior>) -> Self {
        self.behaviors.attach(behavior);
        self
    }

    pub fn attach_behavior(&mut self, behavior: Box<dyn Behavior>) {
        self.behaviors.attach(behavior);
    }

    /// Unique serial, assigned when the agent enters a world. Zero before.
    pub fn id(&self) -> u64 {
        self.serial
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    /// Move the agent before it is added to a world.
    pub fn set_position(&mut self, position: Vec3) {
        self.position = position;
    }

    pub fn pending_displacement(&self) -> Vec3 {
        self.pending
    }

    /// Accumulate a displacement to be applied at the next commit.
    pub fn displace(&mut self, delta: Vec3) {
        self.pending += delta;
    }

    pub fn cell_radius(&self) -> f64 {
        self.cell_radius
    }

    pub fn total_radius(&self) -> f64 {
        self.total_radius
    }

    pub fn volume(&self) -> f64 {
        self.volume
    }

    pub fn cell_volume(&self) -> f64 {
        self.cell_volume
    }

    pub fn kind(&self) -> &AgentKind {
        &self.kind
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Stop updating this agent. It keeps its voxel membership; any
    /// displacement accumulated this step is dropped.
    pub fn deactivate(&mut self) {
        self.active = false;
        self.pending = Vec3::ZERO;
    }

    pub fn cell(&self) -> VoxelCoord {
        self.cell
    }

    pub fn rng_mut(&mut self) -> &mut SimRng {
        &mut self.rng
    }

    pub fn behaviors(&self) -> &BehaviorSet {
        &self.behaviors
    }

    pub fn behavior<T: Behavior + 'static>(&self) -> Option<&T> {
        self.behaviors.get::<T>()
    }

    // -----------------------------------------------------------------------
    // Mass bookkeeping
    // -----------------------------------------------------------------------

    pub fn masses(&self) -> &[MassComponent] {
        &self.masses
    }

    pub fn mass(&self, name: &str) -> Option<f64> {
        self.masses.iter().find(|m| m.name == name).map(|m| m.mass)
    }

    /// Sum of every component's mass.
    pub fn total_mass(&self) -> f64 {
        self.masses.iter().map(|m| m.mass).sum()
    }

    /// Set an existing component's mass (clamped to `>= 0`). Returns
    /// `false` if the agent has no such component.
    pub fn set_mass(&mut self, name: &str, mass: f64) -> bool {
        match self.masses.iter_mut().find(|m| m.name == name) {
            Some(component) => {
                component.mass = mass.max(0.0);
                true
            }
            None => false,
        }
    }

    /// Add a component, or overwrite the mass and density of an existing
    /// one. Returns `false` (and changes nothing) for a non-positive or
    /// non-finite density.
    pub fn add_mass_component(&mut self, name: &str, mass: f64, density: f64) -> bool {
        if !density.is_finite() || density <= 0.0 {
            return false;
        }
        let mass = mass.max(0.0);
        match self.masses.iter_mut().find(|m| m.name == name) {
            Some(component) => {
                component.mass = mass;
                component.density = density;
            }
            None => self.masses.push(MassComponent {
                name: name.to_owned(),
                mass,
                density,
            }),
        }
        self.refresh_geometry();
        true
    }

    pub(crate) fn scale_masses(&mut self, factor: f64) {
        for component in &mut self.masses {
            component.mass *= factor;
        }
    }

    /// Total volume is `Σ mass / density`; cell volume leaves out EPS.
    pub fn update_volume(&mut self) {
        let mut total = 0.0;
        let mut cell = 0.0;
        for component in &self.masses {
            let v = component.mass / component.density;
            total += v;
            if component.name != EPS {
                cell += v;
            }
        }
        self.volume = total;
        self.cell_volume = cell;
    }

    pub fn update_radius(&mut self) {
        self.total_radius = sphere_radius(self.volume);
        self.cell_radius = sphere_radius(self.cell_volume);
    }

    pub fn refresh_geometry(&mut self) {
        self.update_volume();
        self.update_radius();
    }

    pub fn body(&self) -> BodySnapshot {
        BodySnapshot {
            position: self.position,
            total_radius: self.total_radius,
            serial: self.serial,
            active: self.active,
        }
    }

    // -----------------------------------------------------------------------
    // World entry
    // -----------------------------------------------------------------------

    /// Give the agent its serial and random stream, and place it in the
    /// voxel covering its position.
    pub(crate) fn enter_world(
        &mut self,
        id: AgentId,
        serial: u64,
        rng: SimRng,
        lattice: &Lattice,
    ) {
        self.serial = serial;
        self.rng = rng;
        self.refresh_geometry();
        self.cell = lattice.cell_of(self.position);
        if let Some(voxel) = lattice.get(self.cell) {
            voxel.add_agent(id);
        }
    }

    /// Reset a copy of a parent into a newborn at `position`.
    pub(crate) fn prepare_for_birth(&mut self, position: Vec3) {
        self.serial = 0;
        self.position = position;
        self.pending = Vec3::ZERO;
        self.active = true;
    }

    // -----------------------------------------------------------------------
    // Agent phase
    // -----------------------------------------------------------------------

    /// One agent-phase update: behaviors, life cycle, shove, geometry.
    ///
    /// Position is not changed here. A behavior error is logged and ends
    /// this agent's update for the step.
    pub fn update(&mut self, id: AgentId, env: &Neighborhood<'_>, log: &mut UpdateLog) {
        if !self.active {
            return;
        }
        let Some(voxel) = env.lattice.get(self.cell) else {
            return;
        };

        let mut behaviors = std::mem::take(&mut self.behaviors);
        let outcome = behaviors.update_all(self, voxel, env.molecules, env.config.timestep);
        self.behaviors = behaviors;
        if let Err(err) = outcome {
            tracing::warn!(agent = self.serial, %err, "behavior failed; skipping agent for this step");
            log.faults += 1;
            return;
        }
        self.refresh_geometry();

        let params = match &self.kind {
            AgentKind::Bacterium(params) => Some(*params),
            _ => None,
        };
        if let Some(params) = params {
            lifecycle::advance(self, id, &params, log);
            if !self.active {
                return;
            }
        }

        self.shove(id, env);
        self.refresh_geometry();
        self.sync_cell(id, env.lattice);
    }

    /// Accumulate repulsion from every overlapping active agent in this
    /// agent's voxel and its six face neighbours.
    fn shove(&mut self, id: AgentId, env: &Neighborhood<'_>) {
        let Some(me) = env.bodies.get(id.index()) else {
            return;
        };
        let Some(home) = env.lattice.index_of(self.cell) else {
            return;
        };

        let mut others: SmallVec<[AgentId; 32]> = SmallVec::new();
        for index in std::iter::once(Some(home))
            .chain(env.lattice.face_neighbors(self.cell))
            .flatten()
        {
            if let Some(voxel) = env.lattice.get_index(index) {
                voxel.extend_members(&mut others);
            }
        }
        // Fixed summation order, whatever order the lists were built in.
        others.sort_unstable();

        for other_id in others {
            if other_id == id {
                continue;
            }
            let Some(other) = env.bodies.get(other_id.index()) else {
                continue;
            };
            if !other.active {
                continue;
            }
            self.pending += shove_displacement(me, other);
        }
    }

    /// Re-register with the voxel covering the current position if it is
    /// not the one on record.
    fn sync_cell(&mut self, id: AgentId, lattice: &Lattice) {
        let cell = lattice.cell_of(self.position);
        if cell == self.cell {
            return;
        }
        if let Some(old) = lattice.get(self.cell) {
            old.remove_agent(id);
        }
        if let Some(new) = lattice.get(cell) {
            new.add_agent(id);
        }
        self.cell = cell;
    }

    // -----------------------------------------------------------------------
    // Commit phase
    // -----------------------------------------------------------------------

    /// Apply the pending displacement once, clamp into the box, clear the
    /// accumulator and move voxel membership if the cell changed.
    ///
    /// Returns `false` if the displacement was non-finite and discarded.
    pub fn commit_movement(&mut self, id: AgentId, lattice: &Lattice, config: &WorldConfig) -> bool {
        let delta = std::mem::replace(&mut self.pending, Vec3::ZERO);
        if !delta.is_finite() {
            tracing::warn!(agent = self.serial, "discarding non-finite displacement");
            return false;
        }
        self.position += delta;
        for axis in 0..3 {
            let extent = config.extent[axis];
            let p = self.position.axis(axis);
            if p > extent {
                self.position.set_axis(axis, extent - config.boundary_margin);
            } else if p < 0.0 {
                self.position.set_axis(axis, config.boundary_margin);
            }
        }
        self.sync_cell(id, lattice);
        true
    }
}

/// Displacement of `me` caused by overlapping `other`: half the overlap
/// depth along the unit vector from `other` to `me`. Zero when the bodies
/// do not overlap.
///
/// Coincident centres have no direction, so the pair is split along the
/// x axis with the lower serial moving towards `+x`.
pub fn shove_displacement(me: &BodySnapshot, other: &BodySnapshot) -> Vec3 {
    let offset = me.position - other.position;
    let distance = offset.length();
    let reach = me.total_radius + other.total_radius;
    if distance >= reach {
        return Vec3::ZERO;
    }
    let direction = offset.normalized().unwrap_or_else(|| {
        if me.serial < other.serial {
            Vec3::new(1.0, 0.0, 0.0)
        } else {
            Vec3::new(-1.0, 0.0, 0.0)
        }
    });
    direction * (0.5 * (reach - distance))
}
