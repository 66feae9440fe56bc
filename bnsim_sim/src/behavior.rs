// Pluggable per-agent behaviors.
//
// A behavior is a capability attached to an agent and invoked once per
// timestep, in attachment order, before the agent's physics. It may read
// and write the host's local voxel (through the locked `Voxel` API) and
// mutate the host's masses and pending displacement. Concrete biochemical
// networks (quorum sensing, metabolism, chemotaxis) live outside this
// crate and plug in through the `Behavior` trait under
// `BehaviorKind::External`.
//
// Behaviors are keyed by a closed `BehaviorKind` tag: an agent holds at
// most one behavior per kind, and callers find a sibling either by tag or
// by concrete type (`get::<Uptake>()`). While one behavior updates, the
// others are reachable read-only through `HostContext::sibling()`.
//
// The built-ins are deliberately generic: first-order `Growth`, constant
// `Secretion`, saturating `Uptake` with a biomass yield, and a persistent
// random walk (`Motility`). `BehaviorSpec` is their serde form, used by
// run descriptions.
//
// See also: `agent.rs` which owns a `BehaviorSet` and drives it,
// `error.rs` for `BehaviorError`.

use crate::agent::{Agent, BIOMASS};
use crate::error::BehaviorError;
use crate::molecule::MoleculeTable;
use crate::types::SpeciesIndex;
use crate::vecmath::{Vec3, rotate_perpendicular};
use crate::voxel::Voxel;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::fmt;

/// Tag identifying a behavior's role on its host.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum BehaviorKind {
    Growth,
    Secretion,
    Uptake,
    Motility,
    /// A behavior defined outside this crate, distinguished by its own code.
    External(u16),
}

pub trait Behavior: Send {
    fn kind(&self) -> BehaviorKind;

    fn update(&mut self, host: &mut HostContext<'_>) -> Result<(), BehaviorError>;

    fn as_any(&self) -> &dyn Any;

    /// Fresh copy for a daughter cell.
    fn clone_boxed(&self) -> Box<dyn Behavior>;
}

// ---------------------------------------------------------------------------
// HostContext
// ---------------------------------------------------------------------------

/// Everything a behavior may touch while it updates.
pub struct HostContext<'a> {
    pub agent: &'a mut Agent,
    pub voxel: &'a Voxel,
    pub molecules: &'a MoleculeTable,
    pub timestep: f64,
    siblings: Siblings<'a>,
}

struct Siblings<'a> {
    before: &'a [Box<dyn Behavior>],
    after: &'a [Box<dyn Behavior>],
}

impl HostContext<'_> {
    /// Another behavior on the same host, by concrete type.
    pub fn sibling<T: Behavior + 'static>(&self) -> Option<&T> {
        self.siblings
            .before
            .iter()
            .chain(self.siblings.after)
            .find_map(|b| b.as_any().downcast_ref::<T>())
    }

    pub fn sibling_kind(&self, kind: BehaviorKind) -> Option<&dyn Behavior> {
        self.siblings
            .before
            .iter()
            .chain(self.siblings.after)
            .find(|b| b.kind() == kind)
            .map(|b| &**b)
    }

    /// Resolve a species name against the registry.
    pub fn species(&self, name: &str) -> Result<SpeciesIndex, BehaviorError> {
        self.molecules
            .index_of(name)
            .ok_or_else(|| BehaviorError::MissingSpecies(name.to_owned()))
    }
}

// ---------------------------------------------------------------------------
// BehaviorSet
// ---------------------------------------------------------------------------

/// Ordered behaviors of one agent, at most one per kind.
#[derive(Default)]
pub struct BehaviorSet {
    items: Vec<Box<dyn Behavior>>,
}

impl BehaviorSet {
    /// Attach `behavior`, replacing (in place) any existing one of the same
    /// kind. Returns the replaced behavior.
    pub fn attach(&mut self, behavior: Box<dyn Behavior>) -> Option<Box<dyn Behavior>> {
        match self.items.iter().position(|b| b.kind() == behavior.kind()) {
            Some(slot) => Some(std::mem::replace(&mut self.items[slot], behavior)),
            None => {
                self.items.push(behavior);
                None
            }
        }
    }

    pub fn get<T: Behavior + 'static>(&self) -> Option<&T> {
        self.items
            .iter()
            .find_map(|b| b.as_any().downcast_ref::<T>())
    }

    pub fn kinds(&self) -> impl Iterator<Item = BehaviorKind> + '_ {
        self.items.iter().map(|b| b.kind())
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Run every behavior in attachment order, stopping at the first error.
    pub(crate) fn update_all(
        &mut self,
        agent: &mut Agent,
        voxel: &Voxel,
        molecules: &MoleculeTable,
        timestep: f64,
    ) -> Result<(), BehaviorError> {
        for i in 0..self.items.len() {
            let (before, rest) = self.items.split_at_mut(i);
            let Some((current, after)) = rest.split_first_mut() else {
                break;
            };
            let mut host = HostContext {
                agent: &mut *agent,
                voxel,
                molecules,
                timestep,
                siblings: Siblings {
                    before: &*before,
                    after: &*after,
                },
            };
            current.update(&mut host)?;
        }
        Ok(())
    }
}

impl Clone for BehaviorSet {
    fn clone(&self) -> Self {
        Self {
            items: self.items.iter().map(|b| b.clone_boxed()).collect(),
        }
    }
}

impl fmt::Debug for BehaviorSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.kinds()).finish()
    }
}

// ---------------------------------------------------------------------------
// Built-in behaviors
// ---------------------------------------------------------------------------

/// First-order growth of one mass component: `dm = rate * m * dt`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Growth {
    pub rate: f64,
    #[serde(default = "default_component")]
    pub component: String,
}

impl Behavior for Growth {
    fn kind(&self) -> BehaviorKind {
        BehaviorKind::Growth
    }

    fn update(&mut self, host: &mut HostContext<'_>) -> Result<(), BehaviorError> {
        let mass = host
            .agent
            .mass(&self.component)
            .ok_or_else(|| BehaviorError::MissingMass(self.component.clone()))?;
        let grown = mass + self.rate * mass * host.timestep;
        if !grown.is_finite() {
            return Err(BehaviorError::NonFinite("mass"));
        }
        host.agent.set_mass(&self.component, grown.max(0.0));
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn clone_boxed(&self) -> Box<dyn Behavior> {
        Box::new(self.clone())
    }
}

/// Constant release of a species into the host's voxel.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Secretion {
    pub species: String,
    /// Amount released per unit time.
    pub rate: f64,
    /// Cumulative amount released by this host.
    #[serde(default, skip_serializing)]
    pub released: f64,
}

impl Behavior for Secretion {
    fn kind(&self) -> BehaviorKind {
        BehaviorKind::Secretion
    }

    fn update(&mut self, host: &mut HostContext<'_>) -> Result<(), BehaviorError> {
        let species = host.species(&self.species)?;
        let amount = self.rate * host.timestep;
        host.voxel.apply_delta(species, amount);
        self.released += amount;
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn clone_boxed(&self) -> Box<dyn Behavior> {
        Box::new(Self {
            released: 0.0,
            ..self.clone()
        })
    }
}

/// Saturating consumption of a species from the host's voxel, converted to
/// biomass by a yield coefficient.
///
/// The concentration removed per step is
/// `max_rate * c / (half_saturation + c) * dt`; the host gains
/// `removed * voxel_volume * yield_coefficient` of `component`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Uptake {
    pub species: String,
    pub max_rate: f64,
    pub half_saturation: f64,
    pub yield_coefficient: f64,
    #[serde(default = "default_component")]
    pub component: String,
    /// Concentration removed during the most recent update.
    #[serde(default, skip_serializing)]
    pub last_uptake: f64,
}

impl Behavior for Uptake {
    fn kind(&self) -> BehaviorKind {
        BehaviorKind::Uptake
    }

    fn update(&mut self, host: &mut HostContext<'_>) -> Result<(), BehaviorError> {
        let species = host.species(&self.species)?;
        let mass = host
            .agent
            .mass(&self.component)
            .ok_or_else(|| BehaviorError::MissingMass(self.component.clone()))?;
        let c = host.voxel.concentration(species);
        let denominator = self.half_saturation + c;
        let demand = if denominator > 0.0 {
            self.max_rate * c / denominator * host.timestep
        } else {
            0.0
        };
        if !demand.is_finite() {
            return Err(BehaviorError::NonFinite("uptake"));
        }
        let removed = host.voxel.consume(species, demand.max(0.0));
        self.last_uptake = removed;
        let gained = removed * host.voxel.volume() * self.yield_coefficient;
        host.agent.set_mass(&self.component, mass + gained);
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn clone_boxed(&self) -> Box<dyn Behavior> {
        Box::new(Self {
            last_uptake: 0.0,
            ..self.clone()
        })
    }
}

/// Persistent random walk: each step the heading turns by `turn_angle`
/// about a random perpendicular axis and the host is displaced by
/// `speed * dt` along it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Motility {
    pub speed: f64,
    pub turn_angle: f64,
    /// Unit heading; zero until the first update picks a random one.
    #[serde(default)]
    pub heading: Vec3,
}

impl Behavior for Motility {
    fn kind(&self) -> BehaviorKind {
        BehaviorKind::Motility
    }

    fn update(&mut self, host: &mut HostContext<'_>) -> Result<(), BehaviorError> {
        let rng = host.agent.rng_mut();
        self.heading = match self.heading.normalized() {
            Some(h) => rotate_perpendicular(h, self.turn_angle, rng),
            None => Vec3::random_unit(rng),
        };
        let step = self.heading * (self.speed * host.timestep);
        if !step.is_finite() {
            return Err(BehaviorError::NonFinite("displacement"));
        }
        host.agent.displace(step);
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn clone_boxed(&self) -> Box<dyn Behavior> {
        // Daughters pick their own heading.
        Box::new(Self {
            heading: Vec3::ZERO,
            ..self.clone()
        })
    }
}

fn default_component() -> String {
    BIOMASS.to_owned()
}

/// Serializable description of a built-in behavior.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BehaviorSpec {
    Growth(Growth),
    Secretion(Secretion),
    Uptake(Uptake),
    Motility(Motility),
}

impl BehaviorSpec {
    pub fn build(self) -> Box<dyn Behavior> {
        match self {
            BehaviorSpec::Growth(b) => Box::new(b),
            BehaviorSpec::Secretion(b) => Box::new(b),
            BehaviorSpec::Uptake(b) => Box::new(b),
            BehaviorSpec::Motility(b) => Box::new(b),
        }
    }
}
