// JSON run descriptions.
//
// A `RunSpec` bundles everything the headless runner needs to build a
// world: the `WorldConfig`, the species table, an optional height
// stratification of voxel layers, initial concentrations, and the seeded
// population with its behaviors. Every section except `config` may be
// omitted.
//
// Example:
//
//     {
//       "config": { "extent": [100, 100, 100], "voxel_counts": [10, 10, 10],
//                   "workers": 4, "timestep": 0.1, "run_length": 50 },
//       "species": [ { "name": "AHL", "index": 0,
//                      "diffusion_boundary": 10, "diffusion_biofilm": 5 } ],
//       "layers": { "boundary_thickness": 60, "biofilm_thickness": 20 },
//       "population": [
//         { "kind": "bacterium", "position": [50, 50, 5], "radius": 1.2,
//           "behaviors": [ { "type": "growth", "rate": 0.05 } ] }
//       ]
//     }

use crate::agent::{Agent, EPS, EPS_DENSITY};
use crate::behavior::BehaviorSpec;
use crate::config::{BacteriumParams, WorldConfig};
use crate::error::SimError;
use crate::molecule::MoleculeInfo;
use crate::types::{CapsuleKind, SpeciesIndex};
use crate::vecmath::Vec3;
use crate::world::World;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RunSpec {
    #[serde(default)]
    pub config: WorldConfig,
    #[serde(default)]
    pub species: Vec<MoleculeInfo>,
    #[serde(default)]
    pub layers: Option<Stratification>,
    #[serde(default)]
    pub initial: Vec<InitialConcentration>,
    #[serde(default)]
    pub population: Vec<AgentSpec>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Stratification {
    pub boundary_thickness: f64,
    pub biofilm_thickness: f64,
}

/// Starting concentration of one species, in one voxel or (with no
/// `voxel`) everywhere.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InitialConcentration {
    pub species: SpeciesIndex,
    pub value: f64,
    #[serde(default)]
    pub voxel: Option<[u32; 3]>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AgentTemplate {
    Particle,
    Bacterium {
        #[serde(default)]
        params: BacteriumParams,
    },
    Capsule {
        #[serde(default)]
        capsule: CapsuleKind,
    },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AgentSpec {
    #[serde(flatten)]
    pub template: AgentTemplate,
    pub position: [f64; 3],
    pub radius: f64,
    /// Extra capsule mass on top of the body built from `radius`.
    #[serde(default)]
    pub eps_mass: f64,
    #[serde(default)]
    pub behaviors: Vec<BehaviorSpec>,
}

impl AgentSpec {
    pub fn build(&self) -> Agent {
        let position = Vec3::new(self.position[0], self.position[1], self.position[2]);
        let mut agent = match &self.template {
            AgentTemplate::Particle => Agent::new(position, self.radius),
            AgentTemplate::Bacterium { params } => {
                Agent::bacterium(position, self.radius, *params)
            }
            AgentTemplate::Capsule { capsule } => Agent::capsule(position, *capsule, self.radius),
        };
        if self.eps_mass > 0.0 {
            let existing = agent.mass(EPS).unwrap_or(0.0);
            agent.add_mass_component(EPS, existing + self.eps_mass, EPS_DENSITY);
        }
        for behavior in &self.behaviors {
            agent.attach_behavior(behavior.clone().build());
        }
        agent
    }
}

impl RunSpec {
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

    /// Build a ready-to-run world.
    pub fn build(&self) -> Result<World, SimError> {
        let mut world = World::new(self.config.clone())?;
        for info in &self.species {
            world.register_species(info.clone())?;
        }
        if let Some(layers) = &self.layers {
            world.stratify_layers(layers.boundary_thickness, layers.biofilm_thickness);
        }
        for seed in &self.initial {
            match seed.voxel {
                Some([x, y, z]) => match world.voxel(x, y, z) {
                    Some(voxel) => voxel.set_concentration(seed.species, seed.value),
                    None => tracing::warn!(x, y, z, "initial concentration outside the lattice"),
                },
                None => {
                    for voxel in world.lattice().voxels() {
                        voxel.set_concentration(seed.species, seed.value);
                    }
                }
            }
        }
        for spec in &self.population {
            world.add_agent(spec.build());
        }
        tracing::info!(
            species = self.species.len(),
            agents = self.population.len(),
            "run description loaded"
        );
        Ok(world)
    }
}
