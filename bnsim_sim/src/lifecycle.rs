// Bacterial life cycle: division, capsule release and death.
//
// Run once per agent-phase update for every active bacterium, after its
// behaviors and before its shove. The checks run in a fixed order:
//
// 1. Division: a cell radius above `division_radius` scales every mass
//    component of the parent by `division_mass_fraction` and produces one
//    daughter with the same (scaled) composition, scattered within a
//    `placement_jitter` cube around the parent. With the default fraction
//    of 0.45 a tenth of the biomass is lost.
// 2. Capsule release: a capsule thicker than `capsule_release_thickness`
//    (total radius minus cell radius) is shed as a free `Capsule` agent
//    holding all of the parent's EPS mass; the parent's EPS drops to zero.
// 3. Death: a cell radius below `death_radius` deactivates the agent.
//
// New agents are not added to the world here. They are returned as
// `Birth` records and appended by the world after the agent phase, in
// (parent, order) order, so births never take part in the step that
// created them and their serials do not depend on thread scheduling.
//
// See also: `agent.rs` for the update that calls `advance()`,
// `world.rs` for where births are appended.

use crate::agent::{Agent, EPS, EPS_DENSITY, UpdateLog, sphere_radius};
use crate::arena::AgentId;
use crate::config::BacteriumParams;
use crate::types::CapsuleKind;
use crate::vecmath::Vec3;

/// An agent created during the agent phase, waiting to be appended.
#[derive(Clone, Debug)]
pub struct Birth {
    pub parent: AgentId,
    /// Position among this parent's births in the same step.
    pub order: u32,
    pub agent: Agent,
}

pub(crate) fn advance(
    agent: &mut Agent,
    id: AgentId,
    params: &BacteriumParams,
    log: &mut UpdateLog,
) {
    let mut order = 0;
    if agent.cell_radius() > params.division_radius {
        let daughter = divide(agent, params);
        log.births.push(Birth {
            parent: id,
            order,
            agent: daughter,
        });
        order += 1;
    }
    if let Some(capsule) = release_capsule(agent, params) {
        log.births.push(Birth {
            parent: id,
            order,
            agent: capsule,
        });
    }
    if agent.cell_radius() < params.death_radius {
        agent.deactivate();
        log.deaths += 1;
    }
}

/// Split `parent` and return the daughter.
pub fn divide(parent: &mut Agent, params: &BacteriumParams) -> Agent {
    parent.scale_masses(params.division_mass_fraction);
    parent.refresh_geometry();
    let offset = jitter(parent, params.placement_jitter);
    let mut daughter = parent.clone();
    daughter.prepare_for_birth(parent.position() + offset);
    daughter
}

/// Shed the parent's capsule if it has grown too thick.
pub fn release_capsule(parent: &mut Agent, params: &BacteriumParams) -> Option<Agent> {
    let thickness = parent.total_radius() - parent.cell_radius();
    if thickness <= params.capsule_release_thickness {
        return None;
    }
    let eps = parent.mass(EPS)?;
    if eps <= 0.0 {
        return None;
    }
    parent.set_mass(EPS, 0.0);
    parent.refresh_geometry();
    let offset = jitter(parent, params.placement_jitter);
    let radius = sphere_radius(eps / EPS_DENSITY);
    Some(Agent::capsule(
        parent.position() + offset,
        CapsuleKind::Protein,
        radius,
    ))
}

fn jitter(agent: &mut Agent, amplitude: f64) -> Vec3 {
    let rng = agent.rng_mut();
    Vec3::new(
        rng.centered(amplitude),
        rng.centered(amplitude),
        rng.centered(amplitude),
    )
}
