// End-to-end scenarios for the step loop.
//
// Each test builds a small world through the public API, runs it for some
// steps and checks a physical or bookkeeping property: a lone agent stays
// put, overlapping agents separate without overshoot, a seeded voxel
// diffuses to a uniform field, division halves biomass with a 10% loss,
// voxel membership stays consistent, and concentrations stay non-negative.

use bnsim_sim::agent::{Agent, AgentKind, BIOMASS, EPS, EPS_DENSITY};
use bnsim_sim::arena::AgentId;
use bnsim_sim::behavior::{Growth, Motility, Secretion, Uptake};
use bnsim_sim::config::{BacteriumParams, WorldConfig};
use bnsim_sim::types::{CapsuleKind, LayerType, VoxelCoord};
use bnsim_sim::vecmath::Vec3;
use bnsim_sim::world::World;

fn config(workers: usize) -> WorldConfig {
    WorldConfig {
        extent: [100.0, 100.0, 100.0],
        voxel_counts: [10, 10, 10],
        species_count: 1,
        workers,
        timestep: 1.0,
        run_length: 100.0,
        diffusion: false,
        seed: 42,
        agent_capacity: 1024,
        ..WorldConfig::default()
    }
}

/// Every agent is listed in exactly one voxel, the one covering its
/// recorded cell and current position.
fn assert_membership_consistent(world: &World) {
    let lattice = world.lattice();
    let mut listed = vec![0usize; world.total_agent_count()];
    for voxel in lattice.voxels() {
        for id in voxel.members() {
            listed[id.index()] += 1;
            let agent = world.agent(id).unwrap();
            assert_eq!(agent.cell(), voxel.coord(), "agent {id} in wrong voxel");
        }
    }
    for (id, agent) in world.agents() {
        assert_eq!(listed[id.index()], 1, "agent {id} listed {} times", listed[id.index()]);
        if agent.is_active() {
            assert_eq!(lattice.cell_of(agent.position()), agent.cell());
        }
    }
}

#[test]
fn lone_agent_stays_put() {
    let mut world = World::new(config(2)).unwrap();
    let start = Vec3::new(50.0, 50.0, 50.0);
    let id = world.add_agent(Agent::new(start, 1.0));
    for _ in 0..100 {
        world.run_one_step();
    }
    assert_eq!(world.agent(id).unwrap().position(), start);
    assert_eq!(world.current_time(), 100.0);
}

#[test]
fn overlapping_pair_separates_without_overshoot() {
    let mut world = World::new(config(2)).unwrap();
    // Radii sum to 4.0, centres 3.0 apart: overlap of exactly 1.0.
    let a = world.add_agent(Agent::new(Vec3::new(48.5, 50.0, 50.0), 2.0));
    let b = world.add_agent(Agent::new(Vec3::new(51.5, 50.0, 50.0), 2.0));
    let reach = world.agent(a).unwrap().total_radius() + world.agent(b).unwrap().total_radius();
    let distance = |w: &World| {
        w.agent(a)
            .unwrap()
            .position()
            .distance(w.agent(b).unwrap().position())
    };

    let mut previous = distance(&world);
    for _ in 0..20 {
        world.run_one_step();
        let d = distance(&world);
        if previous < reach - 1e-9 {
            assert!(d > previous, "distance fell from {previous} to {d}");
        }
        assert!(d <= reach + 1e-9, "overshoot: {d} > {reach}");
        previous = d;
    }
    assert!(previous >= reach - 1e-9);
    // The pair moved apart symmetrically about its midpoint.
    let mid = (world.agent(a).unwrap().position() + world.agent(b).unwrap().position()) * 0.5;
    assert!((mid - Vec3::new(50.0, 50.0, 50.0)).length() < 1e-9);
}

#[test]
fn seeded_voxel_diffuses_to_uniform() {
    let mut world = World::new(WorldConfig {
        extent: [10.0, 10.0, 10.0],
        diffusion: true,
        ..config(2)
    })
    .unwrap();
    // k = dt / dx² · D = 0.1.
    world.add_molecule_species("S", 0, 0.1, 0.1, 0.0, 0.0).unwrap();
    for voxel in world.lattice().voxels() {
        voxel.set_layer(LayerType::Boundary);
    }
    world.voxel(0, 0, 0).unwrap().set_concentration(0, 1.0);

    for step in 0..2500 {
        let report = world.run_one_step();
        assert!(report.unstable_species.is_empty());
        if step % 250 == 0 {
            assert!((world.lattice().total_amount(0) - 1.0).abs() < 1e-9);
        }
    }
    let expected = 1.0 / 1000.0;
    for voxel in world.lattice().voxels() {
        let c = voxel.concentration(0);
        assert!((c - expected).abs() < 1e-7, "{} holds {c}", voxel.coord());
    }
}

#[test]
fn division_produces_one_daughter_with_ten_percent_loss() {
    let mut world = World::new(config(2)).unwrap();
    let parent = world.add_agent(Agent::bacterium(
        Vec3::new(50.0, 50.0, 50.0),
        2.1,
        BacteriumParams::default(),
    ));
    let before = world.agent(parent).unwrap().mass(BIOMASS).unwrap();

    let report = world.run_one_step();
    assert_eq!(report.births, 1);
    assert_eq!(world.total_agent_count(), 2);

    let parent_mass = world.agent(parent).unwrap().mass(BIOMASS).unwrap();
    let daughter_mass = world.agent(AgentId(1)).unwrap().mass(BIOMASS).unwrap();
    assert!((parent_mass - 0.45 * before).abs() < 1e-9);
    assert!((daughter_mass - 0.45 * before).abs() < 1e-9);
    assert!((before / (parent_mass + daughter_mass) - 1.0 / 0.9).abs() < 1e-12);

    // Both halves are now below the threshold: no further births.
    assert_eq!(world.run_one_step().births, 0);
}

#[test]
fn growing_colony_is_reproducible_across_worker_counts() {
    let run = |workers: usize| {
        let mut world = World::new(config(workers)).unwrap();
        for i in 0..6 {
            let x = 30.0 + 8.0 * i as f64;
            world.add_agent(
                Agent::bacterium(Vec3::new(x, 50.0, 50.0), 1.6, BacteriumParams::default())
                    .with_behavior(Box::new(Growth {
                        rate: 0.05,
                        component: BIOMASS.into(),
                    })),
            );
        }
        for _ in 0..40 {
            world.run_one_step();
        }
        world
            .agents()
            .map(|(_, a)| (a.id(), a.position(), a.mass(BIOMASS).unwrap()))
            .collect::<Vec<_>>()
    };
    let single = run(1);
    assert!(single.len() > 6, "colony never divided");
    assert_eq!(single, run(1));
    assert_eq!(single, run(3));
}

#[test]
fn membership_stays_consistent_under_motion() {
    let mut world = World::new(config(4)).unwrap();
    for i in 0..200 {
        let p = Vec3::new(
            5.0 + (i % 10) as f64 * 9.0,
            5.0 + ((i / 10) % 10) as f64 * 9.0,
            5.0 + (i / 100) as f64 * 40.0,
        );
        world.add_agent(Agent::new(p, 1.5).with_behavior(Box::new(Motility {
            speed: 6.0,
            turn_angle: 0.6,
            heading: Vec3::ZERO,
        })));
    }
    assert_membership_consistent(&world);
    for _ in 0..30 {
        world.run_one_step();
        assert_membership_consistent(&world);
    }
    let extent = world.config().extent;
    for (_, agent) in world.agents() {
        let p = agent.position();
        for axis in 0..3 {
            assert!((0.0..=extent[axis]).contains(&p.axis(axis)));
        }
    }
}

#[test]
fn concentrations_stay_non_negative_with_consumers() {
    let mut world = World::new(WorldConfig {
        diffusion: true,
        timestep: 0.5,
        ..config(3)
    })
    .unwrap();
    world.add_molecule_species("S", 0, 50.0, 25.0, 0.05, 0.1).unwrap();
    world.stratify_layers(40.0, 20.0);
    for voxel in world.lattice().voxels() {
        voxel.set_concentration(0, 0.01);
    }
    for i in 0..50 {
        let p = Vec3::new(10.0 + (i % 10) as f64 * 8.0, 10.0 + (i / 10) as f64 * 8.0, 5.0);
        let mut agent = Agent::new(p, 1.0).with_behavior(Box::new(Uptake {
            species: "S".into(),
            max_rate: 5.0,
            half_saturation: 0.001,
            yield_coefficient: 0.5,
            component: BIOMASS.into(),
            last_uptake: 0.0,
        }));
        if i % 7 == 0 {
            agent.attach_behavior(Box::new(Secretion {
                species: "S".into(),
                rate: 2.0,
                released: 0.0,
            }));
        }
        world.add_agent(agent);
    }
    for _ in 0..50 {
        world.run_one_step();
        for voxel in world.lattice().voxels() {
            assert!(voxel.concentration(0) >= 0.0);
        }
    }
}

#[test]
fn faulty_behavior_is_isolated_to_its_agent() {
    let mut world = World::new(config(2)).unwrap();
    let bad = world.add_agent(
        Agent::new(Vec3::new(20.0, 20.0, 20.0), 1.0).with_behavior(Box::new(Secretion {
            species: "unregistered".into(),
            rate: 1.0,
            released: 0.0,
        })),
    );
    let good = world.add_agent(
        Agent::new(Vec3::new(80.0, 80.0, 80.0), 1.0).with_behavior(Box::new(Growth {
            rate: 0.1,
            component: BIOMASS.into(),
        })),
    );
    let before = world.agent(good).unwrap().mass(BIOMASS).unwrap();
    let report = world.run_one_step();
    assert_eq!(report.faults, 1);
    assert!(world.agent(bad).unwrap().is_active());
    assert!(world.agent(good).unwrap().mass(BIOMASS).unwrap() > before);
}

#[test]
fn thick_capsule_is_shed_as_a_new_agent() {
    let mut world = World::new(config(2)).unwrap();
    let mut cell = Agent::bacterium(Vec3::new(50.0, 50.0, 50.0), 1.0, BacteriumParams::default());
    cell.add_mass_component(EPS, 3000.0 * EPS_DENSITY, EPS_DENSITY);
    let id = world.add_agent(cell);
    let report = world.run_one_step();
    assert_eq!(report.births, 1);
    assert_eq!(world.agent(id).unwrap().mass(EPS), Some(0.0));
    let capsule = world.agent(AgentId(1)).unwrap();
    assert_eq!(capsule.kind(), &AgentKind::Capsule(CapsuleKind::Protein));
    assert!((capsule.mass(EPS).unwrap() - 3000.0 * EPS_DENSITY).abs() < 1e-6);
    assert_membership_consistent(&world);
}

#[test]
fn dead_cells_stop_but_keep_their_voxel() {
    let mut world = World::new(config(2)).unwrap();
    let id = world.add_agent(Agent::bacterium(
        Vec3::new(50.0, 50.0, 50.0),
        0.1,
        BacteriumParams::default(),
    ));
    let report = world.run_one_step();
    assert_eq!(report.deaths, 1);
    let agent = world.agent(id).unwrap();
    assert!(!agent.is_active());
    assert_eq!(world.active_agent_count(), 0);
    let cell = agent.cell();
    assert!(world.voxel(cell.x, cell.y, cell.z).unwrap().contains_agent(id));
    assert_eq!(world.run_one_step().deaths, 0);
}

#[test]
fn dead_motile_cell_keeps_no_displacement() {
    let mut world = World::new(config(2)).unwrap();
    let id = world.add_agent(
        Agent::bacterium(Vec3::new(50.0, 50.0, 50.0), 0.1, BacteriumParams::default())
            .with_behavior(Box::new(Motility {
                speed: 1.0,
                turn_angle: 0.5,
                heading: Vec3::ZERO,
            })),
    );
    for _ in 0..2 {
        world.run_one_step();
    }
    let agent = world.agent(id).unwrap();
    assert!(!agent.is_active());
    assert_eq!(agent.pending_displacement(), Vec3::ZERO);
    assert_eq!(agent.position(), Vec3::new(50.0, 50.0, 50.0));
}

#[test]
fn shove_ignores_edge_neighbour_voxels() {
    let mut world = World::new(config(2)).unwrap();
    // Overlapping, but in cells (4, 4, 5) and (5, 5, 5), which share only
    // an edge.
    let start_a = Vec3::new(44.0, 44.0, 50.0);
    let start_b = Vec3::new(46.0, 46.0, 50.0);
    let a = world.add_agent(Agent::new(start_a, 2.0));
    let b = world.add_agent(Agent::new(start_b, 2.0));
    assert_eq!(world.agent(a).unwrap().cell(), VoxelCoord::new(4, 4, 5));
    assert_eq!(world.agent(b).unwrap().cell(), VoxelCoord::new(5, 5, 5));
    world.run_one_step();
    assert_eq!(world.agent(a).unwrap().position(), start_a);
    assert_eq!(world.agent(b).unwrap().position(), start_b);
}

#[test]
fn shove_resolves_overlap_across_a_face() {
    let mut world = World::new(config(2)).unwrap();
    let a = world.add_agent(Agent::new(Vec3::new(44.0, 50.0, 50.0), 2.0));
    let b = world.add_agent(Agent::new(Vec3::new(46.0, 50.0, 50.0), 2.0));
    assert_eq!(world.agent(a).unwrap().cell(), VoxelCoord::new(4, 5, 5));
    assert_eq!(world.agent(b).unwrap().cell(), VoxelCoord::new(5, 5, 5));
    let reach = world.agent(a).unwrap().total_radius() + world.agent(b).unwrap().total_radius();
    world.run_one_step();
    let pa = world.agent(a).unwrap().position();
    let pb = world.agent(b).unwrap().position();
    assert!((pa.distance(pb) - reach).abs() < 1e-9);
    assert!(pa.x < 44.0 && pb.x > 46.0);
    assert_eq!((pa.y, pa.z), (50.0, 50.0));
}

#[test]
fn run_stops_at_run_length() {
    let mut world = World::new(WorldConfig {
        run_length: 25.0,
        timestep: 0.5,
        ..config(2)
    })
    .unwrap();
    world.add_agent(Agent::new(Vec3::new(50.0, 50.0, 50.0), 1.0));
    let summary = world.run();
    assert_eq!(summary.steps, 50);
    assert_eq!(summary.time, 25.0);
    assert_eq!(summary.agents, 1);
}
