//! Plane-strain plate pulled by a distributed load on one edge.

use pfem_core::{
    AssemblyOptions, BcValue, BoundaryConditions, EdgeLoad, ElementBlock, FeProblem, KernelKind,
    MaterialKind, MaterialModel, MaterialParams, MemoryOutput, Mesh, NativeLu, NonlinearSolver,
    SolverConfig, TimeMethod, TimeStepper, TimeSteppingConfig,
};

#[test]
fn uniform_edge_traction_gives_uniform_strain() {
    let (e, nu, thickness, q) = (100.0, 0.25, 0.5, 2.0);
    let (nx, ny, lx, ly) = (4, 3, 2.0, 1.0);
    let mesh = Mesh::rectangle(nx, ny, lx, ly);

    let mut bcs = BoundaryConditions::new();
    bcs.fix_nodes(&mesh.nodes_where(|x: &[f64; 3]| x[0] == 0.0), "ux");
    bcs.fix_nodes(&mesh.nodes_where(|x: &[f64; 3]| x[1] == 0.0), "uy");
    // right edge nodes sit at the end of each row
    for j in 0..ny {
        let lower = j * (nx + 1) + nx;
        bcs.add_edge_load(EdgeLoad::new([lower, lower + nx + 1], "ux", BcValue::Constant(q)));
    }

    let material = MaterialModel::new(
        MaterialKind::LinearElastic,
        &MaterialParams::from_pairs(&[("E", e), ("nu", nu)]),
    )
    .expect("material");
    let mut problem = FeProblem::new(
        mesh,
        vec![ElementBlock::new("plate", KernelKind::Mechanics, material, thickness)],
        bcs,
        AssemblyOptions::default(),
    )
    .expect("plate setup");
    TimeStepper::new(
        TimeSteppingConfig {
            method: TimeMethod::Static,
            dt0: 1.0,
            end_time: 1.0,
            ..TimeSteppingConfig::default()
        },
        NonlinearSolver::new(SolverConfig::default(), Box::new(NativeLu)),
    )
    .expect("stepper")
    .run(&mut problem, &mut MemoryOutput::new())
    .expect("run");

    // plane strain: σzz = ν σxx
    let sigma = q / thickness;
    let exx = (1.0 - nu * nu) * sigma / e;
    let eyy = -nu * (1.0 + nu) * sigma / e;
    let map = problem.dof_map();
    for node in &problem.mesh().nodes {
        let ux = problem.solution().u[map.dof(node.id, "ux").expect("ux dof")];
        let uy = problem.solution().u[map.dof(node.id, "uy").expect("uy dof")];
        assert!((ux - exx * node.x()).abs() < 1e-10, "node {}: ux {ux}", node.id);
        assert!((uy - eyy * node.y()).abs() < 1e-10, "node {}: uy {uy}", node.id);
    }
}
