//! History management across steps: irreversibility of the fracture driving
//! energy and idempotent commits.

use pfem_core::{
    AssemblyOptions, BcValue, BoundaryConditions, DirichletBc, ElementBlock, FeProblem,
    KernelKind, MaterialKind, MaterialModel, MaterialParams, Mesh, NativeLu, NonlinearSolver,
    QpState, SolverConfig, TimeCoefficients,
};

/// Plate clamped on the left, right edge displaced by `right`
fn plate(kernel: KernelKind, material: MaterialModel, right: BcValue) -> FeProblem {
    let mesh = Mesh::rectangle(4, 2, 1.0, 0.5);
    let mut bcs = BoundaryConditions::new();
    bcs.fix_nodes(&mesh.nodes_where(|x| x[0] < 1e-12), "ux");
    bcs.fix_nodes(&[0], "uy");
    for node in mesh.nodes_where(|x| (x[0] - 1.0).abs() < 1e-12) {
        bcs.add_dirichlet(DirichletBc::new(node, "ux", right));
    }
    FeProblem::new(
        mesh,
        vec![ElementBlock::new("plate", kernel, material, 1.0)],
        bcs,
        AssemblyOptions::default(),
    )
    .expect("plate setup")
}

fn scalar(states: &[QpState], name: &str) -> Vec<f64> {
    states
        .iter()
        .map(|s| s.scalar(name).expect("history variable"))
        .collect()
}

fn advance(problem: &mut FeProblem, solver: &NonlinearSolver, time: f64, dt: f64) {
    let coeffs = TimeCoefficients::backward_euler(dt);
    problem.prepare_step(time);
    let report = problem.solve_step(solver, time, coeffs).expect("newton");
    assert!(report.converged(), "step at t={time} did not converge: {report:?}");
    problem.accept_step(dt, coeffs).expect("commit");
}

#[test]
fn fracture_history_never_decreases() {
    let material = MaterialModel::new(
        MaterialKind::PhaseFieldFracture,
        &MaterialParams::from_pairs(&[
            ("E", 10.0),
            ("nu", 0.3),
            ("Gc", 1.0),
            ("L", 0.1),
            ("viscosity", 0.1),
        ]),
    )
    .expect("material");
    // load at t = 0, unload to zero at t = 1
    let mut problem = plate(
        KernelKind::PhaseField,
        material,
        BcValue::Linear {
            start: 0.02,
            slope: -0.02,
        },
    );
    problem.initialize().expect("initialize");
    let solver = NonlinearSolver::new(SolverConfig::default(), Box::new(NativeLu));

    let initial = scalar(problem.committed_history(), "history");
    assert!(initial.iter().any(|&h| h > 0.0));

    let mut previous = initial;
    let mut peak = Vec::new();
    for step in 1..=4 {
        advance(&mut problem, &solver, 0.25 * step as f64, 0.25);
        let current = scalar(problem.committed_history(), "history");
        for (qp, (new, old)) in current.iter().zip(&previous).enumerate() {
            assert!(new >= old, "step {step}, point {qp}: {new} < {old}");
        }
        if step == 1 {
            peak = current.clone();
        }
        previous = current;
    }
    // the load only decreases after the first step
    assert_eq!(previous, peak);
}

#[test]
fn repeated_commit_leaves_history_unchanged() {
    let material = MaterialModel::new(
        MaterialKind::J2Plasticity,
        &MaterialParams::from_pairs(&[
            ("E", 100.0),
            ("nu", 0.3),
            ("yield_stress", 0.5),
            ("hardening_modulus", 5.0),
        ]),
    )
    .expect("material");
    let mut problem = plate(
        KernelKind::Mechanics,
        material,
        BcValue::Ramp { slope: 0.02 },
    );
    problem.initialize().expect("initialize");
    let solver = NonlinearSolver::new(SolverConfig::default(), Box::new(NativeLu));
    advance(&mut problem, &solver, 1.0, 1.0);

    let eqp = scalar(problem.committed_history(), "eqp");
    assert!(eqp.iter().any(|&a| a > 0.0), "loading should yield");

    problem.commit_history().expect("first commit");
    let first = problem.committed_history().to_vec();
    problem.commit_history().expect("second commit");
    assert_eq!(problem.committed_history(), first.as_slice());
}

#[test]
fn failed_step_keeps_committed_state() {
    let material = MaterialModel::new(
        MaterialKind::J2Plasticity,
        &MaterialParams::from_pairs(&[
            ("E", 100.0),
            ("nu", 0.3),
            ("yield_stress", 0.5),
        ]),
    )
    .expect("material");
    let mut problem = plate(KernelKind::Mechanics, material, BcValue::Ramp { slope: 0.02 });
    problem.initialize().expect("initialize");
    let before_u = problem.solution().u.clone();
    let before_history = problem.committed_history().to_vec();

    // a single Newton iteration cannot reach the plastic solution
    let solver = NonlinearSolver::new(
        SolverConfig {
            max_iters: 1,
            ..SolverConfig::default()
        },
        Box::new(NativeLu),
    );
    problem.prepare_step(1.0);
    let report = problem
        .solve_step(&solver, 1.0, TimeCoefficients::quasi_static())
        .expect("newton");
    assert!(!report.converged());
    problem.reject_step();

    assert_eq!(problem.solution().u, before_u);
    assert_eq!(problem.solution().u_new, before_u);
    assert_eq!(problem.committed_history(), before_history.as_slice());
}
