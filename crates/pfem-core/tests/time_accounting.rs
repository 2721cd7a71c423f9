//! Step counting and time bookkeeping of the fixed-step loop.

use pfem_core::{
    AssemblyOptions, BoundaryConditions, ElementBlock, FeProblem, InitialCondition, KernelKind,
    MaterialKind, MaterialModel, MaterialParams, MemoryOutput, Mesh, NativeLu, NonlinearSolver,
    SolverConfig, TimeStepper, TimeSteppingConfig,
};

fn diffusion_line() -> FeProblem {
    let material =
        MaterialModel::new(MaterialKind::Fick, &MaterialParams::from_pairs(&[("D", 1.0)]))
            .expect("material");
    let mut bcs = BoundaryConditions::new();
    bcs.add_initial_condition(InitialCondition {
        field: "c".into(),
        value: 1.0,
        nodes: Some(vec![0]),
    });
    FeProblem::new(
        Mesh::line(4, 1.0),
        vec![ElementBlock::new("c", KernelKind::Diffusion, material, 1.0)],
        bcs,
        AssemblyOptions::default(),
    )
    .expect("setup")
}

fn run(dt0: f64, end_time: f64, output_interval: usize) -> (usize, f64, Vec<(usize, f64)>) {
    let stepper = TimeStepper::new(
        TimeSteppingConfig {
            dt0,
            end_time,
            output_interval,
            ..TimeSteppingConfig::default()
        },
        NonlinearSolver::new(SolverConfig::default(), Box::new(NativeLu)),
    )
    .expect("stepper");
    let mut output = MemoryOutput::new();
    let summary = stepper
        .run(&mut diffusion_line(), &mut output)
        .expect("run");
    let frames = output.frames.iter().map(|f| (f.step, f.time)).collect();
    (summary.steps, summary.final_time, frames)
}

#[test]
fn step_count_is_floor_of_end_over_dt() {
    for (dt0, end_time, expected) in [
        (0.1, 1.0, 10),
        (0.3, 1.0, 3),
        (0.5, 2.5, 5),
        (0.25, 0.2, 0),
        (1.0 / 3.0, 1.0, 3),
    ] {
        let (steps, final_time, _) = run(dt0, end_time, 1);
        assert_eq!(steps, expected, "dt0 = {dt0}, end = {end_time}");
        assert!(
            (final_time - steps as f64 * dt0).abs() < 1e-12,
            "dt0 = {dt0}: final time {final_time}"
        );
    }
}

#[test]
fn output_at_step_zero_and_every_interval() {
    let (steps, _, frames) = run(0.1, 1.0, 4);
    assert_eq!(steps, 10);
    let expected: Vec<(usize, f64)> = vec![(0, 0.0), (4, 0.4), (8, 0.8)];
    assert_eq!(frames.len(), expected.len());
    for ((step, time), (es, et)) in frames.iter().zip(&expected) {
        assert_eq!(step, es);
        assert!((time - et).abs() < 1e-12);
    }
}
