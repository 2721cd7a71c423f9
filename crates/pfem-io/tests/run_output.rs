//! A full run writing VTK frames and a checkpoint, then resumed from it.

use pfem_core::{
    AssemblyOptions, BcValue, BoundaryConditions, DirichletBc, ElementBlock, FeProblem,
    KernelKind, MaterialKind, MaterialModel, MaterialParams, MemoryOutput, Mesh, NativeLu,
    NonlinearSolver, OutputChain, SolverConfig, TimeMethod, TimeStepper, TimeSteppingConfig,
};
use pfem_io::{Checkpoint, CheckpointWriter, VtkWriter, load_checkpoint};
use std::fs;

fn plastic_plate() -> FeProblem {
    let material = MaterialModel::new(
        MaterialKind::J2Plasticity,
        &MaterialParams::from_pairs(&[
            ("E", 100.0),
            ("nu", 0.3),
            ("yield_stress", 1.0),
            ("hardening_modulus", 10.0),
        ]),
    )
    .expect("material");
    let mesh = Mesh::rectangle(2, 1, 2.0, 1.0);
    let left = mesh.nodes_where(|c| c[0] < 1e-12);
    let right = mesh.nodes_where(|c| (c[0] - 2.0).abs() < 1e-12);
    let mut bcs = BoundaryConditions::new();
    bcs.fix_nodes(&left, "ux");
    bcs.fix_nodes(&[0], "uy");
    for &node in &right {
        bcs.add_dirichlet(DirichletBc::new(node, "ux", BcValue::Ramp { slope: 0.06 }));
    }
    FeProblem::new(
        mesh,
        vec![ElementBlock::new("plate", KernelKind::Mechanics, material, 1.0)],
        bcs,
        AssemblyOptions::default(),
    )
    .expect("problem")
}

fn stepper(end_time: f64) -> TimeStepper {
    TimeStepper::new(
        TimeSteppingConfig {
            method: TimeMethod::Static,
            dt0: 0.25,
            end_time,
            project: true,
            ..TimeSteppingConfig::default()
        },
        NonlinearSolver::new(SolverConfig::default(), Box::new(NativeLu)),
    )
    .expect("stepper")
}

#[test]
fn vtk_files_and_collection_are_written() {
    let dir = tempfile::tempdir().expect("temp dir");
    let vtk = VtkWriter::new(dir.path().join("vtk"), "plate").expect("writer");
    let collection = vtk.collection_path();
    let mut chain = OutputChain::new();
    chain.push(Box::new(vtk));

    let mut problem = plastic_plate();
    stepper(1.0).run(&mut problem, &mut chain).expect("run");

    for step in 0..=4 {
        let path = dir.path().join("vtk").join(format!("plate_{step:05}.vtk"));
        let text = fs::read_to_string(&path).expect("step file");
        assert!(text.contains("SCALARS eqp double 1"), "{}", path.display());
    }
    let pvd = fs::read_to_string(collection).expect("collection");
    assert_eq!(pvd.matches("<DataSet ").count(), 5);
    assert!(pvd.contains("file=\"plate_00004.vtk\""));
}

#[test]
fn resume_from_checkpoint_reproduces_run() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("checkpoint.json");

    let mut reference = plastic_plate();
    stepper(1.0)
        .run(&mut reference, &mut MemoryOutput::new())
        .expect("reference run");

    let mut first = plastic_plate();
    let mut writer = CheckpointWriter::new(&path).with_metadata("job", "plate");
    stepper(0.5).run(&mut first, &mut writer).expect("first half");
    assert_eq!(writer.last_step(), Some(2));

    let checkpoint = load_checkpoint(&path).expect("load");
    assert_eq!(checkpoint.step, 2);
    assert_eq!(checkpoint.metadata["job"], "plate");
    assert_eq!(checkpoint.history.len(), first.committed_history().len());
    // plastic flow has started before the checkpoint
    assert!(checkpoint
        .history
        .iter()
        .any(|qp| qp.scalar("eqp").unwrap_or(0.0) > 0.0));

    let (step, time) = (checkpoint.step, checkpoint.time);
    let mut second = plastic_plate();
    checkpoint.apply(&mut second).expect("apply");
    let summary = stepper(1.0)
        .resume(&mut second, &mut MemoryOutput::new(), step, time)
        .expect("second half");
    assert_eq!(summary.steps, 4);

    let diff = (&second.solution().u - &reference.solution().u).amax();
    assert!(diff < 1e-9, "resumed solution differs by {diff}");
    let resumed = Checkpoint::capture(&second, 4, 1.0);
    let expected = Checkpoint::capture(&reference, 4, 1.0);
    for (a, b) in resumed.history.iter().zip(&expected.history) {
        let (ea, eb) = (a.scalar("eqp").unwrap_or(0.0), b.scalar("eqp").unwrap_or(0.0));
        assert!((ea - eb).abs() < 1e-9);
    }
}
