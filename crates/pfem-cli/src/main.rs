use std::process::ExitCode;

use chrono::Utc;
use pfem_core::{FeProblem, FemError, OutputChain, RunSummary};
use pfem_io::{CheckpointWriter, JobReport, VtkWriter, load_checkpoint, write_report};

mod job;

use job::Job;

fn usage() {
    eprintln!("usage: pfem-cli run <job.json>");
    eprintln!("       pfem-cli check <job.json>");
}

/// Build the problem without running it and print its size.
fn check(path: &str) -> Result<(), FemError> {
    let job = Job::load(path)?;
    let problem = job.build()?;
    job.time_stepper()?;
    println!("job: {}", job.name);
    println!("nodes: {}", problem.mesh().num_nodes());
    println!("elements: {}", problem.mesh().elements.len());
    println!("fields: {}", problem.dof_map().field_names().join(", "));
    println!("dofs: {}", problem.num_dofs());
    println!("non_zeros: {}", problem.system().nnz());
    println!(
        "constrained_dofs: {}",
        problem.boundary_conditions().constrained_dofs().count()
    );
    Ok(())
}

fn integrate(job: &Job, problem: &mut FeProblem) -> Result<RunSummary, FemError> {
    let stepper = job.time_stepper()?;
    let out_dir = job.output_dir();

    let mut output = OutputChain::new();
    if job.output.vtk {
        output.push(Box::new(VtkWriter::new(&out_dir, &job.name)?));
    }
    if job.output.checkpoint {
        let writer = CheckpointWriter::new(out_dir.join(format!("{}.checkpoint.json", job.name)))
            .with_metadata("job", job.name.clone());
        output.push(Box::new(writer));
    }

    match &job.restart {
        Some(path) => {
            let checkpoint = load_checkpoint(job.resolve(path))?;
            let (step, time) = (checkpoint.step, checkpoint.time);
            log::info!("restarting from {} (step {step}, t = {time:.6e})", path.display());
            checkpoint.apply(problem)?;
            stepper.resume(problem, &mut output, step, time)
        }
        None => stepper.run(problem, &mut output),
    }
}

fn run(path: &str) -> Result<(), FemError> {
    let job = Job::load(path)?;
    let started = Utc::now();
    let mut problem = job.build()?;
    let outcome = integrate(&job, &mut problem);

    if job.output.report {
        let report = match &outcome {
            Ok(summary) => JobReport::success(&job.name, &problem, started, summary.clone()),
            Err(err) => JobReport::failure(&job.name, &problem, started, err),
        };
        let report_path = job.output_dir().join(format!("{}.summary.json", job.name));
        if let Err(err) = write_report(&report_path, &report) {
            log::error!("could not write {}: {err}", report_path.display());
        }
    }

    let summary = outcome?;
    println!(
        "{}: {} steps ({} cutbacks), t = {:.6e}, {} newton iterations",
        job.name, summary.steps, summary.cutbacks, summary.final_time, summary.total_newton_iterations
    );
    Ok(())
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() != 3 {
        usage();
        return ExitCode::from(2);
    }
    let result = match args[1].as_str() {
        "run" => run(&args[2]),
        "check" => check(&args[2]),
        _ => {
            usage();
            return ExitCode::from(2);
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            if let FemError::StepFailed { step, time, dt, .. } = &err {
                eprintln!("aborted at step {step}, t = {time:.6e}, dt = {dt:.6e}");
            }
            ExitCode::from(1)
        }
    }
}
