//! JSON job description: mesh generator, element blocks, conditions and the
//! solver settings of one run.

use std::fs;
use std::path::{Path, PathBuf};

use pfem_core::{
    AssemblyOptions, BcValue, BoundaryConditions, DirichletBc, EdgeLoad, ElementBlock, FeProblem,
    FemError,
    KernelKind, LinearSolverKind, MaterialModel, MaterialSpec, Mesh, NodalLoad, NonlinearSolver,
    Result, SolverConfig, TimeStepper, TimeSteppingConfig, make_solver,
};
use serde::Deserialize;

/// Structured mesh generator
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MeshSpec {
    Line { elements: usize, length: f64 },
    Rectangle { nx: usize, ny: usize, lx: f64, ly: f64 },
}

impl MeshSpec {
    pub fn generate(&self) -> Result<Mesh> {
        match *self {
            MeshSpec::Line { elements, length } => {
                if elements == 0 || length <= 0.0 {
                    return Err(FemError::Config(format!(
                        "line mesh needs elements > 0 and length > 0, got {elements} and {length}"
                    )));
                }
                Ok(Mesh::line(elements, length))
            }
            MeshSpec::Rectangle { nx, ny, lx, ly } => {
                if nx == 0 || ny == 0 || lx <= 0.0 || ly <= 0.0 {
                    return Err(FemError::Config(format!(
                        "rectangle mesh needs positive divisions and sizes, got {nx}x{ny} on {lx}x{ly}"
                    )));
                }
                Ok(Mesh::rectangle(nx, ny, lx, ly))
            }
        }
    }
}

/// Axis-aligned box; missing bounds are open
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Region {
    pub x_min: Option<f64>,
    pub x_max: Option<f64>,
    pub y_min: Option<f64>,
    pub y_max: Option<f64>,
}

impl Region {
    const TOL: f64 = 1e-9;

    pub fn contains(&self, p: &[f64; 3]) -> bool {
        let above = |v: f64, bound: Option<f64>| bound.is_none_or(|b| v >= b - Self::TOL);
        let below = |v: f64, bound: Option<f64>| bound.is_none_or(|b| v <= b + Self::TOL);
        above(p[0], self.x_min)
            && below(p[0], self.x_max)
            && above(p[1], self.y_min)
            && below(p[1], self.y_max)
    }
}

fn default_section() -> f64 {
    1.0
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BlockSpec {
    pub name: String,
    pub kernel: KernelKind,
    pub material: MaterialSpec,
    #[serde(default = "default_section")]
    pub section: f64,
    /// Elements whose centroid lies in the region join this block; without a
    /// region the block only holds elements no other block claims.
    #[serde(default)]
    pub region: Option<Region>,
}

/// Condition on every node inside a region
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RegionCondition {
    pub region: Region,
    pub field: String,
    pub value: BcValue,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct OutputSpec {
    /// Relative paths are taken from the job file's directory
    pub dir: PathBuf,
    pub vtk: bool,
    pub checkpoint: bool,
    pub report: bool,
}

impl Default for OutputSpec {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("output"),
            vtk: true,
            checkpoint: false,
            report: true,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_name() -> String {
    "job".to_string()
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Job {
    #[serde(default = "default_name")]
    pub name: String,
    pub mesh: MeshSpec,
    pub blocks: Vec<BlockSpec>,
    /// Node-addressed conditions
    #[serde(default)]
    pub boundary_conditions: BoundaryConditions,
    #[serde(default)]
    pub dirichlet_regions: Vec<RegionCondition>,
    #[serde(default)]
    pub load_regions: Vec<RegionCondition>,
    /// Load per unit length on the boundary edges inside each region
    #[serde(default)]
    pub edge_load_regions: Vec<RegionCondition>,
    #[serde(default)]
    pub solver: SolverConfig,
    #[serde(default)]
    pub linear_solver: LinearSolverKind,
    #[serde(default)]
    pub time_stepping: TimeSteppingConfig,
    #[serde(default)]
    pub output: OutputSpec,
    #[serde(default = "default_true")]
    pub parallel: bool,
    /// Checkpoint to resume from
    #[serde(default)]
    pub restart: Option<PathBuf>,
    #[serde(skip)]
    pub base_dir: PathBuf,
}

impl Job {
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| FemError::Config(format!("invalid job: {e}")))
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .map_err(|e| FemError::Io(format!("{}: {e}", path.display())))?;
        let mut job = Self::from_json(&text)?;
        job.base_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
        Ok(job)
    }

    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }

    pub fn output_dir(&self) -> PathBuf {
        self.resolve(&self.output.dir)
    }

    pub fn mesh(&self) -> Result<Mesh> {
        let mut mesh = self.mesh.generate()?;
        for (index, block) in self.blocks.iter().enumerate() {
            if let Some(region) = &block.region {
                mesh.assign_block(index, |c| region.contains(c));
            }
        }
        Ok(mesh)
    }

    pub fn element_blocks(&self) -> Result<Vec<ElementBlock>> {
        if self.blocks.is_empty() {
            return Err(FemError::Config("job defines no element blocks".into()));
        }
        self.blocks
            .iter()
            .map(|spec| {
                let material = MaterialModel::from_spec(&spec.material)
                    .map_err(|e| FemError::Config(format!("block '{}': {e}", spec.name)))?;
                Ok(ElementBlock::new(&spec.name, spec.kernel, material, spec.section))
            })
            .collect()
    }

    /// Node conditions with the region conditions expanded, region ones last.
    pub fn boundary_conditions(&self, mesh: &Mesh) -> Result<BoundaryConditions> {
        let mut bcs = self.boundary_conditions.clone();
        for cond in &self.dirichlet_regions {
            for node in region_nodes(mesh, cond)? {
                bcs.add_dirichlet(DirichletBc::new(node, &cond.field, cond.value));
            }
        }
        for cond in &self.load_regions {
            for node in region_nodes(mesh, cond)? {
                bcs.add_load(NodalLoad::new(node, &cond.field, cond.value));
            }
        }
        if !self.edge_load_regions.is_empty() {
            let boundary = mesh.boundary_edges();
            for cond in &self.edge_load_regions {
                let inside = |n: usize| cond.region.contains(&mesh.nodes[n].coords);
                let edges: Vec<_> = boundary
                    .iter()
                    .filter(|&&[a, b]| inside(a) && inside(b))
                    .collect();
                if edges.is_empty() {
                    return Err(FemError::Config(format!(
                        "region {:?} for field '{}' contains no boundary edges",
                        cond.region, cond.field
                    )));
                }
                for &&nodes in &edges {
                    bcs.add_edge_load(EdgeLoad::new(nodes, &cond.field, cond.value));
                }
            }
        }
        Ok(bcs)
    }

    pub fn build(&self) -> Result<FeProblem> {
        let mesh = self.mesh()?;
        let blocks = self.element_blocks()?;
        let bcs = self.boundary_conditions(&mesh)?;
        FeProblem::new(
            mesh,
            blocks,
            bcs,
            AssemblyOptions {
                parallel: self.parallel,
            },
        )
    }

    pub fn time_stepper(&self) -> Result<TimeStepper> {
        let solver = NonlinearSolver::new(self.solver.clone(), make_solver(self.linear_solver));
        TimeStepper::new(self.time_stepping.clone(), solver)
    }
}

fn region_nodes(mesh: &Mesh, cond: &RegionCondition) -> Result<Vec<usize>> {
    let nodes = mesh.nodes_where(|c| cond.region.contains(c));
    if nodes.is_empty() {
        return Err(FemError::Config(format!(
            "region {:?} for field '{}' contains no nodes",
            cond.region, cond.field
        )));
    }
    Ok(nodes)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PLATE: &str = r#"{
        "name": "plate",
        "mesh": { "type": "rectangle", "nx": 4, "ny": 2, "lx": 2.0, "ly": 1.0 },
        "blocks": [
            { "name": "matrix", "kernel": "Mechanics",
              "material": { "model": "LinearElastic", "params": { "E": 100.0, "nu": 0.3 } } },
            { "name": "inclusion", "kernel": "Mechanics",
              "material": { "model": "NeoHookean", "params": { "E": 200.0, "nu": 0.3 } },
              "region": { "x_min": 1.0 } }
        ],
        "dirichlet_regions": [
            { "region": { "x_max": 0.0 }, "field": "ux", "value": { "Constant": 0.0 } },
            { "region": { "x_max": 0.0, "y_max": 0.0 }, "field": "uy", "value": { "Constant": 0.0 } },
            { "region": { "x_min": 2.0 }, "field": "ux", "value": { "Ramp": { "slope": 0.01 } } }
        ],
        "time_stepping": { "dt0": 0.5, "end_time": 1.0, "method": "Static" },
        "output": { "vtk": false }
    }"#;

    #[test]
    fn plate_job_builds() {
        let job = Job::from_json(PLATE).unwrap();
        assert_eq!(job.name, "plate");
        assert!(job.parallel);
        assert!(!job.output.vtk);
        assert!(job.output.report);
        assert_eq!(job.solver, SolverConfig::default());

        let mesh = job.mesh().unwrap();
        let in_inclusion = mesh.elements.iter().filter(|e| e.block == 1).count();
        assert_eq!(in_inclusion, 4);

        let bcs = job.boundary_conditions(&mesh).unwrap();
        // 3 left ux, 1 corner uy, 3 right ux
        assert_eq!(bcs.dirichlet.len(), 7);

        let problem = job.build().unwrap();
        assert_eq!(problem.num_dofs(), 2 * 15);
        assert_eq!(problem.boundary_conditions().constrained_dofs().count(), 7);
        job.time_stepper().unwrap();
    }

    #[test]
    fn edge_load_regions_pick_boundary_edges() {
        let text = PLATE.replace(
            r#""time_stepping""#,
            r#""edge_load_regions": [
                { "region": { "x_min": 2.0 }, "field": "ux", "value": { "Constant": 3.0 } }
            ],
            "time_stepping""#,
        );
        let job = Job::from_json(&text).unwrap();
        let mesh = job.mesh().unwrap();
        let bcs = job.boundary_conditions(&mesh).unwrap();
        // right side x = 2 of a 4 × 2 mesh: nodes 4-9 and 9-14
        let mut edges: Vec<_> = bcs.edge_loads.iter().map(|l| l.nodes).collect();
        edges.sort();
        assert_eq!(edges, vec![[4, 9], [9, 14]]);

        let problem = job.build().unwrap();
        let f = problem.boundary_conditions().load_vector(problem.num_dofs(), 0.0);
        assert!((f.sum() - 3.0).abs() < 1e-12);

        // interior box: its only edge is shared by two elements
        let mut job = job;
        job.edge_load_regions[0].region = Region {
            x_min: Some(1.0),
            x_max: Some(1.5),
            y_min: Some(0.25),
            y_max: Some(0.75),
        };
        assert!(matches!(job.boundary_conditions(&mesh), Err(FemError::Config(_))));
    }

    #[test]
    fn empty_region_is_rejected() {
        let text = PLATE.replace(r#""x_min": 2.0"#, r#""x_min": 5.0"#);
        let job = Job::from_json(&text).unwrap();
        assert!(matches!(job.build(), Err(FemError::Config(_))));
    }

    #[test]
    fn bad_material_names_the_block() {
        let text = PLATE.replace(r#""E": 200.0, "#, "");
        let job = Job::from_json(&text).unwrap();
        match job.build() {
            Err(FemError::Config(msg)) => assert!(msg.contains("inclusion"), "{msg}"),
            Err(other) => panic!("unexpected error {other}"),
            Ok(_) => panic!("missing E accepted"),
        }
    }

    #[test]
    fn unknown_mesh_type_is_a_config_error() {
        let text = PLATE.replace("rectangle", "sphere");
        assert!(matches!(Job::from_json(&text), Err(FemError::Config(_))));
    }

    #[test]
    fn relative_paths_follow_the_job_file() {
        let mut job = Job::from_json(PLATE).unwrap();
        job.base_dir = PathBuf::from("/jobs/plate");
        assert_eq!(job.output_dir(), PathBuf::from("/jobs/plate/output"));
        assert_eq!(job.resolve(Path::new("/tmp/cp.json")), PathBuf::from("/tmp/cp.json"));
    }
}
