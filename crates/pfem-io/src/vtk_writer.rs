//! Legacy ASCII VTK output, one `.vtk` file per output step.
//!
//! Each file holds the mesh as an `UNSTRUCTURED_GRID`, every active field as
//! point data (`ux`/`uy` additionally as a `displacement` vector) and the
//! projected quadrature-point fields when the frame carries them. On
//! [`OutputWriter::finish`] a ParaView `.pvd` collection listing all steps
//! with their times is written next to the step files.

use crate::error::{IoError, Result};
use pfem_core::{OutputFrame, OutputWriter};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Writes one legacy VTK file per frame into an output directory
#[derive(Debug, Clone)]
pub struct VtkWriter {
    dir: PathBuf,
    prefix: String,
    /// (time, file name) of every written step
    written: Vec<(f64, String)>,
}

impl VtkWriter {
    /// Files are named `<prefix>_<step>.vtk` inside `dir`, which is created
    /// if missing.
    pub fn new(dir: impl AsRef<Path>, prefix: impl Into<String>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            prefix: prefix.into(),
            written: Vec::new(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Paths of the step files written so far
    pub fn files(&self) -> Vec<PathBuf> {
        self.written.iter().map(|(_, name)| self.dir.join(name)).collect()
    }

    pub fn collection_path(&self) -> PathBuf {
        self.dir.join(format!("{}.pvd", self.prefix))
    }

    fn file_name(&self, step: usize) -> String {
        format!("{}_{:05}.vtk", self.prefix, step)
    }

    /// Write one frame to `out`
    pub fn write_frame<W: Write>(out: &mut W, frame: &OutputFrame) -> Result<()> {
        let mesh = frame.mesh;
        writeln!(out, "# vtk DataFile Version 3.0")?;
        writeln!(out, "pfem step {} t={:.9e}", frame.step, frame.time)?;
        writeln!(out, "ASCII")?;
        writeln!(out, "DATASET UNSTRUCTURED_GRID")?;

        writeln!(out, "POINTS {} double", mesh.nodes.len())?;
        for node in &mesh.nodes {
            let [x, y, z] = node.coords;
            writeln!(out, "{x:.12e} {y:.12e} {z:.12e}")?;
        }

        let size: usize = mesh.elements.iter().map(|e| 1 + e.nodes.len()).sum();
        writeln!(out, "CELLS {} {}", mesh.elements.len(), size)?;
        for element in &mesh.elements {
            write!(out, "{}", element.nodes.len())?;
            for node in &element.nodes {
                write!(out, " {node}")?;
            }
            writeln!(out)?;
        }
        writeln!(out, "CELL_TYPES {}", mesh.elements.len())?;
        for element in &mesh.elements {
            writeln!(out, "{}", element.element_type.vtk_cell_type())?;
        }

        writeln!(out, "POINT_DATA {}", mesh.nodes.len())?;
        let fields = frame.dof_map.field_names();
        for field in fields {
            write_scalars(out, field, &frame.nodal_values(field))?;
        }
        if fields.iter().any(|f| f == "ux") {
            let ux = frame.nodal_values("ux");
            let uy = frame.nodal_values("uy");
            writeln!(out, "VECTORS displacement double")?;
            for (x, y) in ux.iter().zip(&uy) {
                writeln!(out, "{x:.12e} {y:.12e} 0")?;
            }
        }
        if let Some(projected) = frame.projected {
            for (name, values) in projected {
                if values.len() != mesh.nodes.len() {
                    return Err(IoError::InvalidData(format!(
                        "projected field {name} has {} values for {} nodes",
                        values.len(),
                        mesh.nodes.len()
                    )));
                }
                write_scalars(out, name, values)?;
            }
        }
        Ok(())
    }

    fn write_collection(&self) -> Result<()> {
        let mut out = BufWriter::new(File::create(self.collection_path())?);
        writeln!(out, "<?xml version=\"1.0\"?>")?;
        writeln!(out, "<VTKFile type=\"Collection\" version=\"0.1\">")?;
        writeln!(out, "  <Collection>")?;
        for (time, name) in &self.written {
            writeln!(
                out,
                "    <DataSet timestep=\"{time:.9e}\" part=\"0\" file=\"{name}\"/>"
            )?;
        }
        writeln!(out, "  </Collection>")?;
        writeln!(out, "</VTKFile>")?;
        out.flush()?;
        Ok(())
    }
}

fn write_scalars<W: Write>(out: &mut W, name: &str, values: &[f64]) -> Result<()> {
    writeln!(out, "SCALARS {name} double 1")?;
    writeln!(out, "LOOKUP_TABLE default")?;
    for v in values {
        writeln!(out, "{v:.12e}")?;
    }
    Ok(())
}

impl OutputWriter for VtkWriter {
    fn write(&mut self, frame: &OutputFrame) -> pfem_core::Result<()> {
        let name = self.file_name(frame.step);
        let path = self.dir.join(&name);
        log::debug!("writing {}", path.display());
        let mut out = BufWriter::new(File::create(&path)?);
        Self::write_frame(&mut out, frame)?;
        out.flush()?;
        self.written.push((frame.time, name));
        Ok(())
    }

    fn finish(&mut self) -> pfem_core::Result<()> {
        self.write_collection()?;
        log::info!(
            "wrote {} VTK files and {}",
            self.written.len(),
            self.collection_path().display()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::DVector;
    use pfem_core::{
        DofMap, ElementBlock, KernelKind, MaterialKind, MaterialModel, MaterialParams, Mesh,
        ProjectedFields,
    };

    fn plate() -> (Mesh, DofMap) {
        let mesh = Mesh::rectangle(2, 1, 2.0, 1.0);
        let material = MaterialModel::new(
            MaterialKind::LinearElastic,
            &MaterialParams::from_pairs(&[("E", 1.0), ("nu", 0.3)]),
        )
        .expect("material");
        let blocks = [ElementBlock::new("plate", KernelKind::Mechanics, material, 1.0)];
        let map = DofMap::build(&mesh, &blocks).expect("dof map");
        (mesh, map)
    }

    #[test]
    fn frame_layout() {
        let (mesh, map) = plate();
        let u = DVector::from_iterator(12, (0..12).map(|i| i as f64));
        let v = DVector::zeros(12);
        let mut projected = ProjectedFields::new();
        projected.insert("sxx".into(), vec![1.0; 6]);
        let frame = OutputFrame {
            step: 2,
            time: 0.5,
            mesh: &mesh,
            dof_map: &map,
            solution: &u,
            rate: &v,
            projected: Some(&projected),
            history: &[],
        };
        let mut buf = Vec::new();
        VtkWriter::write_frame(&mut buf, &frame).expect("write");
        let text = String::from_utf8(buf).expect("utf8");

        assert!(text.starts_with("# vtk DataFile Version 3.0\n"));
        assert!(text.contains("POINTS 6 double"));
        assert!(text.contains("CELLS 2 10"));
        assert!(text.contains("CELL_TYPES 2\n9\n9\n"));
        assert!(text.contains("POINT_DATA 6"));
        assert!(text.contains("SCALARS ux double 1"));
        assert!(text.contains("SCALARS uy double 1"));
        assert!(text.contains("VECTORS displacement double"));
        assert!(text.contains("SCALARS sxx double 1"));
    }

    #[test]
    fn projected_length_is_checked() {
        let (mesh, map) = plate();
        let u = DVector::zeros(12);
        let mut projected = ProjectedFields::new();
        projected.insert("d".into(), vec![0.0; 2]);
        let frame = OutputFrame {
            step: 0,
            time: 0.0,
            mesh: &mesh,
            dof_map: &map,
            solution: &u,
            rate: &u,
            projected: Some(&projected),
            history: &[],
        };
        let err = VtkWriter::write_frame(&mut Vec::new(), &frame).expect_err("bad length");
        assert!(matches!(err, IoError::InvalidData(_)));
    }
}
