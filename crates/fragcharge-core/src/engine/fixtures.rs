//! Small molecules and stand-in tools shared by the engine and workflow tests.

use crate::core::io::pdb::PdbFile;
use crate::core::io::traits::StructureFile;
use crate::core::models::builder::StructureBuilder;
use crate::core::models::element::Element;
use crate::core::models::structure::Structure;
use crate::engine::error::ToolError;
use crate::engine::solver::{ChargeSolver, SolverJob};
use nalgebra::Point3;
use std::fmt::Write as _;
use std::sync::{Arc, Mutex};

/// Zigzag saturated chain of `carbons` carbons, each followed by its hydrogens.
///
/// Carbons sit at `(1.25 i, 0.89 (i mod 2), 0)`, giving 1.53 A C-C bonds and
/// 2.5 A between next-nearest carbons. Terminal carbons carry a third hydrogen.
pub(crate) fn alkane(carbons: usize) -> Structure {
    let mut builder = StructureBuilder::new();
    builder.start_residue("A", 1, None, "ALK", true);
    let mut serial = 1;
    let mut add = |builder: &mut StructureBuilder, name: String, element, p: Point3<f64>| {
        builder.add_atom(serial, &name, element, p).unwrap();
        serial += 1;
    };

    for i in 0..carbons {
        let c = Point3::new(1.25 * i as f64, 0.89 * (i % 2) as f64, 0.0);
        let s = if i % 2 == 0 { -1.0 } else { 1.0 };
        add(&mut builder, format!("C{}", i + 1), Element::C, c);
        add(
            &mut builder,
            format!("H{}A", i + 1),
            Element::H,
            Point3::new(c.x, c.y + s * 0.63, 0.77),
        );
        add(
            &mut builder,
            format!("H{}B", i + 1),
            Element::H,
            Point3::new(c.x, c.y + s * 0.63, -0.77),
        );
        if i == 0 {
            add(
                &mut builder,
                "H1C".to_string(),
                Element::H,
                Point3::new(c.x - 0.95, c.y - 0.45, 0.0),
            );
        }
        if i + 1 == carbons && i > 0 {
            add(
                &mut builder,
                format!("H{}C", i + 1),
                Element::H,
                Point3::new(c.x + 0.95, c.y + s * 0.45, 0.0),
            );
        }
    }
    builder.build()
}

/// Glycine zwitterion; every atom lies within 4.5 A of every other atom.
pub(crate) fn glycine() -> Structure {
    const ATOMS: [(&str, Element, [f64; 3]); 10] = [
        ("N", Element::N, [-1.90, 0.27, 0.0]),
        ("CA", Element::C, [-0.62, -0.45, 0.0]),
        ("C", Element::C, [0.58, 0.49, 0.0]),
        ("O", Element::O, [0.40, 1.73, 0.0]),
        ("OXT", Element::O, [1.72, -0.03, 0.0]),
        ("H1", Element::H, [-2.69, -0.38, 0.0]),
        ("H2", Element::H, [-1.96, 0.87, 0.82]),
        ("H3", Element::H, [-1.96, 0.87, -0.82]),
        ("HA2", Element::H, [-0.57, -1.10, 0.88]),
        ("HA3", Element::H, [-0.57, -1.10, -0.88]),
    ];
    let mut builder = StructureBuilder::new();
    builder.start_residue("A", 1, None, "GLY", false);
    for (i, (name, element, [x, y, z])) in ATOMS.into_iter().enumerate() {
        builder
            .add_atom(i + 1, name, element, Point3::new(x, y, z))
            .unwrap();
    }
    builder.build()
}

/// Empirical charges for [`glycine`], summing to -0.05.
pub(crate) const GLYCINE_CHARGES: [f64; 10] =
    [-0.30, -0.02, 0.70, -0.80, -0.80, 0.33, 0.33, 0.33, 0.09, 0.09];

/// Renders charges the way the xtb property printout lays them out.
pub(crate) fn xtb_report(rows: &[(Element, f64)]) -> String {
    let mut out = String::new();
    out.push_str("          ------------------------------\n");
    out.push_str("          |  Property Printout         |\n");
    out.push_str("          ------------------------------\n\n");
    out.push_str("  Mulliken/CM5 charges         n(s)   n(p)   n(d)\n");
    for (i, (element, charge)) in rows.iter().enumerate() {
        let _ = writeln!(
            out,
            "{:>6} {:<2} {:>11.6} {:>11.6} {:>7.3} {:>7.3} {:>7.3}",
            i + 1,
            element.symbol(),
            charge * 0.9,
            charge,
            1.0,
            2.0,
            0.0
        );
    }
    out.push_str("\nWiberg/Mayer (AO) data.\n");
    out
}

/// Assigns every atom of the input the charge `0.01 * x`.
#[derive(Default)]
pub(crate) struct PositionalSolver {
    pub totals: Mutex<Vec<i64>>,
}

pub(crate) fn positional_charge(position: &Point3<f64>) -> f64 {
    position.x * 0.01
}

impl ChargeSolver for PositionalSolver {
    fn name(&self) -> &str {
        "positional"
    }

    fn solve(&self, job: &SolverJob) -> Result<String, ToolError> {
        let (structure, _) =
            PdbFile::read_from_path(job.input).map_err(|e| ToolError::MissingOutput {
                program: "positional".to_string(),
                reason: e.to_string(),
            })?;
        self.totals.lock().unwrap().push(job.total_charge);
        let rows: Vec<(Element, f64)> = structure
            .atoms()
            .iter()
            .map(|a| (a.element, positional_charge(&a.position)))
            .collect();
        Ok(xtb_report(&rows))
    }
}

impl ChargeSolver for Arc<PositionalSolver> {
    fn name(&self) -> &str {
        self.as_ref().name()
    }

    fn solve(&self, job: &SolverJob) -> Result<String, ToolError> {
        self.as_ref().solve(job)
    }
}

/// Always fails as if the solver binary crashed.
pub(crate) struct CrashingSolver;

impl ChargeSolver for CrashingSolver {
    fn name(&self) -> &str {
        "crashing"
    }

    fn solve(&self, _job: &SolverJob) -> Result<String, ToolError> {
        Err(ToolError::ExitStatus {
            program: "crashing".to_string(),
            status: "exit status: 1".to_string(),
            stderr: "SCF did not converge".to_string(),
        })
    }
}

/// Reports `NaN` for every atom.
pub(crate) struct NanSolver;

impl ChargeSolver for NanSolver {
    fn name(&self) -> &str {
        "nan"
    }

    fn solve(&self, job: &SolverJob) -> Result<String, ToolError> {
        let mut out = String::from("  Mulliken/CM5 charges         n(s)   n(p)   n(d)\n");
        for i in 0..job.atom_count {
            let _ = writeln!(out, "{:>6} C  NaN NaN 1.000 2.000 0.000", i + 1);
        }
        Ok(out)
    }
}
