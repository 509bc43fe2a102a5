use crate::core::io::pdb::{PdbFile, format_atom_record};
use crate::core::io::traits::StructureFile;
use crate::core::models::atom::Atom;
use crate::core::models::element::Element;
use crate::core::models::ids::AtomId;
use crate::core::models::structure::Structure;
use crate::core::spatial::SpatialError;
use crate::core::topology::perception::BondGraph;
use crate::core::utils::geometry::{bond_angle, generate_sp2_hydrogens, generate_sp3_hydrogens};
use crate::engine::capping::{SaturationJob, ValenceSaturator};
use crate::engine::error::ToolError;
use nalgebra::Point3;
use std::fmt::Write as _;

/// How far below the covalent radius sum a bond must be to count as double.
const DOUBLE_BOND_CONTRACTION: f64 = 0.12;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Hybridization {
    Sp2,
    Sp3,
}

fn hydrogen_bond_length(element: Element) -> f64 {
    match element {
        Element::C => 1.09,
        Element::N => 1.01,
        Element::O => 0.96,
        Element::S | Element::Se => 1.34,
        Element::P => 1.42,
        _ => 1.0,
    }
}

/// Saturates open valences from local geometry alone.
///
/// Hybridization is guessed from the existing bonds: a short single bond
/// or wide mean bond angle means trigonal, anything else tetrahedral. The
/// number of hydrogens is the gap between the element's sigma capacity for
/// that hybridization and its current neighbor count. Atoms without
/// neighbors, metals, and unknown elements are left alone.
#[derive(Debug, Clone)]
pub struct GeometricSaturator {
    /// Mean bond angle in degrees above which a center counts as trigonal.
    pub planar_angle: f64,
}

impl Default for GeometricSaturator {
    fn default() -> Self {
        Self {
            planar_angle: 115.0,
        }
    }
}

impl GeometricSaturator {
    fn hybridization(&self, atom: &Atom, neighbors: &[&Atom]) -> Hybridization {
        let planar = match neighbors {
            [] => false,
            [only] => {
                let single = atom.element.covalent_radius() + only.element.covalent_radius();
                atom.distance_to(&only.position) < single - DOUBLE_BOND_CONTRACTION
            }
            _ => {
                let mut total = 0.0;
                let mut count = 0;
                for (i, a) in neighbors.iter().enumerate() {
                    for b in &neighbors[i + 1..] {
                        total += bond_angle(&a.position, &atom.position, &b.position);
                        count += 1;
                    }
                }
                total / count as f64 > self.planar_angle
            }
        };
        if planar {
            Hybridization::Sp2
        } else {
            Hybridization::Sp3
        }
    }

    /// Positions of the hydrogens to add, each with the atom it bonds to.
    pub fn place_hydrogens(
        &self,
        structure: &Structure,
    ) -> Result<Vec<(AtomId, Point3<f64>)>, SpatialError> {
        let ids: Vec<AtomId> = structure.ids().collect();
        let graph = BondGraph::perceive(structure, &ids)?;
        let mut added = Vec::new();

        for atom in structure.atoms() {
            if atom.is_hydrogen() {
                continue;
            }
            let Some(valence) = atom.element.standard_valence() else {
                continue;
            };
            let neighbors: Vec<&Atom> = graph
                .neighbors(atom.id)
                .unwrap_or(&[])
                .iter()
                .filter_map(|&id| structure.atom(id))
                .collect();
            if neighbors.is_empty() {
                continue;
            }

            let hybridization = self.hybridization(atom, &neighbors);
            let capacity = match hybridization {
                Hybridization::Sp3 => valence as usize,
                Hybridization::Sp2 => (valence as usize).saturating_sub(1),
            };
            let missing = capacity.saturating_sub(neighbors.len());
            if missing == 0 {
                continue;
            }

            let positions: Vec<Point3<f64>> = neighbors.iter().map(|a| a.position).collect();
            let length = hydrogen_bond_length(atom.element);
            let candidates = match hybridization {
                Hybridization::Sp3 => generate_sp3_hydrogens(&atom.position, &positions, length),
                Hybridization::Sp2 => generate_sp2_hydrogens(&atom.position, &positions, length),
            };
            added.extend(candidates.into_iter().take(missing).map(|p| (atom.id, p)));
        }
        Ok(added)
    }
}

impl ValenceSaturator for GeometricSaturator {
    fn name(&self) -> &str {
        "geometric"
    }

    fn saturate(&self, job: &SaturationJob) -> Result<String, ToolError> {
        let unusable = |reason: String| ToolError::MissingOutput {
            program: self.name().to_string(),
            reason,
        };
        let (structure, metadata) =
            PdbFile::read_from_path(job.input).map_err(|e| unusable(e.to_string()))?;
        let hydrogens = self
            .place_hydrogens(&structure)
            .map_err(|e| unusable(e.to_string()))?;

        let mut out = String::new();
        for line in &metadata.atom_lines {
            out.push_str(line);
            out.push('\n');
        }
        for (k, (parent_id, position)) in hydrogens.into_iter().enumerate() {
            let Some(parent) = structure.atom(parent_id) else {
                continue;
            };
            let serial = structure.len() + k + 1;
            let hydrogen = Atom {
                id: AtomId::new(serial - 1),
                serial,
                name: "H".to_string(),
                element: Element::H,
                residue: parent.residue.clone(),
                position,
                hetero: parent.hetero,
            };
            let _ = writeln!(out, "{}", format_atom_record(serial, &hydrogen));
        }
        out.push_str("END\n");
        Ok(out)
    }
}
