use crate::core::io::pdb::{PdbFile, write_fragment};
use crate::core::io::traits::StructureFile;
use crate::core::models::ids::AtomId;
use crate::core::models::structure::Structure;
use crate::engine::cancel::CancellationToken;
use crate::engine::error::{FragmentError, ToolError};
use crate::engine::repair::{CutCarbonMarker, RepairOutcome};
use std::fs::{self, File};
use std::io::{BufWriter, Cursor, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

pub const SUBSTRUCTURE_FILE: &str = "substructure.pdb";
pub const CAPPED_FILE: &str = "capped.pdb";

/// Tolerance when matching the echoed original atoms against the input.
const POSITION_TOLERANCE: f64 = 0.01;

pub struct SaturationJob<'a> {
    /// PDB file holding the repaired fragment.
    pub input: &'a Path,
    pub work_dir: &'a Path,
    pub cancel: &'a CancellationToken,
}

/// Fills open valences of a fragment with hydrogens.
///
/// Implementations return PDB text whose first records are the input atoms
/// in input order, followed by every atom they added.
pub trait ValenceSaturator: Send + Sync {
    fn name(&self) -> &str;

    fn saturate(&self, job: &SaturationJob) -> Result<String, ToolError>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct CappedFragment {
    /// Original atoms, in the order they appear at the top of the capped file.
    pub members: Vec<AtomId>,
    pub caps_retained: usize,
    pub caps_dropped: usize,
    pub path: PathBuf,
}

impl CappedFragment {
    pub fn atom_count(&self) -> usize {
        self.members.len() + self.caps_retained
    }
}

pub struct Capper<'a> {
    structure: &'a Structure,
    saturator: &'a dyn ValenceSaturator,
    cap_distance: f64,
}

impl<'a> Capper<'a> {
    pub fn new(
        structure: &'a Structure,
        saturator: &'a dyn ValenceSaturator,
        cap_distance: f64,
    ) -> Self {
        Self {
            structure,
            saturator,
            cap_distance,
        }
    }

    /// Saturates the repaired fragment and keeps only the added atoms that
    /// sit within the cap distance of a cut carbon.
    pub fn cap(
        &self,
        repaired: &RepairOutcome,
        work_dir: &Path,
        cancel: &CancellationToken,
    ) -> Result<CappedFragment, FragmentError> {
        let input = work_dir.join(SUBSTRUCTURE_FILE);
        {
            let mut writer = BufWriter::new(File::create(&input)?);
            write_fragment(self.structure, &repaired.members, &mut writer)?;
            writer.flush()?;
        }

        let saturated = self.saturator.saturate(&SaturationJob {
            input: &input,
            work_dir,
            cancel,
        })?;
        let (output, metadata) = PdbFile::read_from(&mut Cursor::new(saturated.as_bytes()))?;

        let n = repaired.members.len();
        self.check_originals(&repaired.members, &output)?;

        let mut lines: Vec<&str> = metadata.atom_lines[..n]
            .iter()
            .map(String::as_str)
            .collect();
        let mut caps_dropped = 0;
        for (atom, line) in output.atoms()[n..].iter().zip(&metadata.atom_lines[n..]) {
            if near_any_marker(&atom.position, &repaired.markers, self.cap_distance) {
                lines.push(line);
            } else {
                caps_dropped += 1;
            }
        }
        let caps_retained = lines.len() - n;

        let path = work_dir.join(CAPPED_FILE);
        let mut text = lines.join("\n");
        text.push_str("\nEND\n");
        fs::write(&path, text)?;

        debug!(
            saturator = self.saturator.name(),
            caps_retained, caps_dropped, "Capped fragment written."
        );

        Ok(CappedFragment {
            members: repaired.members.clone(),
            caps_retained,
            caps_dropped,
            path,
        })
    }

    fn check_originals(&self, members: &[AtomId], output: &Structure) -> Result<(), FragmentError> {
        if output.len() < members.len() {
            return Err(FragmentError::Correlation(format!(
                "saturator '{}' returned {} atoms for a fragment of {}",
                self.saturator.name(),
                output.len(),
                members.len()
            )));
        }
        for (slot, (&id, echoed)) in members.iter().zip(output.atoms()).enumerate() {
            let original = self
                .structure
                .atom(id)
                .ok_or_else(|| FragmentError::Correlation(format!("unknown atom {}", id)))?;
            if original.element != echoed.element
                || (original.position - echoed.position).norm() > POSITION_TOLERANCE
            {
                return Err(FragmentError::Correlation(format!(
                    "record {} of the saturated fragment ({} {}) does not match atom {} ({} {})",
                    slot + 1,
                    echoed.element,
                    echoed.name,
                    id,
                    original.element,
                    original.name
                )));
            }
        }
        Ok(())
    }
}

/// Strict: a cap exactly at the cap distance is dropped.
fn near_any_marker(
    position: &nalgebra::Point3<f64>,
    markers: &[CutCarbonMarker],
    cap_distance: f64,
) -> bool {
    markers
        .iter()
        .any(|m| (m.position - position).norm() < cap_distance)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::builder::StructureBuilder;
    use crate::core::models::element::Element;
    use crate::core::spatial::SpatialIndex;
    use crate::engine::comparator::BondTopologyComparator;
    use crate::engine::config::FragmentationConfig;
    use crate::engine::fixtures::{alkane, glycine};
    use crate::engine::fragment::FragmentExtractor;
    use crate::core::topology::perception::BondGraph;
    use crate::engine::repair::BoundaryRepairer;
    use crate::tools::geometric::GeometricSaturator;
    use nalgebra::Point3;

    fn repaired(structure: &Structure, center: usize, inner_radius: f64) -> RepairOutcome {
        let index = SpatialIndex::build(structure).unwrap();
        let config = FragmentationConfig {
            inner_radius,
            ..FragmentationConfig::default()
        };
        let charges = vec![0.0; structure.len()];
        let plan = FragmentExtractor::new(structure, &index, &config)
            .plan(AtomId::new(center), &charges)
            .unwrap();
        let comparison = BondTopologyComparator::compare(structure, &plan).unwrap();
        BoundaryRepairer::new(structure, &comparison.outer_graph)
            .repair(&plan.inner, &comparison.broken)
            .unwrap()
    }

    fn read_capped(path: &Path) -> Structure {
        PdbFile::read_from_path(path).unwrap().0
    }

    #[test]
    fn single_cut_retains_exactly_one_cap() {
        let structure = alkane(6);
        let outcome = repaired(&structure, 0, 6.0);
        let dir = tempfile::tempdir().unwrap();
        let saturator = GeometricSaturator::default();
        let capper = Capper::new(&structure, &saturator, 1.3);

        let capped = capper
            .cap(&outcome, dir.path(), &CancellationToken::new())
            .unwrap();

        assert_eq!(capped.caps_retained, 1);
        assert_eq!(capped.caps_dropped, 0);
        assert_eq!(capped.atom_count(), 17);
        let written = read_capped(&capped.path);
        assert_eq!(written.len(), 17);
        let cap = &written.atoms()[16];
        assert!(cap.is_hydrogen());
        assert!((cap.position - Point3::new(5.0, 0.0, 0.0)).norm() < 1.3);
        assert!(dir.path().join(SUBSTRUCTURE_FILE).exists());
    }

    #[test]
    fn capped_heavy_atoms_reach_their_valence() {
        let structure = alkane(8);
        for (center, radius) in [(0, 6.0), (0, 2.0), (4, 3.3), (10, 4.1)] {
            let outcome = repaired(&structure, center, radius);
            let dir = tempfile::tempdir().unwrap();
            let saturator = GeometricSaturator::default();
            let capper = Capper::new(&structure, &saturator, 1.3);
            let capped = capper
                .cap(&outcome, dir.path(), &CancellationToken::new())
                .unwrap();

            let written = read_capped(&capped.path);
            let ids: Vec<AtomId> = written.ids().collect();
            let graph = BondGraph::perceive(&written, &ids).unwrap();
            let cut: Vec<AtomId> = outcome
                .markers
                .iter()
                .filter_map(|m| outcome.members.iter().position(|&id| id == m.atom))
                .map(AtomId::new)
                .collect();

            for (id, atom) in ids.iter().zip(written.atoms()) {
                if atom.is_hydrogen() || cut.contains(id) {
                    continue;
                }
                let valence = atom.element.standard_valence().unwrap() as usize;
                assert!(
                    graph.degree(*id).unwrap() >= valence,
                    "{} of fragment ({}, {}) is under-bonded",
                    atom.name,
                    center,
                    radius
                );
            }
        }
    }

    #[test]
    fn complete_molecule_gains_no_caps() {
        let structure = glycine();
        let outcome = repaired(&structure, 1, 6.0);
        let dir = tempfile::tempdir().unwrap();
        let saturator = GeometricSaturator::default();
        let capper = Capper::new(&structure, &saturator, 1.3);

        let capped = capper
            .cap(&outcome, dir.path(), &CancellationToken::new())
            .unwrap();

        assert_eq!(capped.caps_retained, 0);
        assert_eq!(read_capped(&capped.path).len(), structure.len());
    }

    #[test]
    fn caps_away_from_cut_carbons_never_reach_the_capped_file() {
        // Bare C-C-C zigzag; the fragment keeps the first two carbons.
        let mut builder = StructureBuilder::new();
        builder.start_residue("A", 1, None, "PRP", true);
        builder
            .add_atom(1, "C1", Element::C, Point3::new(0.0, 0.0, 0.0))
            .unwrap()
            .add_atom(2, "C2", Element::C, Point3::new(1.25, 0.89, 0.0))
            .unwrap()
            .add_atom(3, "C3", Element::C, Point3::new(2.5, 0.0, 0.0))
            .unwrap();
        let structure = builder.build();
        let outcome = repaired(&structure, 0, 1.6);
        assert_eq!(outcome.markers.len(), 1);
        let marker = outcome.markers[0].position;

        let dir = tempfile::tempdir().unwrap();
        let saturator = GeometricSaturator::default();
        let capper = Capper::new(&structure, &saturator, 1.3);
        let capped = capper
            .cap(&outcome, dir.path(), &CancellationToken::new())
            .unwrap();

        assert_eq!(capped.caps_retained, 3);
        assert_eq!(capped.caps_dropped, 3);
        let written = read_capped(&capped.path);
        assert_eq!(written.len(), 5);
        assert!(
            written.atoms()[2..]
                .iter()
                .all(|a| a.is_hydrogen() && (a.position - marker).norm() < 1.3)
        );
    }

    struct ReversingSaturator;

    impl ValenceSaturator for ReversingSaturator {
        fn name(&self) -> &str {
            "reversing"
        }

        fn saturate(&self, job: &SaturationJob) -> Result<String, ToolError> {
            let text = fs::read_to_string(job.input).unwrap();
            let mut lines: Vec<&str> = text
                .lines()
                .filter(|l| l.starts_with("ATOM") || l.starts_with("HETATM"))
                .collect();
            lines.reverse();
            Ok(lines.join("\n"))
        }
    }

    struct TruncatingSaturator;

    impl ValenceSaturator for TruncatingSaturator {
        fn name(&self) -> &str {
            "truncating"
        }

        fn saturate(&self, _job: &SaturationJob) -> Result<String, ToolError> {
            Ok("END\n".to_string())
        }
    }

    #[test]
    fn reordered_output_is_a_correlation_failure() {
        let structure = alkane(6);
        let outcome = repaired(&structure, 0, 6.0);
        let dir = tempfile::tempdir().unwrap();
        let capper = Capper::new(&structure, &ReversingSaturator, 1.3);
        let err = capper
            .cap(&outcome, dir.path(), &CancellationToken::new())
            .unwrap_err();
        assert!(matches!(err, FragmentError::Correlation(_)));
    }

    #[test]
    fn missing_atoms_are_a_correlation_failure() {
        let structure = alkane(6);
        let outcome = repaired(&structure, 0, 6.0);
        let dir = tempfile::tempdir().unwrap();
        let capper = Capper::new(&structure, &TruncatingSaturator, 1.3);
        let err = capper
            .cap(&outcome, dir.path(), &CancellationToken::new())
            .unwrap_err();
        assert!(matches!(err, FragmentError::Correlation(_)));
    }

    #[test]
    fn cap_distance_is_strict() {
        let marker = CutCarbonMarker {
            atom: AtomId::new(0),
            position: Point3::origin(),
        };
        assert!(near_any_marker(&Point3::new(1.29, 0.0, 0.0), &[marker], 1.3));
        assert!(!near_any_marker(&Point3::new(1.3, 0.0, 0.0), &[marker], 1.3));
        assert!(!near_any_marker(&Point3::new(0.5, 0.0, 0.0), &[], 1.3));
    }
}
