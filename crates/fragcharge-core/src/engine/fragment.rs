use crate::core::models::element::Element;
use crate::core::models::ids::AtomId;
use crate::core::models::structure::Structure;
use crate::core::spatial::{SpatialError, SpatialIndex};
use crate::engine::config::FragmentationConfig;
use crate::engine::error::FragmentError;

/// Whether an atom is used as a fragment center.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CenterDecision {
    Process,
    SkipHydrogen,
    /// Oxygen whose core sphere already holds more atoms than the limit.
    SkipSaturatedOxygen { neighbors: usize },
}

/// Atom memberships of one fragment, all sorted by id.
#[derive(Debug, Clone, PartialEq)]
pub struct FragmentPlan {
    pub center: AtomId,
    /// Atoms the QM calculation works on.
    pub inner: Vec<AtomId>,
    /// Chemical context used to detect truncated bonds.
    pub outer: Vec<AtomId>,
    /// Atoms whose refined charges are written back.
    pub core: Vec<AtomId>,
    /// Rounded empirical charge of the inner shell.
    pub net_charge: i64,
}

/// Sum of `charges` over `members`, rounded half to even.
///
/// Ids beyond the charge table contribute nothing.
pub fn net_charge(members: &[AtomId], charges: &[f64]) -> i64 {
    let sum: f64 = members
        .iter()
        .filter_map(|id| charges.get(id.index()))
        .sum();
    sum.round_ties_even() as i64
}

pub struct FragmentExtractor<'a> {
    structure: &'a Structure,
    index: &'a SpatialIndex,
    config: &'a FragmentationConfig,
}

impl<'a> FragmentExtractor<'a> {
    pub fn new(
        structure: &'a Structure,
        index: &'a SpatialIndex,
        config: &'a FragmentationConfig,
    ) -> Self {
        Self {
            structure,
            index,
            config,
        }
    }

    pub fn classify(&self, center: AtomId) -> Result<CenterDecision, FragmentError> {
        let atom = self
            .structure
            .atom(center)
            .ok_or(SpatialError::UnknownAtom(center))?;

        match atom.element {
            Element::H => Ok(CenterDecision::SkipHydrogen),
            Element::O => {
                let others = self
                    .index
                    .neighbors(&atom.position, self.config.core_radius)
                    .into_iter()
                    .filter(|&id| id != center)
                    .count();
                if others > self.config.oxygen_neighbor_limit {
                    Ok(CenterDecision::SkipSaturatedOxygen { neighbors: others })
                } else {
                    Ok(CenterDecision::Process)
                }
            }
            _ => Ok(CenterDecision::Process),
        }
    }

    /// Collects the three shells around `center` and the inner-shell net charge.
    pub fn plan(&self, center: AtomId, empirical: &[f64]) -> Result<FragmentPlan, FragmentError> {
        let position = self
            .structure
            .position(center)
            .ok_or(SpatialError::UnknownAtom(center))?;

        let inner = self.index.neighbors(position, self.config.inner_radius);
        let outer = self.index.neighbors(position, self.config.outer_radius);
        let core = self.index.neighbors(position, self.config.core_radius);

        if let Some(stray) = inner.iter().find(|id| outer.binary_search(id).is_err()) {
            return Err(FragmentError::Correlation(format!(
                "inner atom {} is missing from the outer shell",
                stray
            )));
        }

        Ok(FragmentPlan {
            center,
            net_charge: net_charge(&inner, empirical),
            inner,
            outer,
            core,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::builder::StructureBuilder;
    use crate::engine::fixtures::{alkane, glycine, GLYCINE_CHARGES};
    use nalgebra::Point3;

    fn ids(raw: &[usize]) -> Vec<AtomId> {
        raw.iter().copied().map(AtomId::new).collect()
    }

    #[test]
    fn hydrogen_centers_are_skipped() {
        let structure = alkane(2);
        let index = SpatialIndex::build(&structure).unwrap();
        let config = FragmentationConfig::default();
        let extractor = FragmentExtractor::new(&structure, &index, &config);

        assert_eq!(
            extractor.classify(AtomId::new(1)).unwrap(),
            CenterDecision::SkipHydrogen
        );
        assert_eq!(
            extractor.classify(AtomId::new(0)).unwrap(),
            CenterDecision::Process
        );
    }

    #[test]
    fn oxygen_with_more_than_two_close_neighbors_is_skipped() {
        let mut builder = StructureBuilder::new();
        builder.start_residue("A", 1, None, "H3O", true);
        builder
            .add_atom(1, "O", Element::O, Point3::origin())
            .unwrap()
            .add_atom(2, "H1", Element::H, Point3::new(0.97, 0.0, 0.0))
            .unwrap()
            .add_atom(3, "H2", Element::H, Point3::new(-0.3, 0.92, 0.0))
            .unwrap()
            .add_atom(4, "H3", Element::H, Point3::new(-0.3, -0.5, 0.77))
            .unwrap();
        let structure = builder.build();
        let index = SpatialIndex::build(&structure).unwrap();
        let config = FragmentationConfig::default();
        let extractor = FragmentExtractor::new(&structure, &index, &config);

        assert_eq!(
            extractor.classify(AtomId::new(0)).unwrap(),
            CenterDecision::SkipSaturatedOxygen { neighbors: 3 }
        );

        let strict = FragmentationConfig {
            oxygen_neighbor_limit: 3,
            ..FragmentationConfig::default()
        };
        let extractor = FragmentExtractor::new(&structure, &index, &strict);
        assert_eq!(
            extractor.classify(AtomId::new(0)).unwrap(),
            CenterDecision::Process
        );
    }

    #[test]
    fn carboxylate_oxygen_is_a_center() {
        let structure = glycine();
        let index = SpatialIndex::build(&structure).unwrap();
        let config = FragmentationConfig::default();
        let extractor = FragmentExtractor::new(&structure, &index, &config);
        assert_eq!(
            extractor.classify(AtomId::new(3)).unwrap(),
            CenterDecision::Process
        );
    }

    #[test]
    fn shells_nest_and_core_is_tight() {
        let structure = alkane(6);
        let index = SpatialIndex::build(&structure).unwrap();
        let config = FragmentationConfig::default();
        let extractor = FragmentExtractor::new(&structure, &index, &config);
        let charges = vec![0.0; structure.len()];

        let plan = extractor.plan(AtomId::new(0), &charges).unwrap();
        assert_eq!(plan.core, ids(&[0, 1, 2, 3]));
        assert_eq!(plan.inner, ids(&(0..16).collect::<Vec<_>>()));
        assert_eq!(plan.outer.len(), structure.len());
        assert!(plan.inner.iter().all(|id| plan.outer.contains(id)));
        assert!(plan.core.iter().all(|id| plan.inner.contains(id)));
    }

    #[test]
    fn atom_exactly_at_inner_radius_is_a_member() {
        let mut builder = StructureBuilder::new();
        builder.start_residue("A", 1, None, "LIG", true);
        builder
            .add_atom(1, "C1", Element::C, Point3::origin())
            .unwrap()
            .add_atom(2, "C2", Element::C, Point3::new(6.0, 0.0, 0.0))
            .unwrap()
            .add_atom(3, "C3", Element::C, Point3::new(6.001, 0.0, 0.0))
            .unwrap();
        let structure = builder.build();
        let index = SpatialIndex::build(&structure).unwrap();
        let config = FragmentationConfig::default();
        let extractor = FragmentExtractor::new(&structure, &index, &config);

        let plan = extractor.plan(AtomId::new(0), &[0.1, 0.1, 0.1]).unwrap();
        assert_eq!(plan.inner, ids(&[0, 1]));
        assert_eq!(plan.outer, ids(&[0, 1, 2]));
    }

    #[test]
    fn net_charge_rounds_inner_sum_half_to_even() {
        let members = ids(&[0, 1, 2]);
        assert_eq!(net_charge(&members, &[1.0, 1.0, 0.5]), 2);
        assert_eq!(net_charge(&members, &[1.0, 1.0, 1.5]), 4);
        assert_eq!(net_charge(&members, &[-0.25, -0.25, 0.0]), 0);
        assert_eq!(net_charge(&members, &[-0.6, -0.6, -0.6]), -2);
    }

    #[test]
    fn glycine_fragment_is_neutral() {
        let structure = glycine();
        let index = SpatialIndex::build(&structure).unwrap();
        let config = FragmentationConfig::default();
        let extractor = FragmentExtractor::new(&structure, &index, &config);

        let plan = extractor.plan(AtomId::new(1), &GLYCINE_CHARGES).unwrap();
        assert_eq!(plan.inner.len(), structure.len());
        assert_eq!(plan.outer, plan.inner);
        assert_eq!(plan.net_charge, 0);
    }
}
