use crate::core::models::ids::AtomId;
use crate::core::models::structure::Structure;
use crate::core::topology::perception::BondGraph;
use crate::engine::error::FragmentError;
use crate::engine::fragment::FragmentPlan;

/// An inner-shell atom that lost bonding partners to the shell boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BrokenBondRecord {
    pub atom: AtomId,
    pub inner_degree: usize,
    pub outer_degree: usize,
}

#[derive(Debug, Clone)]
pub struct TopologyComparison {
    pub inner_graph: BondGraph,
    pub outer_graph: BondGraph,
    /// Ordered by atom id.
    pub broken: Vec<BrokenBondRecord>,
}

pub struct BondTopologyComparator;

impl BondTopologyComparator {
    /// Perceives both shells independently and flags inner atoms whose
    /// degree differs between them.
    pub fn compare(
        structure: &Structure,
        plan: &FragmentPlan,
    ) -> Result<TopologyComparison, FragmentError> {
        let inner_graph = BondGraph::perceive(structure, &plan.inner)?;
        let outer_graph = BondGraph::perceive(structure, &plan.outer)?;

        let mut broken = Vec::new();
        for &atom in &plan.inner {
            let inner_degree = inner_graph.degree(atom).unwrap_or(0);
            let outer_degree = outer_graph.degree(atom).ok_or_else(|| {
                FragmentError::Correlation(format!(
                    "atom {} of the inner shell has no counterpart in the outer shell",
                    atom
                ))
            })?;
            if inner_degree != outer_degree {
                broken.push(BrokenBondRecord {
                    atom,
                    inner_degree,
                    outer_degree,
                });
            }
        }

        Ok(TopologyComparison {
            inner_graph,
            outer_graph,
            broken,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::spatial::SpatialIndex;
    use crate::engine::config::FragmentationConfig;
    use crate::engine::fixtures::{alkane, glycine};
    use crate::engine::fragment::FragmentExtractor;

    fn plan_for(structure: &Structure, center: usize, inner_radius: f64) -> FragmentPlan {
        let index = SpatialIndex::build(structure).unwrap();
        let config = FragmentationConfig {
            inner_radius,
            ..FragmentationConfig::default()
        };
        let charges = vec![0.0; structure.len()];
        FragmentExtractor::new(structure, &index, &config)
            .plan(AtomId::new(center), &charges)
            .unwrap()
    }

    #[test]
    fn truncated_chain_flags_the_boundary_carbon() {
        let structure = alkane(6);
        let plan = plan_for(&structure, 0, 6.0);
        let comparison = BondTopologyComparator::compare(&structure, &plan).unwrap();

        assert_eq!(
            comparison.broken,
            vec![BrokenBondRecord {
                atom: AtomId::new(13),
                inner_degree: 3,
                outer_degree: 4,
            }]
        );
        assert_eq!(comparison.outer_graph.bond_count(), structure.len() - 1);
    }

    #[test]
    fn isolated_molecule_has_no_broken_bonds() {
        let structure = glycine();
        let plan = plan_for(&structure, 0, 6.0);
        let comparison = BondTopologyComparator::compare(&structure, &plan).unwrap();
        assert!(comparison.broken.is_empty());
        assert_eq!(comparison.inner_graph, comparison.outer_graph);
    }

    #[test]
    fn inner_atom_missing_from_outer_is_a_correlation_failure() {
        let structure = alkane(3);
        let mut plan = plan_for(&structure, 0, 6.0);
        plan.outer.retain(|id| id.index() != 0);
        let err = BondTopologyComparator::compare(&structure, &plan).unwrap_err();
        assert!(matches!(err, FragmentError::Correlation(_)));
    }
}
