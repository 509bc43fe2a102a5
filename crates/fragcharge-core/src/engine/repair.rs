use crate::core::models::element::Element;
use crate::core::models::ids::AtomId;
use crate::core::models::structure::Structure;
use crate::core::topology::perception::BondGraph;
use crate::engine::comparator::BrokenBondRecord;
use crate::engine::error::FragmentError;
use nalgebra::Point3;
use std::collections::{BTreeSet, VecDeque};
use tracing::trace;

/// A carbon whose bond to another carbon was left cut; capping hydrogens are
/// only kept near these.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CutCarbonMarker {
    pub atom: AtomId,
    pub position: Point3<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RepairOutcome {
    /// Repaired membership in global atom order.
    pub members: Vec<AtomId>,
    /// Atoms pulled in from the outer shell, in the order they were added.
    pub added: Vec<AtomId>,
    pub markers: Vec<CutCarbonMarker>,
    /// Number of queue pops.
    pub iterations: usize,
}

pub struct BoundaryRepairer<'a> {
    structure: &'a Structure,
    outer_graph: &'a BondGraph,
}

impl<'a> BoundaryRepairer<'a> {
    pub fn new(structure: &'a Structure, outer_graph: &'a BondGraph) -> Self {
        Self {
            structure,
            outer_graph,
        }
    }

    fn element(&self, id: AtomId) -> Element {
        self.structure
            .atom(id)
            .map_or(Element::Unknown, |a| a.element)
    }

    /// Grows `inner` across truncated bonds until only C-C bonds are cut.
    ///
    /// Breadth-first from the broken-bond atoms over the outer-shell graph.
    /// A neighbor outside the membership is pulled in unless both ends of
    /// the bond are carbon, in which case the bond stays cut and the inner
    /// carbon is marked. Each atom is added and enqueued at most once.
    pub fn repair(
        &self,
        inner: &[AtomId],
        broken: &[BrokenBondRecord],
    ) -> Result<RepairOutcome, FragmentError> {
        let mut members: BTreeSet<AtomId> = inner.iter().copied().collect();
        let mut queue: VecDeque<AtomId> = broken.iter().map(|r| r.atom).collect();
        let mut added = Vec::new();
        let mut markers: Vec<CutCarbonMarker> = Vec::new();
        let mut iterations = 0;

        while let Some(current) = queue.pop_front() {
            iterations += 1;
            let neighbors = self.outer_graph.neighbors(current).ok_or_else(|| {
                FragmentError::Correlation(format!(
                    "atom {} is not part of the outer-shell bond graph",
                    current
                ))
            })?;
            let current_is_carbon = self.element(current) == Element::C;

            for &next in neighbors {
                if members.contains(&next) {
                    continue;
                }
                if current_is_carbon && self.element(next) == Element::C {
                    if !markers.iter().any(|m| m.atom == current) {
                        let position = self
                            .structure
                            .position(current)
                            .copied()
                            .unwrap_or_else(Point3::origin);
                        markers.push(CutCarbonMarker {
                            atom: current,
                            position,
                        });
                    }
                    continue;
                }
                members.insert(next);
                added.push(next);
                queue.push_back(next);
            }
        }

        trace!(
            iterations,
            added = added.len(),
            markers = markers.len(),
            "Boundary repair converged."
        );

        Ok(RepairOutcome {
            members: members.into_iter().collect(),
            added,
            markers,
            iterations,
        })
    }
}
