use crate::core::models::atom::Atom;
use crate::core::models::ids::AtomId;
use crate::core::models::structure::Structure;
use crate::core::spatial::{SpatialError, SpatialIndex};
use std::collections::BTreeMap;

/// Slack added to the covalent radius sum when deciding whether two atoms bond.
pub const BOND_TOLERANCE: f64 = 0.45;
/// Pairs closer than this are treated as overlapping, not bonded.
pub const MIN_BOND_DISTANCE: f64 = 0.4;

/// Decides whether two atoms are covalently bonded from their geometry alone.
///
/// Bonded when `MIN_BOND_DISTANCE < d <= r1 + r2 + BOND_TOLERANCE`, the same
/// proximity rule Open Babel applies when a file carries no connectivity.
pub fn are_bonded(a: &Atom, b: &Atom) -> bool {
    let cutoff = a.element.covalent_radius() + b.element.covalent_radius() + BOND_TOLERANCE;
    let d_sq = (a.position - b.position).norm_squared();
    d_sq > MIN_BOND_DISTANCE * MIN_BOND_DISTANCE && d_sq <= cutoff * cutoff
}

/// Connectivity perceived over one subset of a structure.
///
/// Each graph is built independently from its own member list, so the same
/// atom can have different degrees in two graphs when one of them truncates
/// its bonding partners. Nodes are keyed by [`AtomId`], which is what lets
/// two graphs be compared without any positional matching.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BondGraph {
    adjacency: BTreeMap<AtomId, Vec<AtomId>>,
}

impl BondGraph {
    /// Perceives bonds among `members`.
    ///
    /// Hydrogens keep only their closest bonding partner, so a hydrogen that
    /// happens to sit near a second heavy atom does not become bridging.
    ///
    /// # Errors
    ///
    /// Propagates [`SpatialError`] for unknown ids or non-finite coordinates.
    pub fn perceive(structure: &Structure, members: &[AtomId]) -> Result<Self, SpatialError> {
        let index = SpatialIndex::over(structure, members)?;
        let mut adjacency: BTreeMap<AtomId, Vec<AtomId>> =
            members.iter().map(|&id| (id, Vec::new())).collect();

        let max_radius = members
            .iter()
            .filter_map(|&id| structure.atom(id))
            .map(|a| a.element.covalent_radius())
            .fold(0.0_f64, f64::max);

        for &id in members {
            let Some(atom) = structure.atom(id) else {
                continue;
            };
            let reach = atom.element.covalent_radius() + max_radius + BOND_TOLERANCE;
            for other_id in index.neighbors(&atom.position, reach) {
                if other_id <= id {
                    continue;
                }
                let Some(other) = structure.atom(other_id) else {
                    continue;
                };
                if are_bonded(atom, other) {
                    push_unique(&mut adjacency, id, other_id);
                    push_unique(&mut adjacency, other_id, id);
                }
            }
        }

        let mut graph = Self { adjacency };
        graph.prune_hydrogens(structure);
        Ok(graph)
    }

    fn prune_hydrogens(&mut self, structure: &Structure) {
        let overbonded: Vec<(AtomId, Vec<AtomId>)> = self
            .adjacency
            .iter()
            .filter(|(id, nbrs)| {
                nbrs.len() > 1 && structure.atom(**id).is_some_and(|a| a.is_hydrogen())
            })
            .map(|(id, nbrs)| (*id, nbrs.clone()))
            .collect();

        for (h, nbrs) in overbonded {
            let Some(h_pos) = structure.position(h) else {
                continue;
            };
            let keep = nbrs.iter().copied().min_by(|a, b| {
                let da = structure.position(*a).map_or(f64::INFINITY, |p| (p - h_pos).norm());
                let db = structure.position(*b).map_or(f64::INFINITY, |p| (p - h_pos).norm());
                da.total_cmp(&db)
            });
            for other in nbrs.into_iter().filter(|&o| Some(o) != keep) {
                self.remove_bond(h, other);
            }
        }
    }

    fn remove_bond(&mut self, a: AtomId, b: AtomId) {
        if let Some(list) = self.adjacency.get_mut(&a) {
            list.retain(|&x| x != b);
        }
        if let Some(list) = self.adjacency.get_mut(&b) {
            list.retain(|&x| x != a);
        }
    }

    pub fn contains(&self, id: AtomId) -> bool {
        self.adjacency.contains_key(&id)
    }

    pub fn degree(&self, id: AtomId) -> Option<usize> {
        self.adjacency.get(&id).map(Vec::len)
    }

    /// Bonded partners of `id`, sorted by id.
    pub fn neighbors(&self, id: AtomId) -> Option<&[AtomId]> {
        self.adjacency.get(&id).map(Vec::as_slice)
    }

    pub fn atom_count(&self) -> usize {
        self.adjacency.len()
    }

    pub fn bond_count(&self) -> usize {
        self.adjacency.values().map(Vec::len).sum::<usize>() / 2
    }

    pub fn atoms(&self) -> impl Iterator<Item = AtomId> + '_ {
        self.adjacency.keys().copied()
    }
}

fn push_unique(adjacency: &mut BTreeMap<AtomId, Vec<AtomId>>, from: AtomId, to: AtomId) {
    let list = adjacency.entry(from).or_default();
    if let Err(pos) = list.binary_search(&to) {
        list.insert(pos, to);
    }
}
