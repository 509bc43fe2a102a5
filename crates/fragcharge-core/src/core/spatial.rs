use super::models::ids::AtomId;
use super::models::structure::Structure;
use kiddo::{KdTree, SquaredEuclidean};
use nalgebra::Point3;
use thiserror::Error;

// Candidates are gathered with a slightly larger radius and then filtered
// exactly, so atoms sitting on the boundary are never lost to rounding.
const QUERY_PADDING: f64 = 1e-6;

#[derive(Debug, Error, PartialEq)]
pub enum SpatialError {
    #[error("Atom {id} has non-finite coordinates ({x}, {y}, {z})")]
    NonFiniteCoordinates { id: AtomId, x: f64, y: f64, z: f64 },
    #[error("Atom {0} is not part of the structure")]
    UnknownAtom(AtomId),
}

/// Fixed-radius neighbor search over a static set of atoms.
///
/// The index is built once and answers any number of queries. Results are
/// inclusive of the radius and returned sorted by [`AtomId`], so callers can
/// treat them either as ordered lists or as sets.
pub struct SpatialIndex {
    tree: KdTree<f64, 3>,
    ids: Vec<AtomId>,
    positions: Vec<Point3<f64>>,
}

impl SpatialIndex {
    /// Indexes every atom of the structure.
    ///
    /// # Errors
    ///
    /// Returns [`SpatialError::NonFiniteCoordinates`] if any coordinate is NaN
    /// or infinite.
    pub fn build(structure: &Structure) -> Result<Self, SpatialError> {
        let entries = structure.atoms().iter().map(|a| (a.id, a.position));
        Self::from_entries(entries, structure.len())
    }

    /// Indexes only the given subset of atoms.
    pub fn over(structure: &Structure, members: &[AtomId]) -> Result<Self, SpatialError> {
        let mut entries = Vec::with_capacity(members.len());
        for &id in members {
            let atom = structure.atom(id).ok_or(SpatialError::UnknownAtom(id))?;
            entries.push((id, atom.position));
        }
        Self::from_entries(entries.into_iter(), members.len())
    }

    fn from_entries(
        entries: impl Iterator<Item = (AtomId, Point3<f64>)>,
        capacity: usize,
    ) -> Result<Self, SpatialError> {
        let mut tree: KdTree<f64, 3> = KdTree::with_capacity(capacity.max(1));
        let mut ids = Vec::with_capacity(capacity);
        let mut positions = Vec::with_capacity(capacity);

        for (id, p) in entries {
            if !(p.x.is_finite() && p.y.is_finite() && p.z.is_finite()) {
                return Err(SpatialError::NonFiniteCoordinates {
                    id,
                    x: p.x,
                    y: p.y,
                    z: p.z,
                });
            }
            tree.add(&[p.x, p.y, p.z], ids.len() as u64);
            ids.push(id);
            positions.push(p);
        }

        Ok(Self {
            tree,
            ids,
            positions,
        })
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Returns every indexed atom within `radius` of `point`, boundary included.
    pub fn neighbors(&self, point: &Point3<f64>, radius: f64) -> Vec<AtomId> {
        if radius < 0.0 || self.ids.is_empty() {
            return Vec::new();
        }
        let radius_sq = radius * radius;
        let padded = (radius + QUERY_PADDING) * (radius + QUERY_PADDING);

        let mut found: Vec<AtomId> = self
            .tree
            .within_unsorted::<SquaredEuclidean>(&[point.x, point.y, point.z], padded)
            .into_iter()
            .map(|n| n.item as usize)
            .filter(|&slot| (self.positions[slot] - point).norm_squared() <= radius_sq)
            .map(|slot| self.ids[slot])
            .collect();
        found.sort_unstable();
        found
    }
}
