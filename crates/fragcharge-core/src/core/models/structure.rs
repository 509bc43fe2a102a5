use super::atom::Atom;
use super::ids::AtomId;
use nalgebra::Point3;

/// The global, read-only set of atoms a charge calculation runs over.
///
/// Atoms are stored in global iteration order; `AtomId(i)` always refers to
/// `atoms()[i]`. Instances are produced by
/// [`StructureBuilder`](super::builder::StructureBuilder).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Structure {
    pub(super) atoms: Vec<Atom>,
}

impl Structure {
    pub fn atoms(&self) -> &[Atom] {
        &self.atoms
    }

    /// Looks up an atom by id.
    ///
    /// # Return
    ///
    /// Returns `None` if the id does not belong to this structure.
    pub fn atom(&self, id: AtomId) -> Option<&Atom> {
        self.atoms.get(id.index())
    }

    pub fn len(&self) -> usize {
        self.atoms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.atoms.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = AtomId> + '_ {
        self.atoms.iter().map(|a| a.id)
    }

    pub fn position(&self, id: AtomId) -> Option<&Point3<f64>> {
        self.atom(id).map(|a| &a.position)
    }

    /// Number of hydrogen atoms, used for summary logging.
    pub fn hydrogen_count(&self) -> usize {
        self.atoms.iter().filter(|a| a.is_hydrogen()).count()
    }
}
