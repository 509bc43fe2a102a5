use super::atom::{Atom, ResidueKey};
use super::element::Element;
use super::ids::AtomId;
use super::structure::Structure;
use nalgebra::Point3;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BuilderError {
    #[error("Cannot add atom '{atom}' without a current residue")]
    NoActiveResidue { atom: String },
}

/// Incrementally assembles a [`Structure`] from residue-ordered atom records.
///
/// Readers call [`start_residue`](Self::start_residue) whenever the residue
/// identity changes and [`add_atom`](Self::add_atom) for each record. Atom ids
/// are assigned in insertion order.
#[derive(Debug, Default)]
pub struct StructureBuilder {
    atoms: Vec<Atom>,
    current_residue: Option<(ResidueKey, bool)>,
}

impl StructureBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            atoms: Vec::with_capacity(capacity),
            current_residue: None,
        }
    }

    pub fn start_residue(
        &mut self,
        chain_id: &str,
        seq: isize,
        ins_code: Option<char>,
        name: &str,
        hetero: bool,
    ) -> &mut Self {
        self.current_residue = Some((ResidueKey::new(chain_id, seq, ins_code, name), hetero));
        self
    }

    /// Starts a residue only if it differs from the current one.
    pub fn ensure_residue(
        &mut self,
        chain_id: &str,
        seq: isize,
        ins_code: Option<char>,
        name: &str,
        hetero: bool,
    ) -> &mut Self {
        let same = matches!(
            &self.current_residue,
            Some((key, h)) if key.chain_id == chain_id
                && key.seq == seq
                && key.ins_code == ins_code
                && key.name == name
                && *h == hetero
        );
        if !same {
            self.start_residue(chain_id, seq, ins_code, name, hetero);
        }
        self
    }

    pub fn add_atom(
        &mut self,
        serial: usize,
        name: &str,
        element: Element,
        position: Point3<f64>,
    ) -> Result<&mut Self, BuilderError> {
        let (residue, hetero) =
            self.current_residue
                .as_ref()
                .ok_or_else(|| BuilderError::NoActiveResidue {
                    atom: name.to_string(),
                })?;

        let atom = Atom {
            id: AtomId::new(self.atoms.len()),
            serial,
            name: name.to_string(),
            element,
            residue: residue.clone(),
            position,
            hetero: *hetero,
        };
        self.atoms.push(atom);
        Ok(self)
    }

    pub fn atom_count(&self) -> usize {
        self.atoms.len()
    }

    pub fn build(self) -> Structure {
        Structure { atoms: self.atoms }
    }
}
