use super::element::Element;
use super::ids::AtomId;
use nalgebra::Point3;
use std::fmt;

/// Identifies the residue an atom belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResidueKey {
    /// Chain identifier (author chain id when available).
    pub chain_id: String,
    /// Residue sequence number.
    pub seq: isize,
    /// PDB insertion code, if any.
    pub ins_code: Option<char>,
    /// Three-letter residue or ligand name (e.g., "ALA", "HEM").
    pub name: String,
}

impl ResidueKey {
    pub fn new(chain_id: &str, seq: isize, ins_code: Option<char>, name: &str) -> Self {
        Self {
            chain_id: chain_id.to_string(),
            seq,
            ins_code,
            name: name.to_string(),
        }
    }
}

impl fmt::Display for ResidueKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}{}", self.chain_id, self.name, self.seq)?;
        if let Some(code) = self.ins_code {
            write!(f, "{}", code)?;
        }
        Ok(())
    }
}

/// An immutable structural record of one atom.
///
/// Atoms never carry charges; empirical and refined charges live in a side
/// table keyed by [`AtomId`] so that structural data stays read-only while
/// fragments are processed concurrently.
#[derive(Debug, Clone, PartialEq)]
pub struct Atom {
    /// Position of this atom in global iteration order.
    pub id: AtomId,
    /// Serial number from the source file.
    pub serial: usize,
    /// Atom name (e.g., "CA", "OXT").
    pub name: String,
    pub element: Element,
    pub residue: ResidueKey,
    /// Cartesian coordinates in Angstroms.
    pub position: Point3<f64>,
    /// Whether the source record was a HETATM.
    pub hetero: bool,
}

impl Atom {
    pub fn is_hydrogen(&self) -> bool {
        self.element.is_hydrogen()
    }

    pub fn distance_to(&self, other: &Point3<f64>) -> f64 {
        nalgebra::distance(&self.position, other)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn atom(name: &str, element: Element, position: Point3<f64>) -> Atom {
        Atom {
            id: AtomId::new(0),
            serial: 1,
            name: name.to_string(),
            element,
            residue: ResidueKey::new("A", 7, None, "GLY"),
            position,
            hetero: false,
        }
    }

    #[test]
    fn residue_key_display_includes_insertion_code() {
        let plain = ResidueKey::new("A", 12, None, "SER");
        let inserted = ResidueKey::new("B", 12, Some('A'), "SER");
        assert_eq!(plain.to_string(), "A:SER12");
        assert_eq!(inserted.to_string(), "B:SER12A");
    }

    #[test]
    fn distance_to_uses_euclidean_metric() {
        let a = atom("CA", Element::C, Point3::new(0.0, 0.0, 0.0));
        assert!((a.distance_to(&Point3::new(3.0, 4.0, 0.0)) - 5.0).abs() < 1e-12);
    }

    #[test]
    fn hydrogen_detection_follows_element() {
        assert!(atom("HA", Element::H, Point3::origin()).is_hydrogen());
        assert!(!atom("CA", Element::C, Point3::origin()).is_hydrogen());
    }
}
