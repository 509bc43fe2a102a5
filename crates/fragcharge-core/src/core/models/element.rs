use phf::{Map, phf_map};
use serde::Serialize;
use std::fmt;

/// Chemical elements recognized by the charge engine.
///
/// Anything outside this table parses as [`Element::Unknown`], which still
/// participates in bond perception with a generic covalent radius.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum Element {
    H,
    C,
    N,
    O,
    S,
    P,
    F,
    Cl,
    Br,
    I,
    Se,
    Na,
    K,
    Mg,
    Ca,
    Zn,
    Fe,
    Cu,
    Mn,
    Co,
    Ni,
    Unknown,
}

static ELEMENT_SYMBOLS: Map<&'static str, Element> = phf_map! {
    "H" => Element::H,
    "D" => Element::H,
    "C" => Element::C,
    "N" => Element::N,
    "O" => Element::O,
    "S" => Element::S,
    "P" => Element::P,
    "F" => Element::F,
    "CL" => Element::Cl,
    "BR" => Element::Br,
    "I" => Element::I,
    "SE" => Element::Se,
    "NA" => Element::Na,
    "K" => Element::K,
    "MG" => Element::Mg,
    "CA" => Element::Ca,
    "ZN" => Element::Zn,
    "FE" => Element::Fe,
    "CU" => Element::Cu,
    "MN" => Element::Mn,
    "CO" => Element::Co,
    "NI" => Element::Ni,
};

const UNKNOWN_COVALENT_RADIUS: f64 = 1.50;

impl Element {
    /// Parses an element symbol case-insensitively.
    ///
    /// Empty or unrecognized symbols yield [`Element::Unknown`].
    pub fn from_symbol(symbol: &str) -> Self {
        let upper = symbol.trim().to_ascii_uppercase();
        ELEMENT_SYMBOLS
            .get(upper.as_str())
            .copied()
            .unwrap_or(Element::Unknown)
    }

    /// Guesses the element from a PDB-style atom name when no element column is present.
    ///
    /// Leading digits are skipped (`1HB` is hydrogen) and only the first
    /// letter is used, which is the convention for biopolymer atom names.
    pub fn from_atom_name(name: &str) -> Self {
        name.trim()
            .chars()
            .find(|c| c.is_ascii_alphabetic())
            .map(|c| Self::from_symbol(c.encode_utf8(&mut [0; 4])))
            .unwrap_or(Element::Unknown)
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Element::H => "H",
            Element::C => "C",
            Element::N => "N",
            Element::O => "O",
            Element::S => "S",
            Element::P => "P",
            Element::F => "F",
            Element::Cl => "Cl",
            Element::Br => "Br",
            Element::I => "I",
            Element::Se => "Se",
            Element::Na => "Na",
            Element::K => "K",
            Element::Mg => "Mg",
            Element::Ca => "Ca",
            Element::Zn => "Zn",
            Element::Fe => "Fe",
            Element::Cu => "Cu",
            Element::Mn => "Mn",
            Element::Co => "Co",
            Element::Ni => "Ni",
            Element::Unknown => "X",
        }
    }

    /// Single-bond covalent radius in Angstroms (Cordero et al., 2008).
    pub fn covalent_radius(self) -> f64 {
        match self {
            Element::H => 0.31,
            Element::C => 0.76,
            Element::N => 0.71,
            Element::O => 0.66,
            Element::S => 1.05,
            Element::P => 1.07,
            Element::F => 0.57,
            Element::Cl => 1.02,
            Element::Br => 1.20,
            Element::I => 1.39,
            Element::Se => 1.20,
            Element::Na => 1.66,
            Element::K => 2.03,
            Element::Mg => 1.41,
            Element::Ca => 1.76,
            Element::Zn => 1.22,
            Element::Fe => 1.32,
            Element::Cu => 1.32,
            Element::Mn => 1.39,
            Element::Co => 1.26,
            Element::Ni => 1.24,
            Element::Unknown => UNKNOWN_COVALENT_RADIUS,
        }
    }

    /// Neutral valence used when saturating open valences with hydrogen.
    ///
    /// Returns `None` for metals and unknown elements, which are never saturated.
    pub fn standard_valence(self) -> Option<u8> {
        match self {
            Element::H | Element::F | Element::Cl | Element::Br | Element::I => Some(1),
            Element::O | Element::S | Element::Se => Some(2),
            Element::N | Element::P => Some(3),
            Element::C => Some(4),
            _ => None,
        }
    }

    pub fn is_hydrogen(self) -> bool {
        self == Element::H
    }
}

impl fmt::Display for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}
