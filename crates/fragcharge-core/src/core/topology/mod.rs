//! # Topology Module
//!
//! Geometry-based bond perception. Structures read from mmCIF or PDB rarely
//! carry complete connectivity, so bonds are inferred from covalent radii and
//! stored per atom subset in a [`perception::BondGraph`].

pub mod perception;
