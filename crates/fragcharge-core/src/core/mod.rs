//! # Core Module
//!
//! Stateless foundations of the charge engine: the structural data model,
//! file formats, spatial search, and geometry-based bond perception.
//!
//! - **Structure Representation** ([`models`]) - Atoms, elements, and the global atom set
//! - **File I/O** ([`io`]) - mmCIF input/output, fragment PDB files, charge lists, diagnostics
//! - **Neighbor Search** ([`spatial`]) - Fixed-radius queries over atom coordinates
//! - **Connectivity** ([`topology`]) - Bond graphs perceived from covalent radii
//! - **Geometry** ([`utils`]) - Hydrogen placement and angle helpers
//!
//! Nothing in this layer spawns processes or tracks charges; those concerns
//! live in [`crate::engine`] and [`crate::tools`].

pub mod io;
pub mod models;
pub mod spatial;
pub mod topology;
pub mod utils;
