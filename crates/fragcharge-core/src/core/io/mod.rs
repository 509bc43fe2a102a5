//! Provides input/output functionality for the structure and charge formats
//! the engine consumes and produces.
//!
//! Structures are read from mmCIF ([`mmcif`]); fragments travel to external
//! tools as fixed-column PDB ([`pdb`]). Charge arrays ([`charges`]) and
//! per-atom/per-fragment diagnostics ([`diagnostics`]) are the remaining
//! run outputs.

pub mod charges;
pub mod diagnostics;
pub mod mmcif;
pub mod pdb;
pub mod traits;
