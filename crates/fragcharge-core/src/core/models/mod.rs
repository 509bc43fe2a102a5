//! # Core Models Module
//!
//! Plain data types describing the structure a charge calculation runs over.
//!
//! - [`ids`] - Stable atom identity ([`ids::AtomId`]), the key every fragment uses
//! - [`element`] - Element table with covalent radii and neutral valences
//! - [`atom`] - Immutable per-atom records and residue keys
//! - [`structure`] - The global, ordered atom set
//! - [`builder`] - Incremental construction used by the file readers
//!
//! Structural records carry no charges. Charges are tracked by
//! the engine in side tables keyed by [`ids::AtomId`].

pub mod atom;
pub mod builder;
pub mod element;
pub mod ids;
pub mod structure;
