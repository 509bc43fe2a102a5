//! # Engine Module
//!
//! The fragment pipeline: everything between a parsed structure and a
//! refined charge vector.
//!
//! ## Overview
//!
//! Each heavy-atom center is turned into a small, chemically sensible
//! fragment, charged by an external QM solver, and its core charges are
//! written back into a shared ledger. The stages are independent types so
//! that each one can be tested against hand-built structures.
//!
//! ## Architecture
//!
//! - **Configuration** ([`config`]) - radii, tool settings, merge and failure policies
//! - **Fragment Extraction** ([`fragment`]) - center classification and shell selection
//! - **Topology Comparison** ([`comparator`]) - bonds severed by the inner shell
//! - **Boundary Repair** ([`repair`]) - grows the fragment across non C-C cuts
//! - **Capping** ([`capping`]) - hydrogen saturation limited to cut carbons
//! - **Charge Calculation** ([`solver`]) - solver invocation and report parsing
//! - **Merging** ([`merge`]) - the ledger that resolves overlapping cores
//! - **Workspaces** ([`workspace`]) - per-fragment scratch directories
//! - **Progress and Cancellation** ([`progress`], [`cancel`])
//! - **Error Handling** ([`error`])

pub mod cancel;
pub mod capping;
pub mod comparator;
pub mod config;
pub mod error;
pub mod fragment;
pub mod merge;
pub mod progress;
pub mod repair;
pub mod solver;
pub mod workspace;

#[cfg(test)]
pub(crate) mod fixtures;
