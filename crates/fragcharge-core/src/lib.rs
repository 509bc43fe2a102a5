//! # fragcharge Core Library
//!
//! Fragment-based refinement of atomic partial charges for biomolecular
//! structures using semi-empirical quantum chemistry.
//!
//! ## Architectural Philosophy
//!
//! The library keeps the same layering from data to procedure:
//!
//! - **[`core`]: The Foundation.** Stateless data models (`Structure`, `Atom`),
//!   bond perception, the spatial index, and file formats (PDB, mmCIF,
//!   charge lists, diagnostics tables).
//!
//! - **[`engine`]: The Logic Core.** The fragment pipeline stages, the charge
//!   ledger, and the seams ([`engine::capping::ValenceSaturator`],
//!   [`engine::solver::ChargeSolver`]) at which external programs plug in.
//!
//! - **[`tools`]: The Adapters.** Process execution and the concrete
//!   saturator and solver implementations.
//!
//! - **[`workflows`]: The Public API.** Ties everything together into a
//!   complete charge refinement run.

pub mod core;
pub mod engine;
pub mod tools;
pub mod workflows;
