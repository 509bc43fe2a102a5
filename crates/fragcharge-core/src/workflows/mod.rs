//! # Workflows Module
//!
//! The public entry points of the library.
//!
//! ## Overview
//!
//! A workflow takes a parsed structure and its empirical charges, runs every
//! fragment through the engine, and hands back the merged charges together
//! with per-atom and per-fragment diagnostics. Reading inputs and writing
//! output files stays with the caller.
//!
//! ## Architecture
//!
//! - **Charge Workflow** ([`charges`]) - center selection, parallel fragment
//!   calculations, and the ordered merge into the charge ledger.

pub mod charges;
