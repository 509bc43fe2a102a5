//! # Tools Module
//!
//! Typed adapters around the programs a fragment calculation depends on.
//!
//! Each adapter implements one of the engine's tool seams
//! ([`ValenceSaturator`](crate::engine::capping::ValenceSaturator) or
//! [`ChargeSolver`](crate::engine::solver::ChargeSolver)) so the pipeline
//! never builds command lines itself:
//!
//! - **Process runner** ([`process`]) - blocking subprocess execution with a
//!   poll-and-kill timeout, cancellation, and file-captured output streams.
//! - **Open Babel** ([`openbabel`]) - hydrogen addition via `obabel -h`.
//! - **xtb** ([`xtb`]) - GFN-xTB single points with a fixed total charge.
//! - **Geometric saturator** ([`geometric`]) - an in-process hydrogen placer
//!   that needs no external binary.

pub mod geometric;
pub mod openbabel;
pub mod process;
pub mod xtb;

use crate::engine::capping::ValenceSaturator;
use crate::engine::config::{ChargeConfig, SaturatorConfig};
use crate::engine::solver::ChargeSolver;
use geometric::GeometricSaturator;
use openbabel::OpenBabelSaturator;
use xtb::XtbSolver;

/// The saturator and solver a run uses.
pub struct Toolchain {
    pub saturator: Box<dyn ValenceSaturator>,
    pub solver: Box<dyn ChargeSolver>,
}

impl Toolchain {
    pub fn new(saturator: Box<dyn ValenceSaturator>, solver: Box<dyn ChargeSolver>) -> Self {
        Self { saturator, solver }
    }

    /// Builds the adapters named by the configuration.
    pub fn from_config(config: &ChargeConfig) -> Self {
        let saturator: Box<dyn ValenceSaturator> = match &config.saturator {
            SaturatorConfig::OpenBabel {
                executable,
                timeout,
            } => Box::new(OpenBabelSaturator::new(executable.clone(), *timeout)),
            SaturatorConfig::Geometric => Box::new(GeometricSaturator::default()),
        };
        Self {
            saturator,
            solver: Box::new(XtbSolver::new(config.solver.clone())),
        }
    }
}
