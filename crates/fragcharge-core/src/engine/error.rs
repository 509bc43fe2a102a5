use std::io;
use thiserror::Error;

use super::config::ConfigError;
use crate::core::io::pdb::PdbError;
use crate::core::models::ids::AtomId;
use crate::core::spatial::SpatialError;

/// Failure of an external program invoked on one fragment.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Failed to launch '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("'{program}' exited with {status}: {stderr}")]
    ExitStatus {
        program: String,
        status: String,
        stderr: String,
    },

    #[error("'{program}' did not finish within {seconds:.0} s")]
    Timeout { program: String, seconds: f64 },

    #[error("I/O error while running '{program}': {source}")]
    Io {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("'{program}' produced no usable output: {reason}")]
    MissingOutput { program: String, reason: String },

    #[error("'{program}' was interrupted by cancellation")]
    Interrupted { program: String },
}

/// The solver report could not be read as a charge table.
#[derive(Debug, Error, PartialEq)]
pub enum SolverFormatError {
    #[error("charge table header '{header}' not found")]
    MissingHeader { header: String },

    #[error("charge table has {found} rows, expected {expected}")]
    TruncatedTable { expected: usize, found: usize },

    #[error("row {row} has no column {column}: '{line}'")]
    MissingColumn {
        row: usize,
        column: usize,
        line: String,
    },

    #[error("row {row} holds an unparsable charge '{value}'")]
    InvalidValue { row: usize, value: String },
}

/// Failure confined to a single fragment.
#[derive(Debug, Error)]
pub enum FragmentError {
    #[error("Atom correlation failed: {0}")]
    Correlation(String),

    #[error(transparent)]
    Tool(#[from] ToolError),

    #[error("Malformed solver report: {0}")]
    SolverFormat(#[from] SolverFormatError),

    #[error("Fragment file error: {0}")]
    Pdb(#[from] PdbError),

    #[error("Spatial query failed: {0}")]
    Spatial(#[from] SpatialError),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Cancelled")]
    Cancelled,
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Invalid coordinates: {0}")]
    InvalidCoordinates(#[from] SpatialError),

    #[error("Expected {expected} empirical charges (one per atom), found {found}")]
    ChargeCountMismatch { expected: usize, found: usize },

    #[error("All empirical charges are zero; the structure has not been charged")]
    EmpiricalChargesAllZero,

    #[error("Fragment centered on atom {center} failed: {source}")]
    Fragment {
        center: AtomId,
        #[source]
        source: FragmentError,
    },

    #[error("Failed to prepare working directory: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to build worker pool: {0}")]
    ThreadPool(String),

    #[error("Run was cancelled")]
    Cancelled,
}
