use serde::Serialize;
use std::io::Write;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DiagnosticsError {
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// How an atom's final charge was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChargeStatus {
    /// Written by a fragment whose core contained the atom.
    Refined,
    /// Never covered by any fragment core; keeps its empirical charge.
    Empirical,
    /// Covered only by fragments that failed; keeps its empirical charge.
    Unresolved,
    /// The chosen value was NaN and has been replaced with 0.0.
    NanZeroed,
}

/// One row of the per-atom diagnostics table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AtomDiagnostic {
    pub atom_index: usize,
    pub chain: String,
    pub residue: String,
    pub residue_seq: isize,
    pub atom_name: String,
    pub element: String,
    pub empirical_charge: f64,
    pub final_charge: f64,
    pub status: ChargeStatus,
    /// 1-based index of the center atom whose fragment wrote the charge.
    pub source_center: Option<usize>,
    pub center_distance: Option<f64>,
}

/// One row of the per-fragment diagnostics table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FragmentDiagnostic {
    /// 1-based index of the center atom.
    pub center_index: usize,
    pub center_name: String,
    pub residue: String,
    pub outcome: String,
    pub inner_atoms: usize,
    pub outer_atoms: usize,
    pub core_atoms: usize,
    pub broken_bonds: usize,
    pub repaired_atoms: usize,
    pub cut_carbons: usize,
    pub capping_atoms: usize,
    pub net_charge: Option<i64>,
    pub message: String,
}

fn write_records<T: Serialize>(records: &[T], writer: impl Write) -> Result<(), DiagnosticsError> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    for record in records {
        csv_writer.serialize(record)?;
    }
    csv_writer.flush()?;
    Ok(())
}

pub fn write_atom_diagnostics(
    records: &[AtomDiagnostic],
    writer: impl Write,
) -> Result<(), DiagnosticsError> {
    write_records(records, writer)
}

pub fn write_fragment_diagnostics(
    records: &[FragmentDiagnostic],
    writer: impl Write,
) -> Result<(), DiagnosticsError> {
    write_records(records, writer)
}

pub fn write_atom_diagnostics_to_path(
    records: &[AtomDiagnostic],
    path: &Path,
) -> Result<(), DiagnosticsError> {
    write_atom_diagnostics(records, std::fs::File::create(path)?)
}

pub fn write_fragment_diagnostics_to_path(
    records: &[FragmentDiagnostic],
    path: &Path,
) -> Result<(), DiagnosticsError> {
    write_fragment_diagnostics(records, std::fs::File::create(path)?)
}
