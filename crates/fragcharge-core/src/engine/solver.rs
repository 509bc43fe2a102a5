use crate::engine::cancel::CancellationToken;
use crate::engine::capping::CappedFragment;
use crate::engine::config::SolverConfig;
use crate::engine::error::{FragmentError, SolverFormatError, ToolError};
use std::path::Path;
use tracing::debug;

pub struct SolverJob<'a> {
    /// Capped fragment in PDB format.
    pub input: &'a Path,
    pub work_dir: &'a Path,
    pub total_charge: i64,
    pub atom_count: usize,
    pub cancel: &'a CancellationToken,
}

/// A quantum-chemistry backend that reports per-atom charges as text.
pub trait ChargeSolver: Send + Sync {
    fn name(&self) -> &str;

    /// Runs the calculation and returns the raw report.
    fn solve(&self, job: &SolverJob) -> Result<String, ToolError>;
}

/// Reads `expected` charges from the table that follows `header`.
///
/// The header is matched against each line with leading whitespace removed.
/// Every following row must have a whitespace token at `column`.
pub fn parse_charge_report(
    report: &str,
    header: &str,
    column: usize,
    expected: usize,
) -> Result<Vec<f64>, SolverFormatError> {
    let mut lines = report.lines();
    lines
        .by_ref()
        .find(|line| line.trim_start().starts_with(header))
        .ok_or_else(|| SolverFormatError::MissingHeader {
            header: header.to_string(),
        })?;

    let mut charges = Vec::with_capacity(expected);
    for (row, line) in lines.take(expected).enumerate() {
        let token = line.split_whitespace().nth(column).ok_or_else(|| {
            if line.trim().is_empty() {
                SolverFormatError::TruncatedTable {
                    expected,
                    found: row,
                }
            } else {
                SolverFormatError::MissingColumn {
                    row: row + 1,
                    column,
                    line: line.trim().to_string(),
                }
            }
        })?;
        let value = token
            .parse::<f64>()
            .map_err(|_| SolverFormatError::InvalidValue {
                row: row + 1,
                value: token.to_string(),
            })?;
        charges.push(value);
    }

    if charges.len() < expected {
        return Err(SolverFormatError::TruncatedTable {
            expected,
            found: charges.len(),
        });
    }
    Ok(charges)
}

/// Runs the solver on a capped fragment under a fixed total charge.
pub struct ChargeEngine<'a> {
    solver: &'a dyn ChargeSolver,
    config: &'a SolverConfig,
}

impl<'a> ChargeEngine<'a> {
    pub fn new(solver: &'a dyn ChargeSolver, config: &'a SolverConfig) -> Self {
        Self { solver, config }
    }

    /// Returns one charge per atom of the capped file, originals first.
    pub fn compute(
        &self,
        capped: &CappedFragment,
        total_charge: i64,
        work_dir: &Path,
        cancel: &CancellationToken,
    ) -> Result<Vec<f64>, FragmentError> {
        let report = self.solver.solve(&SolverJob {
            input: &capped.path,
            work_dir,
            total_charge,
            atom_count: capped.atom_count(),
            cancel,
        })?;
        let charges = parse_charge_report(
            &report,
            &self.config.header,
            self.config.charge_column,
            capped.atom_count(),
        )?;
        debug!(
            solver = self.solver.name(),
            atoms = charges.len(),
            total_charge,
            "Solver report parsed."
        );
        Ok(charges)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::element::Element;
    use crate::engine::fixtures::xtb_report;

    const HEADER: &str = "Mulliken/CM5 charges";

    #[test]
    fn reads_the_cm5_column() {
        let report = xtb_report(&[(Element::C, -0.25), (Element::H, 0.125), (Element::O, 0.5)]);
        let charges = parse_charge_report(&report, HEADER, 3, 3).unwrap();
        assert_eq!(charges, vec![-0.25, 0.125, 0.5]);
    }

    #[test]
    fn reads_only_the_requested_rows() {
        let report = xtb_report(&[(Element::C, 0.1), (Element::H, 0.2), (Element::H, 0.3)]);
        let charges = parse_charge_report(&report, HEADER, 3, 2).unwrap();
        assert_eq!(charges.len(), 2);
    }

    #[test]
    fn missing_header_is_reported() {
        let err = parse_charge_report("normal termination of xtb\n", HEADER, 3, 1).unwrap_err();
        assert_eq!(
            err,
            SolverFormatError::MissingHeader {
                header: HEADER.to_string()
            }
        );
    }

    #[test]
    fn short_table_is_reported() {
        let report = xtb_report(&[(Element::C, 0.1), (Element::H, 0.2)]);
        let err = parse_charge_report(&report, HEADER, 3, 5).unwrap_err();
        assert_eq!(
            err,
            SolverFormatError::TruncatedTable {
                expected: 5,
                found: 2
            }
        );

        let report = format!("  {}\n     1 C  0.1 0.2 1.0 2.0 0.0\n", HEADER);
        let err = parse_charge_report(&report, HEADER, 3, 3).unwrap_err();
        assert_eq!(
            err,
            SolverFormatError::TruncatedTable {
                expected: 3,
                found: 1
            }
        );
    }

    #[test]
    fn unparsable_value_is_reported() {
        let report = format!("  {}\n     1 C  0.1 abc 1.0\n", HEADER);
        let err = parse_charge_report(&report, HEADER, 3, 1).unwrap_err();
        assert_eq!(
            err,
            SolverFormatError::InvalidValue {
                row: 1,
                value: "abc".to_string()
            }
        );
    }

    #[test]
    fn narrow_row_is_reported() {
        let report = format!("  {}\n     1 C\n", HEADER);
        let err = parse_charge_report(&report, HEADER, 3, 1).unwrap_err();
        assert!(matches!(err, SolverFormatError::MissingColumn { row: 1, .. }));
    }

    #[test]
    fn nan_values_pass_through() {
        let report = format!("  {}\n     1 C  NaN NaN 1.0\n", HEADER);
        let charges = parse_charge_report(&report, HEADER, 3, 1).unwrap();
        assert!(charges[0].is_nan());
    }
}
