use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChargeFileError {
    #[error("Failed to read charge file '{path}': {source}", path = path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Invalid charge value '{value}' at position {position}")]
    InvalidValue { value: String, position: usize },
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Parses whitespace-separated charges, one per atom in global order.
///
/// `nan` and `inf` tokens are accepted and passed through unchanged; the
/// caller decides how non-finite values are treated.
pub fn parse_charges(text: &str) -> Result<Vec<f64>, ChargeFileError> {
    text.split_whitespace()
        .enumerate()
        .map(|(i, token)| {
            token.parse().map_err(|_| ChargeFileError::InvalidValue {
                value: token.to_string(),
                position: i + 1,
            })
        })
        .collect()
}

pub fn read_charges(path: &Path) -> Result<Vec<f64>, ChargeFileError> {
    let text = fs::read_to_string(path).map_err(|source| ChargeFileError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_charges(&text)
}

/// Writes all charges on a single space-separated line.
pub fn write_charges(charges: &[f64], writer: &mut impl Write) -> Result<(), ChargeFileError> {
    let line = charges
        .iter()
        .map(|c| format!("{:?}", c))
        .collect::<Vec<_>>()
        .join(" ");
    writeln!(writer, "{}", line)?;
    Ok(())
}

pub fn write_charges_to_path(charges: &[f64], path: &Path) -> Result<(), ChargeFileError> {
    let mut file = io::BufWriter::new(fs::File::create(path)?);
    write_charges(charges, &mut file)?;
    file.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_values_across_lines() {
        let charges = parse_charges("0.1 -0.2\n 0.3\tnan\n").unwrap();
        assert_eq!(charges.len(), 4);
        assert_eq!(&charges[..3], &[0.1, -0.2, 0.3]);
        assert!(charges[3].is_nan());
    }

    #[test]
    fn invalid_token_reports_position() {
        match parse_charges("0.1 abc 0.3") {
            Err(ChargeFileError::InvalidValue { value, position }) => {
                assert_eq!(value, "abc");
                assert_eq!(position, 2);
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn written_line_parses_back_exactly() {
        let charges = vec![0.1, -0.25, 1.0, 0.0];
        let mut out = Vec::new();
        write_charges(&charges, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text, "0.1 -0.25 1.0 0.0\n");
        assert_eq!(parse_charges(&text).unwrap(), charges);
    }

    #[test]
    fn missing_file_is_reported_with_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.txt");
        assert!(matches!(
            read_charges(&path),
            Err(ChargeFileError::Read { .. })
        ));

        let out = dir.path().join("charges.txt");
        write_charges_to_path(&[0.5, -0.5], &out).unwrap();
        assert_eq!(read_charges(&out).unwrap(), vec![0.5, -0.5]);
    }
}
