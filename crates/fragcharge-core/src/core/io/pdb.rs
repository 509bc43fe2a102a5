use crate::core::io::traits::StructureFile;
use crate::core::models::atom::Atom;
use crate::core::models::builder::{BuilderError, StructureBuilder};
use crate::core::models::element::Element;
use crate::core::models::ids::AtomId;
use crate::core::models::structure::Structure;
use nalgebra::Point3;
use std::io::{self, BufRead, Write};
use thiserror::Error;

/// Raw ATOM/HETATM records kept alongside a parsed PDB structure.
///
/// `atom_lines[i]` is the verbatim source line of atom `AtomId(i)`, which
/// lets tool output be filtered and re-emitted without reformatting.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PdbMetadata {
    pub atom_lines: Vec<String>,
}

#[derive(Debug, Error)]
pub enum PdbError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Parse error on line {line}: {kind}")]
    Parse { line: usize, kind: PdbParseErrorKind },
    #[error("Structure assembly failed: {0}")]
    Builder(#[from] BuilderError),
    #[error("Atom {0} is not part of the structure")]
    UnknownAtom(AtomId),
}

#[derive(Debug, Error)]
pub enum PdbParseErrorKind {
    #[error("Invalid float format in columns {columns} (value: '{value}')")]
    InvalidFloat { columns: String, value: String },
    #[error("Line is too short for ATOM/HETATM record (must be at least 54 chars)")]
    LineTooShort,
}

fn slice_and_trim(line: &str, start: usize, end: usize) -> &str {
    line.get(start..end).unwrap_or("").trim()
}

fn parse_coordinate(line: &str, line_num: usize, start: usize, end: usize) -> Result<f64, PdbError> {
    let value = slice_and_trim(line, start, end);
    value.parse().map_err(|_| PdbError::Parse {
        line: line_num,
        kind: PdbParseErrorKind::InvalidFloat {
            columns: format!("{}-{}", start + 1, end),
            value: value.to_string(),
        },
    })
}

pub struct PdbFile;

impl StructureFile for PdbFile {
    type Metadata = PdbMetadata;
    type Error = PdbError;

    /// Reads ATOM/HETATM records; everything else is ignored.
    ///
    /// Serial and residue numbers are parsed leniently because valence tools
    /// sometimes emit them in non-decimal forms. Coordinates are mandatory.
    fn read_from(reader: &mut impl BufRead) -> Result<(Structure, Self::Metadata), Self::Error> {
        let mut builder = StructureBuilder::new();
        let mut metadata = PdbMetadata::default();

        for (line_num, line_res) in reader.lines().enumerate() {
            let line = line_res?;
            let line_num = line_num + 1;

            let record_type = slice_and_trim(&line, 0, 6);
            if record_type != "ATOM" && record_type != "HETATM" {
                continue;
            }
            if line.len() < 54 {
                return Err(PdbError::Parse {
                    line: line_num,
                    kind: PdbParseErrorKind::LineTooShort,
                });
            }

            let serial = slice_and_trim(&line, 6, 11)
                .parse()
                .unwrap_or(builder.atom_count() + 1);
            let name = slice_and_trim(&line, 12, 16);
            let res_name = slice_and_trim(&line, 17, 20);
            let chain_id = slice_and_trim(&line, 21, 22);
            let res_seq = slice_and_trim(&line, 22, 26).parse().unwrap_or(0);
            let ins_code = line.get(26..27).and_then(|s| s.chars().next()).filter(|c| *c != ' ');

            let x = parse_coordinate(&line, line_num, 30, 38)?;
            let y = parse_coordinate(&line, line_num, 38, 46)?;
            let z = parse_coordinate(&line, line_num, 46, 54)?;

            let element = match slice_and_trim(&line, 76, 78) {
                "" => Element::from_atom_name(name),
                symbol => Element::from_symbol(symbol),
            };

            builder.ensure_residue(chain_id, res_seq, ins_code, res_name, record_type == "HETATM");
            builder.add_atom(serial, name, element, Point3::new(x, y, z))?;
            metadata.atom_lines.push(line);
        }

        Ok((builder.build(), metadata))
    }

    /// Writes the structure as fixed-column records.
    ///
    /// Source lines in `metadata` are reused verbatim when there is exactly
    /// one per atom; otherwise records are regenerated from the structure.
    fn write_to(
        structure: &Structure,
        metadata: &Self::Metadata,
        writer: &mut impl Write,
    ) -> Result<(), Self::Error> {
        if metadata.atom_lines.len() == structure.len() && !structure.is_empty() {
            for line in &metadata.atom_lines {
                writeln!(writer, "{}", line)?;
            }
            writeln!(writer, "END")?;
            return Ok(());
        }
        let all: Vec<AtomId> = structure.ids().collect();
        write_fragment(structure, &all, writer)
    }
}

/// Writes a subset of atoms as a standalone PDB file.
///
/// Atoms are emitted in the order given and renumbered with local serials
/// starting at 1, so the n-th record always corresponds to `members[n - 1]`.
pub fn write_fragment(
    structure: &Structure,
    members: &[AtomId],
    writer: &mut impl Write,
) -> Result<(), PdbError> {
    for (i, &id) in members.iter().enumerate() {
        let atom = structure.atom(id).ok_or(PdbError::UnknownAtom(id))?;
        writeln!(writer, "{}", format_atom_record(i + 1, atom))?;
    }
    writeln!(writer, "END")?;
    Ok(())
}

/// Formats one fixed-column ATOM/HETATM record under the given serial.
pub fn format_atom_record(serial: usize, atom: &Atom) -> String {
    let record = if atom.hetero { "HETATM" } else { "ATOM" };
    let symbol = atom.element.symbol();
    let name_field = format_atom_name(&atom.name, symbol);
    let res_name: String = atom.residue.name.chars().take(3).collect();
    let chain = atom.residue.chain_id.chars().next().unwrap_or(' ');
    let res_seq = if (-999..=9999).contains(&atom.residue.seq) {
        atom.residue.seq
    } else {
        atom.residue.seq.rem_euclid(10000)
    };
    let ins_code = atom.residue.ins_code.unwrap_or(' ');
    let p = &atom.position;

    format!(
        "{:<6}{:>5} {}{:>3} {}{:>4}{}   {:>8.3}{:>8.3}{:>8.3}{:>6.2}{:>6.2}          {:>2}",
        record,
        serial % 100_000,
        name_field,
        res_name,
        chain,
        res_seq,
        ins_code,
        p.x,
        p.y,
        p.z,
        1.0,
        0.0,
        symbol.to_ascii_uppercase(),
    )
}

/// Pads an atom name into the 4-character name field plus the altLoc column.
fn format_atom_name(name: &str, symbol: &str) -> String {
    let name: String = name.chars().take(4).collect();
    if name.len() < 4 && symbol.len() == 1 {
        format!(" {:<3} ", name)
    } else {
        format!("{:<4} ", name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const SAMPLE: &str = "\
REMARK   generated for tests
ATOM      1  N   GLY A   1      -1.200   0.850   0.000  1.00  0.00           N
ATOM      2  CA  GLY A   1       0.000   0.000   0.000  1.00  0.00           C
HETATM    3  O   HOH W 101       5.000   5.000   5.000  1.00  0.00           O
HETATM    4  H   HOH W 101       5.960   5.000   5.000  1.00  0.00
END
";

    #[test]
    fn reads_atom_and_hetatm_records() {
        let (structure, metadata) = PdbFile::read_from(&mut Cursor::new(SAMPLE)).unwrap();
        assert_eq!(structure.len(), 4);
        assert_eq!(metadata.atom_lines.len(), 4);

        let ca = structure.atom(AtomId::new(1)).unwrap();
        assert_eq!(ca.name, "CA");
        assert_eq!(ca.element, Element::C);
        assert_eq!(ca.residue.name, "GLY");
        assert!(!ca.hetero);

        let water_h = structure.atom(AtomId::new(3)).unwrap();
        assert_eq!(water_h.element, Element::H);
        assert!(water_h.hetero);
        assert_eq!(water_h.residue.seq, 101);
        assert!((water_h.position.x - 5.96).abs() < 1e-9);
    }

    #[test]
    fn bad_coordinate_reports_columns() {
        let text = "ATOM      1  CA  GLY A   1       abc     0.000   0.000  1.00  0.00           C\n";
        match PdbFile::read_from(&mut Cursor::new(text)) {
            Err(PdbError::Parse {
                line: 1,
                kind: PdbParseErrorKind::InvalidFloat { columns, .. },
            }) => assert_eq!(columns, "31-38"),
            other => panic!("unexpected result: {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn short_record_is_rejected() {
        let text = "ATOM      1  CA  GLY A   1\n";
        assert!(matches!(
            PdbFile::read_from(&mut Cursor::new(text)),
            Err(PdbError::Parse {
                kind: PdbParseErrorKind::LineTooShort,
                ..
            })
        ));
    }

    #[test]
    fn fragment_records_use_fixed_columns_and_local_serials() {
        let (structure, _) = PdbFile::read_from(&mut Cursor::new(SAMPLE)).unwrap();
        let mut out = Vec::new();
        write_fragment(&structure, &[AtomId::new(2), AtomId::new(1)], &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines.len(), 3);
        assert_eq!(&lines[0][0..6], "HETATM");
        assert_eq!(lines[0][6..11].trim(), "1");
        assert_eq!(lines[0][12..16].trim(), "O");
        assert_eq!(lines[0][30..38].trim(), "5.000");
        assert_eq!(lines[0][76..78].trim(), "O");
        assert_eq!(lines[1][6..11].trim(), "2");
        assert_eq!(&lines[1][12..16], " CA ");
        assert_eq!(lines[1][22..26].trim(), "1");
        assert_eq!(lines[2], "END");
    }

    #[test]
    fn written_fragment_reads_back_with_same_geometry() {
        let (structure, _) = PdbFile::read_from(&mut Cursor::new(SAMPLE)).unwrap();
        let ids: Vec<AtomId> = structure.ids().collect();
        let mut out = Vec::new();
        write_fragment(&structure, &ids, &mut out).unwrap();

        let (reread, _) = PdbFile::read_from(&mut Cursor::new(out)).unwrap();
        assert_eq!(reread.len(), structure.len());
        for (a, b) in structure.atoms().iter().zip(reread.atoms()) {
            assert_eq!(a.element, b.element);
            assert!((a.position - b.position).norm() < 1e-3);
        }
    }

    #[test]
    fn write_to_reuses_source_lines() {
        let (structure, metadata) = PdbFile::read_from(&mut Cursor::new(SAMPLE)).unwrap();
        let mut out = Vec::new();
        PdbFile::write_to(&structure, &metadata, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with(&metadata.atom_lines[0]));
        assert!(!text.contains("REMARK"));
    }
}
