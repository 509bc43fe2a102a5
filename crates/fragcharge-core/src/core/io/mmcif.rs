//! mmCIF reader and writer that preserves the source document.
//!
//! The input is split into category sections (loops, key-value items, and
//! everything else) so that a file can be written back with only targeted
//! edits: removing a category, or appending the partial-charge blocks. Atoms
//! are taken from the first model of the `_atom_site` loop in file order,
//! which defines the global atom order for every charge array.

use crate::core::io::traits::StructureFile;
use crate::core::models::builder::{BuilderError, StructureBuilder};
use crate::core::models::element::Element;
use crate::core::models::structure::Structure;
use nalgebra::Point3;
use std::io::{self, BufRead, Write};
use thiserror::Error;

pub const ATOM_SITE_CATEGORY: &str = "_atom_site";
pub const CHEM_COMP_CATEGORY: &str = "_chem_comp";
pub const CHARGES_META_CATEGORY: &str = "_sb_ncbr_partial_atomic_charges_meta";
pub const CHARGES_CATEGORY: &str = "_sb_ncbr_partial_atomic_charges";

#[derive(Debug, Error)]
pub enum MmcifError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("No _atom_site loop found in the document")]
    MissingAtomSite,
    #[error("_atom_site loop is missing required column: {0}")]
    MissingColumn(&'static str),
    #[error("Row {row} of {category} has {found} values, expected {expected}")]
    RaggedLoop {
        category: String,
        row: usize,
        expected: usize,
        found: usize,
    },
    #[error("Invalid {field} value '{value}' in _atom_site row {row}")]
    InvalidValue {
        field: &'static str,
        value: String,
        row: usize,
    },
    #[error("Structure assembly failed: {0}")]
    Builder(#[from] BuilderError),
}

/// A contiguous run of document lines belonging to one category.
#[derive(Debug, Clone, PartialEq)]
pub enum CifSection {
    /// A `loop_` block: the `loop_` keyword, its tags, and its rows.
    Loop { category: String, lines: Vec<String> },
    /// Consecutive `_category.item value` pairs of one category.
    Items { category: String, lines: Vec<String> },
    /// Data block headers, comments, blank lines.
    Other { lines: Vec<String> },
}

impl CifSection {
    pub fn category(&self) -> Option<&str> {
        match self {
            CifSection::Loop { category, .. } | CifSection::Items { category, .. } => {
                Some(category)
            }
            CifSection::Other { .. } => None,
        }
    }

    pub fn lines(&self) -> &[String] {
        match self {
            CifSection::Loop { lines, .. }
            | CifSection::Items { lines, .. }
            | CifSection::Other { lines } => lines,
        }
    }
}

/// Everything in an mmCIF document besides the parsed atoms.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MmcifMetadata {
    pub sections: Vec<CifSection>,
    /// Charges from an existing `_sb_ncbr_partial_atomic_charges` loop, ordered
    /// by atom id. Values that were `?` or `.` are NaN.
    pub embedded_charges: Option<Vec<f64>>,
}

/// Per-atom charges plus the method labels written into the metadata loop.
#[derive(Debug, Clone, Copy)]
pub struct ChargeAnnotation<'a> {
    pub type_label: &'a str,
    pub method: &'a str,
    pub charges: &'a [f64],
}

impl MmcifMetadata {
    pub fn from_lines(lines: Vec<String>) -> Self {
        Self {
            sections: split_sections(lines),
            embedded_charges: None,
        }
    }

    pub fn has_category(&self, category: &str) -> bool {
        self.sections.iter().any(|s| s.category() == Some(category))
    }

    fn loop_section(&self, category: &str) -> Option<&[String]> {
        self.sections.iter().find_map(|s| match s {
            CifSection::Loop { category: c, lines } if c == category => Some(lines.as_slice()),
            _ => None,
        })
    }

    /// Removes every section of `category`, returning how many were dropped.
    pub fn remove_category(&mut self, category: &str) -> usize {
        let before = self.sections.len();
        self.sections.retain(|s| s.category() != Some(category));
        before - self.sections.len()
    }

    /// Appends a new loop followed by a `#` separator.
    pub fn push_loop(&mut self, category: &str, columns: &[&str], rows: &[Vec<String>]) {
        let mut lines = Vec::with_capacity(columns.len() + rows.len() + 1);
        lines.push("loop_".to_string());
        lines.extend(columns.iter().map(|c| format!("{}.{}", category, c)));
        lines.extend(rows.iter().map(|row| row.join(" ")));
        self.sections.push(CifSection::Loop {
            category: category.to_string(),
            lines,
        });
        self.sections.push(CifSection::Other {
            lines: vec!["#".to_string()],
        });
    }

    /// Replaces component definitions and any previous charge blocks with
    /// the given charges.
    ///
    /// The `_chem_comp` category is dropped because its per-component
    /// formal charges would contradict the recomputed partial charges.
    pub fn annotate_charges(&mut self, annotation: &ChargeAnnotation) {
        self.remove_category(CHEM_COMP_CATEGORY);
        self.remove_category(CHARGES_META_CATEGORY);
        self.remove_category(CHARGES_CATEGORY);

        self.push_loop(
            CHARGES_META_CATEGORY,
            &["id", "type", "method"],
            &[vec![
                "1".to_string(),
                quote_always(annotation.type_label),
                quote_always(annotation.method),
            ]],
        );

        let rows: Vec<Vec<String>> = annotation
            .charges
            .iter()
            .enumerate()
            .map(|(i, &charge)| vec!["1".to_string(), (i + 1).to_string(), format_charge(charge)])
            .collect();
        self.push_loop(CHARGES_CATEGORY, &["type_id", "atom_id", "charge"], &rows);
    }
}

/// Formats a charge with four decimals and a leading space for non-negative values.
pub fn format_charge(charge: f64) -> String {
    if charge.is_sign_negative() {
        format!("{:.4}", charge)
    } else {
        format!(" {:.4}", charge)
    }
}

pub struct MmcifFile;

impl StructureFile for MmcifFile {
    type Metadata = MmcifMetadata;
    type Error = MmcifError;

    fn read_from(reader: &mut impl BufRead) -> Result<(Structure, Self::Metadata), Self::Error> {
        let lines = reader.lines().collect::<Result<Vec<_>, _>>()?;
        let mut metadata = MmcifMetadata::from_lines(lines);

        let atom_site = metadata
            .loop_section(ATOM_SITE_CATEGORY)
            .ok_or(MmcifError::MissingAtomSite)?;
        let structure = parse_atom_site(atom_site)?;

        metadata.embedded_charges = match metadata.loop_section(CHARGES_CATEGORY) {
            Some(lines) => parse_embedded_charges(lines)?,
            None => None,
        };

        Ok((structure, metadata))
    }

    /// Writes the preserved document; a structure without a source
    /// `_atom_site` loop gets one generated from its atoms.
    fn write_to(
        structure: &Structure,
        metadata: &Self::Metadata,
        writer: &mut impl Write,
    ) -> Result<(), Self::Error> {
        if metadata.sections.is_empty() {
            writeln!(writer, "data_fragcharge")?;
            writeln!(writer, "#")?;
        }
        for section in &metadata.sections {
            for line in section.lines() {
                writeln!(writer, "{}", line)?;
            }
        }
        if !metadata.has_category(ATOM_SITE_CATEGORY) {
            write_atom_site(structure, writer)?;
        }
        Ok(())
    }
}

fn write_atom_site(structure: &Structure, writer: &mut impl Write) -> io::Result<()> {
    writeln!(writer, "loop_")?;
    for column in [
        "group_PDB",
        "id",
        "type_symbol",
        "label_atom_id",
        "label_comp_id",
        "label_asym_id",
        "label_seq_id",
        "pdbx_PDB_ins_code",
        "Cartn_x",
        "Cartn_y",
        "Cartn_z",
        "auth_seq_id",
        "auth_asym_id",
        "pdbx_PDB_model_num",
    ] {
        writeln!(writer, "{}.{}", ATOM_SITE_CATEGORY, column)?;
    }
    for atom in structure.atoms() {
        let group = if atom.hetero { "HETATM" } else { "ATOM" };
        let ins_code = atom
            .residue
            .ins_code
            .map_or_else(|| "?".to_string(), |c| c.to_string());
        writeln!(
            writer,
            "{} {} {} {} {} {} {} {} {:.3} {:.3} {:.3} {} {} 1",
            group,
            atom.serial,
            atom.element.symbol(),
            quote_string(&atom.name),
            quote_string(&atom.residue.name),
            quote_string(&atom.residue.chain_id),
            atom.residue.seq,
            ins_code,
            atom.position.x,
            atom.position.y,
            atom.position.z,
            atom.residue.seq,
            quote_string(&atom.residue.chain_id),
        )?;
    }
    writeln!(writer, "#")?;
    Ok(())
}

fn category_of(tag: &str) -> String {
    let tag = tag.split_whitespace().next().unwrap_or("");
    match tag.find('.') {
        Some(pos) => tag[..pos].to_string(),
        None => tag.to_string(),
    }
}

fn is_section_boundary(trimmed: &str) -> bool {
    trimmed.starts_with('_')
        || trimmed.starts_with("loop_")
        || trimmed.starts_with('#')
        || trimmed.starts_with("data_")
        || trimmed.starts_with("save_")
}

/// Returns the index just past a `;`-delimited text field starting at `start`.
fn skip_text_field(lines: &[String], start: usize) -> usize {
    let mut i = start + 1;
    while i < lines.len() && !lines[i].starts_with(';') {
        i += 1;
    }
    (i + 1).min(lines.len())
}

fn split_sections(lines: Vec<String>) -> Vec<CifSection> {
    let mut sections: Vec<CifSection> = Vec::new();
    let n = lines.len();
    let mut i = 0;

    while i < n {
        let trimmed = lines[i].trim_start();
        let start = i;

        if trimmed.starts_with("loop_") {
            i += 1;
            let mut category = String::new();
            while i < n && lines[i].trim_start().starts_with('_') {
                if category.is_empty() {
                    category = category_of(lines[i].trim_start());
                }
                i += 1;
            }
            while i < n {
                if lines[i].starts_with(';') {
                    i = skip_text_field(&lines, i);
                    continue;
                }
                if is_section_boundary(lines[i].trim_start()) {
                    break;
                }
                i += 1;
            }
            sections.push(CifSection::Loop {
                category,
                lines: lines[start..i].to_vec(),
            });
        } else if trimmed.starts_with('_') {
            let category = category_of(trimmed);
            let has_inline_value = tokenize_line(trimmed).len() >= 2;
            i += 1;
            if !has_inline_value && i < n {
                i = if lines[i].starts_with(';') {
                    skip_text_field(&lines, i)
                } else {
                    i + 1
                };
            }
            let chunk = lines[start..i].to_vec();
            match sections.last_mut() {
                Some(CifSection::Items {
                    category: previous,
                    lines: existing,
                }) if *previous == category => existing.extend(chunk),
                _ => sections.push(CifSection::Items {
                    category,
                    lines: chunk,
                }),
            }
        } else {
            i += 1;
            let chunk = lines[start..i].to_vec();
            match sections.last_mut() {
                Some(CifSection::Other { lines: existing }) => existing.extend(chunk),
                _ => sections.push(CifSection::Other { lines: chunk }),
            }
        }
    }
    sections
}

/// Splits one line into CIF tokens.
///
/// Quoted values close only at a quote followed by whitespace or the end of
/// the line, so names like `O5'` or `"O5'"` survive. An unquoted `#` at a
/// token start begins a comment.
fn tokenize_line(line: &str) -> Vec<String> {
    let chars: Vec<char> = line.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() {
            i += 1;
            continue;
        }
        if c == '#' {
            break;
        }
        if c == '\'' || c == '"' {
            let mut j = i + 1;
            while j < chars.len() {
                if chars[j] == c && (j + 1 == chars.len() || chars[j + 1].is_whitespace()) {
                    break;
                }
                j += 1;
            }
            tokens.push(chars[i + 1..j.min(chars.len())].iter().collect());
            i = j + 1;
            continue;
        }
        let mut j = i;
        while j < chars.len() && !chars[j].is_whitespace() {
            j += 1;
        }
        tokens.push(chars[i..j].iter().collect());
        i = j;
    }
    tokens
}

/// Splits a loop section into its column tags and row-major value tokens.
fn loop_contents(lines: &[String]) -> (Vec<String>, Vec<String>) {
    let mut tags = Vec::new();
    let mut values = Vec::new();
    let mut i = 1;

    while i < lines.len() && lines[i].trim_start().starts_with('_') {
        if let Some(tag) = lines[i].split_whitespace().next() {
            tags.push(tag.to_string());
        }
        i += 1;
    }
    while i < lines.len() {
        if lines[i].starts_with(';') {
            let end = skip_text_field(lines, i);
            let text: Vec<&str> = lines[i..end]
                .iter()
                .map(|l| l.as_str())
                .filter(|l| *l != ";")
                .collect();
            values.push(text.join("\n").trim_start_matches(';').to_string());
            i = end;
            continue;
        }
        values.extend(tokenize_line(&lines[i]));
        i += 1;
    }
    (tags, values)
}

fn rows_of<'a>(
    category: &str,
    tags: &[String],
    values: &'a [String],
) -> Result<std::slice::Chunks<'a, String>, MmcifError> {
    let width = tags.len().max(1);
    if values.len() % width != 0 {
        return Err(MmcifError::RaggedLoop {
            category: category.to_string(),
            row: values.len() / width + 1,
            expected: width,
            found: values.len() % width,
        });
    }
    Ok(values.chunks(width))
}

fn is_null(value: &str) -> bool {
    value == "?" || value == "."
}

/// Column index bookkeeping for `_atom_site` loop headers.
#[derive(Default)]
struct AtomSiteIndices {
    group_pdb: Option<usize>,
    id: Option<usize>,
    type_symbol: Option<usize>,
    auth_atom_id: Option<usize>,
    label_atom_id: Option<usize>,
    auth_comp_id: Option<usize>,
    label_comp_id: Option<usize>,
    auth_asym_id: Option<usize>,
    label_asym_id: Option<usize>,
    auth_seq_id: Option<usize>,
    label_seq_id: Option<usize>,
    ins_code: Option<usize>,
    cartn_x: Option<usize>,
    cartn_y: Option<usize>,
    cartn_z: Option<usize>,
    model_num: Option<usize>,
}

fn map_atom_site_indices(tags: &[String]) -> AtomSiteIndices {
    let mut indices = AtomSiteIndices::default();
    for (i, tag) in tags.iter().enumerate() {
        let item = tag.split_once('.').map_or("", |(_, item)| item);
        match item {
            "group_PDB" => indices.group_pdb = Some(i),
            "id" => indices.id = Some(i),
            "type_symbol" => indices.type_symbol = Some(i),
            "auth_atom_id" => indices.auth_atom_id = Some(i),
            "label_atom_id" => indices.label_atom_id = Some(i),
            "auth_comp_id" => indices.auth_comp_id = Some(i),
            "label_comp_id" => indices.label_comp_id = Some(i),
            "auth_asym_id" => indices.auth_asym_id = Some(i),
            "label_asym_id" => indices.label_asym_id = Some(i),
            "auth_seq_id" => indices.auth_seq_id = Some(i),
            "label_seq_id" => indices.label_seq_id = Some(i),
            "pdbx_PDB_ins_code" => indices.ins_code = Some(i),
            "Cartn_x" => indices.cartn_x = Some(i),
            "Cartn_y" => indices.cartn_y = Some(i),
            "Cartn_z" => indices.cartn_z = Some(i),
            "pdbx_PDB_model_num" => indices.model_num = Some(i),
            _ => {}
        }
    }
    indices
}

fn parse_atom_site(lines: &[String]) -> Result<Structure, MmcifError> {
    let (tags, values) = loop_contents(lines);
    let idx = map_atom_site_indices(&tags);

    let atom_name_idx = idx
        .auth_atom_id
        .or(idx.label_atom_id)
        .ok_or(MmcifError::MissingColumn("atom_id"))?;
    let comp_idx = idx.auth_comp_id.or(idx.label_comp_id);
    let chain_idx = idx.auth_asym_id.or(idx.label_asym_id);
    let seq_idx = idx.auth_seq_id.or(idx.label_seq_id);
    let x_idx = idx.cartn_x.ok_or(MmcifError::MissingColumn("Cartn_x"))?;
    let y_idx = idx.cartn_y.ok_or(MmcifError::MissingColumn("Cartn_y"))?;
    let z_idx = idx.cartn_z.ok_or(MmcifError::MissingColumn("Cartn_z"))?;

    let mut builder = StructureBuilder::new();
    let mut first_model: Option<String> = None;

    for (row_num, row) in rows_of(ATOM_SITE_CATEGORY, &tags, &values)?.enumerate() {
        let row_num = row_num + 1;
        let get = |i: Option<usize>| i.map(|i| row[i].as_str()).filter(|v| !is_null(v));

        if let Some(model) = get(idx.model_num) {
            let first = first_model.get_or_insert_with(|| model.to_string());
            if first.as_str() != model {
                continue;
            }
        }

        let coordinate = |i: usize, field: &'static str| -> Result<f64, MmcifError> {
            row[i].parse().map_err(|_| MmcifError::InvalidValue {
                field,
                value: row[i].clone(),
                row: row_num,
            })
        };
        let position = Point3::new(
            coordinate(x_idx, "Cartn_x")?,
            coordinate(y_idx, "Cartn_y")?,
            coordinate(z_idx, "Cartn_z")?,
        );

        let name = row[atom_name_idx].as_str();
        let element = match get(idx.type_symbol) {
            Some(symbol) => Element::from_symbol(symbol),
            None => Element::from_atom_name(name),
        };
        let seq = match get(seq_idx) {
            Some(value) => value.parse().map_err(|_| MmcifError::InvalidValue {
                field: "seq_id",
                value: value.to_string(),
                row: row_num,
            })?,
            None => 0,
        };
        let serial = get(idx.id)
            .and_then(|v| v.parse().ok())
            .unwrap_or(builder.atom_count() + 1);
        let hetero = get(idx.group_pdb) == Some("HETATM");
        let ins_code = get(idx.ins_code).and_then(|v| v.chars().next());

        builder.ensure_residue(
            get(chain_idx).unwrap_or(""),
            seq,
            ins_code,
            get(comp_idx).unwrap_or("UNK"),
            hetero,
        );
        builder.add_atom(serial, name, element, position)?;
    }

    Ok(builder.build())
}

fn parse_embedded_charges(lines: &[String]) -> Result<Option<Vec<f64>>, MmcifError> {
    let (tags, values) = loop_contents(lines);
    let find = |item: &str| {
        tags.iter()
            .position(|t| t.split_once('.').is_some_and(|(_, i)| i == item))
    };
    let (Some(type_idx), Some(atom_idx), Some(charge_idx)) =
        (find("type_id"), find("atom_id"), find("charge"))
    else {
        return Ok(None);
    };

    let mut first_type: Option<&str> = None;
    let mut entries: Vec<(usize, f64)> = Vec::new();
    for row in rows_of(CHARGES_CATEGORY, &tags, &values)? {
        let type_id = row[type_idx].as_str();
        if *first_type.get_or_insert(type_id) != type_id {
            continue;
        }
        let Ok(atom_id) = row[atom_idx].parse::<usize>() else {
            continue;
        };
        let charge = row[charge_idx].trim().parse().unwrap_or(f64::NAN);
        entries.push((atom_id, charge));
    }
    if entries.is_empty() {
        return Ok(None);
    }
    entries.sort_by_key(|(atom_id, _)| *atom_id);
    Ok(Some(entries.into_iter().map(|(_, c)| c).collect()))
}

/// Quotes a value only when it would otherwise not survive tokenization.
fn quote_string(s: &str) -> String {
    if s.is_empty() {
        return "?".to_string();
    }
    if !s.contains(char::is_whitespace) && !s.contains('\'') && !s.contains('"') {
        return s.to_string();
    }
    quote_always(s)
}

fn quote_always(s: &str) -> String {
    if s.contains('\'') && !s.contains('"') {
        format!("\"{}\"", s)
    } else {
        format!("'{}'", s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::ids::AtomId;
    use std::io::Cursor;

    const GLYCINE: &str = "\
data_GLY
#
_entry.id GLY
#
_chem_comp.id GLY
_chem_comp.type 'L-peptide linking'
#
loop_
_atom_site.group_PDB
_atom_site.id
_atom_site.type_symbol
_atom_site.label_atom_id
_atom_site.label_comp_id
_atom_site.label_asym_id
_atom_site.label_seq_id
_atom_site.pdbx_PDB_ins_code
_atom_site.Cartn_x
_atom_site.Cartn_y
_atom_site.Cartn_z
_atom_site.auth_seq_id
_atom_site.auth_asym_id
_atom_site.pdbx_PDB_model_num
ATOM 1 N N GLY A 1 ? -1.200 0.850 0.000 1 A 1
ATOM 2 C CA GLY A 1 ? 0.000 0.000 0.000 1 A 1
ATOM 3 O \"O5'\" GLY A 1 ? 1.250 2.100 0.000 1 A 1
ATOM 4 C CA GLY A 1 ? 9.000 9.000 9.000 1 A 2
#
loop_
_chem_comp_bond.comp_id
_chem_comp_bond.atom_id_1
GLY N
#
";

    fn read(text: &str) -> (Structure, MmcifMetadata) {
        MmcifFile::read_from(&mut Cursor::new(text)).unwrap()
    }

    #[test]
    fn reads_first_model_atoms_in_file_order() {
        let (structure, _) = read(GLYCINE);
        assert_eq!(structure.len(), 3);
        let names: Vec<&str> = structure.atoms().iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["N", "CA", "O5'"]);
        let ca = structure.atom(AtomId::new(1)).unwrap();
        assert_eq!(ca.element, Element::C);
        assert_eq!(ca.residue.chain_id, "A");
        assert_eq!(ca.residue.seq, 1);
        assert_eq!(ca.residue.ins_code, None);
    }

    #[test]
    fn sections_are_split_by_category() {
        let (_, metadata) = read(GLYCINE);
        assert!(metadata.has_category("_entry"));
        assert!(metadata.has_category(CHEM_COMP_CATEGORY));
        assert!(metadata.has_category("_chem_comp_bond"));
        assert!(metadata.has_category(ATOM_SITE_CATEGORY));
    }

    #[test]
    fn annotation_drops_chem_comp_and_appends_charge_loops() {
        let (structure, mut metadata) = read(GLYCINE);
        metadata.annotate_charges(&ChargeAnnotation {
            type_label: "QM",
            method: "GFN1-xTB/CM5 fragment",
            charges: &[0.25, -0.5, 0.0],
        });

        assert!(!metadata.has_category(CHEM_COMP_CATEGORY));
        assert!(metadata.has_category("_chem_comp_bond"));

        let mut out = Vec::new();
        MmcifFile::write_to(&structure, &metadata, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();

        assert!(!text.contains("_chem_comp.id"));
        assert!(text.contains("_chem_comp_bond.comp_id"));
        assert!(text.contains("_sb_ncbr_partial_atomic_charges_meta.method"));
        assert!(text.contains("1 'QM' 'GFN1-xTB/CM5 fragment'"));
        assert!(text.contains("1 1  0.2500"));
        assert!(text.contains("1 2 -0.5000"));
        assert!(text.contains("1 3  0.0000"));
    }

    #[test]
    fn annotated_output_reads_back_with_embedded_charges() {
        let (structure, mut metadata) = read(GLYCINE);
        metadata.annotate_charges(&ChargeAnnotation {
            type_label: "QM",
            method: "test",
            charges: &[0.1, 0.2, -0.3],
        });
        let mut out = Vec::new();
        MmcifFile::write_to(&structure, &metadata, &mut out).unwrap();

        let (reread, reread_meta) = MmcifFile::read_from(&mut Cursor::new(out)).unwrap();
        assert_eq!(reread.len(), 3);
        assert_eq!(reread_meta.embedded_charges, Some(vec![0.1, 0.2, -0.3]));
    }

    #[test]
    fn repeated_annotation_replaces_previous_charges() {
        let (structure, mut metadata) = read(GLYCINE);
        for charges in [[1.0, 1.0, 1.0], [2.0, 2.0, 2.0]] {
            metadata.annotate_charges(&ChargeAnnotation {
                type_label: "QM",
                method: "m",
                charges: &charges,
            });
        }
        let mut out = Vec::new();
        MmcifFile::write_to(&structure, &metadata, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text.matches("_sb_ncbr_partial_atomic_charges.charge").count(), 1);
        assert!(text.contains(" 2.0000"));
        assert!(!text.contains(" 1.0000"));
    }

    #[test]
    fn missing_atom_site_is_an_error() {
        let result = MmcifFile::read_from(&mut Cursor::new("data_x\n_entry.id x\n"));
        assert!(matches!(result, Err(MmcifError::MissingAtomSite)));
    }

    #[test]
    fn ragged_atom_site_is_reported() {
        let text = "data_x\nloop_\n_atom_site.id\n_atom_site.label_atom_id\n_atom_site.Cartn_x\n_atom_site.Cartn_y\n_atom_site.Cartn_z\n1 CA 0 0 0\n2 CB 1 1\n";
        match MmcifFile::read_from(&mut Cursor::new(text)) {
            Err(MmcifError::RaggedLoop { row, found, .. }) => {
                assert_eq!(row, 2);
                assert_eq!(found, 4);
            }
            other => panic!("unexpected: {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn generated_atom_site_round_trips() {
        let (structure, _) = read(GLYCINE);
        let mut out = Vec::new();
        MmcifFile::write_to(&structure, &MmcifMetadata::default(), &mut out).unwrap();
        let (reread, _) = MmcifFile::read_from(&mut Cursor::new(out)).unwrap();
        assert_eq!(reread.len(), structure.len());
        assert_eq!(reread.atoms()[2].name, "O5'");
    }

    #[test]
    fn text_fields_do_not_break_sectioning() {
        let text = "data_x\n_struct.title\n;A multi-line\n_title_like text\n;\nloop_\n_atom_site.label_atom_id\n_atom_site.Cartn_x\n_atom_site.Cartn_y\n_atom_site.Cartn_z\nCA 1.0 2.0 3.0\n";
        let (structure, metadata) = read(text);
        assert_eq!(structure.len(), 1);
        assert!(metadata.has_category("_struct"));
        assert!(!metadata.has_category("_title_like"));
    }

    #[test]
    fn tokenizer_handles_embedded_quotes_and_comments() {
        assert_eq!(
            tokenize_line("ATOM \"O5'\" 'a b' x # trailing"),
            vec!["ATOM", "O5'", "a b", "x"]
        );
    }

    #[test]
    fn charge_formatting_pads_non_negative_values() {
        assert_eq!(format_charge(0.12345), " 0.1235");
        assert_eq!(format_charge(-0.5), "-0.5000");
        assert_eq!(format_charge(0.0), " 0.0000");
    }
}
