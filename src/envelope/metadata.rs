//! Transfer- and file-level metadata accumulated from control records.

use tracing::trace;

use crate::codepage::Codepage;
use crate::recfm;
use crate::textunit::{self, TextUnit};

/// Metadata describing the whole transmission (from INMR01).
#[derive(Debug, Default, Clone)]
pub struct TransferMetadata {
    pub origin_node: String,
    pub origin_user: String,
    /// Origin timestamp, normalized to `YYYY-MM-DD HH:MM:SS`.
    pub origin_timestamp: Option<String>,
    pub num_files: u32,
    pub files: Vec<FileMetadata>,
}

/// Metadata describing one transmitted file (from INMR02).
#[derive(Debug, Default, Clone)]
pub struct FileMetadata {
    pub ddname: String,
    pub dsname: String,
    /// Dataset organization: "PS", "PO", "VSAM" or "UNKNOWN".
    pub dsorg: String,
    /// Dataset type: "PDS", "PDSE/LIBRARY", "PGMLIB", "EXTENDED" or "LARGE".
    pub dstype: String,
    /// Creation date, normalized to `YYYY-MM-DD`.
    pub creation: Option<String>,
    pub recfm: String,
    pub lrecl: u16,
    pub blksize: u16,
    pub approx_size: u64,
    pub utility: String,
}

impl TransferMetadata {
    /// Fold the INMR01 text units into the transfer header fields.
    pub fn apply_transfer_units(&mut self, units: &[TextUnit], cp: Codepage) {
        for unit in units {
            match unit.id {
                textunit::INMNUMF => self.num_files = unit.int_value() as u32,
                textunit::INMFUID => self.origin_user = unit.text_value(cp),
                textunit::INMFNODE => self.origin_node = unit.text_value(cp),
                textunit::INMFTIME => {
                    self.origin_timestamp = format_timestamp(&unit.text_value(cp));
                }
                id => trace!("unhandled transfer text unit 0x{id:04X}"),
            }
        }
    }

    /// The file that should drive extraction: the IEBCOPY unload when the
    /// transfer carries several files (a message file often rides along),
    /// otherwise the first file announced.
    pub fn extraction_file(&self) -> Option<&FileMetadata> {
        self.files
            .iter()
            .find(|f| f.utility == "IEBCOPY")
            .or_else(|| self.files.first())
    }
}

impl FileMetadata {
    /// Build one file record from the INMR02 text units.
    pub fn from_units(units: &[TextUnit], cp: Codepage) -> Self {
        let mut file = FileMetadata::default();
        for unit in units {
            match unit.id {
                textunit::INMUTILN => file.utility = unit.text_value(cp),
                textunit::INMDSORG => match unit.int_value() {
                    0x0008 => file.dsorg = "VSAM".to_string(),
                    0x0200 => {
                        file.dsorg = "PO".to_string();
                        // A partitioned dataset is a plain PDS unless an
                        // INMTYPE unit upgrades it below.
                        if file.dstype.is_empty() {
                            file.dstype = "PDS".to_string();
                        }
                    }
                    0x4000 => file.dsorg = "PS".to_string(),
                    _ => file.dsorg = "UNKNOWN".to_string(),
                },
                textunit::INMTYPE => {
                    let type_byte = unit.values.first().and_then(|v| v.first()).copied();
                    if let Some(b) = type_byte {
                        if b & 0x80 != 0 {
                            file.dstype = "PDSE/LIBRARY".to_string();
                        } else if b & 0x40 != 0 {
                            file.dstype = "PGMLIB".to_string();
                        } else if b & 0x04 != 0 {
                            file.dstype = "EXTENDED".to_string();
                        } else if b & 0x01 != 0 {
                            file.dstype = "LARGE".to_string();
                        }
                    }
                }
                textunit::INMRECFM => file.recfm = recfm::from_halfword(unit.int_value() as u16),
                textunit::INMCREAT => file.creation = format_date(&unit.text_value(cp)),
                textunit::INMLRECL => file.lrecl = unit.int_value() as u16,
                textunit::INMBLKSZ => file.blksize = unit.int_value() as u16,
                textunit::INMSIZE => file.approx_size = unit.int_value(),
                textunit::INMDDNAM => file.ddname = unit.text_value(cp),
                textunit::INMDSNAM => file.dsname = unit.joined_text(cp, "."),
                id => trace!("unhandled file text unit 0x{id:04X}"),
            }
        }
        file
    }

    /// True for partitioned datasets, the only organization that yields
    /// member output.
    pub fn is_partitioned(&self) -> bool {
        self.dsorg == "PO"
    }
}

/// Normalize an EBCDIC-decoded `YYYYMMDDHHMMSS` timestamp. Returns `None`
/// when the field is not fourteen digits.
fn format_timestamp(raw: &str) -> Option<String> {
    let digits = all_digits(raw, 14)?;
    Some(format!(
        "{}-{}-{} {}:{}:{}",
        &digits[0..4],
        &digits[4..6],
        &digits[6..8],
        &digits[8..10],
        &digits[10..12],
        &digits[12..14],
    ))
}

/// Normalize an EBCDIC-decoded `YYYYMMDD` date.
fn format_date(raw: &str) -> Option<String> {
    let digits = all_digits(raw, 8)?;
    Some(format!(
        "{}-{}-{}",
        &digits[0..4],
        &digits[4..6],
        &digits[6..8]
    ))
}

fn all_digits(raw: &str, expected: usize) -> Option<&str> {
    let trimmed = raw.trim();
    (trimmed.len() == expected && trimmed.bytes().all(|b| b.is_ascii_digit())).then_some(trimmed)
}
