//! Text units: the typed attributes carried in envelope control records.
//!
//! # Background
//!
//! TRANSMIT describes the dataset it is shipping with a TLV-style
//! substructure called "text units".  Each unit is a 16-bit big-endian
//! identifier, a 16-bit repetition count, and that many length-prefixed
//! value slots.  A unit may legally carry zero values (the identifier alone
//! acts as a flag).
//!
//! The parser here is deliberately ignorant of what the identifiers mean;
//! interpretation (integer vs. EBCDIC text vs. bit map) happens in the
//! envelope stage, which knows the semantics per identifier.

use byteorder::{BigEndian, ByteOrder};

use crate::codepage::Codepage;
use crate::error::XmitError;

pub const INMDDNAM: u16 = 0x0001; // DDNAME for the file
pub const INMDSNAM: u16 = 0x0002; // Name of the file
pub const INMMEMBR: u16 = 0x0003; // Member name list
pub const INMSECND: u16 = 0x000B; // Secondary space quantity
pub const INMDIR: u16 = 0x000C; // Number of directory blocks
pub const INMEXPDT: u16 = 0x0022; // Expiration date
pub const INMTERM: u16 = 0x0028; // Data transmitted as a message
pub const INMBLKSZ: u16 = 0x0030; // Block size
pub const INMDSORG: u16 = 0x003C; // File organization
pub const INMLRECL: u16 = 0x0042; // Logical record length
pub const INMRECFM: u16 = 0x0049; // Record format
pub const INMTNODE: u16 = 0x1001; // Target node name or node number
pub const INMTUID: u16 = 0x1002; // Target user ID
pub const INMFNODE: u16 = 0x1011; // Origin node name or node number
pub const INMFUID: u16 = 0x1012; // Origin user ID
pub const INMLREF: u16 = 0x1020; // Date last referenced
pub const INMLCHG: u16 = 0x1021; // Date last changed
pub const INMCREAT: u16 = 0x1022; // Creation date
pub const INMFVERS: u16 = 0x1023; // Origin version number of the data format
pub const INMFTIME: u16 = 0x1024; // Origin timestamp
pub const INMTTIME: u16 = 0x1025; // Destination timestamp
pub const INMFACK: u16 = 0x1026; // Originator requested notification
pub const INMERRCD: u16 = 0x1027; // RECEIVE command error code
pub const INMUTILN: u16 = 0x1028; // Name of utility program
pub const INMUSERP: u16 = 0x1029; // User parameter string
pub const INMRECCT: u16 = 0x102A; // Transmitted record count
pub const INMSIZE: u16 = 0x102C; // File size in bytes
pub const INMFFM: u16 = 0x102D; // Filemode number
pub const INMNUMF: u16 = 0x102F; // Number of files transmitted
pub const INMTYPE: u16 = 0x8012; // Data set type
pub const INMLSIZE: u16 = 0x8018; // Data set size in megabytes
pub const INMEATTR: u16 = 0x8028; // Extended attribute status

/// One parsed text unit: identifier plus zero or more raw value slots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextUnit {
    pub id: u16,
    pub values: Vec<Vec<u8>>,
}

impl TextUnit {
    /// Interpret the first value slot as a big-endian variable-length
    /// unsigned integer, using every declared byte.
    pub fn int_value(&self) -> u64 {
        let Some(value) = self.values.first() else {
            return 0;
        };
        value.iter().fold(0u64, |acc, &b| (acc << 8) | u64::from(b))
    }

    /// Decode the first value slot as EBCDIC text.
    pub fn text_value(&self, cp: Codepage) -> String {
        self.values.first().map_or_else(String::new, |v| cp.decode(v))
    }

    /// Decode every value slot as EBCDIC text and join with a separator.
    /// Dataset names arrive as one slot per qualifier, joined with `"."`.
    pub fn joined_text(&self, cp: Codepage, sep: &str) -> String {
        self.values
            .iter()
            .map(|v| cp.decode(v))
            .collect::<Vec<_>>()
            .join(sep)
    }
}

/// Parse one text unit at the start of `buf`, returning it together with
/// the number of bytes consumed.
pub fn parse_one(buf: &[u8]) -> Result<(TextUnit, usize), XmitError> {
    if buf.len() < 4 {
        return Err(XmitError::TruncatedAttribute {
            id: if buf.len() >= 2 {
                BigEndian::read_u16(buf)
            } else {
                0
            },
            declared: 4,
            available: buf.len(),
        });
    }
    let id = BigEndian::read_u16(&buf[0..2]);
    let count = BigEndian::read_u16(&buf[2..4]);

    let mut consumed = 4usize;
    let mut values = Vec::with_capacity(count as usize);
    for _ in 0..count {
        if buf.len() < consumed + 2 {
            return Err(XmitError::TruncatedAttribute {
                id,
                declared: 2,
                available: buf.len() - consumed,
            });
        }
        let len = BigEndian::read_u16(&buf[consumed..consumed + 2]) as usize;
        consumed += 2;
        if buf.len() < consumed + len {
            return Err(XmitError::TruncatedAttribute {
                id,
                declared: len,
                available: buf.len() - consumed,
            });
        }
        values.push(buf[consumed..consumed + len].to_vec());
        consumed += len;
    }
    Ok((TextUnit { id, values }, consumed))
}

/// Parse text units until `buf` is exhausted.
pub fn parse_all(buf: &[u8]) -> Result<Vec<TextUnit>, XmitError> {
    let mut units = Vec::new();
    let mut rest = buf;
    while !rest.is_empty() {
        let (unit, consumed) = parse_one(rest)?;
        units.push(unit);
        rest = &rest[consumed..];
    }
    Ok(units)
}
