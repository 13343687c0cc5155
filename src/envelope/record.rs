//! Framed record reader for the XMIT envelope.
//!
//! The envelope is a plain concatenation of records `[L][flags][payload]`
//! where `L` counts the two framing bytes, so the payload is `L - 2` bytes.
//! Clean EOF is only legal on a record boundary.

use std::io::Read;

use crate::codepage::Codepage;
use crate::error::XmitError;
use crate::textunit::{self, TextUnit};

pub const FIRST_SEGMENT: u8 = 0x80;
pub const LAST_SEGMENT: u8 = 0x40;
pub const IS_CONTROL: u8 = 0x20;
pub const IS_RECORD_NUMBER: u8 = 0x10;

/// One framed envelope record.
#[derive(Debug, Clone)]
pub struct XmitRecord {
    pub len: u8,
    pub flags: u8,
    pub data: Vec<u8>,
}

impl XmitRecord {
    pub fn is_first_segment(&self) -> bool {
        self.flags & FIRST_SEGMENT != 0
    }

    pub fn is_last_segment(&self) -> bool {
        self.flags & LAST_SEGMENT != 0
    }

    pub fn is_control(&self) -> bool {
        self.flags & IS_CONTROL != 0
    }

    pub fn has_record_number(&self) -> bool {
        self.flags & IS_RECORD_NUMBER != 0
    }

    /// The six-character control identifier (`"INMR01"` ... `"INMR07"`),
    /// or `None` for data records and control records too short to carry one.
    pub fn control_id(&self, cp: Codepage) -> Option<String> {
        if !self.is_control() || self.data.len() < 6 {
            return None;
        }
        Some(cp.decode(&self.data[..6]))
    }

    /// Parse the text units that follow the six-byte identifier, skipping
    /// `skip` additional bytes first (INMR02 carries a four-byte file number
    /// between the identifier and its units).
    pub fn text_units(&self, skip: usize) -> Result<Vec<TextUnit>, XmitError> {
        let start = 6 + skip;
        if self.data.len() <= start {
            return Ok(Vec::new());
        }
        textunit::parse_all(&self.data[start..])
    }
}

/// Read one record, or `None` at a clean end of stream.
///
/// `offset` is the byte position of the record's length byte within the
/// input; it is only used to report where a truncation happened.
pub fn read_record<R: Read>(input: &mut R, offset: u64) -> Result<Option<XmitRecord>, XmitError> {
    let mut header = [0u8; 1];
    match input.read_exact(&mut header) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => {
            return Err(XmitError::Io {
                context: format!("reading envelope record at offset {offset}"),
                source: e,
            });
        }
    }
    let len = header[0];
    if len < 2 {
        return Err(XmitError::TruncatedRecord {
            offset,
            declared: len as usize,
            got: 1,
        });
    }

    let mut flags = [0u8; 1];
    read_payload(input, &mut flags, offset, len as usize - 1)?;

    let mut data = vec![0u8; len as usize - 2];
    read_payload(input, &mut data, offset, len as usize - 2)?;

    Ok(Some(XmitRecord {
        len,
        flags: flags[0],
        data,
    }))
}

fn read_payload<R: Read>(
    input: &mut R,
    buf: &mut [u8],
    offset: u64,
    declared: usize,
) -> Result<(), XmitError> {
    input.read_exact(buf).map_err(|e| {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            XmitError::TruncatedRecord {
                offset,
                declared,
                got: 0,
            }
        } else {
            XmitError::Io {
                context: format!("reading envelope record at offset {offset}"),
                source: e,
            }
        }
    })
}
