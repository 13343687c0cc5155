//! Stage 2: the reassembled IEBCOPY unload stream.
//!
//! # Background
//!
//! IEBCOPY "unloads" a partitioned dataset into a flat sequence of framed
//! blocks: two descriptor records (COPYR1, COPYR2), the PDS directory,
//! then the members' data blocks, each still addressed by the DASD
//! geometry of the volume the dataset came from.  Extraction is a catalog
//! pass (descriptors + directory), a locating pass (data-record dispatch)
//! and a final per-member write.

pub mod descriptor;
pub mod directory;
pub mod dispatch;
pub mod geometry;
pub mod member;

use std::io::{Read, Seek};
use std::path::Path;

use byteorder::{BigEndian, ByteOrder};
use tracing::debug;

use crate::codepage::Codepage;
use crate::envelope::metadata::FileMetadata;
use crate::error::XmitError;
use descriptor::{COPYR1_LEN, COPYR2_LEN, Copyr1, Copyr2};

/// Read one framed unload block and return its payload, or `None` at a
/// clean end of stream.
///
/// The frame is an 8-byte header whose first halfword is the block length
/// including the header itself; the remaining six bytes are reserved.
pub(crate) fn read_block<R: Read>(
    input: &mut R,
    stage: &'static str,
) -> Result<Option<Vec<u8>>, XmitError> {
    let mut header = [0u8; 8];
    match input.read_exact(&mut header) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => {
            return Err(XmitError::Io {
                context: format!("reading unload block header in the {stage} stage"),
                source: e,
            });
        }
    }
    let block_len = BigEndian::read_u16(&header[0..2]) as usize;
    if block_len < 8 {
        return Err(XmitError::InvalidDescriptor {
            which: "unload block",
            detail: format!("block length {block_len} is shorter than its header"),
        });
    }

    let mut payload = vec![0u8; block_len - 8];
    input.read_exact(&mut payload).map_err(|e| {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            XmitError::UnexpectedEof { stage, offset: 0 }
        } else {
            XmitError::Io {
                context: format!("reading unload block payload in the {stage} stage"),
                source: e,
            }
        }
    })?;
    Ok(Some(payload))
}

/// Run the unload stage over a reassembled stream: parse descriptors and
/// directory, locate each member's data, then write the members out.
/// Returns the number of member files written.
pub fn run<R: Read + Seek>(
    input: &mut R,
    file_meta: &FileMetadata,
    target: &Path,
    extension: &str,
    cp: Codepage,
) -> Result<usize, XmitError> {
    let copyr1 = parse_descriptor(input, "COPYR1", COPYR1_LEN, Copyr1::parse)?;
    debug!(
        recfm = %copyr1.recfm,
        lrecl = copyr1.lrecl,
        blksize = copyr1.blksize,
        device = copyr1.device_unit,
        pdse = copyr1.is_pdse(),
        "COPYR1"
    );
    let copyr2 = parse_descriptor(input, "COPYR2", COPYR2_LEN, Copyr2::parse)?;
    debug!(
        extents = copyr2.extents.iter().filter(|e| !e.is_inert()).count(),
        "COPYR2"
    );

    let mut members = directory::read_directory(input, cp)?;
    dispatch::assign_member_offsets(input, &mut members, &copyr1, &copyr2)?;

    // The envelope metadata is authoritative for LRECL and RECFM; fall
    // back to COPYR1 when the transfer did not announce them.
    let lrecl = if file_meta.lrecl != 0 {
        file_meta.lrecl
    } else {
        copyr1.lrecl
    };
    let recfm = if file_meta.recfm.is_empty() {
        copyr1.recfm.as_str()
    } else {
        file_meta.recfm.as_str()
    };

    member::write_members(input, &members, lrecl, recfm, target, extension, cp)
}

/// Read the next framed block and decode a fixed-length descriptor from
/// the front of its payload.
fn parse_descriptor<R, T>(
    input: &mut R,
    which: &'static str,
    len: usize,
    parse: impl FnOnce(&[u8]) -> Result<T, XmitError>,
) -> Result<T, XmitError>
where
    R: Read,
{
    let Some(payload) = read_block(input, "descriptors")? else {
        return Err(XmitError::UnexpectedEof {
            stage: "descriptors",
            offset: 0,
        });
    };
    if payload.len() < len {
        return Err(XmitError::InvalidDescriptor {
            which,
            detail: format!("block payload of {} bytes is too short", payload.len()),
        });
    }
    parse(&payload[..len])
}
