//! Second pass over the unload stream: find where each member's data
//! begins.
//!
//! The directory gives every member a TTR home address; the data records
//! give every block an absolute `(cylinder, head, record)` address.  This
//! pass walks the data records once, translates each block's address back
//! into a TTR, and stamps the matching member with the byte offset of the
//! block that opens it.  The member writer then extracts members in any
//! order by seeking straight to those offsets.

use std::io::{Read, Seek};

use byteorder::{BigEndian, ByteOrder};
use tracing::{debug, trace, warn};

use crate::error::{XmitError, io_context};
use crate::unload::descriptor::{Copyr1, Copyr2, split_cchh};
use crate::unload::directory::{MemberMap, ttr};
use crate::unload::{geometry, read_block};

/// Walk the data records and set each member's `file_pointer`.
pub fn assign_member_offsets<R: Read + Seek>(
    input: &mut R,
    members: &mut MemberMap,
    copyr1: &Copyr1,
    copyr2: &Copyr2,
) -> Result<(), XmitError> {
    // Plain PDS unloads carry 12 filler bytes between the directory
    // terminator and the first data record; PDSE unloads do not.
    if !copyr1.is_pdse() {
        let mut filler = [0u8; 12];
        if let Err(e) = input.read_exact(&mut filler) {
            if e.kind() == std::io::ErrorKind::UnexpectedEof {
                return Ok(());
            }
            return Err(io_context("skipping pre-data filler")(e));
        }
    }

    loop {
        let offset = input
            .stream_position()
            .map_err(io_context("locating data record"))?;
        let Some(payload) = read_block(input, "data records")? else {
            break;
        };
        // A 12-byte payload is the end-of-member marker between members.
        if payload.len() == 12 {
            trace!(offset, "end-of-member marker");
            continue;
        }
        if payload.first() != Some(&0x00) {
            trace!(offset, "skipping non-data record");
            continue;
        }
        if payload.len() < 9 {
            return Err(XmitError::TruncatedRecord {
                offset,
                declared: 9,
                got: payload.len(),
            });
        }

        // Bytes 1..4 are the M/BB fields of the MBBCCHHR address; only
        // the cylinder, head and record parts matter here.
        let (cylinder, head) = split_cchh(
            BigEndian::read_u16(&payload[4..6]),
            BigEndian::read_u16(&payload[6..8]),
        );
        let record = payload[8];

        let Some(track) = geometry::relative_track(
            &copyr2.extents,
            copyr1.tracks_per_cylinder,
            cylinder,
            head,
        ) else {
            warn!(cylinder, head, "data record outside every extent");
            continue;
        };
        let key = ttr(track as u16, record);

        match members.get_mut(&key) {
            Some(member) if member.file_pointer.is_none() => {
                debug!(member = %member.name.trim_end(), offset, "member data located");
                member.file_pointer = Some(offset);
            }
            Some(_) => {}
            None => {
                warn!(
                    track,
                    record, offset, "data record does not start a known member"
                );
            }
        }
    }
    Ok(())
}
