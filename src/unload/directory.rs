//! The partitioned-dataset directory.
//!
//! After the two descriptor records, the unload stream carries the PDS
//! directory: framed blocks whose payload is a whole number of 276-byte
//! directory blocks.  Each directory block lists member names with their
//! TTR (relative track + record number) home address.  A short block with
//! a 12-byte payload closes the directory.

use std::collections::BTreeMap;
use std::io::Read;

use byteorder::{BigEndian, ByteOrder};
use tracing::{debug, trace};

use crate::codepage::Codepage;
use crate::error::XmitError;
use crate::unload::read_block;

/// Size of one directory block within a framed payload.
const DIRECTORY_BLOCK_LEN: usize = 276;

/// All-ones name that terminates the entries of a directory block.
const END_OF_BLOCK: [u8; 8] = [0xFF; 8];

/// One directory entry. `file_pointer` is filled in later by the
/// data-record dispatcher; the directory only knows the TTR.
#[derive(Debug, Clone)]
pub struct Member {
    pub name: String,
    pub track: u16,
    pub record: u8,
    pub file_pointer: Option<u64>,
}

/// Members keyed by their 24-bit TTR. The ordered map keeps extraction
/// deterministic.
pub type MemberMap = BTreeMap<u32, Member>;

/// Combine a relative track and record number into the 24-bit TTR key.
pub fn ttr(track: u16, record: u8) -> u32 {
    (u32::from(track) << 8) | u32::from(record)
}

/// Read directory blocks until the 12-byte terminator payload, producing
/// the member map.
pub fn read_directory<R: Read>(input: &mut R, cp: Codepage) -> Result<MemberMap, XmitError> {
    let mut members = MemberMap::new();
    loop {
        let Some(payload) = read_block(input, "directory")? else {
            return Err(XmitError::UnexpectedEof {
                stage: "directory",
                offset: 0,
            });
        };
        if payload.len() == 12 {
            debug!(members = members.len(), "directory complete");
            return Ok(members);
        }
        for block in payload.chunks_exact(DIRECTORY_BLOCK_LEN) {
            parse_directory_block(block, cp, &mut members);
        }
    }
}

/// Parse one 276-byte directory block into the member map.
///
/// Layout: 12 header bytes, the 8-byte name of the block's last member
/// (the loop sentinel), 2 more header bytes, then entries of 8-byte name,
/// halfword TT, byte R, and an indicator byte whose low five bits count
/// user-data halfwords to skip.
fn parse_directory_block(block: &[u8], cp: Codepage, members: &mut MemberMap) {
    let sentinel: &[u8] = &block[12..20];
    let mut pos = 22usize;

    while pos + 12 <= block.len() {
        let name_bytes = &block[pos..pos + 8];
        if name_bytes == END_OF_BLOCK {
            break;
        }
        let track = BigEndian::read_u16(&block[pos + 8..pos + 10]);
        let record = block[pos + 10];
        let indicator = block[pos + 11];
        let user_data = usize::from(indicator & 0x1F) * 2;
        pos += 12 + user_data;

        let name = cp.decode(name_bytes);
        trace!(member = %name, track, record, "directory entry");
        members.insert(
            ttr(track, record),
            Member {
                name,
                track,
                record,
                file_pointer: None,
            },
        );

        if name_bytes == sentinel {
            break;
        }
    }
}
