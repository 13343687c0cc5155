//! Stage 1: the XMIT envelope.
//!
//! # Background
//!
//! TSO TRANSMIT wraps whatever it ships in a stream of small framed records
//! (at most 255 bytes each).  Control records carry a six-byte identifier
//! `INMRnn` plus text units; data records carry fragments of the payload,
//! split into segments that must be stitched back together.
//!
//! # What this stage produces
//!
//! Two things: the accumulated [`TransferMetadata`] describing the shipped
//! dataset, and the reassembled IEBCOPY unload stream written to `unload`.
//! Each completed segment run is emitted as one unload block, prefixed with
//! an 8-byte header whose first halfword is the block length including the
//! header itself.  Stage 2 never sees the envelope framing.

pub mod metadata;
pub mod record;

use std::io::Write;

use tracing::{debug, info, trace};

use crate::codepage::Codepage;
use crate::error::{XmitError, io_context};
use metadata::{FileMetadata, TransferMetadata};
use record::XmitRecord;

/// Largest segment run the 16-bit block length field can describe
/// (65535 minus the 8-byte block header).
const MAX_BLOCK_PAYLOAD: usize = 65535 - 8;

/// Run the envelope stage: read framed records from `input` until the
/// `INMR06` terminator, accumulating metadata and writing the reassembled
/// unload stream to `unload`.
pub fn run<R, W>(input: &mut R, unload: &mut W, cp: Codepage) -> Result<TransferMetadata, XmitError>
where
    R: std::io::Read,
    W: Write,
{
    let mut meta = TransferMetadata::default();
    let mut segment: Option<Vec<u8>> = None;
    let mut offset: u64 = 0;
    let mut finished = false;

    while let Some(rec) = record::read_record(input, offset)? {
        let record_offset = offset;
        offset += u64::from(rec.len);

        if rec.is_control() {
            if segment.is_some() {
                return Err(XmitError::SegmentOrder {
                    offset: record_offset,
                    detail: "control record arrived inside an open segment run",
                });
            }
            let id = rec.control_id(cp).unwrap_or_default();
            trace!(offset = record_offset, id = %id, "control record");
            match id.as_str() {
                "INMR01" => meta.apply_transfer_units(&rec.text_units(0)?, cp),
                "INMR02" => {
                    let file = FileMetadata::from_units(&rec.text_units(4)?, cp);
                    debug!(
                        dsname = %file.dsname,
                        dsorg = %file.dsorg,
                        utility = %file.utility,
                        "file header"
                    );
                    meta.files.push(file);
                }
                // Acknowledgement, user control and notification records
                // carry nothing the extraction needs.
                "INMR03" | "INMR04" | "INMR07" => {}
                "INMR06" => {
                    finished = true;
                    break;
                }
                _ => {
                    return Err(XmitError::InvalidControlRecord {
                        offset: record_offset,
                        id,
                    });
                }
            }
        } else {
            reassemble(&rec, record_offset, &mut segment, unload)?;
        }
    }

    if !finished {
        return Err(XmitError::UnexpectedEof {
            stage: "envelope",
            offset,
        });
    }

    info!(
        node = %meta.origin_node,
        user = %meta.origin_user,
        files = meta.files.len(),
        "envelope stage complete"
    );
    Ok(meta)
}

/// Fold one data record into the current segment run, emitting a finished
/// unload block when the run closes.
fn reassemble<W: Write>(
    rec: &XmitRecord,
    offset: u64,
    segment: &mut Option<Vec<u8>>,
    unload: &mut W,
) -> Result<(), XmitError> {
    if rec.has_record_number() {
        trace!(offset, "data record carries a record number");
    }

    if rec.is_first_segment() {
        if segment.is_some() {
            return Err(XmitError::SegmentOrder {
                offset,
                detail: "first segment arrived inside an open segment run",
            });
        }
        *segment = Some(rec.data.clone());
    } else {
        match segment.as_mut() {
            Some(buf) => buf.extend_from_slice(&rec.data),
            None => {
                return Err(XmitError::SegmentOrder {
                    offset,
                    detail: "continuation segment without a first segment",
                });
            }
        }
    }

    if rec.is_last_segment() {
        let buf = segment.take().expect("segment run is open");
        if buf.len() > MAX_BLOCK_PAYLOAD {
            return Err(XmitError::OversizedBlock { len: buf.len() });
        }
        let mut header = [0u8; 8];
        header[0..2].copy_from_slice(&((buf.len() + 8) as u16).to_be_bytes());
        unload
            .write_all(&header)
            .and_then(|()| unload.write_all(&buf))
            .map_err(io_context("writing unload block"))?;
        trace!(offset, len = buf.len(), "unload block emitted");
    }
    Ok(())
}
