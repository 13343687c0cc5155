//! Member extraction, the final stage.
//!
//! Each member's data is a run of blocks starting at its recorded file
//! offset.  A block's payload opens with a 12-byte header; data blocks
//! (flag byte 0x00) then carry member-data sub-blocks ("MDB"s) of at most
//! 362 bytes.  Logical records of LRECL bytes are accumulated across
//! sub-block boundaries, decoded from EBCDIC and written out one line per
//! record.  A block whose payload is only the 12-byte header closes the
//! member.

use std::fs::File;
use std::io::{BufWriter, Read, Seek, SeekFrom, Write};
use std::path::Path;

use tracing::{debug, info, trace, warn};

use crate::codepage::Codepage;
use crate::error::{XmitError, io_context};
use crate::unload::directory::MemberMap;
use crate::unload::read_block;

/// Largest member-data sub-block.
const MDB_LEN: usize = 362;

/// Write every located member to `<target>/<name>.<extension>`. Returns
/// the number of files written.
pub fn write_members<R: Read + Seek>(
    input: &mut R,
    members: &MemberMap,
    lrecl: u16,
    recfm: &str,
    target: &Path,
    extension: &str,
    cp: Codepage,
) -> Result<usize, XmitError> {
    if recfm.starts_with('V') {
        return Err(XmitError::VariableLengthUnsupported {
            recfm: recfm.to_string(),
        });
    }
    if lrecl == 0 {
        return Err(XmitError::InvalidDescriptor {
            which: "COPYR1",
            detail: "logical record length is zero".to_string(),
        });
    }

    let mut written = 0usize;
    for member in members.values() {
        let name = member.name.trim_end();
        let Some(file_pointer) = member.file_pointer else {
            warn!(member = %name, "no data records found for member");
            continue;
        };
        let path = target.join(format!("{name}.{extension}"));
        write_member(input, file_pointer, &path, lrecl, cp)?;
        info!(member = %name, path = %path.display(), "member extracted");
        written += 1;
    }
    Ok(written)
}

/// Extract one member starting at `file_pointer` into `path`.
fn write_member<R: Read + Seek>(
    input: &mut R,
    file_pointer: u64,
    path: &Path,
    lrecl: u16,
    cp: Codepage,
) -> Result<(), XmitError> {
    debug!(path = %path.display(), file_pointer, "writing member");
    input
        .seek(SeekFrom::Start(file_pointer))
        .map_err(io_context("seeking to member data"))?;

    let file = File::create(path).map_err(io_context(format!("creating {}", path.display())))?;
    let mut out = BufWriter::new(file);
    let lrecl = usize::from(lrecl);
    let mut record = Vec::with_capacity(lrecl);

    loop {
        let Some(payload) = read_block(input, "member write")? else {
            return Err(XmitError::UnexpectedEof {
                stage: "member write",
                offset: file_pointer,
            });
        };
        if payload.len() < 12 {
            return Err(XmitError::InvalidDescriptor {
                which: "member data block",
                detail: format!("payload of {} bytes is shorter than its header", payload.len()),
            });
        }
        if payload[0] != 0x00 {
            // Notes or extended-attribute block, not member data.
            trace!(flag = payload[0], "skipping non-data block");
            continue;
        }
        if payload.len() == 12 {
            break;
        }

        // Records may continue across MDBs but never across blocks; a
        // partial record at the end of a block is padding.
        record.clear();
        for mdb in payload[12..].chunks(MDB_LEN) {
            let mut rest = mdb;
            while !rest.is_empty() {
                let take = (lrecl - record.len()).min(rest.len());
                record.extend_from_slice(&rest[..take]);
                rest = &rest[take..];
                if record.len() == lrecl {
                    writeln!(out, "{}", cp.decode(&record))
                        .map_err(io_context(format!("writing {}", path.display())))?;
                    record.clear();
                }
            }
        }
    }

    out.flush()
        .map_err(io_context(format!("flushing {}", path.display())))?;
    Ok(())
}
