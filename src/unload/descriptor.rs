//! The two fixed-format IEBCOPY descriptor records, COPYR1 and COPYR2.
//!
//! An unload stream opens with two descriptor blocks: COPYR1 describes the
//! dataset (organization, block size, LRECL, RECFM) and the device it lived
//! on; COPYR2 carries the DEB extent table needed to translate absolute
//! DASD addresses into track numbers relative to the dataset.

use byteorder::{BigEndian, ByteOrder};

use crate::error::XmitError;
use crate::recfm;

/// COPYR1 payload size (the 64-byte record minus its 8-byte block header).
pub const COPYR1_LEN: usize = 56;

/// COPYR2 payload size (the 284-byte record minus its 8-byte block header).
pub const COPYR2_LEN: usize = 276;

/// Decoded COPYR1 record.
///
/// Payload offsets:
///
/// | Offset | Size | Field                                   |
/// |--------|------|-----------------------------------------|
/// |   0    |   1  | dataset flags (bit 0 = PDSE)            |
/// |  1–3   |   3  | eye-catcher `CA 6D 0F` (not validated)  |
/// |   4    |   2  | DSORG                                   |
/// |   6    |   2  | block size                              |
/// |   8    |   2  | LRECL                                   |
/// |  10    |   1  | RECFM byte                              |
/// |  16    |   4  | device type word (UCBTYPE)              |
/// |  20    |   4  | maximum block size                      |
/// |  24    |   2  | cylinders per volume                    |
/// |  26    |   2  | tracks per cylinder                     |
/// |  28    |   2  | highest track number                    |
#[derive(Debug, Clone)]
pub struct Copyr1 {
    pub ds_flags: u8,
    pub dsorg: u16,
    pub blksize: u16,
    pub lrecl: u16,
    pub recfm: String,
    pub device_class: &'static str,
    pub device_unit: &'static str,
    pub max_block: u32,
    pub cylinders: u16,
    pub tracks_per_cylinder: u16,
    pub max_track: u16,
}

impl Copyr1 {
    pub fn parse(raw: &[u8]) -> Result<Self, XmitError> {
        if raw.len() != COPYR1_LEN {
            return Err(XmitError::InvalidDescriptor {
                which: "COPYR1",
                detail: format!("expected {COPYR1_LEN} bytes, got {}", raw.len()),
            });
        }
        // The device word is the class/unit half of the 4-byte UCBTYPE.
        let device_word = BigEndian::read_u16(&raw[18..20]);
        Ok(Copyr1 {
            ds_flags: raw[0],
            dsorg: BigEndian::read_u16(&raw[4..6]),
            blksize: BigEndian::read_u16(&raw[6..8]),
            lrecl: BigEndian::read_u16(&raw[8..10]),
            recfm: recfm::from_byte(raw[10]),
            device_class: device_class(device_word),
            device_unit: device_unit(device_word as u8),
            max_block: BigEndian::read_u32(&raw[20..24]),
            cylinders: BigEndian::read_u16(&raw[24..26]),
            tracks_per_cylinder: BigEndian::read_u16(&raw[26..28]),
            max_track: BigEndian::read_u16(&raw[28..30]),
        })
    }

    pub fn is_pdse(&self) -> bool {
        self.ds_flags & 0x01 != 0
    }
}

/// Device class, from the top five bits of the device word.
fn device_class(device_word: u16) -> &'static str {
    match device_word >> 11 {
        0x10 => "magtape",
        0x08 => "char reader",
        0x04 => "dasd",
        0x02 => "display",
        0x01 => "UR",
        _ => "unknown",
    }
}

/// Device unit from the low byte of the device word, via the classic
/// DASD model table.
fn device_unit(unit: u8) -> &'static str {
    match unit {
        0x06 => "2305-1",
        0x07 => "2305-2",
        0x08 => "2314",
        0x09 => "3330",
        0x0A => "3340",
        0x0B => "3350",
        0x0C => "3375",
        0x0D => "3330-11",
        0x0E => "3380",
        0x0F => "3390",
        _ => "unknown",
    }
}

/// One entry of the COPYR2 extent table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Extent {
    pub start_cyl: u32,
    pub start_track: u8,
    pub end_cyl: u32,
    pub end_track: u8,
    pub num_tracks: u32,
}

impl Extent {
    /// An extent slot that allocates no tracks; stays in the table but
    /// never matches an address.
    pub fn is_inert(&self) -> bool {
        self.num_tracks == 0
    }
}

/// Decoded COPYR2 record: an opaque 16-byte DEB tail kept for debugging,
/// then sixteen extent descriptors.
#[derive(Debug, Clone)]
pub struct Copyr2 {
    pub deb_tail: [u8; 16],
    pub extents: Vec<Extent>,
}

impl Copyr2 {
    pub fn parse(raw: &[u8]) -> Result<Self, XmitError> {
        if raw.len() != COPYR2_LEN {
            return Err(XmitError::InvalidDescriptor {
                which: "COPYR2",
                detail: format!("expected {COPYR2_LEN} bytes, got {}", raw.len()),
            });
        }
        let mut deb_tail = [0u8; 16];
        deb_tail.copy_from_slice(&raw[0..16]);

        let extents = (0..16)
            .map(|i| parse_extent(&raw[16 + 16 * i..32 + 16 * i]))
            .collect();
        Ok(Copyr2 { deb_tail, extents })
    }
}

/// Decode one 16-byte DEB extent descriptor.
///
/// On extended-address volumes the cylinder number is split: the low 16
/// bits travel in the CC halfword and the high 12 bits ride in the upper
/// bits of the HH halfword, whose low nibble is the real track number.
///
/// | Offset | Size | Field                              |
/// |--------|------|------------------------------------|
/// |  0–3   |   4  | in-core UCB pointer (ignored)      |
/// |  4–5   |   2  | track count, high halfword         |
/// |  6–7   |   2  | start CC (low 16 cylinder bits)    |
/// |  8–9   |   2  | start HH (high cyl bits + track)   |
/// | 10–11  |   2  | end CC                             |
/// | 12–13  |   2  | end HH                             |
/// | 14–15  |   2  | track count, low halfword          |
fn parse_extent(raw: &[u8]) -> Extent {
    let hi_tracks = BigEndian::read_u16(&raw[4..6]);
    let (start_cyl, start_track) = split_cchh(
        BigEndian::read_u16(&raw[6..8]),
        BigEndian::read_u16(&raw[8..10]),
    );
    let (end_cyl, end_track) = split_cchh(
        BigEndian::read_u16(&raw[10..12]),
        BigEndian::read_u16(&raw[12..14]),
    );
    let lo_tracks = BigEndian::read_u16(&raw[14..16]);
    Extent {
        start_cyl,
        start_track,
        end_cyl,
        end_track,
        num_tracks: (u32::from(hi_tracks) << 16) | u32::from(lo_tracks),
    }
}

/// Undo the split cylinder encoding of a CCHH pair.
pub fn split_cchh(cc: u16, hh: u16) -> (u32, u8) {
    let cyl = u32::from(cc) | (u32::from(hh & 0xFFF0) << 12);
    (cyl, (hh & 0x0F) as u8)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn copyr1_fixture() -> Vec<u8> {
        let mut raw = vec![0u8; COPYR1_LEN];
        raw[0] = 0x01; // PDSE
        raw[1..4].copy_from_slice(&[0xCA, 0x6D, 0x0F]);
        raw[4..6].copy_from_slice(&0x0200u16.to_be_bytes()); // PO
        raw[6..8].copy_from_slice(&3120u16.to_be_bytes());
        raw[8..10].copy_from_slice(&80u16.to_be_bytes());
        raw[10] = 0x90; // FB
        raw[16..20].copy_from_slice(&[0x30, 0x50, 0x20, 0x0F]); // dasd, 3390
        raw[20..24].copy_from_slice(&32760u32.to_be_bytes());
        raw[24..26].copy_from_slice(&1113u16.to_be_bytes());
        raw[26..28].copy_from_slice(&15u16.to_be_bytes());
        raw[28..30].copy_from_slice(&14u16.to_be_bytes());
        raw
    }

    #[test]
    fn parses_copyr1() {
        let c1 = Copyr1::parse(&copyr1_fixture()).unwrap();
        assert!(c1.is_pdse());
        assert_eq!(c1.dsorg, 0x0200);
        assert_eq!(c1.blksize, 3120);
        assert_eq!(c1.lrecl, 80);
        assert_eq!(c1.recfm, "FB");
        assert_eq!(c1.device_class, "dasd");
        assert_eq!(c1.device_unit, "3390");
        assert_eq!(c1.max_block, 32760);
        assert_eq!(c1.tracks_per_cylinder, 15);
    }

    #[test]
    fn copyr1_rejects_wrong_length() {
        assert!(matches!(
            Copyr1::parse(&[0u8; 64]),
            Err(XmitError::InvalidDescriptor { which: "COPYR1", .. })
        ));
    }

    #[test]
    fn device_unit_table() {
        assert_eq!(device_unit(0x0E), "3380");
        assert_eq!(device_unit(0x0F), "3390");
        assert_eq!(device_unit(0x42), "unknown");
    }

    #[test]
    fn parses_copyr2_extents() {
        let mut raw = vec![0u8; COPYR2_LEN];
        raw[0..16].copy_from_slice(&[0xAB; 16]);
        // Extent 0: cylinders 0..=9, 150 tracks.
        let e0 = &mut raw[16..32];
        e0[6..8].copy_from_slice(&0u16.to_be_bytes());
        e0[8..10].copy_from_slice(&0u16.to_be_bytes());
        e0[10..12].copy_from_slice(&9u16.to_be_bytes());
        e0[12..14].copy_from_slice(&14u16.to_be_bytes());
        e0[14..16].copy_from_slice(&150u16.to_be_bytes());

        let c2 = Copyr2::parse(&raw).unwrap();
        assert_eq!(c2.deb_tail, [0xAB; 16]);
        assert_eq!(c2.extents.len(), 16);
        assert_eq!(
            c2.extents[0],
            Extent {
                start_cyl: 0,
                start_track: 0,
                end_cyl: 9,
                end_track: 14,
                num_tracks: 150,
            }
        );
        assert!(c2.extents[1].is_inert());
    }

    #[test]
    fn split_cylinder_encoding_reaches_high_cylinders() {
        // CC = 0x1234, HH packs cylinder bits 16..27 in its top 12 bits
        // and the track in the low nibble.
        let (cyl, track) = split_cchh(0x1234, 0x0013);
        assert_eq!(cyl, (0x0010 << 12) | 0x1234);
        assert_eq!(track, 3);
    }

    #[test]
    fn extent_with_high_track_halfword() {
        let mut raw = vec![0u8; COPYR2_LEN];
        let e0 = &mut raw[16..32];
        e0[4..6].copy_from_slice(&1u16.to_be_bytes()); // high halfword
        e0[14..16].copy_from_slice(&2u16.to_be_bytes()); // low halfword
        let c2 = Copyr2::parse(&raw).unwrap();
        assert_eq!(c2.extents[0].num_tracks, 0x1_0002);
    }
}
