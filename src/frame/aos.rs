//! AOS Space Data Link Protocol transfer frames (CCSDS 732.0-B).

use typed_builder::TypedBuilder;

use super::{
    frame_error_control, trailer_layout, PayloadUnit, Scid, TransferFrame, Vcid, IDLE_FILL,
};
use crate::{bits, Error, Result};

/// Organization of the AOS data zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum UserDataType {
    /// Multiplexed space packets behind a first header pointer.
    Mpdu,
    /// Bitstream data behind a bitstream data pointer.
    Bpdu,
    /// Virtual channel access: unstructured octets, no pointer field.
    Vca,
    /// Idle data only.
    Idle,
}

/// Parse options for AOS fields the header does not self-describe.
#[derive(Debug, Clone, TypedBuilder)]
pub struct AosConfig {
    /// Data zone organization of the virtual channel.
    pub user_data_type: UserDataType,
    /// Header is followed by a 2-byte frame header error control field.
    #[builder(default)]
    pub fhec: bool,
    /// Insert zone length in bytes, 0 when absent.
    #[builder(default)]
    pub insert_zone_len: usize,
    /// Frame carries a 4-byte operational control field.
    #[builder(default)]
    pub ocf: bool,
    /// Frame ends with a 2-byte frame error control field.
    #[builder(default)]
    pub fecf: bool,
    /// Security header length in bytes, 0 when absent.
    #[builder(default)]
    pub security_header_len: usize,
    /// Security trailer length in bytes, 0 when absent.
    #[builder(default)]
    pub security_trailer_len: usize,
}

/// An AOS transfer frame.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AosFrame {
    #[cfg_attr(feature = "serde", serde(with = "serde_bytes"))]
    frame: Vec<u8>,
    /// Transfer frame version number, always 1.
    pub version: u8,
    pub scid: Scid,
    pub vcid: Vcid,
    /// Virtual channel frame count, 24 bits.
    pub vcfc: u32,
    pub replay_flag: bool,
    /// Virtual channel frame count usage flag.
    pub vcfc_usage_flag: bool,
    /// Virtual channel frame count cycle, 4 bits.
    pub vcfc_cycle: u8,
    pub user_data_type: UserDataType,
    /// M_PDU first header pointer; `None` for other data zone types.
    pub first_header_pointer: Option<u16>,
    /// B_PDU bitstream data pointer; `None` for other data zone types.
    pub bitstream_data_pointer: Option<u16>,
    has_fhec: bool,
    insert_zone_len: usize,
    pointer_offset: usize,
    security_header_len: usize,
    security_trailer_len: usize,
    has_fecf: bool,
    data_start: usize,
    data_len: usize,
    ocf_start: Option<usize>,
    idle: bool,
    valid: bool,
}

impl AosFrame {
    pub const PRIMARY_HEADER_LEN: usize = 6;
    /// Virtual channel reserved for idle frames.
    pub const VCID_IDLE: Vcid = 63;
    /// First header pointer value marking an idle data zone.
    pub const FHP_IDLE: u16 = 0x7fe;
    /// First header pointer value when no packet starts in this frame.
    pub const FHP_NO_PACKET: u16 = 0x7ff;
    /// Bitstream data pointer value marking an idle data zone.
    pub const BDP_IDLE: u16 = 0x3ffe;
    /// Bitstream data pointer value when all bitstream data is valid.
    pub const BDP_ALL_VALID: u16 = 0x3fff;

    /// Decode a complete AOS transfer frame from `dat`.
    ///
    /// # Errors
    ///
    /// [`Error::NotEnoughData`] when `dat` cannot hold the header, pointer
    /// field, or configured optional fields; [`Error::FieldConstraint`] when
    /// the version number is not 1, a spare bit is set, or the frame count
    /// cycle is used without its usage flag.
    pub fn decode(dat: Vec<u8>, config: &AosConfig) -> Result<Self> {
        if dat.len() < Self::PRIMARY_HEADER_LEN {
            return Err(Error::NotEnoughData {
                actual: dat.len(),
                minimum: Self::PRIMARY_HEADER_LEN,
            });
        }
        let version = bits::read(&dat, 0, 2) as u8;
        if version != 1 {
            return Err(Error::FieldConstraint(format!(
                "AOS frame version must be 1, got {version}"
            )));
        }
        let scid = bits::read(&dat, 2, 8) as Scid;
        let vcid = bits::read(&dat, 10, 6) as Vcid;
        let vcfc = bits::read(&dat, 16, 24);
        let replay_flag = bits::read(&dat, 40, 1) == 1;
        let vcfc_usage_flag = bits::read(&dat, 41, 1) == 1;
        if bits::read(&dat, 42, 2) != 0 {
            return Err(Error::FieldConstraint(
                "signaling field spare bits must be zero".into(),
            ));
        }
        let vcfc_cycle = bits::read(&dat, 44, 4) as u8;
        if !vcfc_usage_flag && vcfc_cycle != 0 {
            return Err(Error::FieldConstraint(format!(
                "frame count cycle {vcfc_cycle} without the usage flag"
            )));
        }

        let fhec_len = if config.fhec { 2 } else { 0 };
        let pointer_offset = Self::PRIMARY_HEADER_LEN + fhec_len + config.insert_zone_len;
        let pointer_len = match config.user_data_type {
            UserDataType::Mpdu | UserDataType::Bpdu => 2,
            UserDataType::Vca | UserDataType::Idle => 0,
        };
        if dat.len() < pointer_offset + pointer_len {
            return Err(Error::NotEnoughData {
                actual: dat.len(),
                minimum: pointer_offset + pointer_len,
            });
        }

        let mut first_header_pointer = None;
        let mut bitstream_data_pointer = None;
        let mut idle = vcid == Self::VCID_IDLE;
        match config.user_data_type {
            UserDataType::Mpdu => {
                if bits::read(&dat, pointer_offset * 8, 5) != 0 {
                    return Err(Error::FieldConstraint(
                        "M_PDU header spare bits must be zero".into(),
                    ));
                }
                let fhp = bits::read(&dat, pointer_offset * 8 + 5, 11) as u16;
                idle = idle || fhp == Self::FHP_IDLE;
                first_header_pointer = Some(fhp);
            }
            UserDataType::Bpdu => {
                if bits::read(&dat, pointer_offset * 8, 2) != 0 {
                    return Err(Error::FieldConstraint(
                        "B_PDU header spare bits must be zero".into(),
                    ));
                }
                let bdp = bits::read(&dat, pointer_offset * 8 + 2, 14) as u16;
                idle = idle || bdp == Self::BDP_IDLE;
                bitstream_data_pointer = Some(bdp);
            }
            UserDataType::Vca => {}
            UserDataType::Idle => idle = true,
        }

        let data_start = pointer_offset + pointer_len + config.security_header_len;
        let (data_len, ocf_start) = trailer_layout(
            dat.len(),
            data_start,
            config.security_trailer_len,
            config.ocf,
            config.fecf,
        )?;

        let valid = if config.fecf {
            let at = dat.len() - 2;
            let stored = u16::from_be_bytes([dat[at], dat[at + 1]]);
            frame_error_control(&dat[..at]) == stored
        } else {
            true
        };

        Ok(Self {
            frame: dat,
            version,
            scid,
            vcid,
            vcfc,
            replay_flag,
            vcfc_usage_flag,
            vcfc_cycle,
            user_data_type: config.user_data_type,
            first_header_pointer,
            bitstream_data_pointer,
            has_fhec: config.fhec,
            insert_zone_len: config.insert_zone_len,
            pointer_offset,
            security_header_len: config.security_header_len,
            security_trailer_len: config.security_trailer_len,
            has_fecf: config.fecf,
            data_start,
            data_len,
            ocf_start,
            idle,
            valid,
        })
    }

    /// Frame header error control field value, never verified here.
    #[must_use]
    pub fn fhec(&self) -> Option<u16> {
        self.has_fhec
            .then(|| u16::from_be_bytes([self.frame[6], self.frame[7]]))
    }

    #[must_use]
    pub fn insert_zone(&self) -> Option<&[u8]> {
        (self.insert_zone_len > 0).then(|| {
            let start = self.pointer_offset - self.insert_zone_len;
            &self.frame[start..self.pointer_offset]
        })
    }

    /// M_PDU packet zone: the pointer field through the end of the data
    /// field.
    #[must_use]
    pub fn packet_zone(&self) -> Option<&[u8]> {
        (self.user_data_type == UserDataType::Mpdu)
            .then(|| &self.frame[self.pointer_offset..self.data_start + self.data_len])
    }

    /// B_PDU bitstream data zone: the pointer field through the end of the
    /// data field.
    #[must_use]
    pub fn bitstream_data_zone(&self) -> Option<&[u8]> {
        (self.user_data_type == UserDataType::Bpdu)
            .then(|| &self.frame[self.pointer_offset..self.data_start + self.data_len])
    }

    /// True when a B_PDU frame's bitstream is entirely valid.
    #[must_use]
    pub fn bitstream_all_valid(&self) -> bool {
        self.bitstream_data_pointer == Some(Self::BDP_ALL_VALID)
    }

    #[must_use]
    pub fn security_header(&self) -> Option<&[u8]> {
        (self.security_header_len > 0)
            .then(|| &self.frame[self.data_start - self.security_header_len..self.data_start])
    }

    #[must_use]
    pub fn security_trailer(&self) -> Option<&[u8]> {
        let start = self.data_start + self.data_len;
        (self.security_trailer_len > 0)
            .then(|| &self.frame[start..start + self.security_trailer_len])
    }
}

impl TransferFrame for AosFrame {
    fn frame(&self) -> &[u8] {
        &self.frame
    }

    fn scid(&self) -> Scid {
        self.scid
    }

    fn vcid(&self) -> Vcid {
        self.vcid
    }

    fn vcfc(&self) -> u32 {
        self.vcfc
    }

    fn data_field(&self) -> &[u8] {
        &self.frame[self.data_start..self.data_start + self.data_len]
    }

    fn ocf(&self) -> Option<&[u8]> {
        self.ocf_start.map(|at| &self.frame[at..at + 4])
    }

    fn fecf(&self) -> Option<u16> {
        self.has_fecf.then(|| {
            let at = self.frame.len() - 2;
            u16::from_be_bytes([self.frame[at], self.frame[at + 1]])
        })
    }

    fn is_idle(&self) -> bool {
        self.idle
    }

    fn is_valid(&self) -> bool {
        self.valid
    }
}

/// Builds AOS transfer frames of a fixed total length.
///
/// The FHEC, when configured, is written as zeros: its generator code is
/// mission ground equipment's concern and is not computed here.
#[derive(Debug)]
pub struct AosFrameBuilder {
    length: usize,
    has_fhec: bool,
    insert_zone_len: usize,
    user_data_type: UserDataType,
    has_ocf: bool,
    has_fecf: bool,
    free: usize,
    scid: Scid,
    vcid: Vcid,
    vcfc: u32,
    replay_flag: bool,
    vcfc_usage_flag: bool,
    vcfc_cycle: u8,
    idle: bool,
    insert_zone: Option<Vec<u8>>,
    security_header: Vec<u8>,
    security_trailer: Vec<u8>,
    ocf: Option<[u8; 4]>,
    units: Vec<PayloadUnit>,
}

impl AosFrameBuilder {
    /// Create a builder for frames of `length` total bytes.
    ///
    /// # Errors
    ///
    /// [`Error::BuilderState`] when the declared fields do not fit in
    /// `length`.
    pub fn new(
        length: usize,
        has_fhec: bool,
        insert_zone_len: usize,
        user_data_type: UserDataType,
        has_ocf: bool,
        has_fecf: bool,
    ) -> Result<Self> {
        let mut overhead = AosFrame::PRIMARY_HEADER_LEN + insert_zone_len;
        if has_fhec {
            overhead += 2;
        }
        if matches!(user_data_type, UserDataType::Mpdu | UserDataType::Bpdu) {
            overhead += 2;
        }
        if has_ocf {
            overhead += 4;
        }
        if has_fecf {
            overhead += 2;
        }
        if length < overhead {
            return Err(Error::BuilderState(format!(
                "frame length {length} cannot hold {overhead} bytes of declared fields"
            )));
        }
        Ok(Self {
            length,
            has_fhec,
            insert_zone_len,
            user_data_type,
            has_ocf,
            has_fecf,
            free: length - overhead,
            scid: 0,
            vcid: 0,
            vcfc: 0,
            replay_flag: false,
            vcfc_usage_flag: false,
            vcfc_cycle: 0,
            idle: false,
            insert_zone: None,
            security_header: Vec::new(),
            security_trailer: Vec::new(),
            ocf: None,
            units: Vec::new(),
        })
    }

    pub fn set_scid(&mut self, scid: Scid) -> Result<()> {
        if scid > 0xff {
            return Err(Error::FieldConstraint(format!(
                "AOS spacecraft id is 8 bits, got {scid:#x}"
            )));
        }
        self.scid = scid;
        Ok(())
    }

    pub fn set_vcid(&mut self, vcid: Vcid) -> Result<()> {
        if vcid > 0x3f {
            return Err(Error::FieldConstraint(format!(
                "AOS virtual channel id is 6 bits, got {vcid:#x}"
            )));
        }
        self.vcid = vcid;
        Ok(())
    }

    pub fn set_vcfc(&mut self, count: u32) -> Result<()> {
        if count > 0xff_ffff {
            return Err(Error::FieldConstraint(format!(
                "AOS frame count is 24 bits, got {count:#x}"
            )));
        }
        self.vcfc = count;
        Ok(())
    }

    pub fn set_replay_flag(&mut self, on: bool) {
        self.replay_flag = on;
    }

    pub fn set_vcfc_usage_flag(&mut self, on: bool) {
        self.vcfc_usage_flag = on;
    }

    pub fn set_vcfc_cycle(&mut self, cycle: u8) -> Result<()> {
        if cycle > 0xf {
            return Err(Error::FieldConstraint(format!(
                "frame count cycle is 4 bits, got {cycle:#x}"
            )));
        }
        self.vcfc_cycle = cycle;
        Ok(())
    }

    /// Mark the frame idle and move it to the idle virtual channel.
    pub fn set_idle(&mut self) {
        self.idle = true;
        self.vcid = AosFrame::VCID_IDLE;
    }

    /// Supply the insert zone data declared at construction.
    pub fn set_insert_zone(&mut self, dat: &[u8]) -> Result<()> {
        if self.insert_zone_len == 0 {
            return Err(Error::BuilderState("no insert zone configured".into()));
        }
        if dat.len() != self.insert_zone_len {
            return Err(Error::LengthMismatch(format!(
                "insert zone configured for {} bytes, got {}",
                self.insert_zone_len,
                dat.len()
            )));
        }
        self.insert_zone = Some(dat.to_vec());
        Ok(())
    }

    pub fn set_ocf(&mut self, ocf: [u8; 4]) -> Result<()> {
        if !self.has_ocf {
            return Err(Error::BuilderState("no OCF configured".into()));
        }
        self.ocf = Some(ocf);
        Ok(())
    }

    /// Set or replace the security header and trailer; free space is
    /// revised atomically.
    pub fn set_security(&mut self, header: &[u8], trailer: &[u8]) -> Result<()> {
        let reclaimed = self.free + self.security_header.len() + self.security_trailer.len();
        let needed = header.len() + trailer.len();
        if needed > reclaimed {
            return Err(Error::BuilderState(format!(
                "security fields need {needed} bytes, only {reclaimed} available"
            )));
        }
        self.free = reclaimed - needed;
        self.security_header = header.to_vec();
        self.security_trailer = trailer.to_vec();
        Ok(())
    }

    /// Add a space packet starting in this frame (M_PDU channels only).
    /// Returns the count of bytes that did not fit.
    pub fn add_space_packet(&mut self, packet: &[u8]) -> Result<usize> {
        if self.user_data_type != UserDataType::Mpdu {
            return Err(Error::BuilderState(
                "space packets require an M_PDU data zone".into(),
            ));
        }
        let written = self.free.min(packet.len());
        if written > 0 {
            self.units.push(PayloadUnit::Packet(packet[..written].to_vec()));
            self.free -= written;
        }
        Ok(packet.len() - written)
    }

    /// Add bitstream data with `valid_bits` meaningful bits (B_PDU channels
    /// only). Returns the count of bytes that did not fit.
    pub fn add_bitstream_data(&mut self, dat: &[u8], valid_bits: usize) -> Result<usize> {
        if self.user_data_type != UserDataType::Bpdu {
            return Err(Error::BuilderState(
                "bitstream data requires a B_PDU data zone".into(),
            ));
        }
        if valid_bits > dat.len() * 8 {
            return Err(Error::FieldConstraint(format!(
                "{valid_bits} valid bits exceed the {} data bits supplied",
                dat.len() * 8
            )));
        }
        let written = self.free.min(dat.len());
        if written > 0 {
            self.units.push(PayloadUnit::Bitstream {
                data: dat[..written].to_vec(),
                valid_bits: valid_bits.min(written * 8),
            });
            self.free -= written;
        }
        Ok(dat.len() - written)
    }

    /// Add unstructured data. Returns the count of bytes that did not fit.
    pub fn add_data(&mut self, dat: &[u8]) -> usize {
        let written = self.free.min(dat.len());
        if written > 0 {
            self.units.push(PayloadUnit::Data(dat[..written].to_vec()));
            self.free -= written;
        }
        dat.len() - written
    }

    #[must_use]
    pub fn free_user_data_length(&self) -> usize {
        self.free
    }

    #[must_use]
    pub fn is_full(&self) -> bool {
        self.free == 0
    }

    fn first_header_pointer(&self) -> u16 {
        // VCID 63 already marks the frame idle; the pointer then reports
        // packet positions as usual.
        if self.idle && self.vcid != AosFrame::VCID_IDLE {
            return AosFrame::FHP_IDLE;
        }
        let mut offset: usize = 0;
        for unit in &self.units {
            if unit.is_packet_start() {
                if offset >= usize::from(AosFrame::FHP_IDLE) {
                    return AosFrame::FHP_NO_PACKET;
                }
                return offset as u16;
            }
            offset += unit.bytes().len();
        }
        AosFrame::FHP_NO_PACKET
    }

    fn bitstream_data_pointer(&self) -> u16 {
        if self.idle && self.vcid != AosFrame::VCID_IDLE {
            return AosFrame::BDP_IDLE;
        }
        if self.units.is_empty() {
            return 0;
        }
        let payload_bits: usize = self.units.iter().map(|u| u.bytes().len() * 8).sum();
        let valid_bits: usize = self
            .units
            .iter()
            .map(|u| match u {
                PayloadUnit::Bitstream { valid_bits, .. } => *valid_bits,
                other => other.bytes().len() * 8,
            })
            .sum();
        if valid_bits >= payload_bits {
            AosFrame::BDP_ALL_VALID
        } else {
            (valid_bits & 0x3fff) as u16
        }
    }

    /// Emit the frame bytes and return the re-parsed frame.
    ///
    /// # Errors
    ///
    /// [`Error::BuilderState`] when the frame is neither full nor idle, or
    /// when a configured insert zone or OCF was never supplied.
    pub fn build(self) -> Result<AosFrame> {
        if !self.is_full() && !(self.idle || self.user_data_type == UserDataType::Idle) {
            return Err(Error::BuilderState(format!(
                "frame not full ({} bytes free) and not marked idle",
                self.free
            )));
        }
        if self.insert_zone_len > 0 && self.insert_zone.is_none() {
            return Err(Error::BuilderState(
                "insert zone configured but not supplied".into(),
            ));
        }
        if self.has_ocf && self.ocf.is_none() {
            return Err(Error::BuilderState("OCF configured but not supplied".into()));
        }

        let mut dat = vec![0u8; self.length];
        bits::write(&mut dat, 0, 2, 1);
        bits::write(&mut dat, 2, 8, u32::from(self.scid));
        bits::write(&mut dat, 10, 6, u32::from(self.vcid));
        bits::write(&mut dat, 16, 24, self.vcfc);
        bits::write(&mut dat, 40, 1, u32::from(self.replay_flag));
        bits::write(&mut dat, 41, 1, u32::from(self.vcfc_usage_flag));
        bits::write(&mut dat, 44, 4, u32::from(self.vcfc_cycle));

        let mut at = AosFrame::PRIMARY_HEADER_LEN;
        if self.has_fhec {
            // written as zeros, see the builder docs
            at += 2;
        }
        if let Some(iz) = &self.insert_zone {
            dat[at..at + iz.len()].copy_from_slice(iz);
            at += iz.len();
        }
        match self.user_data_type {
            UserDataType::Mpdu => {
                bits::write(&mut dat, at * 8 + 5, 11, u32::from(self.first_header_pointer()));
                at += 2;
            }
            UserDataType::Bpdu => {
                bits::write(&mut dat, at * 8 + 2, 14, u32::from(self.bitstream_data_pointer()));
                at += 2;
            }
            UserDataType::Vca | UserDataType::Idle => {}
        }

        dat[at..at + self.security_header.len()].copy_from_slice(&self.security_header);
        at += self.security_header.len();
        for unit in &self.units {
            let b = unit.bytes();
            dat[at..at + b.len()].copy_from_slice(b);
            at += b.len();
        }

        let mut trailer = self.security_trailer.len();
        if self.has_ocf {
            trailer += 4;
        }
        if self.has_fecf {
            trailer += 2;
        }
        let user_end = self.length - trailer;
        dat[at..user_end].fill(IDLE_FILL);
        at = user_end;

        dat[at..at + self.security_trailer.len()].copy_from_slice(&self.security_trailer);
        at += self.security_trailer.len();
        if let Some(ocf) = self.ocf {
            dat[at..at + 4].copy_from_slice(&ocf);
        }
        if self.has_fecf {
            let crc = frame_error_control(&dat[..self.length - 2]);
            let at = self.length - 2;
            dat[at..].copy_from_slice(&crc.to_be_bytes());
        }

        AosFrame::decode(
            dat,
            &AosConfig {
                user_data_type: self.user_data_type,
                fhec: self.has_fhec,
                insert_zone_len: self.insert_zone_len,
                ocf: self.has_ocf,
                fecf: self.has_fecf,
                security_header_len: self.security_header.len(),
                security_trailer_len: self.security_trailer.len(),
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mpdu_config() -> AosConfig {
        AosConfig::builder().user_data_type(UserDataType::Mpdu).build()
    }

    #[test]
    fn decode_idle_channel() {
        // 557f = ver 1, scid 0x55, vcid 63; count 010203; 40 = count usage;
        // 07fe = M_PDU FHP idle
        let dat = hex::decode(format!("557f0102034007fe{}", "55".repeat(16))).unwrap();
        let frame = AosFrame::decode(dat, &mpdu_config()).unwrap();
        assert_eq!(frame.scid, 0x55);
        assert_eq!(frame.vcid, AosFrame::VCID_IDLE);
        assert_eq!(frame.vcfc, 0x010203);
        assert!(frame.vcfc_usage_flag);
        assert_eq!(frame.first_header_pointer, Some(AosFrame::FHP_IDLE));
        assert!(frame.is_idle());
        assert!(frame.is_valid());
    }

    #[test]
    fn vcid_63_is_idle_for_any_data_zone() {
        for udt in [
            UserDataType::Mpdu,
            UserDataType::Bpdu,
            UserDataType::Vca,
            UserDataType::Idle,
        ] {
            let mut builder = AosFrameBuilder::new(24, false, 0, udt, false, false).unwrap();
            builder.set_idle();
            let frame = builder.build().unwrap();
            assert_eq!(frame.vcid, AosFrame::VCID_IDLE);
            assert!(frame.is_idle(), "{udt:?}");
        }
    }

    #[test]
    fn build_idle_frame() {
        let mut builder =
            AosFrameBuilder::new(24, false, 0, UserDataType::Mpdu, false, false).unwrap();
        builder.set_scid(0x55).unwrap();
        builder.set_vcfc(0x010203).unwrap();
        builder.set_vcfc_usage_flag(true);
        builder.set_idle();
        let frame = builder.build().unwrap();
        // idle channel keeps a literal pointer: no packet starts here
        let expected = format!("557f0102034007ff{}", "55".repeat(16));
        assert_eq!(hex::encode(frame.frame()), expected);
        assert!(frame.is_idle());
    }

    #[test]
    fn roundtrip_mpdu_with_all_optional_fields() {
        let mut builder = AosFrameBuilder::new(64, true, 4, UserDataType::Mpdu, true, true).unwrap();
        builder.set_scid(0xab).unwrap();
        builder.set_vcid(9).unwrap();
        builder.set_vcfc(0xbeef).unwrap();
        builder.set_replay_flag(true);
        builder.set_insert_zone(b"TIME").unwrap();
        builder.set_security(b"HDR", b"TRL").unwrap();
        builder.set_ocf([0xde, 0xad, 0xbe, 0xef]).unwrap();
        let payload = vec![0x42; builder.free_user_data_length()];
        assert_eq!(builder.add_space_packet(&payload).unwrap(), 0);
        let frame = builder.build().unwrap();

        assert_eq!(frame.scid, 0xab);
        assert_eq!(frame.vcid, 9);
        assert_eq!(frame.vcfc, 0xbeef);
        assert!(frame.replay_flag);
        assert_eq!(frame.fhec(), Some(0));
        assert_eq!(frame.insert_zone(), Some(&b"TIME"[..]));
        assert_eq!(frame.first_header_pointer, Some(0));
        assert_eq!(frame.security_header(), Some(&b"HDR"[..]));
        assert_eq!(frame.security_trailer(), Some(&b"TRL"[..]));
        assert_eq!(frame.ocf(), Some(&[0xde, 0xad, 0xbe, 0xef][..]));
        assert_eq!(frame.data_field(), &payload[..]);
        assert!(frame.is_valid());
        assert!(!frame.is_idle());

        // packet zone spans pointer field + security header + data
        let zone = frame.packet_zone().unwrap();
        assert_eq!(zone.len(), 2 + 3 + payload.len());
    }

    #[test]
    fn bitstream_pointer_accounting() {
        // partial validity: pointer is the valid-bit count
        let mut builder =
            AosFrameBuilder::new(20, false, 0, UserDataType::Bpdu, false, false).unwrap();
        assert_eq!(builder.add_bitstream_data(&[0xff; 12], 90).unwrap(), 0);
        let frame = builder.build().unwrap();
        assert_eq!(frame.bitstream_data_pointer, Some(90));
        assert!(!frame.bitstream_all_valid());
        assert_eq!(frame.bitstream_data_zone().unwrap().len(), 14);

        // full validity
        let mut builder =
            AosFrameBuilder::new(20, false, 0, UserDataType::Bpdu, false, false).unwrap();
        assert_eq!(builder.add_bitstream_data(&[0xff; 12], 96).unwrap(), 0);
        let frame = builder.build().unwrap();
        assert_eq!(frame.bitstream_data_pointer, Some(AosFrame::BDP_ALL_VALID));
        assert!(frame.bitstream_all_valid());
    }

    #[test]
    fn unit_kind_is_checked_against_data_zone() {
        let mut builder =
            AosFrameBuilder::new(20, false, 0, UserDataType::Bpdu, false, false).unwrap();
        assert!(matches!(
            builder.add_space_packet(&[0; 4]),
            Err(Error::BuilderState(_))
        ));

        let mut builder =
            AosFrameBuilder::new(20, false, 0, UserDataType::Mpdu, false, false).unwrap();
        assert!(matches!(
            builder.add_bitstream_data(&[0; 4], 32),
            Err(Error::BuilderState(_))
        ));
    }

    #[test]
    fn decode_rejects_spare_bit_violations() {
        // signaling byte spare bit set
        let mut dat = vec![0u8; 16];
        dat[0] = 0x40; // version 1
        dat[5] = 0x10; // spare bit
        assert!(matches!(
            AosFrame::decode(dat, &mpdu_config()),
            Err(Error::FieldConstraint(_))
        ));

        // M_PDU pointer spare bits set
        let mut dat = vec![0u8; 16];
        dat[0] = 0x40;
        dat[6] = 0x80;
        assert!(matches!(
            AosFrame::decode(dat, &mpdu_config()),
            Err(Error::FieldConstraint(_))
        ));
    }

    #[test]
    fn decode_rejects_cycle_without_usage() {
        let mut dat = vec![0u8; 16];
        dat[0] = 0x40;
        dat[5] = 0x03; // cycle 3, usage flag clear
        assert!(matches!(
            AosFrame::decode(dat, &mpdu_config()),
            Err(Error::FieldConstraint(_))
        ));
    }

    #[test]
    fn decode_rejects_version() {
        let dat = vec![0u8; 16]; // version 0
        assert!(matches!(
            AosFrame::decode(dat, &mpdu_config()),
            Err(Error::FieldConstraint(_))
        ));
    }

    #[test]
    fn decode_checks_pointer_field_bounds() {
        let mut dat = vec![0u8; 7]; // header + 1: too short for the pointer
        dat[0] = 0x40;
        assert!(matches!(
            AosFrame::decode(dat, &mpdu_config()),
            Err(Error::NotEnoughData { minimum: 8, .. })
        ));
    }

    #[test]
    fn corrupted_fecf_invalidates() {
        let mut builder =
            AosFrameBuilder::new(32, false, 0, UserDataType::Mpdu, false, true).unwrap();
        builder.set_idle();
        let frame = builder.build().unwrap();
        assert!(frame.is_valid());

        let mut dat = frame.frame().to_vec();
        dat[10] ^= 0x01;
        let config = AosConfig::builder()
            .user_data_type(UserDataType::Mpdu)
            .fecf(true)
            .build();
        let frame = AosFrame::decode(dat, &config).unwrap();
        assert!(!frame.is_valid());
    }
}
