//! TM Space Data Link Protocol transfer frames (CCSDS 132.0-B).

use typed_builder::TypedBuilder;

use super::{
    frame_error_control, trailer_layout, PayloadUnit, Scid, TransferFrame, Vcid, IDLE_FILL,
};
use crate::{bits, Error, Result};

/// Parse options for TM fields the header does not self-describe.
#[derive(Debug, Clone, Default, TypedBuilder)]
pub struct TmConfig {
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

/// A TM transfer frame.
///
/// Owns the complete frame bytes; header fields and byte ranges are decoded
/// once at construction.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TmFrame {
    #[cfg_attr(feature = "serde", serde(with = "serde_bytes"))]
    frame: Vec<u8>,
    /// Transfer frame version number, always 0.
    pub version: u8,
    pub scid: Scid,
    pub vcid: Vcid,
    /// Master channel frame count.
    pub mcfc: u8,
    /// Virtual channel frame count.
    pub vcfc: u8,
    pub sync_flag: bool,
    pub packet_order_flag: bool,
    pub segment_length_id: u8,
    pub first_header_pointer: u16,
    /// Secondary header version, 0 when no secondary header is present.
    pub secondary_header_version: u8,
    has_secondary: bool,
    secondary_len: usize,
    security_header_len: usize,
    security_trailer_len: usize,
    has_fecf: bool,
    data_start: usize,
    data_len: usize,
    ocf_start: Option<usize>,
    valid: bool,
}

impl TmFrame {
    pub const PRIMARY_HEADER_LEN: usize = 6;
    /// First header pointer value marking an idle data field.
    pub const FHP_IDLE: u16 = 0x7fe;
    /// First header pointer value when no packet starts in this frame.
    pub const FHP_NO_PACKET: u16 = 0x7ff;

    /// Decode a complete TM transfer frame from `dat`.
    ///
    /// # Errors
    ///
    /// [`Error::NotEnoughData`] when `dat` cannot hold the primary header,
    /// the declared secondary header, or the configured optional fields;
    /// [`Error::FieldConstraint`] when the version number is not 0 or the
    /// synchronisation flag invariants are violated.
    pub fn decode(dat: Vec<u8>, config: &TmConfig) -> Result<Self> {
        if dat.len() < Self::PRIMARY_HEADER_LEN {
            return Err(Error::NotEnoughData {
                actual: dat.len(),
                minimum: Self::PRIMARY_HEADER_LEN,
            });
        }
        let version = bits::read(&dat, 0, 2) as u8;
        if version != 0 {
            return Err(Error::FieldConstraint(format!(
                "TM frame version must be 0, got {version}"
            )));
        }
        let scid = bits::read(&dat, 2, 10) as Scid;
        let vcid = bits::read(&dat, 12, 3) as Vcid;
        let has_ocf = bits::read(&dat, 15, 1) == 1;
        let mcfc = dat[2];
        let vcfc = dat[3];
        let has_secondary = bits::read(&dat, 32, 1) == 1;
        let sync_flag = bits::read(&dat, 33, 1) == 1;
        let packet_order_flag = bits::read(&dat, 34, 1) == 1;
        let segment_length_id = bits::read(&dat, 35, 2) as u8;
        let first_header_pointer = bits::read(&dat, 37, 11) as u16;

        if !sync_flag && packet_order_flag {
            return Err(Error::FieldConstraint(
                "packet order flag requires the synchronisation flag".into(),
            ));
        }
        if !sync_flag && segment_length_id != 3 {
            return Err(Error::FieldConstraint(format!(
                "segment length id must be 3 without the synchronisation flag, got {segment_length_id}"
            )));
        }

        let (secondary_header_version, secondary_len, mut data_start) = if has_secondary {
            if dat.len() < Self::PRIMARY_HEADER_LEN + 1 {
                return Err(Error::NotEnoughData {
                    actual: dat.len(),
                    minimum: Self::PRIMARY_HEADER_LEN + 1,
                });
            }
            let sh_version = (dat[6] >> 6) & 0x3;
            let sh_len = usize::from(dat[6] & 0x3f);
            (sh_version, sh_len, Self::PRIMARY_HEADER_LEN + 1 + sh_len)
        } else {
            (0, 0, Self::PRIMARY_HEADER_LEN)
        };
        data_start += config.security_header_len;

        let (data_len, ocf_start) = trailer_layout(
            dat.len(),
            data_start,
            config.security_trailer_len,
            has_ocf,
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
            mcfc,
            vcfc,
            sync_flag,
            packet_order_flag,
            segment_length_id,
            first_header_pointer,
            secondary_header_version,
            has_secondary,
            secondary_len,
            security_header_len: config.security_header_len,
            security_trailer_len: config.security_trailer_len,
            has_fecf: config.fecf,
            data_start,
            data_len,
            ocf_start,
            valid,
        })
    }

    /// Secondary header data, the length-id byte excluded.
    #[must_use]
    pub fn secondary_header(&self) -> Option<&[u8]> {
        self.has_secondary
            .then(|| &self.frame[Self::PRIMARY_HEADER_LEN + 1..Self::PRIMARY_HEADER_LEN + 1 + self.secondary_len])
    }

    #[must_use]
    pub fn security_header(&self) -> Option<&[u8]> {
        (self.security_header_len > 0)
            .then(|| &self.frame[self.data_start - self.security_header_len..self.data_start])
    }

    #[must_use]
    pub fn security_trailer(&self) -> Option<&[u8]> {
        let start = self.data_start + self.data_len;
        (self.security_trailer_len > 0).then(|| &self.frame[start..start + self.security_trailer_len])
    }
}

impl TransferFrame for TmFrame {
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
        u32::from(self.vcfc)
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
        self.first_header_pointer == Self::FHP_IDLE
    }

    fn is_valid(&self) -> bool {
        self.valid
    }
}

/// Builds TM transfer frames of a fixed total length.
///
/// Payload is accumulated as packet-start or plain data units; the first
/// header pointer is computed from the unit kinds at build time. `build`
/// emits the frame bytes, appends the CRC when a FECF is configured, and
/// returns the re-parsed frame.
#[derive(Debug)]
pub struct TmFrameBuilder {
    length: usize,
    secondary_header_len: usize,
    has_ocf: bool,
    has_fecf: bool,
    free: usize,
    scid: Scid,
    vcid: Vcid,
    mcfc: u8,
    vcfc: u8,
    sync_flag: bool,
    packet_order_flag: bool,
    segment_length_id: u8,
    idle: bool,
    secondary_header: Option<Vec<u8>>,
    security_header: Vec<u8>,
    security_trailer: Vec<u8>,
    ocf: Option<[u8; 4]>,
    units: Vec<PayloadUnit>,
}

impl TmFrameBuilder {
    /// Create a builder for frames of `length` total bytes.
    ///
    /// `secondary_header_len` is the secondary header data length (0 for
    /// none, at most 63); `has_ocf` and `has_fecf` reserve trailer space.
    ///
    /// # Errors
    ///
    /// [`Error::FieldConstraint`] when `secondary_header_len` exceeds 63;
    /// [`Error::BuilderState`] when the declared fields do not fit in
    /// `length`.
    pub fn new(
        length: usize,
        secondary_header_len: usize,
        has_ocf: bool,
        has_fecf: bool,
    ) -> Result<Self> {
        if secondary_header_len > 63 {
            return Err(Error::FieldConstraint(format!(
                "secondary header data length at most 63, got {secondary_header_len}"
            )));
        }
        let mut overhead = TmFrame::PRIMARY_HEADER_LEN;
        if secondary_header_len > 0 {
            overhead += 1 + secondary_header_len;
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
            secondary_header_len,
            has_ocf,
            has_fecf,
            free: length - overhead,
            scid: 0,
            vcid: 0,
            mcfc: 0,
            vcfc: 0,
            sync_flag: false,
            packet_order_flag: false,
            segment_length_id: 3,
            idle: false,
            secondary_header: None,
            security_header: Vec::new(),
            security_trailer: Vec::new(),
            ocf: None,
            units: Vec::new(),
        })
    }

    pub fn set_scid(&mut self, scid: Scid) -> Result<()> {
        if scid > 0x3ff {
            return Err(Error::FieldConstraint(format!(
                "TM spacecraft id is 10 bits, got {scid:#x}"
            )));
        }
        self.scid = scid;
        Ok(())
    }

    pub fn set_vcid(&mut self, vcid: Vcid) -> Result<()> {
        if vcid > 0x7 {
            return Err(Error::FieldConstraint(format!(
                "TM virtual channel id is 3 bits, got {vcid:#x}"
            )));
        }
        self.vcid = vcid;
        Ok(())
    }

    pub fn set_mcfc(&mut self, count: u8) {
        self.mcfc = count;
    }

    pub fn set_vcfc(&mut self, count: u8) {
        self.vcfc = count;
    }

    pub fn set_sync_flag(&mut self, on: bool) {
        self.sync_flag = on;
    }

    pub fn set_packet_order_flag(&mut self, on: bool) {
        self.packet_order_flag = on;
    }

    pub fn set_segment_length_id(&mut self, id: u8) -> Result<()> {
        if id > 3 {
            return Err(Error::FieldConstraint(format!(
                "segment length id is 2 bits, got {id}"
            )));
        }
        self.segment_length_id = id;
        Ok(())
    }

    /// Mark the frame idle; unused space is filled and the first header
    /// pointer is set to the reserved idle value.
    pub fn set_idle(&mut self) {
        self.idle = true;
    }

    /// Supply the secondary header data declared at construction.
    pub fn set_secondary_header(&mut self, dat: &[u8]) -> Result<()> {
        if self.secondary_header_len == 0 {
            return Err(Error::BuilderState(
                "no secondary header configured".into(),
            ));
        }
        if dat.len() != self.secondary_header_len {
            return Err(Error::LengthMismatch(format!(
                "secondary header configured for {} bytes, got {}",
                self.secondary_header_len,
                dat.len()
            )));
        }
        self.secondary_header = Some(dat.to_vec());
        Ok(())
    }

    pub fn set_ocf(&mut self, ocf: [u8; 4]) -> Result<()> {
        if !self.has_ocf {
            return Err(Error::BuilderState("no OCF configured".into()));
        }
        self.ocf = Some(ocf);
        Ok(())
    }

    /// Set or replace the security header and trailer.
    ///
    /// Free space is revised atomically: when the new fields do not fit the
    /// builder is left unchanged.
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

    /// Add a space packet starting in this frame. Returns the count of
    /// bytes that did not fit.
    pub fn add_space_packet(&mut self, packet: &[u8]) -> usize {
        self.add_unit(packet, true)
    }

    /// Add continuation or unstructured data. Returns the count of bytes
    /// that did not fit.
    pub fn add_data(&mut self, dat: &[u8]) -> usize {
        self.add_unit(dat, false)
    }

    fn add_unit(&mut self, dat: &[u8], packet_start: bool) -> usize {
        let written = self.free.min(dat.len());
        if written > 0 {
            let kept = dat[..written].to_vec();
            self.units.push(if packet_start {
                PayloadUnit::Packet(kept)
            } else {
                PayloadUnit::Data(kept)
            });
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
        if self.idle {
            return TmFrame::FHP_IDLE;
        }
        let mut offset: usize = 0;
        for unit in &self.units {
            if unit.is_packet_start() {
                if offset >= usize::from(TmFrame::FHP_IDLE) {
                    return TmFrame::FHP_NO_PACKET;
                }
                return offset as u16;
            }
            offset += unit.bytes().len();
        }
        TmFrame::FHP_NO_PACKET
    }

    /// Emit the frame bytes and return the re-parsed frame.
    ///
    /// # Errors
    ///
    /// [`Error::BuilderState`] when the frame is neither full nor idle, or
    /// when a configured secondary header or OCF was never supplied.
    pub fn build(self) -> Result<TmFrame> {
        if !self.is_full() && !self.idle {
            return Err(Error::BuilderState(format!(
                "frame not full ({} bytes free) and not marked idle",
                self.free
            )));
        }
        if self.secondary_header_len > 0 && self.secondary_header.is_none() {
            return Err(Error::BuilderState(
                "secondary header configured but not supplied".into(),
            ));
        }
        if self.has_ocf && self.ocf.is_none() {
            return Err(Error::BuilderState("OCF configured but not supplied".into()));
        }

        let mut dat = vec![0u8; self.length];
        bits::write(&mut dat, 2, 10, u32::from(self.scid));
        bits::write(&mut dat, 12, 3, u32::from(self.vcid));
        bits::write(&mut dat, 15, 1, u32::from(self.has_ocf));
        dat[2] = self.mcfc;
        dat[3] = self.vcfc;
        bits::write(&mut dat, 32, 1, u32::from(self.secondary_header.is_some()));
        bits::write(&mut dat, 33, 1, u32::from(self.sync_flag));
        bits::write(&mut dat, 34, 1, u32::from(self.packet_order_flag));
        bits::write(&mut dat, 35, 2, u32::from(self.segment_length_id));
        bits::write(&mut dat, 37, 11, u32::from(self.first_header_pointer()));

        let mut at = TmFrame::PRIMARY_HEADER_LEN;
        if let Some(sh) = &self.secondary_header {
            dat[at] = sh.len() as u8 & 0x3f;
            dat[at + 1..at + 1 + sh.len()].copy_from_slice(sh);
            at += 1 + sh.len();
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

        TmFrame::decode(
            dat,
            &TmConfig {
                fecf: self.has_fecf,
                security_header_len: self.security_header.len(),
                security_trailer_len: self.security_trailer.len(),
            },
        )
    }
}
