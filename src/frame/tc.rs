//! TC Space Data Link Protocol transfer frames (CCSDS 232.0-B).

use typed_builder::TypedBuilder;

use super::{frame_error_control, trailer_layout, Scid, TransferFrame, Vcid};
use crate::{bits, Error, Result};

/// TC frame service type, derived from the bypass and control command flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum FrameType {
    /// Sequence-controlled service.
    Ad,
    /// Expedited service.
    Bd,
    /// Control command service.
    Bc,
}

/// Segment header sequence flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SequenceFlag {
    Continuing,
    First,
    Last,
    NoSegmentation,
}

impl SequenceFlag {
    fn from_bits(v: u8) -> Self {
        match v & 0x3 {
            0 => SequenceFlag::Continuing,
            1 => SequenceFlag::First,
            2 => SequenceFlag::Last,
            _ => SequenceFlag::NoSegmentation,
        }
    }

    fn bits(self) -> u8 {
        match self {
            SequenceFlag::Continuing => 0,
            SequenceFlag::First => 1,
            SequenceFlag::Last => 2,
            SequenceFlag::NoSegmentation => 3,
        }
    }
}

/// Control command carried by a BC frame's data field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ControlCommand {
    /// Unlock the receiving FARM.
    Unlock,
    /// Set the receiver frame sequence number V(R).
    SetVr(u8),
    /// Any other data field pattern.
    Reserved,
}

/// Parse options for TC fields the header does not self-describe.
#[derive(Debug, Clone, Default, TypedBuilder)]
pub struct TcConfig {
    /// Frame ends with a 2-byte frame error control field.
    #[builder(default)]
    pub fecf: bool,
    /// Security header length in bytes, 0 when absent. Ignored for BC
    /// frames, which carry no security fields.
    #[builder(default)]
    pub security_header_len: usize,
    /// Security trailer length in bytes, 0 when absent. Ignored for BC
    /// frames.
    #[builder(default)]
    pub security_trailer_len: usize,
}

/// A TC transfer frame.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TcFrame {
    #[cfg_attr(feature = "serde", serde(with = "serde_bytes"))]
    frame: Vec<u8>,
    /// Transfer frame version number, always 0.
    pub version: u8,
    pub scid: Scid,
    pub vcid: Vcid,
    /// Virtual channel frame count (frame sequence number).
    pub vcfc: u8,
    pub bypass_flag: bool,
    pub control_command_flag: bool,
    pub frame_type: FrameType,
    /// True when the virtual channel uses segment headers and this frame
    /// carries one.
    pub segmented: bool,
    /// Segment header sequence flags; `NoSegmentation` when not segmented.
    pub sequence_flag: SequenceFlag,
    /// Segment header MAP id; 0 when not segmented.
    pub map_id: u8,
    /// Decoded control command, `Some` for BC frames only.
    pub control_command: Option<ControlCommand>,
    security_header_len: usize,
    security_trailer_len: usize,
    has_fecf: bool,
    data_start: usize,
    data_len: usize,
    valid: bool,
}

impl TcFrame {
    pub const HEADER_LEN: usize = 5;
    pub const MAX_FRAME_LEN: usize = 1024;

    /// Decode a complete TC transfer frame from `dat`.
    ///
    /// `segmented` reports, per virtual channel, whether frames carry a
    /// segment header; it is consulted for AD and BD frames only.
    ///
    /// # Errors
    ///
    /// [`Error::NotEnoughData`] when `dat` cannot hold the header or the
    /// configured fields; [`Error::FieldConstraint`] on a bad version,
    /// reserved bits, or an over-length frame; [`Error::LengthMismatch`]
    /// when the declared length disagrees with the buffer.
    pub fn decode<F>(dat: Vec<u8>, config: &TcConfig, segmented: F) -> Result<Self>
    where
        F: Fn(Vcid) -> bool,
    {
        if dat.len() < Self::HEADER_LEN {
            return Err(Error::NotEnoughData {
                actual: dat.len(),
                minimum: Self::HEADER_LEN,
            });
        }
        if dat.len() > Self::MAX_FRAME_LEN {
            return Err(Error::FieldConstraint(format!(
                "TC frame length at most {} bytes, got {}",
                Self::MAX_FRAME_LEN,
                dat.len()
            )));
        }
        let version = bits::read(&dat, 0, 2) as u8;
        if version != 0 {
            return Err(Error::FieldConstraint(format!(
                "TC frame version must be 0, got {version}"
            )));
        }
        let bypass_flag = bits::read(&dat, 2, 1) == 1;
        let control_command_flag = bits::read(&dat, 3, 1) == 1;
        if bits::read(&dat, 4, 2) != 0 {
            return Err(Error::FieldConstraint(
                "TC header reserved bits must be zero".into(),
            ));
        }
        let scid = bits::read(&dat, 6, 10) as Scid;
        let vcid = bits::read(&dat, 16, 6) as Vcid;
        let declared = bits::read(&dat, 22, 10) as usize + 1;
        if declared != dat.len() {
            return Err(Error::LengthMismatch(format!(
                "header declares {declared} bytes, buffer has {}",
                dat.len()
            )));
        }
        let vcfc = dat[4];

        let frame_type = if control_command_flag {
            FrameType::Bc
        } else if bypass_flag {
            FrameType::Bd
        } else {
            FrameType::Ad
        };
        let is_segmented = frame_type != FrameType::Bc && segmented(vcid);

        // BC frames never carry segment or security fields
        let (security_header_len, security_trailer_len) = if frame_type == FrameType::Bc {
            (0, 0)
        } else {
            (config.security_header_len, config.security_trailer_len)
        };

        let seg_len = usize::from(is_segmented);
        let data_start = Self::HEADER_LEN + seg_len + security_header_len;
        let (data_len, _) = trailer_layout(
            dat.len(),
            data_start,
            security_trailer_len,
            false,
            config.fecf,
        )?;

        let (sequence_flag, map_id) = if is_segmented {
            let b = dat[Self::HEADER_LEN];
            (SequenceFlag::from_bits((b >> 6) & 0x3), b & 0x3f)
        } else {
            (SequenceFlag::NoSegmentation, 0)
        };

        let control_command = (frame_type == FrameType::Bc).then(|| {
            match &dat[data_start..data_start + data_len] {
                [0x00] => ControlCommand::Unlock,
                [0x82, 0x00, n] => ControlCommand::SetVr(*n),
                _ => ControlCommand::Reserved,
            }
        });

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
            bypass_flag,
            control_command_flag,
            frame_type,
            segmented: is_segmented,
            sequence_flag,
            map_id,
            control_command,
            security_header_len,
            security_trailer_len,
            has_fecf: config.fecf,
            data_start,
            data_len,
            valid,
        })
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

impl TransferFrame for TcFrame {
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
        None
    }

    fn fecf(&self) -> Option<u16> {
        self.has_fecf.then(|| {
            let at = self.frame.len() - 2;
            u16::from_be_bytes([self.frame[at], self.frame[at + 1]])
        })
    }

    /// TC frames have no idle notion; always false.
    fn is_idle(&self) -> bool {
        false
    }

    fn is_valid(&self) -> bool {
        self.valid
    }
}

/// Builds TC transfer frames.
///
/// Unlike the fixed-length TM and AOS builders, the frame length follows
/// from the payload: headers, payload, and trailers are emitted back to
/// back up to the 1024-byte protocol limit. The payload is replaced (not
/// appended) by `add_data`, and the control command setters require the
/// control command flag.
#[derive(Debug)]
pub struct TcFrameBuilder {
    has_fecf: bool,
    bypass_flag: bool,
    control_command_flag: bool,
    scid: Scid,
    vcid: Vcid,
    vcfc: u8,
    segment: Option<(SequenceFlag, u8)>,
    security_header: Vec<u8>,
    security_trailer: Vec<u8>,
    payload: Option<Vec<u8>>,
}

impl TcFrameBuilder {
    #[must_use]
    pub fn new(has_fecf: bool) -> Self {
        Self {
            has_fecf,
            bypass_flag: false,
            control_command_flag: false,
            scid: 0,
            vcid: 0,
            vcfc: 0,
            segment: None,
            security_header: Vec::new(),
            security_trailer: Vec::new(),
            payload: None,
        }
    }

    pub fn set_bypass_flag(&mut self, on: bool) {
        self.bypass_flag = on;
    }

    /// Set the control command flag. Enabling it drops any segment header
    /// and security fields, which BC frames do not carry.
    pub fn set_control_command_flag(&mut self, on: bool) {
        self.control_command_flag = on;
        if on {
            self.segment = None;
            self.security_header.clear();
            self.security_trailer.clear();
        }
    }

    pub fn set_scid(&mut self, scid: Scid) -> Result<()> {
        if scid > 0x3ff {
            return Err(Error::FieldConstraint(format!(
                "TC spacecraft id is 10 bits, got {scid:#x}"
            )));
        }
        self.scid = scid;
        Ok(())
    }

    pub fn set_vcid(&mut self, vcid: Vcid) -> Result<()> {
        if vcid > 0x3f {
            return Err(Error::FieldConstraint(format!(
                "TC virtual channel id is 6 bits, got {vcid:#x}"
            )));
        }
        self.vcid = vcid;
        Ok(())
    }

    pub fn set_vcfc(&mut self, count: u8) {
        self.vcfc = count;
    }

    /// Add a segment header with the given sequence flags and MAP id.
    pub fn set_segment(&mut self, flag: SequenceFlag, map_id: u8) -> Result<()> {
        if self.control_command_flag {
            return Err(Error::BuilderState(
                "BC frames carry no segment header".into(),
            ));
        }
        if map_id > 0x3f {
            return Err(Error::FieldConstraint(format!(
                "MAP id is 6 bits, got {map_id:#x}"
            )));
        }
        self.segment = Some((flag, map_id));
        Ok(())
    }

    /// Set or replace the security header and trailer.
    pub fn set_security(&mut self, header: &[u8], trailer: &[u8]) -> Result<()> {
        if self.control_command_flag {
            return Err(Error::BuilderState(
                "BC frames carry no security fields".into(),
            ));
        }
        let payload_len = self.payload.as_ref().map_or(0, Vec::len);
        let fixed = TcFrame::HEADER_LEN + usize::from(self.segment.is_some()) + payload_len
            + if self.has_fecf { 2 } else { 0 };
        if fixed + header.len() + trailer.len() > TcFrame::MAX_FRAME_LEN {
            return Err(Error::BuilderState(format!(
                "security fields push the frame past {} bytes",
                TcFrame::MAX_FRAME_LEN
            )));
        }
        self.security_header = header.to_vec();
        self.security_trailer = trailer.to_vec();
        Ok(())
    }

    /// Set the data field to the UNLOCK control command.
    pub fn set_unlock(&mut self) -> Result<()> {
        if !self.control_command_flag {
            return Err(Error::BuilderState(
                "control commands require the control command flag".into(),
            ));
        }
        self.payload = Some(vec![0x00]);
        Ok(())
    }

    /// Set the data field to the SET_V(R) control command.
    pub fn set_vr(&mut self, count: u8) -> Result<()> {
        if !self.control_command_flag {
            return Err(Error::BuilderState(
                "control commands require the control command flag".into(),
            ));
        }
        self.payload = Some(vec![0x82, 0x00, count]);
        Ok(())
    }

    /// Set the frame payload, replacing any previous one. Returns the count
    /// of bytes that did not fit within the protocol's maximum frame length.
    pub fn add_data(&mut self, dat: &[u8]) -> usize {
        let capacity = self.payload_capacity();
        let written = capacity.min(dat.len());
        self.payload = Some(dat[..written].to_vec());
        dat.len() - written
    }

    pub fn clear_data(&mut self) {
        self.payload = None;
    }

    fn payload_capacity(&self) -> usize {
        TcFrame::MAX_FRAME_LEN
            - TcFrame::HEADER_LEN
            - usize::from(self.segment.is_some())
            - self.security_header.len()
            - self.security_trailer.len()
            - if self.has_fecf { 2 } else { 0 }
    }

    #[must_use]
    pub fn free_user_data_length(&self) -> usize {
        self.payload_capacity() - self.payload.as_ref().map_or(0, Vec::len)
    }

    #[must_use]
    pub fn is_full(&self) -> bool {
        self.payload.is_some() || self.free_user_data_length() == 0
    }

    /// Emit the frame bytes and return the re-parsed frame.
    ///
    /// # Errors
    ///
    /// [`Error::BuilderState`] when no payload was set for an AD or BD
    /// frame; [`Error::FieldConstraint`] when the assembled frame exceeds
    /// the maximum length.
    pub fn build(self) -> Result<TcFrame> {
        if self.payload.is_none() && !self.control_command_flag {
            return Err(Error::BuilderState(
                "payload data required for AD and BD frames".into(),
            ));
        }
        let payload = self.payload.unwrap_or_default();
        let seg_len = usize::from(self.segment.is_some());
        let fecf_len = if self.has_fecf { 2 } else { 0 };
        let frame_len = TcFrame::HEADER_LEN
            + seg_len
            + self.security_header.len()
            + payload.len()
            + self.security_trailer.len()
            + fecf_len;
        if frame_len > TcFrame::MAX_FRAME_LEN {
            return Err(Error::FieldConstraint(format!(
                "TC frame length at most {} bytes, got {frame_len}",
                TcFrame::MAX_FRAME_LEN
            )));
        }

        let mut dat = vec![0u8; frame_len];
        bits::write(&mut dat, 2, 1, u32::from(self.bypass_flag));
        bits::write(&mut dat, 3, 1, u32::from(self.control_command_flag));
        bits::write(&mut dat, 6, 10, u32::from(self.scid));
        bits::write(&mut dat, 16, 6, u32::from(self.vcid));
        bits::write(&mut dat, 22, 10, (frame_len - 1) as u32);
        dat[4] = self.vcfc;

        let mut at = TcFrame::HEADER_LEN;
        if let Some((flag, map_id)) = self.segment {
            dat[at] = (flag.bits() << 6) | map_id;
            at += 1;
        }
        dat[at..at + self.security_header.len()].copy_from_slice(&self.security_header);
        at += self.security_header.len();
        dat[at..at + payload.len()].copy_from_slice(&payload);
        at += payload.len();
        dat[at..at + self.security_trailer.len()].copy_from_slice(&self.security_trailer);
        if self.has_fecf {
            let crc = frame_error_control(&dat[..frame_len - 2]);
            let at = frame_len - 2;
            dat[at..].copy_from_slice(&crc.to_be_bytes());
        }

        let has_segment = self.segment.is_some();
        TcFrame::decode(
            dat,
            &TcConfig {
                fecf: self.has_fecf,
                security_header_len: self.security_header.len(),
                security_trailer_len: self.security_trailer.len(),
            },
            |_| has_segment,
        )
    }
}
