//! CCSDS Transfer Frame data model.
//!
//! Three frame variants share one capability surface:
//!
//! * [`TmFrame`]: TM Space Data Link Protocol (CCSDS 132.0-B)
//! * [`AosFrame`]: AOS Space Data Link Protocol (CCSDS 732.0-B)
//! * [`TcFrame`]: TC Space Data Link Protocol (CCSDS 232.0-B)
//!
//! Each variant owns its complete octet buffer and caches every derived
//! field and byte range at construction, so accessors never re-scan the
//! buffer and can never read out of bounds. Frames are built either from
//! received bytes via the variant's `decode`, or with the variant's builder,
//! which emits bytes and re-parses them so every built frame is valid by
//! construction.

pub mod aos;
pub mod tc;
pub mod tm;

pub use aos::{AosConfig, AosFrame, AosFrameBuilder, UserDataType};
pub use tc::{ControlCommand, FrameType, SequenceFlag, TcConfig, TcFrame, TcFrameBuilder};
pub use tm::{TmConfig, TmFrame, TmFrameBuilder};

use crate::Result;

/// Spacecraft identifier. 10 bits for TM and TC, 8 bits for AOS.
pub type Scid = u16;

/// Virtual channel identifier. 3 bits for TM, 6 bits for AOS and TC.
pub type Vcid = u8;

/// Pad octet written into unused frame space.
pub(crate) const IDLE_FILL: u8 = 0x55;

const CRC: crc::Crc<u16> = crc::Crc::<u16>::new(&crc::CRC_16_IBM_3740);

/// CRC-16/IBM-3740 over `dat`; the frame error control field algorithm.
pub(crate) fn frame_error_control(dat: &[u8]) -> u16 {
    CRC.checksum(dat)
}

/// Payload accepted by the frame builders. Units keep their kind so the
/// first-header and bitstream pointers can be computed at build time.
#[derive(Debug, Clone)]
pub(crate) enum PayloadUnit {
    /// Starts a space packet.
    Packet(Vec<u8>),
    /// Continuation or unstructured data.
    Data(Vec<u8>),
    /// Bitstream data with a count of meaningful bits.
    Bitstream { data: Vec<u8>, valid_bits: usize },
}

impl PayloadUnit {
    pub(crate) fn bytes(&self) -> &[u8] {
        match self {
            PayloadUnit::Packet(d) | PayloadUnit::Data(d) => d,
            PayloadUnit::Bitstream { data, .. } => data,
        }
    }

    pub(crate) fn is_packet_start(&self) -> bool {
        matches!(self, PayloadUnit::Packet(_))
    }
}

/// Accessor surface common to all transfer frame variants.
pub trait TransferFrame {
    /// Complete frame bytes, headers and trailers included.
    fn frame(&self) -> &[u8];

    /// Spacecraft identifier.
    fn scid(&self) -> Scid;

    /// Virtual channel identifier.
    fn vcid(&self) -> Vcid;

    /// Virtual channel frame count (8 bits for TM/TC, 24 bits for AOS).
    fn vcfc(&self) -> u32;

    /// The frame data field, security header/trailer excluded.
    fn data_field(&self) -> &[u8];

    /// Operational control field, when present.
    fn ocf(&self) -> Option<&[u8]>;

    /// Frame error control field value, when present.
    fn fecf(&self) -> Option<u16>;

    /// True if the frame carries no user data per its variant's idle rules.
    fn is_idle(&self) -> bool;

    /// True unless a present frame error control field failed verification.
    fn is_valid(&self) -> bool;
}

/// A transfer frame of any variant.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Frame {
    Tm(TmFrame),
    Aos(AosFrame),
    Tc(TcFrame),
}

impl From<TmFrame> for Frame {
    fn from(frame: TmFrame) -> Self {
        Frame::Tm(frame)
    }
}

impl From<AosFrame> for Frame {
    fn from(frame: AosFrame) -> Self {
        Frame::Aos(frame)
    }
}

impl From<TcFrame> for Frame {
    fn from(frame: TcFrame) -> Self {
        Frame::Tc(frame)
    }
}

macro_rules! delegate {
    ($self:ident, $method:ident) => {
        match $self {
            Frame::Tm(f) => f.$method(),
            Frame::Aos(f) => f.$method(),
            Frame::Tc(f) => f.$method(),
        }
    };
}

impl TransferFrame for Frame {
    fn frame(&self) -> &[u8] {
        delegate!(self, frame)
    }

    fn scid(&self) -> Scid {
        delegate!(self, scid)
    }

    fn vcid(&self) -> Vcid {
        delegate!(self, vcid)
    }

    fn vcfc(&self) -> u32 {
        delegate!(self, vcfc)
    }

    fn data_field(&self) -> &[u8] {
        delegate!(self, data_field)
    }

    fn ocf(&self) -> Option<&[u8]> {
        delegate!(self, ocf)
    }

    fn fecf(&self) -> Option<u16> {
        delegate!(self, fecf)
    }

    fn is_idle(&self) -> bool {
        delegate!(self, is_idle)
    }

    fn is_valid(&self) -> bool {
        delegate!(self, is_valid)
    }
}

/// Splits a frame trailer into data end, OCF range, and FECF presence.
///
/// Returns `(data_field_len, ocf_start)` for a frame of `total` bytes whose
/// data field starts at `data_start`, or an error when the declared optional
/// fields do not fit.
pub(crate) fn trailer_layout(
    total: usize,
    data_start: usize,
    security_trailer_len: usize,
    has_ocf: bool,
    has_fecf: bool,
) -> Result<(usize, Option<usize>)> {
    let ocf_len = if has_ocf { 4 } else { 0 };
    let fecf_len = if has_fecf { 2 } else { 0 };
    let overhead = data_start + security_trailer_len + ocf_len + fecf_len;
    if total < overhead {
        return Err(crate::Error::NotEnoughData {
            actual: total,
            minimum: overhead,
        });
    }
    let ocf_start = has_ocf.then(|| total - fecf_len - 4);
    Ok((total - overhead, ocf_start))
}
