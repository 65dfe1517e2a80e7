//! Attached sync marker stages.

use super::{DecodingStage, EncodingStage};
use crate::{Error, Result};

/// Attached sync marker for RS and uncoded TM/AOS channels
/// (CCSDS 131.0-B).
pub const ASM: [u8; 4] = [0x1a, 0xcf, 0xfc, 0x1d];

/// Prepends the sync marker to each block.
#[derive(Debug, Clone)]
pub struct AsmEncoder {
    marker: Vec<u8>,
}

impl Default for AsmEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl AsmEncoder {
    /// Encoder using the standard marker [`ASM`].
    #[must_use]
    pub fn new() -> Self {
        Self::with_marker(&ASM)
    }

    /// Encoder using a mission-specific marker.
    #[must_use]
    pub fn with_marker(marker: &[u8]) -> Self {
        Self {
            marker: marker.to_vec(),
        }
    }
}

impl EncodingStage for AsmEncoder {
    fn apply(&self, _frame: &[u8], data: Vec<u8>) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(self.marker.len() + data.len());
        out.extend_from_slice(&self.marker);
        out.extend_from_slice(&data);
        Ok(out)
    }
}

/// Checks for the sync marker at the start of each block and, by default,
/// strips it.
#[derive(Debug, Clone)]
pub struct AsmDecoder {
    marker: Vec<u8>,
    strip: bool,
}

impl Default for AsmDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl AsmDecoder {
    /// Decoder using the standard marker [`ASM`].
    #[must_use]
    pub fn new() -> Self {
        Self::with_marker(&ASM)
    }

    /// Decoder using a mission-specific marker.
    #[must_use]
    pub fn with_marker(marker: &[u8]) -> Self {
        Self {
            marker: marker.to_vec(),
            strip: true,
        }
    }

    /// Keep or strip the marker on success. Keeping it is useful when a
    /// downstream consumer expects marker-aligned blocks.
    #[must_use]
    pub fn with_strip(mut self, strip: bool) -> Self {
        self.strip = strip;
        self
    }
}

impl DecodingStage for AsmDecoder {
    fn apply(&self, mut data: Vec<u8>) -> Result<Vec<u8>> {
        if !data.starts_with(&self.marker) {
            return Err(Error::MarkerNotFound(format!(
                "attached sync marker {:02x?} not at block start",
                self.marker
            )));
        }
        if self.strip {
            data.drain(..self.marker.len());
        }
        Ok(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encoder_prepends_marker() {
        let out = AsmEncoder::new().apply(&[], vec![0xde, 0xad]).unwrap();
        assert_eq!(hex::encode(out), "1acffc1ddead");
    }

    #[test]
    fn decoder_strips_marker() {
        let dat = hex::decode("1acffc1ddead").unwrap();
        let out = AsmDecoder::new().apply(dat).unwrap();
        assert_eq!(out, vec![0xde, 0xad]);
    }

    #[test]
    fn decoder_can_keep_marker() {
        let dat = hex::decode("1acffc1ddead").unwrap();
        let out = AsmDecoder::new().with_strip(false).apply(dat.clone()).unwrap();
        assert_eq!(out, dat);
    }

    #[test]
    fn missing_marker_is_an_error() {
        let err = AsmDecoder::new().apply(vec![0xde, 0xad, 0xbe, 0xef, 0x00]);
        assert!(matches!(err, Err(Error::MarkerNotFound(_))));
    }

    #[test]
    fn custom_marker_roundtrip() {
        let marker = [0xfa, 0xf3, 0x20];
        let out = AsmEncoder::with_marker(&marker)
            .apply(&[], vec![0x01])
            .unwrap();
        assert_eq!(out, vec![0xfa, 0xf3, 0x20, 0x01]);
        let out = AsmDecoder::with_marker(&marker).apply(out).unwrap();
        assert_eq!(out, vec![0x01]);
    }
}
