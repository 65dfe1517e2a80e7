//! Communications Link Transmission Unit framing (CCSDS 231.0-B).
//!
//! A CLTU wraps a TC transfer frame for the uplink: a 2-byte start
//! sequence, the frame split into 7-byte blocks each closed by a
//! [BCH check byte](super::bch), and an 8-byte tail sequence. The last
//! block is padded with `0x55` fill. When randomization is enabled the
//! pseudo-random sequence is restarted for every codeblock and applied
//! before the check byte is computed.

use tracing::debug;

use super::{bch, randomizer, DecodingStage, EncodingStage};
use crate::{Error, Result};

pub const START_SEQUENCE: [u8; 2] = [0xeb, 0x90];
pub const STOP_SEQUENCE: [u8; 8] = [0xc5; 8];

const FILL: u8 = 0x55;

/// Wraps frames into CLTUs.
#[derive(Debug, Clone, Copy)]
pub struct CltuEncoder {
    randomize: bool,
}

impl Default for CltuEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl CltuEncoder {
    /// Encoder without randomization.
    #[must_use]
    pub fn new() -> Self {
        Self { randomize: false }
    }

    #[must_use]
    pub fn with_randomization(mut self, on: bool) -> Self {
        self.randomize = on;
        self
    }

    /// Encode `frame` into a CLTU. An empty frame produces just the start
    /// and tail sequences.
    #[must_use]
    pub fn encode(&self, frame: &[u8]) -> Vec<u8> {
        let num_blocks = frame.len().div_ceil(bch::DATA_LEN);
        let mut out =
            Vec::with_capacity(START_SEQUENCE.len() + num_blocks * bch::BLOCK_LEN + STOP_SEQUENCE.len());
        out.extend_from_slice(&START_SEQUENCE);
        for chunk in frame.chunks(bch::DATA_LEN) {
            let mut block = [FILL; bch::DATA_LEN];
            block[..chunk.len()].copy_from_slice(chunk);
            if self.randomize {
                randomizer::randomize(&mut block);
            }
            out.extend_from_slice(&bch::encode_block_exact(block));
        }
        out.extend_from_slice(&STOP_SEQUENCE);
        out
    }
}

impl EncodingStage for CltuEncoder {
    fn apply(&self, _frame: &[u8], data: Vec<u8>) -> Result<Vec<u8>> {
        Ok(self.encode(&data))
    }
}

/// Locates and unwraps CLTUs.
#[derive(Debug, Clone, Copy)]
pub struct CltuDecoder {
    derandomize: bool,
}

impl Default for CltuDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl CltuDecoder {
    /// Decoder without derandomization.
    #[must_use]
    pub fn new() -> Self {
        Self { derandomize: false }
    }

    #[must_use]
    pub fn with_randomization(mut self, on: bool) -> Self {
        self.derandomize = on;
        self
    }

    /// Extract the frame from a CLTU.
    ///
    /// The start sequence may sit anywhere in `dat` (leading noise is
    /// skipped) and the codeblock body runs to the last tail sequence
    /// found. Trailing `0x55` fill is stripped, including any genuine
    /// frame bytes of that value; callers needing the exact length use
    /// the frame's own length field.
    ///
    /// # Errors
    ///
    /// [`Error::MarkerNotFound`] when the start or tail sequence is
    /// absent; [`Error::LengthMismatch`] when the body between them is not
    /// a whole number of codeblocks; [`Error::Checksum`] when a codeblock
    /// check byte does not match.
    pub fn decode(&self, dat: &[u8]) -> Result<Vec<u8>> {
        let start = dat
            .windows(START_SEQUENCE.len())
            .position(|w| w == START_SEQUENCE)
            .ok_or_else(|| Error::MarkerNotFound("CLTU start sequence not found".into()))?;
        let body_start = start + START_SEQUENCE.len();
        let body_len = dat[body_start..]
            .windows(STOP_SEQUENCE.len())
            .rposition(|w| w == STOP_SEQUENCE)
            .ok_or_else(|| Error::MarkerNotFound("CLTU tail sequence not found".into()))?;
        let body = &dat[body_start..body_start + body_len];
        if body.len() % bch::BLOCK_LEN != 0 {
            return Err(Error::LengthMismatch(format!(
                "CLTU body is {} bytes, not whole {}-byte codeblocks",
                body.len(),
                bch::BLOCK_LEN
            )));
        }
        debug!(start, blocks = body.len() / bch::BLOCK_LEN, "located CLTU");

        let mut out = Vec::with_capacity(body.len() / bch::BLOCK_LEN * bch::DATA_LEN);
        for block in body.chunks_exact(bch::BLOCK_LEN) {
            let mut data = bch::decode_block(block)?;
            if self.derandomize {
                randomizer::randomize(&mut data);
            }
            out.extend_from_slice(&data);
        }
        while out.last() == Some(&FILL) {
            out.pop();
        }
        Ok(out)
    }
}

impl DecodingStage for CltuDecoder {
    fn apply(&self, data: Vec<u8>) -> Result<Vec<u8>> {
        self.decode(&data)
    }
}
