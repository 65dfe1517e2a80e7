//! CCSDS pseudo-randomizer.
//!
//! Bit-transition conditioning for TM/AOS channels (CCSDS 131.0-B) and
//! CLTU codeblocks (CCSDS 231.0-B): data is xored with the output of an
//! 8-bit LFSR, h(x) = x^8 + x^7 + x^5 + x^3 + 1, seeded all-ones. The
//! sequence starts `ff 48 0e c0 9a 0d 70 bc ...` and the operation is its
//! own inverse.

use super::{DecodingStage, EncodingStage};
use crate::Result;

struct Pn {
    state: u8,
}

impl Pn {
    const SEED: u8 = 0xff;

    fn new() -> Self {
        Self { state: Self::SEED }
    }

    fn next_byte(&mut self) -> u8 {
        let out = self.state;
        for _ in 0..8 {
            let s = self.state;
            let fb = ((s >> 7) ^ (s >> 4) ^ (s >> 2) ^ s) & 1;
            self.state = (s << 1) | fb;
        }
        out
    }
}

/// Xor `data` with the pseudo-random sequence, starting from the seed.
///
/// Applying it twice returns the original data.
pub fn randomize(data: &mut [u8]) {
    let mut pn = Pn::new();
    for b in data.iter_mut() {
        *b ^= pn.next_byte();
    }
}

/// Randomizes each block as one run of the sequence.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomizerEncoder;

impl EncodingStage for RandomizerEncoder {
    fn apply(&self, _frame: &[u8], mut data: Vec<u8>) -> Result<Vec<u8>> {
        randomize(&mut data);
        Ok(data)
    }
}

/// Derandomizes each block as one run of the sequence.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomizerDecoder;

impl DecodingStage for RandomizerDecoder {
    fn apply(&self, mut data: Vec<u8>) -> Result<Vec<u8>> {
        randomize(&mut data);
        Ok(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_start_matches_standard() {
        let mut dat = [0u8; 8];
        randomize(&mut dat);
        assert_eq!(hex::encode(dat), "ff480ec09a0d70bc");
    }

    #[test]
    fn randomize_is_self_inverse() {
        let original: Vec<u8> = (0u8..=255).collect();
        let mut dat = original.clone();
        randomize(&mut dat);
        assert_ne!(dat, original);
        randomize(&mut dat);
        assert_eq!(dat, original);
    }

    #[test]
    fn stages_invert_each_other() {
        let frame = vec![0x11, 0x22, 0x33, 0x44, 0x55];
        let encoded = RandomizerEncoder.apply(&frame, frame.clone()).unwrap();
        let decoded = RandomizerDecoder.apply(encoded).unwrap();
        assert_eq!(decoded, frame);
    }
}
