//! Channel coding: composable encode and decode pipelines.
//!
//! A [`ChannelEncoder`] turns transfer frame bytes into channel symbols by
//! running them through an ordered list of stages (attach a sync marker,
//! randomize, add Reed-Solomon check symbols, wrap in a CLTU). A
//! [`ChannelDecoder`] runs the inverse stages in the inverse order and
//! finishes by handing the recovered bytes to a frame decoder.
//!
//! Pipelines are assembled in the `Building` state and must be sealed
//! before use; a sealed pipeline is immutable and safe to share across
//! threads.
//!
//! ```
//! use spacelink::coding::{AsmEncoder, ChannelEncoder, RandomizerEncoder};
//!
//! let encoder = ChannelEncoder::new()
//!     .add_stage(RandomizerEncoder)
//!     .add_stage(AsmEncoder::new())
//!     .seal();
//! let symbols = encoder.apply(&[0x01, 0x02, 0x03]).unwrap();
//! assert_eq!(&symbols[..4], &[0x1a, 0xcf, 0xfc, 0x1d]);
//! ```

use std::fmt;
use std::marker::PhantomData;

use rayon::prelude::*;

use crate::Result;

pub mod asm;
pub mod bch;
pub mod cltu;
pub mod randomizer;
pub mod reed_solomon;

pub use asm::{AsmDecoder, AsmEncoder, ASM};
pub use cltu::{CltuDecoder, CltuEncoder};
pub use randomizer::{randomize, RandomizerDecoder, RandomizerEncoder};
pub use reed_solomon::{ReedSolomon, ReedSolomonDecoder, ReedSolomonEncoder};

/// One step of an encode pipeline.
///
/// `frame` is the original unencoded frame, available to every stage;
/// `data` is the output of the previous stage (for the first stage, a copy
/// of `frame`).
pub trait EncodingStage: Send + Sync {
    fn apply(&self, frame: &[u8], data: Vec<u8>) -> Result<Vec<u8>>;
}

impl<F> EncodingStage for F
where
    F: Fn(&[u8], Vec<u8>) -> Result<Vec<u8>> + Send + Sync,
{
    fn apply(&self, frame: &[u8], data: Vec<u8>) -> Result<Vec<u8>> {
        self(frame, data)
    }
}

/// One step of a decode pipeline, undoing the matching encode stage.
pub trait DecodingStage: Send + Sync {
    fn apply(&self, data: Vec<u8>) -> Result<Vec<u8>>;
}

impl<F> DecodingStage for F
where
    F: Fn(Vec<u8>) -> Result<Vec<u8>> + Send + Sync,
{
    fn apply(&self, data: Vec<u8>) -> Result<Vec<u8>> {
        self(data)
    }
}

/// Pipeline under construction; stages may still be added.
#[derive(Debug, Default)]
pub struct Building;

/// Finished pipeline; stages are fixed and `apply` is available.
#[derive(Debug, Default)]
pub struct Sealed;

/// An ordered chain of [`EncodingStage`]s.
pub struct ChannelEncoder<State = Building> {
    stages: Vec<Box<dyn EncodingStage>>,
    _state: PhantomData<State>,
}

impl<State> fmt::Debug for ChannelEncoder<State> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChannelEncoder")
            .field("stages", &self.stages.len())
            .finish()
    }
}

impl Default for ChannelEncoder<Building> {
    fn default() -> Self {
        Self::new()
    }
}

impl ChannelEncoder<Building> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            stages: Vec::new(),
            _state: PhantomData,
        }
    }

    /// Append a stage; stages run in the order they were added.
    #[must_use]
    pub fn add_stage(mut self, stage: impl EncodingStage + 'static) -> Self {
        self.stages.push(Box::new(stage));
        self
    }

    #[must_use]
    pub fn seal(self) -> ChannelEncoder<Sealed> {
        ChannelEncoder {
            stages: self.stages,
            _state: PhantomData,
        }
    }
}

impl ChannelEncoder<Sealed> {
    /// Run `frame` through every stage in order.
    ///
    /// # Errors
    ///
    /// The first stage error, unchanged.
    pub fn apply(&self, frame: &[u8]) -> Result<Vec<u8>> {
        let mut data = frame.to_vec();
        for stage in &self.stages {
            data = stage.apply(frame, data)?;
        }
        Ok(data)
    }

    /// Encode many frames in parallel, preserving order.
    ///
    /// # Errors
    ///
    /// The first stage error from any frame.
    pub fn apply_batch(&self, frames: &[Vec<u8>]) -> Result<Vec<Vec<u8>>> {
        frames.par_iter().map(|frame| self.apply(frame)).collect()
    }
}

/// An ordered chain of [`DecodingStage`]s terminated by a frame decoder.
///
/// The frame decoder receives the output of the last stage and produces
/// the typed result `T`, typically by calling one of the transfer frame
/// `decode` functions.
pub struct ChannelDecoder<T, State = Building> {
    stages: Vec<Box<dyn DecodingStage>>,
    frame_decoder: Box<dyn Fn(&[u8]) -> Result<T> + Send + Sync>,
    _state: PhantomData<State>,
}

impl<T, State> fmt::Debug for ChannelDecoder<T, State> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChannelDecoder")
            .field("stages", &self.stages.len())
            .finish()
    }
}

impl<T> ChannelDecoder<T, Building> {
    pub fn new<F>(frame_decoder: F) -> Self
    where
        F: Fn(&[u8]) -> Result<T> + Send + Sync + 'static,
    {
        Self {
            stages: Vec::new(),
            frame_decoder: Box::new(frame_decoder),
            _state: PhantomData,
        }
    }

    /// Append a stage; stages run in the order they were added, so a
    /// decoder lists its stages in the reverse of the matching encoder.
    #[must_use]
    pub fn add_stage(mut self, stage: impl DecodingStage + 'static) -> Self {
        self.stages.push(Box::new(stage));
        self
    }

    #[must_use]
    pub fn seal(self) -> ChannelDecoder<T, Sealed> {
        ChannelDecoder {
            stages: self.stages,
            frame_decoder: self.frame_decoder,
            _state: PhantomData,
        }
    }
}

impl<T> ChannelDecoder<T, Sealed> {
    /// Run `dat` through every stage in order, then through the frame
    /// decoder.
    ///
    /// # Errors
    ///
    /// The first stage or frame decoder error, unchanged.
    pub fn apply(&self, dat: &[u8]) -> Result<T> {
        let mut data = dat.to_vec();
        for stage in &self.stages {
            data = stage.apply(data)?;
        }
        (self.frame_decoder)(&data)
    }

    /// Decode many blocks in parallel, preserving order.
    ///
    /// # Errors
    ///
    /// The first stage or frame decoder error from any block.
    pub fn apply_batch(&self, blocks: &[Vec<u8>]) -> Result<Vec<T>>
    where
        T: Send,
    {
        blocks.par_iter().map(|block| self.apply(block)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    #[test]
    fn encoder_runs_stages_in_order() {
        let encoder = ChannelEncoder::new()
            .add_stage(|_: &[u8], mut data: Vec<u8>| -> Result<Vec<u8>> {
                data.push(0xaa);
                Ok(data)
            })
            .add_stage(|_: &[u8], mut data: Vec<u8>| -> Result<Vec<u8>> {
                data.push(0xbb);
                Ok(data)
            })
            .seal();
        assert_eq!(encoder.apply(&[0x01]).unwrap(), vec![0x01, 0xaa, 0xbb]);
    }

    #[test]
    fn stages_see_the_original_frame() {
        let encoder = ChannelEncoder::new()
            .add_stage(|_: &[u8], _: Vec<u8>| -> Result<Vec<u8>> { Ok(vec![]) })
            .add_stage(|frame: &[u8], _: Vec<u8>| -> Result<Vec<u8>> { Ok(frame.to_vec()) })
            .seal();
        assert_eq!(encoder.apply(&[0x07, 0x08]).unwrap(), vec![0x07, 0x08]);
    }

    #[test]
    fn decoder_finishes_with_frame_decoder() {
        let decoder = ChannelDecoder::new(|dat: &[u8]| Ok(dat.len()))
            .add_stage(|mut data: Vec<u8>| -> Result<Vec<u8>> {
                data.pop();
                Ok(data)
            })
            .seal();
        assert_eq!(decoder.apply(&[1, 2, 3]).unwrap(), 2);
    }

    #[test]
    fn stage_errors_stop_the_pipeline() {
        let decoder = ChannelDecoder::new(|_: &[u8]| -> Result<()> {
            panic!("frame decoder must not run");
        })
        .add_stage(|_: Vec<u8>| -> Result<Vec<u8>> {
            Err(Error::Checksum("bad block".into()))
        })
        .seal();
        assert!(matches!(decoder.apply(&[0]), Err(Error::Checksum(_))));
    }

    #[test]
    fn apply_batch_matches_apply() {
        let encoder = ChannelEncoder::new()
            .add_stage(|_: &[u8], mut data: Vec<u8>| -> Result<Vec<u8>> {
                data.reverse();
                Ok(data)
            })
            .seal();
        let frames: Vec<Vec<u8>> = (0u8..20).map(|i| vec![i, i + 1, i + 2]).collect();
        let batch = encoder.apply_batch(&frames).unwrap();
        for (frame, out) in frames.iter().zip(&batch) {
            assert_eq!(out, &encoder.apply(frame).unwrap());
        }
    }
}
