#![doc = include_str!("../README.md")]

mod bits;
mod error;

pub mod coding;
pub mod frame;
pub mod ocf;

pub use error::{Error, Result};
