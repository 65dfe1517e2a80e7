//! Reed-Solomon (255,223) forward error correction.
//!
//! Systematic Reed-Solomon over GF(2^8) with field polynomial
//! x^8 + x^4 + x^3 + x^2 + 1 (0x11d) and first consecutive generator root
//! alpha^112, the (255,223) configuration of CCSDS 131.0-B telemetry
//! links. Encoding appends 32 check symbols to 223 data bytes; decoding
//! runs Berlekamp-Massey, a Chien search, and Forney's algorithm,
//! correcting up to 16 symbol errors per block. Uncorrectable blocks are
//! reported as errors, never returned silently wrong.

use std::fmt;

use tracing::debug;

use super::{DecodingStage, EncodingStage};
use crate::{Error, Result};

const PRIM_POLY: u16 = 0x11d;

static GF_EXP: [u8; 512] = {
    let mut table = [0u8; 512];
    let mut v: u16 = 1;
    let mut i = 0;
    while i < 512 {
        table[i] = v as u8;
        v <<= 1;
        if v & 0x100 != 0 {
            v ^= PRIM_POLY;
        }
        i += 1;
    }
    table
};

static GF_LOG: [u8; 256] = {
    let mut table = [0u8; 256];
    let mut i = 0;
    while i < 255 {
        table[GF_EXP[i] as usize] = i as u8;
        i += 1;
    }
    table
};

#[inline]
fn gf_mul(a: u8, b: u8) -> u8 {
    if a == 0 || b == 0 {
        return 0;
    }
    GF_EXP[GF_LOG[a as usize] as usize + GF_LOG[b as usize] as usize]
}

#[inline]
fn gf_div(a: u8, b: u8) -> u8 {
    debug_assert!(b != 0, "division by zero in GF(256)");
    if a == 0 {
        return 0;
    }
    GF_EXP[(GF_LOG[a as usize] as usize + 255 - GF_LOG[b as usize] as usize) % 255]
}

#[inline]
fn gf_pow(n: usize) -> u8 {
    GF_EXP[n % 255]
}

/// Polynomials are coefficient vectors in ascending order: `p[i]` is the
/// coefficient of `x^i`.
fn poly_eval(p: &[u8], x: u8) -> u8 {
    p.iter().rev().fold(0, |acc, &c| gf_mul(acc, x) ^ c)
}

fn poly_mul(a: &[u8], b: &[u8]) -> Vec<u8> {
    let mut out = vec![0u8; a.len() + b.len() - 1];
    for (i, &ai) in a.iter().enumerate() {
        if ai == 0 {
            continue;
        }
        for (j, &bj) in b.iter().enumerate() {
            out[i + j] ^= gf_mul(ai, bj);
        }
    }
    out
}

fn poly_add(a: &[u8], b: &[u8]) -> Vec<u8> {
    let mut out = vec![0u8; a.len().max(b.len())];
    for (i, &v) in a.iter().enumerate() {
        out[i] ^= v;
    }
    for (i, &v) in b.iter().enumerate() {
        out[i] ^= v;
    }
    out
}

fn poly_scale(p: &[u8], s: u8) -> Vec<u8> {
    p.iter().map(|&c| gf_mul(c, s)).collect()
}

fn poly_deriv(p: &[u8]) -> Vec<u8> {
    if p.len() <= 1 {
        return vec![0];
    }
    // in GF(2^8) even-power terms vanish under differentiation
    let mut out: Vec<u8> = (1..p.len())
        .map(|i| if i & 1 == 1 { p[i] } else { 0 })
        .collect();
    while out.len() > 1 && out.last() == Some(&0) {
        out.pop();
    }
    out
}

/// A Reed-Solomon codec over GF(2^8) with block length 255.
#[derive(Clone)]
pub struct ReedSolomon {
    n: usize,
    nsym: usize,
    fcr: usize,
    generator: Vec<u8>,
}

impl fmt::Debug for ReedSolomon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RS({},{})", self.n, self.data_len())
    }
}

impl ReedSolomon {
    /// A codec with `nsym` check symbols and generator roots starting at
    /// `alpha^fcr`.
    #[must_use]
    pub fn new(nsym: usize, fcr: usize) -> Self {
        let mut generator = vec![gf_pow(fcr), 1];
        for i in 1..nsym {
            generator = poly_mul(&generator, &[gf_pow(fcr + i), 1]);
        }
        Self {
            n: 255,
            nsym,
            fcr,
            generator,
        }
    }

    /// The standard (255,223) telemetry configuration.
    #[must_use]
    pub fn rs_255_223() -> Self {
        Self::new(32, 112)
    }

    /// Data bytes per block.
    #[must_use]
    pub fn data_len(&self) -> usize {
        self.n - self.nsym
    }

    /// Encoded bytes per block.
    #[must_use]
    pub fn block_len(&self) -> usize {
        self.n
    }

    /// Most symbol errors a block can recover from.
    #[must_use]
    pub fn max_errors(&self) -> usize {
        self.nsym / 2
    }

    /// Append check symbols to a data block. The data bytes pass through
    /// unchanged.
    ///
    /// # Errors
    ///
    /// [`Error::LengthMismatch`] when `data` is not exactly
    /// [`data_len`](Self::data_len) bytes.
    pub fn encode(&self, data: &[u8]) -> Result<Vec<u8>> {
        let k = self.data_len();
        if data.len() != k {
            return Err(Error::LengthMismatch(format!(
                "RS({},{k}) data block is {k} bytes, got {}",
                self.n,
                data.len()
            )));
        }
        let mut feedback = vec![0u8; self.nsym];
        for &byte in data {
            let d = byte ^ feedback[self.nsym - 1];
            for j in (1..self.nsym).rev() {
                feedback[j] = feedback[j - 1] ^ gf_mul(d, self.generator[j]);
            }
            feedback[0] = gf_mul(d, self.generator[0]);
        }
        let mut out = Vec::with_capacity(self.n);
        out.extend_from_slice(data);
        out.extend(feedback.iter().rev());
        Ok(out)
    }

    /// Correct and strip check symbols, returning the data bytes.
    ///
    /// # Errors
    ///
    /// [`Error::LengthMismatch`] when `block` is not exactly
    /// [`block_len`](Self::block_len) bytes; [`Error::Checksum`] when more
    /// than [`max_errors`](Self::max_errors) symbols are corrupt.
    pub fn decode(&self, block: &[u8]) -> Result<Vec<u8>> {
        if block.len() != self.n {
            return Err(Error::LengthMismatch(format!(
                "RS({},{}) block is {} bytes, got {}",
                self.n,
                self.data_len(),
                self.n,
                block.len()
            )));
        }
        let mut received = block.to_vec();

        let synd: Vec<u8> = (0..self.nsym)
            .map(|j| {
                let a = gf_pow(self.fcr + j);
                received.iter().fold(0u8, |acc, &b| gf_mul(acc, a) ^ b)
            })
            .collect();
        if synd.iter().all(|&s| s == 0) {
            received.truncate(self.data_len());
            return Ok(received);
        }

        // Berlekamp-Massey for the error locator sigma
        let mut c_poly: Vec<u8> = vec![1];
        let mut b_poly: Vec<u8> = vec![1];
        let mut l = 0usize;
        let mut delta_b: u8 = 1;
        let mut m = 1usize;
        for step in 0..self.nsym {
            let mut delta = synd[step];
            for i in 1..c_poly.len() {
                if step >= i {
                    delta ^= gf_mul(c_poly[i], synd[step - i]);
                }
            }
            if delta == 0 {
                m += 1;
            } else if 2 * l <= step {
                let factor = gf_div(delta, delta_b);
                let mut shifted = vec![0u8; m];
                shifted.extend(poly_scale(&b_poly, factor));
                let t_poly = poly_add(&c_poly, &shifted);
                b_poly = c_poly;
                c_poly = t_poly;
                l = step + 1 - l;
                delta_b = delta;
                m = 1;
            } else {
                let factor = gf_div(delta, delta_b);
                let mut shifted = vec![0u8; m];
                shifted.extend(poly_scale(&b_poly, factor));
                c_poly = poly_add(&c_poly, &shifted);
                m += 1;
            }
        }
        while c_poly.len() > 1 && c_poly.last() == Some(&0) {
            c_poly.pop();
        }
        let sigma = c_poly;
        let num_errors = sigma.len() - 1;
        if num_errors == 0 || num_errors > self.max_errors() {
            return Err(Error::Checksum(format!(
                "uncorrectable RS block: error locator degree {num_errors}"
            )));
        }

        // Chien search for error positions
        let mut positions = Vec::with_capacity(num_errors);
        let mut x_invs = Vec::with_capacity(num_errors);
        for pos in 0..self.n {
            let x_inv = gf_pow(pos + 255 - (self.n - 1));
            if poly_eval(&sigma, x_inv) == 0 {
                positions.push(pos);
                x_invs.push(x_inv);
            }
        }
        if positions.len() != num_errors {
            return Err(Error::Checksum(format!(
                "uncorrectable RS block: {} locator roots for degree {num_errors}",
                positions.len()
            )));
        }

        // Forney error magnitudes
        let omega_full = poly_mul(&synd, &sigma);
        let omega = &omega_full[..omega_full.len().min(self.nsym)];
        let sigma_prime = poly_deriv(&sigma);
        let exp_adjust = (256 - self.fcr) % 255;
        for (&pos, &x_inv) in positions.iter().zip(&x_invs) {
            let omega_val = poly_eval(omega, x_inv);
            let sigma_p_val = poly_eval(&sigma_prime, x_inv);
            if sigma_p_val == 0 {
                return Err(Error::Checksum(
                    "uncorrectable RS block: zero locator derivative".into(),
                ));
            }
            let mut magnitude = gf_div(omega_val, sigma_p_val);
            let e_j = (self.n - 1 - pos) % 255;
            magnitude = gf_mul(magnitude, gf_pow(e_j * exp_adjust));
            received[pos] ^= magnitude;
        }
        debug!(corrected = positions.len(), "repaired RS block");

        received.truncate(self.data_len());
        Ok(received)
    }
}

/// Stage appending RS(255,223) check symbols to each block.
#[derive(Debug, Clone)]
pub struct ReedSolomonEncoder {
    rs: ReedSolomon,
}

impl Default for ReedSolomonEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl ReedSolomonEncoder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            rs: ReedSolomon::rs_255_223(),
        }
    }
}

impl EncodingStage for ReedSolomonEncoder {
    fn apply(&self, _frame: &[u8], data: Vec<u8>) -> Result<Vec<u8>> {
        self.rs.encode(&data)
    }
}

/// Stage correcting and stripping RS(255,223) check symbols.
#[derive(Debug, Clone)]
pub struct ReedSolomonDecoder {
    rs: ReedSolomon,
}

impl Default for ReedSolomonDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl ReedSolomonDecoder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            rs: ReedSolomon::rs_255_223(),
        }
    }
}

impl DecodingStage for ReedSolomonDecoder {
    fn apply(&self, data: Vec<u8>) -> Result<Vec<u8>> {
        self.rs.decode(&data)
    }
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    use super::*;

    fn test_data() -> Vec<u8> {
        (0..223).map(|i| ((i * 7 + 3) % 256) as u8).collect()
    }

    #[test]
    fn generator_polynomial() {
        let rs = ReedSolomon::rs_255_223();
        assert_eq!(rs.generator.len(), 33);
        assert_eq!(&rs.generator[..4], &[0x01, 0xec, 0xf4, 0xdc]);
        assert_eq!(rs.generator[32], 0x01);
    }

    #[test]
    fn encode_known_parity() {
        let data = test_data();
        let block = ReedSolomon::rs_255_223().encode(&data).unwrap();
        assert_eq!(block.len(), 255);
        assert_eq!(&block[..223], &data[..]);
        assert_eq!(
            hex::encode(&block[223..]),
            "6037a4b1366f4071e616ef2df6ed336ef05fe123f752e5482112fde18bc12725"
        );
    }

    #[test]
    fn zero_block_has_zero_parity() {
        let block = ReedSolomon::rs_255_223().encode(&[0u8; 223]).unwrap();
        assert_eq!(block, vec![0u8; 255]);
    }

    #[test]
    fn decode_clean_block() {
        let rs = ReedSolomon::rs_255_223();
        let data = test_data();
        let block = rs.encode(&data).unwrap();
        assert_eq!(rs.decode(&block).unwrap(), data);
    }

    #[test]
    fn corrects_single_errors_at_any_position() {
        let rs = ReedSolomon::rs_255_223();
        let data = test_data();
        let block = rs.encode(&data).unwrap();
        for pos in (0..255).step_by(16) {
            let mut received = block.clone();
            received[pos] ^= 0x55;
            assert_eq!(rs.decode(&received).unwrap(), data, "error at {pos}");
        }
    }

    #[test]
    fn corrects_sixteen_errors() {
        let rs = ReedSolomon::rs_255_223();
        let data = test_data();
        let mut received = rs.encode(&data).unwrap();
        for i in 0..16 {
            received[i * 15] ^= ((i + 1) as u8) | 0x80;
        }
        assert_eq!(rs.decode(&received).unwrap(), data);
    }

    #[test]
    fn corrects_random_sixteen_error_patterns() {
        let rs = ReedSolomon::rs_255_223();
        let data = test_data();
        let block = rs.encode(&data).unwrap();
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..25 {
            let mut received = block.clone();
            for pos in rand::seq::index::sample(&mut rng, 255, 16) {
                received[pos] ^= rng.gen_range(1..=255u8);
            }
            assert_eq!(rs.decode(&received).unwrap(), data);
        }
    }

    #[test]
    fn rejects_too_many_errors() {
        let rs = ReedSolomon::rs_255_223();
        let block = rs.encode(&test_data()).unwrap();
        for num_errors in [17, 20] {
            let mut received = block.clone();
            for i in 0..num_errors {
                received[i * 12] ^= 0xa5;
            }
            assert!(
                matches!(rs.decode(&received), Err(Error::Checksum(_))),
                "{num_errors} errors were not rejected"
            );
        }
    }

    #[test]
    fn length_checks() {
        let rs = ReedSolomon::rs_255_223();
        assert!(matches!(
            rs.encode(&[0u8; 100]),
            Err(Error::LengthMismatch(_))
        ));
        assert!(matches!(
            rs.decode(&[0u8; 254]),
            Err(Error::LengthMismatch(_))
        ));
    }

    #[test]
    fn stages_roundtrip_with_errors() {
        let data = test_data();
        let mut encoded = ReedSolomonEncoder::new().apply(&data, data.clone()).unwrap();
        encoded[40] ^= 0xff;
        encoded[200] ^= 0x01;
        assert_eq!(ReedSolomonDecoder::new().apply(encoded).unwrap(), data);
    }
}
