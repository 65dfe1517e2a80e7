//! MSB-first bit-field access over octet buffers.
//!
//! The transfer frame headers pack fields at sub-byte widths (10-bit
//! spacecraft ids, 11-bit pointers, 24-bit counters). These helpers read and
//! write such fields at absolute bit offsets, most significant bit first.
//! Callers are responsible for bounds: offsets must lie within the buffer.

/// Read `width` bits starting at absolute bit offset `bit`, MSB first.
///
/// # Panics
///
/// Panics if the addressed bits fall outside `dat` or `width > 32`.
pub(crate) fn read(dat: &[u8], bit: usize, width: usize) -> u32 {
    assert!(width <= 32);
    let mut out: u32 = 0;
    for i in bit..bit + width {
        out = (out << 1) | u32::from((dat[i / 8] >> (7 - i % 8)) & 1);
    }
    out
}

/// Write the low `width` bits of `value` at absolute bit offset `bit`,
/// MSB first.
///
/// # Panics
///
/// Panics if the addressed bits fall outside `dat` or `width > 32`.
pub(crate) fn write(dat: &mut [u8], bit: usize, width: usize, value: u32) {
    assert!(width <= 32);
    for (n, i) in (bit..bit + width).enumerate() {
        let v = (value >> (width - 1 - n)) & 1;
        let mask = 1u8 << (7 - i % 8);
        if v == 1 {
            dat[i / 8] |= mask;
        } else {
            dat[i / 8] &= !mask;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_spans_byte_boundaries() {
        // 0b0000_0010 1010_1011 -> 10-bit field at offset 6 = 0b10_1010_1011
        let dat = [0x02, 0xab];
        assert_eq!(read(&dat, 0, 2), 0);
        assert_eq!(read(&dat, 6, 10), 0x2ab);
        assert_eq!(read(&dat, 0, 16), 0x02ab);
        assert_eq!(read(&dat, 15, 1), 1);
    }

    #[test]
    fn write_then_read() {
        let mut dat = [0u8; 4];
        write(&mut dat, 2, 10, 0x3ff);
        write(&mut dat, 12, 3, 0b101);
        write(&mut dat, 15, 11, 0x7fe);
        assert_eq!(read(&dat, 2, 10), 0x3ff);
        assert_eq!(read(&dat, 12, 3), 0b101);
        assert_eq!(read(&dat, 15, 11), 0x7fe);
        // untouched neighbors stay zero
        assert_eq!(read(&dat, 0, 2), 0);
        assert_eq!(read(&dat, 26, 6), 0);
    }

    #[test]
    fn write_clears_previous_bits() {
        let mut dat = [0xff_u8; 2];
        write(&mut dat, 4, 8, 0x00);
        assert_eq!(dat, [0xf0, 0x0f]);
    }
}
