//! Validity bit-vector: one bit per row, 1 = valid, 0 = null.
//!
//! Bits are packed least-significant-bit first within each byte. Allocations
//! are rounded up to 64 bytes, and every bit past the logical row count is
//! initialized to valid so bulk scans over the padding never see a null.
//!
//! The free functions operate on raw byte slices and do no bounds checking
//! beyond slice indexing; range checks belong to the column layer.

/// Byte alignment of every validity allocation.
pub const VALIDITY_ALIGNMENT_BYTES: usize = 64;

const ALL_VALID_BYTE: u8 = 0xFF;

/// Bytes needed to hold `rows` validity bits at the fixed alignment.
pub fn allocation_size_bytes(rows: usize) -> usize {
    rows.div_ceil(8).next_multiple_of(VALIDITY_ALIGNMENT_BYTES)
}

/// Mark row `index` valid.
#[inline]
pub fn set_bit(buf: &mut [u8], index: usize) {
    buf[index >> 3] |= 1 << (index & 7);
}

/// Mark row `index` null.
#[inline]
pub fn clear_bit(buf: &mut [u8], index: usize) {
    buf[index >> 3] &= !(1 << (index & 7));
}

/// Whether row `index` is valid.
#[inline]
pub fn is_set(buf: &[u8], index: usize) -> bool {
    (buf[index >> 3] >> (index & 7)) & 1 != 0
}

/// Set `len` bits starting at `start` to valid or null.
pub fn set_range(buf: &mut [u8], start: usize, len: usize, valid: bool) {
    if len == 0 {
        return;
    }
    let end = start + len;
    let (start_byte, start_bit) = (start >> 3, start & 7);
    let (end_byte, end_bit) = (end >> 3, end & 7);

    if start_byte == end_byte {
        apply_mask(&mut buf[start_byte], low_mask(len) << start_bit, valid);
        return;
    }

    let mut first_full = start_byte;
    if start_bit != 0 {
        apply_mask(&mut buf[start_byte], ALL_VALID_BYTE << start_bit, valid);
        first_full += 1;
    }
    let fill = if valid { ALL_VALID_BYTE } else { 0 };
    buf[first_full..end_byte].fill(fill);
    if end_bit != 0 {
        apply_mask(&mut buf[end_byte], low_mask(end_bit), valid);
    }
}

/// Number of null (unset) bits among the first `len` bits.
pub fn count_unset(buf: &[u8], len: usize) -> usize {
    let full = len >> 3;
    let mut nulls: usize = buf[..full].iter().map(|b| b.count_zeros() as usize).sum();
    let rem = len & 7;
    if rem != 0 {
        nulls += (!buf[full] & low_mask(rem)).count_ones() as usize;
    }
    nulls
}

/// Copy the first `src_len` bits of `src` into `dst` starting at bit
/// `dst_offset`. Bits of `dst` outside `[dst_offset, dst_offset + src_len)`
/// are left untouched.
///
/// When `dst_offset` is not byte aligned every destination byte is assembled
/// from up to two source bytes shifted into place.
pub fn append_with_offset(dst: &mut [u8], dst_offset: usize, src: &[u8], src_len: usize) {
    if src_len == 0 {
        return;
    }
    debug_assert!(src.len() * 8 >= src_len);
    debug_assert!(dst.len() * 8 >= dst_offset + src_len);

    if dst_offset & 7 == 0 {
        let start = dst_offset >> 3;
        let full = src_len >> 3;
        dst[start..start + full].copy_from_slice(&src[..full]);
        let rem = src_len & 7;
        if rem != 0 {
            let mask = low_mask(rem);
            let byte = &mut dst[start + full];
            *byte = (*byte & !mask) | (src[full] & mask);
        }
        return;
    }

    let mut src_pos = 0;
    let mut dst_pos = dst_offset;
    while src_pos < src_len {
        let dst_shift = dst_pos & 7;
        let n = (8 - dst_shift).min(src_len - src_pos);
        let bits = read_bits(src, src_pos, n);
        let mask = low_mask(n) << dst_shift;
        let byte = &mut dst[dst_pos >> 3];
        *byte = (*byte & !mask) | ((bits << dst_shift) & mask);
        src_pos += n;
        dst_pos += n;
    }
}

/// Read `n <= 8` bits starting at bit `pos`, returned in the low bits.
#[inline]
fn read_bits(src: &[u8], pos: usize, n: usize) -> u8 {
    let byte = pos >> 3;
    let shift = pos & 7;
    let mut v = (src[byte] as u16) >> shift;
    if shift + n > 8 {
        v |= (src[byte + 1] as u16) << (8 - shift);
    }
    (v as u8) & low_mask(n)
}

#[inline]
fn low_mask(n: usize) -> u8 {
    if n >= 8 { ALL_VALID_BYTE } else { (1u8 << n) - 1 }
}

#[inline]
fn apply_mask(byte: &mut u8, mask: u8, valid: bool) {
    if valid {
        *byte |= mask;
    } else {
        *byte &= !mask;
    }
}

/// Owned validity bit-vector sized by [`allocation_size_bytes`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValidityBuffer {
    bytes: Vec<u8>,
}

impl ValidityBuffer {
    /// Allocate room for `rows` bits, all valid (including the padding).
    pub fn new_all_valid(rows: usize) -> Self {
        Self {
            bytes: vec![ALL_VALID_BYTE; allocation_size_bytes(rows)],
        }
    }

    /// Wrap bytes downloaded from the device or produced elsewhere.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    /// Total number of bits the allocation can track.
    pub fn capacity_bits(&self) -> usize {
        self.bytes.len() * 8
    }

    #[inline]
    pub fn is_valid(&self, index: usize) -> bool {
        is_set(&self.bytes, index)
    }

    #[inline]
    pub fn set_valid(&mut self, index: usize) {
        set_bit(&mut self.bytes, index);
    }

    #[inline]
    pub fn set_null(&mut self, index: usize) {
        clear_bit(&mut self.bytes, index);
    }

    pub fn set_range(&mut self, start: usize, len: usize, valid: bool) {
        set_range(&mut self.bytes, start, len, valid);
    }

    /// Copy the first `src_len` bits of `src` to bit `dst_offset` of `self`.
    pub fn append_from(&mut self, dst_offset: usize, src: &ValidityBuffer, src_len: usize) {
        append_with_offset(&mut self.bytes, dst_offset, &src.bytes, src_len);
    }

    /// Null count over the first `rows` bits.
    pub fn null_count(&self, rows: usize) -> usize {
        count_unset(&self.bytes, rows)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn bits_of(buf: &[u8], len: usize) -> Vec<bool> {
        (0..len).map(|i| is_set(buf, i)).collect()
    }

    fn pack(bits: &[bool]) -> Vec<u8> {
        let mut buf = vec![0u8; bits.len().div_ceil(8).max(1)];
        for (i, &b) in bits.iter().enumerate() {
            if b {
                set_bit(&mut buf, i);
            }
        }
        buf
    }

    #[test]
    fn allocation_size_is_aligned() {
        assert_eq!(allocation_size_bytes(0), 0);
        assert_eq!(allocation_size_bytes(1), 64);
        assert_eq!(allocation_size_bytes(512), 64);
        assert_eq!(allocation_size_bytes(513), 128);
    }

    #[test]
    fn set_clear_is_set() {
        let mut buf = vec![0u8; 2];
        set_bit(&mut buf, 0);
        set_bit(&mut buf, 9);
        assert_eq!(buf, vec![0b0000_0001, 0b0000_0010]);
        assert!(is_set(&buf, 9));
        clear_bit(&mut buf, 9);
        assert!(!is_set(&buf, 9));
        assert!(is_set(&buf, 0));
    }

    #[test]
    fn set_range_within_single_byte() {
        let mut buf = vec![0xFFu8; 2];
        set_range(&mut buf, 2, 3, false);
        for i in 0..16 {
            assert_eq!(is_set(&buf, i), !(2..5).contains(&i), "bit {i}");
        }
    }

    #[test]
    fn set_range_across_bytes() {
        let mut buf = vec![0u8; 4];
        set_range(&mut buf, 5, 20, true);
        for i in 0..32 {
            assert_eq!(is_set(&buf, i), (5..25).contains(&i), "bit {i}");
        }
    }

    #[test]
    fn count_unset_partial_byte() {
        let mut buf = vec![0xFFu8; 2];
        clear_bit(&mut buf, 3);
        clear_bit(&mut buf, 10);
        assert_eq!(count_unset(&buf, 16), 2);
        assert_eq!(count_unset(&buf, 10), 1);
        assert_eq!(count_unset(&buf, 11), 2);
        assert_eq!(count_unset(&buf, 0), 0);
    }

    #[test]
    fn append_zero_length_is_noop() {
        let mut dst = vec![0b1010_1010u8; 2];
        append_with_offset(&mut dst, 3, &[], 0);
        assert_eq!(dst, vec![0b1010_1010u8; 2]);
    }

    #[test]
    fn append_single_bit_at_every_offset() {
        for offset in 0..16 {
            let mut dst = vec![0xFFu8; 2];
            append_with_offset(&mut dst, offset, &[0b0000_0000], 1);
            for i in 0..16 {
                assert_eq!(is_set(&dst, i), i != offset, "offset {offset} bit {i}");
            }
        }
    }

    #[test]
    fn append_exhaustive_offsets_and_lengths() {
        for offset in 0..8 {
            for len in 0..=40 {
                let src_bits: Vec<bool> = (0..len).map(|i| i % 3 != 1).collect();
                let src = pack(&src_bits);
                let mut dst = vec![0b0101_0101u8; 8];
                let before = dst.clone();
                append_with_offset(&mut dst, offset, &src, len);
                for i in 0..64 {
                    let expected = if (offset..offset + len).contains(&i) {
                        src_bits[i - offset]
                    } else {
                        is_set(&before, i)
                    };
                    assert_eq!(is_set(&dst, i), expected, "offset {offset} len {len} bit {i}");
                }
            }
        }
    }

    #[test]
    fn buffer_padding_reads_valid() {
        let mut v = ValidityBuffer::new_all_valid(10);
        v.set_null(3);
        assert_eq!(v.capacity_bits(), 512);
        assert_eq!(v.null_count(10), 1);
        for i in 10..v.capacity_bits() {
            assert!(v.is_valid(i));
        }
    }

    #[test]
    fn buffer_append_from() {
        let mut a = ValidityBuffer::new_all_valid(3);
        a.set_null(1);
        let mut dst = ValidityBuffer::new_all_valid(10);
        dst.append_from(5, &a, 3);
        assert_eq!(dst.null_count(10), 1);
        assert!(!dst.is_valid(6));
        assert!(dst.is_valid(5));
        assert!(dst.is_valid(7));
    }

    proptest! {
        #[test]
        fn append_preserves_source_and_surroundings(
            dst_offset in 0usize..70,
            src_bits in prop::collection::vec(any::<bool>(), 0..90),
            fill in any::<u8>(),
        ) {
            let src = pack(&src_bits);
            let len = src_bits.len();
            let mut dst = vec![fill; (dst_offset + len).div_ceil(8) + 1];
            let before = dst.clone();
            append_with_offset(&mut dst, dst_offset, &src, len);

            prop_assert_eq!(bits_of(&dst[..], dst_offset + len)[dst_offset..].to_vec(), src_bits);
            for i in 0..dst.len() * 8 {
                if i < dst_offset || i >= dst_offset + len {
                    prop_assert_eq!(is_set(&dst, i), is_set(&before, i));
                }
            }
        }

        #[test]
        fn chained_appends_concatenate(
            parts in prop::collection::vec(prop::collection::vec(any::<bool>(), 0..20), 0..6),
        ) {
            let total: usize = parts.iter().map(Vec::len).sum();
            let mut dst = ValidityBuffer::new_all_valid(total);
            let mut offset = 0;
            for part in &parts {
                let src = ValidityBuffer::from_bytes(pack(part));
                dst.append_from(offset, &src, part.len());
                offset += part.len();
            }
            let expected: Vec<bool> = parts.concat();
            prop_assert_eq!(bits_of(dst.as_bytes(), total), expected);
            for i in total..dst.capacity_bits() {
                prop_assert!(dst.is_valid(i));
            }
        }

        #[test]
        fn set_range_matches_bitwise_loop(
            start in 0usize..40,
            len in 0usize..40,
            valid in any::<bool>(),
        ) {
            let mut fast = vec![0b1100_1010u8; 12];
            let mut slow = fast.clone();
            set_range(&mut fast, start, len, valid);
            for i in start..start + len {
                if valid { set_bit(&mut slow, i) } else { clear_bit(&mut slow, i) }
            }
            prop_assert_eq!(fast, slow);
        }
    }
}
