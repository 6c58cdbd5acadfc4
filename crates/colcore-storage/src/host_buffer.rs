//! Growable host-side data buffer.
//!
//! Capacity is always a multiple of [`HOST_ALIGNMENT_BYTES`] so a buffer can be
//! handed to the device runtime without re-padding. Bytes past `len` are zeroed.

pub const HOST_ALIGNMENT_BYTES: usize = 64;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HostBuffer {
    data: Vec<u8>,
    len: usize,
}

impl HostBuffer {
    /// Allocate an empty buffer able to hold `bytes` without reallocating.
    pub fn with_capacity(bytes: usize) -> Self {
        Self {
            data: vec![0u8; aligned(bytes)],
            len: 0,
        }
    }

    /// Take ownership of already-populated bytes.
    pub fn from_vec(mut bytes: Vec<u8>) -> Self {
        let len = bytes.len();
        bytes.resize(aligned(len), 0);
        Self { data: bytes, len }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data[..self.len]
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.data[..self.len]
    }

    /// Ensure room for `additional` more bytes, growing geometrically.
    pub fn reserve(&mut self, additional: usize) {
        let needed = self.len + additional;
        if needed <= self.data.len() {
            return;
        }
        let new_cap = aligned(needed.max(self.data.len() * 2));
        self.data.resize(new_cap, 0);
    }

    pub fn extend_from_slice(&mut self, bytes: &[u8]) {
        self.reserve(bytes.len());
        self.data[self.len..self.len + bytes.len()].copy_from_slice(bytes);
        self.len += bytes.len();
    }

    /// Append `pattern` `count` times.
    pub fn extend_repeated(&mut self, pattern: &[u8], count: usize) {
        let total = pattern.len() * count;
        self.reserve(total);
        for chunk in self.data[self.len..self.len + total].chunks_exact_mut(pattern.len().max(1)) {
            chunk.copy_from_slice(pattern);
        }
        self.len += total;
    }

    /// Grow the logical length by `bytes` zeroed bytes and return them for writing.
    pub fn extend_zeroed(&mut self, bytes: usize) -> &mut [u8] {
        self.reserve(bytes);
        let start = self.len;
        self.len += bytes;
        let region = &mut self.data[start..self.len];
        region.fill(0);
        region
    }

    /// Consume the buffer, returning exactly `len` bytes.
    pub fn into_vec(mut self) -> Vec<u8> {
        self.data.truncate(self.len);
        self.data
    }
}

#[inline]
fn aligned(bytes: usize) -> usize {
    bytes.next_multiple_of(HOST_ALIGNMENT_BYTES)
}
