//! Growable byte buffer with an inline fast path for short payloads.
//!
//! [ByteBuffer] stores up to [INLINE_CAPACITY] bytes without touching the heap. Larger contents move
//! to an exclusively owned heap block whose capacity doubles on growth and is always a multiple of
//! eight bytes. Shrinking back to [INLINE_CAPACITY] bytes or fewer releases the heap block. Moving
//! the contents out (see [ByteBuffer::take]) leaves an empty inline buffer behind.

use bytes::{buf::UninitSlice, BufMut};
use fieldwire_utils::hex;
use std::{
    fmt,
    hash::{Hash, Hasher},
    ops::{Deref, DerefMut},
};

/// Number of bytes stored inline before spilling to the heap.
pub const INLINE_CAPACITY: usize = 32;

/// Heap capacities are rounded up to a multiple of this value.
const GRANULARITY: usize = 8;

/// Minimum number of bytes made available by [BufMut::chunk_mut] when the buffer is full.
const MIN_CHUNK: usize = 64;

enum Storage {
    Inline {
        data: [u8; INLINE_CAPACITY],
        len: usize,
    },
    // Every byte of `data` is initialized, so growing `len` without zero-filling exposes stale
    // (but valid) bytes.
    Heap {
        data: Box<[u8]>,
        len: usize,
    },
}

/// A growable, contiguous sequence of bytes.
pub struct ByteBuffer {
    storage: Storage,
    // Minimum heap capacity allocated when the contents first outgrow the inline storage.
    spill: usize,
}

fn round_up(n: usize) -> usize {
    n.checked_next_multiple_of(GRANULARITY)
        .expect("capacity overflow")
}

impl ByteBuffer {
    /// Creates an empty buffer that does not allocate.
    pub const fn new() -> Self {
        Self {
            storage: Storage::Inline {
                data: [0; INLINE_CAPACITY],
                len: 0,
            },
            spill: 0,
        }
    }

    /// Creates an empty buffer able to hold at least `capacity` bytes without reallocating.
    ///
    /// The buffer starts inline; the heap block is allocated once the contents outgrow
    /// [INLINE_CAPACITY].
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            spill: capacity,
            ..Self::new()
        }
    }

    /// Returns the number of bytes in the buffer.
    #[inline]
    pub fn len(&self) -> usize {
        match &self.storage {
            Storage::Inline { len, .. } | Storage::Heap { len, .. } => *len,
        }
    }

    /// Returns `true` if the buffer holds no bytes.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the number of bytes the buffer can hold without reallocating.
    #[inline]
    pub fn capacity(&self) -> usize {
        match &self.storage {
            Storage::Inline { .. } => INLINE_CAPACITY,
            Storage::Heap { data, .. } => data.len(),
        }
    }

    /// Returns `true` if the contents are stored inline.
    #[inline]
    pub fn is_inline(&self) -> bool {
        matches!(self.storage, Storage::Inline { .. })
    }

    /// Returns the contents as a slice.
    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        match &self.storage {
            Storage::Inline { data, len } => &data[..*len],
            Storage::Heap { data, len } => &data[..*len],
        }
    }

    /// Returns the contents as a mutable slice.
    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        match &mut self.storage {
            Storage::Inline { data, len } => &mut data[..*len],
            Storage::Heap { data, len } => &mut data[..*len],
        }
    }

    /// Returns the full backing storage (including bytes past the logical length) and the length.
    fn raw_parts(&mut self) -> (&mut [u8], &mut usize) {
        match &mut self.storage {
            Storage::Inline { data, len } => (&mut data[..], len),
            Storage::Heap { data, len } => (&mut data[..], len),
        }
    }

    /// Ensures the buffer can hold at least `additional` more bytes.
    ///
    /// Growth at least doubles the current capacity. Slices previously obtained from the buffer
    /// must not be retained across this call.
    pub fn reserve(&mut self, additional: usize) {
        let required = self.len().checked_add(additional).expect("capacity overflow");
        let capacity = self.capacity();
        if required <= capacity {
            return;
        }
        let capacity = round_up(required.max(capacity * 2).max(self.spill));
        let mut data = vec![0; capacity].into_boxed_slice();
        let len = self.len();
        data[..len].copy_from_slice(self.as_slice());
        self.storage = Storage::Heap { data, len };
    }

    /// Appends `bytes` to the end of the buffer.
    pub fn append(&mut self, bytes: &[u8]) {
        self.reserve(bytes.len());
        let (data, len) = self.raw_parts();
        data[*len..*len + bytes.len()].copy_from_slice(bytes);
        *len += bytes.len();
    }

    /// Appends a single byte.
    #[inline]
    pub fn push(&mut self, byte: u8) {
        self.append(&[byte]);
    }

    // Moves heap contents of at most INLINE_CAPACITY bytes back inline, releasing the heap block.
    fn shrink_inline(&mut self) {
        let Storage::Heap { data: heap, len } = &self.storage else {
            return;
        };
        let len = *len;
        if len > INLINE_CAPACITY {
            return;
        }
        let mut data = [0; INLINE_CAPACITY];
        data.copy_from_slice(&heap[..INLINE_CAPACITY]);
        self.storage = Storage::Inline { data, len };
    }

    /// Sets the length of the buffer to `new_len`.
    ///
    /// When growing, new bytes are zeroed if `zero_fill` is set. Otherwise their contents are
    /// unspecified (whatever the storage previously held).
    pub fn resize(&mut self, new_len: usize, zero_fill: bool) {
        let old_len = self.len();
        if new_len > old_len {
            self.reserve(new_len - old_len);
        }
        let (data, len) = self.raw_parts();
        if zero_fill && new_len > old_len {
            data[old_len..new_len].fill(0);
        }
        *len = new_len;
        self.shrink_inline();
    }

    /// Empties the buffer, returning to inline storage.
    #[inline]
    pub fn clear(&mut self) {
        self.resize(0, false);
    }

    /// Moves the contents out, leaving an empty inline buffer in place.
    #[inline]
    pub fn take(&mut self) -> Self {
        std::mem::take(self)
    }

    /// Converts the buffer into a vector.
    pub fn into_vec(self) -> Vec<u8> {
        self.as_slice().to_vec()
    }
}

impl Clone for ByteBuffer {
    fn clone(&self) -> Self {
        let storage = match &self.storage {
            Storage::Heap { data, len } if *len > INLINE_CAPACITY => Storage::Heap {
                data: data.clone(),
                len: *len,
            },
            _ => {
                let mut data = [0; INLINE_CAPACITY];
                let len = self.len();
                data[..len].copy_from_slice(self.as_slice());
                Storage::Inline { data, len }
            }
        };
        Self {
            storage,
            spill: self.spill,
        }
    }
}

impl Default for ByteBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl Deref for ByteBuffer {
    type Target = [u8];

    #[inline]
    fn deref(&self) -> &[u8] {
        self.as_slice()
    }
}

impl DerefMut for ByteBuffer {
    #[inline]
    fn deref_mut(&mut self) -> &mut [u8] {
        self.as_mut_slice()
    }
}

impl AsRef<[u8]> for ByteBuffer {
    fn as_ref(&self) -> &[u8] {
        self.as_slice()
    }
}

impl PartialEq for ByteBuffer {
    fn eq(&self, other: &Self) -> bool {
        self.as_slice() == other.as_slice()
    }
}

impl Eq for ByteBuffer {}

impl PartialEq<[u8]> for ByteBuffer {
    fn eq(&self, other: &[u8]) -> bool {
        self.as_slice() == other
    }
}

impl PartialEq<&[u8]> for ByteBuffer {
    fn eq(&self, other: &&[u8]) -> bool {
        self.as_slice() == *other
    }
}

impl Hash for ByteBuffer {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.as_slice().hash(state);
    }
}

impl fmt::Debug for ByteBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ByteBuffer({})", hex(self.as_slice()))
    }
}

impl From<&[u8]> for ByteBuffer {
    fn from(bytes: &[u8]) -> Self {
        let mut buffer = Self::with_capacity(bytes.len());
        buffer.append(bytes);
        buffer
    }
}

impl From<Vec<u8>> for ByteBuffer {
    fn from(bytes: Vec<u8>) -> Self {
        Self::from(bytes.as_slice())
    }
}

impl From<ByteBuffer> for Vec<u8> {
    fn from(buffer: ByteBuffer) -> Self {
        buffer.into_vec()
    }
}

// SAFETY: `chunk_mut` only exposes storage past the logical length, and `advance_mut` refuses to
// move the length past the capacity. All storage is initialized, so advancing never exposes
// uninitialized memory.
unsafe impl BufMut for ByteBuffer {
    #[inline]
    fn remaining_mut(&self) -> usize {
        isize::MAX as usize - self.len()
    }

    unsafe fn advance_mut(&mut self, cnt: usize) {
        let capacity = self.capacity();
        let (_, len) = self.raw_parts();
        assert!(
            *len + cnt <= capacity,
            "advance_mut past capacity: {} > {}",
            *len + cnt,
            capacity
        );
        *len += cnt;
        self.shrink_inline();
    }

    fn chunk_mut(&mut self) -> &mut UninitSlice {
        if self.len() == self.capacity() {
            self.reserve(MIN_CHUNK);
        }
        let (data, len) = self.raw_parts();
        let start = *len;
        UninitSlice::new(&mut data[start..])
    }

    #[inline]
    fn put_slice(&mut self, src: &[u8]) {
        self.append(src);
    }

    #[inline]
    fn put_u8(&mut self, n: u8) {
        self.push(n);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, Rng, SeedableRng};

    #[test]
    fn test_inline_until_threshold() {
        let mut buffer = ByteBuffer::new();
        buffer.append(&[7; INLINE_CAPACITY]);
        assert!(buffer.is_inline());
        assert_eq!(buffer.len(), INLINE_CAPACITY);
        assert_eq!(buffer.capacity(), INLINE_CAPACITY);

        buffer.push(8);
        assert!(!buffer.is_inline());
        assert_eq!(buffer.capacity(), 2 * INLINE_CAPACITY);
        assert_eq!(&buffer[..INLINE_CAPACITY], &[7; INLINE_CAPACITY]);
        assert_eq!(buffer[INLINE_CAPACITY], 8);
    }

    #[test]
    fn test_growth_rounds_to_granularity() {
        let mut buffer = ByteBuffer::new();
        buffer.append(&[1; 100]);
        assert_eq!(buffer.capacity(), 104);

        buffer.append(&[2; 5]);
        assert_eq!(buffer.capacity(), 208);
        assert_eq!(buffer.len(), 105);

        let mut buffer = ByteBuffer::with_capacity(100);
        assert!(buffer.is_inline());
        assert!(buffer.is_empty());
        buffer.append(&[3; 40]);
        assert_eq!(buffer.capacity(), 104);
    }

    #[test]
    fn test_resize() {
        let mut buffer = ByteBuffer::from(&[1u8, 2, 3][..]);
        buffer.resize(1, false);
        assert_eq!(buffer.as_slice(), &[1]);

        // Growing without zero-fill exposes whatever was stored before.
        buffer.resize(3, false);
        assert_eq!(buffer.as_slice(), &[1, 2, 3]);

        buffer.resize(1, false);
        buffer.resize(3, true);
        assert_eq!(buffer.as_slice(), &[1, 0, 0]);

        buffer.clear();
        assert!(buffer.is_empty());
        assert_eq!(buffer.capacity(), INLINE_CAPACITY);
    }

    #[test]
    fn test_shrink_returns_inline() {
        let mut buffer = ByteBuffer::new();
        buffer.append(&[5; 40]);
        assert!(!buffer.is_inline());

        buffer.resize(8, false);
        assert!(buffer.is_inline());
        assert_eq!(buffer.as_slice(), &[5; 8]);

        // Bytes kept from the heap block are still visible when growing without zero-fill.
        buffer.resize(INLINE_CAPACITY, false);
        assert_eq!(buffer.as_slice(), &[5; INLINE_CAPACITY]);

        buffer.append(&[6; 8]);
        buffer.clear();
        buffer.append(&[1, 2, 3, 4]);
        assert!(buffer.is_inline());
        assert_eq!(buffer.len(), 4);
        assert_eq!(buffer.capacity(), INLINE_CAPACITY);
    }

    #[test]
    fn test_take_leaves_empty() {
        let mut buffer = ByteBuffer::from(vec![9u8; 64]);
        let taken = buffer.take();
        assert_eq!(taken.len(), 64);
        assert!(buffer.is_empty());
        assert!(buffer.is_inline());

        // The source remains usable.
        buffer.append(b"again");
        assert_eq!(buffer.as_slice(), b"again");
    }

    #[test]
    fn test_clone_is_independent() {
        let mut original = ByteBuffer::from(vec![1u8; 40]);
        let copy = original.clone();
        original[0] = 2;
        assert_eq!(copy[0], 1);
        assert_ne!(original, copy);

        let small = ByteBuffer::from(&[1u8, 2, 3, 4][..]).clone();
        assert!(small.is_inline());
        assert_eq!(small.as_slice(), &[1, 2, 3, 4]);
    }

    #[test]
    fn test_buf_mut() {
        let mut buffer = ByteBuffer::new();
        buffer.put_u32_le(0xdead_beef);
        buffer.put_slice(&[0xaa; 40]);
        buffer.put_u64_le(1);
        assert_eq!(buffer.len(), 4 + 40 + 8);
        assert_eq!(&buffer[..4], &0xdead_beefu32.to_le_bytes());
        assert_eq!(&buffer[44..], &1u64.to_le_bytes());
    }

    #[test]
    fn test_random_operations_keep_invariant() {
        let mut rng = StdRng::seed_from_u64(0);
        let mut buffer = ByteBuffer::new();
        let mut model: Vec<u8> = Vec::new();
        for _ in 0..10_000 {
            match rng.gen_range(0..4) {
                0 => {
                    let len = rng.gen_range(0..80);
                    let bytes: Vec<u8> = (0..len).map(|_| rng.gen()).collect();
                    buffer.append(&bytes);
                    model.extend_from_slice(&bytes);
                }
                1 => {
                    let len = rng.gen_range(0..200);
                    buffer.resize(len, true);
                    model.resize(len, 0);
                }
                2 => {
                    let len = rng.gen_range(0..200);
                    let old = model.len();
                    buffer.resize(len, false);
                    model.truncate(len);
                    if len > old {
                        model.extend_from_slice(&buffer[old..len]);
                    }
                }
                _ => {
                    if rng.gen_bool(0.1) {
                        buffer.clear();
                        model.clear();
                    }
                }
            }
            assert!(buffer.len() <= buffer.capacity());
            assert_eq!(buffer.capacity() % GRANULARITY, 0);
            assert_eq!(buffer.is_inline(), buffer.capacity() == INLINE_CAPACITY);
            assert_eq!(buffer.is_inline(), buffer.len() <= INLINE_CAPACITY);
            assert!(buffer.clone().is_inline() == buffer.is_inline());
            assert_eq!(buffer.as_slice(), model.as_slice());
        }
    }
}
