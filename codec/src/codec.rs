//! Core binary codec traits

use crate::{buffer::ByteBuffer, error::Error};
use bytes::{Buf, BufMut};

/// Trait for types that can be written (encoded) to a buffer.
pub trait Write {
    /// Encodes this value by writing to a buffer.
    fn write(&self, buf: &mut impl BufMut);

    /// Encodes a run of values back to back.
    ///
    /// Fixed-width types override this to copy the whole run at once.
    #[inline]
    fn write_slice(items: &[Self], buf: &mut impl BufMut)
    where
        Self: Sized,
    {
        for item in items {
            item.write(buf);
        }
    }
}

/// Trait for types that can be read (decoded) from a buffer.
pub trait Read: Sized {
    /// Reads a value from the buffer, consuming the necessary bytes.
    ///
    /// Returns an error if decoding fails (e.g., invalid data, not enough bytes).
    fn read(buf: &mut impl Buf) -> Result<Self, Error>;

    /// Reads `len` values written by [Write::write_slice].
    #[inline]
    fn read_vec(buf: &mut impl Buf, len: usize) -> Result<Vec<Self>, Error> {
        // Every element occupies at least one byte, so a length larger than the remaining input
        // is never honored with a matching allocation.
        let mut items = Vec::with_capacity(len.min(buf.remaining()));
        for _ in 0..len {
            items.push(Self::read(buf)?);
        }
        Ok(items)
    }
}

/// Trait for types that know their exact encoded length.
pub trait EncodeSize {
    /// Returns the encoded length of this value.
    ///
    /// This method MUST return the exact number of bytes that will be written by `write()`.
    fn encode_size(&self) -> usize;

    /// Returns the encoded length of a run of values written by [Write::write_slice].
    #[inline]
    fn slice_size(items: &[Self]) -> usize
    where
        Self: Sized,
    {
        items.iter().map(EncodeSize::encode_size).sum()
    }
}

/// Trait for types with a known, fixed encoded length.
pub trait FixedSize {
    /// The length of the encoded value.
    const SIZE: usize;
}

/// Trait for types that can be encoded to a [ByteBuffer].
pub trait Encode: Write + EncodeSize {
    /// Encodes a value to a new buffer sized with [EncodeSize::encode_size].
    ///
    /// Panics if the `write` implementation does not write the expected number of bytes.
    fn encode(&self) -> ByteBuffer {
        let len = self.encode_size();
        let mut buffer = ByteBuffer::with_capacity(len);
        self.write(&mut buffer);
        assert_eq!(buffer.len(), len, "write() did not write expected bytes");
        buffer
    }
}

// Automatically implement `Encode` for types that implement `Write` and `EncodeSize`.
impl<T: Write + EncodeSize> Encode for T {}

/// Trait for types that can be decoded from a buffer, ensuring the entire buffer is consumed.
pub trait Decode: Read {
    /// Decodes a value from a buffer, ensuring the buffer is fully consumed.
    fn decode(mut buf: impl Buf) -> Result<Self, Error> {
        let result = Self::read(&mut buf)?;

        // Check that the buffer is fully consumed.
        let remaining = buf.remaining();
        if remaining > 0 {
            return Err(Error::ExtraData(remaining));
        }

        Ok(result)
    }
}

// Automatically implement `Decode` for types that implement `Read`.
impl<T: Read> Decode for T {}

/// Trait for types that can be encoded and decoded.
pub trait Codec: Encode + Decode {}

// Automatically implement `Codec` for types that implement `Encode` and `Decode`.
impl<T: Encode + Decode> Codec for T {}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    #[test]
    fn test_insufficient_buffer() {
        let mut reader = Bytes::from_static(&[0x01, 0x02]);
        assert!(matches!(u32::read(&mut reader), Err(Error::EndOfBuffer)));
    }

    #[test]
    fn test_extra_data() {
        let encoded = Bytes::from_static(&[0x01, 0x02]);
        assert!(matches!(u8::decode(encoded), Err(Error::ExtraData(1))));
    }

    #[test]
    fn test_encode_presizes() {
        let encoded = (1u64, 2u64, 3u64, 4u64, 5u64).encode();
        assert_eq!(encoded.len(), 40);
        assert_eq!(encoded.capacity(), 40);
    }

    #[test]
    #[should_panic(expected = "write() did not write expected bytes")]
    fn test_encode_size_mismatch() {
        struct Liar;

        impl Write for Liar {
            fn write(&self, buf: &mut impl BufMut) {
                buf.put_u8(0);
            }
        }

        impl EncodeSize for Liar {
            fn encode_size(&self) -> usize {
                2
            }
        }

        Liar.encode();
    }
}
