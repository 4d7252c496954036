//! Field visitors for the binary format.
//!
//! Aggregates are encoded as the concatenation of their fields in declaration order, with no
//! names or framing. The helpers here back the impls generated by [crate::fields].

use crate::{
    error::Error,
    visitor::{FieldVisitor, FieldVisitorMut, Fields, Serializable},
};
use bytes::{Buf, BufMut};
use std::convert::Infallible;

/// Writes each visited field to a buffer.
pub struct BinaryWriter<'a, B: BufMut> {
    buf: &'a mut B,
}

impl<'a, B: BufMut> BinaryWriter<'a, B> {
    pub fn new(buf: &'a mut B) -> Self {
        Self { buf }
    }
}

impl<B: BufMut> FieldVisitor for BinaryWriter<'_, B> {
    type Error = Infallible;

    #[inline]
    fn visit<T: Serializable>(&mut self, value: &T, _: &'static str) -> Result<(), Infallible> {
        value.write(self.buf);
        Ok(())
    }
}

/// Reads each visited field from a buffer, overwriting it.
pub struct BinaryReader<'a, B: Buf> {
    buf: &'a mut B,
}

impl<'a, B: Buf> BinaryReader<'a, B> {
    pub fn new(buf: &'a mut B) -> Self {
        Self { buf }
    }
}

impl<B: Buf> FieldVisitorMut for BinaryReader<'_, B> {
    type Error = Error;

    #[inline]
    fn visit<T: Serializable>(&mut self, value: &mut T, _: &'static str) -> Result<(), Error> {
        *value = T::read(self.buf)?;
        Ok(())
    }
}

/// Sums the encoded size of each visited field.
#[derive(Default)]
pub struct SizeCounter {
    size: usize,
}

impl SizeCounter {
    /// Returns the total size counted so far.
    pub fn size(&self) -> usize {
        self.size
    }
}

impl FieldVisitor for SizeCounter {
    type Error = Infallible;

    #[inline]
    fn visit<T: Serializable>(&mut self, value: &T, _: &'static str) -> Result<(), Infallible> {
        self.size += value.encode_size();
        Ok(())
    }
}

/// Writes every field of `value`.
pub fn write_fields<T: Fields + ?Sized>(value: &T, buf: &mut impl BufMut) {
    match value.visit_fields(&mut BinaryWriter::new(buf)) {
        Ok(()) => {}
        Err(never) => match never {},
    }
}

/// Reads a `T` by overwriting the fields of its default value.
pub fn read_fields<T: Fields + Default>(buf: &mut impl Buf) -> Result<T, Error> {
    let mut value = T::default();
    value.visit_fields_mut(&mut BinaryReader::new(buf))?;
    Ok(value)
}

/// Returns the encoded size of every field of `value`.
pub fn fields_size<T: Fields + ?Sized>(value: &T) -> usize {
    let mut counter = SizeCounter::default();
    match value.visit_fields(&mut counter) {
        Ok(()) => counter.size(),
        Err(never) => match never {},
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{fields, Decode, Encode, EncodeSize};

    #[derive(Clone, Debug, Default, PartialEq)]
    struct Header {
        version: u16,
        flags: Option<u8>,
        name: String,
    }

    fields!(Header {
        version,
        flags,
        name
    });

    #[test]
    fn test_layout() {
        let header = Header {
            version: 2,
            flags: Some(9),
            name: "hi".into(),
        };
        let encoded = header.encode();
        assert_eq!(
            &encoded[..],
            &[2, 0, 1, 0, 0, 0, 9, b'h', b'i', 0][..],
        );
        assert_eq!(header.encode_size(), 10);
        assert_eq!(Header::decode(&encoded[..]).unwrap(), header);
    }

    #[test]
    fn test_truncated() {
        let encoded = Header::default().encode();
        for len in 0..encoded.len() {
            assert!(matches!(
                Header::decode(&encoded[..len]),
                Err(Error::EndOfBuffer)
            ));
        }
    }
}
