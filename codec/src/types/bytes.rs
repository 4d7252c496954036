//! Implementations of Codec for byte types.
//!
//! For portability and consistency between architectures, the length of a blob must fit within a
//! [`u32`]. In a [Dict], blobs are [TypeKind::Blob] leaves holding the raw bytes (binary format)
//! or lowercase hex (text format).

use crate::{
    util::{at_least, length_prefix, read_length},
    ByteBuffer, DecodeConfig, Dict, EncodeSize, Error, FixedSize, Format, FromDict, Read, ToDict,
    TypeKind, Write,
};
use bytes::{Buf, BufMut, Bytes};
use fieldwire_utils::hex;

fn blob_to_dict(bytes: &[u8], dict: &mut Dict) {
    match dict.format() {
        Format::Binary => dict.set_leaf(TypeKind::Blob, bytes),
        Format::Text => dict.set_leaf(TypeKind::Blob, hex(bytes).as_bytes()),
    }
}

impl Write for Bytes {
    #[inline]
    fn write(&self, buf: &mut impl BufMut) {
        length_prefix(self.len()).write(buf);
        buf.put_slice(self);
    }
}

impl EncodeSize for Bytes {
    #[inline]
    fn encode_size(&self) -> usize {
        u32::SIZE + self.len()
    }
}

impl Read for Bytes {
    #[inline]
    fn read(buf: &mut impl Buf) -> Result<Self, Error> {
        let len = read_length(buf)?;
        at_least(buf, len)?;
        Ok(buf.copy_to_bytes(len))
    }
}

impl ToDict for Bytes {
    fn to_dict(&self, dict: &mut Dict) {
        blob_to_dict(self, dict);
    }
}

impl FromDict for Bytes {
    fn from_dict(dict: &Dict, _: &DecodeConfig) -> Result<Self, Error> {
        Ok(Bytes::from(dict.blob()?.into_owned()))
    }
}

impl Write for ByteBuffer {
    #[inline]
    fn write(&self, buf: &mut impl BufMut) {
        length_prefix(self.len()).write(buf);
        buf.put_slice(self);
    }
}

impl EncodeSize for ByteBuffer {
    #[inline]
    fn encode_size(&self) -> usize {
        u32::SIZE + self.len()
    }
}

impl Read for ByteBuffer {
    #[inline]
    fn read(buf: &mut impl Buf) -> Result<Self, Error> {
        let len = read_length(buf)?;
        at_least(buf, len)?;
        let mut bytes = ByteBuffer::with_capacity(len);
        bytes.resize(len, false);
        buf.copy_to_slice(&mut bytes);
        Ok(bytes)
    }
}

impl ToDict for ByteBuffer {
    fn to_dict(&self, dict: &mut Dict) {
        blob_to_dict(self, dict);
    }
}

impl FromDict for ByteBuffer {
    fn from_dict(dict: &Dict, _: &DecodeConfig) -> Result<Self, Error> {
        Ok(ByteBuffer::from(&dict.blob()?[..]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{tree::to_dict, Decode, Encode};

    #[test]
    fn test_bytes() {
        let values = [
            Bytes::new(),
            Bytes::from_static(&[1, 2, 3]),
            Bytes::from(vec![0; 300]),
        ];
        for value in values {
            let encoded = value.encode();
            assert_eq!(encoded.len(), 4 + value.len());
            assert_eq!(&encoded[..4], &(value.len() as u32).to_le_bytes());
            assert_eq!(Bytes::decode(&encoded[..]).unwrap(), value);

            // Failure for truncated payload
            if !value.is_empty() {
                assert!(matches!(
                    Bytes::decode(&encoded[..encoded.len() - 1]),
                    Err(Error::EndOfBuffer)
                ));
            }
        }
    }

    #[test]
    fn test_byte_buffer() {
        let value = ByteBuffer::from(vec![7u8; 40]);
        let encoded = value.encode();
        let decoded = ByteBuffer::decode(&encoded[..]).unwrap();
        assert_eq!(decoded, value);
        assert!(!decoded.is_inline());
    }

    #[test]
    fn test_oversized_length() {
        // Claims 4 GiB of content but carries none.
        let encoded = u32::MAX.to_le_bytes();
        assert!(matches!(
            Bytes::decode(&encoded[..]),
            Err(Error::EndOfBuffer)
        ));
    }

    #[test]
    fn test_tree() {
        let value = Bytes::from_static(&[0xca, 0xfe]);
        let text = to_dict(&value, Format::Text);
        assert_eq!(text.kind(), TypeKind::Blob);
        assert_eq!(text.payload(), b"cafe");
        assert_eq!(Bytes::from_dict(&text, &DecodeConfig::default()).unwrap(), value);

        let binary = to_dict(&value, Format::Binary);
        assert_eq!(binary.payload(), &[0xca, 0xfe]);
        assert_eq!(
            ByteBuffer::from_dict(&binary, &DecodeConfig::default()).unwrap(),
            &value[..]
        );
    }
}
