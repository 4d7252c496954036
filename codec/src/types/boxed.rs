//! Implementations of Codec for owned pointers.
//!
//! The pointee of a [Box] or [Arc] is framed by two sentinels so that a reader can detect a
//! stream that has drifted out of alignment:
//!
//! ```text
//! BEGIN_MAGIC (u32) | payload | END_MAGIC (u32)
//! ```
//!
//! In a [Dict], pointers are transparent: the tree holds the pointee directly.

use crate::{DecodeConfig, Dict, EncodeSize, Error, FixedSize, FromDict, Read, ToDict, Write};
use bytes::{Buf, BufMut};
use std::sync::Arc;

/// Written before the pointee of a framed pointer.
pub const BEGIN_MAGIC: u32 = 0xfeed_c0de;

/// Written after the pointee of a framed pointer.
pub const END_MAGIC: u32 = 0xdead_c0de;

/// Reads a value framed by the sentinels.
#[inline]
pub(crate) fn read_framed<B: Buf, T>(
    buf: &mut B,
    inner: impl FnOnce(&mut B) -> Result<T, Error>,
) -> Result<T, Error> {
    if u32::read(buf)? != BEGIN_MAGIC {
        return Err(Error::Corrupted("begin magic"));
    }
    let value = inner(buf)?;
    if u32::read(buf)? != END_MAGIC {
        return Err(Error::Corrupted("end magic"));
    }
    Ok(value)
}

/// Size of the sentinels around a framed value.
pub(crate) const FRAME_SIZE: usize = 2 * u32::SIZE;

macro_rules! impl_framed {
    ($ptr:ident) => {
        impl<T: Write> Write for $ptr<T> {
            #[inline]
            fn write(&self, buf: &mut impl BufMut) {
                BEGIN_MAGIC.write(buf);
                (**self).write(buf);
                END_MAGIC.write(buf);
            }
        }

        impl<T: EncodeSize> EncodeSize for $ptr<T> {
            #[inline]
            fn encode_size(&self) -> usize {
                FRAME_SIZE + (**self).encode_size()
            }
        }

        impl<T: Read> Read for $ptr<T> {
            #[inline]
            fn read(buf: &mut impl Buf) -> Result<Self, Error> {
                read_framed(buf, |buf| T::read(buf)).map($ptr::new)
            }
        }

        impl<T: ToDict> ToDict for $ptr<T> {
            const SIMPLE_KEY: bool = T::SIMPLE_KEY;

            fn to_dict(&self, dict: &mut Dict) {
                (**self).to_dict(dict);
            }

            fn to_key(&self) -> Option<String> {
                (**self).to_key()
            }
        }

        impl<T: FromDict> FromDict for $ptr<T> {
            fn from_dict(dict: &Dict, config: &DecodeConfig) -> Result<Self, Error> {
                T::from_dict(dict, config).map($ptr::new)
            }

            fn from_key(key: &str) -> Result<Self, Error> {
                T::from_key(key).map($ptr::new)
            }
        }
    };
}

impl_framed!(Box);
impl_framed!(Arc);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{tree::to_dict, Decode, Encode, Format, TypeKind};

    #[test]
    fn test_box_layout() {
        let value = Box::new(0x0102u16);
        let encoded = value.encode();
        assert_eq!(
            &encoded[..],
            &[0xde, 0xc0, 0xed, 0xfe, 0x02, 0x01, 0xde, 0xc0, 0xad, 0xde]
        );
        assert_eq!(Box::<u16>::decode(&encoded[..]).unwrap(), value);
    }

    #[test]
    fn test_arc() {
        let value = Arc::new(vec![1u32, 2, 3]);
        let encoded = value.encode();
        assert_eq!(encoded.len(), value.encode_size());
        assert_eq!(Arc::<Vec<u32>>::decode(&encoded[..]).unwrap(), value);
    }

    #[test]
    fn test_corrupted_begin() {
        let mut encoded = Vec::from(Box::new(5u8).encode());
        encoded[0] ^= 0xff;
        assert!(matches!(
            Box::<u8>::decode(&encoded[..]),
            Err(Error::Corrupted("begin magic"))
        ));
    }

    #[test]
    fn test_corrupted_end() {
        let mut encoded = Vec::from(Box::new(5u8).encode());
        let last = encoded.len() - 1;
        encoded[last] ^= 0xff;
        assert!(matches!(
            Box::<u8>::decode(&encoded[..]),
            Err(Error::Corrupted("end magic"))
        ));
    }

    #[test]
    fn test_payload_mismatch_detected() {
        // A payload one byte shorter than the reader expects pulls the end sentinel out of line.
        let mut encoded = Vec::new();
        BEGIN_MAGIC.write(&mut encoded);
        5u8.write(&mut encoded);
        END_MAGIC.write(&mut encoded);
        0u8.write(&mut encoded);
        assert!(matches!(
            Box::<u16>::decode(&encoded[..]),
            Err(Error::Corrupted("end magic"))
        ));
    }

    #[test]
    fn test_transparent_tree() {
        let dict = to_dict(&Box::new(7i32), Format::Text);
        assert_eq!(dict.kind(), TypeKind::Integral { signed: true });
        assert_eq!(dict, to_dict(&7i32, Format::Text));
        let decoded = Box::<i32>::from_dict(&dict, &DecodeConfig::default()).unwrap();
        assert_eq!(*decoded, 7);
    }
}
