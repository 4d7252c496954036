//! Implementations of Codec for strings.
//!
//! Strings are written as their UTF-8 bytes followed by a single NUL, with no length prefix. A
//! string containing an interior NUL therefore reads back truncated at that NUL; debug builds
//! assert against writing one.

use crate::{DecodeConfig, Dict, EncodeSize, Error, FromDict, Read, ToDict, TypeKind, Write};
use bytes::{Buf, BufMut};

impl Write for str {
    #[inline]
    fn write(&self, buf: &mut impl BufMut) {
        debug_assert!(!self.contains('\0'), "string contains an interior NUL");
        buf.put_slice(self.as_bytes());
        buf.put_u8(0);
    }
}

impl EncodeSize for str {
    #[inline]
    fn encode_size(&self) -> usize {
        self.len() + 1
    }
}

impl Write for String {
    #[inline]
    fn write(&self, buf: &mut impl BufMut) {
        self.as_str().write(buf);
    }
}

impl EncodeSize for String {
    #[inline]
    fn encode_size(&self) -> usize {
        self.as_str().encode_size()
    }
}

impl Read for String {
    fn read(buf: &mut impl Buf) -> Result<Self, Error> {
        let mut bytes = Vec::new();
        loop {
            let chunk = buf.chunk();
            if chunk.is_empty() {
                return Err(Error::EndOfBuffer);
            }
            match chunk.iter().position(|&b| b == 0) {
                Some(end) => {
                    bytes.extend_from_slice(&chunk[..end]);
                    buf.advance(end + 1);
                    break;
                }
                None => {
                    let len = chunk.len();
                    bytes.extend_from_slice(chunk);
                    buf.advance(len);
                }
            }
        }
        String::from_utf8(bytes).map_err(|_| Error::InvalidUtf8)
    }
}

impl ToDict for str {
    const SIMPLE_KEY: bool = true;

    fn to_dict(&self, dict: &mut Dict) {
        dict.set_leaf(TypeKind::String, self.as_bytes());
    }

    fn to_key(&self) -> Option<String> {
        Some(self.to_owned())
    }
}

impl ToDict for String {
    const SIMPLE_KEY: bool = true;

    fn to_dict(&self, dict: &mut Dict) {
        self.as_str().to_dict(dict);
    }

    fn to_key(&self) -> Option<String> {
        Some(self.clone())
    }
}

impl FromDict for String {
    fn from_dict(dict: &Dict, _: &DecodeConfig) -> Result<Self, Error> {
        dict.text().map(str::to_owned)
    }

    fn from_key(key: &str) -> Result<Self, Error> {
        Ok(key.to_owned())
    }
}
