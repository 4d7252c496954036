//! Codec implementations for Rust primitive types.
//!
//! # Fixed-size encodings
//!
//! Every primitive has a compile-time constant `SIZE`. Integers and floats are written
//! little-endian regardless of the host, so encodings are portable across architectures.
//! Booleans always occupy 4 bytes (`0` or `1`), and `char` is written as its 4-byte scalar value.
//!
//! # Bulk copies
//!
//! Runs of integers and floats (inside `Vec`, arrays, and other sequences) are copied with a single
//! `put_slice` on little-endian hosts instead of element by element.
//!
//! # Trees
//!
//! In a [Dict], numbers are stored as fixed-width little-endian bytes (binary format) or decimal
//! text (text format). Integral nodes record their signedness so either form can be widened or
//! rendered exactly.

use crate::{
    util::at_least, DecodeConfig, Dict, EncodeSize, Error, FixedSize, Format, FromDict, Read,
    ToDict, TypeKind, Write,
};
use bytes::{Buf, BufMut};
use std::{mem, slice};

/// Types whose in-memory representation on a little-endian host is their wire format.
///
/// # Safety
///
/// Implementors must have no padding bytes and must be valid for every bit pattern.
unsafe trait Plain: Copy + Default + Write + Read {}

#[inline]
fn write_plain<T: Plain>(items: &[T], buf: &mut impl BufMut) {
    if cfg!(target_endian = "little") {
        // SAFETY: `Plain` types have no padding, so every byte of the slice is initialized.
        let bytes =
            unsafe { slice::from_raw_parts(items.as_ptr().cast::<u8>(), mem::size_of_val(items)) };
        buf.put_slice(bytes);
    } else {
        for item in items {
            item.write(buf);
        }
    }
}

#[inline]
fn read_plain<T: Plain>(buf: &mut impl Buf, len: usize) -> Result<Vec<T>, Error> {
    let size = len
        .checked_mul(mem::size_of::<T>())
        .ok_or(Error::InvalidLength(len))?;
    at_least(buf, size)?;
    if cfg!(target_endian = "little") {
        let mut items = vec![T::default(); len];
        // SAFETY: `Plain` types are valid for every bit pattern and the slice spans exactly the
        // initialized elements of `items`.
        let bytes = unsafe { slice::from_raw_parts_mut(items.as_mut_ptr().cast::<u8>(), size) };
        buf.copy_to_slice(bytes);
        Ok(items)
    } else {
        (0..len).map(|_| T::read(buf)).collect()
    }
}

// Numeric types implementation
macro_rules! impl_numeric {
    ($type:ty, $read_method:ident, $write_method:ident) => {
        impl Write for $type {
            #[inline]
            fn write(&self, buf: &mut impl BufMut) {
                buf.$write_method(*self);
            }

            #[inline]
            fn write_slice(items: &[Self], buf: &mut impl BufMut) {
                write_plain(items, buf);
            }
        }

        impl Read for $type {
            #[inline]
            fn read(buf: &mut impl Buf) -> Result<Self, Error> {
                at_least(buf, mem::size_of::<$type>())?;
                Ok(buf.$read_method())
            }

            #[inline]
            fn read_vec(buf: &mut impl Buf, len: usize) -> Result<Vec<Self>, Error> {
                read_plain(buf, len)
            }
        }

        impl FixedSize for $type {
            const SIZE: usize = mem::size_of::<$type>();
        }

        impl EncodeSize for $type {
            #[inline]
            fn encode_size(&self) -> usize {
                Self::SIZE
            }

            #[inline]
            fn slice_size(items: &[Self]) -> usize {
                items.len() * Self::SIZE
            }
        }

        // SAFETY: primitive numbers have no padding and accept every bit pattern.
        unsafe impl Plain for $type {}
    };
}

impl_numeric!(u8, get_u8, put_u8);
impl_numeric!(u16, get_u16_le, put_u16_le);
impl_numeric!(u32, get_u32_le, put_u32_le);
impl_numeric!(u64, get_u64_le, put_u64_le);
impl_numeric!(u128, get_u128_le, put_u128_le);
impl_numeric!(i8, get_i8, put_i8);
impl_numeric!(i16, get_i16_le, put_i16_le);
impl_numeric!(i32, get_i32_le, put_i32_le);
impl_numeric!(i64, get_i64_le, put_i64_le);
impl_numeric!(i128, get_i128_le, put_i128_le);
impl_numeric!(f32, get_f32_le, put_f32_le);
impl_numeric!(f64, get_f64_le, put_f64_le);

// Integer tree implementation
macro_rules! impl_integer {
    ($type:ty) => {
        impl ToDict for $type {
            const SIMPLE_KEY: bool = true;

            fn to_dict(&self, dict: &mut Dict) {
                let kind = TypeKind::Integral {
                    signed: <$type>::MIN != 0,
                };
                match dict.format() {
                    Format::Binary => dict.set_leaf(kind, &self.to_le_bytes()),
                    Format::Text => dict.set_leaf(kind, self.to_string().as_bytes()),
                }
            }

            fn to_key(&self) -> Option<String> {
                Some(self.to_string())
            }
        }

        impl FromDict for $type {
            fn from_dict(dict: &Dict, _: &DecodeConfig) -> Result<Self, Error> {
                let value = dict.integer()?;
                value.get().ok_or_else(|| {
                    Error::InvalidData(
                        stringify!($type).to_owned(),
                        format!("{value} is out of range"),
                    )
                })
            }

            fn from_key(key: &str) -> Result<Self, Error> {
                key.parse()
                    .map_err(|err| Error::InvalidData(stringify!($type).to_owned(), format!("{err}")))
            }
        }
    };
}

impl_integer!(u8);
impl_integer!(u16);
impl_integer!(u32);
impl_integer!(u64);
impl_integer!(u128);
impl_integer!(i8);
impl_integer!(i16);
impl_integer!(i32);
impl_integer!(i64);
impl_integer!(i128);

// Float tree implementation
macro_rules! impl_float {
    ($type:ty) => {
        impl ToDict for $type {
            fn to_dict(&self, dict: &mut Dict) {
                match dict.format() {
                    Format::Binary => dict.set_leaf(TypeKind::FloatingPoint, &self.to_le_bytes()),
                    Format::Text => {
                        dict.set_leaf(TypeKind::FloatingPoint, self.to_string().as_bytes())
                    }
                }
            }
        }

        impl FromDict for $type {
            fn from_dict(dict: &Dict, _: &DecodeConfig) -> Result<Self, Error> {
                Ok(dict.float()? as $type)
            }
        }
    };
}

impl_float!(f32);
impl_float!(f64);

// Bool implementation
impl Write for bool {
    #[inline]
    fn write(&self, buf: &mut impl BufMut) {
        buf.put_u32_le(u32::from(*self));
    }
}

impl Read for bool {
    #[inline]
    fn read(buf: &mut impl Buf) -> Result<Self, Error> {
        match u32::read(buf)? {
            0 => Ok(false),
            1 => Ok(true),
            _ => Err(Error::InvalidBool),
        }
    }
}

impl FixedSize for bool {
    const SIZE: usize = 4;
}

impl EncodeSize for bool {
    #[inline]
    fn encode_size(&self) -> usize {
        Self::SIZE
    }
}

impl ToDict for bool {
    const SIMPLE_KEY: bool = true;

    fn to_dict(&self, dict: &mut Dict) {
        match dict.format() {
            Format::Binary => dict.set_leaf(TypeKind::Boolean, &u32::from(*self).to_le_bytes()),
            Format::Text => dict.set_leaf(TypeKind::Boolean, self.to_string().as_bytes()),
        }
    }

    fn to_key(&self) -> Option<String> {
        Some(self.to_string())
    }
}

impl FromDict for bool {
    fn from_dict(dict: &Dict, _: &DecodeConfig) -> Result<Self, Error> {
        dict.boolean()
    }

    fn from_key(key: &str) -> Result<Self, Error> {
        key.parse().map_err(|_| Error::InvalidBool)
    }
}

// Char implementation
impl Write for char {
    #[inline]
    fn write(&self, buf: &mut impl BufMut) {
        buf.put_u32_le(u32::from(*self));
    }
}

impl Read for char {
    #[inline]
    fn read(buf: &mut impl Buf) -> Result<Self, Error> {
        let raw = u32::read(buf)?;
        char::from_u32(raw)
            .ok_or_else(|| Error::InvalidData("char".to_owned(), format!("{raw:#x}")))
    }
}

impl FixedSize for char {
    const SIZE: usize = 4;
}

impl EncodeSize for char {
    #[inline]
    fn encode_size(&self) -> usize {
        Self::SIZE
    }
}

impl ToDict for char {
    const SIMPLE_KEY: bool = true;

    fn to_dict(&self, dict: &mut Dict) {
        dict.set_leaf(TypeKind::String, self.encode_utf8(&mut [0; 4]).as_bytes());
    }

    fn to_key(&self) -> Option<String> {
        Some(self.to_string())
    }
}

impl FromDict for char {
    fn from_dict(dict: &Dict, _: &DecodeConfig) -> Result<Self, Error> {
        Self::from_key(dict.text()?)
    }

    fn from_key(key: &str) -> Result<Self, Error> {
        let mut chars = key.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => Ok(c),
            _ => Err(Error::InvalidData(
                "char".to_owned(),
                format!("{key:?} is not a single character"),
            )),
        }
    }
}

// Option implementation
impl<T: Write> Write for Option<T> {
    #[inline]
    fn write(&self, buf: &mut impl BufMut) {
        self.is_some().write(buf);
        if let Some(inner) = self {
            inner.write(buf);
        }
    }
}

impl<T: EncodeSize> EncodeSize for Option<T> {
    #[inline]
    fn encode_size(&self) -> usize {
        match self {
            Some(inner) => bool::SIZE + inner.encode_size(),
            None => bool::SIZE,
        }
    }
}

impl<T: Read> Read for Option<T> {
    #[inline]
    fn read(buf: &mut impl Buf) -> Result<Self, Error> {
        if bool::read(buf)? {
            Ok(Some(T::read(buf)?))
        } else {
            Ok(None)
        }
    }
}

impl<T: ToDict> ToDict for Option<T> {
    fn to_dict(&self, dict: &mut Dict) {
        match self {
            Some(inner) => inner.to_dict(dict),
            None => dict.set_null(),
        }
    }
}

impl<T: FromDict> FromDict for Option<T> {
    fn from_dict(dict: &Dict, config: &DecodeConfig) -> Result<Self, Error> {
        if dict.is_null() {
            return Ok(None);
        }
        T::from_dict(dict, config).map(Some)
    }
}
