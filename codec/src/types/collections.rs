//! Implementations of Codec for sequences, sets, and maps.
//!
//! Every collection is written as a 4-byte element count followed by its elements. Sequences of
//! fixed-width numbers are copied in bulk (see [Write::write_slice]). Map entries are written as
//! key followed by value.
//!
//! For portability and consistency between architectures, collection lengths must fit within a
//! [`u32`].

use crate::{
    tree::{read_map, read_sequence, write_map, write_sequence},
    util::{length_prefix, read_length},
    DecodeConfig, Dict, EncodeSize, Error, FixedSize, FromDict, Read, ToDict, Write,
};
use bytes::{Buf, BufMut};
use std::{
    collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque},
    hash::{BuildHasher, Hash},
};

// Vec implementation
impl<T: Write> Write for Vec<T> {
    #[inline]
    fn write(&self, buf: &mut impl BufMut) {
        length_prefix(self.len()).write(buf);
        T::write_slice(self, buf);
    }
}

impl<T: EncodeSize> EncodeSize for Vec<T> {
    #[inline]
    fn encode_size(&self) -> usize {
        u32::SIZE + T::slice_size(self)
    }
}

impl<T: Read> Read for Vec<T> {
    #[inline]
    fn read(buf: &mut impl Buf) -> Result<Self, Error> {
        let len = read_length(buf)?;
        T::read_vec(buf, len)
    }
}

impl<T: ToDict> ToDict for Vec<T> {
    fn to_dict(&self, dict: &mut Dict) {
        write_sequence(self, dict);
    }
}

impl<T: FromDict> FromDict for Vec<T> {
    fn from_dict(dict: &Dict, config: &DecodeConfig) -> Result<Self, Error> {
        read_sequence(dict, config)
    }
}

// VecDeque implementation
impl<T: Write> Write for VecDeque<T> {
    #[inline]
    fn write(&self, buf: &mut impl BufMut) {
        length_prefix(self.len()).write(buf);
        let (front, back) = self.as_slices();
        T::write_slice(front, buf);
        T::write_slice(back, buf);
    }
}

impl<T: EncodeSize> EncodeSize for VecDeque<T> {
    #[inline]
    fn encode_size(&self) -> usize {
        let (front, back) = self.as_slices();
        u32::SIZE + T::slice_size(front) + T::slice_size(back)
    }
}

impl<T: Read> Read for VecDeque<T> {
    #[inline]
    fn read(buf: &mut impl Buf) -> Result<Self, Error> {
        Vec::<T>::read(buf).map(VecDeque::from)
    }
}

impl<T: ToDict> ToDict for VecDeque<T> {
    fn to_dict(&self, dict: &mut Dict) {
        write_sequence(self, dict);
    }
}

impl<T: FromDict> FromDict for VecDeque<T> {
    fn from_dict(dict: &Dict, config: &DecodeConfig) -> Result<Self, Error> {
        read_sequence(dict, config)
    }
}

// Constant-size array implementation
impl<T: Write, const N: usize> Write for [T; N] {
    #[inline]
    fn write(&self, buf: &mut impl BufMut) {
        T::write_slice(self, buf);
    }
}

impl<T: EncodeSize, const N: usize> EncodeSize for [T; N] {
    #[inline]
    fn encode_size(&self) -> usize {
        T::slice_size(self)
    }
}

impl<T: FixedSize, const N: usize> FixedSize for [T; N] {
    const SIZE: usize = N * T::SIZE;
}

impl<T: Read, const N: usize> Read for [T; N] {
    #[inline]
    fn read(buf: &mut impl Buf) -> Result<Self, Error> {
        let items = T::read_vec(buf, N)?;
        items.try_into().map_err(|_| Error::InvalidLength(N))
    }
}

impl<T: ToDict, const N: usize> ToDict for [T; N] {
    fn to_dict(&self, dict: &mut Dict) {
        write_sequence(self, dict);
    }
}

impl<T: FromDict, const N: usize> FromDict for [T; N] {
    fn from_dict(dict: &Dict, config: &DecodeConfig) -> Result<Self, Error> {
        let items: Vec<T> = read_sequence(dict, config)?;
        items
            .try_into()
            .map_err(|items: Vec<T>| Error::InvalidLength(items.len()))
    }
}

// BTreeSet implementation
impl<T: Write> Write for BTreeSet<T> {
    #[inline]
    fn write(&self, buf: &mut impl BufMut) {
        length_prefix(self.len()).write(buf);
        for item in self {
            item.write(buf);
        }
    }
}

impl<T: EncodeSize> EncodeSize for BTreeSet<T> {
    #[inline]
    fn encode_size(&self) -> usize {
        u32::SIZE + self.iter().map(EncodeSize::encode_size).sum::<usize>()
    }
}

impl<T: Read + Ord> Read for BTreeSet<T> {
    fn read(buf: &mut impl Buf) -> Result<Self, Error> {
        let len = read_length(buf)?;
        (0..len).map(|_| T::read(buf)).collect()
    }
}

impl<T: ToDict> ToDict for BTreeSet<T> {
    fn to_dict(&self, dict: &mut Dict) {
        write_sequence(self, dict);
    }
}

impl<T: FromDict + Ord> FromDict for BTreeSet<T> {
    fn from_dict(dict: &Dict, config: &DecodeConfig) -> Result<Self, Error> {
        read_sequence(dict, config)
    }
}

// HashSet implementation
impl<T: Write, S> Write for HashSet<T, S> {
    #[inline]
    fn write(&self, buf: &mut impl BufMut) {
        length_prefix(self.len()).write(buf);
        for item in self {
            item.write(buf);
        }
    }
}

impl<T: EncodeSize, S> EncodeSize for HashSet<T, S> {
    #[inline]
    fn encode_size(&self) -> usize {
        u32::SIZE + self.iter().map(EncodeSize::encode_size).sum::<usize>()
    }
}

impl<T: Read + Eq + Hash, S: BuildHasher + Default> Read for HashSet<T, S> {
    fn read(buf: &mut impl Buf) -> Result<Self, Error> {
        let len = read_length(buf)?;
        let mut set = HashSet::with_capacity_and_hasher(len.min(buf.remaining()), S::default());
        for _ in 0..len {
            set.insert(T::read(buf)?);
        }
        Ok(set)
    }
}

impl<T: ToDict, S> ToDict for HashSet<T, S> {
    fn to_dict(&self, dict: &mut Dict) {
        write_sequence(self, dict);
    }
}

impl<T: FromDict + Eq + Hash, S: BuildHasher + Default> FromDict for HashSet<T, S> {
    fn from_dict(dict: &Dict, config: &DecodeConfig) -> Result<Self, Error> {
        read_sequence(dict, config)
    }
}

// BTreeMap implementation
impl<K: Write, V: Write> Write for BTreeMap<K, V> {
    #[inline]
    fn write(&self, buf: &mut impl BufMut) {
        length_prefix(self.len()).write(buf);
        for (key, value) in self {
            key.write(buf);
            value.write(buf);
        }
    }
}

impl<K: EncodeSize, V: EncodeSize> EncodeSize for BTreeMap<K, V> {
    #[inline]
    fn encode_size(&self) -> usize {
        u32::SIZE
            + self
                .iter()
                .map(|(key, value)| key.encode_size() + value.encode_size())
                .sum::<usize>()
    }
}

impl<K: Read + Ord, V: Read> Read for BTreeMap<K, V> {
    fn read(buf: &mut impl Buf) -> Result<Self, Error> {
        let len = read_length(buf)?;
        let mut map = BTreeMap::new();
        for _ in 0..len {
            let key = K::read(buf)?;
            map.insert(key, V::read(buf)?);
        }
        Ok(map)
    }
}

impl<K: ToDict, V: ToDict> ToDict for BTreeMap<K, V> {
    fn to_dict(&self, dict: &mut Dict) {
        write_map(self, dict);
    }
}

impl<K: FromDict + Ord, V: FromDict> FromDict for BTreeMap<K, V> {
    fn from_dict(dict: &Dict, config: &DecodeConfig) -> Result<Self, Error> {
        read_map(dict, config)
    }
}

// HashMap implementation
impl<K: Write, V: Write, S> Write for HashMap<K, V, S> {
    #[inline]
    fn write(&self, buf: &mut impl BufMut) {
        length_prefix(self.len()).write(buf);
        for (key, value) in self {
            key.write(buf);
            value.write(buf);
        }
    }
}

impl<K: EncodeSize, V: EncodeSize, S> EncodeSize for HashMap<K, V, S> {
    #[inline]
    fn encode_size(&self) -> usize {
        u32::SIZE
            + self
                .iter()
                .map(|(key, value)| key.encode_size() + value.encode_size())
                .sum::<usize>()
    }
}

impl<K: Read + Eq + Hash, V: Read, S: BuildHasher + Default> Read for HashMap<K, V, S> {
    fn read(buf: &mut impl Buf) -> Result<Self, Error> {
        let len = read_length(buf)?;
        let mut map = HashMap::with_capacity_and_hasher(len.min(buf.remaining()), S::default());
        for _ in 0..len {
            let key = K::read(buf)?;
            map.insert(key, V::read(buf)?);
        }
        Ok(map)
    }
}

impl<K: ToDict, V: ToDict, S> ToDict for HashMap<K, V, S> {
    fn to_dict(&self, dict: &mut Dict) {
        write_map(self, dict);
    }
}

impl<K: FromDict + Eq + Hash, V: FromDict, S: BuildHasher + Default> FromDict
    for HashMap<K, V, S>
{
    fn from_dict(dict: &Dict, config: &DecodeConfig) -> Result<Self, Error> {
        read_map(dict, config)
    }
}
