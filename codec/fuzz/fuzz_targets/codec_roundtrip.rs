#![no_main]

use arbitrary::Arbitrary;
use bytes::Bytes;
use fieldwire_codec::{
    fields, json, Decode, DecodeConfig, Dict, Encode, Format, FromDict, JsonConfig, ToDict,
};
use libfuzzer_sys::fuzz_target;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

fn roundtrip<T>(value: &T)
where
    T: Encode + Decode + ToDict + FromDict + PartialEq + std::fmt::Debug,
{
    let encoded = value.encode();
    assert_eq!(encoded.len(), value.encode_size());
    let decoded = T::decode(&encoded[..]).expect("Failed to decode a successfully encoded input!");
    assert_eq!(value, &decoded);

    for format in [Format::Binary, Format::Text] {
        let mut dict = Dict::with_format(format);
        value.to_dict(&mut dict);
        let decoded =
            T::from_dict(&dict, &DecodeConfig::strict()).expect("Failed to read back a tree!");
        assert_eq!(value, &decoded);

        let text = json::to_string(&dict, &JsonConfig::compact()).expect("Failed to emit JSON!");
        let parsed = json::from_str(&text).expect("Failed to parse emitted JSON!");
        let decoded =
            T::from_dict(&parsed, &DecodeConfig::strict()).expect("Failed to read back JSON!");
        assert_eq!(value, &decoded);
    }
}

// Strings are NUL-terminated on the wire.
fn clean(text: String) -> String {
    text.replace('\0', "")
}

#[derive(Arbitrary, Debug)]
struct RawRecord {
    id: u32,
    name: String,
    tags: Vec<String>,
    weight: Option<i64>,
    flags: (bool, u8, char),
}

#[derive(Clone, Debug, Default, PartialEq)]
struct Record {
    id: u32,
    name: String,
    tags: Vec<String>,
    weight: Option<i64>,
    flags: (bool, u8, char),
}

fields!(Record {
    id,
    name,
    tags,
    weight,
    flags
});

impl From<RawRecord> for Record {
    fn from(raw: RawRecord) -> Self {
        Self {
            id: raw.id,
            name: clean(raw.name),
            tags: raw.tags.into_iter().map(clean).collect(),
            weight: raw.weight,
            flags: raw.flags,
        }
    }
}

#[derive(Arbitrary, Debug)]
enum FuzzInput<'a> {
    // Untrusted input
    Bytes(&'a [u8]),
    Json(&'a str),

    // Aggregates
    Record(RawRecord),

    // Collections
    Map(HashMap<u64, u64>),
    Set(HashSet<u64>),
    BTreeMap(BTreeMap<u32, i16>),
    BTreeSet(BTreeSet<i32>),
    Vec(Vec<u8>),
    Strings(Vec<String>),
    Blob(Vec<u8>),

    // Arrays
    ByteArray4([u8; 4]),
    ByteArray32([u8; 32]),

    // Wrappers
    Option(Option<u32>),
    Boxed(u64),

    // Tuples
    Tuple2(u8, u16),
    Tuple3(u32, u64, u128),

    // Primitive inputs!
    Bool(bool),
    Char(char),
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    U128(u128),
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    I128(i128),
    F32(f32),
    F64(f64),
}

fn decode_untrusted(data: &[u8]) {
    let _ = Dict::decode(data);
    let _ = Vec::<String>::decode(data);
    let _ = BTreeMap::<u16, Option<u8>>::decode(data);
    let _ = Box::<u32>::decode(data);
    let _ = Record::decode(data);
    let _ = Bytes::decode(data);
}

fn parse_untrusted(text: &str) {
    let Ok(dict) = json::from_str(text) else {
        return;
    };
    let _ = Record::from_dict(&dict, &DecodeConfig::lenient());

    // Emission is stable after one parse.
    let first = json::to_string(&dict, &JsonConfig::compact()).expect("Failed to emit JSON!");
    let reparsed = json::from_str(&first).expect("Failed to parse emitted JSON!");
    let second = json::to_string(&reparsed, &JsonConfig::compact()).expect("Failed to emit JSON!");
    assert_eq!(first, second);
}

fn fuzz(input: FuzzInput) {
    match input {
        FuzzInput::Bytes(it) => decode_untrusted(it),
        FuzzInput::Json(it) => parse_untrusted(it),
        FuzzInput::Record(it) => roundtrip(&Record::from(it)),
        FuzzInput::Map(it) => roundtrip(&it),
        FuzzInput::Set(it) => roundtrip(&it),
        FuzzInput::BTreeMap(it) => roundtrip(&it),
        FuzzInput::BTreeSet(it) => roundtrip(&it),
        FuzzInput::Vec(it) => roundtrip(&it),
        FuzzInput::Strings(it) => roundtrip(&it.into_iter().map(clean).collect::<Vec<_>>()),
        FuzzInput::Blob(it) => roundtrip(&Bytes::from(it)),
        FuzzInput::ByteArray4(it) => roundtrip(&it),
        FuzzInput::ByteArray32(it) => roundtrip(&it),
        FuzzInput::Option(it) => roundtrip(&it),
        FuzzInput::Boxed(it) => roundtrip(&Box::new(it)),
        FuzzInput::Tuple2(a, b) => roundtrip(&(a, b)),
        FuzzInput::Tuple3(a, b, c) => roundtrip(&(a, b, c)),
        FuzzInput::Bool(it) => roundtrip(&it),
        FuzzInput::Char(it) => roundtrip(&it),
        FuzzInput::U8(it) => roundtrip(&it),
        FuzzInput::U16(it) => roundtrip(&it),
        FuzzInput::U32(it) => roundtrip(&it),
        FuzzInput::U64(it) => roundtrip(&it),
        FuzzInput::U128(it) => roundtrip(&it),
        FuzzInput::I8(it) => roundtrip(&it),
        FuzzInput::I16(it) => roundtrip(&it),
        FuzzInput::I32(it) => roundtrip(&it),
        FuzzInput::I64(it) => roundtrip(&it),
        FuzzInput::I128(it) => roundtrip(&it),
        FuzzInput::F32(it) if !it.is_nan() => roundtrip(&it),
        FuzzInput::F64(it) if !it.is_nan() => roundtrip(&it),
        FuzzInput::F32(_) | FuzzInput::F64(_) => {}
    }
}

fuzz_target!(|input: FuzzInput| {
    fuzz(input);
});
