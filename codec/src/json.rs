//! JSON bridge for [Dict] trees.
//!
//! Parsing streams JSON straight into a text-format tree: objects become [TypeKind::Object]
//! nodes, arrays become [TypeKind::Array] nodes with children named by position, and leaves keep
//! their literal text. Non-negative integers parse as unsigned and negative ones as signed.
//!
//! Emission renders any tree, whatever its format. Integers wider than 64 bits and non-finite
//! floats are written as strings, and blobs as lowercase hex strings. Object field names pass
//! through the configured [KeyCase]; [TypeKind::SimpleMap] keys are data and are written as-is.

use crate::{
    case::KeyCase,
    config::{Format, JsonConfig},
    dict::{Dict, Integer, TypeKind},
    error::Error,
};
use serde::{
    de::{self, DeserializeSeed, MapAccess, SeqAccess, Visitor},
    ser::{self, SerializeMap, SerializeSeq},
    Serialize, Serializer,
};
use std::{fmt, io};

/// Fills a [Dict] node from a JSON value.
struct DictSeed<'a> {
    dict: &'a mut Dict,
}

impl DictSeed<'_> {
    fn child(&self) -> Dict {
        Dict::with_arena(Format::Text, self.dict.arena().clone())
    }
}

impl<'de> DeserializeSeed<'de> for DictSeed<'_> {
    type Value = ();

    fn deserialize<D: de::Deserializer<'de>>(self, deserializer: D) -> Result<(), D::Error> {
        deserializer.deserialize_any(self)
    }
}

impl<'de> Visitor<'de> for DictSeed<'_> {
    type Value = ();

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("any JSON value")
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> Result<(), E> {
        let text: &[u8] = if v { b"true" } else { b"false" };
        self.dict.set_leaf(TypeKind::Boolean, text);
        Ok(())
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<(), E> {
        let kind = TypeKind::Integral { signed: v < 0 };
        self.dict.set_leaf(kind, v.to_string().as_bytes());
        Ok(())
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<(), E> {
        let kind = TypeKind::Integral { signed: false };
        self.dict.set_leaf(kind, v.to_string().as_bytes());
        Ok(())
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<(), E> {
        self.dict
            .set_leaf(TypeKind::FloatingPoint, v.to_string().as_bytes());
        Ok(())
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<(), E> {
        self.dict.set_leaf(TypeKind::String, v.as_bytes());
        Ok(())
    }

    fn visit_unit<E: de::Error>(self) -> Result<(), E> {
        self.dict.set_null();
        Ok(())
    }

    fn visit_none<E: de::Error>(self) -> Result<(), E> {
        self.visit_unit()
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<(), A::Error> {
        self.dict.set_container(TypeKind::Array);
        let mut position = 0usize;
        loop {
            let mut child = self.child();
            if seq
                .next_element_seed(DictSeed { dict: &mut child })?
                .is_none()
            {
                return Ok(());
            }
            self.dict.push_child(position.to_string(), child);
            position += 1;
        }
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<(), A::Error> {
        self.dict.set_container(TypeKind::Object);
        while let Some(key) = map.next_key::<String>()? {
            let mut child = self.child();
            map.next_value_seed(DictSeed { dict: &mut child })?;
            self.dict.push_child(key, child);
        }
        Ok(())
    }
}

/// Renders a [Dict] node as JSON through [Serialize].
struct JsonView<'a> {
    dict: &'a Dict,
    key_case: KeyCase,
}

impl<'a> JsonView<'a> {
    fn child(&self, dict: &'a Dict) -> Self {
        Self {
            dict,
            key_case: self.key_case,
        }
    }
}

fn serialize_float<S: Serializer>(
    value: f64,
    single: bool,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    if !value.is_finite() {
        return serializer.serialize_str(&value.to_string());
    }
    if single {
        serializer.serialize_f32(value as f32)
    } else {
        serializer.serialize_f64(value)
    }
}

impl Serialize for JsonView<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let dict = self.dict;
        match dict.kind() {
            TypeKind::Null => serializer.serialize_unit(),
            TypeKind::Boolean => {
                serializer.serialize_bool(dict.boolean().map_err(ser::Error::custom)?)
            }
            TypeKind::String => {
                serializer.serialize_str(dict.text().map_err(ser::Error::custom)?)
            }
            TypeKind::Integral { .. } => match dict.integer().map_err(ser::Error::custom)? {
                Integer::Signed(v) => match i64::try_from(v) {
                    Ok(v) => serializer.serialize_i64(v),
                    Err(_) => serializer.serialize_str(&v.to_string()),
                },
                Integer::Unsigned(v) => match u64::try_from(v) {
                    Ok(v) => serializer.serialize_u64(v),
                    Err(_) => serializer.serialize_str(&v.to_string()),
                },
            },
            TypeKind::FloatingPoint => {
                let value = dict.float().map_err(ser::Error::custom)?;
                let single = dict.is_bin_format() && dict.payload().len() == 4;
                serialize_float(value, single, serializer)
            }
            TypeKind::Blob => {
                serializer.serialize_str(&dict.leaf_text().map_err(ser::Error::custom)?)
            }
            TypeKind::Array => {
                let mut seq = serializer.serialize_seq(Some(dict.len()))?;
                for (_, child) in dict.children() {
                    seq.serialize_element(&self.child(child))?;
                }
                seq.end()
            }
            TypeKind::Object => {
                let mut map = serializer.serialize_map(Some(dict.len()))?;
                for (name, child) in dict.children() {
                    let key = self.key_case.to_external(name).map_err(ser::Error::custom)?;
                    map.serialize_entry(&key, &self.child(child))?;
                }
                map.end()
            }
            TypeKind::SimpleMap => {
                let mut map = serializer.serialize_map(Some(dict.len()))?;
                for (name, child) in dict.children() {
                    map.serialize_entry(name, &self.child(child))?;
                }
                map.end()
            }
        }
    }
}

/// Parses a JSON document into a text-format tree.
pub fn from_str(json: &str) -> Result<Dict, Error> {
    let mut de = serde_json::Deserializer::from_str(json);
    let mut dict = Dict::new();
    DictSeed { dict: &mut dict }.deserialize(&mut de)?;
    de.end()?;
    Ok(dict)
}

/// Parses a JSON document from `reader` into a text-format tree.
pub fn from_reader(reader: impl io::Read) -> Result<Dict, Error> {
    let mut de = serde_json::Deserializer::from_reader(reader);
    let mut dict = Dict::new();
    DictSeed { dict: &mut dict }.deserialize(&mut de)?;
    de.end()?;
    Ok(dict)
}

/// Renders `dict` as a JSON document.
pub fn to_string(dict: &Dict, config: &JsonConfig) -> Result<String, Error> {
    let view = JsonView {
        dict,
        key_case: config.key_case,
    };
    let json = if config.pretty {
        serde_json::to_string_pretty(&view)?
    } else {
        serde_json::to_string(&view)?
    };
    Ok(json)
}

/// Writes `dict` as a JSON document to `writer`.
pub fn to_writer(writer: impl io::Write, dict: &Dict, config: &JsonConfig) -> Result<(), Error> {
    let view = JsonView {
        dict,
        key_case: config.key_case,
    };
    if config.pretty {
        serde_json::to_writer_pretty(writer, &view)?;
    } else {
        serde_json::to_writer(writer, &view)?;
    }
    Ok(())
}

impl Dict {
    /// Converts the tree to a [serde_json::Value], keeping field names as they are.
    pub fn to_value(&self) -> Result<serde_json::Value, Error> {
        let view = JsonView {
            dict: self,
            key_case: KeyCase::Identity,
        };
        Ok(serde_json::to_value(view)?)
    }

    /// Builds a text-format tree from a [serde_json::Value].
    pub fn from_value(value: &serde_json::Value) -> Result<Dict, Error> {
        let mut dict = Dict::new();
        DictSeed { dict: &mut dict }.deserialize(value)?;
        Ok(dict)
    }
}
