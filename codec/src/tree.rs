//! Conversion between values and [Dict] trees.
//!
//! Leaves become payload nodes, sequences become [TypeKind::Array] nodes with one child per
//! element (named by position), aggregates become [TypeKind::Object] nodes with one child per
//! field, and maps keyed by primitives become [TypeKind::SimpleMap] nodes keyed by the rendered
//! key.

use crate::{
    config::{DecodeConfig, MissingKey},
    dict::{Dict, TypeKind},
    error::Error,
    visitor::{FieldVisitor, FieldVisitorMut, Fields, Serializable},
    Format,
};
use std::convert::Infallible;
use tracing::warn;

/// Trait for types that can be written into a [Dict].
pub trait ToDict {
    /// Whether values render to a map key through [ToDict::to_key].
    ///
    /// Maps whose key type sets this are stored as [TypeKind::SimpleMap]; other maps are stored
    /// as an array of `{ "key", "value" }` objects.
    const SIMPLE_KEY: bool = false;

    /// Writes this value into `dict`, replacing its content.
    fn to_dict(&self, dict: &mut Dict);

    /// Renders this value as a map key. Must return `Some` when [ToDict::SIMPLE_KEY] is set.
    fn to_key(&self) -> Option<String> {
        None
    }
}

/// Trait for types that can be read from a [Dict].
pub trait FromDict: Sized {
    /// Reads a value from `dict`.
    fn from_dict(dict: &Dict, config: &DecodeConfig) -> Result<Self, Error>;

    /// Parses a value rendered by [ToDict::to_key].
    fn from_key(key: &str) -> Result<Self, Error> {
        Err(Error::InvalidData(
            "map key".to_owned(),
            format!("{key} cannot be parsed as a simple key"),
        ))
    }
}

/// Writes a value into a new tree using `format` for leaf payloads.
pub fn to_dict<T: ToDict + ?Sized>(value: &T, format: Format) -> Dict {
    let mut dict = Dict::with_format(format);
    value.to_dict(&mut dict);
    dict
}

/// Adds one child per visited field.
pub struct DictWriter<'a> {
    dict: &'a mut Dict,
}

impl<'a> DictWriter<'a> {
    pub fn new(dict: &'a mut Dict) -> Self {
        Self { dict }
    }
}

impl FieldVisitor for DictWriter<'_> {
    type Error = Infallible;

    fn visit<T: Serializable>(&mut self, value: &T, name: &'static str) -> Result<(), Infallible> {
        value.to_dict(self.dict.add_child(name));
        Ok(())
    }

    fn visit_as<T: Serializable>(
        &mut self,
        value: &T,
        name: &'static str,
        format: Format,
    ) -> Result<(), Infallible> {
        value.to_dict(self.dict.add_child_with_format(name, format));
        Ok(())
    }
}

/// Overwrites each visited field with the child of the same name.
pub struct DictReader<'a> {
    dict: &'a Dict,
    config: &'a DecodeConfig,
}

impl<'a> DictReader<'a> {
    pub fn new(dict: &'a Dict, config: &'a DecodeConfig) -> Self {
        Self { dict, config }
    }
}

impl FieldVisitorMut for DictReader<'_> {
    type Error = Error;

    fn visit<T: Serializable>(&mut self, value: &mut T, name: &'static str) -> Result<(), Error> {
        let key = self.config.key_case.to_external(name)?;
        match self.dict.find(&key) {
            Some(child) => {
                *value = T::from_dict(child, self.config)?;
                Ok(())
            }
            None => match self.config.missing {
                MissingKey::Strict => Err(Error::MissingKey(key.into_owned())),
                MissingKey::Lenient => {
                    warn!(key = %key, "missing key: substituting default");
                    Ok(())
                }
            },
        }
    }
}

/// Writes every field of `value` as a child of `dict`.
pub fn write_fields<T: Fields + ?Sized>(value: &T, dict: &mut Dict) {
    dict.set_container(TypeKind::Object);
    match value.visit_fields(&mut DictWriter::new(dict)) {
        Ok(()) => {}
        Err(never) => match never {},
    }
}

/// Reads a `T` by overwriting the fields of its default value.
pub fn read_fields<T: Fields + Default>(dict: &Dict, config: &DecodeConfig) -> Result<T, Error> {
    dict.expect_kind(TypeKind::Object)?;
    let mut value = T::default();
    value.visit_fields_mut(&mut DictReader::new(dict, config))?;
    Ok(value)
}

/// Turns `dict` into an empty array node.
pub(crate) fn write_sequence_start(dict: &mut Dict) {
    dict.set_container(TypeKind::Array);
}

/// Writes `items` as an array node.
pub(crate) fn write_sequence<'a, T: ToDict + 'a>(
    items: impl IntoIterator<Item = &'a T>,
    dict: &mut Dict,
) {
    write_sequence_start(dict);
    for (i, item) in items.into_iter().enumerate() {
        item.to_dict(dict.add_child(i.to_string()));
    }
}

/// Reads the elements of an array node.
pub(crate) fn read_sequence<T: FromDict, C: FromIterator<T>>(
    dict: &Dict,
    config: &DecodeConfig,
) -> Result<C, Error> {
    dict.expect_kind(TypeKind::Array)?;
    dict.children()
        .map(|(_, child)| T::from_dict(child, config))
        .collect()
}

/// Writes map entries, keyed by name when `K` renders simple keys.
pub(crate) fn write_map<'a, K: ToDict + 'a, V: ToDict + 'a>(
    entries: impl IntoIterator<Item = (&'a K, &'a V)>,
    dict: &mut Dict,
) {
    if K::SIMPLE_KEY {
        dict.set_container(TypeKind::SimpleMap);
        for (key, value) in entries {
            let key = key.to_key().expect("simple keys render to text");
            value.to_dict(dict.add_child(key));
        }
        return;
    }
    dict.set_container(TypeKind::Array);
    for (i, (key, value)) in entries.into_iter().enumerate() {
        let entry = dict.add_child(i.to_string());
        entry.set_container(TypeKind::Object);
        key.to_dict(entry.add_child("key"));
        value.to_dict(entry.add_child("value"));
    }
}

/// Reads map entries written by [write_map].
///
/// Objects are accepted in place of simple maps, since that is how JSON objects parse.
pub(crate) fn read_map<K: FromDict, V: FromDict, C: FromIterator<(K, V)>>(
    dict: &Dict,
    config: &DecodeConfig,
) -> Result<C, Error> {
    match dict.kind() {
        TypeKind::SimpleMap | TypeKind::Object => dict
            .children()
            .map(|(key, value)| -> Result<(K, V), Error> {
                Ok((K::from_key(key)?, V::from_dict(value, config)?))
            })
            .collect(),
        TypeKind::Array => dict
            .children()
            .map(|(_, entry)| -> Result<(K, V), Error> {
                entry.expect_kind(TypeKind::Object)?;
                let key = entry
                    .find("key")
                    .ok_or_else(|| Error::MissingKey("key".to_owned()))?;
                let value = entry
                    .find("value")
                    .ok_or_else(|| Error::MissingKey("value".to_owned()))?;
                Ok((K::from_dict(key, config)?, V::from_dict(value, config)?))
            })
            .collect(),
        found => Err(Error::UnexpectedKind {
            expected: TypeKind::SimpleMap,
            found,
        }),
    }
}
