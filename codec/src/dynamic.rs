//! Values whose concrete type is only known at runtime.
//!
//! Closed sets of types are better served by [crate::variants]. For open sets, a type implements
//! [Named] and registers itself with the global [Registry]; a `Box<dyn Dynamic>` then encodes as
//!
//! ```text
//! BEGIN_MAGIC (u32) | type name (NUL-terminated) | payload | END_MAGIC (u32)
//! ```
//!
//! and as `{ "type": name, "value": payload }` in a [Dict]. Reading resolves the name through the
//! registry and fails with [Error::UnknownType] if no factory was registered under it.

use crate::{
    config::DecodeConfig,
    dict::{Dict, TypeKind},
    error::Error,
    tree::{FromDict, ToDict},
    types::boxed::{read_framed, BEGIN_MAGIC, END_MAGIC, FRAME_SIZE},
    visitor::Serializable,
    EncodeSize, Read, Write,
};
use bytes::{Buf, BufMut};
use std::{
    any::Any,
    collections::HashMap,
    fmt::Debug,
    sync::{OnceLock, PoisonError, RwLock},
};
use tracing::debug;

/// A stable name identifying a concrete type across processes.
pub trait Named {
    const NAME: &'static str;
}

/// Object-safe view of a serializable value.
///
/// Implemented for every [Named] [Serializable] type; there is no need to implement it by hand.
pub trait Dynamic: Any + Debug + Send + Sync {
    /// Returns the name the value is registered under.
    fn type_name(&self) -> &'static str;

    /// Writes the payload (without framing).
    fn write_to_stream(&self, buf: &mut dyn BufMut);

    /// Returns the size of the payload written by [Dynamic::write_to_stream].
    fn stream_size(&self) -> usize;

    /// Writes the payload into `dict`.
    fn write_to_dict(&self, dict: &mut Dict);

    fn as_any(&self) -> &dyn Any;

    fn clone_box(&self) -> Box<dyn Dynamic>;

    fn dyn_eq(&self, other: &dyn Dynamic) -> bool;
}

impl<T> Dynamic for T
where
    T: Named + Serializable + Clone + PartialEq + Debug + Send + Sync + 'static,
{
    fn type_name(&self) -> &'static str {
        T::NAME
    }

    fn write_to_stream(&self, mut buf: &mut dyn BufMut) {
        self.write(&mut buf);
    }

    fn stream_size(&self) -> usize {
        self.encode_size()
    }

    fn write_to_dict(&self, dict: &mut Dict) {
        self.to_dict(dict);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn clone_box(&self) -> Box<dyn Dynamic> {
        Box::new(self.clone())
    }

    fn dyn_eq(&self, other: &dyn Dynamic) -> bool {
        other
            .as_any()
            .downcast_ref::<T>()
            .is_some_and(|other| other == self)
    }
}

impl dyn Dynamic {
    /// Returns the concrete value if it is a `T`.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.as_any().downcast_ref()
    }
}

impl PartialEq for dyn Dynamic {
    fn eq(&self, other: &Self) -> bool {
        self.dyn_eq(other)
    }
}

impl Clone for Box<dyn Dynamic> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

type StreamFactory = fn(&mut dyn Buf) -> Result<Box<dyn Dynamic>, Error>;
type DictFactory = fn(&Dict, &DecodeConfig) -> Result<Box<dyn Dynamic>, Error>;

#[derive(Clone, Copy)]
struct Factory {
    stream: StreamFactory,
    dict: DictFactory,
}

fn read_stream<T: Dynamic + Read>(mut buf: &mut dyn Buf) -> Result<Box<dyn Dynamic>, Error> {
    Ok(Box::new(T::read(&mut buf)?))
}

fn read_dict<T: Dynamic + FromDict>(
    dict: &Dict,
    config: &DecodeConfig,
) -> Result<Box<dyn Dynamic>, Error> {
    Ok(Box::new(T::from_dict(dict, config)?))
}

/// Factories for [Dynamic] values, keyed by [Named::NAME].
#[derive(Default)]
pub struct Registry {
    factories: RwLock<HashMap<&'static str, Factory>>,
}

impl Registry {
    /// Returns the process-wide registry consulted when decoding `Box<dyn Dynamic>`.
    pub fn global() -> &'static Registry {
        static GLOBAL: OnceLock<Registry> = OnceLock::new();
        GLOBAL.get_or_init(Registry::default)
    }

    /// Registers `T` under its name. Returns `false` if the name was already taken, in which case
    /// the existing factory is kept.
    pub fn register<T: Named + Dynamic + Serializable>(&self) -> bool {
        let mut factories = self
            .factories
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if factories.contains_key(T::NAME) {
            return false;
        }
        factories.insert(
            T::NAME,
            Factory {
                stream: read_stream::<T>,
                dict: read_dict::<T>,
            },
        );
        debug!(name = T::NAME, "registered dynamic type");
        true
    }

    /// Returns whether a factory is registered under `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.factories
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(name)
    }

    // The factory is copied out so that nested values can consult the registry again.
    fn factory(&self, name: &str) -> Result<Factory, Error> {
        self.factories
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .copied()
            .ok_or_else(|| Error::UnknownType(name.to_owned()))
    }

    /// Reads the payload of a value registered under `name`.
    pub fn read_stream(&self, name: &str, buf: &mut dyn Buf) -> Result<Box<dyn Dynamic>, Error> {
        (self.factory(name)?.stream)(buf)
    }

    /// Reads a value registered under `name` from its payload node.
    pub fn read_dict(
        &self,
        name: &str,
        dict: &Dict,
        config: &DecodeConfig,
    ) -> Result<Box<dyn Dynamic>, Error> {
        (self.factory(name)?.dict)(dict, config)
    }
}

impl Write for Box<dyn Dynamic> {
    fn write(&self, buf: &mut impl BufMut) {
        BEGIN_MAGIC.write(buf);
        self.type_name().write(buf);
        self.write_to_stream(buf);
        END_MAGIC.write(buf);
    }
}

impl EncodeSize for Box<dyn Dynamic> {
    fn encode_size(&self) -> usize {
        FRAME_SIZE + self.type_name().encode_size() + self.stream_size()
    }
}

impl Read for Box<dyn Dynamic> {
    fn read(buf: &mut impl Buf) -> Result<Self, Error> {
        read_framed(buf, |buf| {
            let name = String::read(buf)?;
            Registry::global().read_stream(&name, buf)
        })
    }
}

impl ToDict for Box<dyn Dynamic> {
    fn to_dict(&self, dict: &mut Dict) {
        dict.set_container(TypeKind::Object);
        self.type_name().to_dict(dict.add_child("type"));
        self.write_to_dict(dict.add_child("value"));
    }
}

impl FromDict for Box<dyn Dynamic> {
    fn from_dict(dict: &Dict, config: &DecodeConfig) -> Result<Self, Error> {
        dict.expect_kind(TypeKind::Object)?;
        let name = dict
            .find("type")
            .ok_or_else(|| Error::MissingKey("type".to_owned()))?
            .text()?;
        let value = dict
            .find("value")
            .ok_or_else(|| Error::MissingKey("value".to_owned()))?;
        Registry::global().read_dict(name, value, config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{fields, tree::to_dict, Decode, Encode, Format};

    #[derive(Clone, Debug, Default, PartialEq)]
    struct Circle {
        radius: f64,
    }
    fields!(Circle { radius });
    impl Named for Circle {
        const NAME: &'static str = "circle";
    }

    #[derive(Clone, Debug, Default, PartialEq)]
    struct Label {
        text: String,
        size: u16,
    }
    fields!(Label { text, size });
    impl Named for Label {
        const NAME: &'static str = "label";
    }

    #[derive(Clone, Debug, Default, PartialEq)]
    struct Unregistered {
        id: u8,
    }
    fields!(Unregistered { id });
    impl Named for Unregistered {
        const NAME: &'static str = "unregistered";
    }

    fn register() {
        Registry::global().register::<Circle>();
        Registry::global().register::<Label>();
    }

    fn shapes() -> Vec<Box<dyn Dynamic>> {
        vec![
            Box::new(Circle { radius: 1.5 }),
            Box::new(Label {
                text: "hello".into(),
                size: 12,
            }),
        ]
    }

    #[test]
    fn test_register_once() {
        let registry = Registry::default();
        assert!(registry.register::<Circle>());
        assert!(!registry.register::<Circle>());
        assert!(registry.contains("circle"));
        assert!(!registry.contains("label"));
    }

    #[test]
    fn test_binary_roundtrip() {
        register();
        let values = shapes();
        let encoded = values.encode();
        assert_eq!(encoded.len(), values.encode_size());
        let decoded = Vec::<Box<dyn Dynamic>>::decode(&encoded[..]).unwrap();
        assert_eq!(decoded, values);
        assert_eq!(
            decoded[1].downcast_ref::<Label>().map(|label| label.size),
            Some(12)
        );
    }

    #[test]
    fn test_binary_layout() {
        let value: Box<dyn Dynamic> = Box::new(Unregistered { id: 9 });
        let encoded = value.encode();
        let mut expected = Vec::new();
        expected.extend_from_slice(&BEGIN_MAGIC.to_le_bytes());
        expected.extend_from_slice(b"unregistered\0");
        expected.push(9);
        expected.extend_from_slice(&END_MAGIC.to_le_bytes());
        assert_eq!(&encoded[..], &expected[..]);
    }

    #[test]
    fn test_unknown_type() {
        let value: Box<dyn Dynamic> = Box::new(Unregistered { id: 1 });
        let encoded = value.encode();
        assert!(matches!(
            Box::<dyn Dynamic>::decode(&encoded[..]),
            Err(Error::UnknownType(name)) if name == "unregistered"
        ));

        let dict = to_dict(&value, Format::Text);
        assert!(matches!(
            Box::<dyn Dynamic>::from_dict(&dict, &DecodeConfig::default()),
            Err(Error::UnknownType(_))
        ));
    }

    #[test]
    fn test_corrupted_end() {
        register();
        let value: Box<dyn Dynamic> = Box::new(Circle { radius: 2.0 });
        let mut encoded = Vec::from(value.encode());
        let last = encoded.len() - 1;
        encoded[last] = 0;
        assert!(matches!(
            Box::<dyn Dynamic>::decode(&encoded[..]),
            Err(Error::Corrupted("end magic"))
        ));
    }

    #[test]
    fn test_tree_roundtrip() {
        register();
        let values = shapes();
        for format in [Format::Binary, Format::Text] {
            let dict = to_dict(&values, format);
            let first = dict.child(0).unwrap().1;
            assert_eq!(first.kind(), TypeKind::Object);
            assert_eq!(first.find("type").unwrap().text().unwrap(), "circle");
            let decoded =
                Vec::<Box<dyn Dynamic>>::from_dict(&dict, &DecodeConfig::default()).unwrap();
            assert_eq!(decoded, values);
        }
    }

    #[test]
    fn test_optional_dynamic() {
        register();
        let present: Option<Box<dyn Dynamic>> = Some(Box::new(Circle { radius: 0.25 }));
        let encoded = present.encode();
        assert_eq!(&encoded[..4], &[1, 0, 0, 0]);
        assert_eq!(&encoded[4..8], &BEGIN_MAGIC.to_le_bytes());
        assert_eq!(
            Option::<Box<dyn Dynamic>>::decode(&encoded[..]).unwrap(),
            present
        );

        let absent: Option<Box<dyn Dynamic>> = None;
        assert_eq!(&absent.encode()[..], &[0, 0, 0, 0]);
    }

    #[test]
    fn test_clone() {
        let value: Box<dyn Dynamic> = Box::new(Circle { radius: 3.0 });
        let copy = value.clone();
        assert!(*copy == *value);
        let other: Box<dyn Dynamic> = Box::new(Circle { radius: 4.0 });
        assert!(*copy != *other);
    }
}
