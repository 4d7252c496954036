//! Format-agnostic field visitation.
//!
//! An aggregate describes itself once through [Fields]: an ordered walk over `(value, name)`
//! pairs. Each format supplies a [FieldVisitor] (for writing) and a [FieldVisitorMut] (for
//! reading), so the aggregate never contains format-specific code. The [crate::fields] macro
//! writes the walk and wires every format to it.

use crate::{
    codec::{EncodeSize, Read, Write},
    config::Format,
    tree::{FromDict, ToDict},
};

/// A value usable as a field in every supported format.
pub trait Serializable: Write + Read + EncodeSize + ToDict + FromDict {}

impl<T: Write + Read + EncodeSize + ToDict + FromDict> Serializable for T {}

/// Receives shared references to the fields of an aggregate, in declaration order.
pub trait FieldVisitor {
    type Error;

    /// Processes one field.
    fn visit<T: Serializable>(&mut self, value: &T, name: &'static str) -> Result<(), Self::Error>;

    /// Processes one field whose subtree should use `format` for leaf payloads.
    ///
    /// Only tree-building visitors honor the hint.
    fn visit_as<T: Serializable>(
        &mut self,
        value: &T,
        name: &'static str,
        format: Format,
    ) -> Result<(), Self::Error> {
        let _ = format;
        self.visit(value, name)
    }
}

/// Receives mutable references to the fields of an aggregate, in declaration order.
pub trait FieldVisitorMut {
    type Error;

    /// Processes one field.
    fn visit<T: Serializable>(
        &mut self,
        value: &mut T,
        name: &'static str,
    ) -> Result<(), Self::Error>;

    /// Processes one field declared with a format hint.
    fn visit_as<T: Serializable>(
        &mut self,
        value: &mut T,
        name: &'static str,
        format: Format,
    ) -> Result<(), Self::Error> {
        let _ = format;
        self.visit(value, name)
    }
}

/// An aggregate that can walk its fields.
pub trait Fields {
    /// Passes every field to `visitor`.
    fn visit_fields<V: FieldVisitor>(&self, visitor: &mut V) -> Result<(), V::Error>;

    /// Passes every field to `visitor` for in-place update.
    fn visit_fields_mut<V: FieldVisitorMut>(&mut self, visitor: &mut V) -> Result<(), V::Error>;
}

/// Returns the position of `name` in `names`.
///
/// Evaluated at compile time by [crate::variants] to number variants.
pub const fn variant_index(names: &[&str], name: &str) -> u32 {
    let mut i = 0;
    while i < names.len() {
        let candidate = names[i].as_bytes();
        let target = name.as_bytes();
        if candidate.len() == target.len() {
            let mut j = 0;
            while j < target.len() && candidate[j] == target[j] {
                j += 1;
            }
            if j == target.len() {
                return i as u32;
            }
        }
        i += 1;
    }
    panic!("unknown variant");
}

/// Implements [Fields] and every format for a struct with named fields.
///
/// The struct must implement [Default]: decoding starts from the default value and overwrites
/// each field it finds. A field may carry a format hint (`field as Binary`) selecting the leaf
/// encoding of its subtree in a [crate::Dict].
///
/// ```
/// use fieldwire_codec::{fields, Decode, Encode};
///
/// #[derive(Clone, Debug, Default, PartialEq)]
/// struct Item {
///     id: u32,
///     name: String,
///     tags: Vec<String>,
///     checksum: u64,
/// }
///
/// fields!(Item { id, name, tags, checksum as Binary });
///
/// let item = Item {
///     id: 7,
///     name: "alpha".into(),
///     tags: vec!["x".into(), "y".into()],
///     checksum: 0xfeed,
/// };
/// let encoded = item.encode();
/// assert_eq!(Item::decode(&encoded[..]).unwrap(), item);
/// ```
#[macro_export]
macro_rules! fields {
    ($name:ident { $( $field:ident $( as $format:ident )? ),* $(,)? }) => {
        impl $crate::Fields for $name {
            fn visit_fields<V: $crate::FieldVisitor>(&self, visitor: &mut V) -> ::core::result::Result<(), V::Error> {
                $( $crate::fields!(@visit visitor, &self.$field, stringify!($field) $(, $format)?); )*
                Ok(())
            }

            fn visit_fields_mut<V: $crate::FieldVisitorMut>(
                &mut self,
                visitor: &mut V,
            ) -> ::core::result::Result<(), V::Error> {
                $( $crate::fields!(@visit visitor, &mut self.$field, stringify!($field) $(, $format)?); )*
                Ok(())
            }
        }

        impl $crate::Write for $name {
            fn write(&self, buf: &mut impl $crate::bytes::BufMut) {
                $crate::binary::write_fields(self, buf)
            }
        }

        impl $crate::Read for $name {
            fn read(buf: &mut impl $crate::bytes::Buf) -> ::core::result::Result<Self, $crate::Error> {
                $crate::binary::read_fields(buf)
            }
        }

        impl $crate::EncodeSize for $name {
            fn encode_size(&self) -> usize {
                $crate::binary::fields_size(self)
            }
        }

        impl $crate::ToDict for $name {
            fn to_dict(&self, dict: &mut $crate::Dict) {
                $crate::tree::write_fields(self, dict)
            }
        }

        impl $crate::FromDict for $name {
            fn from_dict(
                dict: &$crate::Dict,
                config: &$crate::DecodeConfig,
            ) -> ::core::result::Result<Self, $crate::Error> {
                $crate::tree::read_fields(dict, config)
            }
        }
    };
    (@visit $visitor:ident, $value:expr, $name:expr) => {
        $visitor.visit($value, $name)?
    };
    (@visit $visitor:ident, $value:expr, $name:expr, $format:ident) => {
        $visitor.visit_as($value, $name, $crate::Format::$format)?
    };
}

/// Implements every format for a fieldless `Copy` enum with a 4-byte representation.
///
/// Binary encodings carry the 4-byte discriminant (little-endian); trees and JSON carry the
/// variant name. The representation width is checked at compile time:
///
/// ```compile_fail
/// use fieldwire_codec::enumeration;
///
/// #[derive(Clone, Copy, Debug, Default, PartialEq)]
/// #[repr(u64)]
/// enum Wide {
///     #[default]
///     A,
/// }
///
/// enumeration!(Wide: u64 { A });
/// ```
///
/// ```
/// use fieldwire_codec::{enumeration, Decode, Encode};
///
/// #[derive(Clone, Copy, Debug, Default, PartialEq)]
/// #[repr(u32)]
/// enum Level {
///     #[default]
///     Low = 1,
///     High = 2,
/// }
///
/// enumeration!(Level: u32 { Low, High });
///
/// assert_eq!(&Level::High.encode()[..], &[2, 0, 0, 0]);
/// assert_eq!(Level::decode(&[1u8, 0, 0, 0][..]).unwrap(), Level::Low);
/// ```
#[macro_export]
macro_rules! enumeration {
    ($name:ident : $repr:ty { $( $variant:ident ),+ $(,)? }) => {
        const _: () = assert!(
            ::core::mem::size_of::<$name>() == 4 && ::core::mem::size_of::<$repr>() == 4,
            concat!("enum ", stringify!($name), " must have a 4-byte representation"),
        );

        impl $crate::Write for $name {
            #[inline]
            fn write(&self, buf: &mut impl $crate::bytes::BufMut) {
                buf.put_slice(&(*self as $repr).to_le_bytes());
            }
        }

        impl $crate::Read for $name {
            fn read(buf: &mut impl $crate::bytes::Buf) -> ::core::result::Result<Self, $crate::Error> {
                let raw = <u32 as $crate::Read>::read(buf)?;
                $(
                    if raw == ($name::$variant as $repr) as u32 {
                        return Ok($name::$variant);
                    }
                )+
                Err($crate::Error::InvalidEnum(stringify!($name), raw))
            }
        }

        impl $crate::FixedSize for $name {
            const SIZE: usize = 4;
        }

        impl $crate::EncodeSize for $name {
            #[inline]
            fn encode_size(&self) -> usize {
                4
            }
        }

        impl $crate::ToDict for $name {
            const SIMPLE_KEY: bool = true;

            fn to_dict(&self, dict: &mut $crate::Dict) {
                dict.set_leaf($crate::TypeKind::String, $crate::ToDict::to_key(self)
                    .unwrap_or_default()
                    .as_bytes());
            }

            fn to_key(&self) -> Option<String> {
                Some(match self {
                    $( $name::$variant => stringify!($variant), )+
                }.to_owned())
            }
        }

        impl $crate::FromDict for $name {
            fn from_dict(
                dict: &$crate::Dict,
                _: &$crate::DecodeConfig,
            ) -> ::core::result::Result<Self, $crate::Error> {
                <Self as $crate::FromDict>::from_key(dict.text()?)
            }

            fn from_key(key: &str) -> ::core::result::Result<Self, $crate::Error> {
                match key {
                    $( stringify!($variant) => Ok($name::$variant), )+
                    other => Err($crate::Error::InvalidData(
                        stringify!($name).to_owned(),
                        format!("unknown variant {other}"),
                    )),
                }
            }
        }
    };
}

/// Implements every format for an enum whose variants each wrap one serializable value.
///
/// Binary encodings carry the variant's position as a 4-byte index followed by the payload. Trees
/// carry a [crate::TypeKind::SimpleMap] node with a single child named after the variant (a
/// one-key object in JSON, exempt from key casing).
///
/// ```
/// use fieldwire_codec::{fields, variants, data_to_string, Decode, Encode};
///
/// #[derive(Clone, Debug, Default, PartialEq)]
/// struct Circle {
///     radius: f64,
/// }
/// fields!(Circle { radius });
///
/// #[derive(Clone, Debug, PartialEq)]
/// enum Shape {
///     Circle(Circle),
///     Label(String),
/// }
///
/// variants!(Shape { Circle(Circle), Label(String) });
///
/// let shape = Shape::Label("origin".into());
/// assert_eq!(Shape::decode(&shape.encode()[..]).unwrap(), shape);
/// assert_eq!(data_to_string(&shape, false).unwrap(), r#"{"Label":"origin"}"#);
/// ```
#[macro_export]
macro_rules! variants {
    ($name:ident { $( $variant:ident ( $inner:ty ) ),+ $(,)? }) => {
        impl $name {
            const VARIANT_NAMES: &'static [&'static str] = &[$( stringify!($variant) ),+];
        }

        impl $crate::Write for $name {
            fn write(&self, buf: &mut impl $crate::bytes::BufMut) {
                match self {
                    $(
                        $name::$variant(inner) => {
                            const INDEX: u32 =
                                $crate::variant_index($name::VARIANT_NAMES, stringify!($variant));
                            <u32 as $crate::Write>::write(&INDEX, buf);
                            $crate::Write::write(inner, buf);
                        }
                    )+
                }
            }
        }

        impl $crate::Read for $name {
            fn read(buf: &mut impl $crate::bytes::Buf) -> ::core::result::Result<Self, $crate::Error> {
                let index = <u32 as $crate::Read>::read(buf)?;
                $(
                    if index == $crate::variant_index($name::VARIANT_NAMES, stringify!($variant)) {
                        return Ok($name::$variant(<$inner as $crate::Read>::read(buf)?));
                    }
                )+
                Err($crate::Error::InvalidEnum(stringify!($name), index))
            }
        }

        impl $crate::EncodeSize for $name {
            fn encode_size(&self) -> usize {
                match self {
                    $( $name::$variant(inner) => 4 + $crate::EncodeSize::encode_size(inner), )+
                }
            }
        }

        impl $crate::ToDict for $name {
            fn to_dict(&self, dict: &mut $crate::Dict) {
                dict.set_container($crate::TypeKind::SimpleMap);
                match self {
                    $(
                        $name::$variant(inner) => {
                            $crate::ToDict::to_dict(inner, dict.add_child(stringify!($variant)));
                        }
                    )+
                }
            }
        }

        impl $crate::FromDict for $name {
            fn from_dict(
                dict: &$crate::Dict,
                config: &$crate::DecodeConfig,
            ) -> ::core::result::Result<Self, $crate::Error> {
                if !matches!(
                    dict.kind(),
                    $crate::TypeKind::SimpleMap | $crate::TypeKind::Object
                ) {
                    return Err($crate::Error::UnexpectedKind {
                        expected: $crate::TypeKind::SimpleMap,
                        found: dict.kind(),
                    });
                }
                let (variant, inner) = match dict.child(0) {
                    Some(child) if dict.len() == 1 => child,
                    _ => return Err($crate::Error::InvalidLength(dict.len())),
                };
                match variant {
                    $(
                        stringify!($variant) => Ok($name::$variant(
                            <$inner as $crate::FromDict>::from_dict(inner, config)?,
                        )),
                    )+
                    other => Err($crate::Error::InvalidData(
                        stringify!($name).to_owned(),
                        format!("unknown variant {other}"),
                    )),
                }
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_variant_index() {
        const NAMES: &[&str] = &["Circle", "Square", "Sq"];
        const SQ: u32 = variant_index(NAMES, "Sq");
        assert_eq!(variant_index(NAMES, "Circle"), 0);
        assert_eq!(variant_index(NAMES, "Square"), 1);
        assert_eq!(SQ, 2);
    }

    #[test]
    #[should_panic(expected = "unknown variant")]
    fn test_variant_index_unknown() {
        variant_index(&["A"], "B");
    }
}
