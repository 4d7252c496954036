//! Serialize structured data to binary, dictionary trees, and JSON.
//!
//! # Overview
//!
//! A serialization engine that describes each type once and renders it in several formats:
//! - A compact, positional binary format (little-endian, no field names)
//! - A self-describing tree ([Dict]) that mediates between values and text formats
//! - JSON, produced from and parsed into a [Dict]
//!
//! An aggregate lists its fields with [fields!]; every format then walks those fields through a
//! [FieldVisitor], so no type carries format-specific code.
//!
//! # Supported Types
//!
//! Natively supports:
//! - Primitives: `u8` through `u128`, `i8` through `i128`, `f32`, `f64`, `bool`, `char`
//! - Text and bytes: `String`, [bytes::Bytes], [ByteBuffer]
//! - Collections: `Vec<T>`, `VecDeque<T>`, `BTreeSet<T>`, `HashSet<T>`, `BTreeMap<K, V>`,
//!   `HashMap<K, V>`, tuples of up to six elements, and fixed-size arrays like `[u8; N]`
//! - Wrappers: `Option<T>`, `Box<T>`, `Arc<T>`, and `Box<dyn Dynamic>` for runtime-typed values
//! - Aggregates ([fields!]), fieldless enums ([enumeration!]), and tagged unions ([variants!])
//!
//! # Example
//!
//! ```
//! use fieldwire_codec::{data_to_string, fields, string_to_data, Decode, Encode};
//!
//! #[derive(Clone, Debug, Default, PartialEq)]
//! struct Item {
//!     id: u32,
//!     name: String,
//!     tags: Vec<String>,
//! }
//!
//! fields!(Item { id, name, tags });
//!
//! let item = Item {
//!     id: 7,
//!     name: "alpha".into(),
//!     tags: vec!["x".into(), "y".into()],
//! };
//!
//! // Binary
//! let encoded = item.encode();
//! assert_eq!(Item::decode(&encoded[..]).unwrap(), item);
//!
//! // JSON
//! let json = data_to_string(&item, false).unwrap();
//! assert_eq!(json, r#"{"id":7,"name":"alpha","tags":["x","y"]}"#);
//! let mut parsed = Item::default();
//! string_to_data(&json, &mut parsed).unwrap();
//! assert_eq!(parsed, item);
//! ```

pub mod binary;
pub mod buffer;
pub mod case;
pub mod codec;
pub mod config;
pub mod dict;
pub mod dynamic;
pub mod error;
pub mod file;
pub mod json;
pub mod tree;
mod types;
pub mod util;
pub mod visitor;

// Re-export main types and traits
pub use buffer::ByteBuffer;
pub use case::KeyCase;
pub use codec::{Codec, Decode, Encode, EncodeSize, FixedSize, Read, Write};
pub use config::{DecodeConfig, Format, JsonConfig, MissingKey};
pub use dict::{Dict, Integer, TypeKind, INDEX_THRESHOLD};
pub use dynamic::{Dynamic, Named, Registry};
pub use error::Error;
pub use file::{
    data_to_string, data_to_string_with, load_binary, load_dict, save_binary, save_dict,
    string_to_data, string_to_data_with,
};
pub use tree::{DictReader, DictWriter, FromDict, ToDict};
pub use types::boxed::{BEGIN_MAGIC, END_MAGIC};
pub use visitor::{variant_index, FieldVisitor, FieldVisitorMut, Fields, Serializable};

// Used by the exported macros.
#[doc(hidden)]
pub use bytes;
