//! Self-describing tree used as the intermediate representation between formats.
//!
//! A [Dict] node holds a leaf payload, a [TypeKind] tag, and an ordered list of named children.
//! Values are written into a tree by [crate::ToDict] and read back by [crate::FromDict]; the JSON
//! bridge converts trees to and from text.
//!
//! # Lookup
//!
//! [Dict::find] scans children linearly while a node is small. Once a node holds
//! [INDEX_THRESHOLD] children or more, the first lookup builds a name index that later lookups
//! reuse. When child names are unique, a lookup first checks the child following the last hit, so
//! visiting children in order never hashes. Adding, removing, or replacing children drops the
//! index.
//!
//! # Storage
//!
//! Child nodes are stored in blocks of an [Arena] shared by every node of a tree. Trees created
//! with [Dict::new] use the process-wide arena for nodes.

use crate::{
    buffer::ByteBuffer,
    codec::{EncodeSize, FixedSize, Read, Write},
    config::Format,
    error::Error,
    util::{at_least, length_prefix, read_length},
};
use bytes::{Buf, BufMut};
use fieldwire_utils::{from_hex, hex, pool::layout_for, Arena, ArenaRegistry, Pooled};
use std::{
    borrow::Cow,
    cell::{Cell, OnceCell},
    collections::HashMap,
    fmt,
};

/// Child count at which lookups switch from a linear scan to a name index.
pub const INDEX_THRESHOLD: usize = 20;

/// Maximum nesting accepted when reading a persisted tree.
const MAX_DEPTH: usize = 256;

/// Category of the value held by a [Dict] node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TypeKind {
    String,
    Boolean,
    /// An integer; `signed` tells whether a binary payload is two's complement.
    Integral {
        signed: bool,
    },
    FloatingPoint,
    Array,
    Object,
    /// An absent optional value (or JSON `null`).
    Null,
    /// A map keyed by primitive values, emitted as a JSON object.
    SimpleMap,
    /// Raw bytes.
    Blob,
}

impl TypeKind {
    /// Returns `true` for kinds whose content lives in children rather than the payload.
    pub fn is_container(&self) -> bool {
        matches!(self, Self::Array | Self::Object | Self::SimpleMap)
    }

    fn code(&self) -> u32 {
        match self {
            Self::String => 0,
            Self::Boolean => 1,
            Self::Integral { signed: false } => 2,
            Self::Integral { signed: true } => 3,
            Self::FloatingPoint => 4,
            Self::Array => 5,
            Self::Object => 6,
            Self::Null => 7,
            Self::SimpleMap => 8,
            Self::Blob => 9,
        }
    }

    fn from_code(code: u32) -> Option<Self> {
        Some(match code {
            0 => Self::String,
            1 => Self::Boolean,
            2 => Self::Integral { signed: false },
            3 => Self::Integral { signed: true },
            4 => Self::FloatingPoint,
            5 => Self::Array,
            6 => Self::Object,
            7 => Self::Null,
            8 => Self::SimpleMap,
            9 => Self::Blob,
            _ => return None,
        })
    }
}

impl fmt::Display for TypeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::String => "string",
            Self::Boolean => "boolean",
            Self::Integral { .. } => "integral",
            Self::FloatingPoint => "floating-point",
            Self::Array => "array",
            Self::Object => "object",
            Self::Null => "null",
            Self::SimpleMap => "simple-map",
            Self::Blob => "blob",
        };
        f.write_str(name)
    }
}

/// An integer read from a [Dict] leaf, widened to 128 bits.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Integer {
    Signed(i128),
    Unsigned(u128),
}

impl Integer {
    /// Narrows the value to `T`, returning `None` if it does not fit.
    pub fn get<T: TryFrom<i128> + TryFrom<u128>>(self) -> Option<T> {
        match self {
            Self::Signed(v) => T::try_from(v).ok(),
            Self::Unsigned(v) => T::try_from(v).ok(),
        }
    }

    fn parse(text: &str) -> Option<Self> {
        if text.starts_with('-') {
            text.parse().ok().map(Self::Signed)
        } else {
            text.parse().ok().map(Self::Unsigned)
        }
    }

    fn from_le(bytes: &[u8], signed: bool) -> Option<Self> {
        if !matches!(bytes.len(), 1 | 2 | 4 | 8 | 16) {
            return None;
        }
        let negative = signed && bytes[bytes.len() - 1] & 0x80 != 0;
        let mut raw = [if negative { 0xff } else { 0 }; 16];
        raw[..bytes.len()].copy_from_slice(bytes);
        Some(if signed {
            Self::Signed(i128::from_le_bytes(raw))
        } else {
            Self::Unsigned(u128::from_le_bytes(raw))
        })
    }

    // Uses `width` bytes when given and the value fits, then 8 bytes, then 16.
    fn to_le(self, signed: bool, width: Option<usize>) -> Option<Vec<u8>> {
        let (value, raw) = if signed {
            let v: i128 = self.get()?;
            (Self::Signed(v), v.to_le_bytes())
        } else {
            let v: u128 = self.get()?;
            (Self::Unsigned(v), v.to_le_bytes())
        };
        width
            .into_iter()
            .chain([8, 16])
            .find(|&n| n <= raw.len() && Self::from_le(&raw[..n], signed) == Some(value))
            .map(|n| raw[..n].to_vec())
    }
}

impl fmt::Display for Integer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Signed(v) => v.fmt(f),
            Self::Unsigned(v) => v.fmt(f),
        }
    }
}

#[derive(Clone, PartialEq)]
struct Child {
    name: String,
    node: Pooled<Dict>,
}

struct Index {
    // First occurrence of each name.
    positions: HashMap<String, usize>,
    unique: bool,
}

impl Index {
    fn build(children: &[Child]) -> Self {
        let mut positions = HashMap::with_capacity(children.len());
        for (i, child) in children.iter().enumerate() {
            positions.entry(child.name.clone()).or_insert(i);
        }
        let unique = positions.len() == children.len();
        Self { positions, unique }
    }
}

/// A node of the intermediate tree.
pub struct Dict {
    payload: ByteBuffer,
    kind: TypeKind,
    format: Format,
    // Binary width of a numeric leaf coerced to text, restored when coerced back.
    width: Option<usize>,
    children: Vec<Child>,
    index: OnceCell<Index>,
    cursor: Cell<Option<usize>>,
    arena: Arena,
}

fn invalid(context: &str, message: impl Into<String>) -> Error {
    Error::InvalidData(context.to_owned(), message.into())
}

impl Dict {
    /// Creates an empty text-format object node.
    pub fn new() -> Self {
        Self::with_format(Format::Text)
    }

    /// Creates an empty object node using `format` for leaf payloads.
    pub fn with_format(format: Format) -> Self {
        Self::with_arena(format, ArenaRegistry::global().arena_for::<Dict>())
    }

    /// Creates an empty object node whose descendants are stored in `arena`.
    ///
    /// # Panics
    ///
    /// Panics if `arena` does not serve blocks laid out for [Dict].
    pub fn with_arena(format: Format, arena: Arena) -> Self {
        assert_eq!(
            arena.layout(),
            layout_for::<Dict>(),
            "arena does not serve dict nodes"
        );
        Self {
            payload: ByteBuffer::new(),
            kind: TypeKind::Object,
            format,
            width: None,
            children: Vec::new(),
            index: OnceCell::new(),
            cursor: Cell::new(None),
            arena,
        }
    }

    /// Returns the kind of value stored in this node.
    pub fn kind(&self) -> TypeKind {
        self.kind
    }

    /// Returns the encoding of this node's leaf payload.
    pub fn format(&self) -> Format {
        self.format
    }

    /// Returns `true` if leaf payloads are stored as fixed-width binary.
    pub fn is_bin_format(&self) -> bool {
        self.format == Format::Binary
    }

    /// Returns the raw leaf payload.
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Returns the arena storing this node's children.
    pub fn arena(&self) -> &Arena {
        &self.arena
    }

    /// Returns the number of children.
    pub fn len(&self) -> usize {
        self.children.len()
    }

    /// Returns `true` if the node has no children.
    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    /// Iterates over `(name, child)` pairs in insertion order.
    pub fn children(&self) -> impl ExactSizeIterator<Item = (&str, &Dict)> + '_ {
        self.children
            .iter()
            .map(|child| (child.name.as_str(), &*child.node))
    }

    /// Returns the child at `position`.
    pub fn child(&self, position: usize) -> Option<(&str, &Dict)> {
        self.children
            .get(position)
            .map(|child| (child.name.as_str(), &*child.node))
    }

    /// Returns the child at `position` mutably.
    pub fn child_mut(&mut self, position: usize) -> Option<&mut Dict> {
        self.children.get_mut(position).map(|child| &mut *child.node)
    }

    fn invalidate(&mut self) {
        self.index.take();
        self.cursor.set(None);
    }

    fn empty_child(&self, format: Format) -> Dict {
        Dict {
            payload: ByteBuffer::new(),
            kind: TypeKind::Object,
            format,
            width: None,
            children: Vec::new(),
            index: OnceCell::new(),
            cursor: Cell::new(None),
            arena: self.arena.clone(),
        }
    }

    /// Appends an empty child inheriting this node's format and returns it.
    pub fn add_child(&mut self, name: impl Into<String>) -> &mut Dict {
        self.add_child_with_format(name, self.format)
    }

    /// Appends an empty child using `format` for its subtree and returns it.
    pub fn add_child_with_format(&mut self, name: impl Into<String>, format: Format) -> &mut Dict {
        let node = self.empty_child(format);
        self.push_child(name, node)
    }

    /// Appends an existing node as a child and returns it.
    pub fn push_child(&mut self, name: impl Into<String>, node: Dict) -> &mut Dict {
        self.invalidate();
        self.children.push(Child {
            name: name.into(),
            node: Pooled::new_in(&self.arena, node),
        });
        let last = self.children.len() - 1;
        &mut self.children[last].node
    }

    /// Removes the first child named `name` and returns it.
    pub fn remove_child(&mut self, name: &str) -> Option<Dict> {
        let position = self.position(name)?;
        self.invalidate();
        Some(self.children.remove(position).node.into_inner())
    }

    fn position(&self, name: &str) -> Option<usize> {
        if self.children.len() < INDEX_THRESHOLD {
            return self.children.iter().position(|child| child.name == name);
        }
        let index = self.index.get_or_init(|| Index::build(&self.children));
        if index.unique {
            if let Some(next) = self.cursor.get().map(|last| last + 1) {
                if self.children.get(next).is_some_and(|child| child.name == name) {
                    self.cursor.set(Some(next));
                    return Some(next);
                }
            }
        }
        let position = index.positions.get(name).copied();
        if position.is_some() {
            self.cursor.set(position);
        }
        position
    }

    /// Returns the first child named `name`.
    pub fn find(&self, name: &str) -> Option<&Dict> {
        self.position(name).map(|i| &*self.children[i].node)
    }

    /// Returns the first child named `name` mutably.
    ///
    /// The index only depends on child names, so mutating the returned node keeps it.
    pub fn find_mut(&mut self, name: &str) -> Option<&mut Dict> {
        let position = self.position(name)?;
        Some(&mut *self.children[position].node)
    }

    /// Returns `true` if the name index has been built.
    pub fn is_indexed(&self) -> bool {
        self.index.get().is_some()
    }

    /// Empties the payload and removes all children.
    pub fn clear(&mut self) {
        self.invalidate();
        self.payload.clear();
        self.width = None;
        self.children.clear();
    }

    /// Turns this node into a leaf of `kind` holding `payload`.
    pub fn set_leaf(&mut self, kind: TypeKind, payload: &[u8]) {
        debug_assert!(!kind.is_container(), "{kind} is not a leaf kind");
        self.clear();
        self.kind = kind;
        self.payload.append(payload);
    }

    /// Turns this node into an empty container of `kind`.
    pub fn set_container(&mut self, kind: TypeKind) {
        debug_assert!(kind.is_container(), "{kind} is not a container kind");
        self.clear();
        self.kind = kind;
    }

    /// Marks this node as an absent optional value.
    ///
    /// The payload holds a presence flag of `false` in the node's format.
    pub fn set_null(&mut self) {
        let presence: &[u8] = match self.format {
            Format::Binary => &[0; 4],
            Format::Text => b"false",
        };
        self.set_leaf(TypeKind::Null, presence);
    }

    /// Returns `true` if this node is an absent optional value.
    pub fn is_null(&self) -> bool {
        self.kind == TypeKind::Null
    }

    /// Fails with [Error::UnexpectedKind] unless this node is of `kind`.
    pub fn expect_kind(&self, kind: TypeKind) -> Result<(), Error> {
        if self.kind != kind {
            return Err(Error::UnexpectedKind {
                expected: kind,
                found: self.kind,
            });
        }
        Ok(())
    }

    fn payload_str(&self) -> Result<&str, Error> {
        std::str::from_utf8(&self.payload).map_err(|_| Error::InvalidUtf8)
    }

    /// Reads an integral leaf.
    ///
    /// Strings holding a decimal integer are accepted, since JSON carries integers wider than 64
    /// bits as strings.
    pub fn integer(&self) -> Result<Integer, Error> {
        if self.kind == TypeKind::String {
            let text = self.payload_str()?;
            return Integer::parse(text).ok_or_else(|| invalid("integral", text));
        }
        let TypeKind::Integral { signed } = self.kind else {
            return Err(Error::UnexpectedKind {
                expected: TypeKind::Integral { signed: false },
                found: self.kind,
            });
        };
        match self.format {
            Format::Binary => Integer::from_le(&self.payload, signed).ok_or_else(|| {
                invalid(
                    "integral",
                    format!("{} byte payload", self.payload.len()),
                )
            }),
            Format::Text => {
                let text = self.payload_str()?;
                Integer::parse(text).ok_or_else(|| invalid("integral", text))
            }
        }
    }

    /// Reads a numeric leaf as a float.
    ///
    /// Integral leaves are widened and strings are parsed, so non-finite values written as
    /// `"NaN"` or `"inf"` are accepted.
    pub fn float(&self) -> Result<f64, Error> {
        match (self.kind, self.format) {
            (TypeKind::FloatingPoint, Format::Binary) => match self.payload.len() {
                4 => {
                    let mut raw = [0; 4];
                    raw.copy_from_slice(&self.payload);
                    Ok(f32::from_le_bytes(raw) as f64)
                }
                8 => {
                    let mut raw = [0; 8];
                    raw.copy_from_slice(&self.payload);
                    Ok(f64::from_le_bytes(raw))
                }
                n => Err(invalid("floating-point", format!("{n} byte payload"))),
            },
            (TypeKind::Integral { .. }, _) => Ok(match self.integer()? {
                Integer::Signed(v) => v as f64,
                Integer::Unsigned(v) => v as f64,
            }),
            (TypeKind::FloatingPoint, Format::Text) | (TypeKind::String, _) => {
                let text = self.payload_str()?;
                text.parse().map_err(|_| invalid("floating-point", text))
            }
            (found, _) => Err(Error::UnexpectedKind {
                expected: TypeKind::FloatingPoint,
                found,
            }),
        }
    }

    /// Reads a boolean leaf.
    pub fn boolean(&self) -> Result<bool, Error> {
        self.expect_kind(TypeKind::Boolean)?;
        match (self.format, &self.payload[..]) {
            (Format::Binary, [0, 0, 0, 0] | [0]) => Ok(false),
            (Format::Binary, [1, 0, 0, 0] | [1]) => Ok(true),
            (Format::Text, b"false") => Ok(false),
            (Format::Text, b"true") => Ok(true),
            _ => Err(Error::InvalidBool),
        }
    }

    /// Reads a string leaf.
    pub fn text(&self) -> Result<&str, Error> {
        self.expect_kind(TypeKind::String)?;
        self.payload_str()
    }

    /// Reads a blob leaf.
    ///
    /// Text payloads (including strings parsed from JSON) are decoded from hex.
    pub fn blob(&self) -> Result<Cow<'_, [u8]>, Error> {
        match (self.kind, self.format) {
            (TypeKind::Blob, Format::Binary) => Ok(Cow::Borrowed(&self.payload)),
            (TypeKind::Blob, Format::Text) | (TypeKind::String, _) => {
                let text = self.payload_str()?;
                from_hex(text)
                    .map(Cow::Owned)
                    .ok_or_else(|| invalid("blob", "invalid hex"))
            }
            (found, _) => Err(Error::UnexpectedKind {
                expected: TypeKind::Blob,
                found,
            }),
        }
    }

    /// Renders a leaf as text, whatever its format.
    pub fn leaf_text(&self) -> Result<Cow<'_, str>, Error> {
        if self.format == Format::Text {
            if self.kind.is_container() {
                return Err(invalid("leaf", format!("{} node has no payload", self.kind)));
            }
            return self.payload_str().map(Cow::Borrowed);
        }
        Ok(match self.kind {
            TypeKind::String => Cow::Borrowed(self.payload_str()?),
            TypeKind::Boolean => Cow::Borrowed(if self.boolean()? { "true" } else { "false" }),
            TypeKind::Integral { .. } => Cow::Owned(self.integer()?.to_string()),
            TypeKind::FloatingPoint if self.payload.len() == 4 => {
                Cow::Owned((self.float()? as f32).to_string())
            }
            TypeKind::FloatingPoint => Cow::Owned(self.float()?.to_string()),
            TypeKind::Null => Cow::Borrowed("false"),
            TypeKind::Blob => Cow::Owned(hex(&self.payload)),
            kind => return Err(invalid("leaf", format!("{kind} node has no payload"))),
        })
    }

    // Converts a text leaf payload to its binary form.
    fn binary_payload(&self) -> Result<Vec<u8>, Error> {
        Ok(match self.kind {
            TypeKind::String => self.payload.to_vec(),
            TypeKind::Blob => self.blob()?.into_owned(),
            TypeKind::Boolean => (self.boolean()? as u32).to_le_bytes().to_vec(),
            TypeKind::Null => vec![0; 4],
            TypeKind::Integral { signed } => self
                .integer()?
                .to_le(signed, self.width)
                .ok_or_else(|| invalid("integral", self.payload_str().unwrap_or_default()))?,
            TypeKind::FloatingPoint if self.width == Some(4) => {
                (self.float()? as f32).to_le_bytes().to_vec()
            }
            TypeKind::FloatingPoint => self.float()?.to_le_bytes().to_vec(),
            TypeKind::Array | TypeKind::Object | TypeKind::SimpleMap => Vec::new(),
        })
    }

    /// Converts every leaf payload of the tree to `format` in place.
    ///
    /// A numeric leaf coerced from binary to text remembers its width, so coercing it back
    /// restores the original payload size. Numeric leaves without a known width (such as those
    /// parsed from JSON) become 8 bytes wide, or 16 for integers that do not fit in 64 bits.
    pub fn coerce(&mut self, format: Format) -> Result<(), Error> {
        if self.format != format && !self.kind.is_container() {
            let (payload, width) = match format {
                Format::Text => {
                    let numeric = matches!(
                        self.kind,
                        TypeKind::Integral { .. } | TypeKind::FloatingPoint
                    );
                    let width = numeric.then(|| self.payload.len());
                    (self.leaf_text()?.into_owned().into_bytes(), width)
                }
                Format::Binary => (self.binary_payload()?, None),
            };
            self.payload.clear();
            self.payload.append(&payload);
            self.width = width;
        }
        self.format = format;
        for child in &mut self.children {
            child.node.coerce(format)?;
        }
        Ok(())
    }

    fn read_at(buf: &mut impl Buf, arena: &Arena, depth: usize) -> Result<Self, Error> {
        if depth > MAX_DEPTH {
            return Err(invalid("dict", format!("nesting exceeds {MAX_DEPTH}")));
        }
        let code = u32::read(buf)?;
        let kind = TypeKind::from_code(code)
            .ok_or_else(|| invalid("dict", format!("unknown kind {code}")))?;
        let format = if bool::read(buf)? {
            Format::Binary
        } else {
            Format::Text
        };
        let mut node = Dict::with_arena(format, arena.clone());
        node.kind = kind;
        node.payload = ByteBuffer::read(buf)?;
        let len = read_length(buf)?;
        // Each child needs at least a name terminator and a header.
        at_least(buf, len)?;
        node.children.reserve(len);
        for _ in 0..len {
            let name = String::read(buf)?;
            let child = Self::read_at(buf, arena, depth + 1)?;
            node.push_child(name, child);
        }
        Ok(node)
    }
}

impl Default for Dict {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for Dict {
    fn clone(&self) -> Self {
        Self {
            payload: self.payload.clone(),
            kind: self.kind,
            format: self.format,
            width: self.width,
            children: self.children.clone(),
            index: OnceCell::new(),
            cursor: Cell::new(None),
            arena: self.arena.clone(),
        }
    }
}

impl PartialEq for Dict {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind
            && self.format == other.format
            && self.payload == other.payload
            && self.children == other.children
    }
}

impl fmt::Debug for Dict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.kind.is_container() {
            let mut map = f.debug_map();
            for (name, child) in self.children() {
                map.entry(&name, child);
            }
            return map.finish();
        }
        match self.leaf_text() {
            Ok(text) => write!(f, "{}({text:?})", self.kind),
            Err(_) => write!(f, "{}({:?})", self.kind, self.payload),
        }
    }
}

impl Write for Dict {
    fn write(&self, buf: &mut impl BufMut) {
        self.kind.code().write(buf);
        self.is_bin_format().write(buf);
        self.payload.write(buf);
        length_prefix(self.children.len()).write(buf);
        for child in &self.children {
            child.name.write(buf);
            child.node.write(buf);
        }
    }
}

impl EncodeSize for Dict {
    fn encode_size(&self) -> usize {
        u32::SIZE
            + bool::SIZE
            + self.payload.encode_size()
            + u32::SIZE
            + self
                .children
                .iter()
                .map(|child| child.name.encode_size() + child.node.encode_size())
                .sum::<usize>()
    }
}

impl Read for Dict {
    fn read(buf: &mut impl Buf) -> Result<Self, Error> {
        let arena = ArenaRegistry::global().arena_for::<Dict>();
        Self::read_at(buf, &arena, 0)
    }
}
