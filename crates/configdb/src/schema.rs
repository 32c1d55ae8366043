//! Immutable schema descriptor tables.
//!
//! These tables are fixed at schema-generation time and shared read-only by
//! every store; the runtime only ever borrows them with `&'static` lifetime.
//! A database is an ordered sequence of stores, each described by a
//! [`PropertyInfo`] of object kind whose [`ObjectInfo`] fixes the byte layout
//! of the store's root data.
//!
//! Within an [`ObjectInfo`], `propinfo` lists child objects first, then
//! properties, then aliases. Union objects list their variants as child
//! objects and carry the one-byte tag as their single property.

use crate::number::Number;
use crate::pool::{ArrayId, StringId};

/// Property kinds with fixed storage sizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyType {
    Boolean,
    Int8,
    Int16,
    Int32,
    Int64,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    Number,
    String,
    Enum,
    Object,
    Alias,
}

impl PropertyType {
    /// Bytes this property occupies inside its parent's layout.
    pub const fn size(self) -> usize {
        match self {
            Self::Boolean | Self::Int8 | Self::UInt8 | Self::Enum => 1,
            Self::Int16 | Self::UInt16 => 2,
            Self::Int32 | Self::UInt32 | Self::Number => 4,
            Self::Int64 | Self::UInt64 => 8,
            Self::String => std::mem::size_of::<StringId>(),
            // Objects are laid out inline via their ObjectInfo; aliases
            // occupy no storage.
            Self::Object | Self::Alias => 0,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::Boolean => "Boolean",
            Self::Int8 => "Int8",
            Self::Int16 => "Int16",
            Self::Int32 => "Int32",
            Self::Int64 => "Int64",
            Self::UInt8 => "UInt8",
            Self::UInt16 => "UInt16",
            Self::UInt32 => "UInt32",
            Self::UInt64 => "UInt64",
            Self::Number => "Number",
            Self::String => "String",
            Self::Enum => "Enum",
            Self::Object => "Object",
            Self::Alias => "Alias",
        }
    }
}

/// Value table for an enum property. The stored byte is an index into the
/// table; the textual form is the value at that index.
#[derive(Debug)]
pub enum EnumValues {
    Strings(&'static [&'static str]),
    Integers(&'static [i64]),
    Numbers(&'static [Number]),
}

#[derive(Debug)]
pub struct EnumInfo {
    pub values: EnumValues,
}

impl EnumInfo {
    pub fn len(&self) -> usize {
        match self.values {
            EnumValues::Strings(v) => v.len(),
            EnumValues::Integers(v) => v.len(),
            EnumValues::Numbers(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub const fn is_string(&self) -> bool {
        matches!(self.values, EnumValues::Strings(_))
    }

    /// Renders the value at `index` to text.
    pub fn text(&self, index: usize) -> Option<String> {
        match self.values {
            EnumValues::Strings(v) => v.get(index).map(|s| (*s).to_string()),
            EnumValues::Integers(v) => v.get(index).map(|i| i.to_string()),
            EnumValues::Numbers(v) => v.get(index).map(|n| n.to_string()),
        }
    }

    /// Looks up a textual value, returning its index.
    pub fn find(&self, text: &str) -> Option<usize> {
        match self.values {
            EnumValues::Strings(v) => v.iter().position(|s| *s == text),
            EnumValues::Integers(v) => {
                let value: i64 = text.parse().ok()?;
                v.iter().position(|i| *i == value)
            }
            EnumValues::Numbers(v) => {
                let value = Number::parse(text)?;
                v.iter().position(|n| *n == value)
            }
        }
    }
}

/// Per-type payload of a property descriptor.
#[derive(Debug)]
pub enum PropertyVariant {
    None,
    /// Default text for a string property; stored id 0 falls back to it.
    DefaultString(&'static str),
    Enum(&'static EnumInfo),
    /// Inclusive clamp for signed integer properties.
    IntRange { min: i64, max: i64 },
    /// Inclusive clamp for unsigned integer properties.
    UIntRange { min: u64, max: u64 },
    /// Inclusive clamp for number properties.
    NumberRange { min: Number, max: Number },
    Object(&'static ObjectInfo),
}

/// Property metadata: type, name, and location within the parent layout.
///
/// For [`PropertyType::Alias`], `offset` is not a byte offset but the index
/// of the redirect target in the parent's combined `propinfo` table.
#[derive(Debug)]
pub struct PropertyInfo {
    pub ptype: PropertyType,
    pub name: &'static str,
    pub offset: u32,
    pub variant: PropertyVariant,
}

impl PropertyInfo {
    pub const fn object_info(&self) -> Option<&'static ObjectInfo> {
        match self.variant {
            PropertyVariant::Object(info) => Some(info),
            _ => None,
        }
    }

    pub const fn enum_info(&self) -> Option<&'static EnumInfo> {
        match self.variant {
            PropertyVariant::Enum(info) => Some(info),
            _ => None,
        }
    }

    pub const fn default_str(&self) -> Option<&'static str> {
        match self.variant {
            PropertyVariant::DefaultString(s) => Some(s),
            _ => None,
        }
    }

    pub const fn size(&self) -> usize {
        self.ptype.size()
    }

    /// True when the rendered value is quoted text.
    pub fn is_string_type(&self) -> bool {
        match self.ptype {
            PropertyType::String => true,
            PropertyType::Enum => self.enum_info().is_some_and(|e| e.is_string()),
            _ => false,
        }
    }
}

/// Object kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectType {
    /// Plain record of child objects and properties.
    Object,
    /// Homogeneous array of scalar items, described by a single property.
    Array,
    /// Homogeneous array of objects, described by a single child object.
    ObjectArray,
    /// Tagged variant: child objects are the alternatives, the single
    /// property is the one-byte tag selecting among them.
    Union,
}

/// Object layout descriptor.
#[derive(Debug)]
pub struct ObjectInfo {
    pub otype: ObjectType,
    /// Packed default bytes for the whole layout, or `None` for all-zero.
    pub default_data: Option<&'static [u8]>,
    /// Exact byte size of this object's data region.
    pub struct_size: u32,
    pub object_count: u32,
    pub property_count: u32,
    pub alias_count: u32,
    /// Child objects, then properties, then aliases.
    pub propinfo: &'static [PropertyInfo],
}

impl ObjectInfo {
    pub fn is_array(&self) -> bool {
        matches!(self.otype, ObjectType::Array | ObjectType::ObjectArray)
    }

    pub fn object(&self, index: usize) -> Option<&'static PropertyInfo> {
        if index < self.object_count as usize {
            self.propinfo.get(index)
        } else {
            None
        }
    }

    pub fn property(&self, index: usize) -> Option<&'static PropertyInfo> {
        if index < self.property_count as usize {
            self.propinfo.get(self.object_count as usize + index)
        } else {
            None
        }
    }

    /// Finds a child object by name, following aliases that redirect into
    /// the object range.
    pub fn find_object(&self, name: &str) -> Option<usize> {
        let objects = &self.propinfo[..self.object_count as usize];
        if let Some(i) = objects.iter().position(|p| p.name == name) {
            return Some(i);
        }
        let i = self.find_alias(name)?;
        (i < self.object_count as usize).then_some(i)
    }

    /// Finds a property by name, following aliases that redirect into the
    /// property range.
    pub fn find_property(&self, name: &str) -> Option<usize> {
        let first = self.object_count as usize;
        let properties = &self.propinfo[first..first + self.property_count as usize];
        if let Some(i) = properties.iter().position(|p| p.name == name) {
            return Some(i);
        }
        self.find_alias(name)?.checked_sub(first)
    }

    /// An alias's `offset` is its target index in the combined table.
    fn find_alias(&self, name: &str) -> Option<usize> {
        let first = (self.object_count + self.property_count) as usize;
        let aliases = &self.propinfo[first..first + self.alias_count as usize];
        aliases
            .iter()
            .find(|p| p.name == name)
            .map(|p| p.offset as usize)
    }

    /// The single item descriptor of an Array or ObjectArray.
    pub fn item_type(&self) -> &'static PropertyInfo {
        &self.propinfo[0]
    }

    /// Pool item size for Array and ObjectArray slots.
    pub fn item_size(&self) -> usize {
        match self.otype {
            ObjectType::ObjectArray => self
                .item_type()
                .object_info()
                .map_or(0, |info| info.struct_size as usize),
            _ => self.item_type().size(),
        }
    }
}

/// Ordered store list of one database.
#[derive(Debug)]
pub struct DatabaseInfo {
    pub name: &'static str,
    /// Store root descriptors; each is an object-kind property.
    pub stores: &'static [PropertyInfo],
}

impl DatabaseInfo {
    pub fn store_count(&self) -> usize {
        self.stores.len()
    }

    pub fn store(&self, index: usize) -> Option<&'static PropertyInfo> {
        self.stores.get(index)
    }

    pub fn find_store(&self, name: &str) -> Option<usize> {
        self.stores.iter().position(|s| s.name == name)
    }
}

/// Size marker kept next to the id types it documents.
const _: () = assert!(std::mem::size_of::<StringId>() == 2 && std::mem::size_of::<ArrayId>() == 2);
