//! Non-owning cursor into a store.
//!
//! An [`Object`] is a small copyable `(store, schema, address)` triple.
//! Nesting is expressed through byte offsets into the parent's flat layout
//! (or into an array-pool item), so cursors never form ownership cycles.

use log::warn;

use crate::pool::ArrayId;
use crate::property::Property;
use crate::schema::{ObjectInfo, ObjectType, PropertyInfo};
use crate::store::{DataAddr, StoreRef};

#[derive(Clone)]
pub struct Object {
    store: StoreRef,
    prop: &'static PropertyInfo,
    info: &'static ObjectInfo,
    addr: DataAddr,
}

impl Object {
    /// Cursor over a store's root object.
    pub(crate) fn store_root(store: StoreRef) -> Self {
        let prop = store.prop_info();
        let info = prop
            .object_info()
            .expect("store descriptor must be an object");
        Self {
            store,
            prop,
            info,
            addr: DataAddr::Root { offset: 0 },
        }
    }

    fn child(&self, prop: &'static PropertyInfo) -> Option<Self> {
        let info = prop.object_info()?;
        Some(Self {
            store: self.store.clone(),
            prop,
            info,
            addr: self.addr.child(prop.offset),
        })
    }

    pub fn name(&self) -> &'static str {
        self.prop.name
    }

    /// Dotted diagnostic path: store name plus object name.
    pub fn path(&self) -> String {
        let store = self.store.name();
        match (store.is_empty(), self.name().is_empty()) {
            (true, _) => self.name().to_string(),
            (false, true) => store.to_string(),
            (false, false) => format!("{store}.{}", self.name()),
        }
    }

    pub fn type_info(&self) -> &'static ObjectInfo {
        self.info
    }

    pub fn otype(&self) -> ObjectType {
        self.info.otype
    }

    pub fn store(&self) -> &StoreRef {
        &self.store
    }

    /// True while the underlying store is held for update.
    pub fn is_writeable(&self) -> bool {
        self.store.is_locked()
    }

    /// Number of child objects this cursor exposes.
    ///
    /// A union exposes exactly one: the variant selected by its tag.
    pub fn object_count(&self) -> usize {
        match self.info.otype {
            ObjectType::Object => self.info.object_count as usize,
            ObjectType::Array => 0,
            ObjectType::ObjectArray => self.item_count(),
            ObjectType::Union => 1,
        }
    }

    pub fn get_object(&self, index: usize) -> Option<Object> {
        match self.info.otype {
            ObjectType::Object => self.child(self.info.object(index)?),
            ObjectType::Array => None,
            ObjectType::ObjectArray => {
                if index >= self.item_count() {
                    return None;
                }
                let item = self.info.item_type();
                Some(Self {
                    store: self.store.clone(),
                    prop: item,
                    info: item.object_info()?,
                    addr: DataAddr::Item {
                        id: self.array_id(),
                        index: index as u32,
                        offset: 0,
                    },
                })
            }
            ObjectType::Union => {
                if index != 0 {
                    return None;
                }
                self.child(self.info.object(self.tag()? as usize)?)
            }
        }
    }

    /// Number of leaf properties this cursor exposes.
    ///
    /// Arrays expose their items; unions hide the tag byte.
    pub fn property_count(&self) -> usize {
        match self.info.otype {
            ObjectType::Object => self.info.property_count as usize,
            ObjectType::Array => self.item_count(),
            ObjectType::ObjectArray | ObjectType::Union => 0,
        }
    }

    pub fn get_property(&self, index: usize) -> Option<Property> {
        match self.info.otype {
            ObjectType::Object => {
                let prop = self.info.property(index)?;
                Some(Property::new(
                    self.store.clone(),
                    prop,
                    self.addr.child(prop.offset),
                    default_slice(self.info, prop),
                ))
            }
            ObjectType::Array => {
                if index >= self.item_count() {
                    return None;
                }
                Some(Property::new(
                    self.store.clone(),
                    self.info.item_type(),
                    DataAddr::Item {
                        id: self.array_id(),
                        index: index as u32,
                        offset: 0,
                    },
                    None,
                ))
            }
            ObjectType::ObjectArray | ObjectType::Union => None,
        }
    }

    /// Looks up a child object by name, resolving aliases. On a union only
    /// the currently selected variant is reachable; use
    /// [`Object::select_variant`] to switch.
    pub fn find_object(&self, name: &str) -> Option<Object> {
        match self.info.otype {
            ObjectType::Object => self.child(self.info.object(self.info.find_object(name)?)?),
            ObjectType::Union => {
                let variant = self.get_object(0)?;
                (variant.name() == name).then_some(variant)
            }
            ObjectType::Array | ObjectType::ObjectArray => None,
        }
    }

    pub fn find_property(&self, name: &str) -> Option<Property> {
        match self.info.otype {
            ObjectType::Object => self.get_property(self.info.find_property(name)?),
            _ => None,
        }
    }

    /// Current variant tag of a union.
    pub fn tag(&self) -> Option<u8> {
        if self.info.otype != ObjectType::Union {
            return None;
        }
        let tag_prop = self.info.property(0)?;
        self.store
            .read_bytes(self.addr.child(tag_prop.offset), 1)
            .map(|b| b[0])
    }

    /// Selects a union variant and resets the variant storage to its
    /// defaults. Requires write access.
    pub fn set_tag(&self, tag: u8) -> bool {
        if self.info.otype != ObjectType::Union || tag as u32 >= self.info.object_count {
            return false;
        }
        let Some(tag_prop) = self.info.property(0) else {
            return false;
        };
        if !self
            .store
            .write_bytes(self.addr.child(tag_prop.offset), &[tag])
        {
            return false;
        }
        let Some(variant) = self.info.object(tag as usize) else {
            return false;
        };
        let Some(variant_info) = variant.object_info() else {
            return false;
        };
        let defaults = match variant_info.default_data {
            Some(bytes) => bytes.to_vec(),
            None => vec![0; variant_info.struct_size as usize],
        };
        self.store
            .write_bytes(self.addr.child(variant.offset), &defaults)
    }

    /// Switches a union to the named variant and returns its cursor.
    pub fn select_variant(&self, name: &str) -> Option<Object> {
        if self.info.otype != ObjectType::Union {
            return None;
        }
        let index = (0..self.info.object_count as usize)
            .position(|i| self.info.object(i).map(|p| p.name) == Some(name))?;
        if self.tag() != Some(index as u8) && !self.set_tag(index as u8) {
            return None;
        }
        self.get_object(0)
    }

    /// The pool slot backing an Array or ObjectArray, 0 when still absent.
    fn array_id(&self) -> ArrayId {
        if self.info.is_array() {
            self.store.read_u16(self.addr)
        } else {
            0
        }
    }

    /// Allocates the pool slot on first write.
    fn ensure_array_id(&self) -> ArrayId {
        let id = self.array_id();
        if id != 0 || !self.info.is_array() {
            return id;
        }
        if !self.store.write_check() {
            return 0;
        }
        let id = self.store.array_alloc(self.info.item_size());
        if id != 0 && !self.store.write_bytes(self.addr, &id.to_le_bytes()) {
            return 0;
        }
        id
    }

    pub fn item_count(&self) -> usize {
        match self.array_id() {
            0 => 0,
            id => self.store.array_len(id),
        }
    }

    /// Empties an array's items; the pool slot is kept for reuse.
    pub fn clear_items(&self) -> bool {
        if !self.info.is_array() {
            return false;
        }
        match self.array_id() {
            0 => self.store.write_check(),
            id => self.store.array_clear(id),
        }
    }

    /// Removes one item, shifting the tail. Later item cursors become
    /// invalid.
    pub fn remove_item(&self, index: usize) -> bool {
        match self.array_id() {
            0 => false,
            id => self.store.array_remove(id, index),
        }
    }

    /// Parses `value` with the element property type and appends it.
    pub fn add_item(&self, value: Option<&str>) -> bool {
        if self.info.otype != ObjectType::Array {
            return false;
        }
        let id = self.ensure_array_id();
        if id == 0 {
            return false;
        }
        let index = self.store.array_len(id);
        if !self.store.array_insert(id, index, None) {
            return false;
        }
        Property::new(
            self.store.clone(),
            self.info.item_type(),
            DataAddr::Item {
                id,
                index: index as u32,
                offset: 0,
            },
            None,
        )
        .set_from_text(value)
    }

    /// Appends a default-initialized item to an object array.
    pub fn add_object_item(&self) -> Option<Object> {
        self.insert_object_item(self.item_count())
    }

    pub fn insert_object_item(&self, index: usize) -> Option<Object> {
        if self.info.otype != ObjectType::ObjectArray {
            return None;
        }
        let id = self.ensure_array_id();
        if id == 0 {
            return None;
        }
        let defaults = self.info.item_type().object_info().and_then(|i| i.default_data);
        if !self.store.array_insert(id, index, defaults) {
            warn!("cannot insert into array '{}'", self.name());
            return None;
        }
        self.get_object(index)
    }

    /// Iterates child objects; for an object array these are its items.
    pub fn iter_objects(&self) -> impl Iterator<Item = Object> + '_ {
        (0..self.object_count()).filter_map(move |index| self.get_object(index))
    }

    /// Iterates leaf properties; for an array these are its items.
    pub fn iter_properties(&self) -> impl Iterator<Item = Property> + '_ {
        (0..self.property_count()).filter_map(move |index| self.get_property(index))
    }

    /// Finds the object-array item whose property `name` renders as `value`.
    pub fn select(&self, name: &str, value: &str) -> Option<Object> {
        if self.info.otype != ObjectType::ObjectArray {
            return None;
        }
        let item_info = self.info.item_type().object_info()?;
        let prop_index = item_info.find_property(name)?;
        self.iter_objects().find(|item| {
            item.get_property(prop_index)
                .and_then(|property| property.value_text())
                .is_some_and(|text| text == value)
        })
    }
}

/// Default bytes for one property, cut from its parent's default layout.
fn default_slice(info: &'static ObjectInfo, prop: &'static PropertyInfo) -> Option<&'static [u8]> {
    let defaults = info.default_data?;
    defaults.get(prop.offset as usize..prop.offset as usize + prop.size())
}
