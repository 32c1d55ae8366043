//! String-encoded paths through stores, objects and arrays.
//!
//! A pointer is a `/`-separated key list. The first key may name a store;
//! otherwise resolution starts at store 0. A key may carry a trailing
//! selector to address one item of an object array: `key[2]` by index, or
//! `key[name=value]` by matching the rendered value of the named property.

use crate::database::Database;
use crate::error::{FormatError, Result};
use crate::object::Object;
use crate::property::Property;

pub enum PointerTarget {
    Database,
    Object(Object),
    Property(Property),
}

/// Resolves `path` against `db`. An empty path resolves to the database
/// itself; a trailing key may name a property.
pub fn resolve(db: &Database, path: &str) -> Result<PointerTarget> {
    let path = path.strip_prefix('/').unwrap_or(path);
    let mut keys = path.split('/').filter(|k| !k.is_empty()).peekable();

    if keys.peek().is_none() {
        return Ok(PointerTarget::Database);
    }

    let store_index = match db.info().find_store(keys.peek().copied().unwrap_or_default()) {
        Some(index) => {
            keys.next();
            index
        }
        None => 0,
    };

    let store = db.open_store(store_index)?;
    let mut object = store.root();

    while let Some(key) = keys.next() {
        let (key, selector) = split_selector(key)?;

        if let Some(child) = object.find_object(key) {
            object = match selector {
                Some(selector) => select_item(&child, selector)?,
                None => child,
            };
            continue;
        }

        // A property key is only valid at the end of the path.
        if selector.is_none() {
            if let Some(property) = object.find_property(key) {
                if keys.next().is_none() {
                    return Ok(PointerTarget::Property(property));
                }
                return Err(FormatError::BadProperty.into());
            }
        }

        return Err(FormatError::NotInSchema.into());
    }

    Ok(PointerTarget::Object(object))
}

/// Splits `key[selector]` into key and selector text.
fn split_selector(key: &str) -> Result<(&str, Option<&str>), FormatError> {
    let Some(open) = key.find('[') else {
        return Ok((key, None));
    };
    let Some(inner) = key[open..].strip_prefix('[').and_then(|s| s.strip_suffix(']')) else {
        return Err(FormatError::BadSelector);
    };
    Ok((&key[..open], Some(inner)))
}

fn select_item(array: &Object, selector: &str) -> Result<Object> {
    if let Ok(index) = selector.parse::<usize>() {
        return array
            .get_object(index)
            .ok_or_else(|| FormatError::BadIndex.into());
    }
    let Some((name, value)) = selector.split_once('=') else {
        return Err(FormatError::BadSelector.into());
    };
    let item_info = array
        .type_info()
        .item_type()
        .object_info()
        .ok_or(FormatError::BadSelector)?;
    if item_info.find_property(name).is_none() {
        return Err(FormatError::BadSelector.into());
    }
    array
        .select(name, value)
        .ok_or_else(|| FormatError::BadIndex.into())
}
