//! Import engine: walks the schema in lock-step with the parser.
//!
//! The element stack mirrors the document's nesting. Unknown keys are logged
//! and skipped so a partially matching document still loads; only a store
//! that cannot be locked aborts the import.

use log::warn;

use crate::database::Database;
use crate::error::Result;
use crate::format::{Element, Listener};
use crate::object::Object;
use crate::schema::ObjectType;
use crate::store::StoreUpdater;

pub(crate) struct WriteStream {
    db: Option<Database>,
    /// Root object when importing into a single store or subtree.
    target: Option<Object>,
    /// Store currently being written in database mode; replaced (and thereby
    /// committed) when the document moves to another store.
    updater: Option<StoreUpdater>,
    stack: Vec<Option<Object>>,
}

impl WriteStream {
    /// Imports a document spanning the whole database.
    pub(crate) fn database(db: Database) -> Self {
        Self {
            db: Some(db),
            target: None,
            updater: None,
            stack: Vec::new(),
        }
    }

    /// Imports a document into one object subtree whose store is already
    /// writable.
    pub(crate) fn object(target: Object) -> Self {
        Self {
            db: None,
            target: Some(target),
            updater: None,
            stack: Vec::new(),
        }
    }

    /// Commits any store still open. Implicit on drop; explicit for sinks
    /// that want the result.
    pub(crate) fn finish(&mut self) {
        self.updater = None;
        self.stack.clear();
    }

    fn set_level(&mut self, level: usize, object: Option<Object>) {
        if self.stack.len() <= level {
            self.stack.resize_with(level + 1, || None);
        }
        self.stack[level] = object;
    }

    /// Opens `index` for update unless it is already the active store.
    /// Dropping the previous updater commits that store first.
    fn switch_store(&mut self, db: &Database, index: usize) -> Result<StoreUpdater> {
        if let Some(updater) = &self.updater {
            if updater.store_index() == index {
                return Ok(updater.clone());
            }
        }
        self.updater = None;
        let updater = db.open_store_for_update(index)?;
        self.updater = Some(updater.clone());
        Ok(updater)
    }

    /// Database-mode handling of a top-level key: a schema-root child object
    /// or property targets store 0; otherwise the key names a store.
    fn database_element(&mut self, db: &Database, element: &Element<'_>) -> Result<()> {
        let root_info = db
            .info()
            .store(0)
            .and_then(|info| info.object_info());
        let Some(root_info) = root_info else {
            return Ok(());
        };

        if element.is_container() && root_info.find_object(element.key).is_some() {
            let updater = self.switch_store(db, 0)?;
            let root = updater.root();
            let child = root.find_object(element.key);
            if let Some(child) = &child {
                if child.type_info().is_array() {
                    child.clear_items();
                }
            }
            self.set_level(0, Some(root));
            self.set_level(1, child);
            return Ok(());
        }

        if !element.is_container() {
            if root_info.find_property(element.key).is_some() {
                let updater = self.switch_store(db, 0)?;
                let root = updater.root();
                if let Some(property) = root.find_property(element.key) {
                    if !property.set_from_text(element.text()) {
                        warn!("cannot set '{}' from {:?}", element.key, element.value);
                    }
                }
                self.set_level(0, Some(root));
            } else {
                warn!("'{}' not in schema", element.key);
            }
            return Ok(());
        }

        // Moving to another store commits the current one.
        self.updater = None;
        let Some(index) = db.info().find_store(element.key) else {
            warn!("'{}' not in schema", element.key);
            self.set_level(1, None);
            return Ok(());
        };
        let updater = self.switch_store(db, index)?;
        self.set_level(1, Some(updater.root()));
        Ok(())
    }
}

impl Listener for WriteStream {
    fn start_element(&mut self, element: &Element<'_>) -> Result<()> {
        if element.level == 0 {
            self.stack.clear();
            let root = self.target.clone();
            self.set_level(0, root);
            return Ok(());
        }

        if element.level == 1 {
            if let Some(db) = self.db.clone() {
                return self.database_element(&db, element);
            }
        }

        let parent = match self.stack.get(element.level - 1) {
            Some(Some(parent)) => parent.clone(),
            // Inside a skipped subtree: keep skipping.
            _ => {
                if element.is_container() {
                    self.set_level(element.level, None);
                }
                return Ok(());
            }
        };

        if element.is_container() {
            let child = match parent.otype() {
                ObjectType::ObjectArray => parent.add_object_item(),
                ObjectType::Union => {
                    let variant = parent.select_variant(element.key);
                    if variant.is_none() {
                        warn!("variant '{}' not in schema", element.key);
                    }
                    variant
                }
                _ => match parent.find_object(element.key) {
                    Some(child) => {
                        // Replace semantics: a serialized array overwrites
                        // the stored one.
                        if child.type_info().is_array() {
                            child.clear_items();
                        }
                        Some(child)
                    }
                    None => {
                        warn!("object '{}' not in schema", element.key);
                        None
                    }
                },
            };
            self.set_level(element.level, child);
            return Ok(());
        }

        if parent.otype() == ObjectType::Array {
            if !parent.add_item(element.text()) {
                warn!("cannot append {:?} to '{}'", element.value, parent.name());
            }
            return Ok(());
        }

        match parent.find_property(element.key) {
            Some(property) => {
                if !property.set_from_text(element.text()) {
                    warn!("cannot set '{}' from {:?}", element.key, element.value);
                }
            }
            None => warn!("property '{}' not in schema", element.key),
        }
        Ok(())
    }
}
