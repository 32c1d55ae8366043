//! Store: one persisted unit of configuration, conceptually one file.
//!
//! A store owns a root-data buffer laid out per its schema plus the two
//! pools backing variable-length values. Mutation requires the store to be
//! held for update ([`StoreUpdater`]); when the last updater releases, the
//! store commits itself through the database's format.

use std::cell::{Cell, RefCell};
use std::fs;
use std::io;
use std::path::PathBuf;
use std::rc::{Rc, Weak};

use log::{debug, error, warn};

use crate::database::DatabaseShared;
use crate::error::Result;
use crate::object::Object;
use crate::pool::{ArrayId, ArrayPool, StringId, StringPool};
use crate::schema::{ObjectType, PropertyInfo};

/// File name used for a store whose schema name is empty.
pub const ROOT_STORE_FILE_NAME: &str = "_root";

/// Location of a value inside a store: either in the fixed root-data region
/// or inside an array-pool item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DataAddr {
    Root { offset: u32 },
    Item { id: ArrayId, index: u32, offset: u32 },
}

impl DataAddr {
    /// Address of a field `delta` bytes into this region.
    pub(crate) fn child(self, delta: u32) -> Self {
        match self {
            Self::Root { offset } => Self::Root { offset: offset + delta },
            Self::Item { id, index, offset } => Self::Item {
                id,
                index,
                offset: offset + delta,
            },
        }
    }
}

pub struct Store {
    db: Weak<DatabaseShared>,
    store_index: usize,
    info: &'static PropertyInfo,
    root_data: RefCell<Vec<u8>>,
    array_pool: RefCell<ArrayPool>,
    string_pool: RefCell<StringPool>,
    dirty: Cell<bool>,
    updaters: Cell<u32>,
}

impl Store {
    pub(crate) fn new(db: Weak<DatabaseShared>, store_index: usize, info: &'static PropertyInfo) -> Self {
        let store = Self {
            db,
            store_index,
            info,
            root_data: RefCell::new(Vec::new()),
            array_pool: RefCell::new(ArrayPool::default()),
            string_pool: RefCell::new(StringPool::default()),
            dirty: Cell::new(false),
            updaters: Cell::new(0),
        };
        store.init_root_data();
        store
    }

    /// Copy-on-write clone: same schema slot, deep-copied data and pools,
    /// clean and unlocked.
    pub(crate) fn deep_copy(&self) -> Self {
        Self {
            db: self.db.clone(),
            store_index: self.store_index,
            info: self.info,
            root_data: RefCell::new(self.root_data.borrow().clone()),
            array_pool: RefCell::new(self.array_pool.borrow().clone()),
            string_pool: RefCell::new(self.string_pool.borrow().clone()),
            dirty: Cell::new(false),
            updaters: Cell::new(0),
        }
    }

    fn init_root_data(&self) {
        let info = self
            .info
            .object_info()
            .expect("store descriptor must be an object");
        let mut data = match info.default_data {
            Some(defaults) => defaults.to_vec(),
            None => vec![0; info.struct_size as usize],
        };
        data.resize(info.struct_size as usize, 0);
        if info.otype == ObjectType::Array || info.otype == ObjectType::ObjectArray {
            // An array-typed root keeps its pool slot id at offset 0.
            let id = self.array_pool.borrow_mut().add(info.item_size());
            data[..2].copy_from_slice(&id.to_le_bytes());
        }
        *self.root_data.borrow_mut() = data;
    }

    /// Empties both pools and re-initializes root data from schema defaults.
    pub(crate) fn reset_to_defaults(&self) {
        self.string_pool.borrow_mut().clear();
        self.array_pool.borrow_mut().clear();
        self.init_root_data();
    }

    pub(crate) fn store_index(&self) -> usize {
        self.store_index
    }

    pub(crate) fn prop_info(&self) -> &'static PropertyInfo {
        self.info
    }

    pub(crate) fn database(&self) -> Option<Rc<DatabaseShared>> {
        self.db.upgrade()
    }

    pub fn name(&self) -> &'static str {
        self.info.name
    }

    /// Stem of the file backing this store; the root store uses a sentinel.
    pub fn file_name(&self) -> &'static str {
        if self.info.name.is_empty() {
            ROOT_STORE_FILE_NAME
        } else {
            self.info.name
        }
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty.get()
    }

    pub(crate) fn clear_dirty(&self) {
        self.dirty.set(false);
    }

    /// A store is locked while any updater holds it.
    pub fn is_locked(&self) -> bool {
        self.updaters.get() != 0
    }

    pub(crate) fn inc_updaters(&self) {
        self.updaters.set(self.updaters.get() + 1);
    }

    pub(crate) fn dec_updaters(&self) -> u32 {
        // Zero happens when an earlier lock attempt failed; nothing to undo.
        let count = self.updaters.get();
        if count == 0 {
            return 0;
        }
        self.updaters.set(count - 1);
        count - 1
    }

    /// Gate for every mutation.
    pub(crate) fn write_check(&self) -> bool {
        if self.is_locked() {
            return true;
        }
        error!("store '{}' is read-only", self.file_name());
        false
    }

    pub(crate) fn read_bytes(&self, addr: DataAddr, len: usize) -> Option<Vec<u8>> {
        match addr {
            DataAddr::Root { offset } => {
                let data = self.root_data.borrow();
                data.get(offset as usize..offset as usize + len).map(<[u8]>::to_vec)
            }
            DataAddr::Item { id, index, offset } => {
                let pool = self.array_pool.borrow();
                let item = pool.get(id)?.get(index as usize)?;
                item.get(offset as usize..offset as usize + len).map(<[u8]>::to_vec)
            }
        }
    }

    /// Writes raw bytes at `addr`, marking the store dirty. Fails without an
    /// updater or when the address is out of bounds.
    pub(crate) fn write_bytes(&self, addr: DataAddr, bytes: &[u8]) -> bool {
        if !self.write_check() {
            return false;
        }
        let written = match addr {
            DataAddr::Root { offset } => {
                let mut data = self.root_data.borrow_mut();
                match data.get_mut(offset as usize..offset as usize + bytes.len()) {
                    Some(slot) => {
                        slot.copy_from_slice(bytes);
                        true
                    }
                    None => false,
                }
            }
            DataAddr::Item { id, index, offset } => {
                let mut pool = self.array_pool.borrow_mut();
                let slot = pool
                    .get_mut(id)
                    .and_then(|array| array.get_mut(index as usize))
                    .and_then(|item| item.get_mut(offset as usize..offset as usize + bytes.len()));
                match slot {
                    Some(slot) => {
                        slot.copy_from_slice(bytes);
                        true
                    }
                    None => false,
                }
            }
        };
        if written {
            self.dirty.set(true);
        }
        written
    }

    pub(crate) fn read_u16(&self, addr: DataAddr) -> u16 {
        self.read_bytes(addr, 2)
            .map(|b| u16::from_le_bytes([b[0], b[1]]))
            .unwrap_or(0)
    }

    pub(crate) fn string_get(&self, id: StringId) -> Option<String> {
        let pool = self.string_pool.borrow();
        pool.get(id).map(|bytes| String::from_utf8_lossy(bytes).into_owned())
    }

    pub(crate) fn string_intern(&self, value: &str) -> StringId {
        self.string_pool.borrow_mut().find_or_add(value.as_bytes())
    }

    /// Read-only view of the string arena.
    pub fn with_string_pool<R>(&self, f: impl FnOnce(&StringPool) -> R) -> R {
        f(&self.string_pool.borrow())
    }

    pub(crate) fn array_alloc(&self, item_size: usize) -> ArrayId {
        self.array_pool.borrow_mut().add(item_size)
    }

    pub(crate) fn array_len(&self, id: ArrayId) -> usize {
        self.array_pool.borrow().get(id).map_or(0, |a| a.len())
    }

    pub(crate) fn array_insert(&self, id: ArrayId, index: usize, src: Option<&[u8]>) -> bool {
        if !self.write_check() {
            return false;
        }
        let inserted = self
            .array_pool
            .borrow_mut()
            .get_mut(id)
            .is_some_and(|array| array.insert(index, src));
        if inserted {
            self.dirty.set(true);
        }
        inserted
    }

    pub(crate) fn array_remove(&self, id: ArrayId, index: usize) -> bool {
        if !self.write_check() {
            return false;
        }
        let removed = self
            .array_pool
            .borrow_mut()
            .get_mut(id)
            .is_some_and(|array| array.remove(index));
        if removed {
            self.dirty.set(true);
        }
        removed
    }

    pub(crate) fn array_clear(&self, id: ArrayId) -> bool {
        if !self.write_check() {
            return false;
        }
        if let Some(array) = self.array_pool.borrow_mut().get_mut(id) {
            array.clear();
            self.dirty.set(true);
            true
        } else {
            false
        }
    }

    /// True when every array-pool slot is empty.
    pub fn array_pool_is_empty(&self) -> bool {
        let pool = self.array_pool.borrow();
        (1..=pool.len() as ArrayId).all(|id| pool.get(id).map_or(true, |a| a.is_empty()))
    }

    pub fn string_pool_is_empty(&self) -> bool {
        self.string_pool.borrow().is_empty()
    }
}

/// Shared read reference to a store.
///
/// The store stays alive while any reference or cache slot holds it; when
/// the last external reference drops, the owning database schedules an idle
/// cache sweep.
pub struct StoreRef {
    store: Rc<Store>,
}

impl StoreRef {
    pub(crate) fn new(store: Rc<Store>) -> Self {
        Self { store }
    }

    pub(crate) fn rc(&self) -> &Rc<Store> {
        &self.store
    }

    /// Rebinds this reference without running release hooks, mirroring
    /// cache adoption during locking.
    pub(crate) fn rebind(&mut self, store: Rc<Store>) {
        self.store = store;
    }

    /// Cursor over the store's root object.
    pub fn root(&self) -> Object {
        Object::store_root(self.clone())
    }

    /// Locks this store for update, rebinding `self` to the writable copy.
    ///
    /// Fails with [`crate::Error::UpdateConflict`] while another writer is
    /// active. Nested updates on an already-held store succeed.
    pub fn update(&mut self) -> Result<StoreUpdater> {
        let db = self.store.database().ok_or(crate::Error::UpdateConflict)?;
        db.lock_store(self)
    }
}

impl std::ops::Deref for StoreRef {
    type Target = Store;

    fn deref(&self) -> &Store {
        &self.store
    }
}

impl Clone for StoreRef {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
        }
    }
}

impl Drop for StoreRef {
    fn drop(&mut self) {
        if let Some(db) = self.store.database() {
            db.check_store_ref(&self.store);
        }
    }
}

/// Scoped write handle: holding one marks the store locked; dropping the
/// last one commits the store and drains the update queue.
pub struct StoreUpdater {
    store: StoreRef,
}

impl StoreUpdater {
    pub(crate) fn new(store: StoreRef) -> Self {
        store.inc_updaters();
        Self { store }
    }

    /// Writable cursor over the store's root object.
    pub fn root(&self) -> Object {
        self.store.root()
    }

    pub fn store(&self) -> &StoreRef {
        &self.store
    }

    /// Resets the store to schema defaults, emptying both pools.
    pub fn clear(&self) {
        if !self.store.write_check() {
            return;
        }
        self.store.reset_to_defaults();
        self.store.dirty.set(true);
    }

    /// Persists now when dirty; normally implicit on last release.
    pub fn commit(&self) -> Result<()> {
        commit_store(self.store.rc())
    }
}

impl std::ops::Deref for StoreUpdater {
    type Target = StoreRef;

    fn deref(&self) -> &StoreRef {
        &self.store
    }
}

impl Clone for StoreUpdater {
    fn clone(&self) -> Self {
        Self::new(self.store.clone())
    }
}

impl Drop for StoreUpdater {
    fn drop(&mut self) {
        if self.store.dec_updaters() == 0 {
            if let Err(err) = commit_store(self.store.rc()) {
                error!("commit of store '{}' failed: {err}", self.store.file_name());
            }
            if let Some(db) = self.store.database() {
                db.check_update_queue(&self.store);
            }
        }
    }
}

/// Commits `store` if dirty: persist through the database's format, then
/// clear the dirty flag. The flag stays set when persisting fails so a later
/// release can retry.
pub(crate) fn commit_store(store: &Rc<Store>) -> Result<()> {
    if !store.is_dirty() {
        return Ok(());
    }
    let Some(db) = store.database() else {
        warn!("store '{}' has no database, not persisted", store.file_name());
        return Ok(());
    };
    db.save_store(store)?;
    store.clear_dirty();
    Ok(())
}

/// Full path of the store's backing file, extension per format.
pub(crate) fn store_file_path(store: &Store, db: &DatabaseShared) -> PathBuf {
    db.path()
        .join(format!("{}{}", store.file_name(), db.format().extension()))
}

/// Writes the store to disk with best-effort atomic replacement: the new
/// content lands in `<file>.new`, the previous file is parked as
/// `<file>.old`, then `.new` is renamed into place.
pub(crate) fn save_to_file(store: &Rc<Store>, db: &DatabaseShared) -> Result<()> {
    let path = store_file_path(store, db);
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)?;
    }

    let new_path = path.with_extension(extended(&path, "new"));
    let old_path = path.with_extension(extended(&path, "old"));

    let mut file = fs::File::create(&new_path)?;
    let object = StoreRef::new(store.clone()).root();
    let options = crate::format::ExportOptions {
        root_style: crate::format::RootStyle::Braces,
        ..Default::default()
    };
    db.format().export_object(&object, &mut file, &options)?;
    file.sync_all()?;
    drop(file);

    let _ = fs::remove_file(&old_path);
    let _ = fs::rename(&path, &old_path);
    fs::rename(&new_path, &path)?;

    debug!("store saved to '{}'", path.display());
    Ok(())
}

/// Loads the store's file, adopting `<file>.old` when the primary is missing
/// (recovery from an interrupted replacement). A missing file leaves the
/// schema defaults in place and succeeds.
///
/// The caller must hold the store locked so imported values pass the write
/// check.
pub(crate) fn load_from_file(store: &Rc<Store>, db: &DatabaseShared) -> Result<()> {
    let path = store_file_path(store, db);
    let old_path = path.with_extension(extended(&path, "old"));

    let mut file = match fs::File::open(&path) {
        Ok(file) => file,
        Err(err) if err.kind() == io::ErrorKind::NotFound => match fs::File::open(&old_path) {
            Ok(file) => {
                warn!("adopting '{}' after interrupted save", old_path.display());
                file
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(()),
            Err(err) => return Err(err.into()),
        },
        Err(err) => return Err(err.into()),
    };

    let object = StoreRef::new(store.clone()).root();
    db.format().import_object(&object, &mut file)
}

/// Appends to an existing extension rather than replacing it, so
/// `config.json` becomes `config.json.new`.
fn extended(path: &std::path::Path, suffix: &str) -> String {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => format!("{ext}.{suffix}"),
        None => suffix.to_string(),
    }
}
