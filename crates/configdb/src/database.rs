//! Database handle: store lifecycle, cache slots, and the lock manager.
//!
//! Each database keeps a one-slot read cache and a one-slot write cache.
//! Readers share the cached snapshot; a writer either adopts the write
//! cache, promotes a sole-owner snapshot, or works on a copy-on-write clone
//! while existing readers keep their snapshot. Deferred work (queued updates,
//! idle cache eviction) lands on a per-database ready queue drained by
//! [`Database::poll`], the single-threaded stand-in for an event loop.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::rc::{Rc, Weak};

use log::{debug, warn};

use crate::error::{Error, Result};
use crate::format::{ExportOptions, Format, RootStyle};
use crate::json::Json;
use crate::pointer::{self, PointerTarget};
use crate::schema::DatabaseInfo;
use crate::store::{self, Store, StoreRef, StoreUpdater};

/// Callback invoked with a live updater once the store becomes writable.
pub type UpdateCallback = Box<dyn FnOnce(StoreUpdater)>;

struct QueuedUpdate {
    store_index: usize,
    callback: UpdateCallback,
}

/// Deferred work posted to the ready queue.
enum Task {
    /// Coalesced idle-cache sweep.
    CacheSweep,
    /// Re-open `store_index` for update and run the oldest queued callback.
    RunUpdate { store_index: usize },
}

pub(crate) struct DatabaseShared {
    info: &'static DatabaseInfo,
    path: PathBuf,
    format: &'static dyn Format,
    read_cache: RefCell<Option<Rc<Store>>>,
    write_cache: RefCell<Option<Rc<Store>>>,
    /// Current writer per store, if any; weak so an abandoned writer does
    /// not pin its store.
    update_refs: RefCell<Vec<Weak<Store>>>,
    update_queue: RefCell<VecDeque<QueuedUpdate>>,
    ready: RefCell<VecDeque<Task>>,
    sweep_queued: Cell<bool>,
}

impl DatabaseShared {
    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    pub(crate) fn format(&self) -> &'static dyn Format {
        self.format
    }

    pub(crate) fn info(&self) -> &'static DatabaseInfo {
        self.info
    }

    /// Opens a store for shared reading.
    ///
    /// Priority: a clean write cache is stolen (or deep-copied while its
    /// writer is still active), then the read cache, then a load from file
    /// or schema defaults.
    pub(crate) fn open_store(self: &Rc<Self>, index: usize) -> Result<StoreRef> {
        let info = self
            .info
            .store(index)
            .ok_or(crate::FormatError::BadIndex)?;

        // The write cache holds the most recent data; use it once committed.
        let write_cached = self.write_cache.borrow().clone();
        if let Some(cached) = write_cached {
            if cached.store_index() == index && !cached.is_dirty() {
                if cached.is_locked() {
                    // Active updaters keep their copy; readers get a clone.
                    let copy = Rc::new(cached.deep_copy());
                    *self.read_cache.borrow_mut() = Some(copy.clone());
                    return Ok(StoreRef::new(copy));
                }
                *self.read_cache.borrow_mut() = Some(cached.clone());
                *self.write_cache.borrow_mut() = None;
                return Ok(StoreRef::new(cached));
            }
        }

        let read_cached = self.read_cache.borrow().clone();
        if let Some(cached) = read_cached {
            if cached.store_index() == index {
                debug_assert!(!cached.is_locked());
                return Ok(StoreRef::new(cached));
            }
        }

        *self.read_cache.borrow_mut() = None;
        let loaded = self.load_store(index, info);
        *self.read_cache.borrow_mut() = Some(loaded.clone());
        Ok(StoreRef::new(loaded))
    }

    pub(crate) fn open_store_for_update(self: &Rc<Self>, index: usize) -> Result<StoreUpdater> {
        let mut store = self.open_store(index)?;
        self.lock_store(&mut store)
    }

    /// Grants exclusive write access to the referenced store, rebinding the
    /// caller's reference to the writable instance.
    pub(crate) fn lock_store(self: &Rc<Self>, store_ref: &mut StoreRef) -> Result<StoreUpdater> {
        let store = store_ref.rc().clone();

        // Nested update on a store already held by a writer.
        if store.is_locked() {
            *self.write_cache.borrow_mut() = Some(store);
            return Ok(StoreUpdater::new(store_ref.clone()));
        }

        let index = store.store_index();

        if let Some(writer) = self.update_refs.borrow()[index].upgrade() {
            if writer.is_locked() {
                warn!("store '{}' is locked, cannot write", store.file_name());
                return Err(Error::UpdateConflict);
            }
        }

        // A clean writable instance already exists: adopt it.
        let write_cached = self.write_cache.borrow().clone();
        if let Some(cached) = write_cached {
            if cached.store_index() == index {
                store_ref.rebind(cached.clone());
                self.update_refs.borrow_mut()[index] = Rc::downgrade(&cached);
                return Ok(StoreUpdater::new(store_ref.clone()));
            }
        }

        // If no one else shares this instance we can write to it directly.
        let read_cache_holds = self
            .read_cache
            .borrow()
            .as_ref()
            .map_or(false, |cached| Rc::ptr_eq(cached, &store));
        let mut use_count = Rc::strong_count(&store) - 1; // discount our local clone
        if read_cache_holds {
            use_count -= 1;
        }
        if use_count <= 1 {
            self.update_refs.borrow_mut()[index] = Rc::downgrade(&store);
            *self.write_cache.borrow_mut() = Some(store);
            if read_cache_holds {
                *self.read_cache.borrow_mut() = None;
            }
            return Ok(StoreUpdater::new(store_ref.clone()));
        }

        // Dispose of idle read cache before allocating the copy.
        let read_idle = self
            .read_cache
            .borrow()
            .as_ref()
            .map_or(false, |cached| Rc::strong_count(cached) == 1);
        if read_idle {
            *self.read_cache.borrow_mut() = None;
        }

        // Shared elsewhere: copy-on-write so readers keep their snapshot.
        let copy = Rc::new(store.deep_copy());
        store_ref.rebind(copy.clone());
        self.update_refs.borrow_mut()[index] = Rc::downgrade(&copy);
        *self.write_cache.borrow_mut() = Some(copy);
        Ok(StoreUpdater::new(store_ref.clone()))
    }

    /// Loads a store from its file, falling back to schema defaults on any
    /// failure.
    fn load_store(self: &Rc<Self>, index: usize, info: &'static crate::schema::PropertyInfo) -> Rc<Store> {
        debug!("load store '{}'", info.name);

        let store = Rc::new(Store::new(Rc::downgrade(self), index, info));
        store.inc_updaters();
        if let Err(err) = store::load_from_file(&store, self) {
            warn!("loading store '{}' failed ({err}), using defaults", store.file_name());
            store.reset_to_defaults();
        }
        store.dec_updaters();
        store.clear_dirty();
        store
    }

    /// Persists a store and refreshes the write cache with the most recent
    /// writer instance.
    pub(crate) fn save_store(&self, store: &Rc<Store>) -> Result<()> {
        debug!("save store '{}'", store.file_name());
        let result = store::save_to_file(store, self);
        if let Some(writer) = self.update_refs.borrow()[store.store_index()].upgrade() {
            *self.write_cache.borrow_mut() = Some(writer);
        }
        result
    }

    /// Called when a `StoreRef` drops: if the cached store just lost its
    /// last external reference, schedule a coalesced idle sweep.
    pub(crate) fn check_store_ref(&self, store: &Rc<Store>) {
        let mut cached = false;
        let mut use_count = Rc::strong_count(store);
        if self
            .read_cache
            .borrow()
            .as_ref()
            .map_or(false, |c| Rc::ptr_eq(c, store))
        {
            cached = true;
            use_count -= 1;
        }
        if self
            .write_cache
            .borrow()
            .as_ref()
            .map_or(false, |c| Rc::ptr_eq(c, store))
        {
            cached = true;
            use_count -= 1;
        }
        if !cached || use_count != 1 {
            return;
        }
        if self.sweep_queued.replace(true) {
            return;
        }
        self.ready.borrow_mut().push_back(Task::CacheSweep);
    }

    /// Called when the last updater of `store` releases: retire the stale
    /// read snapshot and schedule the oldest queued update, if any.
    pub(crate) fn check_update_queue(&self, store: &Store) {
        let index = store.store_index();

        let read_stale = self
            .read_cache
            .borrow()
            .as_ref()
            .map_or(false, |cached| cached.store_index() == index);
        if read_stale {
            *self.read_cache.borrow_mut() = None;
        }

        let queued = self
            .update_queue
            .borrow()
            .iter()
            .any(|item| item.store_index == index);
        if queued {
            self.ready.borrow_mut().push_back(Task::RunUpdate { store_index: index });
        }
    }

    fn run_task(self: &Rc<Self>, task: Task) {
        match task {
            Task::CacheSweep => {
                self.sweep_queued.set(false);
                if !self.update_queue.borrow().is_empty() {
                    return;
                }
                let read_idle = self
                    .read_cache
                    .borrow()
                    .as_ref()
                    .map_or(false, |c| Rc::strong_count(c) == 1);
                if read_idle {
                    *self.read_cache.borrow_mut() = None;
                }
                let write_idle = self
                    .write_cache
                    .borrow()
                    .as_ref()
                    .map_or(false, |c| Rc::strong_count(c) == 1);
                if write_idle {
                    *self.write_cache.borrow_mut() = None;
                }
            }
            Task::RunUpdate { store_index } => {
                let position = self
                    .update_queue
                    .borrow()
                    .iter()
                    .position(|item| item.store_index == store_index);
                let Some(position) = position else {
                    return;
                };
                let Some(item) = self.update_queue.borrow_mut().remove(position) else {
                    return;
                };
                match self.open_store_for_update(store_index) {
                    Ok(updater) => (item.callback)(updater),
                    Err(err) => warn!("queued update for store {store_index} failed: {err}"),
                }
            }
        }
    }
}

/// Handle to one configuration database: a directory of store files plus the
/// immutable schema describing them.
///
/// Cloning is cheap; all clones share the caches and queues.
#[derive(Clone)]
pub struct Database {
    shared: Rc<DatabaseShared>,
}

impl Database {
    /// Binds `info` to a filesystem directory, using the reference JSON
    /// format.
    pub fn new(path: impl Into<PathBuf>, info: &'static DatabaseInfo) -> Self {
        Self::with_format(path, info, &Json)
    }

    pub fn with_format(
        path: impl Into<PathBuf>,
        info: &'static DatabaseInfo,
        format: &'static dyn Format,
    ) -> Self {
        let shared = Rc::new(DatabaseShared {
            info,
            path: path.into(),
            format,
            read_cache: RefCell::new(None),
            write_cache: RefCell::new(None),
            update_refs: RefCell::new(vec![Weak::new(); info.store_count()]),
            update_queue: RefCell::new(VecDeque::new()),
            ready: RefCell::new(VecDeque::new()),
            sweep_queued: Cell::new(false),
        });
        Self { shared }
    }

    pub(crate) fn shared(&self) -> &Rc<DatabaseShared> {
        &self.shared
    }

    pub fn info(&self) -> &'static DatabaseInfo {
        self.shared.info
    }

    pub fn path(&self) -> &Path {
        &self.shared.path
    }

    /// Database name, derived from the last path component.
    pub fn name(&self) -> String {
        self.shared
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    pub fn store_count(&self) -> usize {
        self.shared.info.store_count()
    }

    pub fn format(&self) -> &'static dyn Format {
        self.shared.format
    }

    /// Opens a store for shared reading; see [`DatabaseShared::open_store`].
    pub fn open_store(&self, index: usize) -> Result<StoreRef> {
        self.shared.open_store(index)
    }

    /// Opens a store for exclusive update.
    ///
    /// Returns [`Error::UpdateConflict`] immediately (never waits) while a
    /// different writer holds the store; use [`Database::queue_update`] to
    /// be called back instead.
    pub fn open_store_for_update(&self, index: usize) -> Result<StoreUpdater> {
        self.shared.open_store_for_update(index)
    }

    /// Queues `callback` to run with a live updater once the store's current
    /// writer releases. Callbacks for the same store run in FIFO order on a
    /// later [`Database::poll`] turn.
    pub fn queue_update(&self, store_index: usize, callback: impl FnOnce(StoreUpdater) + 'static) {
        self.shared.update_queue.borrow_mut().push_back(QueuedUpdate {
            store_index,
            callback: Box::new(callback),
        });
    }

    /// Number of callbacks still waiting for their store.
    pub fn pending_updates(&self) -> usize {
        self.shared.update_queue.borrow().len()
    }

    /// Drains the ready queue: runs scheduled queued-update callbacks and
    /// idle cache sweeps. Returns true when any task ran.
    ///
    /// This is the cooperative event-loop turn; hosts with a real event loop
    /// would call it once per tick.
    pub fn poll(&self) -> bool {
        let mut ran = false;
        loop {
            let task = self.shared.ready.borrow_mut().pop_front();
            let Some(task) = task else {
                break;
            };
            ran = true;
            self.shared.run_task(task);
        }
        ran
    }

    /// Serializes the whole database to one file.
    pub fn export_to_file(&self, filename: impl AsRef<Path>, options: &ExportOptions) -> Result<u64> {
        let filename = filename.as_ref();
        let mut file = fs::File::create(filename)?;
        let written = self.shared.format.export_database(self, &mut file, options)?;
        debug!("database saved to '{}'", filename.display());
        Ok(written)
    }

    /// Imports a document spanning any subset of the database's stores.
    pub fn import_from_file(&self, filename: impl AsRef<Path>) -> Result<()> {
        let filename = filename.as_ref();
        let mut file = fs::File::open(filename).map_err(|err| {
            warn!("open '{}' failed: {err}", filename.display());
            Error::File(err)
        })?;
        self.shared.format.import_database(self, &mut file)
    }

    /// Creates a streaming exporter for the subtree at `path` (a pointer
    /// path; empty exports the whole database).
    pub fn export_stream(&self, path: &str, options: &ExportOptions) -> Result<Box<dyn io::Read>> {
        match pointer::resolve(self, path)? {
            PointerTarget::Database => Ok(self.shared.format.create_export_stream(self, options)),
            PointerTarget::Object(object) => {
                // A bare subtree still has to be a self-contained document.
                let options = ExportOptions {
                    root_style: if options.root_style == RootStyle::Hidden {
                        RootStyle::Braces
                    } else {
                        options.root_style
                    },
                    ..*options
                };
                Ok(self
                    .shared
                    .format
                    .create_object_export_stream(object, &options))
            }
            PointerTarget::Property(_) => Err(crate::FormatError::BadProperty.into()),
        }
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("name", &self.name())
            .field("path", &self.shared.path)
            .field("stores", &self.store_count())
            .finish()
    }
}
