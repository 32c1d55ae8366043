//! Schema-driven embedded configuration database.
//!
//! Given a compile-time schema — a tree of stores, objects, arrays and typed
//! properties with defaults, ranges, enums and unions — this crate provides
//! safe concurrent read/update access to a persisted key/value tree:
//!
//! - **Lazy load and caching**: stores load from file (or schema defaults)
//!   on first access, through a one-slot read cache and one-slot write cache
//!   per database.
//! - **Copy-on-write updates**: a writer works on its own clone while
//!   readers keep their snapshot; at most one writer per store, conflicts
//!   are reported immediately and may be queued instead.
//! - **Interned pool storage**: variable-length data lives in per-store
//!   string and array arenas addressed by small ids, with 0 meaning absent.
//! - **Streaming interchange**: bounded-memory schema-walking import and
//!   export through a pluggable [`Format`]; JSON is the reference instance.
//! - **Decimal numbers**: a packed 32-bit base-10 float that round-trips
//!   losslessly through text.
//!
//! The schema tables are ordinarily produced by a code generator from a
//! schema description; this crate consumes them as `&'static` data.
//!
//! ```no_run
//! # use configdb::{Database, DatabaseInfo};
//! # static INFO: DatabaseInfo = DatabaseInfo { name: "demo", stores: &[] };
//! let db = Database::new("/data/demo", &INFO);
//! let store = db.open_store(0)?;
//! if let Some(value) = store.root().find_property("hostname") {
//!     println!("hostname = {:?}", value.value_text());
//! }
//! let mut store = store;
//! let updater = store.update()?;
//! if let Some(value) = updater.root().find_property("hostname") {
//!     value.set_from_text(Some("gateway"));
//! }
//! // Dropping the updater commits the store to disk.
//! # Ok::<(), configdb::Error>(())
//! ```

mod database;
mod error;
mod format;
mod number;
mod object;
mod pointer;
mod pool;
mod property;
mod schema;
mod store;

pub mod json;

pub use database::Database;
pub use error::{Error, FormatError, Result};
pub use format::{Element, ElementKind, ExportOptions, Format, ImportSink, Listener, RootStyle};
pub use number::Number;
pub use object::Object;
pub use pointer::{resolve, PointerTarget};
pub use pool::{ArrayData, ArrayId, ArrayPool, StringId, StringPool};
pub use property::Property;
pub use schema::{
    DatabaseInfo, EnumInfo, EnumValues, ObjectInfo, ObjectType, PropertyInfo, PropertyType,
    PropertyVariant,
};
pub use store::{Store, StoreRef, StoreUpdater, ROOT_STORE_FILE_NAME};

/// Nesting bound shared by the import and export state machines.
pub const MAX_NESTING: usize = 8;
