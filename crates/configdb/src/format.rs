//! Format collaborator contract.
//!
//! A [`Format`] encapsulates one concrete textual representation and its
//! parser/printer pair. The core routes all persistence and interchange
//! through this trait; the JSON implementation in [`crate::json`] is the
//! reference instance.

use std::io;

use crate::database::Database;
use crate::error::Result;
use crate::object::Object;

/// How the outermost node of an export is rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RootStyle {
    /// Children only: no name and no enclosing brackets. Used to splice the
    /// root store into a database-level document.
    Hidden,
    /// Enclosing brackets without a name, i.e. a standalone document.
    #[default]
    Braces,
    /// Name and brackets, as for any nested object.
    Normal,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ExportOptions {
    pub pretty: bool,
    pub root_style: RootStyle,
    /// Overrides the schema name of the root node, when named.
    pub root_name: Option<&'static str>,
}

/// One element of a parsed document, delivered in document order.
///
/// Containers produce a start element, their children, then an end at the
/// same level; leaves produce a start immediately followed by an end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Element<'a> {
    /// Nesting depth; the document root is level 0.
    pub level: usize,
    /// Key within the parent object; empty for array items and the root.
    pub key: &'a str,
    /// Leaf text, unquoted and unescaped; empty for containers and null.
    pub value: &'a str,
    pub kind: ElementKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementKind {
    Object,
    Array,
    String,
    Number,
    Boolean,
    Null,
}

impl<'a> Element<'a> {
    pub fn is_container(&self) -> bool {
        matches!(self.kind, ElementKind::Object | ElementKind::Array)
    }

    /// Leaf text, with null mapped to `None`.
    pub fn text(&self) -> Option<&'a str> {
        (self.kind != ElementKind::Null).then_some(self.value)
    }
}

/// Receives the element sequence of one document.
///
/// The parser guarantees matched start/end pairs with correct nesting,
/// bounded by [`crate::MAX_NESTING`]. Returning an error aborts the parse.
pub trait Listener {
    fn start_element(&mut self, element: &Element<'_>) -> Result<()>;

    fn end_element(&mut self, _level: usize) -> Result<()> {
        Ok(())
    }
}

/// Byte sink for push-mode imports: feed chunks through [`io::Write`], then
/// complete with [`ImportSink::finish`].
pub trait ImportSink: io::Write {
    /// Flushes trailing state and commits any store opened by the import.
    fn finish(&mut self) -> Result<()>;
}

/// A concrete textual representation: printer, parser, and file naming.
pub trait Format {
    /// File extension for stores persisted in this format, with leading dot.
    fn extension(&self) -> &'static str;

    /// Serializes every store, wrapped in one enclosing container.
    fn export_database(
        &self,
        db: &Database,
        out: &mut dyn io::Write,
        options: &ExportOptions,
    ) -> Result<u64>;

    /// Serializes one object subtree.
    fn export_object(
        &self,
        object: &Object,
        out: &mut dyn io::Write,
        options: &ExportOptions,
    ) -> Result<u64>;

    /// Incremental, bounded-memory reader over the database serialization.
    fn create_export_stream(&self, db: &Database, options: &ExportOptions) -> Box<dyn io::Read>;

    fn create_object_export_stream(
        &self,
        object: Object,
        options: &ExportOptions,
    ) -> Box<dyn io::Read>;

    /// Parses a document into the database, opening stores for update on
    /// demand. Tolerant of unknown keys; fails on syntax errors or when a
    /// needed store is locked.
    fn import_database(&self, db: &Database, source: &mut dyn io::Read) -> Result<()>;

    /// Parses a document into one object subtree, whose store must be held
    /// for update.
    fn import_object(&self, object: &Object, source: &mut dyn io::Read) -> Result<()>;

    /// Push-mode variant of [`Format::import_database`].
    fn create_import_sink(&self, db: &Database) -> Box<dyn ImportSink>;
}
