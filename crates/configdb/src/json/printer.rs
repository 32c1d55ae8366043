//! Incremental schema-walking JSON printer.
//!
//! Serialization is resumable: each [`Printer::step`] call emits a bounded
//! slice of output and returns, so a whole database can stream through a
//! fixed-size buffer. A frame emits its name and opening bracket on first
//! visit, then one child per step (objects first, then properties), then the
//! closing bracket.

use std::io;

use smallvec::SmallVec;

use crate::database::Database;
use crate::error::Result;
use crate::format::{ExportOptions, RootStyle};
use crate::object::Object;
use crate::schema::ObjectType;
use crate::MAX_NESTING;

struct Frame {
    object: Object,
    pos: usize,
}

pub(crate) struct Printer {
    frames: SmallVec<[Frame; MAX_NESTING]>,
    pretty: bool,
    root_style: RootStyle,
    root_name: Option<&'static str>,
}

impl Printer {
    pub(crate) fn new(object: Object, options: &ExportOptions) -> Self {
        let mut frames = SmallVec::new();
        frames.push(Frame { object, pos: 0 });
        Self {
            frames,
            pretty: options.pretty,
            root_style: options.root_style,
            root_name: options.root_name,
        }
    }

    pub(crate) fn is_done(&self) -> bool {
        self.frames.is_empty()
    }

    fn newline(&self, out: &mut String) {
        if self.pretty {
            out.push('\n');
        }
    }

    /// The root frame's printed name, per the requested style.
    fn root_frame_name(&self) -> Option<&'static str> {
        match self.root_style {
            RootStyle::Hidden => None,
            RootStyle::Braces => Some(""),
            RootStyle::Normal => Some(self.root_name.unwrap_or_else(|| self.frames[0].object.name())),
        }
    }

    /// Emits the next bounded chunk of output. Returns false once done.
    pub(crate) fn step(&mut self, out: &mut String) -> bool {
        if self.frames.is_empty() {
            return false;
        }
        let nesting = self.frames.len() - 1;
        // A named root adds one enclosing level, so everything below it
        // indents one step deeper.
        let root_named = self.root_frame_name().map_or(false, |n| !n.is_empty());

        let (object, pos) = {
            let frame = &self.frames[nesting];
            (frame.object.clone(), frame.pos)
        };
        let name: Option<&str> = if nesting == 0 {
            self.root_frame_name()
        } else {
            Some(object.name())
        };

        let indent_len = nesting + root_named as usize;
        let indent = if self.pretty { "  ".repeat(indent_len) } else { String::new() };
        let colon = if self.pretty { ": " } else { ":" };
        let brackets = match object.otype() {
            ObjectType::Object | ObjectType::Union => ('{', '}'),
            ObjectType::Array | ObjectType::ObjectArray => ('[', ']'),
        };

        // First visit prints the frame's name and opening bracket.
        if pos == 0 {
            if let Some(name) = name {
                if !name.is_empty() {
                    out.push_str(&indent);
                    out.push_str(&super::quote(name));
                    out.push_str(colon);
                }
                out.push(brackets.0);
            }
        }

        let object_count = object.object_count();
        if pos < object_count {
            self.frames[nesting].pos += 1;
            if pos > 0 {
                out.push(',');
            }
            self.newline(out);
            if self.pretty && object.otype() == ObjectType::ObjectArray {
                out.push_str(&indent);
                out.push_str("  ");
            }
            if let Some(child) = object.get_object(pos) {
                if self.frames.len() < MAX_NESTING {
                    self.frames.push(Frame { object: child, pos: 0 });
                }
            }
            return true;
        }

        let prop_index = pos - object_count;
        if prop_index < object.property_count() {
            self.frames[nesting].pos += 1;
            if pos > 0 {
                out.push(',');
            }
            self.newline(out);
            if self.pretty {
                out.push_str(&indent);
                out.push_str("  ");
            }
            if let Some(property) = object.get_property(prop_index) {
                if !property.name().is_empty() {
                    out.push_str(&super::quote(property.name()));
                    out.push_str(colon);
                }
                out.push_str(&property.json_value());
            }
            return true;
        }

        if name.is_some() {
            if self.pretty && pos > 0 {
                self.newline(out);
                out.push_str(&indent);
            }
            out.push(brackets.1);
        }
        self.frames.pop();
        !self.frames.is_empty()
    }
}

/// Streams a whole database: an enclosing object with store 0 spliced in
/// (hidden root) and the remaining stores as named members.
pub(crate) struct DatabasePrinter {
    db: Database,
    options: ExportOptions,
    store_index: usize,
    printer: Option<Printer>,
    done: bool,
}

impl DatabasePrinter {
    pub(crate) fn new(db: Database, options: &ExportOptions) -> Self {
        Self {
            db,
            options: *options,
            store_index: 0,
            printer: None,
            done: false,
        }
    }

    pub(crate) fn is_done(&self) -> bool {
        self.done
    }

    pub(crate) fn step(&mut self, out: &mut String) -> Result<()> {
        if self.done {
            return Ok(());
        }

        if self.printer.is_none() {
            if self.store_index == 0 {
                out.push('{');
            }
            let store = self.db.open_store(self.store_index)?;
            let options = ExportOptions {
                pretty: self.options.pretty,
                root_style: if self.store_index == 0 {
                    RootStyle::Hidden
                } else {
                    RootStyle::Normal
                },
                root_name: None,
            };
            self.printer = Some(Printer::new(store.root(), &options));
        }

        let Some(printer) = self.printer.as_mut() else {
            return Ok(());
        };
        printer.step(out);
        if !printer.is_done() {
            return Ok(());
        }

        let pretty = self.options.pretty;
        self.printer = None;
        self.store_index += 1;
        if self.store_index < self.db.store_count() {
            out.push(',');
            if pretty {
                out.push('\n');
            }
            return Ok(());
        }

        if pretty {
            out.push('\n');
        }
        out.push('}');
        if pretty {
            out.push('\n');
        }
        self.done = true;
        Ok(())
    }
}

/// Adapts a printer to [`io::Read`] for bounded-memory streaming.
pub struct ExportStream {
    source: Source,
    buf: Vec<u8>,
    pos: usize,
}

enum Source {
    Database(DatabasePrinter),
    Object(Printer),
}

impl ExportStream {
    pub(crate) fn database(db: Database, options: &ExportOptions) -> Self {
        Self {
            source: Source::Database(DatabasePrinter::new(db, options)),
            buf: Vec::new(),
            pos: 0,
        }
    }

    pub(crate) fn object(object: Object, options: &ExportOptions) -> Self {
        Self {
            source: Source::Object(Printer::new(object, options)),
            buf: Vec::new(),
            pos: 0,
        }
    }

    fn fill(&mut self) -> io::Result<()> {
        let mut chunk = String::new();
        match &mut self.source {
            Source::Database(printer) => {
                while chunk.is_empty() && !printer.is_done() {
                    printer
                        .step(&mut chunk)
                        .map_err(|err| io::Error::new(io::ErrorKind::Other, err.to_string()))?;
                }
            }
            Source::Object(printer) => {
                while chunk.is_empty() && !printer.is_done() {
                    printer.step(&mut chunk);
                }
            }
        }
        self.buf = chunk.into_bytes();
        self.pos = 0;
        Ok(())
    }
}

impl io::Read for ExportStream {
    fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
        if self.pos >= self.buf.len() {
            self.fill()?;
            if self.buf.is_empty() {
                return Ok(0);
            }
        }
        let n = (self.buf.len() - self.pos).min(out.len());
        out[..n].copy_from_slice(&self.buf[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}

/// Runs a printer to completion against an [`io::Write`].
pub(crate) fn print_object(object: &Object, out: &mut dyn io::Write, options: &ExportOptions) -> Result<u64> {
    let mut printer = Printer::new(object.clone(), options);
    drive(out, |chunk| {
        printer.step(chunk);
        Ok(printer.is_done())
    })
}

pub(crate) fn print_database(db: &Database, out: &mut dyn io::Write, options: &ExportOptions) -> Result<u64> {
    let mut printer = DatabasePrinter::new(db.clone(), options);
    drive(out, |chunk| {
        printer.step(chunk)?;
        Ok(printer.is_done())
    })
}

fn drive(out: &mut dyn io::Write, mut step: impl FnMut(&mut String) -> Result<bool>) -> Result<u64> {
    let mut written = 0u64;
    let mut chunk = String::new();
    loop {
        chunk.clear();
        let done = step(&mut chunk)?;
        out.write_all(chunk.as_bytes())?;
        written += chunk.len() as u64;
        if done {
            return Ok(written);
        }
    }
}
