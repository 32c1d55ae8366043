//! Reference [`Format`] instance: a streaming JSON printer/parser pair.

use std::io;

use crate::database::Database;
use crate::error::Result;
use crate::format::{ExportOptions, Format, ImportSink};
use crate::object::Object;

mod printer;
mod reader;
mod writer;

pub use printer::ExportStream;
pub use reader::{parse_stream, StreamingParser, BUFFER_SIZE};

use reader::StreamingParser as Parser;
use writer::WriteStream;

/// Quotes and escapes text as a JSON string literal.
pub(crate) fn quote(text: &str) -> String {
    serde_json::to_string(text).unwrap_or_default()
}

/// The reference JSON format.
pub struct Json;

impl Format for Json {
    fn extension(&self) -> &'static str {
        ".json"
    }

    fn export_database(
        &self,
        db: &Database,
        out: &mut dyn io::Write,
        options: &ExportOptions,
    ) -> Result<u64> {
        printer::print_database(db, out, options)
    }

    fn export_object(
        &self,
        object: &Object,
        out: &mut dyn io::Write,
        options: &ExportOptions,
    ) -> Result<u64> {
        printer::print_object(object, out, options)
    }

    fn create_export_stream(&self, db: &Database, options: &ExportOptions) -> Box<dyn io::Read> {
        Box::new(ExportStream::database(db.clone(), options))
    }

    fn create_object_export_stream(
        &self,
        object: Object,
        options: &ExportOptions,
    ) -> Box<dyn io::Read> {
        Box::new(ExportStream::object(object, options))
    }

    fn import_database(&self, db: &Database, source: &mut dyn io::Read) -> Result<()> {
        let mut stream = parse_stream(WriteStream::database(db.clone()), source)?;
        stream.finish();
        Ok(())
    }

    fn import_object(&self, object: &Object, source: &mut dyn io::Read) -> Result<()> {
        let mut stream = parse_stream(WriteStream::object(object.clone()), source)?;
        stream.finish();
        Ok(())
    }

    fn create_import_sink(&self, db: &Database) -> Box<dyn ImportSink> {
        Box::new(JsonImportSink {
            parser: Some(Parser::new(WriteStream::database(db.clone()))),
        })
    }
}

/// Push-mode import: bytes in via [`io::Write`], terminal status from
/// [`ImportSink::finish`].
struct JsonImportSink {
    parser: Option<Parser<WriteStream>>,
}

impl io::Write for JsonImportSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let Some(parser) = self.parser.as_mut() else {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "import already failed"));
        };
        match parser.push(buf) {
            Ok(()) => Ok(buf.len()),
            Err(err) => {
                self.parser = None;
                Err(io::Error::new(io::ErrorKind::InvalidData, err.to_string()))
            }
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl ImportSink for JsonImportSink {
    fn finish(&mut self) -> Result<()> {
        let Some(mut parser) = self.parser.take() else {
            return Err(crate::FormatError::BadSyntax.into());
        };
        parser.finish()?;
        parser.into_inner().finish();
        Ok(())
    }
}

impl Drop for JsonImportSink {
    fn drop(&mut self) {
        if let Some(parser) = self.parser.take() {
            parser.into_inner().finish();
        }
    }
}
