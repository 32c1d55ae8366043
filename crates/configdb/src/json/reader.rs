//! Incremental push-mode JSON tokenizer.
//!
//! Feeds a [`Listener`] with one [`Element`] per node in document order,
//! using bounded buffers: only the current key and value are held in memory,
//! never the document. Nesting is limited to [`MAX_NESTING`] levels and
//! key/value text to [`BUFFER_SIZE`] bytes; exceeding either is a syntax
//! error.

use std::io;

use smallvec::SmallVec;

use crate::error::{Error, FormatError, Result};
use crate::format::{Element, ElementKind, Listener};
use crate::MAX_NESTING;

/// Upper bound on a single key or value, matching the fixed parse buffer of
/// small embedded targets.
pub const BUFFER_SIZE: usize = 1024;

#[derive(Clone, Copy, PartialEq)]
enum State {
    /// Expecting a value; any pending key is buffered.
    Value,
    /// Inside an object, expecting a key or `}`.
    BeforeKey,
    /// Inside a key string.
    Key,
    /// Expecting `:`.
    AfterKey,
    /// Inside a value string.
    Str,
    /// Accumulating a number or literal word.
    Literal,
    /// Expecting `,` or a closing bracket.
    AfterValue,
    Done,
}

#[derive(Clone, Copy, PartialEq)]
enum Container {
    Object,
    Array,
}

pub struct StreamingParser<L: Listener> {
    listener: L,
    state: State,
    stack: SmallVec<[Container; MAX_NESTING]>,
    key: Vec<u8>,
    value: Vec<u8>,
    escape: bool,
    unicode: Option<(u8, u32)>,
    surrogate: Option<u16>,
}

impl<L: Listener> StreamingParser<L> {
    pub fn new(listener: L) -> Self {
        Self {
            listener,
            state: State::Value,
            stack: SmallVec::new(),
            key: Vec::new(),
            value: Vec::new(),
            escape: false,
            unicode: None,
            surrogate: None,
        }
    }

    pub fn into_inner(self) -> L {
        self.listener
    }

    /// Consumes one chunk of document text. May be called repeatedly with
    /// arbitrary chunk boundaries.
    pub fn push(&mut self, chunk: &[u8]) -> Result<()> {
        let mut i = 0;
        while i < chunk.len() {
            if self.step(chunk[i])? {
                i += 1;
            }
        }
        Ok(())
    }

    /// Completes the parse, flushing a trailing bare literal.
    pub fn finish(&mut self) -> Result<()> {
        if self.state == State::Literal {
            self.finish_literal()?;
        }
        match self.state {
            State::Done => Ok(()),
            State::AfterValue if self.stack.is_empty() => Ok(()),
            _ => Err(FormatError::BadSyntax.into()),
        }
    }

    /// Processes one byte; returns false when the byte must be reprocessed
    /// in the new state (literal termination).
    fn step(&mut self, c: u8) -> Result<bool> {
        match self.state {
            State::Value => match c {
                b' ' | b'\t' | b'\r' | b'\n' => {}
                b'{' => self.open(Container::Object)?,
                b'[' => self.open(Container::Array)?,
                b'"' => {
                    self.value.clear();
                    self.state = State::Str;
                }
                b']' if self.stack.last() == Some(&Container::Array) => self.close(Container::Array)?,
                _ => {
                    self.value.clear();
                    self.value.push(c);
                    self.state = State::Literal;
                }
            },
            State::BeforeKey => match c {
                b' ' | b'\t' | b'\r' | b'\n' => {}
                b'"' => {
                    self.key.clear();
                    self.state = State::Key;
                }
                b'}' => self.close(Container::Object)?,
                _ => return Err(FormatError::BadSyntax.into()),
            },
            State::AfterKey => match c {
                b' ' | b'\t' | b'\r' | b'\n' => {}
                b':' => self.state = State::Value,
                _ => return Err(FormatError::BadSyntax.into()),
            },
            State::Key | State::Str => {
                if self.string_byte(c)? {
                    if self.state == State::Key {
                        self.state = State::AfterKey;
                    } else {
                        self.emit_leaf(ElementKind::String)?;
                    }
                }
            }
            State::Literal => match c {
                b',' | b'}' | b']' | b' ' | b'\t' | b'\r' | b'\n' => {
                    self.finish_literal()?;
                    return Ok(false);
                }
                _ => {
                    if self.value.len() >= BUFFER_SIZE {
                        return Err(FormatError::BadSyntax.into());
                    }
                    self.value.push(c);
                }
            },
            State::AfterValue => match c {
                b' ' | b'\t' | b'\r' | b'\n' => {}
                b',' => {
                    self.state = match self.stack.last() {
                        Some(Container::Object) => State::BeforeKey,
                        Some(Container::Array) => State::Value,
                        None => return Err(FormatError::BadSyntax.into()),
                    };
                }
                b'}' => self.close(Container::Object)?,
                b']' => self.close(Container::Array)?,
                _ => return Err(FormatError::BadSyntax.into()),
            },
            State::Done => match c {
                b' ' | b'\t' | b'\r' | b'\n' => {}
                _ => return Err(FormatError::BadSyntax.into()),
            },
        }
        Ok(true)
    }

    fn open(&mut self, container: Container) -> Result<()> {
        if self.stack.len() >= MAX_NESTING {
            return Err(FormatError::BadSyntax.into());
        }
        let kind = match container {
            Container::Object => ElementKind::Object,
            Container::Array => ElementKind::Array,
        };
        let key = String::from_utf8_lossy(&self.key).into_owned();
        let element = Element {
            level: self.stack.len(),
            key: &key,
            value: "",
            kind,
        };
        self.listener.start_element(&element)?;
        self.key.clear();
        self.stack.push(container);
        self.state = match container {
            Container::Object => State::BeforeKey,
            Container::Array => State::Value,
        };
        Ok(())
    }

    fn close(&mut self, container: Container) -> Result<()> {
        if self.stack.pop() != Some(container) {
            return Err(FormatError::BadSyntax.into());
        }
        self.listener.end_element(self.stack.len())?;
        self.state = if self.stack.is_empty() {
            State::Done
        } else {
            State::AfterValue
        };
        Ok(())
    }

    /// Emits a completed leaf together with its end marker.
    fn emit_leaf(&mut self, kind: ElementKind) -> Result<()> {
        let key = String::from_utf8_lossy(&self.key).into_owned();
        let value = String::from_utf8_lossy(&self.value).into_owned();
        let element = Element {
            level: self.stack.len(),
            key: &key,
            value: &value,
            kind,
        };
        self.listener.start_element(&element)?;
        self.listener.end_element(self.stack.len())?;
        self.key.clear();
        self.value.clear();
        self.state = State::AfterValue;
        Ok(())
    }

    fn finish_literal(&mut self) -> Result<()> {
        let kind = match self.value.as_slice() {
            b"true" | b"false" => ElementKind::Boolean,
            b"null" => ElementKind::Null,
            text if text
                .iter()
                .all(|b| b.is_ascii_digit() || matches!(b, b'-' | b'+' | b'.' | b'e' | b'E')) =>
            {
                ElementKind::Number
            }
            _ => return Err(FormatError::BadSyntax.into()),
        };
        if kind == ElementKind::Null {
            self.value.clear();
        }
        self.emit_leaf(kind)
    }

    /// Handles one byte inside a string; returns true on the closing quote.
    fn string_byte(&mut self, c: u8) -> Result<bool> {
        if let Some((remaining, acc)) = self.unicode {
            let digit = match c {
                b'0'..=b'9' => (c - b'0') as u32,
                b'a'..=b'f' => (c - b'a' + 10) as u32,
                b'A'..=b'F' => (c - b'A' + 10) as u32,
                _ => return Err(FormatError::BadSyntax.into()),
            };
            let acc = (acc << 4) | digit;
            if remaining > 1 {
                self.unicode = Some((remaining - 1, acc));
                return Ok(false);
            }
            self.unicode = None;
            self.unicode_complete(acc as u16)?;
            return Ok(false);
        }

        if self.escape {
            self.escape = false;
            let decoded = match c {
                b'"' => '"',
                b'\\' => '\\',
                b'/' => '/',
                b'b' => '\u{8}',
                b'f' => '\u{c}',
                b'n' => '\n',
                b'r' => '\r',
                b't' => '\t',
                b'u' => {
                    self.unicode = Some((4, 0));
                    return Ok(false);
                }
                _ => return Err(FormatError::BadSyntax.into()),
            };
            self.push_char(decoded)?;
            return Ok(false);
        }

        // A lone high surrogate must be followed by its low escape.
        if self.surrogate.is_some() && c != b'\\' {
            return Err(FormatError::BadSyntax.into());
        }

        match c {
            b'"' => Ok(true),
            b'\\' => {
                self.escape = true;
                Ok(false)
            }
            _ => {
                self.push_byte(c)?;
                Ok(false)
            }
        }
    }

    fn unicode_complete(&mut self, code: u16) -> Result<()> {
        if let Some(high) = self.surrogate.take() {
            if !(0xdc00..=0xdfff).contains(&code) {
                return Err(FormatError::BadSyntax.into());
            }
            let combined = 0x10000 + (((high as u32 - 0xd800) << 10) | (code as u32 - 0xdc00));
            let decoded = char::from_u32(combined).ok_or(FormatError::BadSyntax)?;
            return self.push_char(decoded);
        }
        if (0xd800..=0xdbff).contains(&code) {
            self.surrogate = Some(code);
            return Ok(());
        }
        let decoded = char::from_u32(code as u32).ok_or(FormatError::BadSyntax)?;
        self.push_char(decoded)
    }

    fn push_char(&mut self, c: char) -> Result<()> {
        if self.surrogate.is_some() {
            return Err(FormatError::BadSyntax.into());
        }
        let mut utf8 = [0u8; 4];
        for &b in c.encode_utf8(&mut utf8).as_bytes() {
            self.push_byte(b)?;
        }
        Ok(())
    }

    fn push_byte(&mut self, c: u8) -> Result<()> {
        let buf = if self.state == State::Key { &mut self.key } else { &mut self.value };
        if buf.len() >= BUFFER_SIZE {
            return Err(FormatError::BadSyntax.into());
        }
        buf.push(c);
        Ok(())
    }
}

/// Drives a listener over a pull source in bounded chunks.
pub fn parse_stream<L: Listener>(listener: L, source: &mut dyn io::Read) -> Result<L> {
    let mut parser = StreamingParser::new(listener);
    let mut buf = [0u8; 512];
    loop {
        let read = source.read(&mut buf).map_err(Error::File)?;
        if read == 0 {
            break;
        }
        parser.push(&buf[..read])?;
    }
    parser.finish()?;
    Ok(parser.into_inner())
}
