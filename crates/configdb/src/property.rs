//! Typed property access against raw store bytes.
//!
//! A [`Property`] reads and writes one value at a schema-described address.
//! All multi-byte values are little-endian in store data. Writes clamp to
//! the declared range (or the natural range of the storage type), so a
//! stored value is always in range.

use crate::number::Number;
use crate::pool::StringId;
use crate::schema::{PropertyInfo, PropertyType, PropertyVariant};
use crate::store::{DataAddr, StoreRef};

pub struct Property {
    store: StoreRef,
    info: &'static PropertyInfo,
    addr: DataAddr,
    /// Schema default bytes for this property, used when a null value is
    /// assigned. Array items have none.
    default: Option<&'static [u8]>,
}

impl Property {
    pub(crate) fn new(
        store: StoreRef,
        info: &'static PropertyInfo,
        addr: DataAddr,
        default: Option<&'static [u8]>,
    ) -> Self {
        Self {
            store,
            info,
            addr,
            default,
        }
    }

    pub fn name(&self) -> &'static str {
        self.info.name
    }

    pub fn ptype(&self) -> PropertyType {
        self.info.ptype
    }

    pub fn info(&self) -> &'static PropertyInfo {
        self.info
    }

    fn read(&self, len: usize) -> Option<Vec<u8>> {
        self.store.read_bytes(self.addr, len)
    }

    /// Renders the stored value to text; `None` stands for JSON null.
    ///
    /// Strings resolve through the pool with the schema default as
    /// fallback; enums resolve through their value table.
    pub fn value_text(&self) -> Option<String> {
        match self.info.ptype {
            PropertyType::Boolean => Some(if self.read(1)?[0] != 0 { "true" } else { "false" }.into()),
            PropertyType::Int8 => Some((self.read(1)?[0] as i8).to_string()),
            PropertyType::Int16 => {
                let b = self.read(2)?;
                Some(i16::from_le_bytes([b[0], b[1]]).to_string())
            }
            PropertyType::Int32 => {
                let b = self.read(4)?;
                Some(i32::from_le_bytes([b[0], b[1], b[2], b[3]]).to_string())
            }
            PropertyType::Int64 => Some(self.read_i64()?.to_string()),
            PropertyType::UInt8 => Some(self.read(1)?[0].to_string()),
            PropertyType::UInt16 => {
                let b = self.read(2)?;
                Some(u16::from_le_bytes([b[0], b[1]]).to_string())
            }
            PropertyType::UInt32 => {
                let b = self.read(4)?;
                Some(u32::from_le_bytes([b[0], b[1], b[2], b[3]]).to_string())
            }
            PropertyType::UInt64 => Some(self.read_u64()?.to_string()),
            PropertyType::Number => Some(self.value_number()?.to_string()),
            PropertyType::String => {
                let id = self.store.read_u16(self.addr);
                if id != 0 {
                    self.store.string_get(id)
                } else {
                    self.info.default_str().map(str::to_string)
                }
            }
            PropertyType::Enum => {
                let index = self.read(1)?[0] as usize;
                self.info.enum_info()?.text(index)
            }
            PropertyType::Object | PropertyType::Alias => None,
        }
    }

    /// Textual representation suitable for the export format: string-typed
    /// values are quoted and escaped, absent or non-finite values become
    /// `null`.
    pub fn json_value(&self) -> String {
        if self.info.ptype == PropertyType::Number {
            match self.value_number() {
                Some(number) if number.is_finite() => return number.to_string(),
                _ => return "null".into(),
            }
        }
        match self.value_text() {
            None => "null".into(),
            Some(text) if self.info.is_string_type() => crate::json::quote(&text),
            Some(text) => text,
        }
    }

    pub fn value_bool(&self) -> Option<bool> {
        (self.info.ptype == PropertyType::Boolean).then(|| self.read(1).map(|b| b[0] != 0))?
    }

    pub fn value_number(&self) -> Option<Number> {
        if self.info.ptype != PropertyType::Number {
            return None;
        }
        let b = self.read(4)?;
        Some(Number::from_bits(u32::from_le_bytes([b[0], b[1], b[2], b[3]])))
    }

    pub fn value_i64(&self) -> Option<i64> {
        match self.info.ptype {
            PropertyType::Int8 => Some(self.read(1)?[0] as i8 as i64),
            PropertyType::Int16 => {
                let b = self.read(2)?;
                Some(i16::from_le_bytes([b[0], b[1]]) as i64)
            }
            PropertyType::Int32 => {
                let b = self.read(4)?;
                Some(i32::from_le_bytes([b[0], b[1], b[2], b[3]]) as i64)
            }
            PropertyType::Int64 => self.read_i64(),
            _ => self.value_u64().and_then(|v| i64::try_from(v).ok()),
        }
    }

    pub fn value_u64(&self) -> Option<u64> {
        match self.info.ptype {
            PropertyType::UInt8 | PropertyType::Enum => Some(self.read(1)?[0] as u64),
            PropertyType::UInt16 => {
                let b = self.read(2)?;
                Some(u16::from_le_bytes([b[0], b[1]]) as u64)
            }
            PropertyType::UInt32 => {
                let b = self.read(4)?;
                Some(u32::from_le_bytes([b[0], b[1], b[2], b[3]]) as u64)
            }
            PropertyType::UInt64 => self.read_u64(),
            _ => None,
        }
    }

    fn read_i64(&self) -> Option<i64> {
        let b = self.read(8)?;
        Some(i64::from_le_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]]))
    }

    fn read_u64(&self) -> Option<u64> {
        let b = self.read(8)?;
        Some(u64::from_le_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]]))
    }

    /// Parses `value` into the declared type and stores it, clamping to the
    /// declared range. `None` resets to the schema default.
    ///
    /// Returns false without mutating on unparseable text or an unknown enum
    /// value, so a failed assignment never corrupts state.
    pub fn set_from_text(&self, value: Option<&str>) -> bool {
        if !self.store.write_check() {
            return false;
        }

        if self.info.ptype == PropertyType::String {
            let id: StringId = match value {
                None => 0,
                // The schema default is stored as "absent".
                Some(text) if self.info.default_str() == Some(text) => 0,
                Some(text) => self.store.string_intern(text),
            };
            return self.store.write_bytes(self.addr, &id.to_le_bytes());
        }

        let Some(text) = value else {
            return match self.default {
                Some(bytes) => self.store.write_bytes(self.addr, bytes),
                None => self.store.write_bytes(self.addr, &vec![0; self.info.size()]),
            };
        };

        match self.info.ptype {
            PropertyType::Boolean => {
                let set = text.len() == 4 && text.eq_ignore_ascii_case("true");
                self.store.write_bytes(self.addr, &[set as u8])
            }
            PropertyType::Int8 | PropertyType::Int16 | PropertyType::Int32 | PropertyType::Int64 => {
                let Ok(parsed) = text.parse::<i64>() else {
                    return false;
                };
                self.write_signed(self.clamp_signed(parsed))
            }
            PropertyType::UInt8 | PropertyType::UInt16 | PropertyType::UInt32 | PropertyType::UInt64 => {
                let Ok(parsed) = text.parse::<u64>() else {
                    return false;
                };
                self.write_unsigned(self.clamp_unsigned(parsed))
            }
            PropertyType::Number => {
                let Some(parsed) = Number::parse(text) else {
                    return false;
                };
                let clamped = self.clamp_number(parsed);
                self.store.write_bytes(self.addr, &clamped.to_bits().to_le_bytes())
            }
            PropertyType::Enum => {
                let Some(info) = self.info.enum_info() else {
                    return false;
                };
                let Some(index) = info.find(text) else {
                    return false;
                };
                self.store.write_bytes(self.addr, &[index as u8])
            }
            PropertyType::String | PropertyType::Object | PropertyType::Alias => false,
        }
    }

    fn clamp_signed(&self, value: i64) -> i64 {
        let value = match self.info.variant {
            PropertyVariant::IntRange { min, max } => value.clamp(min, max),
            _ => value,
        };
        match self.info.ptype {
            PropertyType::Int8 => value.clamp(i8::MIN as i64, i8::MAX as i64),
            PropertyType::Int16 => value.clamp(i16::MIN as i64, i16::MAX as i64),
            PropertyType::Int32 => value.clamp(i32::MIN as i64, i32::MAX as i64),
            _ => value,
        }
    }

    fn clamp_unsigned(&self, value: u64) -> u64 {
        let value = match self.info.variant {
            PropertyVariant::UIntRange { min, max } => value.clamp(min, max),
            _ => value,
        };
        match self.info.ptype {
            PropertyType::UInt8 => value.min(u8::MAX as u64),
            PropertyType::UInt16 => value.min(u16::MAX as u64),
            PropertyType::UInt32 => value.min(u32::MAX as u64),
            _ => value,
        }
    }

    fn clamp_number(&self, value: Number) -> Number {
        match self.info.variant {
            PropertyVariant::NumberRange { min, max } => {
                if Number::compare(value, min) == std::cmp::Ordering::Less {
                    min
                } else if Number::compare(value, max) == std::cmp::Ordering::Greater {
                    max
                } else {
                    value
                }
            }
            _ => value,
        }
    }

    fn write_signed(&self, value: i64) -> bool {
        match self.info.ptype {
            PropertyType::Int8 => self.store.write_bytes(self.addr, &(value as i8).to_le_bytes()),
            PropertyType::Int16 => self.store.write_bytes(self.addr, &(value as i16).to_le_bytes()),
            PropertyType::Int32 => self.store.write_bytes(self.addr, &(value as i32).to_le_bytes()),
            PropertyType::Int64 => self.store.write_bytes(self.addr, &value.to_le_bytes()),
            _ => false,
        }
    }

    fn write_unsigned(&self, value: u64) -> bool {
        match self.info.ptype {
            PropertyType::UInt8 => self.store.write_bytes(self.addr, &(value as u8).to_le_bytes()),
            PropertyType::UInt16 => self.store.write_bytes(self.addr, &(value as u16).to_le_bytes()),
            PropertyType::UInt32 => self.store.write_bytes(self.addr, &(value as u32).to_le_bytes()),
            PropertyType::UInt64 => self.store.write_bytes(self.addr, &value.to_le_bytes()),
            _ => false,
        }
    }
}
