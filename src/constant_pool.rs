use anyhow::{Context, Result};
use serde::Serialize;

use crate::descriptor::{PrimitiveKind, Type};
use crate::reader::ByteReader;

/// Raw constant pool entry as stored in the class file.
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum CpEntry {
    /// Index 0 and the second slot of Long/Double entries.
    Unusable,
    Utf8(Vec<u8>),
    Integer(u32),
    Float(u32),
    Long { high: u32, low: u32 },
    Double { high: u32, low: u32 },
    Class { name_index: u16 },
    String { string_index: u16 },
    FieldRef,
    MethodRef,
    InterfaceMethodRef,
    NameAndType,
    MethodHandle,
    MethodType,
    Dynamic,
    InvokeDynamic,
    Module,
    Package,
}

/// Compile-time constant resolved from the pool.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub(crate) enum ConstantValue {
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Boolean(bool),
    Char(char),
    String(String),
}

impl ConstantValue {
    /// `boolean` and `char` constants are stored as Integer entries.
    pub(crate) fn for_type(self, ty: &Type) -> Self {
        let ConstantValue::Int(raw) = self else {
            return self;
        };
        if ty.array_dimensions != 0 {
            return self;
        }
        match ty.primitive() {
            Some(PrimitiveKind::Boolean) => ConstantValue::Boolean(raw != 0),
            Some(PrimitiveKind::Char) => u32::try_from(raw)
                .ok()
                .and_then(char::from_u32)
                .map_or(self, ConstantValue::Char),
            _ => self,
        }
    }
}

impl std::fmt::Display for ConstantValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConstantValue::Int(value) => write!(f, "{value}"),
            ConstantValue::Long(value) => write!(f, "{value}"),
            ConstantValue::Float(value) => write!(f, "{value}"),
            ConstantValue::Double(value) => write!(f, "{value}"),
            ConstantValue::Boolean(value) => write!(f, "{value}"),
            ConstantValue::Char(value) => write!(f, "{value:?}"),
            ConstantValue::String(value) => write!(f, "{value:?}"),
        }
    }
}

/// Constant pool indexed 1..N; slot 0 is unusable.
#[derive(Clone, Debug, Default)]
pub(crate) struct ConstantPool {
    entries: Vec<CpEntry>,
}

impl ConstantPool {
    #[cfg(test)]
    pub(crate) fn from_entries(entries: Vec<CpEntry>) -> Self {
        Self { entries }
    }

    pub(crate) fn parse(reader: &mut ByteReader<'_>) -> Result<Self> {
        let count = reader.read_u16().context("read constant pool count")? as usize;
        let mut entries = Vec::with_capacity(count.max(1));
        entries.push(CpEntry::Unusable);
        while entries.len() < count {
            let index = entries.len();
            let tag = reader
                .read_u8()
                .with_context(|| format!("read constant pool tag at index {index}"))?;
            let entry = match tag {
                1 => {
                    let len = reader.read_u16()? as usize;
                    CpEntry::Utf8(reader.read_bytes(len)?.to_vec())
                }
                3 => CpEntry::Integer(reader.read_u32()?),
                4 => CpEntry::Float(reader.read_u32()?),
                5 => CpEntry::Long {
                    high: reader.read_u32()?,
                    low: reader.read_u32()?,
                },
                6 => CpEntry::Double {
                    high: reader.read_u32()?,
                    low: reader.read_u32()?,
                },
                7 => CpEntry::Class {
                    name_index: reader.read_u16()?,
                },
                8 => CpEntry::String {
                    string_index: reader.read_u16()?,
                },
                9 => {
                    reader.skip(4)?;
                    CpEntry::FieldRef
                }
                10 => {
                    reader.skip(4)?;
                    CpEntry::MethodRef
                }
                11 => {
                    reader.skip(4)?;
                    CpEntry::InterfaceMethodRef
                }
                12 => {
                    reader.skip(4)?;
                    CpEntry::NameAndType
                }
                15 => {
                    reader.skip(3)?;
                    CpEntry::MethodHandle
                }
                16 => {
                    reader.skip(2)?;
                    CpEntry::MethodType
                }
                17 => {
                    reader.skip(4)?;
                    CpEntry::Dynamic
                }
                18 => {
                    reader.skip(4)?;
                    CpEntry::InvokeDynamic
                }
                19 => {
                    reader.skip(2)?;
                    CpEntry::Module
                }
                20 => {
                    reader.skip(2)?;
                    CpEntry::Package
                }
                _ => anyhow::bail!("unsupported constant pool tag {tag} at index {index}"),
            };
            let wide = matches!(entry, CpEntry::Long { .. } | CpEntry::Double { .. });
            entries.push(entry);
            // Long and Double take two slots.
            if wide {
                entries.push(CpEntry::Unusable);
            }
        }
        Ok(Self { entries })
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn get(&self, index: u16) -> Option<&CpEntry> {
        if index == 0 {
            return None;
        }
        self.entries.get(index as usize)
    }

    /// Resolve a Utf8, String or Class entry to its text.
    pub(crate) fn resolve_string(&self, index: u16) -> Option<String> {
        match self.get(index)? {
            CpEntry::Utf8(bytes) => decode_modified_utf8(bytes),
            CpEntry::String { string_index } => self.resolve_utf8(*string_index),
            CpEntry::Class { name_index } => self.resolve_utf8(*name_index),
            _ => None,
        }
    }

    /// Resolve an Integer, Long, Float or Double entry.
    pub(crate) fn resolve_number(&self, index: u16) -> Option<ConstantValue> {
        match self.get(index)? {
            CpEntry::Integer(bits) => Some(ConstantValue::Int(*bits as i32)),
            CpEntry::Long { high, low } => Some(ConstantValue::Long(long_from_halves(*high, *low))),
            CpEntry::Float(bits) => Some(ConstantValue::Float(float_from_bits(*bits))),
            CpEntry::Double { high, low } => {
                Some(ConstantValue::Double(double_from_halves(*high, *low)))
            }
            _ => None,
        }
    }

    /// String resolution wins over numeric resolution.
    pub(crate) fn resolve_value(&self, index: u16) -> Option<ConstantValue> {
        match self.resolve_string(index) {
            Some(text) => Some(ConstantValue::String(text)),
            None => self.resolve_number(index),
        }
    }

    fn resolve_utf8(&self, index: u16) -> Option<String> {
        match self.get(index)? {
            CpEntry::Utf8(bytes) => decode_modified_utf8(bytes),
            _ => None,
        }
    }
}

/// Class files store text as modified UTF-8: NUL is `C0 80` and supplementary
/// characters are surrogate pairs, each encoded in three bytes.
fn decode_modified_utf8(bytes: &[u8]) -> Option<String> {
    let mut units = Vec::with_capacity(bytes.len());
    let mut iter = bytes.iter().copied();
    while let Some(lead) = iter.next() {
        let unit = match lead {
            0x01..=0x7F => u16::from(lead),
            0xC0..=0xDF => {
                let second = continuation(iter.next()?)?;
                (u16::from(lead & 0x1F) << 6) | second
            }
            0xE0..=0xEF => {
                let second = continuation(iter.next()?)?;
                let third = continuation(iter.next()?)?;
                (u16::from(lead & 0x0F) << 12) | (second << 6) | third
            }
            _ => return None,
        };
        units.push(unit);
    }
    Some(
        char::decode_utf16(units)
            .map(|decoded| decoded.unwrap_or(char::REPLACEMENT_CHARACTER))
            .collect(),
    )
}

fn continuation(byte: u8) -> Option<u16> {
    (byte & 0xC0 == 0x80).then_some(u16::from(byte & 0x3F))
}

pub(crate) fn long_from_halves(high: u32, low: u32) -> i64 {
    (((high as u64) << 32) | low as u64) as i64
}

/// IEEE-754 single precision: sign bit 31, exponent bits 30..23, mantissa bits 22..0.
pub(crate) fn float_from_bits(bits: u32) -> f32 {
    let negative = bits >> 31 != 0;
    let exponent = ((bits >> 23) & 0xff) as i32;
    let fraction = bits & 0x7f_ffff;
    if exponent == 0xff {
        return special_value(negative, fraction == 0) as f32;
    }
    let mantissa = if exponent == 0 {
        fraction << 1
    } else {
        fraction | 0x80_0000
    };
    let magnitude = mantissa as f64 * pow2(exponent - 150);
    (if negative { -magnitude } else { magnitude }) as f32
}

/// IEEE-754 double precision: sign bit 63, exponent bits 62..52, mantissa bits 51..0.
pub(crate) fn double_from_halves(high: u32, low: u32) -> f64 {
    let bits = ((high as u64) << 32) | low as u64;
    let negative = bits >> 63 != 0;
    let exponent = ((bits >> 52) & 0x7ff) as i32;
    let fraction = bits & 0xf_ffff_ffff_ffff;
    if exponent == 0x7ff {
        return special_value(negative, fraction == 0);
    }
    let magnitude = if exponent == 0 {
        // (fraction << 1) * 2^-1075 without leaving the representable range.
        fraction as f64 * pow2(-1074)
    } else {
        (fraction | 0x10_0000_0000_0000) as f64 * pow2(exponent - 1075)
    };
    if negative { -magnitude } else { magnitude }
}

fn special_value(negative: bool, infinite: bool) -> f64 {
    match (infinite, negative) {
        (false, _) => f64::NAN,
        (true, false) => f64::INFINITY,
        (true, true) => f64::NEG_INFINITY,
    }
}

/// Exact power of two for exponents in -1074..=1023.
fn pow2(exponent: i32) -> f64 {
    if exponent >= -1022 {
        f64::from_bits(((exponent + 1023) as u64) << 52)
    } else {
        f64::from_bits(1u64 << (exponent + 1074))
    }
}
