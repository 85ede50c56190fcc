//! The packed structs represent the on-disk format of a header index
use alloc::string::String;
use alloc::vec::Vec;
use core::slice;

use bytemuck::{Pod, Zeroable};

use crate::tag::Type;

/// Index descriptor as stored in the header, all fields big-endian
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
#[repr(packed, C)]
pub struct EntryInfo {
    /// Tag identifying the meaning of the entry
    pub tag: i32,
    /// Raw [`Type`]
    pub kind: u32,
    /// Offset of the value in the data region
    pub offset: i32,
    /// Number of elements
    pub count: u32,
}

impl EntryInfo {
    pub fn tag(&self) -> i32 {
        i32::from_be(self.tag)
    }

    pub fn kind(&self) -> u32 {
        u32::from_be(self.kind)
    }

    pub fn offset(&self) -> i32 {
        i32::from_be(self.offset)
    }

    pub fn count(&self) -> u32 {
        u32::from_be(self.count)
    }
}

/// Decoded payload of an index entry
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Value {
    Null,
    /// Integer entry with a count of one
    Int(u64),
    /// Integer entry with any other count, widened from the stored width
    Ints(Vec<u64>),
    String(String),
    /// String array or localized string, one element per count
    Strings(Vec<String>),
    Binary(Vec<u8>),
}

impl Value {
    /// Decode `data`, which holds exactly the bytes of one entry
    pub(crate) fn decode(kind: Type, count: u32, data: &[u8]) -> Value {
        match kind {
            Type::Null => Value::Null,
            Type::Char | Type::Int8 => ints(data.iter().map(|&b| u64::from(b)), count),
            Type::Int16 => ints(
                data.chunks_exact(2)
                    .map(|c| u64::from(u16::from_be_bytes([c[0], c[1]]))),
                count,
            ),
            Type::Int32 => ints(
                data.chunks_exact(4)
                    .map(|c| u64::from(u32::from_be_bytes([c[0], c[1], c[2], c[3]]))),
                count,
            ),
            Type::Int64 => ints(
                data.chunks_exact(8).map(|c| {
                    let mut be = [0; 8];
                    be.copy_from_slice(c);
                    u64::from_be_bytes(be)
                }),
                count,
            ),
            Type::String => Value::String(lossy(data.split(|&b| b == 0).next().unwrap_or(data))),
            Type::StringArray | Type::I18nString => Value::Strings(
                data.split(|&b| b == 0)
                    .take(count as usize)
                    .map(lossy)
                    .collect(),
            ),
            Type::Bin => Value::Binary(data.to_vec()),
        }
    }

    pub fn as_int(&self) -> Option<u64> {
        match self {
            Value::Int(value) => Some(*value),
            _ => None,
        }
    }

    /// Integers of the entry, a scalar counts as one element
    pub fn as_ints(&self) -> Option<&[u64]> {
        match self {
            Value::Int(value) => Some(slice::from_ref(value)),
            Value::Ints(values) => Some(values),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_strs(&self) -> Option<&[String]> {
        match self {
            Value::Strings(values) => Some(values),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Binary(value) => Some(value),
            _ => None,
        }
    }
}

fn ints(values: impl Iterator<Item = u64>, count: u32) -> Value {
    let mut values: Vec<u64> = values.collect();
    if count == 1 && values.len() == 1 {
        Value::Int(values.remove(0))
    } else {
        Value::Ints(values)
    }
}

fn lossy(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

/// One decoded field of a header
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IndexEntry {
    pub tag: i32,
    pub kind: Type,
    /// Offset within the data region
    pub offset: usize,
    pub count: u32,
    pub value: Value,
}
