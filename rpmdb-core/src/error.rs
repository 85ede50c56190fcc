use alloc::format;
use alloc::string::{String, ToString};
use core::error;
use core::fmt::{Display, Formatter, Result};

use crate::tag::{self, Type};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Error {
    BadMagic,
    BadVersion(u8),
    TooShort { needed: usize, actual: usize },
    NoTags,
    TooLarge(usize),
    InvalidRegion(&'static str),
    InvalidEntry { index: usize, reason: &'static str },
    DuplicateTag(i32),
    DataLength { calculated: usize, declared: usize },
    MissingTag(i32),
    InvalidTagType { tag: i32, expected: Type, actual: Type },
    FileArrayMismatch { tag: i32, expected: usize, actual: usize },
    DirIndexOutOfRange { file: usize, index: u64, dirs: usize },
    ValueOutOfRange { tag: i32, value: u64 },
    Overflow,
}

impl Error {
    /// Errors raised while assembling a package from a well-formed header
    pub fn is_metadata(&self) -> bool {
        matches!(
            self,
            Error::MissingTag(_)
                | Error::InvalidTagType { .. }
                | Error::FileArrayMismatch { .. }
                | Error::DirIndexOutOfRange { .. }
                | Error::ValueOutOfRange { .. }
        )
    }
}

fn tag_name(tag: i32) -> String {
    match tag::name(tag) {
        Some(name) => format!("{} ({})", name, tag),
        None => tag.to_string(),
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter) -> Result {
        use Error::*;

        let msg = match self {
            BadMagic => "Bad header magic".to_string(),
            BadVersion(version) => format!("Unsupported header version: {}", version),
            TooShort { needed, actual } => {
                format!("Header too short: needed {} bytes, got {}", needed, actual)
            }
            NoTags => "Header has no tags".to_string(),
            TooLarge(size) => format!("Header size {} exceeds limit", size),
            InvalidRegion(reason) => format!("Invalid region: {}", reason),
            InvalidEntry { index, reason } => format!("Invalid entry {}: {}", index, reason),
            DuplicateTag(tag) => format!("Duplicate tag {}", tag_name(*tag)),
            DataLength {
                calculated,
                declared,
            } => format!(
                "Data length mismatch: calculated {}, declared {}",
                calculated, declared
            ),
            MissingTag(tag) => format!("Missing tag {}", tag_name(*tag)),
            InvalidTagType {
                tag,
                expected,
                actual,
            } => format!(
                "Tag {} has type {:?}, expected {:?}",
                tag_name(*tag),
                actual,
                expected
            ),
            FileArrayMismatch {
                tag,
                expected,
                actual,
            } => format!(
                "File array {} has {} elements, expected {}",
                tag_name(*tag),
                actual,
                expected
            ),
            DirIndexOutOfRange { file, index, dirs } => format!(
                "File {} refers to directory {} of {}",
                file, index, dirs
            ),
            ValueOutOfRange { tag, value } => {
                format!("Tag {} holds out of range value {}", tag_name(*tag), value)
            }
            Overflow => "Overflow".to_string(),
        };
        write!(f, "{}", msg)
    }
}

impl error::Error for Error {}
